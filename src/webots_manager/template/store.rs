use crate::error::Result;
use crate::version::Version;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;
use uuid::Uuid;

pub const SNAPSHOT_FILE: &str = "data.json";
pub const RETIRED_FILE: &str = "retired.json";

/// One registered override file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateRecord {
    pub install_path: String,
    pub storage_key: String,
    #[serde(default)]
    pub whitelist: BTreeSet<Version>,
    #[serde(default)]
    pub blacklist: BTreeSet<Version>,
}

impl TemplateRecord {
    pub fn new(install_path: String, storage_key: String) -> Self {
        Self {
            install_path,
            storage_key,
            whitelist: BTreeSet::new(),
            blacklist: BTreeSet::new(),
        }
    }

    /// Blacklist wins; a non-empty whitelist excludes every version it does
    /// not name; otherwise the template applies.
    pub fn includes(&self, v: Version) -> bool {
        if self.blacklist.contains(&v) {
            return false;
        }
        self.whitelist.is_empty() || self.whitelist.contains(&v)
    }
}

pub fn data_file_name(storage_key: &str) -> String {
    format!("{}.data", storage_key)
}

/// A removed template whose links may still sit in version trees.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetiredTemplate {
    pub install_path: String,
    pub storage_key: String,
}

/// `install path -> record`, persisted as one JSON object and rewritten in
/// full after every mutation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TemplateStore {
    pub records: BTreeMap<String, TemplateRecord>,
    pub retired: BTreeSet<RetiredTemplate>,
}

impl TemplateStore {
    pub fn load(dir: &Path) -> Result<Self> {
        Ok(Self {
            records: load_json(&dir.join(SNAPSHOT_FILE))?.unwrap_or_default(),
            retired: load_json(&dir.join(RETIRED_FILE))?.unwrap_or_default(),
        })
    }

    pub fn save(&self, dir: &Path) -> Result<()> {
        write_atomic(dir, SNAPSHOT_FILE, &serde_json::to_vec_pretty(&self.records)?)?;
        if self.retired.is_empty() {
            match fs::remove_file(dir.join(RETIRED_FILE)) {
                Err(e) if e.kind() != std::io::ErrorKind::NotFound => return Err(e.into()),
                _ => {}
            }
        } else {
            write_atomic(dir, RETIRED_FILE, &serde_json::to_vec_pretty(&self.retired)?)?;
        }
        Ok(())
    }
}

fn load_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(path)?;
    if content.trim().is_empty() {
        return Ok(None);
    }
    Ok(Some(serde_json::from_str(&content)?))
}

/// Writes through a temp file and renames it over `name`.
pub fn write_atomic(dir: &Path, name: &str, content: &[u8]) -> Result<()> {
    let tmp = dir.join(format!(".{}-{}.tmp", name, Uuid::new_v4()));
    fs::write(&tmp, content)?;
    if let Err(e) = fs::rename(&tmp, dir.join(name)) {
        let _ = fs::remove_file(&tmp);
        return Err(e.into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn v(s: &str) -> Version {
        Version::parse(s).unwrap()
    }

    #[test]
    fn test_includes_precedence() {
        let mut rec = TemplateRecord::new("etc/motd".into(), "k".into());
        assert!(rec.includes(v("1.0.0")));

        rec.whitelist.insert(v("2021.0.0"));
        assert!(rec.includes(v("2021.0.0")));
        assert!(!rec.includes(v("2020.1.0")));

        // Blacklist beats whitelist.
        rec.blacklist.insert(v("2021.0.0"));
        assert!(!rec.includes(v("2021.0.0")));
    }

    #[test]
    fn test_blacklist_only() {
        let mut rec = TemplateRecord::new("a".into(), "k".into());
        rec.blacklist.insert(v("8.6.2"));
        assert!(!rec.includes(v("8.6.2")));
        assert!(rec.includes(v("8.5.4")));
    }

    #[test]
    fn test_snapshot_format() {
        let mut store = TemplateStore::default();
        let mut rec = TemplateRecord::new("etc/motd".into(), "abc".into());
        rec.whitelist.insert(v("2021.0.0"));
        store.records.insert(rec.install_path.clone(), rec);

        let json: serde_json::Value =
            serde_json::to_value(&store.records).unwrap();
        assert_eq!(json["etc/motd"]["storageKey"], "abc");
        assert_eq!(json["etc/motd"]["installPath"], "etc/motd");
        assert_eq!(json["etc/motd"]["whitelist"][0], "2021.0.0");
        assert!(json["etc/motd"]["blacklist"].as_array().unwrap().is_empty());
    }

    #[test]
    fn test_load_save_roundtrip_and_no_tmp_left() {
        let temp = TempDir::new().unwrap();
        let mut store = TemplateStore::default();
        store
            .records
            .insert("a".into(), TemplateRecord::new("a".into(), "k1".into()));
        store.retired.insert(RetiredTemplate {
            install_path: "b".into(),
            storage_key: "k2".into(),
        });
        store.save(temp.path()).unwrap();

        assert_eq!(TemplateStore::load(temp.path()).unwrap(), store);
        for entry in fs::read_dir(temp.path()).unwrap() {
            let name = entry.unwrap().file_name();
            assert!(!name.to_str().unwrap().ends_with(".tmp"));
        }

        store.retired.clear();
        store.save(temp.path()).unwrap();
        assert!(!temp.path().join(RETIRED_FILE).exists());
    }

    #[test]
    fn test_load_missing_or_empty() {
        let temp = TempDir::new().unwrap();
        assert_eq!(TemplateStore::load(temp.path()).unwrap(), TemplateStore::default());
        fs::write(temp.path().join(SNAPSHOT_FILE), "").unwrap();
        assert_eq!(TemplateStore::load(temp.path()).unwrap(), TemplateStore::default());
    }

    #[test]
    fn test_corrupt_snapshot_is_an_error() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join(SNAPSHOT_FILE), "{not json").unwrap();
        assert!(TemplateStore::load(temp.path()).is_err());
    }
}
