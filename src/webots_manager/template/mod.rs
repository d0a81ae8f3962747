//! # Template Overlay Manager
//!
//! Site-specific files (license files, `etc/` tweaks, default worlds...) are
//! registered once and then linked into every installed version that the
//! per-template rules allow.
//!
//! ## Storage
//!
//! ```text
//! <work_root>/templates/
//! ├── data.json          # install path -> TemplateRecord
//! ├── retired.json       # removed templates whose links may still exist
//! ├── <key>.data         # stored file content
//! └── global.lock
//! ```
//!
//! The storage key is the SHA-256 of the file content followed by the
//! install path. The same content registered at two install paths gives two
//! stored copies that can be removed independently.
//!
//! ## Rules
//!
//! Evaluated per record, see [`TemplateRecord::includes`]: blacklisted
//! versions never get the overlay, a non-empty whitelist restricts it to the
//! versions named, anything else gets it.
//!
//! ## Reconciliation
//!
//! [`TemplateManager::apply_templates`] makes one version tree match the
//! rules. An overlay is a symlink from `<version root>/<install path>` to the
//! stored data file. A real file found where an included overlay should go is
//! never overwritten: that is an integrity error. Excluded or retired
//! overlays are unlinked only when the link is one of ours. Reconciliation is
//! idempotent.
//!
//! Every mutating operation takes the templates lock, re-reads the snapshot,
//! applies its change and writes the snapshot back in full.

use crate::error::{ManagerError, Result};
use crate::lock::{LockFile, LockGuard};
use crate::version::Version;
use sha2::{Digest, Sha256};
use std::fs;
use std::io::ErrorKind;
use std::os::unix::fs::symlink;
use std::path::{Component, Path, PathBuf};

pub mod store;

pub use store::{RetiredTemplate, TemplateRecord, TemplateStore};

/// What one reconciliation pass changed.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ApplyReport {
    pub linked: Vec<String>,
    pub unlinked: Vec<String>,
    pub unchanged: usize,
}

impl ApplyReport {
    pub fn is_noop(&self) -> bool {
        self.linked.is_empty() && self.unlinked.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct TemplateManager {
    dir: PathBuf,
    lock: LockFile,
}

/// Normalizes an install path to `a/b/c` form. It must be relative and stay
/// inside the version tree.
pub fn normalize_install_path(raw: &str) -> Result<String> {
    let mut parts = Vec::new();
    for component in Path::new(raw).components() {
        match component {
            Component::Normal(part) => parts.push(part.to_str().ok_or_else(|| {
                ManagerError::InvalidInput(format!("install path '{}' is not UTF-8", raw))
            })?),
            Component::CurDir => {}
            _ => {
                return Err(ManagerError::InvalidInput(format!(
                    "install path '{}' must be relative and must not contain '..'",
                    raw
                )))
            }
        }
    }
    if parts.is_empty() {
        return Err(ManagerError::InvalidInput(format!(
            "install path '{}' is empty",
            raw
        )));
    }
    Ok(parts.join("/"))
}

pub fn storage_key(content: &[u8], install_path: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content);
    hasher.update(install_path.as_bytes());
    hex::encode(hasher.finalize())
}

impl TemplateManager {
    /// Opens (creating if needed) the store at `dir`. Links point at data
    /// files by absolute path, so a relative `dir` is resolved here.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = std::path::absolute(dir.into())?;
        fs::create_dir_all(&dir)?;
        let lock = LockFile::new(dir.join("global.lock"));
        Ok(Self { dir, lock })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn lock(&self) -> &LockFile {
        &self.lock
    }

    pub fn data_path(&self, storage_key: &str) -> PathBuf {
        self.dir.join(store::data_file_name(storage_key))
    }

    /// Reads the current snapshot. Safe without the lock for reporting.
    pub fn load(&self) -> Result<TemplateStore> {
        let store = TemplateStore::load(&self.dir)?;
        for (key, record) in &store.records {
            if key != &record.install_path {
                return Err(ManagerError::Integrity(format!(
                    "template snapshot maps '{}' to a record for '{}'",
                    key, record.install_path
                )));
            }
        }
        Ok(store)
    }

    /// All registered templates, ordered by install path.
    pub fn templates(&self) -> Result<Vec<TemplateRecord>> {
        Ok(self.load()?.records.into_values().collect())
    }

    fn mutate<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut TemplateStore) -> Result<T>,
    {
        self.lock.with(|_guard| {
            let mut store = self.load()?;
            let out = f(&mut store)?;
            store.save(&self.dir)?;
            Ok(out)
        })
    }

    pub fn register_template(&self, source: &Path, install_path: &str) -> Result<TemplateRecord> {
        let install_path = normalize_install_path(install_path)?;
        self.mutate(|store| {
            let content = fs::read(source)?;
            if store.records.contains_key(&install_path) {
                return Err(ManagerError::AlreadyExists(format!(
                    "template for {} is already registered",
                    install_path
                )));
            }

            let key = storage_key(&content, &install_path);
            // Same content at the same path: its old links are live again.
            store.retired.retain(|r| r.storage_key != key);
            store::write_atomic(&self.dir, &store::data_file_name(&key), &content)?;

            let record = TemplateRecord::new(install_path.clone(), key);
            store.records.insert(install_path.clone(), record.clone());
            tracing::info!(
                "registered template {} from {}",
                install_path,
                source.display()
            );
            Ok(record)
        })
    }

    pub fn whitelist(&self, install_path: &str, versions: &[Version]) -> Result<TemplateRecord> {
        self.update_rules(install_path, |record| {
            record.whitelist.extend(versions.iter().copied())
        })
    }

    pub fn blacklist(&self, install_path: &str, versions: &[Version]) -> Result<TemplateRecord> {
        self.update_rules(install_path, |record| {
            record.blacklist.extend(versions.iter().copied())
        })
    }

    fn update_rules<F>(&self, install_path: &str, f: F) -> Result<TemplateRecord>
    where
        F: FnOnce(&mut TemplateRecord),
    {
        let install_path = normalize_install_path(install_path)?;
        self.mutate(|store| {
            let record = store
                .records
                .get_mut(&install_path)
                .ok_or_else(|| ManagerError::template_not_found(&install_path))?;
            f(record);
            Ok(record.clone())
        })
    }

    /// Forgets a template and deletes its stored data. Links already present
    /// in version trees are removed by the next reconciliation of each tree.
    pub fn remove_template(&self, install_path: &str) -> Result<TemplateRecord> {
        let install_path = normalize_install_path(install_path)?;
        self.mutate(|store| {
            let record = store
                .records
                .get(&install_path)
                .cloned()
                .ok_or_else(|| ManagerError::template_not_found(&install_path))?;

            match fs::remove_file(self.data_path(&record.storage_key)) {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::NotFound => {
                    tracing::warn!("stored data for {} was already gone", install_path);
                }
                Err(e) => return Err(e.into()),
            }

            store.records.remove(&install_path);
            store.retired.insert(RetiredTemplate {
                install_path: record.install_path.clone(),
                storage_key: record.storage_key.clone(),
            });
            tracing::info!("removed template {}", install_path);
            Ok(record)
        })
    }

    /// Drops the retired list once every tree has been reconciled. The caller
    /// holds the templates lock for the whole reconciliation.
    pub fn prune_retired_locked(&self, guard: &LockGuard) -> Result<()> {
        debug_assert_eq!(guard.path(), self.lock.path());
        let mut store = self.load()?;
        if store.retired.is_empty() {
            return Ok(());
        }
        store.retired.clear();
        store.save(&self.dir)
    }

    pub fn apply_templates(&self, version_root: &Path, v: Version) -> Result<ApplyReport> {
        self.lock
            .with(|guard| self.apply_templates_locked(guard, version_root, v))
    }

    /// Reconciles one version tree. The caller already holds the templates
    /// lock.
    pub fn apply_templates_locked(
        &self,
        guard: &LockGuard,
        version_root: &Path,
        v: Version,
    ) -> Result<ApplyReport> {
        debug_assert_eq!(guard.path(), self.lock.path());
        let store = self.load()?;
        let mut report = ApplyReport::default();

        for retired in &store.retired {
            let relinked = store
                .records
                .get(&retired.install_path)
                .is_some_and(|r| r.storage_key == retired.storage_key);
            if relinked {
                continue;
            }
            let target = version_root.join(&retired.install_path);
            let data = self.data_path(&retired.storage_key);
            if self.unlink_if_managed(&target, Some(&data))? {
                report.unlinked.push(retired.install_path.clone());
            } else {
                report.unchanged += 1;
            }
        }

        for record in store.records.values() {
            let target = version_root.join(&record.install_path);
            if record.includes(v) {
                if self.link(&target, record)? {
                    report.linked.push(record.install_path.clone());
                } else {
                    report.unchanged += 1;
                }
            } else if self.unlink_if_managed(&target, None)? {
                report.unlinked.push(record.install_path.clone());
            } else {
                report.unchanged += 1;
            }
        }

        tracing::debug!(
            "templates for {}: {} linked, {} unlinked, {} unchanged",
            v,
            report.linked.len(),
            report.unlinked.len(),
            report.unchanged
        );
        Ok(report)
    }

    /// Where `path` is a symlink into this template directory, its target.
    fn managed_target(&self, path: &Path) -> Result<Option<PathBuf>> {
        let meta = match fs::symlink_metadata(path) {
            Ok(meta) => meta,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        if !meta.file_type().is_symlink() {
            return Ok(None);
        }
        let target = fs::read_link(path)?;
        let managed = target.parent() == Some(self.dir.as_path())
            && target.extension().is_some_and(|ext| ext == "data");
        Ok(Some(target).filter(|_| managed))
    }

    /// Removes `target` if it is one of our links, and only if it points at
    /// `data` when that is given.
    fn unlink_if_managed(&self, target: &Path, data: Option<&Path>) -> Result<bool> {
        let matches = match self.managed_target(target)? {
            Some(current) => data.map_or(true, |d| current == d),
            None => false,
        };
        if matches {
            fs::remove_file(target)?;
        }
        Ok(matches)
    }

    /// Ensures `target` links to the record's data. Returns whether anything
    /// changed.
    fn link(&self, target: &Path, record: &TemplateRecord) -> Result<bool> {
        let expected = self.data_path(&record.storage_key);
        match self.managed_target(target)? {
            Some(current) if current == expected => return Ok(false),
            // A link left by an earlier registration at the same path.
            Some(_) => fs::remove_file(target)?,
            None => match fs::symlink_metadata(target) {
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
                Ok(_) => {
                    return Err(ManagerError::Integrity(format!(
                        "{} already exists and is not a template link",
                        target.display()
                    )))
                }
            },
        }

        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        symlink(&expected, target)?;
        Ok(true)
    }
}
