//! # Archive Catalog
//!
//! A catalog answers two questions: which versions exist, and where the
//! archive for one of them can be fetched from. The instance store consumes
//! nothing else, so discovery mechanics stay behind the [`ArchiveCatalog`]
//! trait.
//!
//! ## Implementations
//!
//! - [`http::HttpCatalog`]: scrapes an HTML directory listing (the
//!   upstream release archive). The listing is fetched lazily, on first use.
//! - [`dir::DirCatalog`]: scans a local mirror directory. Used for offline
//!   installs and throughout the tests.
//!
//! Both recognize archives by [`ArchiveNaming`]:
//! `webots-<major.minor.patch>-<arch>.tar.bz2` (gzip and plain tar are also
//! accepted).

use crate::config::ManagerConfig;
use crate::error::{ManagerError, Result};
use crate::version::Version;
use regex::Regex;
use std::collections::BTreeMap;

pub mod dir;
pub mod http;

pub trait ArchiveCatalog {
    /// Every version the catalog knows about, ascending.
    fn available_versions(&self) -> Result<Vec<Version>>;

    /// Location (URL or filesystem path) of the archive for `v`.
    /// Fails with [`ManagerError::NotFound`] for unknown versions.
    fn resolve_download(&self, v: Version) -> Result<String>;
}

impl<C: ArchiveCatalog + ?Sized> ArchiveCatalog for Box<C> {
    fn available_versions(&self) -> Result<Vec<Version>> {
        (**self).available_versions()
    }

    fn resolve_download(&self, v: Version) -> Result<String> {
        (**self).resolve_download(v)
    }
}

/// Picks the catalog implementation from `archive_url`.
pub fn from_config(config: &ManagerConfig) -> Result<Box<dyn ArchiveCatalog>> {
    let url = config.archive_url.as_str();
    if url.starts_with("http://") || url.starts_with("https://") {
        Ok(Box::new(http::HttpCatalog::new(url, &config.arch)?))
    } else {
        Ok(Box::new(dir::DirCatalog::new(url, &config.arch)?))
    }
}

/// Archive file naming for one architecture.
#[derive(Debug, Clone)]
pub struct ArchiveNaming {
    arch: String,
    pattern: Regex,
}

impl ArchiveNaming {
    pub fn new(arch: &str) -> Result<Self> {
        let pattern = Regex::new(&format!(
            r"^webots-(.+)-{}\.(tar\.bz2|tar\.gz|tgz|tar)$",
            regex::escape(arch)
        ))
        .map_err(|e| ManagerError::InvalidInput(format!("architecture '{}': {}", arch, e)))?;
        Ok(Self {
            arch: arch.to_string(),
            pattern,
        })
    }

    pub fn arch(&self) -> &str {
        &self.arch
    }

    /// Canonical archive name for `v`.
    pub fn file_name(&self, v: Version) -> String {
        format!("webots-{}-{}.tar.bz2", v, self.arch)
    }

    /// Returns `Ok(None)` for names that are not archives for this
    /// architecture, and a parse error for archive names carrying a
    /// malformed version.
    pub fn parse_file_name(&self, name: &str) -> Result<Option<Version>> {
        match self.pattern.captures(name) {
            Some(caps) => Version::parse(&caps[1]).map(Some),
            None => Ok(None),
        }
    }
}

/// Version -> archive file name, keeping one entry per version. When a
/// version is published in several formats the canonical `.tar.bz2` wins.
#[derive(Debug, Default, Clone)]
pub(crate) struct ArchiveIndex {
    entries: BTreeMap<Version, String>,
}

impl ArchiveIndex {
    pub(crate) fn insert(&mut self, v: Version, file_name: String) {
        let keep_existing = self
            .entries
            .get(&v)
            .is_some_and(|existing| existing.ends_with(".tar.bz2"));
        if !keep_existing {
            self.entries.insert(v, file_name);
        }
    }

    pub(crate) fn versions(&self) -> Vec<Version> {
        self.entries.keys().copied().collect()
    }

    pub(crate) fn file_name(&self, v: Version) -> Result<&str> {
        self.entries
            .get(&v)
            .map(String::as_str)
            .ok_or_else(|| ManagerError::version_not_found(v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_name() {
        let naming = ArchiveNaming::new("x86-64").unwrap();
        assert_eq!(
            naming.file_name(Version::new(8, 6, 2)),
            "webots-8.6.2-x86-64.tar.bz2"
        );
    }

    #[test]
    fn test_parse_file_name() {
        let naming = ArchiveNaming::new("x86-64").unwrap();
        assert_eq!(
            naming
                .parse_file_name("webots-8.6.2-x86-64.tar.bz2")
                .unwrap(),
            Some(Version::new(8, 6, 2))
        );
        assert_eq!(
            naming.parse_file_name("webots-8.6.2-x86-64.tgz").unwrap(),
            Some(Version::new(8, 6, 2))
        );
        assert_eq!(
            naming.parse_file_name("webots-8.6.2-i386.tar.bz2").unwrap(),
            None
        );
        assert_eq!(naming.parse_file_name("README.txt").unwrap(), None);
        assert!(naming
            .parse_file_name("webots-8.6-x86-64.tar.bz2")
            .is_err());
    }

    #[test]
    fn test_arch_is_matched_literally() {
        let naming = ArchiveNaming::new("x86-64").unwrap();
        // '.' in a pattern would match any char; the arch must be escaped.
        let dotted = ArchiveNaming::new("arm.v7").unwrap();
        assert_eq!(
            dotted.parse_file_name("webots-1.0.0-armXv7.tar.gz").unwrap(),
            None
        );
        assert_eq!(naming.arch(), "x86-64");
    }

    #[test]
    fn test_index_prefers_bz2() {
        let mut index = ArchiveIndex::default();
        let v = Version::new(1, 0, 0);
        index.insert(v, "webots-1.0.0-x.tar.bz2".into());
        index.insert(v, "webots-1.0.0-x.tar.gz".into());
        assert_eq!(index.file_name(v).unwrap(), "webots-1.0.0-x.tar.bz2");
        assert!(matches!(
            index.file_name(Version::new(2, 0, 0)),
            Err(ManagerError::NotFound(_))
        ));
    }
}
