use super::{ArchiveCatalog, ArchiveIndex, ArchiveNaming};
use crate::error::Result;
use crate::version::Version;
use once_cell::sync::OnceCell;
use std::fs;
use std::path::PathBuf;

/// Catalog backed by a local directory of release archives.
pub struct DirCatalog {
    root: PathBuf,
    naming: ArchiveNaming,
    index: OnceCell<ArchiveIndex>,
}

impl DirCatalog {
    pub fn new(root: impl Into<PathBuf>, arch: &str) -> Result<Self> {
        Ok(Self {
            root: root.into(),
            naming: ArchiveNaming::new(arch)?,
            index: OnceCell::new(),
        })
    }

    fn index(&self) -> Result<&ArchiveIndex> {
        self.index.get_or_try_init(|| self.scan())
    }

    fn scan(&self) -> Result<ArchiveIndex> {
        let mut index = ArchiveIndex::default();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };
            match self.naming.parse_file_name(&name) {
                Ok(Some(v)) => index.insert(v, name),
                Ok(None) => {}
                Err(e) => tracing::warn!("skipping {}: {}", name, e),
            }
        }
        tracing::debug!(
            "found {} archives in {}",
            index.versions().len(),
            self.root.display()
        );
        Ok(index)
    }
}

impl ArchiveCatalog for DirCatalog {
    fn available_versions(&self) -> Result<Vec<Version>> {
        Ok(self.index()?.versions())
    }

    fn resolve_download(&self, v: Version) -> Result<String> {
        let name = self.index()?.file_name(v)?;
        Ok(self.root.join(name).to_string_lossy().into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ManagerError;
    use std::path::Path;
    use tempfile::TempDir;

    fn touch(dir: &Path, name: &str) {
        fs::write(dir.join(name), b"").unwrap();
    }

    #[test]
    fn test_scan_lists_sorted_versions_for_arch() {
        let temp = TempDir::new().unwrap();
        touch(temp.path(), "webots-8.6.2-x86-64.tar.bz2");
        touch(temp.path(), "webots-2021.0.0-x86-64.tar.gz");
        touch(temp.path(), "webots-8.5.4-x86-64.tar.bz2");
        touch(temp.path(), "webots-8.5.4-i386.tar.bz2");
        touch(temp.path(), "webots-bogus-x86-64.tar.bz2");
        touch(temp.path(), "notes.txt");
        fs::create_dir(temp.path().join("webots-9.0.0-x86-64.tar")).unwrap();

        let catalog = DirCatalog::new(temp.path(), "x86-64").unwrap();
        assert_eq!(
            catalog.available_versions().unwrap(),
            vec![
                Version::new(8, 5, 4),
                Version::new(8, 6, 2),
                Version::new(2021, 0, 0)
            ]
        );
    }

    #[test]
    fn test_resolve_download() {
        let temp = TempDir::new().unwrap();
        touch(temp.path(), "webots-8.6.2-x86-64.tar.bz2");
        let catalog = DirCatalog::new(temp.path(), "x86-64").unwrap();

        let location = catalog.resolve_download(Version::new(8, 6, 2)).unwrap();
        assert_eq!(
            PathBuf::from(location),
            temp.path().join("webots-8.6.2-x86-64.tar.bz2")
        );

        let missing = catalog.resolve_download(Version::new(1, 0, 0));
        assert!(matches!(missing, Err(ManagerError::NotFound(_))));
    }

    #[test]
    fn test_missing_directory_is_io_error() {
        let temp = TempDir::new().unwrap();
        let catalog = DirCatalog::new(temp.path().join("nope"), "x86-64").unwrap();
        assert!(matches!(
            catalog.available_versions(),
            Err(ManagerError::Io(_))
        ));
    }
}
