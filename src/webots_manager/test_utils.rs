//! Fixtures for building release archives and work roots in tests.

use crate::config::{Layout, ManagerConfig};
use crate::version::Version;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Modification time stamped on every generated archive entry.
pub const ARCHIVE_MTIME: u64 = 1_600_000_000;

pub enum ArchiveItemKind {
    File(Vec<u8>),
    Dir,
    Symlink(String),
    HardLink(String),
}

pub struct ArchiveItem {
    pub path: String,
    pub kind: ArchiveItemKind,
    pub mode: u32,
}

impl ArchiveItem {
    pub fn file(path: &str, content: &str) -> Self {
        Self {
            path: path.to_string(),
            kind: ArchiveItemKind::File(content.as_bytes().to_vec()),
            mode: 0o644,
        }
    }

    pub fn dir(path: &str) -> Self {
        Self {
            path: path.to_string(),
            kind: ArchiveItemKind::Dir,
            mode: 0o755,
        }
    }

    pub fn symlink(path: &str, target: &str) -> Self {
        Self {
            path: path.to_string(),
            kind: ArchiveItemKind::Symlink(target.to_string()),
            mode: 0o777,
        }
    }

    pub fn hard_link(path: &str, target: &str) -> Self {
        Self {
            path: path.to_string(),
            kind: ArchiveItemKind::HardLink(target.to_string()),
            mode: 0o644,
        }
    }

    pub fn with_mode(mut self, mode: u32) -> Self {
        self.mode = mode;
        self
    }
}

/// Builds a gzip-compressed tar archive in memory.
pub fn tar_gz(items: &[ArchiveItem]) -> Vec<u8> {
    let enc = GzEncoder::new(Vec::new(), Compression::default());
    let mut tar = tar::Builder::new(enc);

    for item in items {
        let mut header = tar::Header::new_gnu();
        header.set_mode(item.mode);
        header.set_mtime(ARCHIVE_MTIME);
        let data: &[u8] = match &item.kind {
            ArchiveItemKind::File(content) => {
                header.set_entry_type(tar::EntryType::Regular);
                content
            }
            ArchiveItemKind::Dir => {
                header.set_entry_type(tar::EntryType::Directory);
                &[]
            }
            ArchiveItemKind::Symlink(target) => {
                header.set_entry_type(tar::EntryType::Symlink);
                header.set_link_name(target).unwrap();
                &[]
            }
            ArchiveItemKind::HardLink(target) => {
                header.set_entry_type(tar::EntryType::Link);
                header.set_link_name(target).unwrap();
                &[]
            }
        };
        header.set_size(data.len() as u64);
        tar.append_data(&mut header, &item.path, data).unwrap();
    }

    tar.into_inner().unwrap().finish().unwrap()
}

/// A minimal release tree: a launcher script and a version marker.
pub fn release_archive(v: Version) -> Vec<u8> {
    tar_gz(&[
        ArchiveItem::dir("webots/"),
        ArchiveItem::file("webots/webots", "#!/bin/sh\n").with_mode(0o755),
        ArchiveItem::file("webots/resources/version.txt", &v.to_string()),
        ArchiveItem::dir("webots/etc/"),
    ])
}

/// A temporary work root plus a local archive mirror.
pub struct TestEnv {
    // Kept so the directory outlives the test.
    pub _temp_dir: TempDir,
    pub config: ManagerConfig,
    pub mirror: PathBuf,
}

impl Default for TestEnv {
    fn default() -> Self {
        Self::new()
    }
}

impl TestEnv {
    pub fn new() -> Self {
        let temp_dir = tempfile::tempdir().expect("failed to create temp dir");
        let root = temp_dir.path();
        let mirror = root.join("mirror");
        fs::create_dir_all(&mirror).unwrap();
        fs::create_dir_all(root.join("work")).unwrap();

        let config = ManagerConfig {
            work_root: root.join("work"),
            home_link: root.join("webots"),
            archive_url: mirror.to_string_lossy().into_owned(),
            arch: "x86-64".to_string(),
            strip_prefix: "webots".to_string(),
        };
        Self {
            _temp_dir: temp_dir,
            config,
            mirror,
        }
    }

    pub fn layout(&self) -> Layout {
        self.config.layout().unwrap()
    }

    pub fn work_root(&self) -> &Path {
        &self.config.work_root
    }

    /// Writes the config to `<temp>/config` and returns that directory, for
    /// pointing the binary at this environment.
    pub fn config_dir(&self) -> PathBuf {
        let dir = self._temp_dir.path().join("config");
        self.config.save(&dir).unwrap();
        dir
    }

    /// Publishes a release archive for `v` in the mirror.
    pub fn publish(&self, v: Version) {
        self.publish_bytes(v, &release_archive(v));
    }

    pub fn publish_bytes(&self, v: Version, archive: &[u8]) {
        let name = format!("webots-{}-{}.tar.gz", v, self.config.arch);
        fs::write(self.mirror.join(name), archive).unwrap();
    }

    /// Writes a file outside the work root, for template registration.
    pub fn source_file(&self, name: &str, content: &str) -> PathBuf {
        let path = self._temp_dir.path().join("sources").join(name);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, content).unwrap();
        path
    }
}
