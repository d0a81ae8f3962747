//! # Archive extraction
//!
//! The materialization step only understands a sequence of entries: a path,
//! a kind (regular file, directory or symlink), content bytes or a link
//! target, and an optional modification time. [`Extractor`] writes such
//! entries below a root directory; [`unpack_tar`] feeds it from a tar stream
//! after undoing the compression picked by [`Compression::from_location`].
//!
//! Paths are confined to the root: absolute paths and `..` components are
//! rejected, and so is any entry whose parent directories include a symlink
//! (an earlier entry may have planted one pointing anywhere). A file or link
//! entry replaces a symlink already at its own path instead of writing
//! through it. The release's top-level directory (`webots/`) is stripped, and
//! the entry for that directory itself is skipped.
//!
//! Extraction halts on the first failing entry. Whatever was already written
//! stays on disk; the caller decides what to do with a partial tree.

use crate::error::{ManagerError, Result};
use std::fs::{self, File};
use std::io::{self, Read};
use std::os::unix::fs::{symlink, PermissionsExt};
use std::path::{Component, Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    Gzip,
    Bzip2,
    None,
}

impl Compression {
    /// Guesses the compression from a file name or URL.
    pub fn from_location(location: &str) -> Self {
        if location.ends_with(".tar.gz") || location.ends_with(".tgz") {
            Compression::Gzip
        } else if location.ends_with(".tar") {
            Compression::None
        } else {
            Compression::Bzip2
        }
    }

    pub fn decoder<'a>(self, reader: Box<dyn Read + 'a>) -> Box<dyn Read + 'a> {
        match self {
            Compression::Gzip => Box::new(flate2::read::GzDecoder::new(reader)),
            Compression::Bzip2 => Box::new(bzip2::read::MultiBzDecoder::new(reader)),
            Compression::None => reader,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryKind {
    File { mode: Option<u32> },
    Directory,
    Symlink { target: PathBuf },
}

#[derive(Debug, Clone)]
pub struct EntryHeader {
    pub path: PathBuf,
    pub kind: EntryKind,
    pub mtime: Option<SystemTime>,
}

/// Writes archive entries below `root`.
pub struct Extractor {
    root: PathBuf,
    strip_prefix: Option<String>,
    dir_times: Vec<(PathBuf, SystemTime)>,
    written: usize,
}

impl Extractor {
    pub fn new(root: impl Into<PathBuf>, strip_prefix: &str) -> Self {
        Self {
            root: root.into(),
            strip_prefix: Some(strip_prefix.to_string()).filter(|p| !p.is_empty()),
            dir_times: Vec::new(),
            written: 0,
        }
    }

    /// Maps an archive path to a path relative to the root. `None` means the
    /// entry is the root itself.
    pub fn relative_path(&self, raw: &Path) -> Result<Option<PathBuf>> {
        let mut components = raw.components().peekable();
        while components.peek() == Some(&Component::CurDir) {
            components.next();
        }
        let at_prefix = match (&self.strip_prefix, components.peek()) {
            (Some(prefix), Some(Component::Normal(first))) => {
                first.to_str() == Some(prefix.as_str())
            }
            _ => false,
        };
        if at_prefix {
            components.next();
        }

        let mut rel = PathBuf::new();
        for component in components {
            match component {
                Component::Normal(part) => rel.push(part),
                Component::CurDir => {}
                Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                    return Err(ManagerError::Archive(format!(
                        "entry {} escapes the install directory",
                        raw.display()
                    )));
                }
            }
        }

        Ok(Some(rel).filter(|p| !p.as_os_str().is_empty()))
    }

    pub fn write_entry(&mut self, header: &EntryHeader, content: &mut dyn Read) -> Result<()> {
        let Some(rel) = self.relative_path(&header.path)? else {
            return Ok(());
        };
        self.check_ancestors(&header.path, &rel)?;
        let dest = self.root.join(&rel);
        tracing::trace!("extracting {}", rel.display());

        self.materialize(&dest, header, content).map_err(|e| {
            ManagerError::Archive(format!("cannot extract {}: {}", header.path.display(), e))
        })?;
        self.written += 1;
        Ok(())
    }

    fn check_ancestors(&self, raw: &Path, rel: &Path) -> Result<()> {
        let mut current = self.root.clone();
        for component in rel.parent().into_iter().flat_map(Path::components) {
            current.push(component);
            match fs::symlink_metadata(&current) {
                Ok(meta) if meta.file_type().is_symlink() => {
                    return Err(ManagerError::Archive(format!(
                        "entry {} traverses symlink {}",
                        raw.display(),
                        current.display()
                    )))
                }
                Ok(_) => {}
                Err(e) if e.kind() == io::ErrorKind::NotFound => break,
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }

    fn materialize(
        &mut self,
        dest: &Path,
        header: &EntryHeader,
        content: &mut dyn Read,
    ) -> io::Result<()> {
        match &header.kind {
            EntryKind::Directory => {
                fs::create_dir_all(dest)?;
                if let Some(mtime) = header.mtime {
                    self.dir_times.push((dest.to_path_buf(), mtime));
                }
            }
            EntryKind::File { mode } => {
                ensure_parent(dest)?;
                remove_symlink(dest)?;
                let mut file = File::create(dest)?;
                io::copy(content, &mut file)?;
                if let Some(mode) = mode {
                    file.set_permissions(fs::Permissions::from_mode(mode & 0o7777))?;
                }
                if let Some(mtime) = header.mtime {
                    file.set_modified(mtime)?;
                }
            }
            EntryKind::Symlink { target } => {
                ensure_parent(dest)?;
                remove_symlink(dest)?;
                symlink(target, dest)?;
            }
        }
        Ok(())
    }

    /// Applies directory modification times, which writing their children
    /// would otherwise clobber. Returns the number of entries written.
    pub fn finish(self) -> Result<usize> {
        for (dir, mtime) in self.dir_times.iter().rev() {
            File::open(dir)?.set_modified(*mtime)?;
        }
        Ok(self.written)
    }
}

fn ensure_parent(dest: &Path) -> io::Result<()> {
    match dest.parent() {
        Some(parent) => fs::create_dir_all(parent),
        None => Ok(()),
    }
}

fn remove_symlink(dest: &Path) -> io::Result<()> {
    match fs::symlink_metadata(dest) {
        Ok(meta) if meta.file_type().is_symlink() => fs::remove_file(dest),
        Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}

fn tar_header(entry: &tar::Entry<'_, impl Read>) -> Result<EntryHeader> {
    let header = entry.header();
    let path = entry.path()?.into_owned();
    let kind = match header.entry_type() {
        tar::EntryType::Regular | tar::EntryType::Continuous => EntryKind::File {
            mode: header.mode().ok(),
        },
        tar::EntryType::Directory => EntryKind::Directory,
        tar::EntryType::Symlink => {
            let target = entry.link_name()?.ok_or_else(|| {
                ManagerError::Archive(format!("symlink {} has no target", path.display()))
            })?;
            EntryKind::Symlink {
                target: target.into_owned(),
            }
        }
        other => {
            return Err(ManagerError::Archive(format!(
                "cannot handle entry {} of type {:?}",
                path.display(),
                other
            )))
        }
    };
    let mtime = header
        .mtime()
        .ok()
        .map(|secs| UNIX_EPOCH + Duration::from_secs(secs));
    Ok(EntryHeader { path, kind, mtime })
}

/// Streams a (decompressed) tar archive into `root`. Returns the number of
/// entries written.
pub fn unpack_tar<R: Read>(reader: R, root: &Path, strip_prefix: &str) -> Result<usize> {
    let mut archive = tar::Archive::new(reader);
    let mut extractor = Extractor::new(root, strip_prefix);

    for entry in archive.entries()? {
        let mut entry = entry?;
        let header = tar_header(&entry)?;
        extractor.write_entry(&header, &mut entry)?;
    }

    extractor.finish()
}
