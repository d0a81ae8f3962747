//! # Instance Store
//!
//! Owns the work root: one extracted tree per installed version and the
//! `used` pointer naming the active one.
//!
//! A version is in one of three states, all derivable from the filesystem:
//! not installed, installed, or installed and active. [`InstanceStore::open`]
//! derives them once; the in-memory view is then kept in step by every
//! mutation made through the store, and template reconciliation re-reads the
//! installed set before touching any tree.
//!
//! ## Install
//!
//! The archive is extracted into a staging directory next to the version
//! trees, templates are applied to the staged tree, and only then is it
//! renamed into `<work_root>/<version>`. A reinstall moves the previous tree
//! aside first and deletes it after the swap. Any failure before the swap
//! discards the staging directory and leaves the previous tree (or its
//! absence) untouched.
//!
//! ## Active pointer
//!
//! `used` is a relative symlink to the version directory name. Switching
//! creates a fresh link under a temporary name and renames it over `used`,
//! so there is always either the old pointer or the new one.
//!
//! ## Locking
//!
//! Mutations hold `<work_root>/global.lock`. Template reconciliation also
//! takes the template store's own lock; the two are distinct files, always
//! acquired in that order.

use crate::catalog::ArchiveCatalog;
use crate::config::{Layout, ManagerConfig};
use crate::download;
use crate::error::{ManagerError, Result};
use crate::extract::{self, Compression};
use crate::lock::{LockFile, LockGuard};
use crate::template::{ApplyReport, TemplateManager};
use crate::version::Version;
use std::collections::BTreeSet;
use std::fs;
use std::io::ErrorKind;
use std::os::unix::fs::symlink;
use std::path::{Component, Path};
use uuid::Uuid;

pub struct InstanceStore<C: ArchiveCatalog> {
    layout: Layout,
    strip_prefix: String,
    lock: LockFile,
    catalog: C,
    templates: TemplateManager,
    installed: BTreeSet<Version>,
    in_use: Option<Version>,
}

impl<C: ArchiveCatalog> InstanceStore<C> {
    pub fn open(config: &ManagerConfig, catalog: C) -> Result<Self> {
        let layout = config.layout()?;
        fs::create_dir_all(&layout.work_root)?;
        let templates = TemplateManager::open(layout.templates_dir())?;

        let installed = scan_installed(&layout.work_root)?;
        let in_use = read_used(&layout.used_link())?;
        if let Some(v) = in_use {
            if !installed.contains(&v) {
                return Err(ManagerError::Integrity(format!(
                    "{} points at {}, which is not installed",
                    layout.used_link().display(),
                    v
                )));
            }
        }

        Ok(Self {
            lock: LockFile::new(layout.lock_path()),
            strip_prefix: config.strip_prefix.clone(),
            layout,
            catalog,
            templates,
            installed,
            in_use,
        })
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    pub fn templates(&self) -> &TemplateManager {
        &self.templates
    }

    /// Installed versions, ascending.
    pub fn installed(&self) -> Vec<Version> {
        self.installed.iter().copied().collect()
    }

    pub fn is_installed(&self, v: Version) -> bool {
        self.installed.contains(&v)
    }

    pub fn is_used(&self, v: Version) -> bool {
        self.in_use == Some(v)
    }

    pub fn active(&self) -> Option<Version> {
        self.in_use
    }

    /// Versions the catalog offers, ascending.
    pub fn available(&self) -> Result<Vec<Version>> {
        self.catalog.available_versions()
    }

    /// Installs `v`, or reinstalls it when already present.
    pub fn install(&mut self, v: Version) -> Result<()> {
        let lock = self.lock.clone();
        lock.with(|guard| self.install_locked(guard, v))
    }

    pub fn install_locked(&mut self, guard: &LockGuard, v: Version) -> Result<()> {
        debug_assert_eq!(guard.path(), self.lock.path());
        let location = self.catalog.resolve_download(v)?;
        tracing::info!("installing {} from {}", v, location);

        let staging = self.layout.staging_dir(v, &Uuid::new_v4().simple().to_string());
        let staged = self.stage(&staging, &location, v);
        if let Err(e) = staged {
            discard(&staging);
            return Err(e);
        }
        self.swap_in(&staging, v)?;

        if self.installed.insert(v) {
            tracing::info!("installed {}", v);
        } else {
            tracing::info!("reinstalled {}", v);
        }
        Ok(())
    }

    fn stage(&self, staging: &Path, location: &str, v: Version) -> Result<()> {
        fs::create_dir_all(staging)?;
        let reader = Compression::from_location(location).decoder(download::open(location)?);
        let written = extract::unpack_tar(reader, staging, &self.strip_prefix)?;
        tracing::debug!("extracted {} entries for {}", written, v);

        self.templates
            .lock()
            .with(|tg| self.templates.apply_templates_locked(tg, staging, v))?;
        Ok(())
    }

    fn swap_in(&self, staging: &Path, v: Version) -> Result<()> {
        let target = self.layout.version_dir(v);
        let previous = match fs::symlink_metadata(&target) {
            Ok(_) => {
                let aside = self
                    .layout
                    .staging_dir(v, &format!("old-{}", Uuid::new_v4().simple()));
                if let Err(e) = fs::rename(&target, &aside) {
                    discard(staging);
                    return Err(e.into());
                }
                Some(aside)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => None,
            Err(e) => {
                discard(staging);
                return Err(e.into());
            }
        };

        if let Err(e) = fs::rename(staging, &target) {
            if let Some(aside) = &previous {
                if let Err(restore) = fs::rename(aside, &target) {
                    tracing::error!(
                        "could not restore {} from {}: {}",
                        target.display(),
                        aside.display(),
                        restore
                    );
                }
            }
            discard(staging);
            return Err(e.into());
        }

        if let Some(aside) = previous {
            discard(&aside);
        }
        Ok(())
    }

    /// Makes `v` the active version, installing it first if needed.
    pub fn use_version(&mut self, v: Version) -> Result<()> {
        let lock = self.lock.clone();
        lock.with(|guard| {
            if !self.installed.contains(&v) {
                self.install_locked(guard, v)?;
            }
            self.point_used_locked(guard, v)
        })
    }

    fn point_used_locked(&mut self, _guard: &LockGuard, v: Version) -> Result<()> {
        let used = self.layout.used_link();
        let tmp = self
            .layout
            .work_root
            .join(format!(".used-{}", Uuid::new_v4().simple()));
        symlink(v.to_string(), &tmp)?;
        if let Err(e) = fs::rename(&tmp, &used) {
            let _ = fs::remove_file(&tmp);
            return Err(e.into());
        }
        self.in_use = Some(v);
        tracing::info!("now using {}", v);
        Ok(())
    }

    /// Reconciles every installed tree with the current template rules,
    /// stopping at the first failure. The set of trees is re-read from disk
    /// under the work-root lock. Retired templates are forgotten once every
    /// tree has been reconciled, within the same templates lock.
    pub fn apply_all_templates(&mut self) -> Result<Vec<(Version, ApplyReport)>> {
        let lock = self.lock.clone();
        lock.with(|_guard| {
            self.installed = scan_installed(&self.layout.work_root)?;
            let templates = &self.templates;
            templates.lock().with(|tg| {
                let reports = self
                    .installed
                    .iter()
                    .map(|&v| {
                        let root = self.layout.version_dir(v);
                        templates
                            .apply_templates_locked(tg, &root, v)
                            .map(|report| (v, report))
                    })
                    .collect::<Result<Vec<_>>>()?;
                templates.prune_retired_locked(tg)?;
                Ok(reports)
            })
        })
    }
}

fn discard(dir: &Path) {
    if let Err(e) = fs::remove_dir_all(dir) {
        if e.kind() != ErrorKind::NotFound {
            tracing::warn!("could not remove {}: {}", dir.display(), e);
        }
    }
}

fn scan_installed(work_root: &Path) -> Result<BTreeSet<Version>> {
    let mut installed = BTreeSet::new();
    for entry in fs::read_dir(work_root)? {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        let name = entry.file_name();
        if let Some(v) = name.to_str().and_then(|n| Version::parse(n).ok()) {
            installed.insert(v);
        }
    }
    Ok(installed)
}

fn read_used(used: &Path) -> Result<Option<Version>> {
    let meta = match fs::symlink_metadata(used) {
        Ok(meta) => meta,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    if !meta.file_type().is_symlink() {
        return Err(ManagerError::Integrity(format!(
            "{} exists but is not a symlink",
            used.display()
        )));
    }
    let target = fs::read_link(used)?;
    // Only a bare sibling name such as `2021.0.0` is a valid pointer.
    let mut components = target.components();
    let name = match (components.next(), components.next()) {
        (Some(Component::Normal(name)), None) => name.to_str().unwrap_or_default(),
        _ => "",
    };
    Version::parse(name).map(Some).map_err(|_| {
        ManagerError::Integrity(format!(
            "{} points at {}, which is not a version directory",
            used.display(),
            target.display()
        ))
    })
}
