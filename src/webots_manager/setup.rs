//! One-time bootstrap of the public home link.
//!
//! The home link (`/usr/local/webots` by default) points at `<work_root>/used`
//! and is never rewritten afterwards: switching versions only replaces
//! `used`. Creating a dedicated system group for shared installs is left
//! to the administrator.

use crate::config::{Layout, HOME_ENV};
use crate::error::{ManagerError, Result};
use std::env;
use std::fs;
use std::io::ErrorKind;
use std::os::unix::fs::symlink;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HomeLinkStatus {
    Created,
    AlreadyPresent,
}

/// Creates the work root and `home_link -> <work_root>/used` when missing.
pub fn ensure_home_link(layout: &Layout) -> Result<HomeLinkStatus> {
    fs::create_dir_all(&layout.work_root)?;
    let expected = layout.used_link();

    match fs::symlink_metadata(&layout.home_link) {
        Ok(meta) if meta.file_type().is_symlink() => {
            let current = fs::read_link(&layout.home_link)?;
            if current == expected {
                Ok(HomeLinkStatus::AlreadyPresent)
            } else {
                Err(ManagerError::Integrity(format!(
                    "{} points at {} instead of {}",
                    layout.home_link.display(),
                    current.display(),
                    expected.display()
                )))
            }
        }
        Ok(_) => Err(ManagerError::AlreadyExists(format!(
            "{} exists and is not a symlink",
            layout.home_link.display()
        ))),
        Err(e) if e.kind() == ErrorKind::NotFound => {
            if let Some(parent) = layout.home_link.parent() {
                fs::create_dir_all(parent)?;
            }
            symlink(&expected, &layout.home_link)?;
            tracing::info!(
                "linked {} -> {}",
                layout.home_link.display(),
                expected.display()
            );
            Ok(HomeLinkStatus::Created)
        }
        Err(e) => Err(e.into()),
    }
}

/// Advice about `WEBOTS_HOME`, or `None` when it already names the home link.
pub fn check_home_env(layout: &Layout) -> Option<String> {
    home_env_advice(env::var_os(HOME_ENV).as_deref().map(Path::new), layout)
}

fn home_env_advice(value: Option<&Path>, layout: &Layout) -> Option<String> {
    let home = layout.home_link.display();
    match value {
        None => Some(format!(
            "{} is not set; add `export {}={}` to your shell profile",
            HOME_ENV, HOME_ENV, home
        )),
        Some(v) if v == layout.home_link => None,
        Some(v) => Some(format!(
            "{} is {} but the managed installation lives at {}",
            HOME_ENV,
            v.display(),
            home
        )),
    }
}
