use crate::version::Version;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ManagerError {
    #[error("Invalid version syntax '{0}'")]
    Parse(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Already exists: {0}")]
    AlreadyExists(String),

    #[error("Could not lock {}: {}", path.display(), describe_holder(holder))]
    LockContention {
        path: PathBuf,
        holder: Option<String>,
    },

    #[error("Integrity error: {0}")]
    Integrity(String),

    /// The lock file could not be removed. Persisted state may no longer be
    /// protected, so callers must stop instead of carrying on.
    #[error("FATAL: could not release lock {}: {source}", path.display())]
    LockRelease {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Archive error: {0}")]
    Archive(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl ManagerError {
    pub fn version_not_found(v: Version) -> Self {
        ManagerError::NotFound(format!("version {}", v))
    }

    pub fn template_not_found(install_path: &str) -> Self {
        ManagerError::NotFound(format!("template {}", install_path))
    }

    /// True when the process must not continue with any further operation.
    pub fn is_fatal(&self) -> bool {
        matches!(self, ManagerError::LockRelease { .. })
    }
}

fn describe_holder(holder: &Option<String>) -> String {
    match holder {
        Some(h) => format!("held by {}", h),
        None => "held by another process".to_string(),
    }
}

pub type Result<T> = std::result::Result<T, ManagerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_lock_release_is_fatal() {
        let release = ManagerError::LockRelease {
            path: PathBuf::from("/tmp/x.lock"),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        };
        assert!(release.is_fatal());
        assert!(!ManagerError::Integrity("x".into()).is_fatal());
        assert!(!ManagerError::LockContention {
            path: PathBuf::from("/tmp/x.lock"),
            holder: None
        }
        .is_fatal());
    }

    #[test]
    fn test_contention_message_names_holder() {
        let err = ManagerError::LockContention {
            path: PathBuf::from("/w/global.lock"),
            holder: Some("pid 42".into()),
        };
        let msg = err.to_string();
        assert!(msg.contains("/w/global.lock"));
        assert!(msg.contains("pid 42"));
    }
}
