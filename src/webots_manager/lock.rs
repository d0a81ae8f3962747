//! # Lock Guard
//!
//! Every mutation of on-disk state (version trees, the active pointer, the
//! template snapshot and its data files) happens while holding an advisory,
//! single-host lock. The lock is a file created with `O_EXCL` semantics
//! (`create_new`) and removed on release, so it works across independent
//! short-lived processes without any daemon.
//!
//! - Acquisition never waits: a held lock fails at once with
//!   [`ManagerError::LockContention`], naming whatever the holder wrote into the
//!   file (pid and acquisition time).
//! - Release must happen on every exit path. [`LockFile::with`] scopes the
//!   guard around a closure and releases it whether the closure succeeded or
//!   not. A guard dropped without an explicit release (unwinding) still
//!   removes its file.
//! - A failed release is reported as [`ManagerError::LockRelease`], which is
//!   fatal: the binary stops with a distinct exit status.
//! - The lock is not reentrant. Code that already holds it receives a
//!   `&LockGuard` and calls the `*_locked` entry points, which take the guard
//!   as proof of exclusivity instead of acquiring again.
//!
//! Stale lock files left behind by a crashed process are not cleared
//! automatically; the contention error tells the operator which file to
//! inspect.

use crate::error::{ManagerError, Result};
use chrono::Utc;
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct LockFile {
    path: PathBuf,
}

impl LockFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Non-blocking exclusive acquisition.
    pub fn try_acquire(&self) -> Result<LockGuard> {
        let mut file = match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&self.path)
        {
            Ok(f) => f,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                return Err(ManagerError::LockContention {
                    path: self.path.clone(),
                    holder: read_holder(&self.path),
                });
            }
            Err(e) => return Err(ManagerError::Io(e)),
        };

        let stamp = format!(
            "pid {} since {}\n",
            std::process::id(),
            Utc::now().to_rfc3339()
        );
        if let Err(e) = file.write_all(stamp.as_bytes()) {
            drop(file);
            let _ = fs::remove_file(&self.path);
            return Err(ManagerError::Io(e));
        }

        tracing::debug!("acquired lock {}", self.path.display());
        Ok(LockGuard {
            path: self.path.clone(),
            released: false,
        })
    }

    /// Runs `f` while holding the lock and releases it afterwards, whatever
    /// `f` returned. A release failure takes precedence over `f`'s result.
    pub fn with<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&LockGuard) -> Result<T>,
    {
        let guard = self.try_acquire()?;
        let outcome = f(&guard);
        if let Err(release_err) = guard.release() {
            if let Err(op_err) = &outcome {
                tracing::error!("operation failed before lock release: {}", op_err);
            }
            return Err(release_err);
        }
        outcome
    }
}

fn read_holder(path: &Path) -> Option<String> {
    fs::read_to_string(path)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Proof that the current process holds a [`LockFile`].
#[derive(Debug)]
pub struct LockGuard {
    path: PathBuf,
    released: bool,
}

impl LockGuard {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn release(mut self) -> Result<()> {
        self.released = true;
        fs::remove_file(&self.path).map_err(|source| ManagerError::LockRelease {
            path: self.path.clone(),
            source,
        })?;
        tracing::debug!("released lock {}", self.path.display());
        Ok(())
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        if let Err(e) = fs::remove_file(&self.path) {
            tracing::error!(
                "FATAL: could not release lock {}: {}",
                self.path.display(),
                e
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Barrier};
    use std::thread;
    use tempfile::TempDir;

    fn setup() -> (TempDir, LockFile) {
        let dir = TempDir::new().unwrap();
        let lock = LockFile::new(dir.path().join("global.lock"));
        (dir, lock)
    }

    #[test]
    fn test_acquire_creates_and_release_removes_file() {
        let (_dir, lock) = setup();
        let guard = lock.try_acquire().unwrap();
        assert!(lock.path().exists());
        let content = fs::read_to_string(lock.path()).unwrap();
        assert!(content.starts_with(&format!("pid {}", std::process::id())));

        guard.release().unwrap();
        assert!(!lock.path().exists());
    }

    #[test]
    fn test_second_acquire_fails_fast_with_contention() {
        let (_dir, lock) = setup();
        let _guard = lock.try_acquire().unwrap();

        match lock.try_acquire() {
            Err(ManagerError::LockContention { path, holder }) => {
                assert_eq!(path, lock.path());
                assert!(holder.unwrap().contains("pid"));
            }
            other => panic!("expected contention, got {:?}", other),
        }
    }

    #[test]
    fn test_lock_can_be_reacquired_after_release() {
        let (_dir, lock) = setup();
        lock.try_acquire().unwrap().release().unwrap();
        lock.try_acquire().unwrap().release().unwrap();
    }

    #[test]
    fn test_with_releases_on_error() {
        let (_dir, lock) = setup();
        let res: Result<()> = lock.with(|_| Err(ManagerError::NotFound("x".into())));
        assert!(matches!(res, Err(ManagerError::NotFound(_))));
        assert!(!lock.path().exists());
    }

    #[test]
    fn test_with_returns_value_and_releases() {
        let (_dir, lock) = setup();
        let value = lock.with(|guard| {
            assert!(guard.path().exists());
            Ok(7)
        });
        assert_eq!(value.unwrap(), 7);
        assert!(!lock.path().exists());
    }

    #[test]
    fn test_drop_releases() {
        let (_dir, lock) = setup();
        {
            let _guard = lock.try_acquire().unwrap();
        }
        assert!(!lock.path().exists());
    }

    #[test]
    fn test_release_failure_is_fatal() {
        let (_dir, lock) = setup();
        let res: Result<()> = lock.with(|guard| {
            fs::remove_file(guard.path()).unwrap();
            Ok(())
        });
        let err = res.unwrap_err();
        assert!(err.is_fatal(), "got {:?}", err);
    }

    #[test]
    fn test_concurrent_acquire_exactly_one_wins() {
        let (_dir, lock) = setup();
        let barrier = Arc::new(Barrier::new(2));

        let handles: Vec<_> = (0..2)
            .map(|_| {
                let lock = lock.clone();
                let barrier = barrier.clone();
                thread::spawn(move || {
                    barrier.wait();
                    lock.try_acquire()
                })
            })
            .collect();

        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        let won = results.iter().filter(|r| r.is_ok()).count();
        let contended = results
            .iter()
            .filter(|r| matches!(r, Err(ManagerError::LockContention { .. })))
            .count();
        assert_eq!(won, 1);
        assert_eq!(contended, 1);
    }
}
