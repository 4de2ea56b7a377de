//! Process-wide mutual exclusion per backup directory
//!
//! Every coordinator working on the same backup directory shares one mutex,
//! so a scheduled backup, a manual backup and a restore never interleave,
//! even when they were built from separate `BackupSystem` instances.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock};

static DIRECTORY_LOCKS: OnceLock<Mutex<HashMap<PathBuf, Arc<Mutex<()>>>>> = OnceLock::new();

/// Handle to the mutex guarding one backup directory
#[derive(Clone)]
pub struct DirectoryLock {
    inner: Arc<Mutex<()>>,
}

impl DirectoryLock {
    /// Get the shared lock for `dir`
    pub fn for_dir(dir: &Path) -> Self {
        let key = dir.canonicalize().unwrap_or_else(|_| dir.to_path_buf());
        let registry = DIRECTORY_LOCKS.get_or_init(|| Mutex::new(HashMap::new()));
        let mut locks = registry.lock().unwrap_or_else(|e| e.into_inner());
        let inner = locks.entry(key).or_default().clone();
        Self { inner }
    }

    /// Block until the directory is free
    pub fn acquire(&self) -> MutexGuard<'_, ()> {
        // The guarded value is (), so a panic in a previous holder left
        // nothing inconsistent behind.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Take the lock only if nobody holds it
    pub fn try_acquire(&self) -> Option<MutexGuard<'_, ()>> {
        match self.inner.try_lock() {
            Ok(guard) => Some(guard),
            Err(std::sync::TryLockError::Poisoned(e)) => Some(e.into_inner()),
            Err(std::sync::TryLockError::WouldBlock) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_same_dir_shares_lock() {
        let temp = TempDir::new().unwrap();
        let a = DirectoryLock::for_dir(temp.path());
        let b = DirectoryLock::for_dir(temp.path());

        let _guard = a.acquire();
        assert!(b.try_acquire().is_none());
    }

    #[test]
    fn test_different_dirs_are_independent() {
        let first = TempDir::new().unwrap();
        let second = TempDir::new().unwrap();
        let a = DirectoryLock::for_dir(first.path());
        let b = DirectoryLock::for_dir(second.path());

        let _guard = a.acquire();
        assert!(b.try_acquire().is_some());
    }
}
