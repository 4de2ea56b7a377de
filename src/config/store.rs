//! Durable store for the singleton BackupConfig

use std::path::PathBuf;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use tracing::warn;

use super::settings::BackupConfig;
use crate::error::{EsgError, EsgResult};
use crate::storage::file_io::{read_json_required, write_json_atomic};

/// File-backed BackupConfig with defaults for a missing file
pub struct ConfigStore {
    path: PathBuf,
    /// Serializes read-modify-write cycles within the process
    write_lock: Mutex<()>,
}

impl ConfigStore {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            write_lock: Mutex::new(()),
        }
    }

    /// Read the current configuration
    ///
    /// Never fails: a missing file yields the defaults, and an unreadable or
    /// corrupt file is logged and also yields the defaults.
    pub fn get(&self) -> BackupConfig {
        if !self.path.exists() {
            return BackupConfig::default();
        }

        match read_json_required::<BackupConfig, _>(&self.path) {
            Ok(config) => config,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "backup config unreadable, using defaults");
                BackupConfig::default()
            }
        }
    }

    /// Replace the user-editable configuration
    ///
    /// `lastBackupAt` belongs to the scheduler: the stored value is kept and
    /// whatever the caller passes for it is ignored, so a config read before
    /// a scheduled run cannot roll the stamp back.
    pub fn update(&self, mut config: BackupConfig) -> EsgResult<()> {
        config.validate()?;
        let _guard = self
            .write_lock
            .lock()
            .map_err(|e| EsgError::Storage(format!("Failed to acquire config lock: {}", e)))?;
        config.last_backup_at = self.get().last_backup_at;
        write_json_atomic(&self.path, &config)
    }

    /// Stamp `lastBackupAt`, keeping every other field as stored
    pub fn record_backup_at(&self, at: DateTime<Utc>) -> EsgResult<BackupConfig> {
        let _guard = self
            .write_lock
            .lock()
            .map_err(|e| EsgError::Storage(format!("Failed to acquire config lock: {}", e)))?;
        let mut config = self.get();
        config.last_backup_at = Some(at);
        write_json_atomic(&self.path, &config)?;
        Ok(config)
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }
}
