//! JSON-backed catalog of backup and recovery attempts
//!
//! Each list lives in its own document and is rewritten atomically on
//! append. Appends within the process are serialized by one mutex.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use super::record::{BackupRecord, BackupStatus, RecoveryRecord, RecoveryStatus};
use crate::error::{EsgError, EsgResult};
use crate::storage::file_io::{read_json, write_json_atomic};

#[derive(Debug, Default, Serialize, Deserialize)]
struct BackupData {
    backups: Vec<BackupRecord>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct RecoveryData {
    recoveries: Vec<RecoveryRecord>,
}

/// Durable history of backup and recovery attempts
pub struct BackupCatalog {
    backups_path: PathBuf,
    recoveries_path: PathBuf,
    write_lock: Mutex<()>,
}

impl BackupCatalog {
    pub fn new(backups_path: PathBuf, recoveries_path: PathBuf) -> Self {
        Self {
            backups_path,
            recoveries_path,
            write_lock: Mutex::new(()),
        }
    }

    /// Append a backup record, assigning its id
    pub fn append_backup(&self, mut record: BackupRecord) -> EsgResult<BackupRecord> {
        let _guard = self.lock()?;
        let mut data: BackupData = read_json(&self.backups_path)?;

        record.id = data.backups.iter().map(|r| r.id).max().unwrap_or(0) + 1;
        data.backups.push(record.clone());

        write_json_atomic(&self.backups_path, &data)?;
        Ok(record)
    }

    /// Append a recovery record, assigning its id
    pub fn append_recovery(&self, mut record: RecoveryRecord) -> EsgResult<RecoveryRecord> {
        let _guard = self.lock()?;
        let mut data: RecoveryData = read_json(&self.recoveries_path)?;

        record.id = data.recoveries.iter().map(|r| r.id).max().unwrap_or(0) + 1;
        data.recoveries.push(record.clone());

        write_json_atomic(&self.recoveries_path, &data)?;
        Ok(record)
    }

    /// Backups newest first, optionally filtered by status
    pub fn list_backups(
        &self,
        limit: Option<usize>,
        status: Option<BackupStatus>,
    ) -> EsgResult<Vec<BackupRecord>> {
        let data: BackupData = read_json(&self.backups_path)?;

        let mut backups: Vec<_> = data
            .backups
            .into_iter()
            .filter(|r| status.map_or(true, |s| r.status == s))
            .collect();
        backups.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        if let Some(limit) = limit {
            backups.truncate(limit);
        }

        Ok(backups)
    }

    /// Recoveries newest first, optionally filtered by status
    pub fn list_recoveries(
        &self,
        limit: Option<usize>,
        status: Option<RecoveryStatus>,
    ) -> EsgResult<Vec<RecoveryRecord>> {
        let data: RecoveryData = read_json(&self.recoveries_path)?;

        let mut recoveries: Vec<_> = data
            .recoveries
            .into_iter()
            .filter(|r| status.map_or(true, |s| r.status == s))
            .collect();
        recoveries.sort_by(|a, b| b.restored_at.cmp(&a.restored_at).then(b.id.cmp(&a.id)));
        if let Some(limit) = limit {
            recoveries.truncate(limit);
        }

        Ok(recoveries)
    }

    pub fn get_backup(&self, id: u64) -> EsgResult<Option<BackupRecord>> {
        let data: BackupData = read_json(&self.backups_path)?;
        Ok(data.backups.into_iter().find(|r| r.id == id))
    }

    /// Find the completed backup that produced the archive at `path`
    pub fn find_backup_by_path(&self, path: &Path) -> EsgResult<Option<BackupRecord>> {
        let wanted = normalize(path);
        let data: BackupData = read_json(&self.backups_path)?;

        Ok(data.backups.into_iter().rev().find(|r| {
            r.archive_path
                .as_deref()
                .map_or(false, |p| normalize(p) == wanted)
        }))
    }

    fn lock(&self) -> EsgResult<std::sync::MutexGuard<'_, ()>> {
        self.write_lock
            .lock()
            .map_err(|e| EsgError::Storage(format!("Failed to acquire catalog lock: {}", e)))
    }
}

fn normalize(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| path.to_path_buf())
}
