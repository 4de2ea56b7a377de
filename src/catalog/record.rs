//! Catalog record types
//!
//! One BackupRecord per backup attempt and one RecoveryRecord per restore
//! attempt. Records are written once, in their terminal state.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::EsgError;

/// What a backup archive contains
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackupKind {
    /// Database, file source directories and config files
    Full,
    /// Database and config files
    DatabaseOnly,
    /// File source directories and config files
    FilesOnly,
}

impl BackupKind {
    pub const ALL: [BackupKind; 3] = [Self::Full, Self::DatabaseOnly, Self::FilesOnly];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::DatabaseOnly => "database_only",
            Self::FilesOnly => "files_only",
        }
    }

    pub fn includes_database(&self) -> bool {
        matches!(self, Self::Full | Self::DatabaseOnly)
    }

    pub fn includes_files(&self) -> bool {
        matches!(self, Self::Full | Self::FilesOnly)
    }
}

impl fmt::Display for BackupKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackupKind {
    type Err = EsgError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == normalized)
            .ok_or_else(|| {
                EsgError::Validation(format!(
                    "Unknown backup type '{}': expected full, database_only or files_only",
                    s
                ))
            })
    }
}

/// Terminal state of a backup attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackupStatus {
    Completed,
    Failed,
}

impl fmt::Display for BackupStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

impl FromStr for BackupStatus {
    type Err = EsgError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            other => Err(EsgError::Validation(format!(
                "Unknown backup status '{}'",
                other
            ))),
        }
    }
}

/// Terminal state of a restore attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecoveryStatus {
    Success,
    Failed,
}

impl fmt::Display for RecoveryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success => write!(f, "success"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// One row per backup attempt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackupRecord {
    /// Surrogate key, assigned by the catalog
    pub id: u64,
    /// `backup_{type}_{timestamp}`
    pub name: String,
    #[serde(rename = "type")]
    pub kind: BackupKind,
    /// Archive size on disk; 0 when failed
    pub size_bytes: u64,
    /// Archive location; absent when the attempt failed
    pub archive_path: Option<PathBuf>,
    pub created_at: DateTime<Utc>,
    pub status: BackupStatus,
    pub error_message: Option<String>,
    /// User id, or `auto_scheduler` / `system_scheduler`
    pub created_by: String,
    /// Files skipped while archiving
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl BackupRecord {
    /// A successful attempt, ready to be appended to the catalog
    pub fn completed(
        name: impl Into<String>,
        kind: BackupKind,
        archive_path: PathBuf,
        size_bytes: u64,
        created_by: impl Into<String>,
        warnings: Vec<String>,
    ) -> Self {
        Self {
            id: 0,
            name: name.into(),
            kind,
            size_bytes,
            archive_path: Some(archive_path),
            created_at: Utc::now(),
            status: BackupStatus::Completed,
            error_message: None,
            created_by: created_by.into(),
            warnings,
        }
    }

    /// A failed attempt, ready to be appended to the catalog
    pub fn failed(
        name: impl Into<String>,
        kind: BackupKind,
        error_message: impl Into<String>,
        created_by: impl Into<String>,
    ) -> Self {
        Self {
            id: 0,
            name: name.into(),
            kind,
            size_bytes: 0,
            archive_path: None,
            created_at: Utc::now(),
            status: BackupStatus::Failed,
            error_message: Some(error_message.into()),
            created_by: created_by.into(),
            warnings: Vec::new(),
        }
    }

    pub fn is_completed(&self) -> bool {
        self.status == BackupStatus::Completed
    }
}

/// One row per restore attempt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecoveryRecord {
    pub id: u64,
    /// The BackupRecord whose archive was restored, if it could be matched
    pub backup_id: Option<u64>,
    pub archive_path: PathBuf,
    pub restored_at: DateTime<Utc>,
    pub status: RecoveryStatus,
    pub restored_by: String,
    /// Error detail on failure, extraction warnings on success
    pub notes: Option<String>,
    /// Copy of the live database taken before it was overwritten
    #[serde(default)]
    pub safety_snapshot: Option<PathBuf>,
}

impl RecoveryRecord {
    pub fn new(
        archive_path: PathBuf,
        backup_id: Option<u64>,
        status: RecoveryStatus,
        restored_by: impl Into<String>,
        notes: Option<String>,
        safety_snapshot: Option<PathBuf>,
    ) -> Self {
        Self {
            id: 0,
            backup_id,
            archive_path,
            restored_at: Utc::now(),
            status,
            restored_by: restored_by.into(),
            notes,
            safety_snapshot,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == RecoveryStatus::Success
    }

    /// Restored, but some files or config entries could not be written
    pub fn has_warnings(&self) -> bool {
        self.is_success() && self.notes.is_some()
    }
}
