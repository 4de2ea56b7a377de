//! Archive file naming
//!
//! Archives are named `backup_{type}_{YYYYMMDD_HHMMSS}.zip` (UTC). A second
//! archive within the same second gets a `_{n}` suffix. Names sort by
//! (timestamp, sequence) once parsed, which is what retention relies on.

use chrono::{DateTime, NaiveDateTime, Utc};

use crate::catalog::BackupKind;

pub const ARCHIVE_EXTENSION: &str = "zip";

const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";
const TIMESTAMP_LEN: usize = 15;

/// Backup name without extension, e.g. `backup_full_20250601_020000`
pub fn backup_name(kind: BackupKind, timestamp: DateTime<Utc>) -> String {
    format!("backup_{}_{}", kind, timestamp.format(TIMESTAMP_FORMAT))
}

/// Archive file name for a backup name
pub fn archive_file_name(name: &str) -> String {
    format!("{}.{}", name, ARCHIVE_EXTENSION)
}

/// Structured form of an archive file name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveName {
    pub kind: BackupKind,
    pub timestamp: NaiveDateTime,
    /// Collision suffix; 0 when absent
    pub sequence: u32,
}

impl ArchiveName {
    /// Parse an archive file name; `None` if it does not follow the convention
    pub fn parse(file_name: &str) -> Option<Self> {
        let stem = file_name
            .strip_prefix("backup_")?
            .strip_suffix(&format!(".{}", ARCHIVE_EXTENSION))?;

        let (kind, rest) = BackupKind::ALL.into_iter().find_map(|kind| {
            stem.strip_prefix(kind.as_str())
                .and_then(|rest| rest.strip_prefix('_'))
                .map(|rest| (kind, rest))
        })?;

        let stamp = rest.get(..TIMESTAMP_LEN)?;
        let timestamp = NaiveDateTime::parse_from_str(stamp, TIMESTAMP_FORMAT).ok()?;

        let sequence = match &rest[TIMESTAMP_LEN..] {
            "" => 0,
            suffix => suffix.strip_prefix('_')?.parse().ok()?,
        };

        Some(Self {
            kind,
            timestamp,
            sequence,
        })
    }

    /// Ordering key, oldest first
    pub fn sort_key(&self) -> (NaiveDateTime, u32) {
        (self.timestamp, self.sequence)
    }
}
