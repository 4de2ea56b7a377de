//! Backup catalog for esg-backup
//!
//! The durable, append-mostly history of what happened: one BackupRecord
//! per backup attempt and one RecoveryRecord per restore attempt. Records
//! are only written once an attempt reaches its terminal state, so the
//! catalog never claims an archive that has not been fully flushed.
//!
//! Retention removes archive files but never catalog rows.

mod record;
mod store;

pub use record::{BackupKind, BackupRecord, BackupStatus, RecoveryRecord, RecoveryStatus};
pub use store::BackupCatalog;
