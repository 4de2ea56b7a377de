//! Backup and restore orchestration
//!
//! # Architecture
//!
//! - `BackupCoordinator`: writes an archive, records the attempt, prunes
//! - `RestoreCoordinator`: verifies, snapshots, extracts, records the attempt
//! - `retention`: keeps the newest `maxBackups` archives
//!
//! Both coordinators take the same per-directory lock, so at most one
//! archive operation touches a backup directory at a time.
//!
//! # Retention Policy
//!
//! Pruning deletes archive files only. Catalog rows are history and are
//! never removed, so a pruned backup keeps its row with a dangling path.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use esg_backup::backup::{BackupCoordinator, RestoreCoordinator};
//! use esg_backup::catalog::{BackupCatalog, BackupKind};
//! use esg_backup::config::{ConfigStore, EsgPaths};
//!
//! let paths = EsgPaths::new()?;
//! let config = Arc::new(ConfigStore::new(paths.settings_file()));
//! let catalog = Arc::new(BackupCatalog::new(
//!     paths.backup_catalog_file(),
//!     paths.recovery_catalog_file(),
//! ));
//!
//! let backups = BackupCoordinator::new(paths.clone(), config, catalog.clone());
//! let outcome = backups.create_backup(BackupKind::Full, "admin", true)?;
//!
//! let restores = RestoreCoordinator::new(paths, catalog);
//! let archive = outcome.record.archive_path.unwrap();
//! let recovery = restores.restore_backup(&archive, "admin")?;
//! ```

mod coordinator;
mod lock;
pub mod naming;
mod restore;
pub mod retention;

pub use coordinator::{BackupCoordinator, BackupOutcome};
pub use lock::DirectoryLock;
pub use naming::ArchiveName;
pub use restore::{take_snapshot, RestoreCoordinator};
pub use retention::{ArchiveFile, PruneReport};
