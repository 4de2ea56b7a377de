//! esg-backup - Backup and recovery for the ESG reporting datastore
//!
//! This library archives the primary database together with its upload,
//! report and export directories, keeps a bounded history of archives,
//! restores from a chosen archive behind a safety snapshot, and runs the
//! whole thing unattended on a schedule.
//!
//! # Architecture
//!
//! The crate is organized into the following modules:
//!
//! - `config`: Paths, BackupConfig and its store
//! - `error`: Custom error types
//! - `storage`: Atomic JSON and file helpers
//! - `catalog`: Persisted backup and recovery history
//! - `archive`: The zip archive format, writer and reader
//! - `backup`: Backup and restore coordinators, retention
//! - `scheduler`: Background scheduled backups
//! - `system`: `BackupSystem`, the assembled subsystem
//! - `cli` / `display`: Command handlers and terminal formatting
//!
//! # Example
//!
//! ```rust,ignore
//! use esg_backup::{BackupKind, BackupSystem, EsgPaths};
//!
//! let system = BackupSystem::open(EsgPaths::new()?)?;
//! let outcome = system.create_backup(BackupKind::Full, "admin", true)?;
//! println!("{}", outcome.record.name);
//! ```

pub mod archive;
pub mod backup;
pub mod catalog;
pub mod cli;
pub mod config;
pub mod display;
pub mod error;
pub mod scheduler;
pub mod storage;
pub mod system;

pub use catalog::{BackupKind, BackupRecord, RecoveryRecord};
pub use config::{BackupConfig, EsgPaths};
pub use error::{EsgError, EsgResult};
pub use system::BackupSystem;
