//! Configuration module for esg-backup
//!
//! This module provides configuration management including:
//! - Path resolution for the database, sources, archives and catalog
//! - The persisted BackupConfig and its store

pub mod paths;
pub mod settings;
pub mod store;

pub use paths::{DirSpec, EsgPaths};
pub use settings::{BackupConfig, Frequency};
pub use store::ConfigStore;
