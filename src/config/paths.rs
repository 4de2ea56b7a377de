//! Path management for esg-backup
//!
//! Resolves where the primary database, the file source directories, the
//! loose config files, the archives and the catalog live.
//!
//! ## Path Resolution Order
//!
//! 1. `ESG_BACKUP_HOME` environment variable (if set)
//! 2. Unix (Linux/macOS): `$XDG_DATA_HOME/esg-backup` or `~/.local/share/esg-backup`
//! 3. Windows: `%APPDATA%\esg-backup`

use std::path::{Path, PathBuf};

use crate::error::EsgError;

/// File name of the primary database inside the data directory
pub const DATABASE_FILE: &str = "esg.db";

/// Source directories included in full and files-only backups
pub const DEFAULT_SOURCE_DIRS: [&str; 3] = ["uploads", "reports", "exports"];

/// A directory tree to archive under `files/<name>/`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirSpec {
    /// Destination name inside the archive
    pub name: String,
    /// Directory on disk
    pub path: PathBuf,
}

impl DirSpec {
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
        }
    }
}

/// Manages all paths used by esg-backup
#[derive(Debug, Clone)]
pub struct EsgPaths {
    /// Base directory for all esg-backup data
    base_dir: PathBuf,
    /// Explicit database location, if not the default under `data/`
    database_override: Option<PathBuf>,
    /// Explicit source directories, if not the defaults under `data/`
    sources_override: Option<Vec<DirSpec>>,
}

impl EsgPaths {
    /// Create a new EsgPaths instance
    ///
    /// # Errors
    ///
    /// Returns an error if no home or application data directory can be determined.
    pub fn new() -> Result<Self, EsgError> {
        let base_dir = if let Ok(custom) = std::env::var("ESG_BACKUP_HOME") {
            PathBuf::from(custom)
        } else {
            resolve_default_path()?
        };

        Ok(Self::with_base_dir(base_dir))
    }

    /// Create EsgPaths with a custom base directory (useful for testing)
    pub fn with_base_dir(base_dir: PathBuf) -> Self {
        Self {
            base_dir,
            database_override: None,
            sources_override: None,
        }
    }

    /// Use a database file outside the default data directory
    pub fn with_database(mut self, path: impl Into<PathBuf>) -> Self {
        self.database_override = Some(path.into());
        self
    }

    /// Replace the set of named source directories
    pub fn with_sources(mut self, sources: Vec<DirSpec>) -> Self {
        self.sources_override = Some(sources);
        self
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Get the data directory (holds the database and the default sources)
    pub fn data_dir(&self) -> PathBuf {
        self.base_dir.join("data")
    }

    /// Get the primary database file path
    pub fn database_file(&self) -> PathBuf {
        self.database_override
            .clone()
            .unwrap_or_else(|| self.data_dir().join(DATABASE_FILE))
    }

    /// Get the named source directories archived under `files/`
    pub fn source_dirs(&self) -> Vec<DirSpec> {
        match &self.sources_override {
            Some(sources) => sources.clone(),
            None => DEFAULT_SOURCE_DIRS
                .iter()
                .map(|name| DirSpec::new(*name, self.data_dir().join(name)))
                .collect(),
        }
    }

    /// Look up a source directory by its archive name
    pub fn source_dir(&self, name: &str) -> Option<PathBuf> {
        self.source_dirs()
            .into_iter()
            .find(|spec| spec.name == name)
            .map(|spec| spec.path)
    }

    /// Get the directory of loose config files archived under `config/`
    pub fn config_dir(&self) -> PathBuf {
        self.base_dir.join("config")
    }

    /// Get the backup directory where archives are written
    pub fn backup_dir(&self) -> PathBuf {
        self.base_dir.join("backups")
    }

    /// Get the path to the persisted BackupConfig
    pub fn settings_file(&self) -> PathBuf {
        self.base_dir.join("backup_config.json")
    }

    /// Get the catalog directory
    pub fn catalog_dir(&self) -> PathBuf {
        self.base_dir.join("catalog")
    }

    /// Get the path to the backup history
    pub fn backup_catalog_file(&self) -> PathBuf {
        self.catalog_dir().join("backups.json")
    }

    /// Get the path to the recovery history
    pub fn recovery_catalog_file(&self) -> PathBuf {
        self.catalog_dir().join("recoveries.json")
    }

    /// Ensure the directories this subsystem writes into exist
    ///
    /// Creates the base, backup and catalog directories. Source and config
    /// directories belong to the application and are left alone.
    pub fn ensure_directories(&self) -> Result<(), EsgError> {
        std::fs::create_dir_all(&self.base_dir)
            .map_err(|e| EsgError::Io(format!("Failed to create base directory: {}", e)))?;

        std::fs::create_dir_all(self.backup_dir())
            .map_err(|e| EsgError::Io(format!("Failed to create backup directory: {}", e)))?;

        std::fs::create_dir_all(self.catalog_dir())
            .map_err(|e| EsgError::Io(format!("Failed to create catalog directory: {}", e)))?;

        Ok(())
    }
}

/// Resolve the default data directory path based on platform
#[cfg(not(windows))]
fn resolve_default_path() -> Result<PathBuf, EsgError> {
    if let Ok(xdg) = std::env::var("XDG_DATA_HOME") {
        return Ok(PathBuf::from(xdg).join("esg-backup"));
    }
    let home = std::env::var("HOME")
        .map_err(|_| EsgError::Config("Could not determine HOME directory".into()))?;
    Ok(PathBuf::from(home)
        .join(".local")
        .join("share")
        .join("esg-backup"))
}

/// Resolve the default data directory path based on platform
#[cfg(windows)]
fn resolve_default_path() -> Result<PathBuf, EsgError> {
    let appdata = std::env::var("APPDATA")
        .map_err(|_| EsgError::Config("Could not determine APPDATA directory".into()))?;
    Ok(PathBuf::from(appdata).join("esg-backup"))
}
