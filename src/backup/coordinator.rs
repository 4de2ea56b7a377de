//! Backup coordinator
//!
//! Runs one backup attempt end to end: write the archive, record the
//! attempt in the catalog, then enforce retention. Attempts on the same
//! backup directory are serialized by [`DirectoryLock`].

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{error, info, warn};

use super::lock::DirectoryLock;
use super::naming::{archive_file_name, backup_name};
use super::retention::{self, ArchiveFile, PruneReport};
use crate::archive::{ArchiveWriter, WriteSummary};
use crate::catalog::{BackupCatalog, BackupKind, BackupRecord};
use crate::config::{ConfigStore, EsgPaths};
use crate::error::EsgResult;
use crate::storage::file_io::unique_path;

/// Result of a successful backup attempt
#[derive(Debug, Clone)]
pub struct BackupOutcome {
    /// The catalog row for this attempt (warnings included)
    pub record: BackupRecord,
    /// What retention removed afterwards
    pub pruned: PruneReport,
}

/// Creates backups and enforces retention
pub struct BackupCoordinator {
    paths: EsgPaths,
    config: Arc<ConfigStore>,
    catalog: Arc<BackupCatalog>,
}

impl BackupCoordinator {
    pub fn new(paths: EsgPaths, config: Arc<ConfigStore>, catalog: Arc<BackupCatalog>) -> Self {
        Self {
            paths,
            config,
            catalog,
        }
    }

    /// Create a backup of the given kind
    ///
    /// Exactly one BackupRecord is appended per call. On a hard failure the
    /// failed record is persisted before the error is returned. Retention
    /// runs in both cases.
    pub fn create_backup(
        &self,
        kind: BackupKind,
        created_by: &str,
        include_files: bool,
    ) -> EsgResult<BackupOutcome> {
        self.create_backup_at(kind, created_by, include_files, Utc::now())
    }

    /// Create a backup stamped with `now`
    pub fn create_backup_at(
        &self,
        kind: BackupKind,
        created_by: &str,
        include_files: bool,
        now: DateTime<Utc>,
    ) -> EsgResult<BackupOutcome> {
        let backup_dir = self.paths.backup_dir();
        if let Err(e) = fs::create_dir_all(&backup_dir) {
            warn!(dir = %backup_dir.display(), error = %e, "could not create backup directory");
        }

        let lock = DirectoryLock::for_dir(&backup_dir);
        let _guard = lock.acquire();

        let config = self.config.get();
        let include_files = include_files && config.include_files && kind.includes_files();
        let name = backup_name(kind, now);

        info!(%kind, %created_by, include_files, "starting backup");

        let written = self.write_archive(kind, include_files, config.compress, &backup_dir, &name);

        let (mut record, failure) = match written {
            Ok((archive_path, summary)) => {
                for warning in &summary.warnings {
                    warn!(backup = %name, "skipped during backup: {}", warning);
                }
                let final_name = archive_path
                    .file_stem()
                    .map(|s| s.to_string_lossy().to_string())
                    .unwrap_or_else(|| name.clone());
                info!(
                    backup = %final_name,
                    bytes = summary.bytes_written,
                    entries = summary.entries,
                    warnings = summary.warnings.len(),
                    "backup completed"
                );
                let record = BackupRecord::completed(
                    final_name,
                    kind,
                    archive_path,
                    summary.bytes_written,
                    created_by,
                    summary.warnings,
                );
                (record, None)
            }
            Err(e) => {
                error!(backup = %name, error = %e, "backup failed");
                let record = BackupRecord::failed(&name, kind, e.to_string(), created_by);
                (record, Some(e))
            }
        };
        record.created_at = now;

        let stored = self.catalog.append_backup(record);
        if let Err(e) = &stored {
            error!(backup = %name, error = %e, "failed to record backup in catalog");
        }

        let pruned = self.prune_locked(&backup_dir, config.max_backups);

        if let Some(e) = failure {
            return Err(e);
        }
        Ok(BackupOutcome {
            record: stored?,
            pruned,
        })
    }

    /// Apply retention now, outside of a backup
    pub fn prune(&self) -> EsgResult<PruneReport> {
        let backup_dir = self.paths.backup_dir();
        let lock = DirectoryLock::for_dir(&backup_dir);
        let _guard = lock.acquire();

        retention::prune(&backup_dir, self.config.get().max_backups)
    }

    /// Archives currently on disk, newest first
    pub fn list_archives(&self) -> EsgResult<Vec<ArchiveFile>> {
        retention::list_archives(&self.paths.backup_dir())
    }

    fn write_archive(
        &self,
        kind: BackupKind,
        include_files: bool,
        compress: bool,
        backup_dir: &Path,
        name: &str,
    ) -> EsgResult<(PathBuf, WriteSummary)> {
        let archive_path = unique_path(&backup_dir.join(archive_file_name(name)));

        let database = kind
            .includes_database()
            .then(|| self.paths.database_file());
        let sources = if include_files {
            self.paths.source_dirs()
        } else {
            Vec::new()
        };
        let (config_files, mut warnings) = collect_config_files(&self.paths.config_dir());

        let mut summary = ArchiveWriter::new(compress).write(
            &archive_path,
            database.as_deref(),
            &sources,
            &config_files,
        )?;
        warnings.append(&mut summary.warnings);
        summary.warnings = warnings;

        Ok((archive_path, summary))
    }

    fn prune_locked(&self, backup_dir: &Path, max_backups: u32) -> PruneReport {
        match retention::prune(backup_dir, max_backups) {
            Ok(report) => {
                for failure in &report.failures {
                    warn!("retention could not delete {}", failure);
                }
                report
            }
            Err(e) => {
                error!(error = %e, "retention pass failed");
                PruneReport::default()
            }
        }
    }
}

/// Loose files directly inside the config directory
///
/// A missing directory yields nothing; a directory that cannot be listed
/// yields a warning.
fn collect_config_files(config_dir: &Path) -> (Vec<PathBuf>, Vec<String>) {
    if !config_dir.exists() {
        return (Vec::new(), Vec::new());
    }

    let entries = match fs::read_dir(config_dir) {
        Ok(entries) => entries,
        Err(e) => return (Vec::new(), vec![format!("{}: {}", config_dir.display(), e)]),
    };

    let mut files = Vec::new();
    let mut warnings = Vec::new();
    for entry in entries {
        match entry {
            Ok(entry) if entry.path().is_file() => files.push(entry.path()),
            Ok(_) => {}
            Err(e) => warnings.push(format!("{}: {}", config_dir.display(), e)),
        }
    }
    files.sort();

    (files, warnings)
}
