//! Restore coordinator
//!
//! A restore runs Validate → Snapshot → ExtractDB → ExtractFiles →
//! ExtractConfig → Log. Anything failing up to ExtractDB fails the restore.
//! File and config extraction are best-effort and only add notes.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, error, info, warn};

use super::lock::DirectoryLock;
use crate::archive::{self, ArchiveReader};
use crate::catalog::{BackupCatalog, RecoveryRecord, RecoveryStatus};
use crate::config::EsgPaths;
use crate::error::{EsgError, EsgResult};
use crate::storage::file_io::copy_synced;

const SNAPSHOT_TAG: &str = "pre_restore";

/// Restores archives over the live data
pub struct RestoreCoordinator {
    paths: EsgPaths,
    catalog: Arc<BackupCatalog>,
}

impl RestoreCoordinator {
    pub fn new(paths: EsgPaths, catalog: Arc<BackupCatalog>) -> Self {
        Self { paths, catalog }
    }

    /// Restore the archive at `archive_path`
    ///
    /// A RecoveryRecord is persisted in every case. On success the record may
    /// still carry notes listing files that could not be restored.
    pub fn restore_backup(
        &self,
        archive_path: &Path,
        restored_by: &str,
    ) -> EsgResult<RecoveryRecord> {
        let backup_dir = self.paths.backup_dir();
        let lock = DirectoryLock::for_dir(&backup_dir);
        let _guard = lock.acquire();

        let backup_id = match self.catalog.find_backup_by_path(archive_path) {
            Ok(found) => found.map(|record| record.id),
            Err(e) => {
                warn!(error = %e, "could not look up archive in catalog");
                None
            }
        };

        info!(archive = %archive_path.display(), %restored_by, "starting restore");

        match self.run(archive_path) {
            Ok((snapshot, warnings)) => {
                for warning in &warnings {
                    warn!(archive = %archive_path.display(), "not restored: {}", warning);
                }
                let notes = (!warnings.is_empty()).then(|| warnings.join("\n"));
                let record = RecoveryRecord::new(
                    archive_path.to_path_buf(),
                    backup_id,
                    RecoveryStatus::Success,
                    restored_by,
                    notes,
                    snapshot,
                );
                let record = self.catalog.append_recovery(record)?;
                info!(
                    archive = %archive_path.display(),
                    warnings = warnings.len(),
                    "restore completed"
                );
                Ok(record)
            }
            Err((snapshot, e)) => {
                error!(archive = %archive_path.display(), error = %e, "restore failed");
                let record = RecoveryRecord::new(
                    archive_path.to_path_buf(),
                    backup_id,
                    RecoveryStatus::Failed,
                    restored_by,
                    Some(e.to_string()),
                    snapshot,
                );
                if let Err(log_err) = self.catalog.append_recovery(record) {
                    error!(error = %log_err, "failed to record restore in catalog");
                }
                Err(e)
            }
        }
    }

    /// Steps up to and including extraction
    ///
    /// Returns the snapshot path (if one was taken) alongside either the
    /// extraction warnings or the fatal error.
    #[allow(clippy::type_complexity)]
    fn run(
        &self,
        archive_path: &Path,
    ) -> Result<(Option<PathBuf>, Vec<String>), (Option<PathBuf>, EsgError)> {
        let validation = archive::verify(archive_path);
        if let Some(problem) = validation.problem {
            return Err((
                None,
                EsgError::Restore(format!(
                    "{} cannot be restored: {}",
                    archive_path.display(),
                    problem
                )),
            ));
        }

        debug!(entries = validation.entry_count, "archive verified");

        let database = self.paths.database_file();
        let snapshot = take_snapshot(&database, Utc::now()).map_err(|e| (None, e))?;
        let mut warnings = Vec::new();
        if snapshot.is_none() {
            warnings.push(format!(
                "no live database at {}, safety snapshot skipped",
                database.display()
            ));
        }

        let mut reader = ArchiveReader::open(archive_path).map_err(|e| (snapshot.clone(), e))?;
        reader.extract_database(&database).map_err(|e| {
            (
                snapshot.clone(),
                EsgError::Restore(format!("Failed to restore database: {}", e)),
            )
        })?;

        info!(database = %database.display(), "database restored");

        let paths = &self.paths;
        match reader.extract_files(|dir| paths.source_dir(dir)) {
            Ok(mut summary) => warnings.append(&mut summary.warnings),
            Err(e) => warnings.push(format!("files: {}", e)),
        }
        match reader.extract_config(&paths.config_dir()) {
            Ok(mut summary) => warnings.append(&mut summary.warnings),
            Err(e) => warnings.push(format!("config: {}", e)),
        }

        Ok((snapshot, warnings))
    }
}

/// Copy the live database to `<db>.pre_restore_<timestamp>`
///
/// Returns `None` when there is no live database to protect.
pub fn take_snapshot(database: &Path, now: DateTime<Utc>) -> EsgResult<Option<PathBuf>> {
    if !database.exists() {
        return Ok(None);
    }

    let base = format!(
        "{}.{}_{}",
        database
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default(),
        SNAPSHOT_TAG,
        now.format("%Y%m%d_%H%M%S")
    );

    let mut snapshot = database.with_file_name(&base);
    let mut n = 1;
    while snapshot.exists() {
        snapshot = database.with_file_name(format!("{}_{}", base, n));
        n += 1;
    }

    copy_synced(database, &snapshot).map_err(|e| {
        EsgError::Restore(format!(
            "Failed to write safety snapshot {}: {}",
            snapshot.display(),
            e
        ))
    })?;
    info!(snapshot = %snapshot.display(), "safety snapshot written");

    Ok(Some(snapshot))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backup::BackupCoordinator;
    use crate::catalog::BackupKind;
    use crate::config::ConfigStore;
    use chrono::TimeZone;
    use std::fs;
    use tempfile::TempDir;

    struct TestEnv {
        _temp: TempDir,
        paths: EsgPaths,
        catalog: Arc<BackupCatalog>,
        backups: BackupCoordinator,
        restores: RestoreCoordinator,
    }

    fn create_test_env() -> TestEnv {
        let temp = TempDir::new().unwrap();
        let paths = EsgPaths::with_base_dir(temp.path().to_path_buf());
        paths.ensure_directories().unwrap();

        fs::create_dir_all(paths.data_dir()).unwrap();
        fs::write(paths.database_file(), b"original database").unwrap();
        let reports = paths.source_dir("reports").unwrap();
        fs::create_dir_all(reports.join("2024")).unwrap();
        fs::write(reports.join("2024/q1.pdf"), b"quarterly").unwrap();
        fs::create_dir_all(paths.config_dir()).unwrap();
        fs::write(paths.config_dir().join("app.json"), b"{\"theme\":1}").unwrap();

        let config = Arc::new(ConfigStore::new(paths.settings_file()));
        let catalog = Arc::new(BackupCatalog::new(
            paths.backup_catalog_file(),
            paths.recovery_catalog_file(),
        ));
        let backups = BackupCoordinator::new(paths.clone(), config, catalog.clone());
        let restores = RestoreCoordinator::new(paths.clone(), catalog.clone());

        TestEnv {
            _temp: temp,
            paths,
            catalog,
            backups,
            restores,
        }
    }

    #[test]
    fn test_round_trip_restores_all_groups() {
        let env = create_test_env();
        let backup = env
            .backups
            .create_backup(BackupKind::Full, "admin", true)
            .unwrap()
            .record;
        let archive = backup.archive_path.clone().unwrap();

        let reports = env.paths.source_dir("reports").unwrap();
        fs::write(env.paths.database_file(), b"edited after backup").unwrap();
        fs::remove_dir_all(&reports).unwrap();
        fs::write(env.paths.config_dir().join("app.json"), b"{}").unwrap();

        let record = env.restores.restore_backup(&archive, "admin").unwrap();

        assert_eq!(record.status, RecoveryStatus::Success);
        assert_eq!(record.backup_id, Some(backup.id));
        assert!(record.notes.is_none());
        assert_eq!(
            fs::read(env.paths.database_file()).unwrap(),
            b"original database"
        );
        assert_eq!(fs::read(reports.join("2024/q1.pdf")).unwrap(), b"quarterly");
        assert_eq!(
            fs::read(env.paths.config_dir().join("app.json")).unwrap(),
            b"{\"theme\":1}"
        );
    }

    #[test]
    fn test_snapshot_holds_pre_restore_bytes() {
        let env = create_test_env();
        let archive = env
            .backups
            .create_backup(BackupKind::DatabaseOnly, "admin", true)
            .unwrap()
            .record
            .archive_path
            .unwrap();
        fs::write(env.paths.database_file(), b"state before restore").unwrap();

        let record = env.restores.restore_backup(&archive, "admin").unwrap();

        let snapshot = record.safety_snapshot.unwrap();
        assert!(snapshot
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with("esg.db.pre_restore_"));
        assert_eq!(fs::read(snapshot).unwrap(), b"state before restore");
    }

    #[test]
    fn test_hand_copied_archive_has_no_backup_id() {
        let env = create_test_env();
        let archive = env
            .backups
            .create_backup(BackupKind::Full, "admin", true)
            .unwrap()
            .record
            .archive_path
            .unwrap();
        let copied = env.paths.base_dir().join("from_usb.zip");
        fs::copy(&archive, &copied).unwrap();

        let record = env.restores.restore_backup(&copied, "admin").unwrap();

        assert!(record.is_success());
        assert_eq!(record.backup_id, None);
    }

    #[test]
    fn test_invalid_archive_records_failure() {
        let env = create_test_env();
        let bogus = env.paths.backup_dir().join("backup_full_20250101_020000.zip");
        fs::write(&bogus, b"definitely not a zip").unwrap();

        let err = env.restores.restore_backup(&bogus, "admin").unwrap_err();
        assert!(matches!(err, EsgError::Restore(_)));
        assert!(err.to_string().contains("not a valid archive"));

        let recoveries = env.catalog.list_recoveries(None, None).unwrap();
        assert_eq!(recoveries.len(), 1);
        assert_eq!(recoveries[0].status, RecoveryStatus::Failed);
        assert!(recoveries[0].notes.is_some());
        assert!(recoveries[0].safety_snapshot.is_none());
        assert_eq!(
            fs::read(env.paths.database_file()).unwrap(),
            b"original database"
        );
    }

    #[test]
    fn test_files_only_archive_is_rejected() {
        let env = create_test_env();
        let archive = env
            .backups
            .create_backup(BackupKind::FilesOnly, "admin", true)
            .unwrap()
            .record
            .archive_path
            .unwrap();

        let err = env.restores.restore_backup(&archive, "admin").unwrap_err();
        assert!(err.to_string().contains("missing database entry"));
    }

    #[test]
    fn test_unknown_source_dir_becomes_note() {
        let env = create_test_env();
        let archive = env
            .backups
            .create_backup(BackupKind::Full, "admin", true)
            .unwrap()
            .record
            .archive_path
            .unwrap();

        let narrowed = env.paths.clone().with_sources(Vec::new());
        let restores = RestoreCoordinator::new(narrowed, env.catalog.clone());
        let record = restores.restore_backup(&archive, "admin").unwrap();

        assert!(record.is_success());
        assert!(record.has_warnings());
        assert!(record.notes.unwrap().contains("files/reports/2024/q1.pdf"));
    }

    #[test]
    fn test_missing_live_database_skips_snapshot() {
        let env = create_test_env();
        let archive = env
            .backups
            .create_backup(BackupKind::Full, "admin", true)
            .unwrap()
            .record
            .archive_path
            .unwrap();
        fs::remove_file(env.paths.database_file()).unwrap();

        let record = env.restores.restore_backup(&archive, "admin").unwrap();

        assert!(record.safety_snapshot.is_none());
        assert!(record.notes.unwrap().contains("snapshot skipped"));
        assert_eq!(
            fs::read(env.paths.database_file()).unwrap(),
            b"original database"
        );
    }

    #[test]
    fn test_snapshot_names_do_not_collide() {
        let temp = TempDir::new().unwrap();
        let db = temp.path().join("esg.db");
        fs::write(&db, b"x").unwrap();
        let now = Utc.with_ymd_and_hms(2025, 6, 1, 9, 0, 0).unwrap();

        let first = take_snapshot(&db, now).unwrap().unwrap();
        let second = take_snapshot(&db, now).unwrap().unwrap();

        assert_eq!(
            first.file_name().unwrap().to_string_lossy(),
            "esg.db.pre_restore_20250601_090000"
        );
        assert_eq!(
            second.file_name().unwrap().to_string_lossy(),
            "esg.db.pre_restore_20250601_090000_1"
        );
    }
}
