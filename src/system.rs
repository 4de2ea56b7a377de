//! The assembled backup subsystem
//!
//! `BackupSystem` owns one instance of every component and is what the
//! CLI and any other embedding caller talk to.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use crate::archive::{self, ValidationResult};
use crate::backup::{BackupCoordinator, BackupOutcome, PruneReport, RestoreCoordinator};
use crate::catalog::{BackupCatalog, BackupKind, BackupRecord, BackupStatus, RecoveryRecord};
use crate::config::{BackupConfig, ConfigStore, EsgPaths};
use crate::error::EsgResult;
use crate::scheduler::Scheduler;

pub struct BackupSystem {
    paths: EsgPaths,
    config: Arc<ConfigStore>,
    catalog: Arc<BackupCatalog>,
    backups: Arc<BackupCoordinator>,
    restores: RestoreCoordinator,
    scheduler: Scheduler,
}

impl BackupSystem {
    /// Build the subsystem over `paths`, creating its directories
    pub fn open(paths: EsgPaths) -> EsgResult<Self> {
        paths.ensure_directories()?;

        let config = Arc::new(ConfigStore::new(paths.settings_file()));
        let catalog = Arc::new(BackupCatalog::new(
            paths.backup_catalog_file(),
            paths.recovery_catalog_file(),
        ));
        let backups = Arc::new(BackupCoordinator::new(
            paths.clone(),
            Arc::clone(&config),
            Arc::clone(&catalog),
        ));
        let restores = RestoreCoordinator::new(paths.clone(), Arc::clone(&catalog));
        let scheduler = Scheduler::new(Arc::clone(&backups), Arc::clone(&config));

        Ok(Self {
            paths,
            config,
            catalog,
            backups,
            restores,
            scheduler,
        })
    }

    /// Use a different scheduler wake-up interval
    pub fn with_tick_interval(mut self, interval: Duration) -> Self {
        self.scheduler = Scheduler::new(Arc::clone(&self.backups), Arc::clone(&self.config))
            .with_interval(interval);
        self
    }

    pub fn paths(&self) -> &EsgPaths {
        &self.paths
    }

    pub fn create_backup(
        &self,
        kind: BackupKind,
        created_by: &str,
        include_files: bool,
    ) -> EsgResult<BackupOutcome> {
        self.backups.create_backup(kind, created_by, include_files)
    }

    pub fn restore_backup(&self, archive_path: &Path, restored_by: &str) -> EsgResult<RecoveryRecord> {
        self.restores.restore_backup(archive_path, restored_by)
    }

    /// Backup history, newest first
    pub fn get_backup_list(
        &self,
        limit: Option<usize>,
        status: Option<BackupStatus>,
    ) -> EsgResult<Vec<BackupRecord>> {
        self.catalog.list_backups(limit, status)
    }

    /// Restore history, newest first
    pub fn get_recovery_list(&self, limit: Option<usize>) -> EsgResult<Vec<RecoveryRecord>> {
        self.catalog.list_recoveries(limit, None)
    }

    pub fn get_config(&self) -> BackupConfig {
        self.config.get()
    }

    pub fn update_config(&self, config: BackupConfig) -> EsgResult<()> {
        self.config.update(config)
    }

    pub fn verify(&self, archive_path: &Path) -> ValidationResult {
        archive::verify(archive_path)
    }

    pub fn prune(&self) -> EsgResult<PruneReport> {
        self.backups.prune()
    }

    /// Start the scheduler; `false` if it was already running
    pub fn start_scheduler(&self) -> EsgResult<bool> {
        self.scheduler.start()
    }

    /// Stop the scheduler; `false` if it was not running
    pub fn stop_scheduler(&self) -> bool {
        self.scheduler.stop()
    }

    pub fn scheduler_running(&self) -> bool {
        self.scheduler.is_running()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::RecoveryStatus;
    use std::fs;
    use tempfile::TempDir;

    fn create_test_system() -> (BackupSystem, TempDir) {
        let temp = TempDir::new().unwrap();
        let paths = EsgPaths::with_base_dir(temp.path().to_path_buf());
        let system = BackupSystem::open(paths).unwrap();

        fs::create_dir_all(system.paths().data_dir()).unwrap();
        fs::write(system.paths().database_file(), b"facade db").unwrap();

        (system, temp)
    }

    #[test]
    fn test_open_creates_layout() {
        let (system, _temp) = create_test_system();
        assert!(system.paths().backup_dir().is_dir());
        assert!(system.paths().catalog_dir().is_dir());
        assert_eq!(system.get_config(), BackupConfig::default());
    }

    #[test]
    fn test_backup_verify_restore_flow() {
        let (system, _temp) = create_test_system();

        let outcome = system.create_backup(BackupKind::Full, "admin", true).unwrap();
        let archive = outcome.record.archive_path.clone().unwrap();
        assert!(system.verify(&archive).is_valid());

        fs::write(system.paths().database_file(), b"changed").unwrap();
        let recovery = system.restore_backup(&archive, "admin").unwrap();
        assert_eq!(recovery.status, RecoveryStatus::Success);
        assert_eq!(
            fs::read(system.paths().database_file()).unwrap(),
            b"facade db"
        );

        assert_eq!(system.get_backup_list(Some(10), None).unwrap().len(), 1);
        assert_eq!(system.get_recovery_list(None).unwrap().len(), 1);
    }

    #[test]
    fn test_update_config_rejects_zero_retention() {
        let (system, _temp) = create_test_system();
        let err = system
            .update_config(BackupConfig {
                max_backups: 0,
                ..BackupConfig::default()
            })
            .unwrap_err();
        assert!(err.is_validation());
        assert_eq!(system.get_config().max_backups, 30);
    }

    #[test]
    fn test_prune_uses_configured_limit() {
        let (system, _temp) = create_test_system();
        for _ in 0..3 {
            system
                .create_backup(BackupKind::DatabaseOnly, "admin", false)
                .unwrap();
        }
        system
            .update_config(BackupConfig {
                max_backups: 1,
                ..BackupConfig::default()
            })
            .unwrap();

        let report = system.prune().unwrap();
        assert_eq!(report.deleted.len(), 2);
        assert_eq!(system.get_backup_list(None, None).unwrap().len(), 3);
    }

    #[test]
    fn test_scheduler_lifecycle() {
        let (system, _temp) = create_test_system();
        system
            .update_config(BackupConfig {
                auto_backup_enabled: false,
                ..BackupConfig::default()
            })
            .unwrap();

        assert!(system.start_scheduler().unwrap());
        assert!(system.scheduler_running());
        assert!(system.stop_scheduler());
        assert!(!system.scheduler_running());
        assert!(system.get_backup_list(None, None).unwrap().is_empty());
    }
}
