//! Unattended backup scheduler
//!
//! A `Scheduler` owns at most one worker thread. The worker wakes on a fixed
//! interval, re-reads the configuration and triggers a full backup when the
//! current period's trigger time has passed and no backup was triggered
//! since. Times of day are evaluated on the local clock.

use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration as StdDuration;

use chrono::{DateTime, Datelike, Duration, Local, NaiveDateTime, NaiveTime, Utc, Weekday};
use tracing::{debug, error, info, warn};

use crate::backup::BackupCoordinator;
use crate::catalog::{BackupKind, BackupRecord};
use crate::config::{BackupConfig, ConfigStore, Frequency};
use crate::error::{EsgError, EsgResult};

/// How often the worker wakes up to check the schedule
pub const DEFAULT_TICK_INTERVAL: StdDuration = StdDuration::from_secs(60);

/// Day of week weekly backups run on
pub const WEEKLY_TRIGGER_DAY: Weekday = Weekday::Mon;

/// `createdBy` for scheduled backups
pub const SCHEDULER_USER: &str = "auto_scheduler";

/// Midnight at the start of the period containing `now`
///
/// The day for daily schedules, the Monday of the week for weekly and the
/// 1st of the month for monthly.
pub fn period_start(frequency: Frequency, now: NaiveDateTime) -> NaiveDateTime {
    let today = now.date();
    let day = match frequency {
        Frequency::Daily => today,
        Frequency::Weekly => {
            let offset = (today.weekday().num_days_from_monday() + 7
                - WEEKLY_TRIGGER_DAY.num_days_from_monday())
                % 7;
            today - Duration::days(i64::from(offset))
        }
        Frequency::Monthly => today.with_day(1).unwrap_or(today),
    };
    day.and_time(NaiveTime::MIN)
}

/// Trigger instant of the period containing `now`
pub fn current_trigger(frequency: Frequency, at: NaiveTime, now: NaiveDateTime) -> NaiveDateTime {
    period_start(frequency, now).date().and_time(at)
}

/// Whether a scheduled backup should run at `now`
///
/// Due once the current period's trigger time has passed, unless a backup
/// was already triggered anywhere in the period. A restart late in the
/// period still catches up; moving `timeOfDay` after a run does not fire
/// a second time.
pub fn is_due(config: &BackupConfig, now: DateTime<Local>) -> bool {
    if !config.auto_backup_enabled {
        return false;
    }
    let at = match config.trigger_time() {
        Ok(at) => at,
        Err(e) => {
            warn!(error = %e, "schedule disabled by invalid timeOfDay");
            return false;
        }
    };

    let now = now.naive_local();
    if now < current_trigger(config.frequency, at, now) {
        return false;
    }

    let start = period_start(config.frequency, now);
    match config.last_backup_at {
        None => true,
        Some(last) => last.with_timezone(&Local).naive_local() < start,
    }
}

struct Worker {
    stop_tx: mpsc::Sender<()>,
    handle: JoinHandle<()>,
}

/// Runs scheduled backups on a background thread
pub struct Scheduler {
    coordinator: Arc<BackupCoordinator>,
    config: Arc<ConfigStore>,
    interval: StdDuration,
    worker: Mutex<Option<Worker>>,
}

impl Scheduler {
    pub fn new(coordinator: Arc<BackupCoordinator>, config: Arc<ConfigStore>) -> Self {
        Self {
            coordinator,
            config,
            interval: DEFAULT_TICK_INTERVAL,
            worker: Mutex::new(None),
        }
    }

    /// Override the wake-up interval
    pub fn with_interval(mut self, interval: StdDuration) -> Self {
        self.interval = interval;
        self
    }

    /// Start the worker thread
    ///
    /// Returns `false` without doing anything if it is already running.
    pub fn start(&self) -> EsgResult<bool> {
        let mut worker = self.worker.lock().unwrap_or_else(|e| e.into_inner());
        if worker.is_some() {
            debug!("scheduler already running");
            return Ok(false);
        }

        let (stop_tx, stop_rx) = mpsc::channel::<()>();
        let coordinator = Arc::clone(&self.coordinator);
        let config = Arc::clone(&self.config);
        let interval = self.interval;

        let handle = thread::Builder::new()
            .name("esg-backup-scheduler".to_string())
            .spawn(move || loop {
                run_tick(&coordinator, &config, Utc::now());
                match stop_rx.recv_timeout(interval) {
                    Err(RecvTimeoutError::Timeout) => continue,
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                }
            })
            .map_err(|e| EsgError::Io(format!("Failed to start scheduler thread: {}", e)))?;

        *worker = Some(Worker { stop_tx, handle });
        info!(interval_secs = interval.as_secs(), "scheduler started");
        Ok(true)
    }

    /// Stop the worker, waiting for an in-flight backup to finish
    ///
    /// Returns `false` if it was not running.
    pub fn stop(&self) -> bool {
        let worker = self
            .worker
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        let Some(worker) = worker else {
            return false;
        };

        let _ = worker.stop_tx.send(());
        if worker.handle.join().is_err() {
            error!("scheduler thread panicked");
        }
        info!("scheduler stopped");
        true
    }

    pub fn is_running(&self) -> bool {
        self.worker
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .is_some()
    }

    /// Run one schedule check as if the clock read `now`
    pub fn tick_at(&self, now: DateTime<Utc>) -> Option<BackupRecord> {
        run_tick(&self.coordinator, &self.config, now)
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run_tick(
    coordinator: &BackupCoordinator,
    config: &ConfigStore,
    now: DateTime<Utc>,
) -> Option<BackupRecord> {
    if !is_due(&config.get(), now.with_timezone(&Local)) {
        return None;
    }

    info!("scheduled backup due");
    let result = coordinator.create_backup(BackupKind::Full, SCHEDULER_USER, true);

    // Stamped on failure too, so a broken setup retries next period rather
    // than on every tick.
    if let Err(e) = config.record_backup_at(now) {
        error!(error = %e, "failed to record lastBackupAt");
    }

    match result {
        Ok(outcome) => Some(outcome.record),
        Err(e) => {
            error!(error = %e, "scheduled backup failed");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{BackupCatalog, BackupStatus};
    use crate::config::EsgPaths;
    use chrono::{NaiveDate, TimeZone};
    use std::fs;
    use tempfile::TempDir;

    fn naive(y: i32, m: u32, d: u32, h: u32, min: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, min, 0)
            .unwrap()
    }

    fn local(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Local> {
        Local.with_ymd_and_hms(y, m, d, h, min, 0).single().unwrap()
    }

    fn config(frequency: Frequency, last: Option<DateTime<Local>>) -> BackupConfig {
        BackupConfig {
            frequency,
            time_of_day: "02:00".to_string(),
            last_backup_at: last.map(|t| t.with_timezone(&Utc)),
            ..BackupConfig::default()
        }
    }

    struct TestEnv {
        _temp: TempDir,
        paths: EsgPaths,
        config: Arc<ConfigStore>,
        catalog: Arc<BackupCatalog>,
        coordinator: Arc<BackupCoordinator>,
    }

    fn create_test_env() -> TestEnv {
        let temp = TempDir::new().unwrap();
        let paths = EsgPaths::with_base_dir(temp.path().to_path_buf());
        paths.ensure_directories().unwrap();
        fs::create_dir_all(paths.data_dir()).unwrap();
        fs::write(paths.database_file(), b"db").unwrap();

        let config = Arc::new(ConfigStore::new(paths.settings_file()));
        let catalog = Arc::new(BackupCatalog::new(
            paths.backup_catalog_file(),
            paths.recovery_catalog_file(),
        ));
        let coordinator = Arc::new(BackupCoordinator::new(
            paths.clone(),
            config.clone(),
            catalog.clone(),
        ));

        TestEnv {
            _temp: temp,
            paths,
            config,
            catalog,
            coordinator,
        }
    }

    #[test]
    fn test_current_trigger() {
        let at = NaiveTime::from_hms_opt(2, 0, 0).unwrap();
        // 2025-06-11 is a Wednesday
        let now = naive(2025, 6, 11, 15, 30);

        assert_eq!(
            current_trigger(Frequency::Daily, at, now),
            naive(2025, 6, 11, 2, 0)
        );
        assert_eq!(
            current_trigger(Frequency::Weekly, at, now),
            naive(2025, 6, 9, 2, 0)
        );
        assert_eq!(
            current_trigger(Frequency::Monthly, at, now),
            naive(2025, 6, 1, 2, 0)
        );
    }

    #[test]
    fn test_period_start() {
        let now = naive(2025, 6, 11, 15, 30);
        assert_eq!(period_start(Frequency::Daily, now), naive(2025, 6, 11, 0, 0));
        assert_eq!(period_start(Frequency::Weekly, now), naive(2025, 6, 9, 0, 0));
        assert_eq!(period_start(Frequency::Monthly, now), naive(2025, 6, 1, 0, 0));
        // Monday is its own week start
        assert_eq!(
            period_start(Frequency::Weekly, naive(2025, 6, 9, 0, 0)),
            naive(2025, 6, 9, 0, 0)
        );
    }

    #[test]
    fn test_daily_due() {
        assert!(!is_due(&config(Frequency::Daily, None), local(2025, 6, 11, 1, 59)));
        assert!(is_due(&config(Frequency::Daily, None), local(2025, 6, 11, 2, 0)));

        let fired = Some(local(2025, 6, 11, 2, 0));
        assert!(!is_due(&config(Frequency::Daily, fired), local(2025, 6, 11, 23, 0)));
        assert!(is_due(&config(Frequency::Daily, fired), local(2025, 6, 12, 2, 1)));
    }

    #[test]
    fn test_weekly_due_on_monday() {
        let fired = Some(local(2025, 6, 9, 2, 0));
        assert!(!is_due(&config(Frequency::Weekly, fired), local(2025, 6, 15, 23, 0)));
        assert!(!is_due(&config(Frequency::Weekly, fired), local(2025, 6, 16, 1, 0)));
        assert!(is_due(&config(Frequency::Weekly, fired), local(2025, 6, 16, 2, 0)));
    }

    #[test]
    fn test_monthly_due_on_first() {
        let fired = Some(local(2025, 6, 1, 2, 0));
        assert!(!is_due(&config(Frequency::Monthly, fired), local(2025, 6, 30, 12, 0)));
        assert!(is_due(&config(Frequency::Monthly, fired), local(2025, 7, 1, 2, 0)));
        // A restart mid-month still catches up on a missed trigger
        assert!(is_due(&config(Frequency::Monthly, fired), local(2025, 7, 14, 9, 0)));
    }

    #[test]
    fn test_later_time_of_day_does_not_refire() {
        let fired = Some(local(2025, 6, 11, 2, 0));
        let mut cfg = config(Frequency::Daily, fired);
        cfg.time_of_day = "05:00".to_string();

        assert!(!is_due(&cfg, local(2025, 6, 11, 5, 0)));
        assert!(!is_due(&cfg, local(2025, 6, 11, 23, 59)));
        assert!(!is_due(&cfg, local(2025, 6, 12, 4, 59)));
        assert!(is_due(&cfg, local(2025, 6, 12, 5, 0)));
    }

    #[test]
    fn test_disabled_never_due() {
        let mut cfg = config(Frequency::Daily, None);
        cfg.auto_backup_enabled = false;
        assert!(!is_due(&cfg, local(2025, 6, 11, 12, 0)));
    }

    #[test]
    fn test_tick_does_not_double_fire() {
        let env = create_test_env();
        let scheduler = Scheduler::new(env.coordinator.clone(), env.config.clone());

        let first = local(2025, 6, 11, 2, 0).with_timezone(&Utc);
        let record = scheduler.tick_at(first).unwrap();
        assert_eq!(record.created_by, SCHEDULER_USER);
        assert_eq!(record.kind, BackupKind::Full);
        assert_eq!(env.config.get().last_backup_at, Some(first));

        assert!(scheduler.tick_at(first + Duration::minutes(1)).is_none());
        assert!(scheduler.tick_at(first + Duration::hours(20)).is_none());
        assert!(scheduler.tick_at(first + Duration::days(1)).is_some());

        assert_eq!(env.catalog.list_backups(None, None).unwrap().len(), 2);
    }

    #[test]
    fn test_config_edit_during_period_does_not_refire() {
        let env = create_test_env();
        let scheduler = Scheduler::new(env.coordinator.clone(), env.config.clone());

        let edited = env.config.get();
        let first = local(2025, 6, 11, 2, 0).with_timezone(&Utc);
        assert!(scheduler.tick_at(first).is_some());

        env.config
            .update(BackupConfig {
                max_backups: 5,
                ..edited
            })
            .unwrap();
        assert_eq!(env.config.get().last_backup_at, Some(first));

        assert!(scheduler.tick_at(first + Duration::minutes(1)).is_none());
        assert_eq!(env.catalog.list_backups(None, None).unwrap().len(), 1);
    }

    #[test]
    fn test_time_of_day_moved_later_does_not_refire() {
        let env = create_test_env();
        let scheduler = Scheduler::new(env.coordinator.clone(), env.config.clone());

        let first = local(2025, 6, 11, 2, 0).with_timezone(&Utc);
        assert!(scheduler.tick_at(first).is_some());

        let mut edited = env.config.get();
        edited.time_of_day = "05:00".to_string();
        env.config.update(edited).unwrap();

        let later = local(2025, 6, 11, 5, 0).with_timezone(&Utc);
        assert!(scheduler.tick_at(later).is_none());
        assert_eq!(env.catalog.list_backups(None, None).unwrap().len(), 1);
    }

    #[test]
    fn test_failed_tick_still_stamps_last_backup() {
        let env = create_test_env();
        let scheduler = Scheduler::new(env.coordinator.clone(), env.config.clone());
        fs::remove_file(env.paths.database_file()).unwrap();

        let now = local(2025, 6, 11, 3, 0).with_timezone(&Utc);
        assert!(scheduler.tick_at(now).is_none());
        assert_eq!(env.config.get().last_backup_at, Some(now));

        let records = env.catalog.list_backups(None, None).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].status, BackupStatus::Failed);
        assert!(scheduler.tick_at(now + Duration::minutes(5)).is_none());
    }

    #[test]
    fn test_start_is_idempotent() {
        let env = create_test_env();
        env.config
            .update(BackupConfig {
                time_of_day: "00:00".to_string(),
                ..BackupConfig::default()
            })
            .unwrap();
        let scheduler = Scheduler::new(env.coordinator.clone(), env.config.clone())
            .with_interval(StdDuration::from_millis(20));

        assert!(scheduler.start().unwrap());
        assert!(!scheduler.start().unwrap());
        assert!(scheduler.is_running());

        thread::sleep(StdDuration::from_millis(200));
        assert!(scheduler.stop());
        assert!(!scheduler.is_running());
        assert!(!scheduler.stop());

        let records = env.catalog.list_backups(None, None).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].created_by, SCHEDULER_USER);
    }
}
