//! Backup scheduling and retention settings
//!
//! The persisted keys match the field names operators see in
//! `backup_config.json`, so the file can be inspected and edited by hand.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::EsgError;

/// How often the scheduler triggers an automatic backup
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
    /// Once per day at `timeOfDay`
    #[default]
    Daily,
    /// Once per week, on Monday, at `timeOfDay`
    Weekly,
    /// Once per month, on day 1, at `timeOfDay`
    Monthly,
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Daily => write!(f, "daily"),
            Self::Weekly => write!(f, "weekly"),
            Self::Monthly => write!(f, "monthly"),
        }
    }
}

impl FromStr for Frequency {
    type Err = EsgError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "daily" => Ok(Self::Daily),
            "weekly" => Ok(Self::Weekly),
            "monthly" => Ok(Self::Monthly),
            other => Err(EsgError::Validation(format!(
                "Unknown frequency '{}': expected daily, weekly or monthly",
                other
            ))),
        }
    }
}

/// Singleton backup configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BackupConfig {
    /// Whether the scheduler creates backups on its own
    pub auto_backup_enabled: bool,
    pub frequency: Frequency,
    /// Trigger time, local clock, `HH:MM`
    pub time_of_day: String,
    /// Archives kept in the backup directory (at least 1)
    pub max_backups: u32,
    /// Deflate entries instead of storing them
    pub compress: bool,
    /// Archive the file source directories in full backups
    pub include_files: bool,
    /// When the scheduler last triggered a backup
    pub last_backup_at: Option<DateTime<Utc>>,
}

impl Default for BackupConfig {
    fn default() -> Self {
        Self {
            auto_backup_enabled: true,
            frequency: Frequency::Daily,
            time_of_day: "02:00".to_string(),
            max_backups: 30,
            compress: true,
            include_files: true,
            last_backup_at: None,
        }
    }
}

impl BackupConfig {
    /// Check the invariants an update must satisfy
    pub fn validate(&self) -> Result<(), EsgError> {
        if self.max_backups < 1 {
            return Err(EsgError::Validation(
                "maxBackups must be at least 1".to_string(),
            ));
        }
        parse_time_of_day(&self.time_of_day)?;
        Ok(())
    }

    /// The configured trigger time
    pub fn trigger_time(&self) -> Result<NaiveTime, EsgError> {
        parse_time_of_day(&self.time_of_day)
    }
}

/// Parse an `HH:MM` string into a time of day
pub fn parse_time_of_day(value: &str) -> Result<NaiveTime, EsgError> {
    let invalid = || {
        EsgError::Validation(format!(
            "Invalid timeOfDay '{}': expected HH:MM between 00:00 and 23:59",
            value
        ))
    };

    let (hours, minutes) = value.trim().split_once(':').ok_or_else(invalid)?;
    if hours.len() != 2 || minutes.len() != 2 {
        return Err(invalid());
    }
    let hours: u32 = hours.parse().map_err(|_| invalid())?;
    let minutes: u32 = minutes.parse().map_err(|_| invalid())?;

    NaiveTime::from_hms_opt(hours, minutes, 0).ok_or_else(invalid)
}
