//! Backup display formatting
//!
//! Formats catalog history, configuration and verification results for
//! terminal output.

use chrono::{DateTime, Utc};

use crate::archive::ValidationResult;
use crate::backup::PruneReport;
use crate::catalog::{BackupRecord, RecoveryRecord};
use crate::config::BackupConfig;

/// Format backup history as a table
pub fn format_backup_list(records: &[BackupRecord], now: DateTime<Utc>) -> String {
    if records.is_empty() {
        return "No backups found.".to_string();
    }

    let name_width = records
        .iter()
        .map(|r| r.name.len())
        .max()
        .unwrap_or(4)
        .max(4);
    let type_width = records
        .iter()
        .map(|r| r.kind.as_str().len())
        .max()
        .unwrap_or(4)
        .max(4);

    let mut output = String::new();
    output.push_str(&format!(
        "{:>4}  {:<name_width$}  {:<type_width$}  {:<9}  {:>9}  {:>5}  {}\n",
        "ID",
        "Name",
        "Type",
        "Status",
        "Size",
        "Age",
        "By",
        name_width = name_width,
        type_width = type_width,
    ));
    output.push_str(&format!(
        "{:->4}  {:-<name_width$}  {:-<type_width$}  {:-<9}  {:->9}  {:->5}  {:-<8}\n",
        "",
        "",
        "",
        "",
        "",
        "",
        "",
        name_width = name_width,
        type_width = type_width,
    ));

    for record in records {
        output.push_str(&format!(
            "{:>4}  {:<name_width$}  {:<type_width$}  {:<9}  {:>9}  {:>5}  {}\n",
            record.id,
            record.name,
            record.kind.as_str(),
            record.status.to_string(),
            format_size(record.size_bytes),
            format_duration(now.signed_duration_since(record.created_at)),
            record.created_by,
            name_width = name_width,
            type_width = type_width,
        ));
        if let Some(message) = &record.error_message {
            output.push_str(&format!("      error: {}\n", message));
        }
        if !record.warnings.is_empty() {
            output.push_str(&format!("      {} file(s) skipped\n", record.warnings.len()));
        }
    }

    output.push_str(&format!("\nTotal: {} backup(s)", records.len()));
    output
}

/// Format restore history as a table
pub fn format_recovery_list(records: &[RecoveryRecord]) -> String {
    if records.is_empty() {
        return "No restores recorded.".to_string();
    }

    let mut output = String::new();
    output.push_str(&format!(
        "{:>4}  {:<19}  {:<8}  {:>6}  {:<12}  {}\n",
        "ID", "Restored At", "Status", "Backup", "By", "Archive"
    ));
    output.push_str(&format!(
        "{:->4}  {:-<19}  {:-<8}  {:->6}  {:-<12}  {:-<20}\n",
        "", "", "", "", "", ""
    ));

    for record in records {
        let status = if record.has_warnings() {
            "warnings".to_string()
        } else {
            record.status.to_string()
        };
        let backup = record
            .backup_id
            .map(|id| id.to_string())
            .unwrap_or_else(|| "-".to_string());

        output.push_str(&format!(
            "{:>4}  {:<19}  {:<8}  {:>6}  {:<12}  {}\n",
            record.id,
            record.restored_at.format("%Y-%m-%d %H:%M:%S"),
            status,
            backup,
            record.restored_by,
            record.archive_path.display(),
        ));
        if let Some(notes) = &record.notes {
            for line in notes.lines() {
                output.push_str(&format!("      {}\n", line));
            }
        }
    }

    output
}

/// Format the backup configuration
pub fn format_config(config: &BackupConfig) -> String {
    let last = config
        .last_backup_at
        .map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| "never".to_string());

    let mut output = String::new();
    output.push_str("Backup Configuration\n");
    output.push_str("====================\n");
    output.push_str(&format!(
        "Auto backup:     {}\n",
        if config.auto_backup_enabled {
            "enabled"
        } else {
            "disabled"
        }
    ));
    output.push_str(&format!("Frequency:       {}\n", config.frequency));
    output.push_str(&format!("Time of day:     {}\n", config.time_of_day));
    output.push_str(&format!("Max backups:     {}\n", config.max_backups));
    output.push_str(&format!("Compress:        {}\n", yes_no(config.compress)));
    output.push_str(&format!("Include files:   {}\n", yes_no(config.include_files)));
    output.push_str(&format!("Last scheduled:  {}", last));
    output
}

/// Format a verification result with its entry counts
pub fn format_validation(result: &ValidationResult) -> String {
    let mut output = result.summary();
    if result.is_valid() {
        output.push_str(&format!(
            "\n  Database: {}\n  Files:    {}\n  Config:   {}",
            result.database_entry.as_deref().unwrap_or("-"),
            result.file_entries,
            result.config_entries
        ));
    }
    output
}

/// Format what a prune pass did
pub fn format_prune_report(report: &PruneReport) -> String {
    if report.deleted.is_empty() && report.failures.is_empty() {
        return "No backups to prune.".to_string();
    }

    let mut output = format!("Deleted {} backup(s).", report.deleted.len());
    for path in &report.deleted {
        output.push_str(&format!("\n  - {}", path.display()));
    }
    if !report.failures.is_empty() {
        output.push_str(&format!("\nCould not delete {}:", report.failures.len()));
        for failure in &report.failures {
            output.push_str(&format!("\n  ! {}", failure));
        }
    }
    output
}

fn yes_no(value: bool) -> &'static str {
    if value {
        "yes"
    } else {
        "no"
    }
}

/// Format a duration in human-readable form
pub fn format_duration(duration: chrono::Duration) -> String {
    let total_seconds = duration.num_seconds().max(0);

    if total_seconds < 60 {
        return format!("{}s", total_seconds);
    }

    let minutes = total_seconds / 60;
    if minutes < 60 {
        return format!("{}m", minutes);
    }

    let hours = minutes / 60;
    if hours < 24 {
        return format!("{}h", hours);
    }

    let days = hours / 24;
    if days < 30 {
        return format!("{}d", days);
    }

    let months = days / 30;
    format!("{}mo", months)
}

/// Format a file size in human-readable form
pub fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{BackupKind, RecoveryStatus};
    use chrono::Duration;
    use std::path::PathBuf;

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(512), "512 B");
        assert_eq!(format_size(1536), "1.5 KB");
        assert_eq!(format_size(5 * 1024 * 1024), "5.0 MB");
        assert_eq!(format_size(3 * 1024 * 1024 * 1024), "3.0 GB");
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::seconds(42)), "42s");
        assert_eq!(format_duration(Duration::minutes(5)), "5m");
        assert_eq!(format_duration(Duration::hours(3)), "3h");
        assert_eq!(format_duration(Duration::days(2)), "2d");
        assert_eq!(format_duration(Duration::days(65)), "2mo");
        assert_eq!(format_duration(Duration::seconds(-3)), "0s");
    }

    #[test]
    fn test_backup_list() {
        let mut ok = BackupRecord::completed(
            "backup_full_20250601_020000",
            BackupKind::Full,
            PathBuf::from("/b/backup_full_20250601_020000.zip"),
            2048,
            "auto_scheduler",
            vec!["uploads/locked.pdf: denied".to_string()],
        );
        ok.id = 1;
        let mut failed = BackupRecord::failed(
            "backup_database_only_20250602_020000",
            BackupKind::DatabaseOnly,
            "database missing",
            "admin",
        );
        failed.id = 2;
        let now = ok.created_at + Duration::hours(2);

        let output = format_backup_list(&[failed, ok], now);

        assert!(output.contains("backup_full_20250601_020000"));
        assert!(output.contains("2.0 KB"));
        assert!(output.contains("error: database missing"));
        assert!(output.contains("1 file(s) skipped"));
        assert!(output.contains("Total: 2 backup(s)"));
    }

    #[test]
    fn test_empty_lists() {
        assert_eq!(format_backup_list(&[], Utc::now()), "No backups found.");
        assert_eq!(format_recovery_list(&[]), "No restores recorded.");
    }

    #[test]
    fn test_recovery_list_marks_warnings() {
        let record = RecoveryRecord::new(
            PathBuf::from("/b/x.zip"),
            None,
            RecoveryStatus::Success,
            "admin",
            Some("files/reports/a.pdf: denied".to_string()),
            None,
        );

        let output = format_recovery_list(&[record]);

        assert!(output.contains("warnings"));
        assert!(output.contains("files/reports/a.pdf: denied"));
    }

    #[test]
    fn test_config() {
        let output = format_config(&BackupConfig::default());
        assert!(output.contains("Frequency:       daily"));
        assert!(output.contains("Max backups:     30"));
        assert!(output.contains("Last scheduled:  never"));
    }
}
