//! Backup CLI commands
//!
//! Implements CLI commands for creating, inspecting and restoring backups.

use clap::Subcommand;
use std::path::PathBuf;

use crate::backup::naming::ARCHIVE_EXTENSION;
use crate::catalog::{BackupKind, BackupStatus};
use crate::display::{
    format_backup_list, format_prune_report, format_recovery_list, format_size,
    format_validation,
};
use crate::error::{EsgError, EsgResult};
use crate::system::BackupSystem;

/// Backup subcommands
#[derive(Subcommand)]
pub enum BackupCommands {
    /// Create a new backup
    Create {
        /// What to archive: full, database_only or files_only
        #[arg(short, long, default_value = "full")]
        kind: BackupKind,

        /// Leave the source directories out
        #[arg(long)]
        no_files: bool,

        /// Recorded as the creator of the backup
        #[arg(long, default_value = "cli", env = "ESG_BACKUP_USER")]
        by: String,
    },

    /// List backup history, newest first
    List {
        /// Number of backups to show
        #[arg(short, long, default_value = "20")]
        limit: usize,

        /// Only show completed or failed backups
        #[arg(short, long)]
        status: Option<BackupStatus>,
    },

    /// List restore history, newest first
    History {
        /// Number of restores to show
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },

    /// Check that an archive is complete and uncorrupted
    Verify {
        /// Archive path or file name (use 'latest' for most recent)
        archive: String,
    },

    /// Restore the database and files from an archive
    Restore {
        /// Archive path or file name (use 'latest' for most recent)
        archive: String,

        /// Skip confirmation
        #[arg(short, long)]
        force: bool,

        /// Recorded as the user who ran the restore
        #[arg(long, default_value = "cli", env = "ESG_BACKUP_USER")]
        by: String,
    },

    /// Delete archives beyond the retention limit
    Prune,
}

/// Handle a backup command
pub fn handle_backup_command(system: &BackupSystem, cmd: BackupCommands) -> EsgResult<()> {
    match cmd {
        BackupCommands::Create { kind, no_files, by } => {
            println!("Creating {} backup...", kind);
            let outcome = system.create_backup(kind, &by, !no_files)?;
            let record = &outcome.record;

            println!("Backup created: {}", record.name);
            if let Some(path) = &record.archive_path {
                println!("Location: {}", path.display());
            }
            println!("Size: {}", format_size(record.size_bytes));

            if !record.warnings.is_empty() {
                println!();
                println!("Skipped {} file(s):", record.warnings.len());
                for warning in &record.warnings {
                    println!("  - {}", warning);
                }
            }
            if !outcome.pruned.deleted.is_empty() {
                println!();
                println!(
                    "Retention removed {} old backup(s).",
                    outcome.pruned.deleted.len()
                );
            }
        }

        BackupCommands::List { limit, status } => {
            let records = system.get_backup_list(Some(limit), status)?;
            println!("{}", format_backup_list(&records, chrono::Utc::now()));
        }

        BackupCommands::History { limit } => {
            let records = system.get_recovery_list(Some(limit))?;
            println!("{}", format_recovery_list(&records));
        }

        BackupCommands::Verify { archive } => {
            let path = resolve_archive_path(system, &archive)?;
            let result = system.verify(&path);
            if let Some(reason) = result.reason() {
                return Err(EsgError::Validation(format!(
                    "{} failed verification: {}",
                    path.display(),
                    reason
                )));
            }
            println!("File: {}", path.display());
            println!("{}", format_validation(&result));
        }

        BackupCommands::Restore { archive, force, by } => {
            let path = resolve_archive_path(system, &archive)?;

            if !force {
                let result = system.verify(&path);
                println!("Archive Information");
                println!("===================");
                println!("File: {}", path.display());
                println!("{}", format_validation(&result));
                println!();
                println!("WARNING: This will overwrite the live database and files!");
                println!("A pre-restore snapshot of the database is kept next to it.");
                println!("To proceed, run again with --force flag:");
                println!("  esg-backup restore {} --force", archive);
                return Ok(());
            }

            println!("Restoring from {}...", path.display());
            let record = system.restore_backup(&path, &by)?;

            println!("Restore complete!");
            if let Some(snapshot) = &record.safety_snapshot {
                println!("Pre-restore snapshot: {}", snapshot.display());
            }
            if let Some(notes) = &record.notes {
                println!();
                println!("Restored with warnings:");
                for line in notes.lines() {
                    println!("  - {}", line);
                }
            }
        }

        BackupCommands::Prune => {
            let report = system.prune()?;
            println!("{}", format_prune_report(&report));
            if !report.is_clean() {
                return Err(EsgError::Io(format!(
                    "{} archive(s) could not be deleted",
                    report.failures.len()
                )));
            }
        }
    }

    Ok(())
}

/// Resolve an archive identifier to a full path
fn resolve_archive_path(system: &BackupSystem, archive: &str) -> EsgResult<PathBuf> {
    let backup_dir = system.paths().backup_dir();

    if archive.eq_ignore_ascii_case("latest") {
        return system
            .get_backup_list(None, Some(BackupStatus::Completed))?
            .into_iter()
            .filter_map(|r| r.archive_path)
            .find(|p| p.exists())
            .ok_or_else(|| EsgError::archive_not_found("latest"));
    }

    // Check if it's a full path
    let path = PathBuf::from(archive);
    if path.exists() {
        return Ok(path);
    }

    // Check if it's a file name in the backup directory
    let in_dir = backup_dir.join(archive);
    if in_dir.exists() {
        return Ok(in_dir);
    }

    let with_ext = backup_dir.join(format!("{}.{}", archive, ARCHIVE_EXTENSION));
    if with_ext.exists() {
        return Ok(with_ext);
    }

    Err(EsgError::archive_not_found(archive))
}
