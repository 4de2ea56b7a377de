//! Retention policy enforcement
//!
//! Keeps the newest `max_backups` archives in the backup directory and
//! deletes the rest. Only files following the archive naming convention are
//! considered; anything else in the directory is left alone.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use super::naming::ArchiveName;
use crate::error::{EsgError, EsgResult};

/// What a prune pass did
#[derive(Debug, Clone, Default)]
pub struct PruneReport {
    /// Archives removed
    pub deleted: Vec<PathBuf>,
    /// Archives that should have been removed but could not be
    pub failures: Vec<String>,
}

impl PruneReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// An archive found in the backup directory
#[derive(Debug, Clone)]
pub struct ArchiveFile {
    pub path: PathBuf,
    pub name: ArchiveName,
    pub size_bytes: u64,
}

/// List archives in `backup_dir`, newest first
///
/// Archives stamped in the same second with the same sequence number are
/// ordered by file name, so the order never depends on the directory
/// listing. Entries that cannot be read are logged and skipped.
pub fn list_archives(backup_dir: &Path) -> EsgResult<Vec<ArchiveFile>> {
    if !backup_dir.exists() {
        return Ok(Vec::new());
    }

    let entries = fs::read_dir(backup_dir)
        .map_err(|e| EsgError::Io(format!("Failed to read backup directory: {}", e)))?
        .map(|entry| entry.map(|e| e.path()));

    Ok(collect_archives(backup_dir, entries))
}

fn collect_archives<I>(backup_dir: &Path, entries: I) -> Vec<ArchiveFile>
where
    I: IntoIterator<Item = io::Result<PathBuf>>,
{
    let mut archives = Vec::new();

    for entry in entries {
        let path = match entry {
            Ok(path) => path,
            Err(e) => {
                warn!(dir = %backup_dir.display(), error = %e, "skipping unreadable backup directory entry");
                continue;
            }
        };

        if !path.is_file() {
            continue;
        }
        let Some(name) = path
            .file_name()
            .and_then(|n| n.to_str())
            .and_then(ArchiveName::parse)
        else {
            continue;
        };
        let size_bytes = fs::metadata(&path).map(|m| m.len()).unwrap_or(0);

        archives.push(ArchiveFile {
            path,
            name,
            size_bytes,
        });
    }

    archives.sort_by(|a, b| {
        b.name
            .sort_key()
            .cmp(&a.name.sort_key())
            .then_with(|| b.path.file_name().cmp(&a.path.file_name()))
    });

    archives
}

/// Delete every archive beyond the newest `max_backups`
///
/// A file that cannot be deleted is reported in `failures`; the pass keeps
/// going with the remaining files.
pub fn prune(backup_dir: &Path, max_backups: u32) -> EsgResult<PruneReport> {
    prune_with(backup_dir, max_backups, |path| fs::remove_file(path))
}

fn prune_with<F>(backup_dir: &Path, max_backups: u32, mut remove: F) -> EsgResult<PruneReport>
where
    F: FnMut(&Path) -> io::Result<()>,
{
    if max_backups < 1 {
        return Err(EsgError::Validation(
            "maxBackups must be at least 1".to_string(),
        ));
    }

    let mut report = PruneReport::default();

    for archive in list_archives(backup_dir)?
        .into_iter()
        .skip(max_backups as usize)
    {
        match remove(&archive.path) {
            Ok(()) => {
                info!(archive = %archive.path.display(), "pruned old backup");
                report.deleted.push(archive.path);
            }
            Err(e) => {
                warn!(archive = %archive.path.display(), error = %e, "failed to prune backup");
                report
                    .failures
                    .push(format!("{}: {}", archive.path.display(), e));
            }
        }
    }

    Ok(report)
}
