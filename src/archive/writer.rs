//! Packs the database, source directories and config files into one zip
//!
//! Only two conditions abort a write: the archive file cannot be created or
//! written, and the requested database cannot be read. Everything else
//! (unreadable files, traversal errors, non-portable names) becomes a
//! warning and the walk continues.
//!
//! A zip entry cannot be withdrawn once started. When a source file fails
//! mid-read the archive is rebuilt from scratch without that file, so no
//! truncated entry ever lands in a finished archive.
//!
//! The archive is written under a `.tmp` sibling and renamed into place once
//! it is complete and synced, so an interrupted run never leaves a truncated
//! file under a name retention would count.

use std::fs::{self, File};
use std::io::{BufReader, Read, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use walkdir::WalkDir;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

use super::layout::{config_entry, database_entry, files_entry, is_portable_name};
use crate::config::paths::DirSpec;
use crate::error::{EsgError, EsgResult};
use crate::storage::file_io::temp_sibling;

const CHUNK_SIZE: usize = 64 * 1024;

/// Outcome of a successful archive write
#[derive(Debug, Clone, Default)]
pub struct WriteSummary {
    /// Size of the finished archive on disk
    pub bytes_written: u64,
    /// Entries stored in the archive
    pub entries: usize,
    /// Files that were skipped, with the reason
    pub warnings: Vec<String>,
}

/// Writes backup archives
#[derive(Debug, Clone, Copy)]
pub struct ArchiveWriter {
    compress: bool,
}

/// Why a single file could not be added
enum AddError {
    /// The source could not be opened; nothing was written
    Skipped(String),
    /// The source failed after its entry was started
    Interrupted { path: PathBuf, reason: String },
    /// Writing to the archive failed; the archive is unusable
    Fatal(EsgError),
}

impl From<EsgError> for AddError {
    fn from(err: EsgError) -> Self {
        Self::Fatal(err)
    }
}

/// Files left out of the archive after failing mid-read
#[derive(Default)]
struct Excluded {
    paths: Vec<PathBuf>,
    warnings: Vec<String>,
}

impl Excluded {
    fn contains(&self, path: &Path) -> bool {
        self.paths.iter().any(|p| p == path)
    }
}

impl ArchiveWriter {
    pub fn new(compress: bool) -> Self {
        Self { compress }
    }

    /// Write an archive to `archive_path`
    ///
    /// Nothing appears at `archive_path` until the archive is complete. On a
    /// hard error the partial temp file is removed.
    pub fn write(
        &self,
        archive_path: &Path,
        database: Option<&Path>,
        sources: &[DirSpec],
        config_files: &[PathBuf],
    ) -> EsgResult<WriteSummary> {
        let temp_path = temp_sibling(archive_path);
        let mut excluded = Excluded::default();

        // Each pass either finishes or excludes one more file, so this ends.
        let result = loop {
            let file = File::create(&temp_path).map_err(|e| {
                EsgError::Archive(format!(
                    "Failed to create archive {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;

            match self.write_entries(file, database, sources, config_files, &excluded) {
                Ok(summary) => break Ok(summary),
                Err(AddError::Interrupted { path, reason }) => {
                    warn!(file = %path.display(), error = %reason, "source failed mid-read, rebuilding archive without it");
                    excluded.warnings.push(format!("{}: {}", path.display(), reason));
                    excluded.paths.push(path);
                }
                Err(AddError::Skipped(reason)) => break Err(EsgError::Archive(reason)),
                Err(AddError::Fatal(e)) => break Err(e),
            }
        };

        let result = result.and_then(|mut summary| {
            fs::rename(&temp_path, archive_path).map_err(|e| {
                EsgError::Archive(format!(
                    "Failed to move archive into place at {}: {}",
                    archive_path.display(),
                    e
                ))
            })?;
            summary.warnings.extend(excluded.warnings);
            Ok(summary)
        });

        match result {
            Ok(mut summary) => {
                summary.bytes_written = fs::metadata(archive_path)
                    .map(|m| m.len())
                    .map_err(|e| EsgError::Archive(format!("Failed to stat archive: {}", e)))?;
                debug!(
                    archive = %archive_path.display(),
                    entries = summary.entries,
                    bytes = summary.bytes_written,
                    "archive written"
                );
                Ok(summary)
            }
            Err(e) => {
                let _ = fs::remove_file(&temp_path);
                Err(e)
            }
        }
    }

    fn write_entries(
        &self,
        file: File,
        database: Option<&Path>,
        sources: &[DirSpec],
        config_files: &[PathBuf],
        excluded: &Excluded,
    ) -> Result<WriteSummary, AddError> {
        let mut zip = ZipWriter::new(file);
        let mut summary = WriteSummary::default();

        if let Some(db_path) = database {
            let file_name = db_path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .filter(|n| is_portable_name(n))
                .ok_or_else(|| {
                    EsgError::Archive(format!("Invalid database path: {}", db_path.display()))
                })?;

            match self.add_file(&mut zip, &database_entry(&file_name), db_path) {
                Ok(()) => summary.entries += 1,
                Err(AddError::Skipped(reason)) | Err(AddError::Interrupted { reason, .. }) => {
                    return Err(AddError::Fatal(EsgError::Archive(format!(
                        "Database {} could not be read: {}",
                        db_path.display(),
                        reason
                    ))))
                }
                Err(e) => return Err(e),
            }
        }

        for source in sources {
            self.add_tree(&mut zip, source, excluded, &mut summary)?;
        }

        for config_path in config_files {
            if excluded.contains(config_path) {
                continue;
            }
            let Some(file_name) = config_path.file_name() else {
                continue;
            };
            let file_name = file_name.to_string_lossy();
            if !is_portable_name(&file_name) {
                summary
                    .warnings
                    .push(format!("{}: file name contains a backslash", config_path.display()));
                continue;
            }
            let entry = config_entry(&file_name);
            match self.add_file(&mut zip, &entry, config_path) {
                Ok(()) => summary.entries += 1,
                Err(AddError::Skipped(reason)) => summary.warnings.push(reason),
                Err(e) => return Err(e),
            }
        }

        let file = zip.finish().map_err(EsgError::from)?;
        file.sync_all()
            .map_err(|e| EsgError::Archive(format!("Failed to sync archive: {}", e)))?;

        Ok(summary)
    }

    fn add_tree(
        &self,
        zip: &mut ZipWriter<File>,
        source: &DirSpec,
        excluded: &Excluded,
        summary: &mut WriteSummary,
    ) -> Result<(), AddError> {
        if !source.path.exists() {
            debug!(source = %source.name, path = %source.path.display(), "source directory absent, nothing to archive");
            return Ok(());
        }

        let walker = WalkDir::new(&source.path)
            .follow_links(false)
            .sort_by_file_name();

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    let location = e
                        .path()
                        .map(|p| p.display().to_string())
                        .unwrap_or_else(|| source.path.display().to_string());
                    summary.warnings.push(format!("{}: {}", location, e));
                    continue;
                }
            };

            let file_type = entry.file_type();
            if file_type.is_dir() || excluded.contains(entry.path()) {
                continue;
            }
            if file_type.is_symlink() {
                // Links are archived as the file they point to, never traversed.
                match fs::metadata(entry.path()) {
                    Ok(meta) if meta.is_dir() => continue,
                    Ok(_) => {}
                    Err(e) => {
                        summary
                            .warnings
                            .push(format!("{}: {}", entry.path().display(), e));
                        continue;
                    }
                }
            }

            let relative = match entry.path().strip_prefix(&source.path) {
                Ok(relative) => relative,
                Err(_) => continue,
            };
            let Some(name) = files_entry(&source.name, relative) else {
                summary.warnings.push(format!(
                    "{}: file name contains a backslash",
                    entry.path().display()
                ));
                continue;
            };

            match self.add_file(zip, &name, entry.path()) {
                Ok(()) => summary.entries += 1,
                Err(AddError::Skipped(reason)) => summary.warnings.push(reason),
                Err(e) => return Err(e),
            }
        }

        Ok(())
    }

    /// Stream one file into the archive under `name`
    ///
    /// The source is opened before the entry is started, so an unreadable
    /// file leaves no trace in the archive. A read failure after that is
    /// reported as `Interrupted` and the caller must discard the archive.
    fn add_file(
        &self,
        zip: &mut ZipWriter<File>,
        name: &str,
        path: &Path,
    ) -> Result<(), AddError> {
        let file = File::open(path)
            .map_err(|e| AddError::Skipped(format!("{}: {}", path.display(), e)))?;
        let len = file.metadata().map(|m| m.len()).unwrap_or(0);
        let mut reader = BufReader::with_capacity(CHUNK_SIZE, file);

        zip.start_file(name, self.options(len)).map_err(|e| {
            AddError::Fatal(EsgError::Archive(format!(
                "Failed to start entry {}: {}",
                name, e
            )))
        })?;

        let mut buffer = vec![0u8; CHUNK_SIZE];
        loop {
            let read = match reader.read(&mut buffer) {
                Ok(0) => break,
                Ok(read) => read,
                Err(e) => {
                    return Err(AddError::Interrupted {
                        path: path.to_path_buf(),
                        reason: e.to_string(),
                    })
                }
            };
            zip.write_all(&buffer[..read]).map_err(|e| {
                AddError::Fatal(EsgError::Archive(format!(
                    "Failed to write entry {}: {}",
                    name, e
                )))
            })?;
        }

        Ok(())
    }

    fn options(&self, len: u64) -> FileOptions {
        let method = if self.compress {
            CompressionMethod::Deflated
        } else {
            CompressionMethod::Stored
        };
        FileOptions::default()
            .compression_method(method)
            .large_file(len >= u32::MAX as u64)
    }
}
