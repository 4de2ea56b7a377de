//! Opens, verifies and extracts backup archives

use std::fmt;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

use tracing::debug;
use zip::ZipArchive;

use super::layout::{classify_entry, EntryGroup};
use crate::error::{EsgError, EsgResult};
use crate::storage::file_io::write_stream_atomic;

/// Why an archive failed verification
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArchiveProblem {
    NotFound,
    NotAnArchive(String),
    MissingDatabase,
    MultipleDatabases(usize),
    CorruptEntry { name: String, detail: String },
}

impl fmt::Display for ArchiveProblem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "archive not found"),
            Self::NotAnArchive(detail) => write!(f, "not a valid archive: {}", detail),
            Self::MissingDatabase => write!(f, "missing database entry"),
            Self::MultipleDatabases(count) => {
                write!(f, "archive holds {} database entries, expected one", count)
            }
            Self::CorruptEntry { name, detail } => {
                write!(f, "corrupt entry {}: {}", name, detail)
            }
        }
    }
}

/// Result of verifying an archive
#[derive(Debug, Clone)]
pub struct ValidationResult {
    /// First problem found, if any
    pub problem: Option<ArchiveProblem>,
    pub entry_count: usize,
    pub database_entry: Option<String>,
    pub file_entries: usize,
    pub config_entries: usize,
}

impl ValidationResult {
    fn invalid(problem: ArchiveProblem) -> Self {
        Self {
            problem: Some(problem),
            entry_count: 0,
            database_entry: None,
            file_entries: 0,
            config_entries: 0,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.problem.is_none()
    }

    /// Human-readable reason the archive is unusable
    pub fn reason(&self) -> Option<String> {
        self.problem.as_ref().map(|p| p.to_string())
    }

    pub fn summary(&self) -> String {
        match &self.problem {
            Some(problem) => format!("Invalid archive: {}", problem),
            None => format!(
                "Valid archive: {} entries (database: {}, files: {}, config: {})",
                self.entry_count,
                self.database_entry.as_deref().unwrap_or("-"),
                self.file_entries,
                self.config_entries
            ),
        }
    }
}

/// Outcome of a tolerant extraction
#[derive(Debug, Clone, Default)]
pub struct ExtractSummary {
    pub extracted: usize,
    pub warnings: Vec<String>,
}

/// Verify the archive at `path` without extracting anything
pub fn verify(path: &Path) -> ValidationResult {
    if !path.is_file() {
        return ValidationResult::invalid(ArchiveProblem::NotFound);
    }
    match ArchiveReader::open(path) {
        Ok(mut reader) => reader.verify(),
        Err(e) => ValidationResult::invalid(ArchiveProblem::NotAnArchive(e.to_string())),
    }
}

/// An opened backup archive
pub struct ArchiveReader {
    path: PathBuf,
    archive: ZipArchive<File>,
}

impl ArchiveReader {
    pub fn open(path: &Path) -> EsgResult<Self> {
        let file = File::open(path).map_err(|e| {
            EsgError::Archive(format!("Failed to open {}: {}", path.display(), e))
        })?;
        let archive = ZipArchive::new(file)?;
        Ok(Self {
            path: path.to_path_buf(),
            archive,
        })
    }

    pub fn entry_names(&self) -> Vec<String> {
        self.archive.file_names().map(|n| n.to_string()).collect()
    }

    /// Read every entry through its checksum and check the layout
    pub fn verify(&mut self) -> ValidationResult {
        let mut result = ValidationResult {
            problem: None,
            entry_count: self.archive.len(),
            database_entry: None,
            file_entries: 0,
            config_entries: 0,
        };
        let mut databases = 0usize;

        for i in 0..self.archive.len() {
            let mut entry = match self.archive.by_index(i) {
                Ok(entry) => entry,
                Err(e) => {
                    result.problem = Some(ArchiveProblem::CorruptEntry {
                        name: format!("#{}", i),
                        detail: e.to_string(),
                    });
                    return result;
                }
            };
            let name = entry.name().to_string();

            // The zip reader checks the CRC once the entry is fully read.
            if let Err(e) = io::copy(&mut entry, &mut io::sink()) {
                result.problem = Some(ArchiveProblem::CorruptEntry {
                    name,
                    detail: e.to_string(),
                });
                return result;
            }

            match classify_entry(&name) {
                Some(EntryGroup::Database(_)) => {
                    databases += 1;
                    result.database_entry.get_or_insert(name);
                }
                Some(EntryGroup::Files { .. }) => result.file_entries += 1,
                Some(EntryGroup::Config(_)) => result.config_entries += 1,
                None => {}
            }
        }

        result.problem = match databases {
            0 => Some(ArchiveProblem::MissingDatabase),
            1 => None,
            n => Some(ArchiveProblem::MultipleDatabases(n)),
        };
        result
    }

    /// Overwrite `dest` with the archive's database entry
    pub fn extract_database(&mut self, dest: &Path) -> EsgResult<u64> {
        let name = self
            .archive
            .file_names()
            .find(|n| matches!(classify_entry(n), Some(EntryGroup::Database(_))))
            .map(str::to_string)
            .ok_or_else(|| {
                EsgError::Archive(format!("{} has no database entry", self.path.display()))
            })?;

        let mut entry = self.archive.by_name(&name)?;
        let written = write_stream_atomic(dest, &mut entry)?;
        debug!(dest = %dest.display(), bytes = written, "database extracted");
        Ok(written)
    }

    /// Extract every `files/<dir>/<relpath>` entry
    ///
    /// `resolve_root` maps a source directory name to where its files go;
    /// `None` skips that directory with a warning.
    pub fn extract_files<F>(&mut self, resolve_root: F) -> EsgResult<ExtractSummary>
    where
        F: Fn(&str) -> Option<PathBuf>,
    {
        self.extract_matching(|group| match group {
            EntryGroup::Files { dir, relative } => Some(
                resolve_root(&dir)
                    .map(|root| root.join(relative))
                    .ok_or_else(|| format!("no destination for source directory '{}'", dir)),
            ),
            _ => None,
        })
    }

    /// Extract every `config/<file>` entry into `dest_dir`
    pub fn extract_config(&mut self, dest_dir: &Path) -> EsgResult<ExtractSummary> {
        self.extract_matching(|group| match group {
            EntryGroup::Config(name) => Some(Ok(dest_dir.join(name))),
            _ => None,
        })
    }

    fn extract_matching<F>(&mut self, destination: F) -> EsgResult<ExtractSummary>
    where
        F: Fn(EntryGroup) -> Option<Result<PathBuf, String>>,
    {
        let mut summary = ExtractSummary::default();

        for i in 0..self.archive.len() {
            let mut entry = match self.archive.by_index(i) {
                Ok(entry) => entry,
                Err(e) => {
                    summary.warnings.push(format!("entry #{}: {}", i, e));
                    continue;
                }
            };
            let name = entry.name().to_string();

            let Some(group) = classify_entry(&name) else {
                continue;
            };
            let dest = match destination(group) {
                None => continue,
                Some(Ok(dest)) => dest,
                Some(Err(reason)) => {
                    summary.warnings.push(format!("{}: {}", name, reason));
                    continue;
                }
            };

            if let Some(parent) = dest.parent() {
                if let Err(e) = fs::create_dir_all(parent) {
                    summary.warnings.push(format!("{}: {}", name, e));
                    continue;
                }
            }

            match write_stream_atomic(&dest, &mut entry) {
                Ok(_) => summary.extracted += 1,
                Err(e) => summary.warnings.push(format!("{}: {}", name, e)),
            }
        }

        Ok(summary)
    }
}
