//! File I/O utilities with atomic writes
//!
//! Catalog and config documents are replaced via temp file + rename so a
//! crash mid-write leaves the previous version intact.

use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::{de::DeserializeOwned, Serialize};

use crate::error::EsgError;

/// Read JSON from a file, returning a default value if file doesn't exist
pub fn read_json<T, P>(path: P) -> Result<T, EsgError>
where
    T: DeserializeOwned + Default,
    P: AsRef<Path>,
{
    let path = path.as_ref();

    if !path.exists() {
        return Ok(T::default());
    }

    read_json_required(path)
}

/// Read JSON from a file, returning an error if file doesn't exist
pub fn read_json_required<T, P>(path: P) -> Result<T, EsgError>
where
    T: DeserializeOwned,
    P: AsRef<Path>,
{
    let path = path.as_ref();

    let file = File::open(path)
        .map_err(|e| EsgError::Storage(format!("Failed to open {}: {}", path.display(), e)))?;

    let reader = BufReader::new(file);
    serde_json::from_reader(reader)
        .map_err(|e| EsgError::Storage(format!("Failed to parse {}: {}", path.display(), e)))
}

/// Write JSON to a file atomically (write to temp, then rename)
pub fn write_json_atomic<T, P>(path: P, data: &T) -> Result<(), EsgError>
where
    T: Serialize,
    P: AsRef<Path>,
{
    let path = path.as_ref();
    let temp_path = temp_sibling(path);

    ensure_parent(path)?;

    let file = File::create(&temp_path)
        .map_err(|e| EsgError::Storage(format!("Failed to create temp file: {}", e)))?;

    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, data)
        .map_err(|e| EsgError::Storage(format!("Failed to serialize data: {}", e)))?;

    writer
        .flush()
        .map_err(|e| EsgError::Storage(format!("Failed to flush data: {}", e)))?;

    writer
        .get_ref()
        .sync_all()
        .map_err(|e| EsgError::Storage(format!("Failed to sync data: {}", e)))?;

    fs::rename(&temp_path, path).map_err(|e| {
        let _ = fs::remove_file(&temp_path);
        EsgError::Storage(format!("Failed to rename temp file: {}", e))
    })?;

    Ok(())
}

/// Stream `reader` into `dest` atomically, returning the bytes written
///
/// Used when a live file (the database) is overwritten from an archive.
pub fn write_stream_atomic<R: io::Read>(dest: &Path, reader: &mut R) -> Result<u64, EsgError> {
    let temp_path = temp_sibling(dest);

    ensure_parent(dest)?;

    let result = (|| -> io::Result<u64> {
        let mut writer = BufWriter::new(File::create(&temp_path)?);
        let written = io::copy(reader, &mut writer)?;
        writer.flush()?;
        writer.get_ref().sync_all()?;
        Ok(written)
    })();

    let written = result.map_err(|e| {
        let _ = fs::remove_file(&temp_path);
        EsgError::Io(format!("Failed to write {}: {}", dest.display(), e))
    })?;

    fs::rename(&temp_path, dest).map_err(|e| {
        let _ = fs::remove_file(&temp_path);
        EsgError::Io(format!("Failed to replace {}: {}", dest.display(), e))
    })?;

    Ok(written)
}

/// Copy a file and sync the copy to disk before returning
pub fn copy_synced(src: &Path, dest: &Path) -> Result<u64, EsgError> {
    let copied = fs::copy(src, dest).map_err(|e| {
        EsgError::Io(format!(
            "Failed to copy {} to {}: {}",
            src.display(),
            dest.display(),
            e
        ))
    })?;

    File::open(dest)
        .and_then(|f| f.sync_all())
        .map_err(|e| EsgError::Io(format!("Failed to sync {}: {}", dest.display(), e)))?;

    Ok(copied)
}

/// Return `path` itself if free, otherwise `path_1`, `path_2`, ...
pub fn unique_path(path: &Path) -> PathBuf {
    if !path.exists() {
        return path.to_path_buf();
    }

    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    let extension = path.extension().map(|e| e.to_string_lossy().to_string());

    (1u32..)
        .map(|n| {
            let name = match &extension {
                Some(ext) => format!("{}_{}.{}", stem, n, ext),
                None => format!("{}_{}", stem, n),
            };
            path.with_file_name(name)
        })
        .find(|candidate| !candidate.exists())
        .unwrap_or_else(|| path.to_path_buf())
}

pub(crate) fn temp_sibling(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

fn ensure_parent(path: &Path) -> Result<(), EsgError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(|e| {
                EsgError::Storage(format!(
                    "Failed to create directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }
    }
    Ok(())
}
