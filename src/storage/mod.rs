//! Storage layer for esg-backup
//!
//! Provides JSON file storage and file copies with atomic writes and
//! automatic directory creation.

pub mod file_io;

pub use file_io::{copy_synced, read_json, read_json_required, unique_path, write_json_atomic};
