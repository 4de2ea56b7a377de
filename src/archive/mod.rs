//! Backup archive format
//!
//! A backup is a single zip file with three entry groups keyed by path
//! prefix (see [`layout`]). [`ArchiveWriter`] produces archives and
//! [`ArchiveReader`] verifies and extracts them.

pub mod layout;
mod reader;
mod writer;

pub use layout::{classify_entry, EntryGroup};
pub use reader::{verify, ArchiveProblem, ArchiveReader, ExtractSummary, ValidationResult};
pub use writer::{ArchiveWriter, WriteSummary};
