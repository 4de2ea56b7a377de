//! Entry path convention inside backup archives
//!
//! ```text
//! database/<primary-db-filename>      at most one entry
//! files/<source-dir-name>/<relpath>   one subtree per source directory
//! config/<filename>                   loose config files
//! ```
//!
//! Archives written by earlier releases use the same prefixes, so they must
//! not change. Everything here is pure string handling.

use std::path::{Component, Path};

pub const DATABASE_PREFIX: &str = "database/";
pub const FILES_PREFIX: &str = "files/";
pub const CONFIG_PREFIX: &str = "config/";

/// Which logical group an archive entry belongs to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryGroup {
    Database(String),
    Files { dir: String, relative: String },
    Config(String),
}

/// Map an archive entry name to its group and relative path
///
/// Returns `None` for directory entries, unknown prefixes, and names that
/// would escape their destination (`..`, absolute paths, empty segments).
pub fn classify_entry(name: &str) -> Option<EntryGroup> {
    let name = name.replace('\\', "/");
    if name.ends_with('/') {
        return None;
    }

    if let Some(rest) = name.strip_prefix(DATABASE_PREFIX) {
        return single_segment(rest).map(|n| EntryGroup::Database(n.to_string()));
    }

    if let Some(rest) = name.strip_prefix(CONFIG_PREFIX) {
        return single_segment(rest).map(|n| EntryGroup::Config(n.to_string()));
    }

    if let Some(rest) = name.strip_prefix(FILES_PREFIX) {
        let (dir, relative) = rest.split_once('/')?;
        if !is_safe_segment(dir) || !relative.split('/').all(is_safe_segment) {
            return None;
        }
        return Some(EntryGroup::Files {
            dir: dir.to_string(),
            relative: relative.to_string(),
        });
    }

    None
}

/// Entry name for the primary database file
pub fn database_entry(file_name: &str) -> String {
    format!("{}{}", DATABASE_PREFIX, file_name)
}

/// Entry name for a loose config file
pub fn config_entry(file_name: &str) -> String {
    format!("{}{}", CONFIG_PREFIX, file_name)
}

/// Whether a file name survives the trip through an archive unchanged
///
/// `classify_entry` reads `\` as a separator, so a name containing one
/// would be restored somewhere else.
pub fn is_portable_name(name: &str) -> bool {
    !name.is_empty() && !name.contains('\\')
}

/// Entry name for a file below a source directory
///
/// `relative` is the file's path relative to the source directory root;
/// its components are joined with `/` regardless of platform. Returns
/// `None` when a component is not a portable name.
pub fn files_entry(dir: &str, relative: &Path) -> Option<String> {
    let mut parts = Vec::new();
    for component in relative.components() {
        match component {
            Component::Normal(part) => {
                let part = part.to_string_lossy();
                if !is_portable_name(&part) {
                    return None;
                }
                parts.push(part.to_string());
            }
            Component::CurDir => {}
            _ => return None,
        }
    }
    if parts.is_empty() {
        return None;
    }
    Some(format!("{}{}/{}", FILES_PREFIX, dir, parts.join("/")))
}

fn single_segment(rest: &str) -> Option<&str> {
    if is_safe_segment(rest) {
        Some(rest)
    } else {
        None
    }
}

fn is_safe_segment(segment: &str) -> bool {
    !segment.is_empty() && segment != "." && segment != ".." && !segment.contains('/')
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_classify_database() {
        assert_eq!(
            classify_entry("database/esg.db"),
            Some(EntryGroup::Database("esg.db".to_string()))
        );
        assert_eq!(classify_entry("database/nested/esg.db"), None);
        assert_eq!(classify_entry("database/"), None);
    }

    #[test]
    fn test_classify_files() {
        assert_eq!(
            classify_entry("files/uploads/2024/q1/report.pdf"),
            Some(EntryGroup::Files {
                dir: "uploads".to_string(),
                relative: "2024/q1/report.pdf".to_string(),
            })
        );
        assert_eq!(classify_entry("files/uploads"), None);
        assert_eq!(classify_entry("files/uploads/"), None);
    }

    #[test]
    fn test_classify_config() {
        assert_eq!(
            classify_entry("config/settings.json"),
            Some(EntryGroup::Config("settings.json".to_string()))
        );
    }

    #[test]
    fn test_classify_rejects_escapes() {
        assert_eq!(classify_entry("files/uploads/../../etc/passwd"), None);
        assert_eq!(classify_entry("files/../secrets"), None);
        assert_eq!(classify_entry("config/.."), None);
        assert_eq!(classify_entry("files/uploads//a.txt"), None);
        assert_eq!(classify_entry("/database/esg.db"), None);
        assert_eq!(classify_entry("manifest.json"), None);
    }

    #[test]
    fn test_classify_accepts_backslashes() {
        assert_eq!(
            classify_entry("files\\reports\\annual.xlsx"),
            Some(EntryGroup::Files {
                dir: "reports".to_string(),
                relative: "annual.xlsx".to_string(),
            })
        );
    }

    #[test]
    fn test_builders_match_classifier() {
        let entry = files_entry("uploads", &PathBuf::from("a").join("b.txt")).unwrap();
        assert_eq!(entry, "files/uploads/a/b.txt");
        assert!(matches!(
            classify_entry(&entry),
            Some(EntryGroup::Files { .. })
        ));

        assert_eq!(database_entry("esg.db"), "database/esg.db");
        assert_eq!(config_entry("app.ini"), "config/app.ini");
    }

    #[cfg(unix)]
    #[test]
    fn test_files_entry_rejects_backslash_names() {
        // A legal Unix file name that would restore as `a/b.pdf`
        assert_eq!(files_entry("uploads", Path::new("q1\\a\\b.pdf")), None);
        assert_eq!(files_entry("uploads", &PathBuf::from("a\\b").join("c.pdf")), None);
        assert!(!is_portable_name("a\\b.pdf"));
        assert!(is_portable_name("a b.pdf"));
    }

    #[test]
    fn test_files_entry_rejects_parent_components() {
        assert_eq!(files_entry("uploads", Path::new("../x")), None);
        assert_eq!(files_entry("uploads", Path::new("")), None);
    }
}
