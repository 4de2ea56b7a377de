//! Display formatting for terminal output
//!
//! Provides utilities for formatting catalog history, configuration and
//! archive checks for terminal display.

pub mod backup;

pub use backup::{
    format_backup_list, format_config, format_duration, format_prune_report,
    format_recovery_list, format_size, format_validation,
};
