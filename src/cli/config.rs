//! Configuration CLI commands

use clap::Subcommand;

use crate::config::Frequency;
use crate::display::format_config;
use crate::error::EsgResult;
use crate::system::BackupSystem;

/// Configuration subcommands
#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Show the current backup configuration
    Show,

    /// Change one or more settings; unspecified settings keep their value
    Set {
        /// Turn scheduled backups on or off
        #[arg(long)]
        enabled: Option<bool>,

        /// daily, weekly (Mondays) or monthly (the 1st)
        #[arg(short, long)]
        frequency: Option<Frequency>,

        /// Trigger time as HH:MM, local time
        #[arg(short, long)]
        time: Option<String>,

        /// Archives to keep
        #[arg(short, long)]
        max_backups: Option<u32>,

        /// Deflate archive entries
        #[arg(long)]
        compress: Option<bool>,

        /// Archive the source directories in full backups
        #[arg(long)]
        include_files: Option<bool>,
    },
}

/// Handle a config command
pub fn handle_config_command(system: &BackupSystem, cmd: ConfigCommands) -> EsgResult<()> {
    match cmd {
        ConfigCommands::Show => {
            println!("{}", format_config(&system.get_config()));
        }

        ConfigCommands::Set {
            enabled,
            frequency,
            time,
            max_backups,
            compress,
            include_files,
        } => {
            // Build the full replacement from the stored values
            let mut config = system.get_config();
            if let Some(enabled) = enabled {
                config.auto_backup_enabled = enabled;
            }
            if let Some(frequency) = frequency {
                config.frequency = frequency;
            }
            if let Some(time) = time {
                config.time_of_day = time;
            }
            if let Some(max_backups) = max_backups {
                config.max_backups = max_backups;
            }
            if let Some(compress) = compress {
                config.compress = compress;
            }
            if let Some(include_files) = include_files {
                config.include_files = include_files;
            }

            system.update_config(config)?;
            println!("Configuration updated.");
            println!();
            println!("{}", format_config(&system.get_config()));
        }
    }

    Ok(())
}
