use std::sync::mpsc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use esg_backup::cli::{handle_backup_command, handle_config_command, BackupCommands, ConfigCommands};
use esg_backup::config::EsgPaths;
use esg_backup::BackupSystem;

#[derive(Parser)]
#[command(
    name = "esg-backup",
    version,
    about = "Backup, retention and restore for the ESG reporting datastore",
    long_about = "esg-backup archives the ESG database together with its uploads, \
                  reports and exports, keeps a bounded history of archives, and \
                  restores from any of them behind a safety snapshot."
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    #[command(flatten)]
    Backup(BackupCommands),

    /// Backup configuration commands
    #[command(subcommand)]
    Config(ConfigCommands),

    /// Run the scheduler in the foreground
    Daemon {
        /// Seconds between schedule checks
        #[arg(short, long, default_value = "60")]
        interval: u64,
    },

    /// Show the directories and files in use
    Paths,
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "esg_backup=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let paths = EsgPaths::new()?;

    match cli.command {
        Some(Commands::Backup(cmd)) => {
            let system = BackupSystem::open(paths)?;
            handle_backup_command(&system, cmd)?;
        }
        Some(Commands::Config(cmd)) => {
            let system = BackupSystem::open(paths)?;
            handle_config_command(&system, cmd)?;
        }
        Some(Commands::Daemon { interval }) => {
            let system =
                BackupSystem::open(paths)?.with_tick_interval(Duration::from_secs(interval.max(1)));
            let (shutdown_tx, shutdown_rx) = mpsc::channel();
            ctrlc::set_handler(move || {
                let _ = shutdown_tx.send(());
            })
            .context("Failed to install shutdown handler")?;

            system.start_scheduler()?;
            println!("Scheduler running. Press Ctrl-C to stop.");

            // Blocks until SIGINT or SIGTERM arrives
            let _ = shutdown_rx.recv();
            system.stop_scheduler();
            println!("Scheduler stopped.");
        }
        Some(Commands::Paths) => {
            println!("esg-backup Paths");
            println!("================");
            println!("Base directory:   {}", paths.base_dir().display());
            println!("Database:         {}", paths.database_file().display());
            for source in paths.source_dirs() {
                println!("Source {:<10} {}", format!("{}:", source.name), source.path.display());
            }
            println!("Config directory: {}", paths.config_dir().display());
            println!("Backup directory: {}", paths.backup_dir().display());
            println!("Settings file:    {}", paths.settings_file().display());
            println!("Catalog:          {}", paths.catalog_dir().display());
        }
        None => {
            println!("esg-backup - Backup and recovery for the ESG datastore");
            println!();
            println!("Run 'esg-backup --help' for usage information.");
        }
    }

    Ok(())
}
