//! Command-line interface for order.
//!
//! This module handles all CLI-related functionality including:
//! - Argument parsing
//! - Starting and stopping a monitoring session
//! - One-shot scans with a progress bar and summary
//! - Listing the effective category table

use clap::{Parser, Subcommand};
use std::io::{self, BufRead};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use tracing::info;

use crate::config::OrderConfig;
use crate::output::OutputFormatter;
use crate::reconciler::ReconciliationLoop;
use crate::relocator::RelocationOutcome;
use crate::session::{SessionController, SessionError, SessionSettings};
use crate::shutdown::ShutdownSignal;

/// Sort new files into category folders as they appear.
#[derive(Debug, Parser)]
#[command(name = "order", version, about)]
pub struct Cli {
    /// Configuration file (defaults to .orderrc.toml, then ~/.config/order/config.toml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Log every skipped and moved file
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: OrganizeCommand,
}

/// Represents a CLI command to execute.
#[derive(Debug, Clone, Subcommand)]
pub enum OrganizeCommand {
    /// Watch a directory and organize files until Enter is pressed.
    Watch {
        /// Directory to monitor
        directory: PathBuf,
    },
    /// Organize the current contents of a directory once and exit.
    Scan {
        /// Directory to organize
        directory: PathBuf,
    },
    /// Show which extensions go to which folder.
    Categories,
}

/// Runs the parsed command line.
pub fn run_cli(cli: Cli) -> Result<(), String> {
    run_cli_with_config(cli.command, cli.config.as_deref())
}

/// Runs a command with an optional configuration file.
///
/// # Examples
///
/// ```no_run
/// use order::cli::{run_cli_with_config, OrganizeCommand};
/// use std::path::PathBuf;
///
/// let command = OrganizeCommand::Scan { directory: PathBuf::from("/home/me/Downloads") };
/// if let Err(e) = run_cli_with_config(command, None) {
///     eprintln!("Error: {}", e);
/// }
/// ```
pub fn run_cli_with_config(
    command: OrganizeCommand,
    config_path: Option<&Path>,
) -> Result<(), String> {
    let config =
        OrderConfig::load(config_path).map_err(|e| format!("Error loading configuration: {}", e))?;
    let settings =
        SessionSettings::from_config(&config).map_err(|e| format!("Invalid configuration: {}", e))?;

    match command {
        OrganizeCommand::Watch { directory } => watch_directory(&directory, settings),
        OrganizeCommand::Scan { directory } => scan_directory(&directory, &settings),
        OrganizeCommand::Categories => {
            OutputFormatter::categories_table(&settings.table);
            Ok(())
        }
    }
}

/// Monitors `directory` until a line is read from stdin.
///
/// With no interactive stdin, monitoring runs until the process exits.
fn watch_directory(directory: &Path, settings: SessionSettings) -> Result<(), String> {
    let controller = SessionController::new(settings);

    let session = match controller.start(directory) {
        Ok(session) => session,
        Err(e @ SessionError::InvalidDirectory(_)) => {
            OutputFormatter::error("Invalid folder path.");
            return Err(e.to_string());
        }
        Err(e) => return Err(format!("Could not start monitoring: {}", e)),
    };

    OutputFormatter::success(session.status_message());
    OutputFormatter::info(&format!("Watching: {}", session.target().display()));
    OutputFormatter::info("Press Enter to stop.");

    let mut line = String::new();
    match io::stdin().lock().read_line(&mut line) {
        Ok(0) | Err(_) => {
            info!("stdin closed; monitoring until the process exits");
            loop {
                thread::park();
            }
        }
        Ok(_) => {}
    }

    session.stop();
    OutputFormatter::success("Monitoring stopped.");
    Ok(())
}

/// Runs one reconciliation pass over `directory` and prints a summary.
fn scan_directory(directory: &Path, settings: &SessionSettings) -> Result<(), String> {
    if !directory.is_dir() {
        OutputFormatter::error("Invalid folder path.");
        return Err(SessionError::InvalidDirectory(directory.to_path_buf()).to_string());
    }

    OutputFormatter::info(&format!("Organizing contents of: {}", directory.display()));

    let shutdown = ShutdownSignal::new();
    let rescan = ReconciliationLoop::new(
        directory.to_path_buf(),
        Arc::new(settings.dispatcher(shutdown.clone())),
        settings.rescan_interval,
        shutdown,
    );

    let total = rescan
        .list_files()
        .map_err(|e| format!("Error reading directory {}: {}", directory.display(), e))?
        .len();
    if total == 0 {
        OutputFormatter::info("No files found to organize.");
        return Ok(());
    }

    let pb = OutputFormatter::create_progress_bar(total as u64);
    let report = rescan
        .run_cycle_with(|path, outcome| {
            pb.inc(1);
            if let RelocationOutcome::Moved(_) = outcome {
                let name = path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                pb.set_message(name);
            }
        })
        .map_err(|e| format!("Error reading directory {}: {}", directory.display(), e))?;
    pb.finish_and_clear();

    OutputFormatter::summary_table(&report);
    if report.is_complete_success() {
        OutputFormatter::success("Organization complete!");
    } else {
        OutputFormatter::warning(
            "Some files could not be organized; they were left in place and will be retried on the next scan.",
        );
    }

    Ok(())
}
