//! activesetctl - inspect and switch the active firmware set
//!
//! Reads and updates the redundant configuration slots of a flash image or
//! device node, and performs the boot-time watchdog failover.

#![deny(static_mut_refs)]
#![deny(unused_must_use)]
#![deny(clippy::unwrap_used)]

mod commands;
mod error;
mod output;

use std::path::PathBuf;
use std::process::ExitCode;

use activeset::{
    ActiveSetSelector, FileFlash, FileResetCause, FixedResetCause, LayoutConfig,
    ResetCauseProvider, WatchdogFailover, parse_reset_cause,
};
use anyhow::{Context, Result};
use clap::Parser;
use tracing::debug;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::error::CliError;

#[derive(Parser, Debug)]
#[command(name = "activesetctl")]
#[command(about = "Inspect and switch the active firmware set")]
#[command(version)]
#[command(long_about = "
activesetctl reads the redundant configuration slots stored on a flash image
or device and reports which one is the active set.

With no arguments it prints the active set index. Passing an index makes that
slot active. -w performs the boot-time check: if the previous reset was a
watchdog reset, the next slot becomes active.

Use --json for machine-readable output suitable for scripting.
")]
struct Cli {
    /// Slot index to make active
    #[arg(
        value_name = "IDX",
        allow_negative_numbers = true,
        conflicts_with_all = ["watchdog", "status"]
    )]
    index: Option<i64>,

    /// Rotate to the next slot if the last reset was a watchdog reset
    #[arg(short = 'w', long, conflicts_with = "status")]
    watchdog: bool,

    /// Show the state of every slot
    #[arg(long)]
    status: bool,

    /// Flash image or device node holding the slots
    #[arg(long, env = "ACTIVESET_DEVICE", value_name = "PATH")]
    device: PathBuf,

    /// JSON slot layout; the reference layout is used when omitted
    #[arg(long, env = "ACTIVESET_CONFIG", value_name = "PATH")]
    config: Option<PathBuf>,

    /// Reset cause of the current boot, decimal or 0x hex
    #[arg(
        long,
        env = "ACTIVESET_RESET_CAUSE",
        value_name = "VALUE",
        value_parser = parse_reset_cause,
        conflicts_with = "reset_cause_file"
    )]
    reset_cause: Option<u32>,

    /// File holding the reset cause of the current boot
    #[arg(long, value_name = "PATH")]
    reset_cause_file: Option<PathBuf>,

    /// Output in JSON format for machine parsing
    #[arg(long, global = true)]
    json: bool,

    /// Verbose logging
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
}

impl Cli {
    fn layout(&self) -> Result<LayoutConfig> {
        let layout = match &self.config {
            Some(path) => LayoutConfig::load_from_path(path).map_err(CliError::from)?,
            None => LayoutConfig::default(),
        };
        Ok(layout)
    }

    fn reset_cause_provider(&self) -> Result<Box<dyn ResetCauseProvider>> {
        if let Some(path) = &self.reset_cause_file {
            let provider = FileResetCause::from_path(path).map_err(CliError::from)?;
            return Ok(Box::new(provider));
        }
        Ok(Box::new(FixedResetCause(self.reset_cause.unwrap_or(0))))
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let log_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("activesetctl={log_level},activeset={log_level}").into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    match execute(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            if cli.json {
                output::print_error_json(&e);
            } else {
                output::print_error_human(&e);
            }

            let exit_code = e.downcast_ref::<CliError>().map_or(1, CliError::exit_code);
            ExitCode::from(exit_code)
        }
    }
}

fn execute(cli: &Cli) -> Result<()> {
    let layout = cli.layout()?;
    debug!(device = %cli.device.display(), slots = layout.slot_count(), "Opening active set store");
    let mut selector = ActiveSetSelector::open(FileFlash::new(&cli.device), &layout)
        .map_err(CliError::from)
        .context("Failed to open active set store")?;

    if cli.watchdog {
        let provider = cli.reset_cause_provider()?;
        let policy = WatchdogFailover::from_layout(&layout);
        return commands::watchdog(&mut selector, &policy, provider.as_ref(), cli.json);
    }
    if cli.status {
        return commands::status(&mut selector, cli.json);
    }
    match cli.index {
        Some(raw) => commands::set_active(&mut selector, raw, cli.json),
        None => commands::show_active(&mut selector, cli.json),
    }
}
