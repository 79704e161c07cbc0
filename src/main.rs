//! cellflow - Run command scripts against a reactive spreadsheet

mod commands;
mod config;
mod error;

use anyhow::{Context, Result};
use clap::Parser;
use std::io::{self, Read};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use cellflow_core::Spreadsheet;

#[derive(Parser, Debug)]
#[command(name = "cellflow", version, about = "Reactive calculation engine for a grid of named cells")]
struct Cli {
    /// Config file (default: cellflow.toml in the user config directory).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Snapshot to import before running the script.
    #[arg(long)]
    load: Option<PathBuf>,

    /// Write a snapshot here after the script finishes.
    #[arg(long)]
    save: Option<PathBuf>,

    /// Command script; read from stdin when omitted.
    script: Option<PathBuf>,
}

fn init_tracing(default_level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = config::load_config(cli.config.as_deref())?;
    init_tracing(&config.log_level);

    let mut sheet = Spreadsheet::with_bounds(config.bounds());
    let _subscription = sheet.on_change(|event| tracing::info!(?event, "sheet changed"));

    if let Some(path) = &cli.load {
        sheet
            .load_snapshot(path)
            .with_context(|| format!("loading snapshot {}", path.display()))?;
    }

    let script = match &cli.script {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("reading script {}", path.display()))?,
        None => {
            let mut buf = String::new();
            io::stdin().read_to_string(&mut buf)?;
            buf
        }
    };

    let failures = {
        let stdout = io::stdout();
        let mut out = stdout.lock();
        commands::run_script(&mut sheet, &script, &mut out)?
    };

    if let Some(path) = &cli.save {
        sheet
            .save_snapshot(path)
            .with_context(|| format!("saving snapshot {}", path.display()))?;
    }

    if failures > 0 {
        std::process::exit(1);
    }
    Ok(())
}
