//! Rollcall CLI - proof-of-attendance capture for scheduled classes
//!
//! Main entry point for the rollcall application.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

mod app;
mod commands;

#[derive(Parser)]
#[command(name = "rollcall", version, about = "Scheduled attendance capture for video classes")]
struct Cli {
    /// Path to the configuration file (default: ~/.rollcall/config.toml)
    #[arg(short, long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print today's capture timetable and where each period stands
    Timetable,
    /// Show configuration, today's artifacts, and journal activity
    Status,
    /// Drive a full simulated day against synthetic capture and detection
    Rehearse {
        /// Face count the synthetic detector reports (default: the configured threshold)
        #[arg(long)]
        faces: Option<u32>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Timetable => commands::timetable::run(cli.config).await,
        Command::Status => commands::status::run(cli.config).await,
        Command::Rehearse { faces } => commands::rehearse::run(cli.config, faces).await,
    }
}
