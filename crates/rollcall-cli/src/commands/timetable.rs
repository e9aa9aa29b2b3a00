//! Timetable command
//!
//! Handles `rollcall timetable` to print the daily capture windows and where
//! each one stands relative to the current local time.

use std::path::PathBuf;

use anyhow::Result;
use rollcall_core::{Clock, SystemClock, Timetable, WindowPosition};

use crate::app::{initialize, InitOptions};

/// Print the daily timetable with the current position of each window
pub async fn run(config_path: Option<PathBuf>) -> Result<()> {
    let ctx = initialize(config_path, InitOptions::command())?;
    let policy = ctx.config().threshold_config();
    let timetable = Timetable::standard();
    let now = SystemClock.now();

    println!("Rollcall Timetable");
    println!("==================");
    println!();
    println!("Local time: {}", now.format("%Y-%m-%d %H:%M:%S"));
    println!(
        "Threshold: {} faces ({} mode, {} required)",
        policy.threshold(),
        policy.mode,
        policy.required()
    );
    println!();

    for (id, window) in timetable.entries() {
        println!(
            "  {:8}  {}  {}",
            id.label(),
            window,
            describe(window.classify(now.time()))
        );
    }

    Ok(())
}

fn describe(position: WindowPosition) -> &'static str {
    match position {
        WindowPosition::Before => "upcoming",
        WindowPosition::Inside => "open now",
        WindowPosition::After => "closed",
    }
}
