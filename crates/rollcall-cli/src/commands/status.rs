//! Status command
//!
//! Handles `rollcall status` to show configuration, today's artifacts, and
//! journal activity.

use std::path::{Path, PathBuf};

use anyhow::Result;
use chrono::Local;
use rollcall_adapters::{CsvJournal, FsArtifactStore};

use crate::app::{initialize, InitOptions};

/// Show configuration and today's evidence
///
/// Displays:
/// - Effective configuration (data directory, cadence, threshold policy)
/// - Artifacts captured today, with sizes
/// - Journal entry count for today
pub async fn run(config_path: Option<PathBuf>) -> Result<()> {
    let ctx = initialize(config_path, InitOptions::command())?;
    let config = ctx.config();
    let policy = config.threshold_config();

    println!("Rollcall Status");
    println!("===============");
    println!();
    println!("Configuration");
    println!("-------------");
    println!(
        "  Data directory: {}",
        config.storage.data_dir.to_string_lossy()
    );
    println!("  Monitor: {}", config.capture.monitor);
    println!(
        "  Cadence: tick every {}s, retry backoff {}s",
        config.capture.tick_seconds, config.capture.backoff_seconds
    );
    println!("  Students expected: {}", config.attendance.student_count);
    println!(
        "  Threshold: {} faces ({} mode, {} required)",
        policy.threshold(),
        policy.mode,
        policy.required()
    );
    println!();

    let store = FsArtifactStore::new(&config.storage.data_dir);
    let day_dir = store.day_dir();
    let artifacts = list_artifacts(&day_dir)?;

    println!("Today's Artifacts");
    println!("-----------------");
    if artifacts.is_empty() {
        println!("  None yet ({})", day_dir.to_string_lossy());
    } else {
        let mut total = 0;
        for (name, size) in &artifacts {
            println!("  {}  {}", name, format_size(*size));
            total += size;
        }
        println!();
        println!("  {} artifacts, {}", artifacts.len(), format_size(total));
    }
    println!();

    let journal = CsvJournal::new(&config.storage.data_dir);
    let journal_file = journal.day_file(Local::now().date_naive());

    println!("Journal");
    println!("-------");
    if journal_file.exists() {
        let entries = count_rows(&journal_file)?;
        println!("  {} entries in {}", entries, journal_file.to_string_lossy());
    } else {
        println!("  No entries for today yet.");
    }

    Ok(())
}

/// Lists PNG artifacts in a day directory, sorted by file name
fn list_artifacts(dir: &Path) -> std::io::Result<Vec<(String, u64)>> {
    let mut artifacts = Vec::new();

    if dir.is_dir() {
        for entry in std::fs::read_dir(dir)? {
            let entry = entry?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("png") {
                continue;
            }
            let metadata = entry.metadata()?;
            if metadata.is_file() {
                let name = entry.file_name().to_string_lossy().into_owned();
                artifacts.push((name, metadata.len()));
            }
        }
    }

    artifacts.sort();
    Ok(artifacts)
}

/// Counts journal rows, excluding the header line
fn count_rows(path: &Path) -> std::io::Result<usize> {
    let contents = std::fs::read_to_string(path)?;
    let lines = contents.lines().filter(|line| !line.is_empty()).count();
    Ok(lines.saturating_sub(1))
}

/// Format file size in human-readable form
fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} bytes", bytes)
    }
}
