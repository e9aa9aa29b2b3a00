//! Rehearse command
//!
//! Handles `rollcall rehearse`: a dry run of the whole school day on a
//! manual clock, with synthetic capture and detection but the real
//! artifact store and journal. Everything the engine would write on a
//! live day lands on disk, so a rehearsal the evening before surfaces
//! bad paths, missing permissions, or a misconfigured threshold while
//! there is still time to fix them.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Result};
use chrono::{Local, NaiveDateTime, TimeDelta};
use rollcall_adapters::{CsvJournal, FixedCountDetector, FsArtifactStore, SyntheticFrameSource};
use rollcall_core::{
    AttendanceScheduler, Clock, FaultKind, ManualClock, PeriodId, PeriodSnapshot, PeriodState,
    SchedulerEvent, SchedulerSettings, Timetable,
};
use tokio::sync::{broadcast, watch};

use crate::app::{initialize, InitOptions};

/// Tick interval for the rehearsal loop. The manual clock supplies the
/// school-day times, so the real loop only needs to spin fast enough
/// that a full day finishes in about a second.
const REHEARSAL_TICK: Duration = Duration::from_millis(25);

/// How long to wait for one period to settle before moving on.
const SETTLE_DEADLINE: Duration = Duration::from_secs(2);

/// Drive the engine through a full simulated day
///
/// Runs one attempt per period of the standard timetable: the frame
/// source emits a synthetic PNG and the detector reports `faces` (the
/// configured threshold when not given), while artifacts and journal
/// rows are written to the real data directory. Prints a per-period
/// report and fails if any storage or journal fault occurred.
pub async fn run(config_path: Option<PathBuf>, faces: Option<u32>) -> Result<()> {
    let ctx = initialize(config_path, InitOptions::engine())?;
    let config = ctx.config();
    let policy = config.threshold_config();
    let faces = faces.unwrap_or_else(|| policy.threshold());

    let timetable = Timetable::standard();
    let first_start = timetable.entries()[0].1.start();
    let clock = ManualClock::starting_at(
        NaiveDateTime::new(Local::now().date_naive(), first_start) - TimeDelta::minutes(1),
    );

    let store = FsArtifactStore::with_clock(&config.storage.data_dir, Arc::new(clock.clone()));
    let journal = CsvJournal::new(&config.storage.data_dir);
    let journal_file = journal.day_file(clock.today());

    let (_policy_tx, policy_rx) = watch::channel(policy);
    let settings = SchedulerSettings {
        tick_interval: REHEARSAL_TICK,
        backoff: config.scheduler_settings().backoff,
    };
    let engine = AttendanceScheduler::new(
        Arc::new(SyntheticFrameSource::new()),
        Arc::new(FixedCountDetector::new(faces)),
        Arc::new(store),
        Arc::new(journal),
        &timetable,
        policy_rx,
        settings,
    )
    .with_clock(Arc::new(clock.clone()));
    let mut events = engine.subscribe();

    println!("Rollcall Rehearsal");
    println!("==================");
    println!();
    println!(
        "  Data directory: {}",
        config.storage.data_dir.to_string_lossy()
    );
    println!("  Synthetic detector: {} faces per frame", faces);
    println!(
        "  Policy: {} faces ({} mode, {} required)",
        policy.threshold(),
        policy.mode,
        policy.required()
    );
    println!();
    println!("Walking the timetable on a manual clock...");
    println!();

    engine.start().await?;
    tracing::info!(
        "Rehearsal started: {} periods, detector fixed at {} faces",
        timetable.len(),
        faces
    );

    // Step the clock into each window in turn and let the loop run one
    // attempt there. A period that still has no verdict after the
    // deadline is left where it is; the closing sweep below times it
    // out and the report shows the outcome.
    for (id, window) in timetable.entries() {
        clock.set_time(window.start() + TimeDelta::seconds(1));
        let id = *id;
        wait_for(SETTLE_DEADLINE, || {
            engine
                .snapshot(id)
                .map(|s| s.state.is_terminal() || s.last_detected.is_some())
                .unwrap_or(true)
        })
        .await;
    }

    // Past the last window: the sweep closes anything still open.
    let last_end = timetable
        .entries()
        .last()
        .map(|(_, window)| window.end())
        .unwrap_or_default();
    clock.set_time(last_end + TimeDelta::seconds(1));
    wait_for(SETTLE_DEADLINE, || {
        engine.snapshots().iter().all(|s| s.state.is_terminal())
    })
    .await;

    tracing::info!("Stopping rehearsal engine...");
    engine.stop().await?;

    let snapshots = engine.snapshots();
    println!("Periods");
    println!("-------");
    for snapshot in &snapshots {
        let artifact = snapshot
            .artifact
            .as_deref()
            .and_then(Path::file_name)
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        println!(
            "  {:<9} {}  {:<15} {}",
            snapshot.id.label(),
            snapshot.window,
            snapshot.status_line(),
            artifact
        );
    }
    println!();

    println!("Journal");
    println!("-------");
    if journal_file.exists() {
        let entries = count_rows(&journal_file)?;
        println!("  {} entries in {}", entries, journal_file.to_string_lossy());
    } else {
        println!("  Not written ({})", journal_file.to_string_lossy());
    }
    println!();

    let faults = drain_faults(&mut events);
    if !faults.is_empty() {
        println!("Faults");
        println!("------");
        for (period, kind, message) in &faults {
            println!("  {} {}: {}", period, kind, message);
        }
        println!();
        bail!("rehearsal hit {} fault(s); see report above", faults.len());
    }

    let captured = count_state(&snapshots, PeriodState::Completed);
    let timed_out = count_state(&snapshots, PeriodState::TimedOut);
    println!(
        "Rehearsal complete: {} captured, {} timed out of {} periods.",
        captured,
        timed_out,
        snapshots.len()
    );

    Ok(())
}

/// Polls `done` until it holds or the deadline passes
async fn wait_for(deadline: Duration, mut done: impl FnMut() -> bool) -> bool {
    let started = std::time::Instant::now();
    while started.elapsed() < deadline {
        if done() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    done()
}

/// Collects fault events received during the run
fn drain_faults(
    events: &mut broadcast::Receiver<SchedulerEvent>,
) -> Vec<(PeriodId, FaultKind, String)> {
    let mut faults = Vec::new();
    loop {
        match events.try_recv() {
            Ok(SchedulerEvent::Fault {
                period,
                kind,
                message,
            }) => faults.push((period, kind, message)),
            Ok(SchedulerEvent::StateChanged(_)) => {}
            Err(broadcast::error::TryRecvError::Lagged(_)) => {}
            Err(_) => break,
        }
    }
    faults
}

fn count_state(snapshots: &[PeriodSnapshot], state: PeriodState) -> usize {
    snapshots.iter().filter(|s| s.state == state).count()
}

/// Counts journal rows, excluding the header line
fn count_rows(path: &Path) -> std::io::Result<usize> {
    let contents = std::fs::read_to_string(path)?;
    let lines = contents.lines().filter(|line| !line.is_empty()).count();
    Ok(lines.saturating_sub(1))
}
