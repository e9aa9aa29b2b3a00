//! Attendance scheduler
//!
//! Drives the school day: a recurring tick sweeps closed windows, picks
//! the next eligible period, runs the capture pipeline, persists
//! satisfied frames, and settles the outcome on the period state
//! machine. One background task owns the loop and awaits each attempt
//! to settlement before the next tick, so a single capture+detect
//! sequence is in flight at any time across the whole application.
//!
//! User commands (`skip`, `retry`) mutate the schedule under the same
//! mutex the tick uses and are therefore serialized against it. Every
//! state transition is published, in transition order, on a broadcast
//! channel of immutable snapshots.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::TimeDelta;
use thiserror::Error;
use tokio::sync::{broadcast, watch, Notify};
use tracing::{debug, error, info, warn};

use crate::clock::{Clock, SystemClock};
use crate::pipeline::{self, AttemptFault};
use crate::ports::{
    CapturePort, DetectorPort, JournalPort, JournalRecord, JournalStatus, StoragePort,
};
use crate::schedule::{AttemptResolution, AttemptTicket, CommandError, PeriodSnapshot, ScheduleSet};
use crate::threshold::ThresholdConfig;
use crate::timetable::{PeriodId, Timetable, WindowPosition};

/// Consecutive attempt faults before the log escalates to a warning.
const MAX_CONSECUTIVE_FAULTS: u64 = 5;

/// Errors surfaced by scheduler lifecycle and command calls.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// The scheduler loop is already running.
    #[error("scheduler is already running")]
    AlreadyRunning,

    /// The scheduler loop is not running.
    #[error("scheduler is not running")]
    NotRunning,

    /// A user command was not valid for the period's current state.
    #[error(transparent)]
    Command(#[from] CommandError),
}

/// Which collaborator a fault came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultKind {
    Capture,
    Detection,
    Persistence,
    Journal,
}

impl FaultKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FaultKind::Capture => "capture",
            FaultKind::Detection => "detection",
            FaultKind::Persistence => "persistence",
            FaultKind::Journal => "journal",
        }
    }
}

impl std::fmt::Display for FaultKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Messages published to status subscribers.
#[derive(Debug, Clone)]
pub enum SchedulerEvent {
    /// A period changed state; the snapshot reflects the new state.
    StateChanged(PeriodSnapshot),
    /// A resource or persistence problem worth the user's attention,
    /// distinct from routine below-threshold attempts.
    Fault {
        period: PeriodId,
        kind: FaultKind,
        message: String,
    },
}

/// Tunable intervals for the scheduler loop.
#[derive(Debug, Clone, Copy)]
pub struct SchedulerSettings {
    /// Delay between eligibility ticks. Must not exceed `backoff` or
    /// windows could close unnoticed between attempts.
    pub tick_interval: Duration,
    /// Cooldown armed after an unsatisfied attempt that leaves the
    /// period still eligible.
    pub backoff: Duration,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_secs(1),
            backoff: Duration::from_secs(10),
        }
    }
}

impl SchedulerSettings {
    fn backoff_delta(&self) -> TimeDelta {
        TimeDelta::from_std(self.backoff).unwrap_or_else(|_| TimeDelta::seconds(10))
    }
}

/// The attendance capture engine.
///
/// Generic over its four collaborator ports so tests can substitute
/// in-memory fakes. Construction wires the timetable and the live
/// threshold policy; `start` spawns the tick loop and `stop` shuts it
/// down after any in-flight attempt settles.
pub struct AttendanceScheduler<C, D, S, J>
where
    C: CapturePort + 'static,
    D: DetectorPort + 'static,
    S: StoragePort + 'static,
    J: JournalPort + 'static,
{
    capture_port: Arc<C>,
    detector_port: Arc<D>,
    storage_port: Arc<S>,
    journal_port: Arc<J>,
    clock: Arc<dyn Clock>,
    policy: watch::Receiver<ThresholdConfig>,
    settings: SchedulerSettings,
    schedule: Arc<Mutex<ScheduleSet>>,
    events: broadcast::Sender<SchedulerEvent>,
    /// Flag to indicate if the loop is running
    running: Arc<AtomicBool>,
    /// Signal to stop the loop
    stop_signal: Arc<Notify>,
    /// Wakes the loop ahead of the next tick, e.g. after a retry command
    nudge: Arc<Notify>,
    /// Counter for consecutive attempt faults
    consecutive_faults: Arc<AtomicU64>,
}

impl<C, D, S, J> AttendanceScheduler<C, D, S, J>
where
    C: CapturePort + 'static,
    D: DetectorPort + 'static,
    S: StoragePort + 'static,
    J: JournalPort + 'static,
{
    /// Creates a scheduler over the given collaborators and timetable.
    ///
    /// `policy` is the live threshold configuration; the value it holds
    /// when an attempt starts is the one the head count is compared
    /// against, so the owning side can adjust class size or mode
    /// mid-session.
    pub fn new(
        capture_port: Arc<C>,
        detector_port: Arc<D>,
        storage_port: Arc<S>,
        journal_port: Arc<J>,
        timetable: &Timetable,
        policy: watch::Receiver<ThresholdConfig>,
        settings: SchedulerSettings,
    ) -> Self {
        let (events, _) = broadcast::channel(256);
        let schedule = ScheduleSet::new(timetable, settings.backoff_delta());
        Self {
            capture_port,
            detector_port,
            storage_port,
            journal_port,
            clock: Arc::new(SystemClock),
            policy,
            settings,
            schedule: Arc::new(Mutex::new(schedule)),
            events,
            running: Arc::new(AtomicBool::new(false)),
            stop_signal: Arc::new(Notify::new()),
            nudge: Arc::new(Notify::new()),
            consecutive_faults: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Substitutes the time source. Tests and rehearsal runs position a
    /// manual clock anywhere in the school day.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Returns whether the scheduler loop is currently running.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Returns the number of consecutive attempt faults.
    pub fn consecutive_faults(&self) -> u64 {
        self.consecutive_faults.load(Ordering::SeqCst)
    }

    /// Subscribes to state transitions and fault alerts. Subscribe
    /// before `start` to observe the whole session.
    pub fn subscribe(&self) -> broadcast::Receiver<SchedulerEvent> {
        self.events.subscribe()
    }

    /// Snapshot of a single period.
    pub fn snapshot(&self, id: PeriodId) -> Option<PeriodSnapshot> {
        lock_set(&self.schedule).snapshot(id)
    }

    /// Snapshots of every period in timetable order.
    pub fn snapshots(&self) -> Vec<PeriodSnapshot> {
        lock_set(&self.schedule).snapshots()
    }

    /// Starts the tick loop.
    ///
    /// This spawns a background task that evaluates the timetable on
    /// every tick. The task runs until `stop()` is called.
    ///
    /// # Errors
    /// Returns `SchedulerError::AlreadyRunning` if the loop is already active
    pub async fn start(&self) -> Result<(), SchedulerError> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(SchedulerError::AlreadyRunning);
        }

        let periods = lock_set(&self.schedule).len();
        info!(
            "Starting attendance scheduler: {} periods, tick {:?}, backoff {:?}",
            periods, self.settings.tick_interval, self.settings.backoff
        );

        let worker = TickWorker {
            capture_port: Arc::clone(&self.capture_port),
            detector_port: Arc::clone(&self.detector_port),
            storage_port: Arc::clone(&self.storage_port),
            journal_port: Arc::clone(&self.journal_port),
            clock: Arc::clone(&self.clock),
            policy: self.policy.clone(),
            schedule: Arc::clone(&self.schedule),
            events: self.events.clone(),
            consecutive_faults: Arc::clone(&self.consecutive_faults),
        };
        let running = Arc::clone(&self.running);
        let stop_signal = Arc::clone(&self.stop_signal);
        let nudge = Arc::clone(&self.nudge);
        let tick_interval = self.settings.tick_interval;

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = stop_signal.notified() => {
                        info!("Received stop signal, shutting down scheduler");
                        break;
                    }
                    _ = nudge.notified() => {
                        worker.run_tick().await;
                    }
                    _ = tokio::time::sleep(tick_interval) => {
                        worker.run_tick().await;
                    }
                }
            }
            running.store(false, Ordering::SeqCst);
            info!("Scheduler stopped");
        });

        Ok(())
    }

    /// Stops the tick loop.
    ///
    /// Sends a stop signal to the background task and waits for it to
    /// finish; an attempt already in flight settles first.
    ///
    /// # Errors
    /// Returns `SchedulerError::NotRunning` if the loop is not active
    pub async fn stop(&self) -> Result<(), SchedulerError> {
        if !self.running.load(Ordering::SeqCst) {
            return Err(SchedulerError::NotRunning);
        }

        info!("Stopping scheduler...");
        self.stop_signal.notify_one();

        // Wait for the loop to wind down
        while self.running.load(Ordering::SeqCst) {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        Ok(())
    }

    /// Skips a period on user command.
    ///
    /// Valid from Pending or Attempting. An attempt already in flight
    /// finishes on its own but its verdict is discarded; Skipped is
    /// never overwritten by a late completion.
    ///
    /// # Errors
    /// Returns the underlying `CommandError` when the period is unknown
    /// or already terminal.
    pub async fn skip(&self, id: PeriodId) -> Result<PeriodSnapshot, SchedulerError> {
        // Transition and publication happen under the lock so subscribers
        // see transitions in the order they occurred.
        let snapshot = {
            let mut set = lock_set(&self.schedule);
            let snapshot = set.skip(id)?;
            let _ = self
                .events
                .send(SchedulerEvent::StateChanged(snapshot.clone()));
            snapshot
        };
        info!("Period {} skipped by user", id);

        let threshold = self.policy.borrow().threshold();
        let record = JournalRecord {
            at: self.clock.now(),
            period: id,
            status: JournalStatus::Skipped,
            detected: snapshot.last_detected,
            threshold: snapshot.last_threshold.unwrap_or(threshold),
            artifact: None,
            note: "user skip".to_string(),
        };
        if let Err(err) = self.journal_port.append(&record).await {
            warn!("Journal append failed for skip of {}: {}", id, err);
            let _ = self.events.send(SchedulerEvent::Fault {
                period: id,
                kind: FaultKind::Journal,
                message: err.to_string(),
            });
        }
        Ok(snapshot)
    }

    /// Resets a terminal period and queues one forced attempt that
    /// bypasses the backoff (and the window, once it has closed: the
    /// retake is then saved as a separate artifact).
    ///
    /// # Errors
    /// Returns the underlying `CommandError` when the period is not
    /// terminal or its window has not opened yet.
    pub async fn retry(&self, id: PeriodId) -> Result<PeriodSnapshot, SchedulerError> {
        let now = self.clock.now();
        let snapshot = {
            let mut set = lock_set(&self.schedule);
            let snapshot = set.retry(id, now)?;
            let _ = self
                .events
                .send(SchedulerEvent::StateChanged(snapshot.clone()));
            snapshot
        };
        info!("Retry requested for {}", id);

        // Wake the loop so the forced attempt runs without waiting out
        // the current tick.
        self.nudge.notify_one();
        Ok(snapshot)
    }
}

fn lock_set(schedule: &Mutex<ScheduleSet>) -> MutexGuard<'_, ScheduleSet> {
    schedule.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Everything one tick needs, cloned into the loop task.
struct TickWorker<C, D, S, J> {
    capture_port: Arc<C>,
    detector_port: Arc<D>,
    storage_port: Arc<S>,
    journal_port: Arc<J>,
    clock: Arc<dyn Clock>,
    policy: watch::Receiver<ThresholdConfig>,
    schedule: Arc<Mutex<ScheduleSet>>,
    events: broadcast::Sender<SchedulerEvent>,
    consecutive_faults: Arc<AtomicU64>,
}

impl<C, D, S, J> TickWorker<C, D, S, J>
where
    C: CapturePort,
    D: DetectorPort,
    S: StoragePort,
    J: JournalPort,
{
    async fn run_tick(&self) {
        let now = self.clock.now();
        let policy = *self.policy.borrow();

        // Close expired windows first so nothing launches into them.
        let swept = {
            let mut set = lock_set(&self.schedule);
            let swept = set.sweep_timed_out(now);
            for snapshot in &swept {
                let _ = self
                    .events
                    .send(SchedulerEvent::StateChanged(snapshot.clone()));
            }
            swept
        };
        for snapshot in swept {
            info!("{} window closed without a capture", snapshot.id);
            self.journal(JournalRecord {
                at: now,
                period: snapshot.id,
                status: JournalStatus::TimedOut,
                detected: snapshot.last_detected,
                threshold: snapshot.last_threshold.unwrap_or(policy.threshold()),
                artifact: None,
                note: "window closed".to_string(),
            })
            .await;
        }

        let ticket = {
            let mut set = lock_set(&self.schedule);
            let ticket = set.begin_next_attempt(now);
            if let Some(ticket) = &ticket {
                let _ = self
                    .events
                    .send(SchedulerEvent::StateChanged(ticket.snapshot.clone()));
            }
            ticket
        };
        let Some(ticket) = ticket else {
            return;
        };

        debug!(
            "Attempt starting for {} (forced: {}, threshold {})",
            ticket.id,
            ticket.forced,
            policy.threshold()
        );
        self.run_attempt(ticket, policy).await;
    }

    async fn run_attempt(&self, ticket: AttemptTicket, policy: ThresholdConfig) {
        let verdict = pipeline::run_attempt(
            self.capture_port.as_ref(),
            self.detector_port.as_ref(),
            policy,
        )
        .await;

        if let Some(fault) = &verdict.fault {
            self.note_fault(ticket.id, fault, verdict.threshold).await;
        } else {
            self.consecutive_faults.store(0, Ordering::SeqCst);
        }

        // Persist before settling: a satisfied verdict only completes
        // the period once the artifact has landed. A period skipped
        // while the attempt was in flight gets no artifact at all.
        let mut artifact = None;
        if verdict.satisfied {
            let still_attempting = lock_set(&self.schedule).is_attempting(ticket.id);
            if still_attempting {
                if let Some(frame) = verdict.frame.as_ref() {
                    let overwrite = ticket.position == WindowPosition::Inside;
                    match self.storage_port.save(frame, ticket.id, overwrite).await {
                        Ok(path) => artifact = Some(path),
                        Err(err) => {
                            error!("Artifact save failed for {}: {}", ticket.id, err);
                            let _ = self.events.send(SchedulerEvent::Fault {
                                period: ticket.id,
                                kind: FaultKind::Persistence,
                                message: err.to_string(),
                            });
                            self.journal(JournalRecord {
                                at: self.clock.now(),
                                period: ticket.id,
                                status: JournalStatus::Fault,
                                detected: verdict.detected,
                                threshold: verdict.threshold,
                                artifact: None,
                                note: format!("save failed: {err}"),
                            })
                            .await;
                        }
                    }
                }
            }
        }

        let settled_at = self.clock.now();
        let resolution = {
            let mut set = lock_set(&self.schedule);
            let resolution = set.settle_attempt(ticket.id, &verdict, artifact, settled_at);
            match &resolution {
                AttemptResolution::Completed(snapshot)
                | AttemptResolution::Shortfall(snapshot)
                | AttemptResolution::TimedOut(snapshot)
                | AttemptResolution::SaveFailed(snapshot) => {
                    let _ = self
                        .events
                        .send(SchedulerEvent::StateChanged(snapshot.clone()));
                }
                AttemptResolution::Discarded => {}
            }
            resolution
        };

        match resolution {
            AttemptResolution::Completed(snapshot) => {
                let name = snapshot
                    .artifact
                    .as_deref()
                    .and_then(|path| path.file_name())
                    .map(|name| name.to_string_lossy().into_owned());
                info!(
                    "{} captured: {} faces (threshold {}), artifact {}",
                    snapshot.id,
                    snapshot.last_detected.unwrap_or(0),
                    verdict.threshold,
                    name.as_deref().unwrap_or("?")
                );
                self.journal(JournalRecord {
                    at: settled_at,
                    period: snapshot.id,
                    status: JournalStatus::Captured,
                    detected: verdict.detected,
                    threshold: verdict.threshold,
                    artifact: name,
                    note: if ticket.forced {
                        format!("{} mode, manual retake", policy.mode)
                    } else {
                        format!("{} mode", policy.mode)
                    },
                })
                .await;
            }
            AttemptResolution::Shortfall(snapshot) => {
                // A faulted attempt already journaled its own row (or was
                // transient); shortfall rows are for counted attempts.
                if verdict.fault.is_some() {
                    return;
                }
                debug!(
                    "{} below threshold: {} of {} required, backing off",
                    snapshot.id,
                    snapshot.last_detected.unwrap_or(0),
                    verdict.required
                );
                self.journal(JournalRecord {
                    at: settled_at,
                    period: snapshot.id,
                    status: JournalStatus::Shortfall,
                    detected: verdict.detected,
                    threshold: verdict.threshold,
                    artifact: None,
                    note: format!("required {}", verdict.required),
                })
                .await;
            }
            AttemptResolution::TimedOut(snapshot) => {
                info!("{} window closed during the attempt", snapshot.id);
                self.journal(JournalRecord {
                    at: settled_at,
                    period: snapshot.id,
                    status: JournalStatus::TimedOut,
                    detected: verdict.detected,
                    threshold: verdict.threshold,
                    artifact: None,
                    note: "window closed".to_string(),
                })
                .await;
            }
            AttemptResolution::SaveFailed(_) => {
                // Fault row and alert already emitted by the save path;
                // the period is pending again and will retry.
            }
            AttemptResolution::Discarded => {
                info!(
                    "Verdict for {} discarded, period was skipped mid-attempt",
                    ticket.id
                );
            }
        }
    }

    /// Classifies an attempt fault: transient ones back off quietly,
    /// resource faults raise an alert and a journal row.
    async fn note_fault(&self, id: PeriodId, fault: &AttemptFault, threshold: u32) {
        let faults = self.consecutive_faults.fetch_add(1, Ordering::SeqCst) + 1;
        if faults >= MAX_CONSECUTIVE_FAULTS {
            warn!("Attempts have faulted {} consecutive times", faults);
        }

        if fault.is_transient() {
            debug!("Transient fault on {}: {}", id, fault);
            return;
        }

        let kind = match fault {
            AttemptFault::Capture(_) => FaultKind::Capture,
            AttemptFault::Detector(_) => FaultKind::Detection,
        };
        warn!("{} fault on {}: {}", kind, id, fault);
        let _ = self.events.send(SchedulerEvent::Fault {
            period: id,
            kind,
            message: fault.to_string(),
        });
        self.journal(JournalRecord {
            at: self.clock.now(),
            period: id,
            status: JournalStatus::Fault,
            detected: None,
            threshold,
            artifact: None,
            note: fault.to_string(),
        })
        .await;
    }

    async fn journal(&self, record: JournalRecord) {
        if let Err(err) = self.journal_port.append(&record).await {
            warn!("Journal append failed: {}", err);
            let _ = self.events.send(SchedulerEvent::Fault {
                period: record.period,
                kind: FaultKind::Journal,
                message: err.to_string(),
            });
        }
    }
}
