//! Period state machine and schedule bookkeeping
//!
//! [`ScheduleSet`] owns every period for the day and is the only place
//! period state changes. It is a plain synchronous struct: the scheduler
//! wraps it in a mutex and drives it from one task, which keeps the
//! temporal rules testable without a runtime. Periods are created once
//! from the timetable and live for the whole session; terminal states are
//! left only through an explicit reset.

use std::path::PathBuf;

use chrono::{NaiveDateTime, TimeDelta};
use thiserror::Error;

use crate::pipeline::CaptureVerdict;
use crate::timetable::{CaptureWindow, PeriodId, Timetable, WindowPosition};

/// Lifecycle state of one period.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeriodState {
    /// Waiting for its window, or for a backoff to lapse.
    Pending,
    /// A capture attempt is in flight.
    Attempting,
    /// Proof artifact persisted. Terminal.
    Completed,
    /// Skipped on user command. Terminal.
    Skipped,
    /// Window closed without a satisfied attempt. Terminal.
    TimedOut,
}

impl PeriodState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PeriodState::Completed | PeriodState::Skipped | PeriodState::TimedOut
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PeriodState::Pending => "pending",
            PeriodState::Attempting => "attempting",
            PeriodState::Completed => "completed",
            PeriodState::Skipped => "skipped",
            PeriodState::TimedOut => "timed_out",
        }
    }
}

impl std::fmt::Display for PeriodState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Immutable copy of one period's visible state, handed to subscribers
/// and the presentation layer.
#[derive(Debug, Clone, PartialEq)]
pub struct PeriodSnapshot {
    pub id: PeriodId,
    pub window: CaptureWindow,
    pub state: PeriodState,
    pub completed_at: Option<NaiveDateTime>,
    pub last_detected: Option<u32>,
    pub last_threshold: Option<u32>,
    pub artifact: Option<PathBuf>,
}

impl PeriodSnapshot {
    /// One-line status as the presentation layer renders it.
    pub fn status_line(&self) -> String {
        match (self.state, self.last_detected) {
            (PeriodState::Pending, None) => "waiting".to_string(),
            (PeriodState::Pending, Some(n)) => format!("detecting ({n})"),
            (PeriodState::Attempting, None) => "detecting".to_string(),
            (PeriodState::Attempting, Some(n)) => format!("detecting ({n})"),
            (PeriodState::Completed, Some(n)) => format!("captured ({n})"),
            (PeriodState::Completed, None) => "captured".to_string(),
            (PeriodState::Skipped, _) => "skipped".to_string(),
            (PeriodState::TimedOut, _) => "timed out".to_string(),
        }
    }
}

/// Everything the scheduler needs to run one attempt it has just begun.
#[derive(Debug, Clone, PartialEq)]
pub struct AttemptTicket {
    pub id: PeriodId,
    /// Window position at launch; decides save semantics (overwrite while
    /// Inside, retake otherwise).
    pub position: WindowPosition,
    /// Whether a user retry forced this attempt.
    pub forced: bool,
    /// Post-transition snapshot (state is Attempting).
    pub snapshot: PeriodSnapshot,
}

/// How a settled attempt left its period.
#[derive(Debug)]
pub enum AttemptResolution {
    /// Threshold satisfied and the artifact landed.
    Completed(PeriodSnapshot),
    /// Attempt ran, count fell short, window still open. Backoff armed.
    Shortfall(PeriodSnapshot),
    /// Unsatisfied and the window has closed.
    TimedOut(PeriodSnapshot),
    /// Threshold satisfied but the artifact did not land; the period
    /// stays eligible for retry.
    SaveFailed(PeriodSnapshot),
    /// The period left Attempting while the attempt was in flight
    /// (skipped); the verdict is dropped.
    Discarded,
}

/// Rejected user commands.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandError {
    #[error("unknown period")]
    UnknownPeriod,

    #[error("period is {0}, only pending or attempting periods can be skipped")]
    NotSkippable(PeriodState),

    #[error("period is {0}, only completed, skipped or timed-out periods can be retried")]
    NotRetryable(PeriodState),

    #[error("capture window has not opened yet")]
    BeforeWindow,
}

#[derive(Debug, Clone)]
struct PeriodSlot {
    id: PeriodId,
    window: CaptureWindow,
    state: PeriodState,
    completed_at: Option<NaiveDateTime>,
    last_detected: Option<u32>,
    last_threshold: Option<u32>,
    artifact: Option<PathBuf>,
    /// Earliest instant the next automatic attempt may run.
    not_before: Option<NaiveDateTime>,
    /// A user retry queued one forced attempt, exempt from window and
    /// backoff checks (and from the timeout sweep until it resolves).
    retry_asap: bool,
}

impl PeriodSlot {
    fn new(id: PeriodId, window: CaptureWindow) -> Self {
        Self {
            id,
            window,
            state: PeriodState::Pending,
            completed_at: None,
            last_detected: None,
            last_threshold: None,
            artifact: None,
            not_before: None,
            retry_asap: false,
        }
    }

    fn snapshot(&self) -> PeriodSnapshot {
        PeriodSnapshot {
            id: self.id,
            window: self.window,
            state: self.state,
            completed_at: self.completed_at,
            last_detected: self.last_detected,
            last_threshold: self.last_threshold,
            artifact: self.artifact.clone(),
        }
    }
}

/// The day's periods, in timetable order. Single-writer: all mutation
/// funnels through the scheduler task that owns the surrounding mutex.
#[derive(Debug)]
pub struct ScheduleSet {
    slots: Vec<PeriodSlot>,
    backoff: TimeDelta,
}

impl ScheduleSet {
    /// Builds the set with every period Pending.
    ///
    /// `backoff` is the cooldown armed after an unsatisfied attempt that
    /// leaves the period still eligible.
    pub fn new(timetable: &Timetable, backoff: TimeDelta) -> Self {
        let slots = timetable
            .entries()
            .iter()
            .map(|(id, window)| PeriodSlot::new(*id, *window))
            .collect();
        Self { slots, backoff }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn snapshot(&self, id: PeriodId) -> Option<PeriodSnapshot> {
        self.slot(id).map(PeriodSlot::snapshot)
    }

    /// Snapshots of every period, timetable order.
    pub fn snapshots(&self) -> Vec<PeriodSnapshot> {
        self.slots.iter().map(PeriodSlot::snapshot).collect()
    }

    pub fn state(&self, id: PeriodId) -> Option<PeriodState> {
        self.slot(id).map(|slot| slot.state)
    }

    /// Whether an attempt begun earlier is still the period's current
    /// activity. Checked before acting on its results mid-flight.
    pub fn is_attempting(&self, id: PeriodId) -> bool {
        self.state(id) == Some(PeriodState::Attempting)
    }

    /// Moves every period whose window has closed from Pending to
    /// TimedOut. Periods holding a forced retry are left alone until that
    /// attempt resolves. Returns one snapshot per transition.
    pub fn sweep_timed_out(&mut self, now: NaiveDateTime) -> Vec<PeriodSnapshot> {
        let time = now.time();
        let mut swept = Vec::new();
        for slot in &mut self.slots {
            if slot.state == PeriodState::Pending
                && !slot.retry_asap
                && slot.window.classify(time) == WindowPosition::After
            {
                slot.state = PeriodState::TimedOut;
                slot.not_before = None;
                swept.push(slot.snapshot());
            }
        }
        swept
    }

    /// Begins the next eligible attempt, if any.
    ///
    /// At most one period may be Attempting across the whole set; while
    /// one is, this returns None. Otherwise the first period in timetable
    /// order that is Pending and either holds a forced retry or sits
    /// inside its window with no cooldown outstanding moves to Attempting.
    pub fn begin_next_attempt(&mut self, now: NaiveDateTime) -> Option<AttemptTicket> {
        if self
            .slots
            .iter()
            .any(|slot| slot.state == PeriodState::Attempting)
        {
            return None;
        }

        let time = now.time();
        let idx = self.slots.iter().position(|slot| {
            slot.state == PeriodState::Pending
                && (slot.retry_asap
                    || (slot.window.classify(time) == WindowPosition::Inside
                        && slot.not_before.map_or(true, |earliest| now >= earliest)))
        })?;

        let slot = &mut self.slots[idx];
        let forced = slot.retry_asap;
        slot.retry_asap = false;
        slot.not_before = None;
        slot.state = PeriodState::Attempting;

        Some(AttemptTicket {
            id: slot.id,
            position: slot.window.classify(time),
            forced,
            snapshot: slot.snapshot(),
        })
    }

    /// Applies a finished attempt to its period.
    ///
    /// `artifact` is the path the store returned for a satisfied verdict;
    /// a satisfied verdict without one means persistence failed and the
    /// period must not complete. A period that left Attempting while the
    /// attempt ran (skip) discards the verdict unchanged.
    pub fn settle_attempt(
        &mut self,
        id: PeriodId,
        verdict: &CaptureVerdict,
        artifact: Option<PathBuf>,
        now: NaiveDateTime,
    ) -> AttemptResolution {
        let backoff = self.backoff;
        let Some(slot) = self.slot_mut(id) else {
            return AttemptResolution::Discarded;
        };
        if slot.state != PeriodState::Attempting {
            return AttemptResolution::Discarded;
        }

        if let Some(detected) = verdict.detected {
            slot.last_detected = Some(detected);
        }
        slot.last_threshold = Some(verdict.threshold);

        if verdict.satisfied {
            match artifact {
                Some(path) => {
                    slot.state = PeriodState::Completed;
                    slot.completed_at = Some(now);
                    slot.artifact = Some(path);
                    slot.not_before = None;
                    AttemptResolution::Completed(slot.snapshot())
                }
                None => {
                    slot.state = PeriodState::Pending;
                    slot.not_before = Some(now + backoff);
                    AttemptResolution::SaveFailed(slot.snapshot())
                }
            }
        } else if slot.window.classify(now.time()) == WindowPosition::After {
            slot.state = PeriodState::TimedOut;
            slot.not_before = None;
            AttemptResolution::TimedOut(slot.snapshot())
        } else {
            slot.state = PeriodState::Pending;
            slot.not_before = Some(now + backoff);
            AttemptResolution::Shortfall(slot.snapshot())
        }
    }

    /// Skips a period on user command. Valid from Pending or Attempting;
    /// an in-flight attempt keeps running but its verdict will be
    /// discarded.
    pub fn skip(&mut self, id: PeriodId) -> Result<PeriodSnapshot, CommandError> {
        let slot = self.slot_mut(id).ok_or(CommandError::UnknownPeriod)?;
        match slot.state {
            PeriodState::Pending | PeriodState::Attempting => {
                slot.state = PeriodState::Skipped;
                slot.retry_asap = false;
                slot.not_before = None;
                Ok(slot.snapshot())
            }
            other => Err(CommandError::NotSkippable(other)),
        }
    }

    /// Resets a terminal period back to Pending. The only way out of a
    /// terminal state.
    pub fn reset(&mut self, id: PeriodId) -> Result<PeriodSnapshot, CommandError> {
        let slot = self.slot_mut(id).ok_or(CommandError::UnknownPeriod)?;
        if !slot.state.is_terminal() {
            return Err(CommandError::NotRetryable(slot.state));
        }
        slot.state = PeriodState::Pending;
        slot.completed_at = None;
        slot.not_before = None;
        slot.retry_asap = false;
        Ok(slot.snapshot())
    }

    /// Retries a terminal period: resets it and queues one forced
    /// attempt that bypasses the backoff and window-entry checks.
    ///
    /// Rejected while the window is still Before; whether this retake
    /// overwrites the original artifact is decided by the window position
    /// when the forced attempt actually launches.
    pub fn retry(&mut self, id: PeriodId, now: NaiveDateTime) -> Result<PeriodSnapshot, CommandError> {
        let time = now.time();
        {
            let slot = self.slot(id).ok_or(CommandError::UnknownPeriod)?;
            if !slot.state.is_terminal() {
                return Err(CommandError::NotRetryable(slot.state));
            }
            if slot.window.classify(time) == WindowPosition::Before {
                return Err(CommandError::BeforeWindow);
            }
        }
        let snapshot = self.reset(id)?;
        if let Some(slot) = self.slot_mut(id) {
            slot.retry_asap = true;
        }
        Ok(snapshot)
    }

    fn slot(&self, id: PeriodId) -> Option<&PeriodSlot> {
        self.slots.iter().find(|slot| slot.id == id)
    }

    fn slot_mut(&mut self, id: PeriodId) -> Option<&mut PeriodSlot> {
        self.slots.iter_mut().find(|slot| slot.id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timetable::CaptureWindow;
    use chrono::NaiveDate;

    // === Helpers ===

    fn two_period_set() -> ScheduleSet {
        let table = Timetable::new(vec![
            (
                PeriodId::Class(1),
                CaptureWindow::from_hm((9, 30), (9, 45)).unwrap(),
            ),
            (
                PeriodId::Class(2),
                CaptureWindow::from_hm((10, 30), (10, 45)).unwrap(),
            ),
        ])
        .unwrap();
        ScheduleSet::new(&table, TimeDelta::seconds(10))
    }

    fn at(h: u32, m: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 3, 2)
            .unwrap()
            .and_hms_opt(h, m, s)
            .unwrap()
    }

    fn satisfied_verdict(detected: u32, threshold: u32) -> CaptureVerdict {
        CaptureVerdict {
            detected: Some(detected),
            threshold,
            required: threshold,
            satisfied: true,
            frame: None,
            fault: None,
        }
    }

    fn shortfall_verdict(detected: u32, threshold: u32) -> CaptureVerdict {
        CaptureVerdict {
            detected: Some(detected),
            threshold,
            required: threshold,
            satisfied: false,
            frame: None,
            fault: None,
        }
    }

    // === Eligibility and the single-attempt invariant ===

    #[test]
    fn test_new_set_is_all_pending() {
        let set = two_period_set();
        assert_eq!(set.len(), 2);
        for snapshot in set.snapshots() {
            assert_eq!(snapshot.state, PeriodState::Pending);
            assert!(snapshot.completed_at.is_none());
            assert!(snapshot.last_detected.is_none());
        }
    }

    #[test]
    fn test_no_attempt_outside_the_window() {
        let mut set = two_period_set();
        assert!(set.begin_next_attempt(at(9, 29, 59)).is_none());
        assert!(set.begin_next_attempt(at(9, 45, 0)).is_none());
    }

    #[test]
    fn test_attempt_begins_inside_the_window() {
        let mut set = two_period_set();
        let ticket = set.begin_next_attempt(at(9, 30, 0)).unwrap();

        assert_eq!(ticket.id, PeriodId::Class(1));
        assert_eq!(ticket.position, WindowPosition::Inside);
        assert!(!ticket.forced);
        assert_eq!(ticket.snapshot.state, PeriodState::Attempting);
        assert_eq!(set.state(PeriodId::Class(1)), Some(PeriodState::Attempting));
    }

    #[test]
    fn test_at_most_one_attempt_across_the_set() {
        // Overlapping windows force both periods eligible at once.
        let table = Timetable::new(vec![
            (
                PeriodId::Class(1),
                CaptureWindow::from_hm((9, 0), (10, 0)).unwrap(),
            ),
            (
                PeriodId::Class(2),
                CaptureWindow::from_hm((9, 0), (10, 0)).unwrap(),
            ),
        ])
        .unwrap();
        let mut set = ScheduleSet::new(&table, TimeDelta::seconds(10));

        let first = set.begin_next_attempt(at(9, 10, 0)).unwrap();
        assert_eq!(first.id, PeriodId::Class(1));

        // Second call cannot start anything while one is in flight.
        assert!(set.begin_next_attempt(at(9, 10, 1)).is_none());

        set.settle_attempt(first.id, &shortfall_verdict(3, 22), None, at(9, 10, 2));

        // Period 1 is now cooling down, so period 2 gets its turn.
        let second = set.begin_next_attempt(at(9, 10, 3)).unwrap();
        assert_eq!(second.id, PeriodId::Class(2));
    }

    #[test]
    fn test_backoff_gates_reattempts() {
        let mut set = two_period_set();
        let ticket = set.begin_next_attempt(at(9, 30, 0)).unwrap();
        set.settle_attempt(ticket.id, &shortfall_verdict(10, 22), None, at(9, 30, 2));

        // Cooldown runs 10 seconds from the settle.
        assert!(set.begin_next_attempt(at(9, 30, 5)).is_none());
        assert!(set.begin_next_attempt(at(9, 30, 11)).is_none());

        let again = set.begin_next_attempt(at(9, 30, 12)).unwrap();
        assert_eq!(again.id, PeriodId::Class(1));
    }

    // === Settling verdicts ===

    #[test]
    fn test_satisfied_attempt_with_artifact_completes() {
        let mut set = two_period_set();
        let ticket = set.begin_next_attempt(at(9, 31, 0)).unwrap();

        let resolution = set.settle_attempt(
            ticket.id,
            &satisfied_verdict(22, 22),
            Some(PathBuf::from("260302/260302_period1.png")),
            at(9, 31, 2),
        );

        let AttemptResolution::Completed(snapshot) = resolution else {
            panic!("expected completion, got {resolution:?}");
        };
        assert_eq!(snapshot.state, PeriodState::Completed);
        assert_eq!(snapshot.completed_at, Some(at(9, 31, 2)));
        assert_eq!(snapshot.last_detected, Some(22));
        assert_eq!(snapshot.last_threshold, Some(22));
        assert_eq!(
            snapshot.artifact.as_deref(),
            Some(std::path::Path::new("260302/260302_period1.png"))
        );
    }

    #[test]
    fn test_satisfied_attempt_without_artifact_stays_pending() {
        let mut set = two_period_set();
        let ticket = set.begin_next_attempt(at(9, 31, 0)).unwrap();

        let resolution =
            set.settle_attempt(ticket.id, &satisfied_verdict(22, 22), None, at(9, 31, 2));

        assert!(matches!(resolution, AttemptResolution::SaveFailed(_)));
        assert_eq!(set.state(ticket.id), Some(PeriodState::Pending));
        // Still eligible once the cooldown lapses.
        assert!(set.begin_next_attempt(at(9, 31, 13)).is_some());
    }

    #[test]
    fn test_shortfall_updates_display_counts() {
        let mut set = two_period_set();
        let ticket = set.begin_next_attempt(at(9, 31, 0)).unwrap();

        set.settle_attempt(ticket.id, &shortfall_verdict(18, 22), None, at(9, 31, 2));

        let snapshot = set.snapshot(ticket.id).unwrap();
        assert_eq!(snapshot.state, PeriodState::Pending);
        assert_eq!(snapshot.last_detected, Some(18));
        assert_eq!(snapshot.last_threshold, Some(22));
        assert_eq!(snapshot.status_line(), "detecting (18)");
    }

    #[test]
    fn test_unsatisfied_attempt_settling_after_the_window_times_out() {
        let mut set = two_period_set();
        let ticket = set.begin_next_attempt(at(9, 44, 58)).unwrap();

        // The attempt straddles the window end.
        let resolution =
            set.settle_attempt(ticket.id, &shortfall_verdict(18, 22), None, at(9, 45, 0));

        assert!(matches!(resolution, AttemptResolution::TimedOut(_)));
        assert_eq!(set.state(ticket.id), Some(PeriodState::TimedOut));
    }

    // === Timeout sweep ===

    #[test]
    fn test_sweep_times_out_pending_periods_after_their_window() {
        let mut set = two_period_set();

        let swept = set.sweep_timed_out(at(9, 45, 0));

        assert_eq!(swept.len(), 1);
        assert_eq!(swept[0].id, PeriodId::Class(1));
        assert_eq!(swept[0].state, PeriodState::TimedOut);
        // Period 2's window has not opened; it is untouched.
        assert_eq!(set.state(PeriodId::Class(2)), Some(PeriodState::Pending));
    }

    #[test]
    fn test_sweep_leaves_open_windows_alone() {
        let mut set = two_period_set();
        assert!(set.sweep_timed_out(at(9, 44, 59)).is_empty());
        assert_eq!(set.state(PeriodId::Class(1)), Some(PeriodState::Pending));
    }

    #[test]
    fn test_sweep_spares_a_queued_forced_retry() {
        let mut set = two_period_set();
        set.sweep_timed_out(at(9, 45, 0));
        set.retry(PeriodId::Class(1), at(9, 50, 0)).unwrap();

        // The retry is waiting for its forced attempt; the sweep must not
        // cancel it.
        assert!(set.sweep_timed_out(at(9, 50, 1)).is_empty());
        assert_eq!(set.state(PeriodId::Class(1)), Some(PeriodState::Pending));
    }

    // === Skip ===

    #[test]
    fn test_skip_pending_period() {
        let mut set = two_period_set();
        let snapshot = set.skip(PeriodId::Class(1)).unwrap();

        assert_eq!(snapshot.state, PeriodState::Skipped);
        // Skipped periods are never attempted, even inside the window.
        assert!(set.begin_next_attempt(at(9, 31, 0)).is_none());
    }

    #[test]
    fn test_skip_during_flight_discards_a_satisfied_verdict() {
        let mut set = two_period_set();
        let ticket = set.begin_next_attempt(at(9, 31, 0)).unwrap();

        set.skip(ticket.id).unwrap();
        assert_eq!(set.state(ticket.id), Some(PeriodState::Skipped));

        let resolution = set.settle_attempt(
            ticket.id,
            &satisfied_verdict(22, 22),
            Some(PathBuf::from("260302/260302_period1.png")),
            at(9, 31, 3),
        );

        assert!(matches!(resolution, AttemptResolution::Discarded));
        // Skipped is never overwritten by a late completion.
        assert_eq!(set.state(ticket.id), Some(PeriodState::Skipped));
        assert!(set.snapshot(ticket.id).unwrap().completed_at.is_none());
    }

    #[test]
    fn test_skip_rejected_on_terminal_states() {
        let mut set = two_period_set();
        let ticket = set.begin_next_attempt(at(9, 31, 0)).unwrap();
        set.settle_attempt(
            ticket.id,
            &satisfied_verdict(22, 22),
            Some(PathBuf::from("p1.png")),
            at(9, 31, 2),
        );

        let err = set.skip(ticket.id).unwrap_err();
        assert_eq!(err, CommandError::NotSkippable(PeriodState::Completed));

        let err = set.skip(PeriodId::Checkout).unwrap_err();
        assert_eq!(err, CommandError::UnknownPeriod);
    }

    // === Retry and reset ===

    #[test]
    fn test_retry_after_timeout_forces_an_attempt_outside_the_window() {
        let mut set = two_period_set();
        set.sweep_timed_out(at(9, 45, 0));
        assert_eq!(set.state(PeriodId::Class(1)), Some(PeriodState::TimedOut));

        let snapshot = set.retry(PeriodId::Class(1), at(9, 50, 0)).unwrap();
        assert_eq!(snapshot.state, PeriodState::Pending);

        // The forced attempt launches despite the closed window and no
        // cooldown applies.
        let ticket = set.begin_next_attempt(at(9, 50, 0)).unwrap();
        assert_eq!(ticket.id, PeriodId::Class(1));
        assert!(ticket.forced);
        assert_eq!(ticket.position, WindowPosition::After);
    }

    #[test]
    fn test_retry_rejected_before_the_window_and_on_active_periods() {
        let mut set = two_period_set();

        // Period 2's window opens at 10:30; at 9:50 it is still Before --
        // but also not terminal, so the state check fires first.
        let err = set.retry(PeriodId::Class(2), at(9, 50, 0)).unwrap_err();
        assert_eq!(err, CommandError::NotRetryable(PeriodState::Pending));

        // A completed period before its own window cannot happen, so use a
        // skipped one to reach the window check.
        set.skip(PeriodId::Class(2)).unwrap();
        let err = set.retry(PeriodId::Class(2), at(9, 50, 0)).unwrap_err();
        assert_eq!(err, CommandError::BeforeWindow);
    }

    #[test]
    fn test_retry_allows_a_second_chance_inside_the_window() {
        let mut set = two_period_set();
        set.skip(PeriodId::Class(1)).unwrap();

        set.retry(PeriodId::Class(1), at(9, 40, 0)).unwrap();
        let ticket = set.begin_next_attempt(at(9, 40, 0)).unwrap();

        assert!(ticket.forced);
        assert_eq!(ticket.position, WindowPosition::Inside);
    }

    #[test]
    fn test_reset_clears_completion_bookkeeping() {
        let mut set = two_period_set();
        let ticket = set.begin_next_attempt(at(9, 31, 0)).unwrap();
        set.settle_attempt(
            ticket.id,
            &satisfied_verdict(22, 22),
            Some(PathBuf::from("p1.png")),
            at(9, 31, 2),
        );

        let snapshot = set.reset(ticket.id).unwrap();

        assert_eq!(snapshot.state, PeriodState::Pending);
        assert!(snapshot.completed_at.is_none());
        // Display counts survive a reset; they are history, not state.
        assert_eq!(snapshot.last_detected, Some(22));
    }

    #[test]
    fn test_reset_then_skip_stays_skipped() {
        let mut set = two_period_set();
        set.sweep_timed_out(at(9, 45, 0));

        set.reset(PeriodId::Class(1)).unwrap();
        set.skip(PeriodId::Class(1)).unwrap();

        assert_eq!(set.state(PeriodId::Class(1)), Some(PeriodState::Skipped));
        // No tick may revive it, inside or outside the window.
        assert!(set.begin_next_attempt(at(9, 40, 0)).is_none());
        assert!(set.begin_next_attempt(at(9, 50, 0)).is_none());
    }

    #[test]
    fn test_retry_then_skip_cancels_the_forced_attempt() {
        let mut set = two_period_set();
        set.sweep_timed_out(at(9, 45, 0));
        set.retry(PeriodId::Class(1), at(9, 50, 0)).unwrap();

        set.skip(PeriodId::Class(1)).unwrap();

        assert_eq!(set.state(PeriodId::Class(1)), Some(PeriodState::Skipped));
        assert!(set.begin_next_attempt(at(9, 50, 1)).is_none());
    }

    // === Exactly-once at the window boundary ===

    #[test]
    fn test_failing_attempts_end_in_timeout_never_completion() {
        let mut set = two_period_set();
        let mut now = at(9, 30, 0);
        let end = at(9, 46, 0);
        let mut attempts = 0;

        // A one-second tick across the whole window, every verdict short.
        while now < end {
            set.sweep_timed_out(now);
            if let Some(ticket) = set.begin_next_attempt(now) {
                attempts += 1;
                let settled = now + TimeDelta::seconds(1);
                set.settle_attempt(ticket.id, &shortfall_verdict(15, 22), None, settled);
            }
            now += TimeDelta::seconds(1);
        }

        // Backoff pacing: one attempt roughly every eleven seconds.
        assert!(attempts >= 2, "only {attempts} attempts ran");
        assert_eq!(set.state(PeriodId::Class(1)), Some(PeriodState::TimedOut));
        assert!(set.snapshot(PeriodId::Class(1)).unwrap().completed_at.is_none());
    }
}
