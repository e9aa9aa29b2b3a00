//! Timetable model and capture-window classification
//!
//! A timetable is one day's ordered list of schedulable units: the class
//! periods plus the end-of-day checkout slot. Each unit carries a capture
//! window, the interval of the day during which automatic capture attempts
//! are permitted. Window classification is a pure function of the current
//! time of day and is the only temporal predicate in the engine.

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Highest class period number in a standard day.
pub const MAX_CLASS_PERIOD: u8 = 8;

/// Identifier of one schedulable unit, stable for the whole run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PeriodId {
    /// Regular class period, numbered 1 through [`MAX_CLASS_PERIOD`].
    Class(u8),
    /// End-of-day checkout confirmation.
    Checkout,
}

impl PeriodId {
    /// Lowercase label used in artifact file names and journal rows,
    /// e.g. `period3` or `checkout`.
    pub fn label(&self) -> String {
        match self {
            PeriodId::Class(n) => format!("period{n}"),
            PeriodId::Checkout => "checkout".to_string(),
        }
    }
}

impl std::fmt::Display for PeriodId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PeriodId::Class(n) => write!(f, "period {n}"),
            PeriodId::Checkout => write!(f, "checkout"),
        }
    }
}

/// Where an instant falls relative to a capture window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowPosition {
    /// The window has not opened yet.
    Before,
    /// Within the window; automatic attempts are permitted.
    Inside,
    /// At or past the window end.
    After,
}

/// Capture window for one period. Invariant: `start < end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureWindow {
    start: NaiveTime,
    end: NaiveTime,
}

impl CaptureWindow {
    /// Creates a window, rejecting empty or inverted intervals.
    ///
    /// # Errors
    ///
    /// Returns [`TimetableError::InvalidWindow`] if `start >= end`.
    pub fn new(start: NaiveTime, end: NaiveTime) -> Result<Self, TimetableError> {
        if start >= end {
            return Err(TimetableError::InvalidWindow { start, end });
        }
        Ok(Self { start, end })
    }

    /// Builds a window from `(hour, minute)` pairs.
    ///
    /// # Errors
    ///
    /// Returns [`TimetableError::InvalidTime`] for an out-of-range pair and
    /// [`TimetableError::InvalidWindow`] if the interval is empty or inverted.
    pub fn from_hm(start: (u32, u32), end: (u32, u32)) -> Result<Self, TimetableError> {
        let parse = |(hour, minute): (u32, u32)| {
            NaiveTime::from_hms_opt(hour, minute, 0)
                .ok_or(TimetableError::InvalidTime { hour, minute })
        };
        Self::new(parse(start)?, parse(end)?)
    }

    pub fn start(&self) -> NaiveTime {
        self.start
    }

    pub fn end(&self) -> NaiveTime {
        self.end
    }

    /// Classifies `now` relative to this window.
    ///
    /// The start is inclusive and the end exclusive: a window closing at
    /// 09:45 is already `After` at exactly 09:45:00. Total, no side effects.
    pub fn classify(&self, now: NaiveTime) -> WindowPosition {
        if now < self.start {
            WindowPosition::Before
        } else if now >= self.end {
            WindowPosition::After
        } else {
            WindowPosition::Inside
        }
    }
}

impl std::fmt::Display for CaptureWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}-{}",
            self.start.format("%H:%M"),
            self.end.format("%H:%M")
        )
    }
}

/// Errors raised while building a timetable.
#[derive(Debug, Error)]
pub enum TimetableError {
    /// Window start must be strictly before its end.
    #[error("window start {start} is not before end {end}")]
    InvalidWindow { start: NaiveTime, end: NaiveTime },

    /// Hour/minute pair outside 00:00..=23:59.
    #[error("invalid time of day {hour:02}:{minute:02}")]
    InvalidTime { hour: u32, minute: u32 },

    /// Every period id may appear at most once.
    #[error("duplicate period id: {0}")]
    DuplicateId(PeriodId),

    /// Class periods are numbered 1 through [`MAX_CLASS_PERIOD`].
    #[error("class period {0} is out of range (1-{MAX_CLASS_PERIOD})")]
    ClassOutOfRange(u8),

    /// A timetable needs at least one period.
    #[error("timetable has no periods")]
    Empty,
}

/// One day's ordered periods. Order is timetable order and drives the
/// scheduler's eligibility scan.
#[derive(Debug, Clone)]
pub struct Timetable {
    entries: Vec<(PeriodId, CaptureWindow)>,
}

impl Timetable {
    /// Builds a timetable from `(id, window)` pairs in day order.
    ///
    /// # Errors
    ///
    /// Rejects an empty list, duplicate ids, and class period numbers
    /// outside `1..=MAX_CLASS_PERIOD`.
    pub fn new(entries: Vec<(PeriodId, CaptureWindow)>) -> Result<Self, TimetableError> {
        if entries.is_empty() {
            return Err(TimetableError::Empty);
        }
        for (idx, (id, _)) in entries.iter().enumerate() {
            if let PeriodId::Class(n) = id {
                if *n < 1 || *n > MAX_CLASS_PERIOD {
                    return Err(TimetableError::ClassOutOfRange(*n));
                }
            }
            if entries[..idx].iter().any(|(other, _)| other == id) {
                return Err(TimetableError::DuplicateId(*id));
            }
        }
        Ok(Self { entries })
    }

    /// The standard school day: eight class periods at quarter-to each
    /// hour (with the lunch gap after period 4) plus a short checkout
    /// window at 18:30.
    pub fn standard() -> Self {
        let entries = [
            (PeriodId::Class(1), (9, 30), (9, 45)),
            (PeriodId::Class(2), (10, 30), (10, 45)),
            (PeriodId::Class(3), (11, 30), (11, 45)),
            (PeriodId::Class(4), (12, 30), (12, 45)),
            (PeriodId::Class(5), (14, 30), (14, 45)),
            (PeriodId::Class(6), (15, 30), (15, 45)),
            (PeriodId::Class(7), (16, 30), (16, 45)),
            (PeriodId::Class(8), (17, 30), (17, 45)),
            (PeriodId::Checkout, (18, 30), (18, 32)),
        ]
        .into_iter()
        .map(|(id, (h1, m1), (h2, m2))| {
            let start = NaiveTime::from_hms_opt(h1, m1, 0).unwrap_or_default();
            let end = NaiveTime::from_hms_opt(h2, m2, 0).unwrap_or_default();
            (id, CaptureWindow { start, end })
        })
        .collect();
        Self { entries }
    }

    pub fn entries(&self) -> &[(PeriodId, CaptureWindow)] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Window for a given period, if the timetable contains it.
    pub fn window(&self, id: PeriodId) -> Option<CaptureWindow> {
        self.entries
            .iter()
            .find(|(other, _)| *other == id)
            .map(|(_, window)| *window)
    }
}

impl Default for Timetable {
    fn default() -> Self {
        Self::standard()
    }
}
