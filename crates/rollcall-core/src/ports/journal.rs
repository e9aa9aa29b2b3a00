//! Event journal port definition
//!
//! Interface to the structured attendance log. Appends are
//! fire-and-forget from the engine's point of view: a failed append is
//! reported upward as a fault but never blocks or reorders scheduling.

use async_trait::async_trait;
use chrono::NaiveDateTime;
use thiserror::Error;

use crate::timetable::PeriodId;

/// Outcome category recorded in a journal row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JournalStatus {
    /// Threshold satisfied, artifact persisted.
    Captured,
    /// Attempt ran but the detected count fell short.
    Shortfall,
    /// Capture, detection, or persistence failed outright.
    Fault,
    /// Period skipped on user command.
    Skipped,
    /// Window closed without a satisfied attempt.
    TimedOut,
}

impl JournalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JournalStatus::Captured => "captured",
            JournalStatus::Shortfall => "shortfall",
            JournalStatus::Fault => "fault",
            JournalStatus::Skipped => "skipped",
            JournalStatus::TimedOut => "timed_out",
        }
    }
}

impl std::fmt::Display for JournalStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One appended journal row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JournalRecord {
    /// Local date and time of the event.
    pub at: NaiveDateTime,
    /// Period the event belongs to.
    pub period: PeriodId,
    /// Outcome category.
    pub status: JournalStatus,
    /// Faces counted during the attempt, when a count was reached.
    pub detected: Option<u32>,
    /// Threshold in force during the attempt.
    pub threshold: u32,
    /// Artifact file name, when one was written.
    pub artifact: Option<String>,
    /// Free-form context (mode, fault description).
    pub note: String,
}

/// Errors from journal appends.
#[derive(Debug, Error)]
pub enum JournalError {
    /// The journal file or its folder could not be written.
    #[error("journal io error: {0}")]
    Io(#[from] std::io::Error),

    /// A record could not be encoded as a row.
    #[error("journal encoding error: {0}")]
    Encoding(String),
}

/// Port for appending attendance events.
#[async_trait]
pub trait JournalPort: Send + Sync {
    /// Appends one record. Must not reorder records within a day.
    async fn append(&self, record: &JournalRecord) -> Result<(), JournalError>;
}
