//! Common error types for Rollcall
//!
//! This module provides centralized error handling for the Rollcall
//! application. All domain-specific errors are defined in their
//! respective modules and re-exported here for convenience.

use thiserror::Error;

// Re-export domain-specific errors
pub use crate::logging::LoggerError;
pub use crate::ports::capture::CaptureError;
pub use crate::ports::detector::DetectorError;
pub use crate::ports::journal::JournalError;
pub use crate::ports::storage::StorageError;
pub use crate::schedule::CommandError;
pub use crate::scheduler::SchedulerError;
pub use crate::timetable::TimetableError;

/// Top-level error type for Rollcall operations
///
/// This enum wraps all domain-specific errors and provides automatic
/// conversion via the `From` trait, enabling seamless error propagation
/// with `?`.
#[derive(Debug, Error)]
pub enum RollcallError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Timetable construction errors
    #[error("Timetable error: {0}")]
    Timetable(#[from] TimetableError),

    /// Screen capture errors
    #[error("Capture error: {0}")]
    Capture(#[from] CaptureError),

    /// Face detection errors
    #[error("Detection error: {0}")]
    Detection(#[from] DetectorError),

    /// Artifact storage errors
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Journal errors
    #[error("Journal error: {0}")]
    Journal(#[from] JournalError),

    /// Scheduler lifecycle and command errors
    #[error("Scheduler error: {0}")]
    Scheduler(#[from] SchedulerError),

    /// Logger errors
    #[error("Logger error: {0}")]
    Logger(#[from] LoggerError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// File not found
    #[error("Configuration file not found: {0}")]
    NotFound(String),

    /// Parse error
    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    /// Invalid value
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
