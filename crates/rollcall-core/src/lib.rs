//! Rollcall Core - Domain logic for the Rollcall attendance recorder
//!
//! This crate contains the core business logic, domain models, and port
//! definitions following the Hexagonal Architecture pattern: the
//! timetable and period state machine, the capture pipeline, the
//! attendance scheduler, and the ports its collaborators implement.

pub mod clock;
pub mod config;
pub mod error;
pub mod logging;
pub mod pipeline;
pub mod ports;
pub mod schedule;
pub mod scheduler;
pub mod threshold;
pub mod timetable;

// Re-export primary types for convenient access
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{
    get_default_config_path, load_config, load_config_from_path, AttendanceConfig, CaptureConfig,
    Config, StorageConfig,
};
pub use error::{ConfigError, RollcallError};
pub use logging::{init_logger, LogLevel, LoggerConfig, LoggerError, LoggerGuard};
pub use pipeline::{run_attempt, AttemptFault, CaptureVerdict};
pub use ports::{
    CaptureError, CapturePort, CapturedFrame, DetectorError, DetectorPort, JournalError,
    JournalPort, JournalRecord, JournalStatus, StorageError, StoragePort,
};
pub use schedule::{
    AttemptResolution, AttemptTicket, CommandError, PeriodSnapshot, PeriodState, ScheduleSet,
};
pub use scheduler::{
    AttendanceScheduler, FaultKind, SchedulerError, SchedulerEvent, SchedulerSettings,
};
pub use threshold::{ThresholdConfig, ThresholdMode};
pub use timetable::{
    CaptureWindow, PeriodId, Timetable, TimetableError, WindowPosition, MAX_CLASS_PERIOD,
};
