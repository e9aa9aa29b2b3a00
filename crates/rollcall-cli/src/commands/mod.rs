//! CLI command implementations
//!
//! Each subcommand has its own module with the implementation logic.

pub mod rehearse;
pub mod status;
pub mod timetable;
