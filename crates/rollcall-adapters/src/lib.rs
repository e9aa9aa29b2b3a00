//! Rollcall Adapters - Infrastructure implementations
//!
//! This crate contains concrete implementations of the ports defined in
//! rollcall-core: the filesystem artifact store, the daily CSV journal,
//! and synthetic capture/detection collaborators for rehearsal runs.
//! Real screen-capture and face-detection adapters plug into the same
//! ports but live outside this workspace.

pub mod journal;
pub mod storage;
pub mod synthetic;

// Re-export primary adapter types
pub use journal::CsvJournal;
pub use storage::FsArtifactStore;
pub use synthetic::{FixedCountDetector, SyntheticFrameSource};
