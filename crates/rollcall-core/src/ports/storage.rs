//! Artifact store port definition
//!
//! Interface to the persistence layer that files one proof image per
//! period. Path layout and naming are the adapter's concern; the engine
//! only states which period the frame belongs to and whether the
//! canonical artifact may be replaced.

use std::path::PathBuf;

use async_trait::async_trait;
use thiserror::Error;

use super::capture::CapturedFrame;
use crate::timetable::PeriodId;

/// Errors from artifact persistence.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The volume holding the artifact root is out of space.
    #[error("insufficient disk space writing {0}")]
    InsufficientSpace(String),

    /// The artifact root or a date folder is not writable.
    #[error("permission denied writing {0}")]
    PermissionDenied(String),

    /// Any other filesystem failure.
    #[error("storage io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Port for persisting one proof image per period.
#[async_trait]
pub trait StoragePort: Send + Sync {
    /// Writes the frame for `period` and returns the artifact path.
    ///
    /// With `overwrite` set the canonical artifact for the period is
    /// replaced in place (the capture window is still open). Without it
    /// the write goes to a distinctly named retake artifact next to the
    /// original, which is never touched.
    async fn save(
        &self,
        frame: &CapturedFrame,
        period: PeriodId,
        overwrite: bool,
    ) -> Result<PathBuf, StorageError>;
}
