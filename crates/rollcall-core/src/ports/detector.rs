//! Face detector port definition
//!
//! Interface to the face counter. Filtering heuristics (minimum face
//! size, confidence cutoffs, GPU selection) are the adapter's own
//! concern, fixed at construction; the engine only ever asks for a
//! count.

use async_trait::async_trait;
use thiserror::Error;

use super::capture::CapturedFrame;

/// Errors from the face detector.
#[derive(Debug, Error)]
pub enum DetectorError {
    /// The detection model could not be loaded or has gone away.
    #[error("detector model unavailable: {0}")]
    ModelUnavailable(String),

    /// The frame bytes could not be decoded into an image.
    #[error("frame could not be decoded")]
    InvalidFrame,

    /// Any other detection failure.
    #[error("detection failed: {0}")]
    Failed(String),
}

/// Port for counting qualifying faces in a captured frame.
#[async_trait]
pub trait DetectorPort: Send + Sync {
    /// Returns the number of qualifying faces visible in the frame.
    async fn count_faces(&self, frame: &CapturedFrame) -> Result<u32, DetectorError>;
}
