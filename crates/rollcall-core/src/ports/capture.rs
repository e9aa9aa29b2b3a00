//! Screen capture port definition
//!
//! Interface to the screen-capture primitive. The monitor selector is
//! fixed when an adapter is constructed; the engine never picks a device
//! per call.

use async_trait::async_trait;
use thiserror::Error;

/// One captured frame of the conference gallery.
///
/// `data` holds an encoded PNG. The engine treats it as opaque bytes and
/// hands it to the artifact store unchanged; a satisfied attempt saves
/// exactly this frame, never a re-capture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedFrame {
    /// Encoded PNG bytes.
    pub data: Vec<u8>,
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
}

/// Errors from the capture device.
#[derive(Debug, Error)]
pub enum CaptureError {
    /// The configured monitor id does not exist.
    #[error("monitor {0} not found")]
    MonitorNotFound(u32),

    /// The device is momentarily in use; the next attempt may succeed.
    #[error("capture device busy")]
    DeviceBusy,

    /// Screen recording permission has not been granted.
    #[error("screen recording permission denied")]
    PermissionDenied,

    /// Any other capture failure.
    #[error("capture failed: {0}")]
    Failed(String),
}

impl CaptureError {
    /// Momentary conditions the scheduler absorbs without raising an
    /// alert; everything else is a resource fault worth surfacing.
    pub fn is_transient(&self) -> bool {
        matches!(self, CaptureError::DeviceBusy)
    }
}

/// Port for acquiring one frame of the gallery view.
#[async_trait]
pub trait CapturePort: Send + Sync {
    /// Captures one frame from the configured monitor.
    async fn capture(&self) -> Result<CapturedFrame, CaptureError>;
}
