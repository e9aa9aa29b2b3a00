//! Port definitions for the engine's external collaborators
//!
//! These traits are the boundary between the scheduling core and the
//! outside world: the capture device, the face detector, the artifact
//! store, and the attendance journal. Adapters implement them; the core
//! only ever talks to the traits.

pub mod capture;
pub mod detector;
pub mod journal;
pub mod storage;

pub use capture::{CaptureError, CapturePort, CapturedFrame};
pub use detector::{DetectorError, DetectorPort};
pub use journal::{JournalError, JournalPort, JournalRecord, JournalStatus};
pub use storage::{StorageError, StoragePort};
