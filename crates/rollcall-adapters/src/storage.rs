//! Filesystem artifact store
//!
//! Writes one proof image per period into a date-stamped folder under
//! the storage root: `{YYMMDD}/{YYMMDD}_{period}.png`. An after-window
//! retake gets `_retake` appended before the extension so the canonical
//! artifact is never replaced once its window has closed.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use rollcall_core::clock::{Clock, SystemClock};
use rollcall_core::ports::{CapturedFrame, StorageError, StoragePort};
use rollcall_core::timetable::PeriodId;
use tracing::{debug, info};

/// Proof images are always encoded PNG.
const ARTIFACT_EXTENSION: &str = "png";

/// Inserted before the extension when the canonical artifact must be
/// preserved.
const RETAKE_SUFFIX: &str = "_retake";

/// ENOSPC. `io::ErrorKind::StorageFull` needs a newer toolchain than we
/// target, so the raw code is matched instead.
const OUT_OF_SPACE: i32 = 28;

/// Filesystem adapter implementing StoragePort.
///
/// Folder and file names carry the date the frame was taken, so a day's
/// evidence can be reviewed or archived as one directory.
pub struct FsArtifactStore {
    root: PathBuf,
    clock: Arc<dyn Clock>,
}

impl FsArtifactStore {
    /// Creates a store rooted at `root`, stamping dates from the system
    /// clock.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self::with_clock(root, Arc::new(SystemClock))
    }

    /// Creates a store whose date stamps follow a caller-supplied clock.
    pub fn with_clock(root: impl Into<PathBuf>, clock: Arc<dyn Clock>) -> Self {
        Self {
            root: root.into(),
            clock,
        }
    }

    /// Folder holding today's artifacts, `{root}/{YYMMDD}`.
    pub fn day_dir(&self) -> PathBuf {
        self.root.join(day_stamp(&*self.clock))
    }

    fn artifact_name(&self, period: PeriodId, overwrite: bool) -> String {
        let suffix = if overwrite { "" } else { RETAKE_SUFFIX };
        format!(
            "{}_{}{}.{}",
            day_stamp(&*self.clock),
            period.label(),
            suffix,
            ARTIFACT_EXTENSION
        )
    }
}

fn day_stamp(clock: &dyn Clock) -> String {
    clock.today().format("%y%m%d").to_string()
}

/// Maps filesystem failures onto the port's error taxonomy so the engine
/// can tell a full disk from a permission problem.
fn classify_io(err: io::Error, target: &Path) -> StorageError {
    let shown = target.display().to_string();
    if err.kind() == io::ErrorKind::PermissionDenied {
        StorageError::PermissionDenied(shown)
    } else if err.raw_os_error() == Some(OUT_OF_SPACE) {
        StorageError::InsufficientSpace(shown)
    } else {
        StorageError::Io(err)
    }
}

#[async_trait]
impl StoragePort for FsArtifactStore {
    async fn save(
        &self,
        frame: &CapturedFrame,
        period: PeriodId,
        overwrite: bool,
    ) -> Result<PathBuf, StorageError> {
        let dir = self.day_dir();
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| classify_io(e, &dir))?;

        let path = dir.join(self.artifact_name(period, overwrite));
        debug!("Writing artifact to {}", path.display());

        tokio::fs::write(&path, &frame.data)
            .await
            .map_err(|e| classify_io(e, &path))?;

        info!(
            "Artifact saved: {} ({} bytes, {}x{})",
            path.display(),
            frame.data.len(),
            frame.width,
            frame.height
        );
        Ok(path)
    }
}
