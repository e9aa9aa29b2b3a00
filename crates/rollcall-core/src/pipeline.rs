//! Capture pipeline
//!
//! One orchestration call: acquire a frame, count faces, compare the
//! count against the live threshold policy. Produces a verdict and never
//! retries on its own; all temporal retry policy lives with the
//! scheduler. Faults are folded into the verdict so the caller handles
//! every attempt uniformly.

use thiserror::Error;
use tracing::{debug, warn};

use crate::ports::{CaptureError, CapturePort, CapturedFrame, DetectorError, DetectorPort};
use crate::threshold::ThresholdConfig;

/// Failure inside one attempt.
#[derive(Debug, Error)]
pub enum AttemptFault {
    #[error(transparent)]
    Capture(#[from] CaptureError),

    #[error(transparent)]
    Detector(#[from] DetectorError),
}

impl AttemptFault {
    /// Transient faults are absorbed quietly; the rest surface as alerts.
    pub fn is_transient(&self) -> bool {
        match self {
            AttemptFault::Capture(err) => err.is_transient(),
            AttemptFault::Detector(_) => false,
        }
    }
}

/// Outcome of one capture attempt. Ephemeral: the scheduler consumes it
/// as soon as it is produced, nothing stores it.
#[derive(Debug)]
pub struct CaptureVerdict {
    /// Faces counted, when detection ran to completion.
    pub detected: Option<u32>,
    /// Threshold in force for this attempt.
    pub threshold: u32,
    /// Minimum count the mode accepted.
    pub required: u32,
    /// Whether the policy was satisfied.
    pub satisfied: bool,
    /// The captured frame, retained only when satisfied.
    pub frame: Option<CapturedFrame>,
    /// Failure, when the attempt did not reach a comparison.
    pub fault: Option<AttemptFault>,
}

impl CaptureVerdict {
    fn faulted(policy: ThresholdConfig, fault: AttemptFault) -> Self {
        Self {
            detected: None,
            threshold: policy.threshold(),
            required: policy.required(),
            satisfied: false,
            frame: None,
            fault: Some(fault),
        }
    }
}

/// Runs one attempt: capture, detect, compare.
///
/// The policy is read by the caller immediately before this call so
/// mid-session changes to student count or mode apply to the very next
/// attempt. A satisfied verdict carries the frame captured here; an
/// unsatisfied attempt drops the frame before returning, and nothing is
/// ever re-captured for the same attempt.
pub async fn run_attempt<C, D>(capture: &C, detector: &D, policy: ThresholdConfig) -> CaptureVerdict
where
    C: CapturePort,
    D: DetectorPort,
{
    let frame = match capture.capture().await {
        Ok(frame) => frame,
        Err(err) => {
            warn!(error = %err, "frame acquisition failed");
            return CaptureVerdict::faulted(policy, err.into());
        }
    };

    let detected = match detector.count_faces(&frame).await {
        Ok(count) => count,
        Err(err) => {
            warn!(error = %err, "face detection failed");
            drop(frame);
            return CaptureVerdict::faulted(policy, err.into());
        }
    };

    let threshold = policy.threshold();
    let required = policy.required();
    let satisfied = policy.is_satisfied(detected);
    debug!(
        detected,
        threshold,
        required,
        satisfied,
        mode = %policy.mode,
        "attempt compared"
    );

    CaptureVerdict {
        detected: Some(detected),
        threshold,
        required,
        satisfied,
        frame: if satisfied { Some(frame) } else { None },
        fault: None,
    }
}
