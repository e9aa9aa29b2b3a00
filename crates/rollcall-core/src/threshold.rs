//! Attendance threshold policy
//!
//! The required face count is derived, never stored on a period: the
//! expected student count plus one for the instructor's own gallery tile,
//! optionally relaxed to 90% (rounded up) in flexible mode. The policy is
//! owned by the caller and re-read on every capture attempt so mid-session
//! changes take effect immediately.

use serde::{Deserialize, Serialize};

/// How a detected face count is compared against the threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThresholdMode {
    /// The detected count must equal the threshold exactly.
    Exact,
    /// The detected count may fall short by up to 10% of the threshold.
    #[default]
    Flexible,
}

impl ThresholdMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ThresholdMode::Exact => "exact",
            ThresholdMode::Flexible => "flexible",
        }
    }
}

impl std::fmt::Display for ThresholdMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for ThresholdMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "exact" => Ok(ThresholdMode::Exact),
            "flexible" => Ok(ThresholdMode::Flexible),
            _ => Err(format!("invalid threshold mode: {s}")),
        }
    }
}

/// Live threshold policy: expected class size and comparison mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThresholdConfig {
    /// Number of students expected in the gallery.
    pub student_count: u32,
    /// Comparison mode applied to the detected count.
    pub mode: ThresholdMode,
}

impl ThresholdConfig {
    pub fn new(student_count: u32, mode: ThresholdMode) -> Self {
        Self {
            student_count,
            mode,
        }
    }

    /// Face count the gallery should show: every student plus the
    /// instructor.
    pub fn threshold(&self) -> u32 {
        self.student_count + 1
    }

    /// Minimum detected count that satisfies this policy.
    ///
    /// Flexible mode uses integer ceiling so fractional minimums round up:
    /// threshold 22 gives 19.8, which rounds to a minimum of 20.
    pub fn required(&self) -> u32 {
        let threshold = self.threshold();
        match self.mode {
            ThresholdMode::Exact => threshold,
            ThresholdMode::Flexible => (threshold * 9).div_ceil(10),
        }
    }

    /// Whether a detected count satisfies this policy. Exact mode demands
    /// equality, so an overfull gallery does not pass.
    pub fn is_satisfied(&self, detected: u32) -> bool {
        match self.mode {
            ThresholdMode::Exact => detected == self.threshold(),
            ThresholdMode::Flexible => detected >= self.required(),
        }
    }
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            student_count: 1,
            mode: ThresholdMode::Flexible,
        }
    }
}
