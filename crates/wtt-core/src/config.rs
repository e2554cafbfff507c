//! Read-only thresholds supplied to the core by the surrounding application.

use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};

/// Default inactivity before a break is recorded (5 minutes).
pub const DEFAULT_BREAK_THRESHOLD_SECS: u64 = 300;

/// Default time without a document save before the status warns (10 minutes).
pub const DEFAULT_UNSAVED_WARNING_SECS: u64 = 600;

/// Default window after a session start or load during which idle detection
/// is suppressed.
pub const DEFAULT_STARTUP_GRACE_SECS: u64 = 5;

/// Valid range for the break threshold.
pub const BREAK_THRESHOLD_RANGE: (u64, u64) = (30, 3_600);

/// Valid range for the unsaved warning threshold.
pub const UNSAVED_WARNING_RANGE: (u64, u64) = (30, 24 * 3_600);

/// Thresholds the core reads but never writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Thresholds {
    pub break_threshold_secs: u64,
    pub unsaved_warning_threshold_secs: u64,
    pub startup_grace_secs: u64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            break_threshold_secs: DEFAULT_BREAK_THRESHOLD_SECS,
            unsaved_warning_threshold_secs: DEFAULT_UNSAVED_WARNING_SECS,
            startup_grace_secs: DEFAULT_STARTUP_GRACE_SECS,
        }
    }
}

impl Thresholds {
    /// Checks each threshold against its allowed range.
    pub fn validate(&self) -> DomainResult<()> {
        check_range(
            "break_threshold_secs",
            self.break_threshold_secs,
            BREAK_THRESHOLD_RANGE,
        )?;
        check_range(
            "unsaved_warning_threshold_secs",
            self.unsaved_warning_threshold_secs,
            UNSAVED_WARNING_RANGE,
        )?;
        if self.startup_grace_secs >= self.break_threshold_secs {
            return Err(DomainError::InvalidFieldValue {
                field: "startup_grace_secs".to_string(),
                value: self.startup_grace_secs.to_string(),
                expected: format!("less than break_threshold_secs ({})", self.break_threshold_secs),
            });
        }
        Ok(())
    }
}

fn check_range(field: &str, value: u64, (min, max): (u64, u64)) -> DomainResult<()> {
    if (min..=max).contains(&value) {
        Ok(())
    } else {
        Err(DomainError::InvalidFieldValue {
            field: field.to_string(),
            value: value.to_string(),
            expected: format!("{min}..={max}"),
        })
    }
}
