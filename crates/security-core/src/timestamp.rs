//! Replay-window timestamp validation shared by the sipgate and generic
//! validators.

use crate::error::{Result, SecurityError};

const DEFAULT_TOLERANCE_SECONDS: i64 = 300;

/// Rejects timestamps further than `tolerance_seconds` from "now" in either
/// direction.
pub struct TimestampValidator {
    tolerance_seconds: i64,
}

impl Default for TimestampValidator {
    fn default() -> Self {
        Self::new(DEFAULT_TOLERANCE_SECONDS)
    }
}

impl TimestampValidator {
    pub fn new(tolerance_seconds: i64) -> Self {
        Self { tolerance_seconds }
    }

    pub fn validate(&self, timestamp: i64, now_unix: i64) -> Result<()> {
        let age = (now_unix - timestamp).abs();
        if age > self.tolerance_seconds {
            return Err(SecurityError::TimestampOutOfTolerance {
                age_seconds: age,
                tolerance_seconds: self.tolerance_seconds,
            });
        }
        Ok(())
    }

    pub fn validate_str(&self, timestamp: &str, now_unix: i64) -> Result<()> {
        let parsed: i64 = timestamp.parse().map_err(|_| SecurityError::InvalidTimestamp)?;
        self.validate(parsed, now_unix)
    }
}
