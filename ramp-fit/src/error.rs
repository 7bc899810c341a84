use thiserror::Error;

use crate::ramp::RampIndex;

/// Errors produced while fitting ramps.
///
/// `InvalidInput` is fatal to the pixel being fit and is returned to the caller.
/// The segment-level variants are absorbed by the pixel driver, which drops the
/// offending segment and flags its resultants instead.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RampError {
    /// Inputs violate a precondition (too few resultants, mismatched lengths,
    /// negative read noise, bad read pattern or configuration).
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Segment has too few resultants for a slope to be defined.
    #[error("insufficient data in ramp {ramp}: {len} resultant(s)")]
    InsufficientData {
        /// Segment that could not be fit.
        ramp: RampIndex,
        /// Number of resultants in the segment.
        len: usize,
    },

    /// Weighted sums collapsed to zero, e.g. all resultant times identical.
    #[error("numerically degenerate ramp {ramp}: {reason}")]
    NumericDegeneracy {
        /// Segment that could not be fit.
        ramp: RampIndex,
        /// What collapsed.
        reason: &'static str,
    },
}

impl RampError {
    /// True for failures that only invalidate a single ramp segment.
    pub fn is_segment_level(&self) -> bool {
        matches!(
            self,
            RampError::InsufficientData { .. } | RampError::NumericDegeneracy { .. }
        )
    }
}
