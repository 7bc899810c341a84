//! Cosmic-ray jump detection and ramp segmentation.
//!
//! A candidate segment moves through four states:
//!
//! ```text
//! Unsplit ──> Testing ──> Accepted
//!                  └────> Split ──> [start, k] Unsplit
//!                                   [k+1, end] Unsplit
//! ```
//!
//! While testing, the segment is fit to get its consensus slope `m`, and every
//! local slope inside it is compared against `m`:
//!
//! ```text
//! stat(i, d) = (local_slope[d][i] - m) / sqrt(var)
//! var        = (σ²·read_recip[d][i] + max(m, 0)·var_slope[d][i]) / Δt[d][i]²
//! ```
//!
//! `stat[i]` is the larger of the single and double statistic at `i` (the double
//! difference only when both resultants lie in the segment). When the largest
//! `stat[i]` exceeds the threshold the segment splits between resultants `k`
//! and `k + 1`, where `k` is the leftmost maximum.

use log::debug;
use serde::{Deserialize, Serialize};

use crate::error::RampError;
use crate::fit::RampFitter;
use crate::pixel::PixelJumpStats;
use crate::ramp::RampIndex;
use crate::read_pattern::{Diff, FixedValues};

/// Detection threshold applied to the jump statistic.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThresholdModel {
    /// `intercept - constant * log10(slope)`, falling back to `intercept` for
    /// non-positive slopes. Casertano+22 uses 5.5 and 1/3.
    SlopeDependent { intercept: f64, constant: f64 },
    /// Constant threshold regardless of the fitted slope.
    Fixed(f64),
}

impl Default for ThresholdModel {
    fn default() -> Self {
        ThresholdModel::SlopeDependent {
            intercept: 5.5,
            constant: 1.0 / 3.0,
        }
    }
}

impl ThresholdModel {
    /// Threshold for a segment with consensus slope `slope`.
    pub fn at(&self, slope: f64) -> f64 {
        match *self {
            ThresholdModel::SlopeDependent {
                intercept,
                constant,
            } => {
                if slope > 0.0 {
                    intercept - constant * slope.log10()
                } else {
                    intercept
                }
            }
            ThresholdModel::Fixed(threshold) => threshold,
        }
    }

    fn is_valid(&self) -> bool {
        match *self {
            ThresholdModel::SlopeDependent {
                intercept,
                constant,
            } => intercept.is_finite() && constant.is_finite(),
            ThresholdModel::Fixed(threshold) => !threshold.is_nan(),
        }
    }
}

/// Jump detection settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JumpConfig {
    /// Threshold on the jump statistic
    pub threshold: ThresholdModel,
    /// Shortest segment (in resultants) that is tested for a jump
    pub min_testable_len: usize,
}

impl Default for JumpConfig {
    fn default() -> Self {
        Self {
            threshold: ThresholdModel::default(),
            min_testable_len: 3,
        }
    }
}

impl JumpConfig {
    pub fn validate(&self) -> Result<(), RampError> {
        if !self.threshold.is_valid() {
            return Err(RampError::InvalidInput(format!(
                "invalid jump threshold {:?}",
                self.threshold
            )));
        }
        if self.min_testable_len < 2 {
            return Err(RampError::InvalidInput(format!(
                "minimum testable segment length must be at least 2, got {}",
                self.min_testable_len
            )));
        }
        Ok(())
    }
}

/// Why a segment was accepted without splitting.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AcceptReason {
    /// Fewer resultants than the minimum testable length
    TooShort,
    /// No statistic exceeded the threshold
    BelowThreshold { max_statistic: f64, threshold: f64 },
    /// The consensus slope could not be fit; the segment is passed on untested
    Unfittable,
}

/// Outcome of testing one segment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum JumpDecision {
    Accept(AcceptReason),
    /// Split between resultants `at` and `at + 1`
    Split {
        at: usize,
        statistic: f64,
        threshold: f64,
    },
}

/// Accepted segments of a range, in index order, and the resultants that
/// begin a new segment after a detected jump.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Segmentation {
    pub ramps: Vec<RampIndex>,
    pub jumps: Vec<usize>,
}

/// Tests segments of one pixel for jumps using its precomputed statistics.
#[derive(Debug, Clone, Copy)]
pub struct JumpDetector<'a> {
    stats: &'a PixelJumpStats,
    fixed: &'a FixedValues,
    fitter: RampFitter<'a>,
    config: &'a JumpConfig,
}

impl<'a> JumpDetector<'a> {
    pub fn new(
        stats: &'a PixelJumpStats,
        fixed: &'a FixedValues,
        fitter: RampFitter<'a>,
        config: &'a JumpConfig,
    ) -> Self {
        Self {
            stats,
            fixed,
            fitter,
            config,
        }
    }

    /// Statistic for each difference index `start..end` of `ramp`, relative to
    /// `ramp.start`.
    pub fn statistics(&self, ramp: RampIndex, slope: f64) -> Vec<f64> {
        (ramp.start..ramp.end)
            .map(|i| {
                let single = self.statistic(Diff::Single, i, slope);
                if i + Diff::Double.offset() <= ramp.end {
                    single.max(self.statistic(Diff::Double, i, slope))
                } else {
                    single
                }
            })
            .collect()
    }

    fn statistic(&self, diff: Diff, index: usize, slope: f64) -> f64 {
        let local_slope = self.stats.local_slopes(diff)[index];
        debug_assert!(
            !local_slope.is_nan(),
            "undefined {diff:?} difference {index} used in jump statistic"
        );

        let delta = local_slope - slope;
        let var = (self.stats.var_read_noise(diff)[index]
            + slope.max(0.0) * self.fixed.var_slope_coeffs(diff)[index])
            / self.fixed.t_bar_diff_sqrs(diff)[index];

        // Zero variance carries no evidence either way
        if var > 0.0 {
            delta / var.sqrt()
        } else {
            0.0
        }
    }

    /// Decide whether `ramp` is accepted or split.
    pub fn test(&self, resultants: &[f64], ramp: RampIndex) -> JumpDecision {
        if ramp.len() < self.config.min_testable_len.max(2) {
            return JumpDecision::Accept(AcceptReason::TooShort);
        }

        let slope = match self.fitter.fit(resultants, ramp) {
            Ok(fit) => fit.parameters.slope,
            Err(_) => return JumpDecision::Accept(AcceptReason::Unfittable),
        };

        let stats = self.statistics(ramp, slope);
        let (argmax, max_statistic) = leftmost_max(&stats);
        let threshold = self.config.threshold.at(slope);

        if max_statistic > threshold {
            JumpDecision::Split {
                at: ramp.start + argmax,
                statistic: max_statistic,
                threshold,
            }
        } else {
            JumpDecision::Accept(AcceptReason::BelowThreshold {
                max_statistic,
                threshold,
            })
        }
    }

    /// Recursively split `ramp` at detected jumps.
    ///
    /// Sub-ranges are processed leftmost first, so accepted segments come out in
    /// index order. Each split strictly shrinks both halves, bounding the work
    /// by the segment length.
    pub fn segment(&self, resultants: &[f64], ramp: RampIndex) -> Segmentation {
        let mut segmentation = Segmentation::default();
        let mut pending = vec![ramp];

        while let Some(current) = pending.pop() {
            match self.test(resultants, current) {
                JumpDecision::Accept(_) => segmentation.ramps.push(current),
                JumpDecision::Split {
                    at,
                    statistic,
                    threshold,
                } => {
                    debug!(
                        "jump in ramp {current} between resultants {at} and {}: stat={statistic:.2} > {threshold:.2}",
                        at + 1
                    );
                    let (left, right) = current.split_after(at);
                    segmentation.jumps.push(at + 1);
                    pending.push(right);
                    pending.push(left);
                }
            }
        }

        segmentation.jumps.sort_unstable();
        segmentation
    }
}

/// Index and value of the largest element; ties go to the lowest index.
fn leftmost_max(values: &[f64]) -> (usize, f64) {
    let mut best = (0, f64::NEG_INFINITY);
    for (i, &value) in values.iter().enumerate() {
        if value > best.1 {
            best = (i, value);
        }
    }
    best
}
