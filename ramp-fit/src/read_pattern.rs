//! Read pattern constants shared by every pixel of an exposure.
//!
//! A read pattern describes how elementary detector reads are averaged into
//! resultants. Everything derived here depends only on the pattern, never on
//! pixel data, so it is computed once per exposure and shared read-only by all
//! pixel fits (`FixedValues` is `Send + Sync`).
//!
//! Lag-indexed quantities are stored in [`ByDiff`], indexed by [`Diff`]:
//! - `t_bar_diffs[d][i] = t_bar[i + d + 1] - t_bar[i]`
//! - `t_bar_diff_sqrs[d][i] = t_bar_diffs[d][i]²`
//! - `read_recip_coeffs[d][i] = 1/n_reads[i + d + 1] + 1/n_reads[i]`
//! - `var_slope_coeffs[d][i] = tau[i] + tau[i + d + 1] - 2 min(t_bar[i], t_bar[i + d + 1])`
//!
//! with `d = 0` for single and `d = 1` for double differences. Every lag array
//! has length `N - 1`; the final double-difference slot has no partner
//! resultant and holds NaN.

use std::ops::Index;

use serde::{Deserialize, Serialize};

use crate::error::RampError;

/// Lag between the two resultants of a difference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Diff {
    /// Adjacent resultants, `i` and `i + 1`
    Single,
    /// Resultants two apart, `i` and `i + 2`
    Double,
}

impl Diff {
    /// Number of lags; only used for sizing.
    pub const COUNT: usize = 2;

    pub const ALL: [Diff; Diff::COUNT] = [Diff::Single, Diff::Double];

    /// Index distance between the two resultants of the difference.
    pub fn offset(self) -> usize {
        match self {
            Diff::Single => 1,
            Diff::Double => 2,
        }
    }

    fn slot(self) -> usize {
        match self {
            Diff::Single => 0,
            Diff::Double => 1,
        }
    }
}

/// One value per [`Diff`] lag.
#[derive(Debug, Clone, PartialEq)]
pub struct ByDiff<T>([T; Diff::COUNT]);

impl<T> ByDiff<T> {
    pub fn from_fn(mut f: impl FnMut(Diff) -> T) -> Self {
        Self([f(Diff::Single), f(Diff::Double)])
    }

    pub fn iter(&self) -> impl Iterator<Item = (Diff, &T)> {
        Diff::ALL.into_iter().zip(self.0.iter())
    }
}

impl<T> Index<Diff> for ByDiff<T> {
    type Output = T;

    fn index(&self, diff: Diff) -> &T {
        &self.0[diff.slot()]
    }
}

/// Per-resultant timing of a read pattern.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReadPattern {
    /// Mean time of each resultant
    t_bar: Vec<f64>,
    /// Variance-weighted time of each resultant (Casertano+22 Eq. 14)
    tau: Vec<f64>,
    /// Number of reads averaged into each resultant
    n_reads: Vec<u32>,
}

impl ReadPattern {
    /// Build a read pattern from precomputed resultant timing.
    ///
    /// Requires equal lengths, at least one resultant, `n_reads >= 1`, finite
    /// times and strictly increasing `t_bar`.
    pub fn new(t_bar: Vec<f64>, tau: Vec<f64>, n_reads: Vec<u32>) -> Result<Self, RampError> {
        if t_bar.is_empty() {
            return Err(RampError::InvalidInput(
                "read pattern has no resultants".to_string(),
            ));
        }
        if tau.len() != t_bar.len() || n_reads.len() != t_bar.len() {
            return Err(RampError::InvalidInput(format!(
                "read pattern lengths differ: t_bar={}, tau={}, n_reads={}",
                t_bar.len(),
                tau.len(),
                n_reads.len()
            )));
        }
        if let Some(i) = n_reads.iter().position(|&n| n == 0) {
            return Err(RampError::InvalidInput(format!(
                "resultant {i} averages zero reads"
            )));
        }
        if t_bar.iter().chain(tau.iter()).any(|v| !v.is_finite()) {
            return Err(RampError::InvalidInput(
                "read pattern times must be finite".to_string(),
            ));
        }
        if let Some(i) = t_bar.windows(2).position(|w| w[1] <= w[0]) {
            return Err(RampError::InvalidInput(format!(
                "t_bar must be strictly increasing: t_bar[{}]={} >= t_bar[{}]={}",
                i,
                t_bar[i],
                i + 1,
                t_bar[i + 1]
            )));
        }

        Ok(Self { t_bar, tau, n_reads })
    }

    /// Build a read pattern from the read indices averaged into each resultant.
    ///
    /// Read `k` is taken at `k * read_time`. Following Casertano+22, each
    /// resultant of `n` reads `r_0..r_{n-1}` has
    /// `t_bar = read_time * mean(r)` and
    /// `tau = read_time * Σ (2(n - k) - 1) r_k / n²`.
    pub fn from_reads(read_pattern: &[Vec<u32>], read_time: f64) -> Result<Self, RampError> {
        if !(read_time.is_finite() && read_time > 0.0) {
            return Err(RampError::InvalidInput(format!(
                "read time must be positive, got {read_time}"
            )));
        }

        let mut t_bar = Vec::with_capacity(read_pattern.len());
        let mut tau = Vec::with_capacity(read_pattern.len());
        let mut n_reads = Vec::with_capacity(read_pattern.len());

        for (i, reads) in read_pattern.iter().enumerate() {
            if reads.is_empty() {
                return Err(RampError::InvalidInput(format!(
                    "resultant {i} contains no reads"
                )));
            }
            let n = reads.len() as f64;
            let mean = reads.iter().map(|&r| r as f64).sum::<f64>() / n;
            let weighted: f64 = reads
                .iter()
                .enumerate()
                .map(|(k, &r)| (2.0 * (n - k as f64) - 1.0) * r as f64)
                .sum();

            t_bar.push(read_time * mean);
            tau.push(read_time * weighted / (n * n));
            n_reads.push(reads.len() as u32);
        }

        Self::new(t_bar, tau, n_reads)
    }

    pub fn len(&self) -> usize {
        self.t_bar.len()
    }

    pub fn is_empty(&self) -> bool {
        self.t_bar.is_empty()
    }

    pub fn t_bar(&self) -> &[f64] {
        &self.t_bar
    }

    pub fn tau(&self) -> &[f64] {
        &self.tau
    }

    pub fn n_reads(&self) -> &[u32] {
        &self.n_reads
    }
}

/// Exposure-wide constants for ramp fitting and jump detection.
#[derive(Debug, Clone, PartialEq)]
pub struct FixedValues {
    data: ReadPattern,
    use_jump: bool,
    t_bar_diffs: ByDiff<Vec<f64>>,
    t_bar_diff_sqrs: ByDiff<Vec<f64>>,
    read_recip_coeffs: ByDiff<Vec<f64>>,
    var_slope_coeffs: ByDiff<Vec<f64>>,
}

impl FixedValues {
    /// Derive every lag array from `data` in one step.
    ///
    /// At least two resultants are required, otherwise no difference exists.
    pub fn new(data: ReadPattern, use_jump: bool) -> Result<Self, RampError> {
        let n = data.len();
        if n < 2 {
            return Err(RampError::InvalidInput(format!(
                "read pattern needs at least 2 resultants, got {n}"
            )));
        }

        let t_bar = data.t_bar();
        let tau = data.tau();
        let n_reads = data.n_reads();

        let t_bar_diffs = lag_arrays(n, |i, j| t_bar[j] - t_bar[i]);
        let t_bar_diff_sqrs = lag_arrays(n, |i, j| (t_bar[j] - t_bar[i]).powi(2));
        let read_recip_coeffs =
            lag_arrays(n, |i, j| 1.0 / n_reads[j] as f64 + 1.0 / n_reads[i] as f64);
        let var_slope_coeffs = lag_arrays(n, |i, j| tau[i] + tau[j] - 2.0 * t_bar[i].min(t_bar[j]));

        Ok(Self {
            data,
            use_jump,
            t_bar_diffs,
            t_bar_diff_sqrs,
            read_recip_coeffs,
            var_slope_coeffs,
        })
    }

    /// Convenience constructor from read indices, see [`ReadPattern::from_reads`].
    pub fn from_reads(
        read_pattern: &[Vec<u32>],
        read_time: f64,
        use_jump: bool,
    ) -> Result<Self, RampError> {
        Self::new(ReadPattern::from_reads(read_pattern, read_time)?, use_jump)
    }

    pub fn data(&self) -> &ReadPattern {
        &self.data
    }

    /// Number of resultants in the read pattern.
    pub fn n_resultants(&self) -> usize {
        self.data.len()
    }

    pub fn use_jump(&self) -> bool {
        self.use_jump
    }

    /// Whether difference `(diff, index)` has both of its resultants.
    pub fn is_valid(&self, diff: Diff, index: usize) -> bool {
        index + diff.offset() < self.n_resultants()
    }

    pub fn t_bar_diffs(&self, diff: Diff) -> &[f64] {
        &self.t_bar_diffs[diff]
    }

    pub fn t_bar_diff_sqrs(&self, diff: Diff) -> &[f64] {
        &self.t_bar_diff_sqrs[diff]
    }

    pub fn read_recip_coeffs(&self, diff: Diff) -> &[f64] {
        &self.read_recip_coeffs[diff]
    }

    pub fn var_slope_coeffs(&self, diff: Diff) -> &[f64] {
        &self.var_slope_coeffs[diff]
    }
}

/// Evaluate `f(i, i + offset)` for each lag over `n - 1` slots, NaN where the
/// partner resultant does not exist.
fn lag_arrays(n: usize, f: impl Fn(usize, usize) -> f64) -> ByDiff<Vec<f64>> {
    ByDiff::from_fn(|diff| {
        (0..n - 1)
            .map(|i| {
                let j = i + diff.offset();
                if j < n {
                    f(i, j)
                } else {
                    f64::NAN
                }
            })
            .collect()
    })
}
