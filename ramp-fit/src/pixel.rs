//! Per-pixel state: validated inputs and precomputed jump statistics.

use crate::error::RampError;
use crate::read_pattern::{ByDiff, Diff, FixedValues};

/// Local slopes and their read-noise variance at both lags for one pixel.
///
/// Built once per pixel and shared by every candidate segment tested for it.
/// `local_slopes[d][i]` is NaN where the difference is undefined (the last
/// double slot, or a difference touching a non-finite resultant); the matching variance entry is still filled in so every array
/// has length `N - 1`. Consumers must gate on [`FixedValues::is_valid`] or on the
/// segment bounds, never on the variance.
#[derive(Debug, Clone, PartialEq)]
pub struct PixelJumpStats {
    local_slopes: ByDiff<Vec<f64>>,
    var_read_noise: ByDiff<Vec<f64>>,
}

impl PixelJumpStats {
    pub fn new(read_noise: f64, signal: &[f64], fixed: &FixedValues) -> Result<Self, RampError> {
        let n = signal.len();
        if n < 2 {
            return Err(RampError::InvalidInput(format!(
                "jump statistics need at least 2 resultants, got {n}"
            )));
        }
        if n != fixed.n_resultants() {
            return Err(RampError::InvalidInput(format!(
                "pixel has {} resultants but read pattern has {}",
                n,
                fixed.n_resultants()
            )));
        }

        let read_var = read_noise * read_noise;

        let local_slopes = ByDiff::from_fn(|diff| {
            let t_bar_diffs = fixed.t_bar_diffs(diff);
            (0..n - 1)
                .map(|i| {
                    if fixed.is_valid(diff, i) {
                        (signal[i + diff.offset()] - signal[i]) / t_bar_diffs[i]
                    } else {
                        f64::NAN
                    }
                })
                .collect()
        });

        let var_read_noise = ByDiff::from_fn(|diff| {
            fixed
                .read_recip_coeffs(diff)
                .iter()
                .map(|coeff| read_var * coeff)
                .collect()
        });

        Ok(Self {
            local_slopes,
            var_read_noise,
        })
    }

    /// Number of difference slots per lag (`N - 1`).
    pub fn len(&self) -> usize {
        self.local_slopes[Diff::Single].len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn local_slopes(&self, diff: Diff) -> &[f64] {
        &self.local_slopes[diff]
    }

    pub fn var_read_noise(&self, diff: Diff) -> &[f64] {
        &self.var_read_noise[diff]
    }
}

/// Validated inputs for one pixel plus its jump statistics.
///
/// `jump_stats` is present exactly when the read pattern enables jump
/// detection. Resultants may be non-finite (e.g. saturated reads stored as
/// NaN); the driver excludes them from every segment.
#[derive(Debug, Clone)]
pub struct Pixel<'a> {
    fixed: &'a FixedValues,
    read_noise: f64,
    resultants: &'a [f64],
    jump_stats: Option<PixelJumpStats>,
}

impl<'a> Pixel<'a> {
    /// Validate `resultants` and `read_noise` against `fixed`, building jump
    /// statistics when `fixed.use_jump()` is set.
    pub fn new(
        fixed: &'a FixedValues,
        read_noise: f64,
        resultants: &'a [f64],
    ) -> Result<Self, RampError> {
        if !(read_noise.is_finite() && read_noise >= 0.0) {
            return Err(RampError::InvalidInput(format!(
                "read noise must be finite and non-negative, got {read_noise}"
            )));
        }
        if resultants.len() < 2 {
            return Err(RampError::InvalidInput(format!(
                "pixel needs at least 2 resultants, got {}",
                resultants.len()
            )));
        }
        if resultants.len() != fixed.n_resultants() {
            return Err(RampError::InvalidInput(format!(
                "pixel has {} resultants but read pattern has {}",
                resultants.len(),
                fixed.n_resultants()
            )));
        }
        let jump_stats = if fixed.use_jump() {
            Some(PixelJumpStats::new(read_noise, resultants, fixed)?)
        } else {
            None
        };

        Ok(Self {
            fixed,
            read_noise,
            resultants,
            jump_stats,
        })
    }

    pub fn fixed(&self) -> &'a FixedValues {
        self.fixed
    }

    pub fn read_noise(&self) -> f64 {
        self.read_noise
    }

    pub fn resultants(&self) -> &'a [f64] {
        self.resultants
    }

    pub fn jump_stats(&self) -> Option<&PixelJumpStats> {
        self.jump_stats.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn fixed(n: u32, use_jump: bool) -> FixedValues {
        let pattern: Vec<Vec<u32>> = (1..=n).map(|r| vec![r]).collect();
        FixedValues::from_reads(&pattern, 1.0, use_jump).unwrap()
    }

    #[test]
    fn test_local_slopes_and_variance() {
        let fixed = fixed(4, true);
        let signal = [10.0, 20.0, 30.5, 41.0];
        let stats = PixelJumpStats::new(2.0, &signal, &fixed).unwrap();

        assert_eq!(stats.len(), 3);
        assert_relative_eq!(stats.local_slopes(Diff::Single)[2], 10.5);
        assert_relative_eq!(stats.local_slopes(Diff::Double)[0], 10.25);
        assert_relative_eq!(stats.local_slopes(Diff::Double)[1], 10.5);
        assert!(stats.local_slopes(Diff::Double)[2].is_nan());

        // read_noise² * (1/1 + 1/1)
        for diff in Diff::ALL {
            assert_relative_eq!(stats.var_read_noise(diff)[0], 8.0);
        }
    }

    #[test]
    fn test_two_resultants_hold_sentinel() {
        let fixed = fixed(2, true);
        let stats = PixelJumpStats::new(1.0, &[0.0, 5.0], &fixed).unwrap();

        assert_eq!(stats.len(), 1);
        assert_relative_eq!(stats.local_slopes(Diff::Single)[0], 5.0);
        assert!(stats.local_slopes(Diff::Double)[0].is_nan());
    }

    #[test]
    fn test_stats_reject_short_or_mismatched_signal() {
        let fixed = fixed(3, true);
        assert!(matches!(
            PixelJumpStats::new(1.0, &[1.0], &fixed),
            Err(RampError::InvalidInput(_))
        ));
        assert!(matches!(
            PixelJumpStats::new(1.0, &[1.0, 2.0], &fixed),
            Err(RampError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_jump_stats_presence_follows_use_jump() {
        let signal = [1.0, 2.0, 3.0];

        let with_jump = fixed(3, true);
        let pixel = Pixel::new(&with_jump, 1.0, &signal).unwrap();
        assert!(pixel.jump_stats().is_some());

        let without_jump = fixed(3, false);
        let pixel = Pixel::new(&without_jump, 1.0, &signal).unwrap();
        assert!(pixel.jump_stats().is_none());
    }

    #[test]
    fn test_pixel_validation() {
        let fixed = fixed(3, false);
        assert!(Pixel::new(&fixed, -1.0, &[1.0, 2.0, 3.0]).is_err());
        assert!(Pixel::new(&fixed, f64::NAN, &[1.0, 2.0, 3.0]).is_err());
        assert!(Pixel::new(&fixed, 1.0, &[1.0]).is_err());
        assert!(Pixel::new(&fixed, 1.0, &[1.0, 2.0]).is_err());
        assert!(Pixel::new(&fixed, 0.0, &[1.0, 2.0, 3.0]).is_ok());
    }

    #[test]
    fn test_non_finite_resultants_poison_only_their_differences() {
        let fixed = fixed(4, true);
        let signal = [0.0, 5.0, 10.0, f64::NAN];
        let pixel = Pixel::new(&fixed, 1.0, &signal).unwrap();
        let stats = pixel.jump_stats().unwrap();

        assert_relative_eq!(stats.local_slopes(Diff::Single)[0], 5.0);
        assert_relative_eq!(stats.local_slopes(Diff::Single)[1], 5.0);
        assert_relative_eq!(stats.local_slopes(Diff::Double)[0], 5.0);
        assert!(stats.local_slopes(Diff::Single)[2].is_nan());
        assert!(stats.local_slopes(Diff::Double)[1].is_nan());
    }
}
