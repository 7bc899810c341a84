//! Optimally weighted ramp fitting (Casertano et al. 2022).
//!
//! Each resultant in a segment gets a weight that depends on its distance from
//! the segment's mid time and on a power chosen from the segment's
//! signal-to-noise ratio:
//!
//! ```text
//! w_i = ((1 + P) n_i / (1 + P n_i)) * |(t_i - t_mid) / t_scale|^P      (Eq. 45)
//! ```
//!
//! Low SNR ramps (P = 0) reduce to ordinary least squares; high SNR ramps put
//! nearly all weight on the end points. The fit is closed form: one pass to
//! accumulate weights, one pass to form the per-resultant coefficients `k_i`,
//! from which the slope (Eq. 38), read-noise variance (Eq. 39) and Poisson
//! variance (Eq. 40) follow directly.
//!
//! The coefficients are computed about the weighted mean time rather than from
//! `f0 f2 - f1²` (Eq. 36) to avoid cancellation between large sums.

use crate::dq::DqFlags;
use crate::error::RampError;
use crate::ramp::RampIndex;
use crate::read_pattern::ReadPattern;

/// Casertano+22 Table 2: weighting power by minimum segment SNR.
const POWER_TABLE: [(f64, f64); 6] = [
    (f64::NEG_INFINITY, 0.0),
    (5.0, 0.4),
    (10.0, 1.0),
    (20.0, 3.0),
    (50.0, 6.0),
    (100.0, 10.0),
];

/// Weighting exponent for a segment with the given SNR.
pub fn weighting_power(snr: f64) -> f64 {
    POWER_TABLE
        .iter()
        .rev()
        .find(|(min_snr, _)| snr >= *min_snr)
        .map_or(0.0, |&(_, power)| power)
}

/// Fitted line parameters; the intercept is evaluated at `t = 0`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Parameters {
    pub intercept: f64,
    pub slope: f64,
}

/// Variance decomposition of a slope estimate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Variances {
    /// Read-noise contribution
    pub read: f64,
    /// Poisson (shot noise) contribution at the fitted rate
    pub poisson: f64,
    /// `read + poisson`
    pub total: f64,
}

impl Variances {
    pub fn new(read: f64, poisson: f64) -> Self {
        Self {
            read,
            poisson,
            total: read + poisson,
        }
    }
}

/// Fit of one accepted ramp segment.
#[derive(Debug, Clone, PartialEq)]
pub struct RampFit {
    pub index: RampIndex,
    pub parameters: Parameters,
    pub variances: Variances,
    /// Poisson variance per unit count rate; `variances.poisson` is this times
    /// `max(slope, 0)` when shot noise is included.
    pub poisson_coefficient: f64,
    /// Segment flags, e.g. `JUMP_DET` when a boundary is a detected jump
    pub flags: DqFlags,
}

impl RampFit {
    pub fn slope(&self) -> f64 {
        self.parameters.slope
    }
}

/// Weighted least-squares fitter for segments of one pixel's ramp.
///
/// Holds only borrowed, read-only inputs; fitting is a pure function of them.
#[derive(Debug, Clone, Copy)]
pub struct RampFitter<'a> {
    pattern: &'a ReadPattern,
    read_noise: f64,
    poisson_variance: bool,
}

impl<'a> RampFitter<'a> {
    /// `poisson_variance` controls whether shot noise at the fitted rate is
    /// added to the reported variance.
    pub fn new(pattern: &'a ReadPattern, read_noise: f64, poisson_variance: bool) -> Self {
        Self {
            pattern,
            read_noise,
            poisson_variance,
        }
    }

    pub fn read_noise(&self) -> f64 {
        self.read_noise
    }

    /// Fit `resultants[ramp.start..=ramp.end]`.
    ///
    /// Segments of fewer than two resultants yield `InsufficientData`. Two
    /// resultants give the plain two-point slope with read-noise-only variance.
    pub fn fit(&self, resultants: &[f64], ramp: RampIndex) -> Result<RampFit, RampError> {
        let len = ramp.len();
        if len < 2 {
            return Err(RampError::InsufficientData { ramp, len });
        }
        if ramp.end >= resultants.len() || ramp.end >= self.pattern.len() {
            return Err(RampError::InvalidInput(format!(
                "ramp {ramp} exceeds {} resultants",
                resultants.len().min(self.pattern.len())
            )));
        }

        let signal = &resultants[ramp.range()];
        let t_bar = &self.pattern.t_bar()[ramp.range()];
        let tau = &self.pattern.tau()[ramp.range()];
        let n_reads = &self.pattern.n_reads()[ramp.range()];

        if len == 2 {
            return self.fit_two_point(ramp, signal, t_bar, n_reads);
        }

        let read_var = self.read_noise * self.read_noise;
        let last = len - 1;

        // Departs from Casertano+22, which uses the final resultant alone: a
        // jump in the first resultant would otherwise inflate the SNR.
        let accumulated = (signal[last] - signal[0]).max(0.0);
        let noise = (read_var + accumulated).sqrt();
        let snr = if noise > 0.0 { accumulated / noise } else { 0.0 };
        let power = weighting_power(snr);

        let t_mid = (t_bar[0] + t_bar[last]) / 2.0;
        let t_scale = match (t_bar[last] - t_bar[0]) / 2.0 {
            s if s > 0.0 => s,
            _ => 1.0,
        };

        let weights: Vec<f64> = t_bar
            .iter()
            .zip(n_reads)
            .map(|(&t, &n)| {
                let n = n as f64;
                ((1.0 + power) * n / (1.0 + power * n)) * ((t - t_mid) / t_scale).abs().powf(power)
            })
            .collect();

        let weight_sum: f64 = weights.iter().sum();
        if weight_sum <= 0.0 || weight_sum.is_nan() {
            return Err(RampError::NumericDegeneracy {
                ramp,
                reason: "weight sum is zero",
            });
        }

        let t_weighted = weights.iter().zip(t_bar).map(|(w, t)| w * t).sum::<f64>() / weight_sum;
        let spread: f64 = weights
            .iter()
            .zip(t_bar)
            .map(|(w, t)| w * (t - t_weighted).powi(2))
            .sum();
        if spread <= 0.0 || spread.is_nan() {
            return Err(RampError::NumericDegeneracy {
                ramp,
                reason: "weighted time spread is zero",
            });
        }

        let mut slope = 0.0;
        let mut read = 0.0;
        let mut poisson_coefficient = 0.0;
        // Σ_{j<i} k_j t_bar_j for the covariance term of Eq. 40
        let mut earlier = 0.0;

        for i in 0..len {
            let coeff = weights[i] * (t_bar[i] - t_weighted) / spread;

            slope += coeff * signal[i];
            read += coeff * coeff * read_var / n_reads[i] as f64;
            poisson_coefficient += coeff * coeff * tau[i] + 2.0 * coeff * earlier;
            earlier += coeff * t_bar[i];
        }

        let signal_weighted = weights.iter().zip(signal).map(|(w, r)| w * r).sum::<f64>() / weight_sum;
        let intercept = signal_weighted - slope * t_weighted;

        let poisson = if self.poisson_variance {
            poisson_coefficient * slope.max(0.0)
        } else {
            0.0
        };

        Ok(RampFit {
            index: ramp,
            parameters: Parameters { intercept, slope },
            variances: Variances::new(read, poisson),
            poisson_coefficient,
            flags: DqFlags::empty(),
        })
    }

    fn fit_two_point(
        &self,
        ramp: RampIndex,
        signal: &[f64],
        t_bar: &[f64],
        n_reads: &[u32],
    ) -> Result<RampFit, RampError> {
        let dt = t_bar[1] - t_bar[0];
        if dt <= 0.0 || dt.is_nan() {
            return Err(RampError::NumericDegeneracy {
                ramp,
                reason: "resultant times do not increase",
            });
        }

        let slope = (signal[1] - signal[0]) / dt;
        let intercept = signal[0] - slope * t_bar[0];
        let recip = 1.0 / n_reads[0] as f64 + 1.0 / n_reads[1] as f64;
        let read = self.read_noise * self.read_noise * recip / (dt * dt);

        Ok(RampFit {
            index: ramp,
            parameters: Parameters { intercept, slope },
            variances: Variances::new(read, 0.0),
            poisson_coefficient: 0.0,
            flags: DqFlags::empty(),
        })
    }
}
