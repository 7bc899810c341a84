//! Synthetic up-the-ramp data.
//!
//! Charge accumulates as a Poisson process between reads, each read adds
//! Gaussian read noise, and reads are averaged into resultants following a
//! read pattern. An optional cosmic ray adds a fixed charge to every read from
//! a given read index on.
//!
//! Used by tests and the benchmark binary to check recovery of known fluxes
//! and jumps.

use ndarray::Array2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal, Poisson};
use rayon::prelude::*;

use crate::error::RampError;

/// Charge deposited by a cosmic ray.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InjectedJump {
    /// First read index that sees the extra charge
    pub read: u32,
    /// Charge added, in the same units as the flux
    pub amplitude: f64,
}

/// Parameters of one simulated pixel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RampSimulation {
    /// Count rate per unit time
    pub flux: f64,
    /// Per-read noise standard deviation
    pub read_noise: f64,
    pub jump: Option<InjectedJump>,
}

impl RampSimulation {
    pub fn new(flux: f64, read_noise: f64) -> Self {
        Self {
            flux,
            read_noise,
            jump: None,
        }
    }

    pub fn with_jump(mut self, read: u32, amplitude: f64) -> Self {
        self.jump = Some(InjectedJump { read, amplitude });
        self
    }

    fn validate(&self) -> Result<(), RampError> {
        if !(self.flux.is_finite() && self.flux >= 0.0) {
            return Err(RampError::InvalidInput(format!(
                "flux must be finite and non-negative, got {}",
                self.flux
            )));
        }
        if !(self.read_noise.is_finite() && self.read_noise >= 0.0) {
            return Err(RampError::InvalidInput(format!(
                "read noise must be finite and non-negative, got {}",
                self.read_noise
            )));
        }
        Ok(())
    }
}

/// Simulate the resultants of one pixel.
///
/// Read `k` happens at `k * read_time`, matching
/// [`ReadPattern::from_reads`](crate::read_pattern::ReadPattern::from_reads).
/// Charge starts at zero at time zero.
pub fn simulate_ramp<R: Rng + ?Sized>(
    read_pattern: &[Vec<u32>],
    read_time: f64,
    sim: &RampSimulation,
    rng: &mut R,
) -> Result<Vec<f64>, RampError> {
    sim.validate()?;
    if !(read_time.is_finite() && read_time > 0.0) {
        return Err(RampError::InvalidInput(format!(
            "read time must be positive, got {read_time}"
        )));
    }
    let last_read = read_pattern
        .iter()
        .flatten()
        .copied()
        .max()
        .ok_or_else(|| RampError::InvalidInput("read pattern has no reads".to_string()))?;

    let shot = if sim.flux > 0.0 {
        Some(
            Poisson::new(sim.flux * read_time)
                .map_err(|e| RampError::InvalidInput(format!("poisson rate: {e}")))?,
        )
    } else {
        None
    };
    let noise = Normal::new(0.0, sim.read_noise)
        .map_err(|e| RampError::InvalidInput(format!("read noise: {e}")))?;

    let mut charge = 0.0;
    let mut reads = Vec::with_capacity(last_read as usize + 1);
    for k in 0..=last_read {
        if k > 0 {
            if let Some(shot) = &shot {
                charge += shot.sample(rng);
            }
        }
        let cosmic = match sim.jump {
            Some(jump) if k >= jump.read => jump.amplitude,
            _ => 0.0,
        };
        reads.push(charge + cosmic + noise.sample(rng));
    }

    read_pattern
        .iter()
        .enumerate()
        .map(|(i, group)| {
            if group.is_empty() {
                return Err(RampError::InvalidInput(format!(
                    "resultant {i} contains no reads"
                )));
            }
            let sum: f64 = group.iter().map(|&k| reads[k as usize]).sum();
            Ok(sum / group.len() as f64)
        })
        .collect()
}

/// Simulate an `(n_resultants, n_pixels)` image, one pixel per entry of `sims`.
///
/// Each pixel draws from its own generator seeded with `seed + pixel`, so the
/// output is reproducible regardless of thread scheduling.
pub fn simulate_image(
    read_pattern: &[Vec<u32>],
    read_time: f64,
    sims: &[RampSimulation],
    seed: u64,
) -> Result<Array2<f64>, RampError> {
    let columns: Vec<Vec<f64>> = sims
        .par_iter()
        .enumerate()
        .map(|(p, sim)| {
            let mut rng = StdRng::seed_from_u64(seed.wrapping_add(p as u64));
            simulate_ramp(read_pattern, read_time, sim, &mut rng)
        })
        .collect::<Result<_, _>>()?;

    let mut image = Array2::zeros((read_pattern.len(), sims.len()));
    for (p, column) in columns.iter().enumerate() {
        for (r, &value) in column.iter().enumerate() {
            image[[r, p]] = value;
        }
    }
    Ok(image)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn pattern() -> Vec<Vec<u32>> {
        vec![vec![1, 2], vec![3, 4], vec![5, 6], vec![7, 8]]
    }

    #[test]
    fn test_noiseless_zero_flux_is_zero() {
        let mut rng = StdRng::seed_from_u64(1);
        let ramp = simulate_ramp(&pattern(), 1.0, &RampSimulation::new(0.0, 0.0), &mut rng).unwrap();
        assert!(ramp.iter().all(|&r| r == 0.0));
    }

    #[test]
    fn test_jump_offsets_later_reads() {
        let mut rng = StdRng::seed_from_u64(1);
        let sim = RampSimulation::new(0.0, 0.0).with_jump(4, 100.0);
        let ramp = simulate_ramp(&pattern(), 1.0, &sim, &mut rng).unwrap();

        // Reads 3 and 4 straddle the jump
        assert_eq!(ramp, vec![0.0, 50.0, 100.0, 100.0]);
    }

    #[test]
    fn test_mean_follows_flux() {
        let sims = vec![RampSimulation::new(50.0, 5.0); 2000];
        let image = simulate_image(&pattern(), 2.0, &sims, 7).unwrap();
        assert_eq!(image.dim(), (4, 2000));

        // Resultant 3 averages reads 7 and 8: mean charge 50 * 2.0 * 7.5
        let mean = image.row(3).mean().unwrap();
        assert_relative_eq!(mean, 750.0, max_relative = 0.01);
    }

    #[test]
    fn test_image_is_reproducible() {
        let sims = vec![RampSimulation::new(10.0, 3.0); 16];
        let a = simulate_image(&pattern(), 1.0, &sims, 42).unwrap();
        let b = simulate_image(&pattern(), 1.0, &sims, 42).unwrap();
        let c = simulate_image(&pattern(), 1.0, &sims, 43).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_invalid_parameters() {
        let mut rng = StdRng::seed_from_u64(1);
        assert!(simulate_ramp(&pattern(), 1.0, &RampSimulation::new(-1.0, 1.0), &mut rng).is_err());
        assert!(simulate_ramp(&pattern(), 1.0, &RampSimulation::new(1.0, -1.0), &mut rng).is_err());
        assert!(simulate_ramp(&pattern(), 0.0, &RampSimulation::new(1.0, 1.0), &mut rng).is_err());
        assert!(simulate_ramp(&[], 1.0, &RampSimulation::new(1.0, 1.0), &mut rng).is_err());
    }
}
