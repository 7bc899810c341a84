//! Fitting all ramps of a single pixel.

use log::debug;

use crate::config::FitConfig;
use crate::dq::DqFlags;
use crate::error::RampError;
use crate::fit::{RampFit, RampFitter, Variances};
use crate::jump::JumpDetector;
use crate::pixel::Pixel;
use crate::ramp::{init_ramps, RampIndex};
use crate::read_pattern::FixedValues;

/// Inverse-read-variance weighted combination of a pixel's ramp fits.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AverageFit {
    pub slope: f64,
    pub variances: Variances,
}

/// Everything fit for one pixel.
#[derive(Debug, Clone, PartialEq)]
pub struct PixelFit {
    /// Fits of the accepted segments, ordered by start index
    pub ramps: Vec<RampFit>,
    /// Per-resultant flags: input flags merged with `JUMP_DET` at every detected
    /// jump and `DO_NOT_USE` on resultants of segments that could not be fit
    pub dq: Vec<DqFlags>,
    /// Pixel flags; `DO_NOT_USE | NO_VALID_RAMP` when no segment could be fit
    pub flags: DqFlags,
    /// Combined slope over all ramps, `None` when there are none
    pub average: Option<AverageFit>,
}

impl PixelFit {
    /// No ramp of the pixel could be fit.
    pub fn is_unfit(&self) -> bool {
        self.ramps.is_empty()
    }

    /// Indices of resultants flagged `JUMP_DET`.
    pub fn jumps(&self) -> Vec<usize> {
        self.dq
            .iter()
            .enumerate()
            .filter(|(_, flags)| flags.contains(DqFlags::JUMP_DET))
            .map(|(i, _)| i)
            .collect()
    }
}

/// Fit one pixel whose resultants carry no input flags.
///
/// See [`fit_pixel_with_dq`].
pub fn fit_pixel(
    read_noise: f64,
    resultants: &[f64],
    fixed: &FixedValues,
    config: &FitConfig,
) -> Result<PixelFit, RampError> {
    fit_pixel_with_dq(read_noise, resultants, None, fixed, config)
}

/// Fit one pixel.
///
/// Initial segments are the runs of unflagged, finite resultants in `dq`;
/// non-finite resultants are flagged `DO_NOT_USE` on output. With jump
/// detection enabled in `fixed`, each run is segmented at detected jumps before
/// fitting; otherwise each run is fit directly.
///
/// Returns `InvalidInput` when inputs are inconsistent. Segments that cannot
/// be fit are dropped and their resultants flagged `DO_NOT_USE`; a pixel with
/// no fittable segment is returned as unfit, not as an error.
pub fn fit_pixel_with_dq(
    read_noise: f64,
    resultants: &[f64],
    dq: Option<&[DqFlags]>,
    fixed: &FixedValues,
    config: &FitConfig,
) -> Result<PixelFit, RampError> {
    config.validate()?;
    let pixel = Pixel::new(fixed, read_noise, resultants)?;

    let mut out_dq = match dq {
        Some(flags) if flags.len() != resultants.len() => {
            return Err(RampError::InvalidInput(format!(
                "dq has {} entries but pixel has {} resultants",
                flags.len(),
                resultants.len()
            )));
        }
        Some(flags) => flags.to_vec(),
        None => vec![DqFlags::empty(); resultants.len()],
    };
    for (flags, value) in out_dq.iter_mut().zip(resultants) {
        if !value.is_finite() {
            *flags |= DqFlags::DO_NOT_USE;
        }
    }

    let fitter = RampFitter::new(fixed.data(), read_noise, config.poisson_variance);
    let candidates = init_ramps(&out_dq);

    let (segments, jumps) = match pixel.jump_stats() {
        Some(stats) => {
            let detector = JumpDetector::new(stats, fixed, fitter, &config.jump);
            let mut segments = Vec::new();
            let mut jumps = Vec::new();
            for candidate in candidates {
                let segmentation = detector.segment(resultants, candidate);
                segments.extend(segmentation.ramps);
                jumps.extend(segmentation.jumps);
            }
            (segments, jumps)
        }
        None => (candidates, Vec::new()),
    };

    for &jump in &jumps {
        out_dq[jump] |= DqFlags::JUMP_DET;
    }

    let mut ramps = Vec::with_capacity(segments.len());
    for segment in segments {
        match fitter.fit(resultants, segment) {
            Ok(mut fit) => {
                if borders_jump(segment, &jumps) {
                    fit.flags |= DqFlags::JUMP_DET;
                }
                ramps.push(fit);
            }
            Err(err) if err.is_segment_level() => {
                debug!("dropping ramp {segment}: {err}");
                for flags in &mut out_dq[segment.range()] {
                    *flags |= DqFlags::DO_NOT_USE;
                }
            }
            Err(err) => return Err(err),
        }
    }

    let flags = if ramps.is_empty() {
        debug!("no valid ramp among {} resultants", resultants.len());
        DqFlags::DO_NOT_USE | DqFlags::NO_VALID_RAMP
    } else {
        DqFlags::empty()
    };

    let average = average_fit(&ramps, config.poisson_variance);

    Ok(PixelFit {
        ramps,
        dq: out_dq,
        flags,
        average,
    })
}

/// Segment starts right after a jump or ends right before one.
fn borders_jump(segment: RampIndex, jumps: &[usize]) -> bool {
    jumps
        .iter()
        .any(|&jump| jump == segment.start || jump == segment.end + 1)
}

/// Combine ramp fits weighted by inverse read variance.
///
/// Fits with zero read variance (noiseless reads) make the weights undefined;
/// all ramps are then weighted equally.
fn average_fit(ramps: &[RampFit], poisson_variance: bool) -> Option<AverageFit> {
    if ramps.is_empty() {
        return None;
    }

    let inverse: Vec<f64> = ramps
        .iter()
        .map(|fit| {
            if fit.variances.read > 0.0 {
                1.0 / fit.variances.read
            } else {
                0.0
            }
        })
        .collect();
    let weights = if inverse.iter().all(|&w| w > 0.0) {
        inverse
    } else {
        vec![1.0; ramps.len()]
    };
    let total: f64 = weights.iter().sum();

    let mut slope = 0.0;
    let mut read = 0.0;
    let mut poisson_coefficient = 0.0;
    for (fit, &w) in ramps.iter().zip(&weights) {
        slope += w * fit.parameters.slope;
        read += w * w * fit.variances.read;
        poisson_coefficient += w * w * fit.poisson_coefficient;
    }
    slope /= total;
    read /= total * total;
    poisson_coefficient /= total * total;

    let poisson = if poisson_variance {
        poisson_coefficient * slope.max(0.0)
    } else {
        0.0
    };

    Some(AverageFit {
        slope,
        variances: Variances::new(read, poisson),
    })
}
