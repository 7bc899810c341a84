//! Whole-image ramp fitting.
//!
//! Pixels are independent given the shared read pattern, so the image is fit
//! in parallel over pixels with rayon. Each pixel gets its own copy of its
//! resultant column and its own jump statistics; results are identical to a
//! serial pass in any order.

use log::warn;
use ndarray::{Array1, ArrayView1, ArrayView2, Axis};
use rayon::prelude::*;

use crate::config::FitConfig;
use crate::dq::DqFlags;
use crate::driver::{fit_pixel_with_dq, PixelFit};
use crate::error::RampError;
use crate::read_pattern::FixedValues;

/// Per-pixel results of fitting an image, in pixel order.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageFit {
    pub pixels: Vec<Result<PixelFit, RampError>>,
}

impl ImageFit {
    pub fn len(&self) -> usize {
        self.pixels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pixels.is_empty()
    }

    /// Average slope per pixel, NaN where the pixel failed or is unfit.
    pub fn slopes(&self) -> Array1<f64> {
        self.average_field(|average| average.slope)
    }

    /// Read-noise variance of the average slope, NaN where unavailable.
    pub fn read_variances(&self) -> Array1<f64> {
        self.average_field(|average| average.variances.read)
    }

    /// Poisson variance of the average slope, NaN where unavailable.
    pub fn poisson_variances(&self) -> Array1<f64> {
        self.average_field(|average| average.variances.poisson)
    }

    /// Pixel-level flags; failed pixels are `DO_NOT_USE`.
    pub fn flags(&self) -> Array1<u32> {
        self.pixels
            .iter()
            .map(|pixel| match pixel {
                Ok(fit) => fit.flags.bits(),
                Err(_) => DqFlags::DO_NOT_USE.bits(),
            })
            .collect()
    }

    /// Number of pixels with at least one detected jump.
    pub fn pixels_with_jumps(&self) -> usize {
        self.pixels
            .iter()
            .filter(|pixel| matches!(pixel, Ok(fit) if !fit.jumps().is_empty()))
            .count()
    }

    fn average_field(&self, field: impl Fn(&crate::driver::AverageFit) -> f64) -> Array1<f64> {
        self.pixels
            .iter()
            .map(|pixel| match pixel {
                Ok(PixelFit {
                    average: Some(average),
                    ..
                }) => field(average),
                _ => f64::NAN,
            })
            .collect()
    }
}

/// Fit every pixel of an image in parallel.
///
/// # Arguments
/// * `resultants` - `(n_resultants, n_pixels)` resultant values
/// * `read_noise` - Read noise per pixel
/// * `dq` - Optional `(n_resultants, n_pixels)` input flags
/// * `fixed` - Read pattern constants of the exposure
/// * `config` - Fit settings
///
/// Shape mismatches fail the whole call; per-pixel failures are reported in
/// the returned [`ImageFit`] without stopping other pixels.
pub fn fit_image(
    resultants: ArrayView2<f64>,
    read_noise: ArrayView1<f64>,
    dq: Option<ArrayView2<u32>>,
    fixed: &FixedValues,
    config: &FitConfig,
) -> Result<ImageFit, RampError> {
    check_shapes(&resultants, &read_noise, dq.as_ref(), fixed)?;
    config.validate()?;

    let pixels = (0..resultants.len_of(Axis(1)))
        .into_par_iter()
        .map(|p| fit_column(p, &resultants, &read_noise, dq.as_ref(), fixed, config))
        .collect();

    Ok(ImageFit { pixels })
}

/// Serial counterpart of [`fit_image`], for callers managing their own threads.
pub fn fit_image_serial(
    resultants: ArrayView2<f64>,
    read_noise: ArrayView1<f64>,
    dq: Option<ArrayView2<u32>>,
    fixed: &FixedValues,
    config: &FitConfig,
) -> Result<ImageFit, RampError> {
    check_shapes(&resultants, &read_noise, dq.as_ref(), fixed)?;
    config.validate()?;

    let pixels = (0..resultants.len_of(Axis(1)))
        .map(|p| fit_column(p, &resultants, &read_noise, dq.as_ref(), fixed, config))
        .collect();

    Ok(ImageFit { pixels })
}

fn check_shapes(
    resultants: &ArrayView2<f64>,
    read_noise: &ArrayView1<f64>,
    dq: Option<&ArrayView2<u32>>,
    fixed: &FixedValues,
) -> Result<(), RampError> {
    let (n_resultants, n_pixels) = resultants.dim();
    if n_resultants != fixed.n_resultants() {
        return Err(RampError::InvalidInput(format!(
            "image has {} resultants but read pattern has {}",
            n_resultants,
            fixed.n_resultants()
        )));
    }
    if read_noise.len() != n_pixels {
        return Err(RampError::InvalidInput(format!(
            "read noise has {} entries for {} pixels",
            read_noise.len(),
            n_pixels
        )));
    }
    if let Some(dq) = dq {
        if dq.dim() != resultants.dim() {
            return Err(RampError::InvalidInput(format!(
                "dq shape {:?} does not match resultants shape {:?}",
                dq.dim(),
                resultants.dim()
            )));
        }
    }
    Ok(())
}

fn fit_column(
    pixel: usize,
    resultants: &ArrayView2<f64>,
    read_noise: &ArrayView1<f64>,
    dq: Option<&ArrayView2<u32>>,
    fixed: &FixedValues,
    config: &FitConfig,
) -> Result<PixelFit, RampError> {
    let column: Vec<f64> = resultants.column(pixel).to_vec();
    let flags: Option<Vec<DqFlags>> =
        dq.map(|dq| dq.column(pixel).iter().map(|&bits| DqFlags::from_raw(bits)).collect());

    let result = fit_pixel_with_dq(
        read_noise[pixel],
        &column,
        flags.as_deref(),
        fixed,
        config,
    );
    if let Err(err) = &result {
        warn!("pixel {pixel} not fit: {err}");
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{Array1, Array2};

    fn fixed(use_jump: bool) -> FixedValues {
        let pattern: Vec<Vec<u32>> = (1..=6).map(|r| vec![r]).collect();
        FixedValues::from_reads(&pattern, 2.0, use_jump).unwrap()
    }

    fn image(fixed: &FixedValues, n_pixels: usize) -> Array2<f64> {
        let t_bar = fixed.data().t_bar().to_vec();
        Array2::from_shape_fn((t_bar.len(), n_pixels), |(r, p)| {
            let jump = if p % 3 == 0 && r >= 3 { 5000.0 } else { 0.0 };
            100.0 + (p as f64 + 1.0) * t_bar[r] + jump
        })
    }

    #[test]
    fn test_fit_image_recovers_slopes() {
        let fixed = fixed(true);
        let data = image(&fixed, 7);
        let read_noise = Array1::from_elem(7, 1.0);
        let fit = fit_image(data.view(), read_noise.view(), None, &fixed, &FitConfig::default())
            .unwrap();

        assert_eq!(fit.len(), 7);
        let slopes = fit.slopes();
        for (p, slope) in slopes.iter().enumerate() {
            assert!(
                (slope - (p as f64 + 1.0)).abs() < 1e-6,
                "pixel {p}: slope {slope}"
            );
        }
        assert_eq!(fit.pixels_with_jumps(), 3);
        assert!(fit.flags().iter().all(|&f| f == 0));
    }

    #[test]
    fn test_parallel_matches_serial() {
        let fixed = fixed(true);
        let data = image(&fixed, 40);
        let read_noise = Array1::from_shape_fn(40, |p| 0.5 + p as f64 * 0.1);
        let config = FitConfig::default();

        let parallel = fit_image(data.view(), read_noise.view(), None, &fixed, &config).unwrap();
        let serial =
            fit_image_serial(data.view(), read_noise.view(), None, &fixed, &config).unwrap();

        assert_eq!(parallel, serial);
    }

    #[test]
    fn test_bad_pixel_does_not_abort_batch() {
        let fixed = fixed(false);
        let data = image(&fixed, 3);
        let read_noise = Array1::from_vec(vec![1.0, -1.0, 1.0]);
        let fit = fit_image(data.view(), read_noise.view(), None, &fixed, &FitConfig::default())
            .unwrap();

        assert!(fit.pixels[0].is_ok());
        assert!(matches!(fit.pixels[1], Err(RampError::InvalidInput(_))));
        assert!(fit.pixels[2].is_ok());
        assert!(fit.slopes()[1].is_nan());
        assert_eq!(fit.flags()[1], DqFlags::DO_NOT_USE.bits());
    }

    #[test]
    fn test_dq_cube_is_applied_per_pixel() {
        let fixed = fixed(false);
        let data = image(&fixed, 2);
        let read_noise = Array1::from_elem(2, 1.0);
        let mut dq = Array2::<u32>::zeros((6, 2));
        for r in 0..6 {
            dq[[r, 1]] = DqFlags::SATURATED.bits();
        }
        let fit = fit_image(
            data.view(),
            read_noise.view(),
            Some(dq.view()),
            &fixed,
            &FitConfig::default(),
        )
        .unwrap();

        assert!(fit.pixels[0].as_ref().unwrap().flags.is_empty());
        let saturated = fit.pixels[1].as_ref().unwrap();
        assert!(saturated.is_unfit());
        assert!(saturated.flags.contains(DqFlags::NO_VALID_RAMP));
    }

    #[test]
    fn test_shape_mismatch_is_rejected() {
        let fixed = fixed(false);
        let data = Array2::<f64>::zeros((5, 4));
        let read_noise = Array1::from_elem(4, 1.0);
        assert!(fit_image(data.view(), read_noise.view(), None, &fixed, &FitConfig::default())
            .is_err());

        let data = Array2::<f64>::zeros((6, 4));
        let read_noise = Array1::from_elem(3, 1.0);
        assert!(fit_image(data.view(), read_noise.view(), None, &fixed, &FitConfig::default())
            .is_err());
    }
}
