//! ramp-fit - Up-the-ramp slope fitting with cosmic-ray jump detection
//!
//! Fits the count rate of each detector pixel from a sequence of resultants
//! (averages of non-destructive reads) using the Casertano et al. (2022)
//! optimal weighting, after splitting the ramp at cosmic-ray jumps:
//!
//! - **Read pattern** - Exposure-wide timing constants and lag arrays
//! - **Pixel** - Per-pixel local slopes and read-noise variances for jump tests
//! - **Fit** - Optimally weighted slope, intercept and variances of one segment
//! - **Jump** - Recursive segmentation at significant jumps
//! - **Driver** - Fitting all segments of a pixel and combining them
//! - **Batch** - Parallel fitting of whole images
//! - **Simulate** - Synthetic ramps with known flux and injected jumps
//!
//! # Example
//!
//! ```text
//! use ramp_fit::{fit_pixel, FitConfig, FixedValues};
//!
//! let read_pattern = vec![vec![1], vec![2, 3], vec![4, 5], vec![6]];
//! let fixed = FixedValues::from_reads(&read_pattern, 3.04, true)?;
//! let fit = fit_pixel(5.0, &resultants, &fixed, &FitConfig::default())?;
//! for ramp in &fit.ramps {
//!     println!("{}: {:.3} +/- {:.3}", ramp.index, ramp.slope(), ramp.variances.total.sqrt());
//! }
//! ```

pub mod batch;
pub mod config;
pub mod dq;
pub mod driver;
pub mod error;
pub mod fit;
pub mod jump;
pub mod pixel;
pub mod ramp;
pub mod read_pattern;
pub mod simulate;

// Re-export commonly used types
pub use batch::{fit_image, fit_image_serial, ImageFit};
pub use config::FitConfig;
pub use dq::DqFlags;
pub use driver::{fit_pixel, fit_pixel_with_dq, AverageFit, PixelFit};
pub use error::RampError;
pub use fit::{weighting_power, Parameters, RampFit, RampFitter, Variances};
pub use jump::{JumpConfig, JumpDecision, JumpDetector, Segmentation, ThresholdModel};
pub use pixel::{Pixel, PixelJumpStats};
pub use ramp::{init_ramps, RampIndex};
pub use read_pattern::{ByDiff, Diff, FixedValues, ReadPattern};
pub use simulate::{simulate_image, simulate_ramp, RampSimulation};
