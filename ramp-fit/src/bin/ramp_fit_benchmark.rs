//! Time whole-image ramp fitting on simulated data and report recovery

use clap::Parser;
use log::info;
use ramp_fit::{
    fit_image, fit_image_serial, simulate_image, FitConfig, FixedValues, RampSimulation,
};
use std::path::PathBuf;
use std::time::Instant;

#[derive(Parser, Debug)]
#[command(author, version, about = "Benchmark ramp fitting on simulated pixels")]
struct Args {
    /// Number of pixels to simulate
    #[arg(long, default_value_t = 100_000)]
    pixels: usize,

    /// Number of resultants
    #[arg(long, default_value_t = 8)]
    resultants: usize,

    /// Reads averaged into each resultant
    #[arg(long, default_value_t = 4)]
    reads_per_resultant: u32,

    /// Time between reads in seconds
    #[arg(long, default_value_t = 3.04)]
    read_time: f64,

    /// Count rate per second
    #[arg(long, default_value_t = 20.0)]
    flux: f64,

    /// Read noise per read
    #[arg(long, default_value_t = 5.0)]
    read_noise: f64,

    /// Fraction of pixels receiving a cosmic ray
    #[arg(long, default_value_t = 0.05)]
    jump_fraction: f64,

    /// Charge deposited by each cosmic ray
    #[arg(long, default_value_t = 1000.0)]
    jump_amplitude: f64,

    /// Disable jump detection
    #[arg(long, default_value_t = false)]
    no_jump: bool,

    /// JSON fit configuration (defaults if omitted)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Random seed
    #[arg(long, default_value_t = 42)]
    seed: u64,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => FitConfig::load_from_file(path)?,
        None => FitConfig::default(),
    };

    let read_pattern: Vec<Vec<u32>> = (0..args.resultants as u32)
        .map(|r| {
            let first = 1 + r * args.reads_per_resultant;
            (first..first + args.reads_per_resultant).collect()
        })
        .collect();
    let fixed = FixedValues::from_reads(&read_pattern, args.read_time, !args.no_jump)?;

    // Cosmic rays land mid-exposure on every n-th pixel
    let jump_every = if args.jump_fraction > 0.0 {
        (1.0 / args.jump_fraction).round().max(1.0) as usize
    } else {
        usize::MAX
    };
    let jump_read = (args.resultants as u32 / 2) * args.reads_per_resultant + 1;
    let sims: Vec<RampSimulation> = (0..args.pixels)
        .map(|p| {
            let sim = RampSimulation::new(args.flux, args.read_noise);
            if p % jump_every == 0 {
                sim.with_jump(jump_read, args.jump_amplitude)
            } else {
                sim
            }
        })
        .collect();
    let injected = sims.iter().filter(|s| s.jump.is_some()).count();

    info!("Simulating {} pixels", args.pixels);
    let start = Instant::now();
    let image = simulate_image(&read_pattern, args.read_time, &sims, args.seed)?;
    let simulate_time = start.elapsed();

    let read_noise = ndarray::Array1::from_elem(args.pixels, args.read_noise);

    println!("Warming up...");
    let warmup = args.pixels.min(1000);
    let _ = fit_image(
        image.slice(ndarray::s![.., ..warmup]),
        read_noise.slice(ndarray::s![..warmup]),
        None,
        &fixed,
        &config,
    )?;

    let start = Instant::now();
    let serial = fit_image_serial(image.view(), read_noise.view(), None, &fixed, &config)?;
    let serial_time = start.elapsed();

    let start = Instant::now();
    let parallel = fit_image(image.view(), read_noise.view(), None, &fixed, &config)?;
    let parallel_time = start.elapsed();

    let slopes = parallel.slopes();
    let finite: Vec<f64> = slopes.iter().copied().filter(|s| s.is_finite()).collect();
    let mean_slope = finite.iter().sum::<f64>() / finite.len().max(1) as f64;
    let std_slope = (finite
        .iter()
        .map(|s| (s - mean_slope).powi(2))
        .sum::<f64>()
        / finite.len().max(1) as f64)
        .sqrt();
    let mean_predicted = parallel
        .read_variances()
        .iter()
        .zip(parallel.poisson_variances().iter())
        .map(|(r, p)| r + p)
        .filter(|v| v.is_finite())
        .map(f64::sqrt)
        .sum::<f64>()
        / finite.len().max(1) as f64;

    let per_pixel_ns = |d: std::time::Duration| d.as_nanos() as f64 / args.pixels.max(1) as f64;

    println!("\n========== RAMP FIT BENCHMARK ==========");
    println!("Configuration:");
    println!("  Pixels: {}", args.pixels);
    println!(
        "  Resultants: {} x {} reads @ {:.2}s",
        args.resultants, args.reads_per_resultant, args.read_time
    );
    println!("  Flux: {:.2}/s, Read noise: {:.2}", args.flux, args.read_noise);
    println!("  Jump detection: {}", fixed.use_jump());
    println!("\nTiming Results:");
    println!("  Simulate: {:.1} ms", simulate_time.as_secs_f64() * 1000.0);
    println!(
        "  Serial:   {:.1} ms ({:.0} ns/pixel)",
        serial_time.as_secs_f64() * 1000.0,
        per_pixel_ns(serial_time)
    );
    println!(
        "  Parallel: {:.1} ms ({:.0} ns/pixel)",
        parallel_time.as_secs_f64() * 1000.0,
        per_pixel_ns(parallel_time)
    );
    println!(
        "  Speedup:  {:.2}x",
        serial_time.as_secs_f64() / parallel_time.as_secs_f64().max(f64::EPSILON)
    );
    println!("\nRecovery:");
    println!("  Fit pixels: {}/{}", finite.len(), args.pixels);
    println!(
        "  Mean slope: {:.4} (true {:.4})",
        mean_slope, args.flux
    );
    println!(
        "  Slope scatter: {:.4}, mean predicted sigma: {:.4}",
        std_slope, mean_predicted
    );
    println!(
        "  Pixels with jumps: {} (injected {})",
        parallel.pixels_with_jumps(),
        injected
    );
    println!(
        "  Serial and parallel agree: {}",
        serial == parallel
    );
    println!("========================================");

    Ok(())
}
