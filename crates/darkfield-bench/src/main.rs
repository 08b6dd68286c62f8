//! darkfield-bench: CLI tool for segmentation parameter experimentation and diagnostics.
//!
//! Runs the grain-segmentation pipeline on a given frame image with
//! configurable parameters, printing detailed per-stage diagnostics.
//! Useful for:
//!
//! - Tuning the relative threshold, seed spacing, and size bounds
//! - Measuring per-stage durations to identify bottlenecks
//! - Understanding how parameter changes affect seed/region/grain counts
//! - Writing the stage overview panel and per-grain images for inspection
//!
//! # Usage
//!
//! ```text
//! cargo run --release --bin darkfield-bench -- [OPTIONS] <IMAGE_PATH>
//! ```

#![allow(clippy::print_stdout, clippy::print_stderr)]

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::{Duration, Instant};

use clap::Parser;
use darkfield_pipeline::diagnostics::{Clock, SeparateDiagnostics};
use darkfield_pipeline::{ExcludeBorder, Frame, SeparateConfig, render};

/// Segmentation parameter experimentation and diagnostics for darkfield.
///
/// Runs the grain-segmentation pipeline on a given frame image with
/// configurable parameters and prints detailed per-stage timing and
/// count diagnostics.
#[derive(Parser)]
#[command(name = "darkfield-bench", version)]
struct Cli {
    /// Path to the input frame image (PNG, JPEG, BMP, TIFF).
    image_path: PathBuf,

    /// Minimum seed spacing in pixels (window radius for peak finding).
    #[arg(long, default_value_t = SeparateConfig::DEFAULT_MIN_DISTANCE, value_parser = clap::builder::RangedU64ValueParser::<u32>::new().range(1..))]
    min_distance: u32,

    /// Relative intensity threshold as a fraction of the frame maximum (0.0-1.0).
    #[arg(long, default_value_t = SeparateConfig::DEFAULT_THRESHOLD)]
    threshold: f32,

    /// Smallest grain size in pixels that survives the size filter.
    #[arg(long, default_value_t = SeparateConfig::DEFAULT_MIN_SIZE)]
    min_size: u32,

    /// Largest grain size in pixels that survives the size filter.
    #[arg(long)]
    max_size: Option<u32>,

    /// Maximum number of seeds kept (highest distance values win).
    #[arg(long, default_value_t = SeparateConfig::DEFAULT_MAX_GRAINS, value_parser = clap::builder::RangedU64ValueParser::<usize>::new().range(1..))]
    max_grains: usize,

    /// Exclude seeds within this margin of the frame border, in pixels.
    #[arg(long, conflicts_with = "exclude_border_auto")]
    exclude_border: Option<u32>,

    /// Exclude seeds within `min_distance` of the frame border.
    #[arg(long)]
    exclude_border_auto: bool,

    /// Write the 2x3 stage overview panel as a PNG.
    #[arg(long)]
    panel: Option<PathBuf>,

    /// Write each segmented grain as a PNG into this directory.
    #[arg(long)]
    grains_dir: Option<PathBuf>,

    /// Number of runs for averaging.
    #[arg(long, default_value_t = 1, value_parser = clap::builder::RangedU64ValueParser::<usize>::new().range(1..))]
    runs: usize,

    /// Output diagnostics as JSON instead of human-readable report.
    #[arg(long)]
    json: bool,

    /// Full segmentation config as a JSON string.
    ///
    /// When provided, all other segmentation parameter flags are ignored.
    /// The JSON must be a valid `SeparateConfig` serialization.
    #[arg(long)]
    config_json: Option<String>,
}

/// Build a [`SeparateConfig`] from CLI arguments.
///
/// If `--config-json` is provided, the JSON is parsed directly and all
/// individual parameter flags are ignored.  Otherwise, a config is
/// assembled from the individual flags.
fn config_from_cli(cli: &Cli) -> Result<SeparateConfig, String> {
    if let Some(ref json) = cli.config_json {
        return serde_json::from_str(json).map_err(|e| format!("Error parsing --config-json: {e}"));
    }

    let exclude_border = if cli.exclude_border_auto {
        ExcludeBorder::MinDistance
    } else {
        cli.exclude_border
            .map_or(ExcludeBorder::Off, ExcludeBorder::Margin)
    };

    Ok(SeparateConfig {
        min_distance: cli.min_distance,
        threshold: cli.threshold,
        min_size: cli.min_size,
        max_size: cli.max_size,
        max_grains: cli.max_grains,
        exclude_border,
    })
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match config_from_cli(&cli) {
        Ok(c) => c,
        Err(msg) => {
            eprintln!("{msg}");
            return ExitCode::FAILURE;
        }
    };

    let frame: Frame = match image::open(&cli.image_path) {
        Ok(dynamic) => dynamic.to_luma32f(),
        Err(e) => {
            eprintln!("Error reading {}: {e}", cli.image_path.display());
            return ExitCode::FAILURE;
        }
    };

    eprintln!(
        "Frame: {} ({}x{} pixels)",
        cli.image_path.display(),
        frame.width(),
        frame.height(),
    );
    eprintln!("Config: {config:#?}");
    eprintln!("Runs: {}", cli.runs);
    eprintln!();

    let mut all_diagnostics = Vec::with_capacity(cli.runs);

    for run in 0..cli.runs {
        if cli.runs > 1 {
            eprintln!("--- Run {}/{} ---", run + 1, cli.runs);
        }

        match darkfield_pipeline::diagnostics::separate_staged_with_diagnostics(
            &frame, &config, &StdClock,
        ) {
            Ok((staged, diagnostics)) => {
                if cli.json {
                    match serde_json::to_string_pretty(&diagnostics) {
                        Ok(json) => println!("{json}"),
                        Err(e) => {
                            eprintln!("Error serializing diagnostics: {e}");
                            return ExitCode::FAILURE;
                        }
                    }
                } else {
                    println!("{}", diagnostics.report());
                }

                // Write images on the first run only.
                if run == 0 {
                    if let Some(ref panel_path) = cli.panel {
                        let panel = render::render_panel(&staged);
                        match panel.save(panel_path) {
                            Ok(()) => eprintln!("Panel written to {}", panel_path.display()),
                            Err(e) => {
                                eprintln!("Error writing panel to {}: {e}", panel_path.display());
                            }
                        }
                    }
                    if let Some(ref grains_dir) = cli.grains_dir {
                        write_grains(&staged.segmentation.grains, grains_dir);
                    }
                }

                all_diagnostics.push(diagnostics);
            }
            Err(e) => {
                eprintln!("Segmentation error: {e}");
                return ExitCode::FAILURE;
            }
        }

        if cli.runs > 1 {
            eprintln!();
        }
    }

    // Print summary when multiple runs.
    if cli.runs > 1 {
        print_multi_run_summary(&all_diagnostics);
    }

    ExitCode::SUCCESS
}

/// Write each grain slot as a min-max normalized PNG.
fn write_grains(grains: &darkfield_pipeline::GrainStack, dir: &Path) {
    if let Err(e) = std::fs::create_dir_all(dir) {
        eprintln!("Error creating {}: {e}", dir.display());
        return;
    }
    for (index, slot) in grains.slots().iter().enumerate() {
        let path = dir.join(format!("grain-{index:03}.png"));
        let rendered = render::to_u8_normalized(slot);
        match rendered.save(&path) {
            Ok(()) => eprintln!("Grain written to {}", path.display()),
            Err(e) => eprintln!("Error writing grain to {}: {e}", path.display()),
        }
    }
}

/// [`Clock`] implementation backed by [`std::time::Instant`].
struct StdClock;

impl Clock for StdClock {
    type Instant = Instant;

    fn now(&self) -> Instant {
        Instant::now()
    }

    fn elapsed(&self, since: &Instant) -> Duration {
        since.elapsed()
    }
}

/// Function pointer type for extracting a stage duration from diagnostics.
type StageExtractor = fn(&SeparateDiagnostics) -> Duration;

/// Print aggregated statistics across multiple runs.
#[allow(clippy::cast_precision_loss)]
fn print_multi_run_summary(all_diagnostics: &[SeparateDiagnostics]) {
    debug_assert!(!all_diagnostics.is_empty(), "no diagnostics to summarize");

    println!();
    println!(
        "Summary ({} runs)\n{}",
        all_diagnostics.len(),
        "=".repeat(60),
    );

    let durations: Vec<f64> = all_diagnostics
        .iter()
        .map(|d| d.total_duration.as_secs_f64() * 1000.0)
        .collect();

    let min = durations.iter().copied().reduce(f64::min).unwrap_or(0.0);
    let max = durations.iter().copied().reduce(f64::max).unwrap_or(0.0);
    let mean = durations.iter().sum::<f64>() / durations.len() as f64;

    println!("Total duration: min={min:.3}ms  mean={mean:.3}ms  max={max:.3}ms");

    // Per-stage means.
    println!();
    println!("{:<24} {:>12}", "Stage", "Mean (ms)");
    println!("{}", "-".repeat(40));

    let stage_extractors: &[(&str, StageExtractor)] = &[
        ("Mask", |d| d.mask.duration),
        ("Distance", |d| d.distance.duration),
        ("Seeding", |d| d.seeding.duration),
        ("Elevation", |d| d.elevation.duration),
        ("Watershed", |d| d.watershed.duration),
        ("Collect", |d| d.collect.duration),
    ];

    for (name, extractor) in stage_extractors {
        let stage_mean = all_diagnostics
            .iter()
            .map(|d| extractor(d).as_secs_f64() * 1000.0)
            .sum::<f64>()
            / all_diagnostics.len() as f64;
        println!("{name:<24} {stage_mean:>10.3}ms");
    }
}
