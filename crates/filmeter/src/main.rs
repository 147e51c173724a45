//! filmeter: review and record filament measurements for a directory of
//! segmented objects.
//!
//! Every `*.csv` pixel file in the directory (excluding `*skel*` files)
//! is measured in name order. Measured objects are either accepted
//! automatically (`--accept-all`) or shown to the reviewer one at a time:
//! the overlay is written to `<base>-overlay.png` and a `y`/`n` answer is
//! read from stdin. Accepted rows are appended to `<DIR>-res.tsv`.
//!
//! # Usage
//!
//! ```text
//! cargo run --release --bin filmeter -- [OPTIONS] <DIR>
//! ```

#![allow(clippy::print_stdout, clippy::print_stderr)]

use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::{Duration, Instant};

use clap::{Parser, ValueEnum};
use filmeter_io::{BatchCursor, BatchOptions, ObjectFiles, ResultsWriter, load};
use filmeter_pipeline::diagnostics::{Clock, measure_with_diagnostics};
use filmeter_pipeline::{
    Candidate, MeasureConfig, ReviewPolicy, ReviewSession, SkeletonSource, Width, WidthStatistic,
};

/// Filament width and length measurement with manual review.
///
/// Measures every object in a directory, asks for a decision on each
/// one and writes the accepted widths and lengths to a results table.
#[derive(Parser)]
#[command(name = "filmeter", version)]
struct Cli {
    /// Directory holding `<name>.csv`, `<name>-skel.csv` and
    /// `<name>-skel_info.csv` files.
    dir: PathBuf,

    /// Minimum object area in pixels.
    #[arg(long, default_value_t = MeasureConfig::DEFAULT_MIN_AREA)]
    min_area: usize,

    /// Radius of the tangent-fit disc around each endpoint.
    #[arg(long, default_value_t = MeasureConfig::DEFAULT_END_RADIUS)]
    end_radius: f64,

    /// Radius of the endcap disc removed before width aggregation.
    #[arg(long, default_value_t = MeasureConfig::DEFAULT_MASK_RADIUS)]
    mask_radius: f64,

    /// Minimum number of width samples needed to report a width.
    #[arg(long, default_value_t = MeasureConfig::DEFAULT_MIN_WIDTH_PIXELS)]
    min_width_pixels: usize,

    /// Column step of the boundary walk.
    #[arg(long, default_value_t = MeasureConfig::DEFAULT_WALK_STEP)]
    walk_step: f64,

    /// Width statistic.
    #[arg(long, value_enum, default_value_t = Statistic::Mean)]
    statistic: Statistic,

    /// Keep the endcap regions in the width samples.
    #[arg(long)]
    no_mask_endcaps: bool,

    /// Thin the object mask instead of reading `<name>-skel.csv`.
    #[arg(long)]
    derive_skeleton: bool,

    /// Full measurement config as a JSON string.
    ///
    /// When provided, all other measurement parameter flags are ignored.
    /// The JSON must be a valid `MeasureConfig` serialization.
    #[arg(long)]
    config_json: Option<String>,

    /// Objects must be longer than this to pass the automatic check
    /// (0 disables it).
    #[arg(long, default_value_t = ReviewPolicy::DEFAULT_LENGTH_THRESHOLD)]
    threshold: f64,

    /// Decide every object automatically instead of prompting.
    #[arg(long)]
    accept_all: bool,

    /// Results file (defaults to `<DIR>-res.tsv`).
    #[arg(long)]
    output: Option<PathBuf>,

    /// Write `<name>-masked.png` for every measured object.
    #[arg(long)]
    write_masked: bool,

    /// Do not write `<name>broken_end_detection.png` for objects whose
    /// skeleton has the wrong number of endpoints.
    #[arg(long)]
    no_diagnostics: bool,

    /// Print each measured object as a JSON line.
    #[arg(long)]
    json: bool,

    /// Measure only the named object, print per-stage timings and exit.
    #[arg(long, value_name = "NAME")]
    diagnose: Option<String>,
}

/// Width statistic selection.
#[derive(Clone, Copy, ValueEnum)]
enum Statistic {
    /// Arithmetic mean of the width samples.
    Mean,
    /// Median of the width samples.
    Median,
}

/// Build a [`MeasureConfig`] from CLI arguments.
///
/// If `--config-json` is provided, the JSON is parsed directly and all
/// individual parameter flags are ignored. The result is validated
/// either way.
fn config_from_cli(cli: &Cli) -> Result<MeasureConfig, String> {
    let config = if let Some(ref json) = cli.config_json {
        serde_json::from_str(json).map_err(|e| format!("Error parsing --config-json: {e}"))?
    } else {
        MeasureConfig {
            min_area: cli.min_area,
            end_radius: cli.end_radius,
            mask_radius: cli.mask_radius,
            min_width_pixels: cli.min_width_pixels,
            walk_step: cli.walk_step,
            statistic: match cli.statistic {
                Statistic::Mean => WidthStatistic::Mean,
                Statistic::Median => WidthStatistic::Median,
            },
            mask_endcaps: !cli.no_mask_endcaps,
        }
    };
    config.validate().map_err(|e| e.to_string())?;
    Ok(config)
}

/// Wall-clock time source for stage timings.
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

/// Measure a single object with stage timings.
fn diagnose(cli: &Cli, name: &str, config: &MeasureConfig) -> ExitCode {
    let files = ObjectFiles::from_pixel_path(&cli.dir.join(format!("{name}.csv")));
    let loaded = load::read_pixels(&files.pixels).and_then(|samples| {
        let skeleton = if cli.derive_skeleton {
            SkeletonSource::Derived
        } else {
            SkeletonSource::Supplied(load::read_skeleton(&files.skeleton, &samples)?)
        };
        let summary = load::read_optional_skeleton_info(&files.skeleton_info)?;
        Ok((samples, skeleton, summary))
    });
    let (samples, skeleton, summary) = match loaded {
        Ok(loaded) => loaded,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::FAILURE;
        }
    };

    match measure_with_diagnostics(samples, skeleton, summary, config, &StdClock) {
        Ok((_, diagnostics)) if cli.json => match serde_json::to_string_pretty(&diagnostics) {
            Ok(json) => println!("{json}"),
            Err(e) => {
                eprintln!("Error serializing diagnostics: {e}");
                return ExitCode::FAILURE;
            }
        },
        Ok((_, diagnostics)) => println!("{}", diagnostics.report()),
        Err(e) => println!("{name}: {e}"),
    }
    ExitCode::SUCCESS
}

fn describe(candidate: &Candidate) -> String {
    let result = &candidate.result;
    let width = match result.width {
        Width::Available(w) => format!("{w:.3}"),
        Width::Unavailable { samples } => format!("NA ({samples} samples)"),
    };
    let branches = result
        .branch_count
        .map_or_else(|| "?".to_string(), |b| b.to_string());
    format!(
        "{}: branches={branches} length={:.3} width={width}",
        candidate.name,
        result.total_length()
    )
}

/// Read `y` or `n`, asking again on anything else. Returns `None` once
/// stdin is exhausted.
fn prompt(lines: &mut impl Iterator<Item = std::io::Result<String>>) -> Option<bool> {
    loop {
        print!("accept? [y/n] ");
        let _ = std::io::stdout().flush();
        match lines.next()?.ok()?.trim().to_ascii_lowercase().as_str() {
            "y" | "yes" => return Some(true),
            "n" | "no" => return Some(false),
            _ => println!("please answer y or n"),
        }
    }
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    let config = match config_from_cli(&cli) {
        Ok(c) => c,
        Err(msg) => {
            eprintln!("{msg}");
            return ExitCode::FAILURE;
        }
    };

    if let Some(name) = &cli.diagnose {
        return diagnose(&cli, name, &config);
    }

    let options = BatchOptions {
        config,
        derive_skeleton: cli.derive_skeleton,
        write_masked: cli.write_masked,
        write_diagnostics: !cli.no_diagnostics,
    };
    let cursor = match BatchCursor::open(&cli.dir, options) {
        Ok(cursor) => cursor,
        Err(e) => {
            eprintln!("Error reading {}: {e}", cli.dir.display());
            return ExitCode::FAILURE;
        }
    };

    let output = cli
        .output
        .clone()
        .unwrap_or_else(|| filmeter_io::results_path(&cli.dir));
    let mut writer = match ResultsWriter::create(&output) {
        Ok(w) => w,
        Err(e) => {
            eprintln!("Error creating {}: {e}", output.display());
            return ExitCode::FAILURE;
        }
    };

    let policy = ReviewPolicy {
        length_threshold: cli.threshold,
        accept_all: cli.accept_all,
    };
    let mut session = ReviewSession::new(cursor, policy);
    let stdin = std::io::stdin();
    let mut lines = stdin.lock().lines();
    let mut stdin_open = true;

    loop {
        match session.next() {
            Ok(Some(candidate)) => {
                if cli.json {
                    let line =
                        serde_json::json!({ "name": candidate.name, "result": candidate.result });
                    println!("{line}");
                }
            }
            Ok(None) => break,
            Err(e) => {
                eprintln!("{e}");
                return ExitCode::FAILURE;
            }
        }

        let decision = session.resolve(|candidate| {
            if !stdin_open {
                return false;
            }
            ask(&cli.dir, candidate, &mut lines).unwrap_or_else(|| {
                log::info!("end of input, rejecting remaining objects");
                stdin_open = false;
                false
            })
        });
        match decision {
            Ok(true) => {
                if let Some(row) = session.rows().last()
                    && let Err(e) = writer.write_row(row)
                {
                    eprintln!("Error writing {}: {e}", output.display());
                    return ExitCode::FAILURE;
                }
            }
            Ok(false) => {}
            Err(e) => {
                eprintln!("{e}");
                return ExitCode::FAILURE;
            }
        }
    }

    for skipped in session.skipped() {
        eprintln!("skipped {}: {}", skipped.name, skipped.reason);
    }
    println!(
        "{} accepted, {} rejected, {} skipped, {} below minimum area; results in {}",
        session.rows().len(),
        session.rejected(),
        session.skipped().len(),
        session.filtered(),
        output.display()
    );
    ExitCode::SUCCESS
}

/// Show `candidate` to the reviewer and read their answer.
fn ask(
    dir: &Path,
    candidate: &Candidate,
    lines: &mut impl Iterator<Item = std::io::Result<String>>,
) -> Option<bool> {
    let overlay = dir.join(format!("{}-overlay.png", candidate.name));
    match std::fs::write(&overlay, &candidate.overlay_png) {
        Ok(()) => println!("{} (overlay: {})", describe(candidate), overlay.display()),
        Err(e) => {
            log::warn!("could not write {}: {e}", overlay.display());
            println!("{}", describe(candidate));
        }
    }
    prompt(lines)
}
