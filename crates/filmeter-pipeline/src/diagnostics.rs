//! Measurement diagnostics: timing and counts for each stage.
//!
//! Time is read through the [`Clock`] trait so this crate stays free of
//! platform clocks; the command-line driver supplies one backed by
//! `std::time::Instant`.
//!
//! Durations are serialized as fractional seconds (`f64`) for JSON
//! compatibility, since `std::time::Duration` does not implement serde
//! traits.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::pipeline::Pipeline;
use crate::raster::{PixelSample, SkeletonSource};
use crate::types::{MeasureConfig, MeasureError, Measurement, SkeletonSummary};

/// Source of monotonic timestamps.
pub trait Clock {
    /// Opaque timestamp type.
    type Instant;

    /// The current time.
    fn now(&self) -> Self::Instant;

    /// Time elapsed since `since`.
    fn elapsed(&self, since: &Self::Instant) -> Duration;
}

/// Serde support for `std::time::Duration` as fractional seconds.
mod duration_serde {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        duration.as_secs_f64().serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(|_| {
            serde::de::Error::custom(
                "duration seconds must be finite, non-negative, and representable as a Duration",
            )
        })
    }
}

/// Diagnostics collected from measuring one object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeasureDiagnostics {
    /// Stage 0: raster construction.
    pub build: StageDiagnostics,
    /// Stage 1: perimeter trimming.
    pub trim: StageDiagnostics,
    /// Stage 2: endpoint detection.
    pub endpoints: StageDiagnostics,
    /// Stage 3: skeleton summary.
    pub summary: StageDiagnostics,
    /// Stage 4: tangent fit and boundary walk at both tips.
    pub extrapolation: StageDiagnostics,
    /// Stage 5: endcap masking.
    pub endcap: StageDiagnostics,
    /// Stage 6: width aggregation.
    pub aggregation: StageDiagnostics,
    /// Wall-clock duration of the whole measurement (seconds).
    #[serde(with = "duration_serde")]
    pub total_duration: Duration,
}

/// Diagnostics for a single stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageDiagnostics {
    /// Wall-clock duration of this stage (seconds).
    #[serde(with = "duration_serde")]
    pub duration: Duration,
    /// Stage-specific metrics.
    pub metrics: StageMetrics,
}

/// Stage-specific metrics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum StageMetrics {
    /// Raster construction.
    Build {
        /// Number of pixel samples.
        pixel_count: usize,
        /// Raster height.
        rows: usize,
        /// Raster width.
        cols: usize,
        /// Whether the rasters were transposed.
        transposed: bool,
        /// Number of skeleton pixels.
        skeleton_pixels: usize,
    },
    /// Perimeter trimming.
    Trim {
        /// Nonzero values left on the perimeter.
        remaining: usize,
    },
    /// Endpoint detection.
    Endpoints {
        /// `(row, col)` of both endpoints.
        endpoints: [(usize, usize); 2],
    },
    /// Skeleton summary.
    Summary {
        /// Branch count.
        branches: u32,
        /// Skeleton length in pixels.
        length: f64,
        /// Whether the summary came from an external analyser.
        supplied: bool,
    },
    /// Tangent fit and boundary walk.
    Extrapolation {
        /// Fit points used at each tip.
        fit_points: [usize; 2],
        /// Walk steps taken at each tip.
        steps: [usize; 2],
        /// Extra length at each tip.
        lengths: [f64; 2],
    },
    /// Endcap masking.
    Endcap {
        /// Whether masking ran.
        enabled: bool,
        /// Disc radius in pixels.
        radius: f64,
        /// Values cleared.
        cleared: usize,
    },
    /// Width aggregation.
    Aggregation {
        /// Width, when available.
        width: Option<f64>,
        /// Skeleton length plus both extra lengths.
        total_length: f64,
    },
}

impl MeasureDiagnostics {
    /// Format diagnostics as a human-readable report.
    #[must_use]
    pub fn report(&self) -> String {
        let mut lines = Vec::new();

        lines.push(format!("Measurement Diagnostics\n{}", "=".repeat(60)));
        lines.push(format!(
            "Total duration: {:.3}ms",
            duration_ms(self.total_duration),
        ));
        lines.push(String::new());
        lines.push(format!(
            "{:<16} {:>10} {:>8}  {}",
            "Stage", "Duration", "% Total", "Details"
        ));
        lines.push("-".repeat(72));

        let total_ms = duration_ms(self.total_duration);
        let stages = [
            ("Build", &self.build),
            ("Trim", &self.trim),
            ("Endpoints", &self.endpoints),
            ("Summary", &self.summary),
            ("Extrapolation", &self.extrapolation),
            ("Endcap", &self.endcap),
            ("Aggregation", &self.aggregation),
        ];
        for (name, diag) in stages {
            let ms = duration_ms(diag.duration);
            let pct = if total_ms > 0.0 {
                ms / total_ms * 100.0
            } else {
                0.0
            };
            let details = format_metrics(&diag.metrics);
            lines.push(format!("{name:<16} {ms:>8.3}ms {pct:>7.1}%  {details}"));
        }

        lines.join("\n")
    }
}

fn duration_ms(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}

fn format_metrics(metrics: &StageMetrics) -> String {
    match metrics {
        StageMetrics::Build {
            pixel_count,
            rows,
            cols,
            transposed,
            skeleton_pixels,
        } => {
            let t = if *transposed { " (transposed)" } else { "" };
            format!("{pixel_count} px -> {rows}x{cols}{t}, skeleton={skeleton_pixels}")
        }
        StageMetrics::Trim { remaining } => format!("{remaining} perimeter values"),
        StageMetrics::Endpoints { endpoints: [a, b] } => {
            format!("({}, {}) ({}, {})", a.0, a.1, b.0, b.1)
        }
        StageMetrics::Summary {
            branches,
            length,
            supplied,
        } => {
            let source = if *supplied { "supplied" } else { "traced" };
            format!("branches={branches} length={length:.3} ({source})")
        }
        StageMetrics::Extrapolation {
            fit_points,
            steps,
            lengths,
        } => format!(
            "fit={}/{} steps={}/{} extra={:.3}+{:.3}",
            fit_points[0], fit_points[1], steps[0], steps[1], lengths[0], lengths[1],
        ),
        StageMetrics::Endcap {
            enabled,
            radius,
            cleared,
        } => {
            if *enabled {
                format!("r={radius:.1} cleared={cleared}")
            } else {
                "disabled".to_string()
            }
        }
        StageMetrics::Aggregation {
            width,
            total_length,
        } => match width {
            Some(w) => format!("width={w:.4} length={total_length:.3}"),
            None => format!("width=NA length={total_length:.3}"),
        },
    }
}

/// Run the full measurement, timing every stage.
///
/// # Errors
///
/// Returns the same errors as [`crate::measure`].
pub fn measure_with_diagnostics<C: Clock>(
    samples: Vec<PixelSample>,
    skeleton: SkeletonSource,
    summary: Option<SkeletonSummary>,
    config: &MeasureConfig,
    clock: &C,
) -> Result<(Measurement, MeasureDiagnostics), MeasureError> {
    let pixel_count = samples.len();
    let total_start = clock.now();

    let start = clock.now();
    let built = Pipeline::new(samples, skeleton, config.clone()).build()?;
    let build = StageDiagnostics {
        duration: clock.elapsed(&start),
        metrics: StageMetrics::Build {
            pixel_count,
            rows: built.rasters().rows(),
            cols: built.rasters().cols(),
            transposed: built.rasters().transposed,
            skeleton_pixels: built.rasters().skeleton.count_set(),
        },
    };

    let start = clock.now();
    let trimmed = built.trim();
    let trim = StageDiagnostics {
        duration: clock.elapsed(&start),
        metrics: StageMetrics::Trim {
            remaining: trimmed.remaining(),
        },
    };

    let start = clock.now();
    let found = trimmed.find_endpoints()?;
    let [a, b] = *found.endpoints();
    let endpoints = StageDiagnostics {
        duration: clock.elapsed(&start),
        metrics: StageMetrics::Endpoints {
            endpoints: [(a.row, a.col), (b.row, b.col)],
        },
    };

    let start = clock.now();
    let summarized = found.summarize(summary)?;
    let resolved = summarized.summary();
    let summary_diag = StageDiagnostics {
        duration: clock.elapsed(&start),
        metrics: StageMetrics::Summary {
            branches: resolved.branches,
            length: resolved.length,
            supplied: summary.is_some(),
        },
    };

    let start = clock.now();
    let extrapolated = summarized.extrapolate()?;
    let [t0, t1] = extrapolated.tips();
    let extrapolation = StageDiagnostics {
        duration: clock.elapsed(&start),
        metrics: StageMetrics::Extrapolation {
            fit_points: [t0.tangent.point_count, t1.tangent.point_count],
            steps: [t0.steps, t1.steps],
            lengths: [t0.length, t1.length],
        },
    };

    let start = clock.now();
    let masked = extrapolated.mask_endcaps();
    let endcap = StageDiagnostics {
        duration: clock.elapsed(&start),
        metrics: StageMetrics::Endcap {
            enabled: config.mask_endcaps,
            radius: config.mask_radius,
            cleared: masked.cleared(),
        },
    };

    let start = clock.now();
    let measured = masked.aggregate();
    let aggregation = StageDiagnostics {
        duration: clock.elapsed(&start),
        metrics: StageMetrics::Aggregation {
            width: measured.result().width.value(),
            total_length: measured.result().total_length(),
        },
    };

    let diagnostics = MeasureDiagnostics {
        build,
        trim,
        endpoints,
        summary: summary_diag,
        extrapolation,
        endcap,
        aggregation,
        total_duration: clock.elapsed(&total_start),
    };
    Ok((measured.into_measurement(), diagnostics))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::cell::Cell;

    use super::*;

    /// A clock that advances one millisecond per reading.
    struct TickClock(Cell<u64>);

    impl Clock for TickClock {
        type Instant = u64;

        fn now(&self) -> u64 {
            let t = self.0.get();
            self.0.set(t + 1);
            t
        }

        fn elapsed(&self, since: &u64) -> Duration {
            Duration::from_millis(self.0.get() - since)
        }
    }

    fn bar() -> (Vec<PixelSample>, Vec<u8>) {
        let mut samples = Vec::new();
        let mut skel = Vec::new();
        for row in 0..3 {
            for col in 0..30 {
                samples.push(PixelSample {
                    row,
                    col,
                    value: 3.0,
                });
                skel.push(u8::from(row == 1 && (2..=27).contains(&col)));
            }
        }
        (samples, skel)
    }

    #[test]
    fn duration_ms_converts_correctly() {
        assert!((duration_ms(Duration::from_millis(1234)) - 1234.0).abs() < 0.01);
    }

    #[test]
    fn diagnostics_cover_every_stage() {
        let (samples, skel) = bar();
        let clock = TickClock(Cell::new(0));
        let (measurement, diag) = measure_with_diagnostics(
            samples,
            SkeletonSource::Supplied(skel),
            None,
            &MeasureConfig::default(),
            &clock,
        )
        .unwrap();

        assert!(matches!(
            diag.build.metrics,
            StageMetrics::Build {
                pixel_count: 90,
                rows: 5,
                cols: 32,
                transposed: false,
                skeleton_pixels: 26,
            }
        ));
        assert!(matches!(
            diag.endpoints.metrics,
            StageMetrics::Endpoints {
                endpoints: [(2, 3), (2, 28)]
            }
        ));
        assert!(matches!(
            diag.summary.metrics,
            StageMetrics::Summary {
                branches: 1,
                supplied: false,
                ..
            }
        ));
        assert!(diag.total_duration >= diag.aggregation.duration);
        assert!(diag.total_duration > Duration::ZERO);
        assert!(measurement.result.width.value().is_some());
    }

    #[test]
    fn report_lists_stages() {
        let (samples, skel) = bar();
        let clock = TickClock(Cell::new(0));
        let (_, diag) = measure_with_diagnostics(
            samples,
            SkeletonSource::Supplied(skel),
            None,
            &MeasureConfig::default(),
            &clock,
        )
        .unwrap();
        let report = diag.report();
        assert!(report.contains("Measurement Diagnostics"));
        assert!(report.contains("Extrapolation"));
        assert!(report.contains("branches=1"));
    }

    #[test]
    fn diagnostics_serialize_durations_as_seconds() {
        let diag = StageDiagnostics {
            duration: Duration::from_millis(1500),
            metrics: StageMetrics::Trim { remaining: 7 },
        };
        let json = serde_json::to_value(&diag).unwrap();
        assert!((json["duration"].as_f64().unwrap() - 1.5).abs() < 1e-12);
        let back: StageDiagnostics = serde_json::from_value(json).unwrap();
        assert_eq!(back.duration, Duration::from_millis(1500));
    }

    #[test]
    fn rejected_object_returns_error() {
        let clock = TickClock(Cell::new(0));
        let result = measure_with_diagnostics(
            Vec::new(),
            SkeletonSource::Derived,
            None,
            &MeasureConfig::default(),
            &clock,
        );
        assert!(matches!(result, Err(MeasureError::EmptyInput)));
    }
}
