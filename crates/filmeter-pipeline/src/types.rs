//! Shared types for the filmeter measurement pipeline.

use serde::{Deserialize, Serialize};

use crate::endpoints::Endpoint;
use crate::extrapolate::TipExtension;
use crate::raster::Raster;

/// A 2D point in raster coordinates.
///
/// `x` runs along columns and `y` along rows, so a [`TangentLine`]
/// (`row = f(col)`) maps `x` to `y`.
///
/// [`TangentLine`]: crate::tangent::TangentLine
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    /// Column position (may be fractional).
    pub x: f64,
    /// Row position (may be fractional).
    pub y: f64,
}

impl Point {
    /// Create a new point.
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Squared Euclidean distance to another point.
    ///
    /// Avoids the square root for comparison purposes.
    #[must_use]
    pub fn distance_squared(self, other: Self) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx.mul_add(dx, dy * dy)
    }

    /// Euclidean distance to another point.
    #[must_use]
    pub fn distance(self, other: Self) -> f64 {
        self.distance_squared(other).sqrt()
    }
}

/// Central-tendency statistic used to turn the remaining value raster
/// samples into a single width.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum WidthStatistic {
    /// Arithmetic mean.
    #[default]
    Mean,
    /// Median (mean of the two middle samples for an even count).
    Median,
}

/// Configuration for the measurement pipeline.
///
/// The radii and walk step are empirical tunables. Their defaults are
/// exposed as associated constants so front ends can reuse them
/// without instantiating a config.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MeasureConfig {
    /// Minimum number of object pixels; smaller objects are skipped.
    pub min_area: usize,

    /// Radius (pixels) of the disc around each endpoint whose skeleton
    /// pixels feed the tangent fit. Membership is strict (`d < r`).
    pub end_radius: f64,

    /// Radius (pixels) of the endcap disc zeroed in the value raster.
    pub mask_radius: f64,

    /// Minimum number of nonzero value samples needed to report a width.
    pub min_width_pixels: usize,

    /// Column increment of the boundary walk.
    pub walk_step: f64,

    /// Statistic used for the width.
    pub statistic: WidthStatistic,

    /// Whether to zero the value raster around both endpoints before
    /// aggregating the width.
    pub mask_endcaps: bool,
}

impl MeasureConfig {
    /// Default for [`min_area`](Self::min_area).
    pub const DEFAULT_MIN_AREA: usize = 20;
    /// Default for [`end_radius`](Self::end_radius).
    pub const DEFAULT_END_RADIUS: f64 = 5.0;
    /// Default for [`mask_radius`](Self::mask_radius).
    pub const DEFAULT_MASK_RADIUS: f64 = 7.0;
    /// Default for [`min_width_pixels`](Self::min_width_pixels).
    pub const DEFAULT_MIN_WIDTH_PIXELS: usize = 5;
    /// Default for [`walk_step`](Self::walk_step).
    pub const DEFAULT_WALK_STEP: f64 = 0.1;
    /// Smallest accepted [`walk_step`](Self::walk_step). Finer steps
    /// cannot move a column coordinate of a large raster forward.
    pub const MIN_WALK_STEP: f64 = 1e-6;

    /// Check the invariants the pipeline relies on.
    ///
    /// # Errors
    ///
    /// Returns [`MeasureError::InvalidConfig`] when a radius or the walk
    /// step is not a finite positive number, the walk step is below
    /// [`MIN_WALK_STEP`](Self::MIN_WALK_STEP), or `min_area` is zero.
    pub fn validate(&self) -> Result<(), MeasureError> {
        let positive = |name: &str, value: f64| {
            if value.is_finite() && value > 0.0 {
                Ok(())
            } else {
                Err(MeasureError::InvalidConfig(format!(
                    "{name} must be a finite positive number, got {value}"
                )))
            }
        };
        positive("end_radius", self.end_radius)?;
        positive("mask_radius", self.mask_radius)?;
        positive("walk_step", self.walk_step)?;
        if self.walk_step < Self::MIN_WALK_STEP {
            return Err(MeasureError::InvalidConfig(format!(
                "walk_step must be at least {}, got {}",
                Self::MIN_WALK_STEP,
                self.walk_step
            )));
        }
        if self.min_area == 0 {
            return Err(MeasureError::InvalidConfig(
                "min_area must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for MeasureConfig {
    fn default() -> Self {
        Self {
            min_area: Self::DEFAULT_MIN_AREA,
            end_radius: Self::DEFAULT_END_RADIUS,
            mask_radius: Self::DEFAULT_MASK_RADIUS,
            min_width_pixels: Self::DEFAULT_MIN_WIDTH_PIXELS,
            walk_step: Self::DEFAULT_WALK_STEP,
            statistic: WidthStatistic::default(),
            mask_endcaps: true,
        }
    }
}

/// Branch count and length of a skeleton, either supplied by an external
/// skeleton analyser or computed by [`crate::skeleton::summarize`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SkeletonSummary {
    /// Number of branches in the skeleton graph.
    pub branches: u32,
    /// Length of the (single) branch in pixels.
    pub length: f64,
}

/// Filament width outcome.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Width {
    /// Width computed from at least `min_width_pixels` samples.
    Available(f64),
    /// Too few samples survived trimming and endcap masking.
    Unavailable {
        /// Number of nonzero samples that remained.
        samples: usize,
    },
}

impl Width {
    /// The width value, if available.
    #[must_use]
    pub const fn value(self) -> Option<f64> {
        match self {
            Self::Available(w) => Some(w),
            Self::Unavailable { .. } => None,
        }
    }
}

/// Numerically fragile situations met while measuring a tip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Degeneracy {
    /// Fewer than two skeleton pixels inside the fit disc.
    TooFewFitPoints,
    /// All fit points share one column, so `row = f(col)` is undefined.
    VerticalTangent,
    /// The fitted slope or intercept is not finite.
    NonFiniteFit,
    /// The boundary walk could not take a single step from the endpoint.
    ZeroExtension,
}

impl std::fmt::Display for Degeneracy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::TooFewFitPoints => "too few skeleton pixels for a tangent fit",
            Self::VerticalTangent => "tangent is parallel to the row axis",
            Self::NonFiniteFit => "tangent fit is not finite",
            Self::ZeroExtension => "boundary walk did not leave the endpoint",
        })
    }
}

/// Scalar outcome of measuring one object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeasurementResult {
    /// Mean or median of the remaining value samples.
    pub width: Width,
    /// Length of the single skeleton branch.
    pub skeleton_length: f64,
    /// Sum of both tips' extrapolated lengths.
    pub extra_length: f64,
    /// Branch count, when known.
    pub branch_count: Option<u32>,
    /// Per-endpoint extrapolation details, in endpoint scan order.
    pub tips: [TipExtension; 2],
    /// Non-fatal degeneracies met along the way.
    pub warnings: Vec<Degeneracy>,
}

impl MeasurementResult {
    /// Skeleton length plus both extrapolated tip lengths.
    #[must_use]
    pub fn total_length(&self) -> f64 {
        self.skeleton_length + self.extra_length
    }
}

/// A [`MeasurementResult`] together with the rasters it was derived
/// from, for rendering overlays.
#[derive(Debug, Clone)]
pub struct Measurement {
    /// Scalar results.
    pub result: MeasurementResult,
    /// Value raster after perimeter trimming (before endcap masking).
    pub trimmed: Raster<f64>,
    /// Value raster after endcap masking (equal to `trimmed` when
    /// masking is disabled).
    pub masked: Raster<f64>,
    /// The skeleton raster.
    pub skeleton: Raster<u8>,
}

/// Errors that terminate the measurement of one object.
///
/// Uses custom `Serialize`/`Deserialize` because the topology variant
/// carries the skeleton raster, which is not serialized.
#[derive(Debug, thiserror::Error)]
pub enum MeasureError {
    /// No pixel samples were supplied.
    #[error("object has no pixels")]
    EmptyInput,

    /// Fewer pixels than `min_area`.
    #[error("object has {pixels} pixels, below the minimum area of {min_area}")]
    InsufficientArea {
        /// Pixel count of the object.
        pixels: usize,
        /// Configured minimum.
        min_area: usize,
    },

    /// The skeleton is not a single open path.
    #[error("skeleton has {endpoint_count} endpoints, expected exactly 2")]
    InvalidSkeletonTopology {
        /// Number of detected endpoints.
        endpoint_count: usize,
        /// The offending skeleton, for a manual-inspection overlay.
        skeleton: Option<Box<Raster<u8>>>,
    },

    /// The skeleton summary reports more (or fewer) than one branch.
    #[error("skeleton has {branches} branches, expected exactly 1")]
    MultipleBranches {
        /// Reported branch count.
        branches: u32,
    },

    /// A tip could not be measured reliably.
    #[error("numeric degeneracy at endpoint ({}, {}): {kind}", .endpoint.row, .endpoint.col)]
    NumericDegeneracy {
        /// The endpoint whose tip failed.
        endpoint: Endpoint,
        /// What went wrong.
        kind: Degeneracy,
    },

    /// A supplied skeleton does not carry one value per object pixel.
    #[error("skeleton has {skeleton} values for {pixels} pixels")]
    MisalignedSkeleton {
        /// Number of object pixels.
        pixels: usize,
        /// Number of skeleton values.
        skeleton: usize,
    },

    /// Configuration is invalid.
    #[error("invalid measurement configuration: {0}")]
    InvalidConfig(String),
}

impl MeasureError {
    /// Whether this failure is a routine filter rather than something a
    /// reviewer should look at.
    #[must_use]
    pub const fn is_quiet(&self) -> bool {
        matches!(self, Self::InsufficientArea { .. } | Self::EmptyInput)
    }
}

/// Serde-compatible proxy for `MeasureError`.
#[derive(Serialize, Deserialize)]
enum MeasureErrorProxy {
    EmptyInput,
    InsufficientArea { pixels: usize, min_area: usize },
    InvalidSkeletonTopology { endpoint_count: usize },
    MultipleBranches { branches: u32 },
    NumericDegeneracy { endpoint: Endpoint, kind: Degeneracy },
    MisalignedSkeleton { pixels: usize, skeleton: usize },
    InvalidConfig(String),
}

impl Serialize for MeasureError {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let proxy = match self {
            Self::EmptyInput => MeasureErrorProxy::EmptyInput,
            Self::InsufficientArea { pixels, min_area } => MeasureErrorProxy::InsufficientArea {
                pixels: *pixels,
                min_area: *min_area,
            },
            Self::InvalidSkeletonTopology { endpoint_count, .. } => {
                MeasureErrorProxy::InvalidSkeletonTopology {
                    endpoint_count: *endpoint_count,
                }
            }
            Self::MultipleBranches { branches } => MeasureErrorProxy::MultipleBranches {
                branches: *branches,
            },
            Self::NumericDegeneracy { endpoint, kind } => MeasureErrorProxy::NumericDegeneracy {
                endpoint: *endpoint,
                kind: *kind,
            },
            Self::MisalignedSkeleton { pixels, skeleton } => MeasureErrorProxy::MisalignedSkeleton {
                pixels: *pixels,
                skeleton: *skeleton,
            },
            Self::InvalidConfig(s) => MeasureErrorProxy::InvalidConfig(s.clone()),
        };
        proxy.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for MeasureError {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let proxy = MeasureErrorProxy::deserialize(deserializer)?;
        Ok(match proxy {
            MeasureErrorProxy::EmptyInput => Self::EmptyInput,
            MeasureErrorProxy::InsufficientArea { pixels, min_area } => {
                Self::InsufficientArea { pixels, min_area }
            }
            // The skeleton raster is not carried across serialization.
            MeasureErrorProxy::InvalidSkeletonTopology { endpoint_count } => {
                Self::InvalidSkeletonTopology {
                    endpoint_count,
                    skeleton: None,
                }
            }
            MeasureErrorProxy::MultipleBranches { branches } => Self::MultipleBranches { branches },
            MeasureErrorProxy::NumericDegeneracy { endpoint, kind } => {
                Self::NumericDegeneracy { endpoint, kind }
            }
            MeasureErrorProxy::MisalignedSkeleton { pixels, skeleton } => {
                Self::MisalignedSkeleton { pixels, skeleton }
            }
            MeasureErrorProxy::InvalidConfig(s) => Self::InvalidConfig(s),
        })
    }
}
