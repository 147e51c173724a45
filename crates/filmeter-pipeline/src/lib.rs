//! filmeter-pipeline: Pure filament measurement pipeline (sans-IO).
//!
//! Measures the width and length of one elongated object given as a
//! list of pixel samples plus a one-pixel-wide skeleton:
//! raster build -> perimeter trim -> endpoint detection -> tangent fit
//! -> boundary extrapolation -> endcap masking -> aggregation.
//!
//! This crate has **no I/O dependencies**. It operates on in-memory
//! samples and returns structured data; file loading lives in
//! `filmeter-io` and image rendering in `filmeter-export`.

pub mod aggregate;
pub mod diagnostics;
pub mod endcap;
pub mod endpoints;
pub mod extrapolate;
pub mod perimeter;
pub mod pipeline;
pub mod raster;
pub mod review;
pub mod skeleton;
pub mod tangent;
pub mod types;

pub use endpoints::Endpoint;
pub use extrapolate::{TipExtension, WalkDirection};
pub use pipeline::Pipeline;
pub use raster::{ObjectRasters, PixelSample, Raster, SkeletonSource};
pub use review::{Candidate, ResultRow, ReviewError, ReviewPolicy, ReviewSession, Skipped};
pub use tangent::{TangentFit, TangentLine};
pub use types::{
    Degeneracy, MeasureConfig, MeasureError, Measurement, MeasurementResult, Point,
    SkeletonSummary, Width, WidthStatistic,
};

/// Measure one object.
///
/// `summary` is the branch count and length from an external skeleton
/// analyser; when `None` the skeleton is summarised internally.
///
/// # Pipeline steps
///
/// 1. Build the mask, value and skeleton rasters (origin shift, transpose)
/// 2. Zero values off the mask perimeter
/// 3. Find exactly two skeleton endpoints
/// 4. Check the skeleton is a single branch
/// 5. Fit a tangent at each endpoint and walk it to the mask boundary
/// 6. Optionally zero values around both endpoints
/// 7. Reduce the remaining values to a width
///
/// # Errors
///
/// Returns [`MeasureError::EmptyInput`] or
/// [`MeasureError::InsufficientArea`] for objects that are too small,
/// [`MeasureError::InvalidSkeletonTopology`] when the skeleton does not
/// have two endpoints, [`MeasureError::MultipleBranches`] when the branch
/// count is not one, [`MeasureError::NumericDegeneracy`] when a tip
/// tangent cannot be fitted, [`MeasureError::MisalignedSkeleton`] when
/// the skeleton does not match the pixels, and
/// [`MeasureError::InvalidConfig`] for a bad config.
pub fn measure(
    samples: Vec<PixelSample>,
    skeleton: SkeletonSource,
    summary: Option<SkeletonSummary>,
    config: &MeasureConfig,
) -> Result<Measurement, MeasureError> {
    Ok(Pipeline::new(samples, skeleton, config.clone())
        .build()?
        .trim()
        .find_endpoints()?
        .summarize(summary)?
        .extrapolate()?
        .mask_endcaps()
        .aggregate()
        .into_measurement())
}
