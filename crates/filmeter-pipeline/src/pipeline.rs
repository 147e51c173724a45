//! Incremental measurement: advance stage-by-stage, inspecting each
//! intermediate result before continuing.
//!
//! [`crate::measure`] runs every stage in one call. [`Pipeline`] lets
//! the caller drive execution one step at a time:
//!
//! ```rust
//! # use filmeter_pipeline::{MeasureConfig, MeasureError, Pipeline, PixelSample, SkeletonSource};
//! # fn run(samples: Vec<PixelSample>, skeleton: Vec<u8>) -> Result<(), MeasureError> {
//! let measured = Pipeline::new(samples, SkeletonSource::Supplied(skeleton), MeasureConfig::default())
//!     .build()?
//!     .trim()
//!     .find_endpoints()?
//!     .summarize(None)?
//!     .extrapolate()?
//!     .mask_endcaps()
//!     .aggregate();
//!
//! println!("width: {:?}", measured.result().width);
//! # Ok(())
//! # }
//! ```
//!
//! Each stage method consumes `self` and returns the next state (or a
//! `Result` for stages that can reject the object), carrying every
//! earlier intermediate along.

use crate::endpoints::Endpoint;
use crate::extrapolate::TipExtension;
use crate::raster::{ObjectRasters, PixelSample, Raster, SkeletonSource};
use crate::types::{
    Degeneracy, MeasureConfig, MeasureError, Measurement, MeasurementResult, SkeletonSummary,
};

// ───────────────────────── Stage 0: Pending ──────────────────────────

/// Pipeline state before the rasters have been built.
#[must_use = "pipeline stages are consumed by advancing, call .build() to continue"]
pub struct Pending {
    config: MeasureConfig,
    samples: Vec<PixelSample>,
    skeleton: SkeletonSource,
}

impl Pending {
    /// The pixel samples the object will be built from.
    #[must_use]
    pub fn samples(&self) -> &[PixelSample] {
        &self.samples
    }

    /// Validate the config and build the co-registered rasters.
    ///
    /// # Errors
    ///
    /// Returns [`MeasureError::InvalidConfig`] for a bad config,
    /// [`MeasureError::MisalignedSkeleton`] when the skeleton does not
    /// match the pixels, [`MeasureError::EmptyInput`] and
    /// [`MeasureError::InsufficientArea`] for objects that are too small.
    pub fn build(self) -> Result<Built, MeasureError> {
        self.config.validate()?;
        let rasters = ObjectRasters::from_samples(&self.samples, &self.skeleton, &self.config)?;
        log::debug!(
            "built {}x{} rasters from {} pixels (transposed: {})",
            rasters.rows(),
            rasters.cols(),
            self.samples.len(),
            rasters.transposed,
        );
        Ok(Built {
            config: self.config,
            rasters,
        })
    }
}

// ───────────────────────── Stage 1: Built ────────────────────────────

/// Pipeline state after building the mask, value and skeleton rasters.
#[must_use = "pipeline stages are consumed by advancing, call .trim() to continue"]
pub struct Built {
    config: MeasureConfig,
    rasters: ObjectRasters,
}

impl Built {
    /// The freshly built rasters.
    #[must_use]
    pub const fn rasters(&self) -> &ObjectRasters {
        &self.rasters
    }

    /// Keep value samples only on the mask perimeter.
    pub fn trim(self) -> Trimmed {
        let mut trimmed = self.rasters.values.clone();
        let remaining = crate::perimeter::trim_to_perimeter(&mut trimmed, &self.rasters.mask);
        log::debug!("perimeter trim kept {remaining} value samples");
        Trimmed {
            config: self.config,
            rasters: self.rasters,
            trimmed,
            remaining,
        }
    }
}

// ───────────────────────── Stage 2: Trimmed ──────────────────────────

/// Pipeline state after perimeter trimming.
#[must_use = "pipeline stages are consumed by advancing, call .find_endpoints() to continue"]
pub struct Trimmed {
    config: MeasureConfig,
    rasters: ObjectRasters,
    trimmed: Raster<f64>,
    remaining: usize,
}

impl Trimmed {
    /// The value raster after trimming.
    #[must_use]
    pub const fn trimmed(&self) -> &Raster<f64> {
        &self.trimmed
    }

    /// Number of nonzero values left after trimming.
    #[must_use]
    pub const fn remaining(&self) -> usize {
        self.remaining
    }

    /// Locate the two skeleton endpoints.
    ///
    /// # Errors
    ///
    /// Returns [`MeasureError::InvalidSkeletonTopology`] when the
    /// skeleton does not have exactly two endpoints.
    pub fn find_endpoints(self) -> Result<EndpointsFound, MeasureError> {
        let endpoints = crate::endpoints::find_two_endpoints(&self.rasters.skeleton).inspect_err(
            |e| log::warn!("rejecting object: {e}"),
        )?;
        log::debug!(
            "endpoints at ({}, {}) and ({}, {})",
            endpoints[0].row,
            endpoints[0].col,
            endpoints[1].row,
            endpoints[1].col,
        );
        Ok(EndpointsFound {
            config: self.config,
            rasters: self.rasters,
            trimmed: self.trimmed,
            endpoints,
        })
    }
}

// ───────────────────────── Stage 3: EndpointsFound ───────────────────

/// Pipeline state after endpoint detection.
#[must_use = "pipeline stages are consumed by advancing, call .summarize() to continue"]
pub struct EndpointsFound {
    config: MeasureConfig,
    rasters: ObjectRasters,
    trimmed: Raster<f64>,
    endpoints: [Endpoint; 2],
}

impl EndpointsFound {
    /// The two endpoints in scan order.
    #[must_use]
    pub const fn endpoints(&self) -> &[Endpoint; 2] {
        &self.endpoints
    }

    /// Resolve the skeleton's branch count and length.
    ///
    /// A `supplied` summary from an external skeleton analyser wins;
    /// otherwise the skeleton raster is summarised here.
    ///
    /// # Errors
    ///
    /// Returns [`MeasureError::MultipleBranches`] when the branch count
    /// is not exactly one.
    pub fn summarize(self, supplied: Option<SkeletonSummary>) -> Result<Summarized, MeasureError> {
        let summary =
            supplied.unwrap_or_else(|| crate::skeleton::summarize(&self.rasters.skeleton));
        if summary.branches != 1 {
            log::warn!("rejecting object: skeleton has {} branches", summary.branches);
            return Err(MeasureError::MultipleBranches {
                branches: summary.branches,
            });
        }
        log::debug!(
            "skeleton length {:.3} ({})",
            summary.length,
            if supplied.is_some() { "supplied" } else { "traced" },
        );
        Ok(Summarized {
            config: self.config,
            rasters: self.rasters,
            trimmed: self.trimmed,
            endpoints: self.endpoints,
            summary,
        })
    }
}

// ───────────────────────── Stage 4: Summarized ───────────────────────

/// Pipeline state once the skeleton is known to be a single branch.
#[must_use = "pipeline stages are consumed by advancing, call .extrapolate() to continue"]
pub struct Summarized {
    config: MeasureConfig,
    rasters: ObjectRasters,
    trimmed: Raster<f64>,
    endpoints: [Endpoint; 2],
    summary: SkeletonSummary,
}

impl Summarized {
    /// Branch count and skeleton length.
    #[must_use]
    pub const fn summary(&self) -> SkeletonSummary {
        self.summary
    }

    /// Fit a tangent at each endpoint and walk it to the mask boundary.
    ///
    /// # Errors
    ///
    /// Returns [`MeasureError::NumericDegeneracy`] when a tangent cannot
    /// be fitted.
    pub fn extrapolate(self) -> Result<Extrapolated, MeasureError> {
        let mut warnings = Vec::new();
        let mut extend = |endpoint: Endpoint| -> Result<TipExtension, MeasureError> {
            let fit = crate::tangent::fit_tangent(
                &self.rasters.skeleton,
                endpoint,
                self.config.end_radius,
            )?;
            let tip =
                crate::extrapolate::extend_tip(&self.rasters.mask, endpoint, fit, self.config.walk_step);
            if tip.is_degenerate() {
                log::warn!(
                    "tip ({}, {}): {}",
                    endpoint.row,
                    endpoint.col,
                    Degeneracy::ZeroExtension
                );
                warnings.push(Degeneracy::ZeroExtension);
            }
            Ok(tip)
        };
        let tips = [extend(self.endpoints[0])?, extend(self.endpoints[1])?];
        Ok(Extrapolated {
            config: self.config,
            rasters: self.rasters,
            trimmed: self.trimmed,
            summary: self.summary,
            tips,
            warnings,
        })
    }
}

// ───────────────────────── Stage 5: Extrapolated ─────────────────────

/// Pipeline state after boundary extrapolation at both tips.
#[must_use = "pipeline stages are consumed by advancing, call .mask_endcaps() to continue"]
pub struct Extrapolated {
    config: MeasureConfig,
    rasters: ObjectRasters,
    trimmed: Raster<f64>,
    summary: SkeletonSummary,
    tips: [TipExtension; 2],
    warnings: Vec<Degeneracy>,
}

impl Extrapolated {
    /// Extrapolation details for both tips.
    #[must_use]
    pub const fn tips(&self) -> &[TipExtension; 2] {
        &self.tips
    }

    /// Sum of both tips' extra lengths.
    #[must_use]
    pub fn extra_length(&self) -> f64 {
        self.tips[0].length + self.tips[1].length
    }

    /// Zero the value raster around both endpoints, unless disabled by
    /// `config.mask_endcaps`.
    pub fn mask_endcaps(self) -> Masked {
        let mut masked = self.trimmed.clone();
        let cleared = if self.config.mask_endcaps {
            let ends = [self.tips[0].endpoint, self.tips[1].endpoint];
            crate::endcap::mask_endcaps(&mut masked, &ends, self.config.mask_radius)
        } else {
            0
        };
        log::debug!("endcap masking cleared {cleared} value samples");
        Masked {
            config: self.config,
            rasters: self.rasters,
            trimmed: self.trimmed,
            masked,
            summary: self.summary,
            tips: self.tips,
            warnings: self.warnings,
            cleared,
        }
    }
}

// ───────────────────────── Stage 6: Masked ───────────────────────────

/// Pipeline state after endcap masking.
#[must_use = "pipeline stages are consumed by advancing, call .aggregate() to continue"]
pub struct Masked {
    config: MeasureConfig,
    rasters: ObjectRasters,
    trimmed: Raster<f64>,
    masked: Raster<f64>,
    summary: SkeletonSummary,
    tips: [TipExtension; 2],
    warnings: Vec<Degeneracy>,
    cleared: usize,
}

impl Masked {
    /// The value raster after endcap masking.
    #[must_use]
    pub const fn masked(&self) -> &Raster<f64> {
        &self.masked
    }

    /// Number of value samples the endcap discs removed.
    #[must_use]
    pub const fn cleared(&self) -> usize {
        self.cleared
    }

    /// Reduce the remaining values to a width and assemble the result.
    pub fn aggregate(self) -> Measured {
        let width = crate::aggregate::aggregate_width(
            &self.masked,
            self.config.statistic,
            self.config.min_width_pixels,
        );
        let result = MeasurementResult {
            width,
            skeleton_length: self.summary.length,
            extra_length: self.tips[0].length + self.tips[1].length,
            branch_count: Some(self.summary.branches),
            tips: self.tips,
            warnings: self.warnings,
        };
        log::debug!(
            "width {:?}, length {:.3} + {:.3}",
            result.width,
            result.skeleton_length,
            result.extra_length,
        );
        Measured {
            result,
            rasters: self.rasters,
            trimmed: self.trimmed,
            masked: self.masked,
        }
    }
}

// ───────────────────────── Stage 7: Measured ─────────────────────────

/// Final pipeline state.
pub struct Measured {
    result: MeasurementResult,
    rasters: ObjectRasters,
    trimmed: Raster<f64>,
    masked: Raster<f64>,
}

impl Measured {
    /// The scalar measurement.
    #[must_use]
    pub const fn result(&self) -> &MeasurementResult {
        &self.result
    }

    /// The rasters the measurement was built on.
    #[must_use]
    pub const fn rasters(&self) -> &ObjectRasters {
        &self.rasters
    }

    /// Consume the pipeline, keeping the result and the rasters needed
    /// for rendering.
    #[must_use]
    pub fn into_measurement(self) -> Measurement {
        Measurement {
            result: self.result,
            trimmed: self.trimmed,
            masked: self.masked,
            skeleton: self.rasters.skeleton,
        }
    }
}

// ───────────────────── Pipeline entry point ──────────────────────────

/// Incremental filament measurement.
///
/// Created via [`Pipeline::new`], which stores the inputs without doing
/// any work. Each stage method consumes the current state and returns
/// the next, so stages cannot be skipped or reordered.
pub struct Pipeline;

impl Pipeline {
    /// Create a new pipeline for one object.
    #[allow(clippy::new_ret_no_self)]
    pub const fn new(
        samples: Vec<PixelSample>,
        skeleton: SkeletonSource,
        config: MeasureConfig,
    ) -> Pending {
        Pending {
            config,
            samples,
            skeleton,
        }
    }
}
