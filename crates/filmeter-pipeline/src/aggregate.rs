//! Width and length aggregation.

use crate::raster::Raster;
use crate::types::{Width, WidthStatistic};

/// Nonzero values of the raster, in row-major order.
#[must_use]
pub fn width_samples(values: &Raster<f64>) -> Vec<f64> {
    values.values().iter().copied().filter(|&v| v != 0.0).collect()
}

/// Arithmetic mean, or `None` for an empty slice.
#[must_use]
pub fn mean(samples: &[f64]) -> Option<f64> {
    if samples.is_empty() {
        return None;
    }
    #[allow(clippy::cast_precision_loss)]
    Some(samples.iter().sum::<f64>() / samples.len() as f64)
}

/// Median (average of the two middle values for an even count), or
/// `None` for an empty slice.
#[must_use]
pub fn median(samples: &[f64]) -> Option<f64> {
    if samples.is_empty() {
        return None;
    }
    let mut sorted = samples.to_vec();
    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some(f64::midpoint(sorted[mid - 1], sorted[mid]))
    } else {
        Some(sorted[mid])
    }
}

/// Reduce the remaining value samples to a width.
///
/// Fewer than `min_samples` nonzero values give
/// [`Width::Unavailable`]; the width is never defaulted to zero.
#[must_use]
pub fn aggregate_width(values: &Raster<f64>, statistic: WidthStatistic, min_samples: usize) -> Width {
    let samples = width_samples(values);
    if samples.len() < min_samples {
        return Width::Unavailable {
            samples: samples.len(),
        };
    }
    let value = match statistic {
        WidthStatistic::Mean => mean(&samples),
        WidthStatistic::Median => median(&samples),
    };
    value.map_or(
        Width::Unavailable {
            samples: samples.len(),
        },
        Width::Available,
    )
}
