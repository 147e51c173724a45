//! Local tangent estimation at a skeleton endpoint.
//!
//! The skeleton pixels inside a disc around the endpoint are fitted
//! with a first-degree least-squares line expressing row as a function
//! of column.
//!
//! Because `row = f(col)`, a tip running along the row axis (all fit
//! points in one column) has no such line. The rasters are oriented so
//! that `cols > rows`, which makes this rare but not impossible for
//! curved filaments; it is reported as
//! [`Degeneracy::VerticalTangent`] rather than corrected.

use serde::{Deserialize, Serialize};

use crate::endpoints::Endpoint;
use crate::raster::Raster;
use crate::types::{Degeneracy, MeasureError, Point};

/// Relative spread of fit columns below which the fit is treated as
/// vertical.
const MIN_COLUMN_SPREAD: f64 = 1e-9;

/// A fitted line `row = slope * col + intercept`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TangentLine {
    /// Rows per column.
    pub slope: f64,
    /// Row at column 0.
    pub intercept: f64,
}

impl TangentLine {
    /// Evaluate the line at a (fractional) column.
    #[must_use]
    pub fn row_at(&self, col: f64) -> f64 {
        self.slope.mul_add(col, self.intercept)
    }

    /// The point on the line at `col`.
    #[must_use]
    pub fn point_at(&self, col: f64) -> Point {
        Point::new(col, self.row_at(col))
    }
}

/// A tangent line plus the column range of the points it was fitted to.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TangentFit {
    /// The fitted line.
    pub line: TangentLine,
    /// Smallest fit column.
    pub min_col: f64,
    /// Largest fit column.
    pub max_col: f64,
    /// Number of skeleton pixels used.
    pub point_count: usize,
}

/// Skeleton pixels strictly within `radius` of `endpoint`, as
/// `(col, row)` points.
#[must_use]
pub fn local_points(skeleton: &Raster<u8>, endpoint: Endpoint, radius: f64) -> Vec<Point> {
    let radius_sq = radius * radius;
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let reach = radius.ceil().max(0.0) as usize;
    let row_range = endpoint.row.saturating_sub(reach)..=(endpoint.row + reach);
    let col_range = endpoint.col.saturating_sub(reach)..=(endpoint.col + reach);
    #[allow(clippy::cast_precision_loss)]
    let center = Point::new(endpoint.col as f64, endpoint.row as f64);

    let mut points = Vec::new();
    for row in row_range {
        for col in col_range.clone() {
            if skeleton.get(row, col) != Some(1) {
                continue;
            }
            #[allow(clippy::cast_precision_loss)]
            let p = Point::new(col as f64, row as f64);
            if p.distance_squared(center) < radius_sq {
                points.push(p);
            }
        }
    }
    points
}

/// Least-squares fit of `y = slope * x + intercept` through `points`.
///
/// Uses centred sums, so the result does not depend on the order of
/// the points beyond floating-point rounding.
///
/// # Errors
///
/// Returns [`Degeneracy::TooFewFitPoints`] for fewer than two points,
/// [`Degeneracy::VerticalTangent`] when all points share (nearly) one
/// `x`, and [`Degeneracy::NonFiniteFit`] if the result is not finite.
pub fn fit_line(points: &[Point]) -> Result<TangentLine, Degeneracy> {
    if points.len() < 2 {
        return Err(Degeneracy::TooFewFitPoints);
    }
    #[allow(clippy::cast_precision_loss)]
    let n = points.len() as f64;
    let mean_x = points.iter().map(|p| p.x).sum::<f64>() / n;
    let mean_y = points.iter().map(|p| p.y).sum::<f64>() / n;

    let (sxx, sxy) = points.iter().fold((0.0, 0.0), |(sxx, sxy), p| {
        let dx = p.x - mean_x;
        (dx.mul_add(dx, sxx), dx.mul_add(p.y - mean_y, sxy))
    });

    let scale = mean_x.abs().max(1.0);
    if sxx <= MIN_COLUMN_SPREAD * scale * scale * n {
        return Err(Degeneracy::VerticalTangent);
    }
    let slope = sxy / sxx;
    let intercept = slope.mul_add(-mean_x, mean_y);
    if !slope.is_finite() || !intercept.is_finite() {
        return Err(Degeneracy::NonFiniteFit);
    }
    Ok(TangentLine { slope, intercept })
}

/// Fit the local tangent at `endpoint`.
///
/// # Errors
///
/// Returns [`MeasureError::NumericDegeneracy`] when the local point
/// cloud cannot be fitted (see [`fit_line`]).
pub fn fit_tangent(
    skeleton: &Raster<u8>,
    endpoint: Endpoint,
    radius: f64,
) -> Result<TangentFit, MeasureError> {
    let points = local_points(skeleton, endpoint, radius);
    let line = fit_line(&points).map_err(|kind| {
        log::warn!(
            "tangent fit failed at ({}, {}) with {} points: {kind}",
            endpoint.row,
            endpoint.col,
            points.len()
        );
        MeasureError::NumericDegeneracy { endpoint, kind }
    })?;
    let min_col = points.iter().map(|p| p.x).fold(f64::INFINITY, f64::min);
    let max_col = points.iter().map(|p| p.x).fold(f64::NEG_INFINITY, f64::max);
    log::debug!(
        "tangent at ({}, {}): slope={:.4} intercept={:.4} from {} points",
        endpoint.row,
        endpoint.col,
        line.slope,
        line.intercept,
        points.len()
    );
    Ok(TangentFit {
        line,
        min_col,
        max_col,
        point_count: points.len(),
    })
}
