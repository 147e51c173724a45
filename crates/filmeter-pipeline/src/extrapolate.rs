//! Boundary extrapolation along the tip tangent.
//!
//! The skeleton stops short of the physical tip of the filament. From
//! each endpoint the fitted tangent is followed in column steps, in both
//! directions, for as long as the rounded position stays on the mask.
//! The last on-mask position is the boundary estimate, and the shorter
//! of the two walks is the tip's extra length.
//!
//! Positions are rounded half-to-even. A position that rounds outside
//! the raster counts as off the mask, so every walk terminates.
//!
//! Taking the *shorter* walk assumes the tip region is locally
//! straight; near sharp curvature this choice is unverified.

use serde::{Deserialize, Serialize};

use crate::endpoints::Endpoint;
use crate::raster::Raster;
use crate::tangent::{TangentFit, TangentLine};
use crate::types::Point;

/// Direction of a boundary walk along the column axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WalkDirection {
    /// Decreasing column.
    Negative,
    /// Increasing column.
    Positive,
}

/// Result of extrapolating one tip to the mask boundary.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TipExtension {
    /// The skeleton endpoint.
    pub endpoint: Endpoint,
    /// The fitted tangent and its fit window.
    pub tangent: TangentFit,
    /// The tangent evaluated at the endpoint's column.
    pub origin: Point,
    /// Last on-mask position of the selected walk.
    pub terminal: Point,
    /// Distance from `origin` to `terminal`.
    pub length: f64,
    /// Which walk was selected.
    pub direction: WalkDirection,
    /// Number of steps the selected walk took.
    pub steps: usize,
}

impl TipExtension {
    /// Whether the selected walk never left the endpoint.
    #[must_use]
    pub const fn is_degenerate(&self) -> bool {
        self.steps == 0
    }
}

/// Whether the mask is set at the rounded `(line(col), col)` position.
fn on_mask(mask: &Raster<u8>, line: &TangentLine, col: f64) -> bool {
    let row = line.row_at(col).round_ties_even();
    let col = col.round_ties_even();
    if !row.is_finite() || !col.is_finite() {
        return false;
    }
    #[allow(clippy::cast_possible_truncation)]
    mask.is_set(row as i64, col as i64)
}

/// Walk from `start` in steps of `step` (signed) while the next
/// position is on the mask. Returns the final column and step count.
///
/// The walk also stops when a step no longer changes the column, or
/// after enough steps to cross the whole raster.
#[allow(clippy::float_cmp)]
fn walk(mask: &Raster<u8>, line: &TangentLine, start: f64, step: f64) -> (f64, usize) {
    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let max_steps = ((mask.cols() as f64 / step.abs()).ceil() as usize).saturating_add(1);
    let mut col = start;
    let mut steps = 0;
    while steps < max_steps {
        let next = col + step;
        if next == col || !on_mask(mask, line, next) {
            break;
        }
        col = next;
        steps += 1;
    }
    (col, steps)
}

/// Extrapolate the tip at `endpoint` along `tangent` to the mask
/// boundary, choosing the shorter of the two walks (the negative walk
/// wins ties).
///
/// A walk whose first step is already off the mask stays at the
/// endpoint and yields a zero-length extension.
#[must_use]
pub fn extend_tip(
    mask: &Raster<u8>,
    endpoint: Endpoint,
    tangent: TangentFit,
    step: f64,
) -> TipExtension {
    let line = tangent.line;
    #[allow(clippy::cast_precision_loss)]
    let start = endpoint.col as f64;
    let origin = line.point_at(start);

    let (neg_col, neg_steps) = walk(mask, &line, start, -step);
    let (pos_col, pos_steps) = walk(mask, &line, start, step);
    let neg_end = line.point_at(neg_col);
    let pos_end = line.point_at(pos_col);
    let neg_len = origin.distance(neg_end);
    let pos_len = origin.distance(pos_end);

    let (terminal, length, direction, steps) = if pos_len < neg_len {
        (pos_end, pos_len, WalkDirection::Positive, pos_steps)
    } else {
        (neg_end, neg_len, WalkDirection::Negative, neg_steps)
    };
    log::debug!(
        "tip ({}, {}): negative walk {neg_len:.3}, positive walk {pos_len:.3}, chose {direction:?}",
        endpoint.row,
        endpoint.col,
    );

    TipExtension {
        endpoint,
        tangent,
        origin,
        terminal,
        length,
        direction,
        steps,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A `rows x cols` raster with mask rows `r0..=r1`, cols `c0..=c1`.
    fn rect_mask(rows: usize, cols: usize, r: (usize, usize), c: (usize, usize)) -> Raster<u8> {
        Raster::from_fn(rows, cols, |row, col| {
            u8::from((r.0..=r.1).contains(&row) && (c.0..=c.1).contains(&col))
        })
    }

    fn horizontal(row: f64, min_col: f64, max_col: f64) -> TangentFit {
        TangentFit {
            line: TangentLine {
                slope: 0.0,
                intercept: row,
            },
            min_col,
            max_col,
            point_count: 5,
        }
    }

    #[test]
    fn horizontal_tip_reaches_left_edge() {
        let mask = rect_mask(5, 22, (1, 3), (1, 20));
        let tip = extend_tip(&mask, Endpoint { row: 2, col: 3 }, horizontal(2.0, 3.0, 7.0), 0.1);
        assert_eq!(tip.direction, WalkDirection::Negative);
        // The walk stops around column 0.5 (0.5 rounds to 0, off the mask).
        assert!(tip.terminal.x > 0.45 && tip.terminal.x < 0.65, "{:?}", tip.terminal);
        assert!((tip.length - (3.0 - tip.terminal.x)).abs() < 1e-9);
        assert!(tip.length > 0.0);
        assert!(!tip.is_degenerate());
    }

    #[test]
    fn horizontal_tip_reaches_right_edge() {
        let mask = rect_mask(5, 22, (1, 3), (1, 20));
        let tip = extend_tip(&mask, Endpoint { row: 2, col: 18 }, horizontal(2.0, 14.0, 18.0), 0.1);
        assert_eq!(tip.direction, WalkDirection::Positive);
        assert!(tip.terminal.x > 20.35 && tip.terminal.x < 20.55, "{:?}", tip.terminal);
    }

    #[test]
    fn terminal_stays_on_mask() {
        let mask = rect_mask(9, 30, (2, 6), (3, 25));
        let fit = TangentFit {
            line: TangentLine {
                slope: 0.2,
                intercept: 1.0,
            },
            min_col: 10.0,
            max_col: 14.0,
            point_count: 5,
        };
        let tip = extend_tip(&mask, Endpoint { row: 3, col: 10 }, fit, 0.1);
        #[allow(clippy::cast_possible_truncation)]
        let (r, c) = (
            tip.terminal.y.round_ties_even() as i64,
            tip.terminal.x.round_ties_even() as i64,
        );
        assert!(mask.is_set(r, c));
        assert!(tip.length >= 0.0);
    }

    #[test]
    fn start_off_mask_is_zero_length() {
        let mask = rect_mask(5, 22, (1, 3), (1, 20));
        // Line far above the mask: the first step in either direction is off.
        let tip = extend_tip(&mask, Endpoint { row: 2, col: 5 }, horizontal(40.0, 3.0, 7.0), 0.1);
        assert!(tip.is_degenerate());
        assert!(tip.length.abs() < f64::EPSILON);
        assert_eq!(tip.direction, WalkDirection::Negative);
    }

    #[test]
    fn walk_leaving_raster_terminates() {
        // Mask touches the raster edge; rounding outside reads as off-mask.
        let mask = rect_mask(3, 10, (0, 2), (0, 9));
        let tip = extend_tip(&mask, Endpoint { row: 1, col: 8 }, horizontal(1.0, 4.0, 8.0), 0.1);
        assert_eq!(tip.direction, WalkDirection::Positive);
        assert!(tip.terminal.x < 9.6);
    }

    #[test]
    fn step_below_column_precision_terminates() {
        let mask = rect_mask(5, 22, (1, 3), (1, 20));
        let tip = extend_tip(&mask, Endpoint { row: 2, col: 10 }, horizontal(2.0, 6.0, 10.0), 1e-17);
        assert!(tip.is_degenerate());
        assert!(tip.length.abs() < f64::EPSILON);
    }

    #[test]
    fn walk_is_bounded_by_raster_width() {
        // Every cell is set, so only the raster edge stops the walk.
        let mask = rect_mask(3, 12, (0, 2), (0, 11));
        let tip = extend_tip(&mask, Endpoint { row: 1, col: 6 }, horizontal(1.0, 2.0, 6.0), 0.5);
        assert!(tip.steps <= 25);
        assert!(tip.terminal.x >= 0.0 && tip.terminal.x <= 11.5);
    }

    #[test]
    fn origin_uses_fitted_row() {
        let mask = rect_mask(5, 22, (1, 3), (1, 20));
        let tip = extend_tip(&mask, Endpoint { row: 2, col: 3 }, horizontal(2.4, 3.0, 7.0), 0.1);
        assert!((tip.origin.y - 2.4).abs() < f64::EPSILON);
        assert!((tip.origin.x - 3.0).abs() < f64::EPSILON);
    }
}
