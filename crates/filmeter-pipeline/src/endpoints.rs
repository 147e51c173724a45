//! Endpoint detection: skeleton pixels with exactly one 8-connected
//! skeleton neighbour.

use serde::{Deserialize, Serialize};

use crate::raster::Raster;
use crate::skeleton::neighbor_count;
use crate::types::MeasureError;

/// A skeleton pixel with exactly one skeleton neighbour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Endpoint {
    /// Row index.
    pub row: usize,
    /// Column index.
    pub col: usize,
}

/// Find every endpoint of the skeleton.
///
/// Pixels are scanned column by column (all rows of column 0, then
/// column 1, ...), so the result is ordered by column first. Neighbour
/// lookups outside the raster read as background; with the one-pixel
/// border of [`ObjectRasters`](crate::raster::ObjectRasters) they never
/// happen for real skeleton pixels.
#[must_use]
pub fn find_endpoints(skeleton: &Raster<u8>) -> Vec<Endpoint> {
    let mut ends = Vec::new();
    for col in 0..skeleton.cols() {
        for row in 0..skeleton.rows() {
            if skeleton.get(row, col) == Some(1) && neighbor_count(skeleton, row, col) == 1 {
                ends.push(Endpoint { row, col });
            }
        }
    }
    ends
}

/// Find the two endpoints of a simple open path.
///
/// # Errors
///
/// Returns [`MeasureError::InvalidSkeletonTopology`] carrying the
/// skeleton when the endpoint count is not exactly two (a closed loop
/// has none, a branched skeleton more than two).
pub fn find_two_endpoints(skeleton: &Raster<u8>) -> Result<[Endpoint; 2], MeasureError> {
    match find_endpoints(skeleton).as_slice() {
        &[a, b] => Ok([a, b]),
        other => Err(MeasureError::InvalidSkeletonTopology {
            endpoint_count: other.len(),
            skeleton: Some(Box::new(skeleton.clone())),
        }),
    }
}
