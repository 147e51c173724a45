//! Perimeter trimming of the value raster.
//!
//! The perimeter of the mask is the set of object pixels with at least
//! one 4-connected background neighbour. Value samples are kept only on
//! the perimeter; everything else is zeroed before the width is
//! aggregated.

use imageproc::distance_transform::Norm;

use crate::raster::Raster;

/// Mask pixels with at least one 4-connected background neighbour.
///
/// Computed as `mask AND NOT erode(mask)` using an L1 erosion of radius
/// one, so diagonal-only contact with the background does not count.
#[must_use]
pub fn perimeter(mask: &Raster<u8>) -> Raster<u8> {
    let eroded = imageproc::morphology::erode(&mask.to_gray_image(), Norm::L1, 1);
    Raster::from_fn(mask.rows(), mask.cols(), |row, col| {
        #[allow(clippy::cast_possible_truncation)]
        let interior = eroded.get_pixel(col as u32, row as u32).0[0] != 0;
        u8::from(mask.get(row, col) == Some(1) && !interior)
    })
}

/// Zero every value that is not on the mask perimeter.
///
/// Returns the number of values that remain nonzero.
pub fn trim_to_perimeter(values: &mut Raster<f64>, mask: &Raster<u8>) -> usize {
    let perim = perimeter(mask);
    for (row, col, p) in perim.iter() {
        if p == 0 {
            values.set(row, col, 0.0);
        }
    }
    values.values().iter().filter(|&&v| v != 0.0).count()
}
