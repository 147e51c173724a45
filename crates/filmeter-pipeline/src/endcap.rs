//! Endcap masking: zero the value raster in a disc around each endpoint
//! so tip artifacts do not bias the width.

use crate::endpoints::Endpoint;
use crate::raster::Raster;

/// Zero every value strictly within `radius` of any of `endpoints`.
///
/// Returns the number of cells that changed from nonzero to zero.
pub fn mask_endcaps(values: &mut Raster<f64>, endpoints: &[Endpoint], radius: f64) -> usize {
    let radius_sq = radius * radius;
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let reach = radius.ceil().max(0.0) as usize;
    let mut cleared = 0;
    for end in endpoints {
        for row in end.row.saturating_sub(reach)..=(end.row + reach).min(values.rows().saturating_sub(1)) {
            for col in end.col.saturating_sub(reach)..=(end.col + reach).min(values.cols().saturating_sub(1)) {
                #[allow(clippy::cast_precision_loss)]
                let d_sq = {
                    let dr = row as f64 - end.row as f64;
                    let dc = col as f64 - end.col as f64;
                    dr.mul_add(dr, dc * dc)
                };
                if d_sq < radius_sq && values.get(row, col).is_some_and(|v| v != 0.0) {
                    values.set(row, col, 0.0);
                    cleared += 1;
                }
            }
        }
    }
    cleared
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn filled(rows: usize, cols: usize) -> Raster<f64> {
        Raster::from_fn(rows, cols, |_, _| 1.0)
    }

    fn nonzero(r: &Raster<f64>) -> usize {
        r.values().iter().filter(|&&v| v != 0.0).count()
    }

    #[test]
    fn disc_is_strict() {
        let mut values = filled(11, 11);
        let cleared = mask_endcaps(&mut values, &[Endpoint { row: 5, col: 5 }], 2.0);
        // d^2 < 4: the centre, 4 at distance 1, 4 at distance sqrt(2).
        assert_eq!(cleared, 9);
        assert!((values.get(5, 7).unwrap() - 1.0).abs() < f64::EPSILON);
        assert!(values.get(6, 6).unwrap().abs() < f64::EPSILON);
    }

    #[test]
    fn masking_never_increases_nonzero_count() {
        let mut values = filled(9, 30);
        let before = nonzero(&values);
        mask_endcaps(
            &mut values,
            &[Endpoint { row: 4, col: 3 }, Endpoint { row: 4, col: 26 }],
            7.0,
        );
        assert!(nonzero(&values) <= before);
    }

    #[test]
    fn disc_near_corner_is_clipped() {
        let mut values = filled(4, 4);
        let cleared = mask_endcaps(&mut values, &[Endpoint { row: 0, col: 0 }], 7.0);
        assert_eq!(cleared, 16);
    }

    #[test]
    fn overlapping_discs_count_each_cell_once() {
        let mut values = filled(5, 5);
        let ends = [Endpoint { row: 2, col: 2 }, Endpoint { row: 2, col: 2 }];
        let cleared = mask_endcaps(&mut values, &ends, 1.5);
        assert_eq!(cleared, 9);
    }
}
