//! Skeleton derivation and summary.
//!
//! Most callers supply a skeleton computed by an external analyser
//! together with its branch count and length. When that is missing,
//! [`thin`] derives a one-pixel-wide skeleton from the mask and
//! [`summarize`] measures it.

use petgraph::unionfind::UnionFind;

use crate::raster::Raster;
use crate::types::SkeletonSummary;

/// 8-neighbourhood offsets: P2 (north) clockwise through P9
/// (north-west).
const RING: [(i64, i64); 8] = [
    (-1, 0),
    (-1, 1),
    (0, 1),
    (1, 1),
    (1, 0),
    (1, -1),
    (0, -1),
    (-1, -1),
];

/// Number of 8-connected set neighbours of `(row, col)`.
#[must_use]
pub fn neighbor_count(skeleton: &Raster<u8>, row: usize, col: usize) -> u8 {
    neighbors(skeleton, row, col).count().try_into().unwrap_or(u8::MAX)
}

/// Set 8-neighbours of `(row, col)`.
fn neighbors(skeleton: &Raster<u8>, row: usize, col: usize) -> impl Iterator<Item = (usize, usize)> + '_ {
    #[allow(clippy::cast_possible_wrap)]
    let (r, c) = (row as i64, col as i64);
    RING.iter().filter_map(move |&(dr, dc)| {
        let (nr, nc) = (r + dr, c + dc);
        skeleton
            .is_set(nr, nc)
            .then(|| (usize::try_from(nr).unwrap_or(0), usize::try_from(nc).unwrap_or(0)))
    })
}

/// Guo-Hall thinning of a binary mask.
///
/// Iteratively peels boundary pixels in two alternating sub-passes
/// until nothing changes, leaving an 8-connected medial path. Unlike
/// Zhang-Suen it keeps bands that run diagonally with an even width.
#[must_use]
pub fn thin(mask: &Raster<u8>) -> Raster<u8> {
    let mut img = mask.map(|v| u8::from(v != 0));
    loop {
        let mut changed = false;
        for pass in 0..2 {
            let mut remove = Vec::new();
            for (row, col, v) in img.iter() {
                if v == 1 && should_remove(&img, row, col, pass) {
                    remove.push((row, col));
                }
            }
            changed |= !remove.is_empty();
            for (row, col) in remove {
                img.set(row, col, 0);
            }
        }
        if !changed {
            return img;
        }
    }
}

fn should_remove(img: &Raster<u8>, row: usize, col: usize, pass: usize) -> bool {
    #[allow(clippy::cast_possible_wrap)]
    let (r, c) = (row as i64, col as i64);
    let [p2, p3, p4, p5, p6, p7, p8, p9] = RING.map(|(dr, dc)| img.is_set(r + dr, c + dc));

    let connectivity = usize::from(!p2 && (p3 || p4))
        + usize::from(!p4 && (p5 || p6))
        + usize::from(!p6 && (p7 || p8))
        + usize::from(!p8 && (p9 || p2));
    if connectivity != 1 {
        return false;
    }
    let n1 = usize::from(p9 || p2)
        + usize::from(p3 || p4)
        + usize::from(p5 || p6)
        + usize::from(p7 || p8);
    let n2 = usize::from(p2 || p3)
        + usize::from(p4 || p5)
        + usize::from(p6 || p7)
        + usize::from(p8 || p9);
    if !(2..=3).contains(&n1.min(n2)) {
        return false;
    }
    let corner = if pass == 0 {
        (p6 || p7 || !p9) && p8
    } else {
        (p2 || p3 || !p5) && p4
    };
    !corner
}

/// Count branches and, for a single open path, measure its length.
///
/// Branches are the connected components left after removing junction
/// pixels (three or more neighbours). The length is traced from one
/// endpoint to the other, preferring orthogonal steps (length 1) over
/// diagonal ones (length √2). Returns `length = 0.0` when the skeleton
/// is not a single open path.
#[must_use]
pub fn summarize(skeleton: &Raster<u8>) -> SkeletonSummary {
    let branches = count_branches(skeleton);
    let ends: Vec<(usize, usize)> = skeleton
        .iter()
        .filter(|&(row, col, v)| v == 1 && neighbor_count(skeleton, row, col) == 1)
        .map(|(row, col, _)| (row, col))
        .collect();

    let length = if branches == 1 && ends.len() == 2 {
        trace_length(skeleton, ends[0])
    } else {
        0.0
    };
    SkeletonSummary { branches, length }
}

fn count_branches(skeleton: &Raster<u8>) -> u32 {
    let cols = skeleton.cols();
    let index = |row: usize, col: usize| row * cols + col;
    let is_branch_pixel =
        |row: usize, col: usize| skeleton.get(row, col) == Some(1) && neighbor_count(skeleton, row, col) < 3;

    let mut sets = UnionFind::<usize>::new(skeleton.rows() * cols);
    let mut members = Vec::new();
    for (row, col, _) in skeleton.iter() {
        if !is_branch_pixel(row, col) {
            continue;
        }
        members.push(index(row, col));
        for (nr, nc) in neighbors(skeleton, row, col) {
            if is_branch_pixel(nr, nc) {
                sets.union(index(row, col), index(nr, nc));
            }
        }
    }
    let mut roots: Vec<usize> = members.iter().map(|&m| sets.find(m)).collect();
    roots.sort_unstable();
    roots.dedup();
    u32::try_from(roots.len()).unwrap_or(u32::MAX)
}

fn trace_length(skeleton: &Raster<u8>, start: (usize, usize)) -> f64 {
    let mut visited: Raster<u8> = Raster::new(skeleton.rows(), skeleton.cols());
    visited.set(start.0, start.1, 1);
    let mut current = start;
    let mut length = 0.0;
    loop {
        let unvisited: Vec<(usize, usize)> = neighbors(skeleton, current.0, current.1)
            .filter(|&(r, c)| visited.get(r, c) == Some(0))
            .collect();
        let orthogonal = unvisited
            .iter()
            .copied()
            .find(|&(r, c)| r == current.0 || c == current.1);
        let next = match (orthogonal, unvisited.first()) {
            (Some(o), _) => {
                length += 1.0;
                o
            }
            (None, Some(&d)) => {
                length += std::f64::consts::SQRT_2;
                d
            }
            (None, None) => return length,
        };
        visited.set(next.0, next.1, 1);
        current = next;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn from_pixels(rows: usize, cols: usize, pixels: &[(usize, usize)]) -> Raster<u8> {
        let mut r = Raster::new(rows, cols);
        for &(row, col) in pixels {
            r.set(row, col, 1);
        }
        r
    }

    #[test]
    fn straight_line_is_one_branch() {
        let pixels: Vec<_> = (2..=12).map(|c| (2, c)).collect();
        let skel = from_pixels(5, 15, &pixels);
        let summary = summarize(&skel);
        assert_eq!(summary.branches, 1);
        assert!((summary.length - 10.0).abs() < 1e-12);
    }

    #[test]
    fn diagonal_steps_count_sqrt_two() {
        let skel = from_pixels(6, 6, &[(1, 1), (2, 2), (3, 3), (4, 4)]);
        let summary = summarize(&skel);
        assert_eq!(summary.branches, 1);
        assert!((summary.length - 3.0 * std::f64::consts::SQRT_2).abs() < 1e-12);
    }

    #[test]
    fn junction_splits_into_three_branches() {
        // A "T": horizontal bar with a stem going down from the middle.
        let mut pixels: Vec<_> = (1..=9).map(|c| (1, c)).collect();
        pixels.extend((2..=5).map(|r| (r, 5)));
        let skel = from_pixels(7, 11, &pixels);
        let summary = summarize(&skel);
        assert_eq!(summary.branches, 3);
        assert!(summary.length.abs() < f64::EPSILON);
    }

    #[test]
    fn thinning_a_bar_leaves_a_thin_line() {
        let mut mask = Raster::new(7, 20);
        for row in 2..=4 {
            for col in 2..=17 {
                mask.set(row, col, 1);
            }
        }
        let skel = thin(&mask);
        assert!(skel.count_set() > 0);
        // One pixel wide: no column holds more than one skeleton pixel.
        for col in 0..20 {
            let in_col = (0..7).filter(|&row| skel.get(row, col) == Some(1)).count();
            assert!(in_col <= 1, "column {col} has {in_col} skeleton pixels");
        }
        // Everything stays on the mask.
        for (row, col, v) in skel.iter() {
            if v == 1 {
                assert_eq!(mask.get(row, col), Some(1));
            }
        }
        assert_eq!(summarize(&skel).branches, 1);
    }

    #[test]
    fn thinning_keeps_even_width_diagonal_band() {
        // 40 rows, 4 pixels wide, running down-right.
        let mut mask = Raster::new(42, 45);
        for row in 1..=40 {
            for col in row..row + 4 {
                mask.set(row, col, 1);
            }
        }
        let skel = thin(&mask);
        for (row, col, v) in skel.iter() {
            if v == 1 {
                assert!(neighbor_count(&skel, row, col) <= 2, "({row}, {col}) is a junction");
            }
        }
        let summary = summarize(&skel);
        assert_eq!(summary.branches, 1);
        assert!(summary.length > 50.0, "skeleton length {}", summary.length);
    }

    #[test]
    fn neighbor_count_counts_all_eight() {
        let mut pixels = Vec::new();
        for r in 0..3 {
            for c in 0..3 {
                pixels.push((r, c));
            }
        }
        let skel = from_pixels(3, 3, &pixels);
        assert_eq!(neighbor_count(&skel, 1, 1), 8);
        assert_eq!(neighbor_count(&skel, 0, 0), 3);
    }
}
