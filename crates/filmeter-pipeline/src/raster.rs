//! Raster model: co-registered mask, value and skeleton grids.
//!
//! An object arrives as a list of `(row, col, value)` samples. The
//! samples are shifted so the smallest coordinate lands on index 1,
//! leaving a one-pixel empty border on every side; neighbourhood scans
//! later rely on that border to stay in bounds. The three rasters are
//! then transposed together, if needed, so that `cols > rows`.

use image::GrayImage;

use crate::types::{MeasureConfig, MeasureError};

/// A dense 2D grid indexed by `(row, col)`, stored row-major.
#[derive(Debug, Clone, PartialEq)]
pub struct Raster<T> {
    rows: usize,
    cols: usize,
    data: Vec<T>,
}

impl<T: Copy + Default> Raster<T> {
    /// Create a raster filled with `T::default()`.
    #[must_use]
    pub fn new(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            data: vec![T::default(); rows * cols],
        }
    }

    /// Create a raster by evaluating `f(row, col)` for every cell.
    #[must_use]
    pub fn from_fn(rows: usize, cols: usize, mut f: impl FnMut(usize, usize) -> T) -> Self {
        let mut data = Vec::with_capacity(rows * cols);
        for row in 0..rows {
            for col in 0..cols {
                data.push(f(row, col));
            }
        }
        Self { rows, cols, data }
    }

    /// Number of rows (height).
    #[must_use]
    pub const fn rows(&self) -> usize {
        self.rows
    }

    /// Number of columns (width).
    #[must_use]
    pub const fn cols(&self) -> usize {
        self.cols
    }

    /// The value at `(row, col)`, or `None` outside the grid.
    #[must_use]
    pub fn get(&self, row: usize, col: usize) -> Option<T> {
        (row < self.rows && col < self.cols).then(|| self.data[row * self.cols + col])
    }

    /// Like [`get`](Self::get) but for signed coordinates.
    #[must_use]
    pub fn get_signed(&self, row: i64, col: i64) -> Option<T> {
        let row = usize::try_from(row).ok()?;
        let col = usize::try_from(col).ok()?;
        self.get(row, col)
    }

    /// Overwrite the value at `(row, col)`. Out-of-range writes are
    /// ignored.
    pub fn set(&mut self, row: usize, col: usize, value: T) {
        if row < self.rows && col < self.cols {
            self.data[row * self.cols + col] = value;
        }
    }

    /// All values in row-major order.
    #[must_use]
    pub fn values(&self) -> &[T] {
        &self.data
    }

    /// Iterate `(row, col, value)` in row-major order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, usize, T)> + '_ {
        let cols = self.cols;
        self.data
            .iter()
            .enumerate()
            .map(move |(i, &v)| (i / cols, i % cols, v))
    }

    /// Swap rows and columns.
    #[must_use]
    pub fn transposed(&self) -> Self {
        Self::from_fn(self.cols, self.rows, |row, col| self.data[col * self.cols + row])
    }

    /// Apply `f` to every value.
    #[must_use]
    pub fn map<U: Copy + Default>(&self, f: impl Fn(T) -> U) -> Raster<U> {
        Raster {
            rows: self.rows,
            cols: self.cols,
            data: self.data.iter().map(|&v| f(v)).collect(),
        }
    }
}

impl Raster<u8> {
    /// Number of cells equal to 1.
    #[must_use]
    pub fn count_set(&self) -> usize {
        self.data.iter().filter(|&&v| v == 1).count()
    }

    /// Whether `(row, col)` is inside the grid and set to 1.
    #[must_use]
    pub fn is_set(&self, row: i64, col: i64) -> bool {
        self.get_signed(row, col) == Some(1)
    }

    /// Convert a binary raster into a `GrayImage` (0 / 255) for use with
    /// `imageproc` morphology.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn to_gray_image(&self) -> GrayImage {
        GrayImage::from_fn(self.cols as u32, self.rows as u32, |x, y| {
            let on = self.data[y as usize * self.cols + x as usize] != 0;
            image::Luma([if on { 255 } else { 0 }])
        })
    }
}

/// One object pixel as delivered by the loading collaborator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PixelSample {
    /// Row coordinate in the source image.
    pub row: i64,
    /// Column coordinate in the source image.
    pub col: i64,
    /// Intensity or distance value.
    pub value: f64,
}

/// Where the skeleton raster comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkeletonSource {
    /// One skeleton membership value per pixel sample, in the same
    /// order. Nonzero values are binarised to 1.
    Supplied(Vec<u8>),
    /// Thin the mask internally (see [`crate::skeleton::thin`]).
    Derived,
}

/// The co-registered rasters of one object.
///
/// Invariants: all three rasters share dimensions, `cols > rows`
/// unless the object is square, and row/column 0 and the last
/// row/column are empty.
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectRasters {
    /// Binary object mask (1 = object).
    pub mask: Raster<u8>,
    /// Per-pixel value, zero outside the object.
    pub values: Raster<f64>,
    /// Binary one-pixel-wide medial path.
    pub skeleton: Raster<u8>,
    /// Whether the source coordinates were transposed.
    pub transposed: bool,
}

impl ObjectRasters {
    /// Build the rasters from per-pixel samples.
    ///
    /// # Errors
    ///
    /// Returns [`MeasureError::EmptyInput`] if `samples` is empty,
    /// [`MeasureError::InsufficientArea`] if there are fewer than
    /// `config.min_area` samples, and [`MeasureError::MisalignedSkeleton`]
    /// if a supplied skeleton does not have one value per sample.
    pub fn from_samples(
        samples: &[PixelSample],
        skeleton: &SkeletonSource,
        config: &MeasureConfig,
    ) -> Result<Self, MeasureError> {
        if samples.is_empty() {
            return Err(MeasureError::EmptyInput);
        }
        if samples.len() < config.min_area {
            return Err(MeasureError::InsufficientArea {
                pixels: samples.len(),
                min_area: config.min_area,
            });
        }
        if let SkeletonSource::Supplied(values) = skeleton
            && values.len() != samples.len()
        {
            return Err(MeasureError::MisalignedSkeleton {
                pixels: samples.len(),
                skeleton: values.len(),
            });
        }

        let (mut min_row, mut max_row) = (i64::MAX, i64::MIN);
        let (mut min_col, mut max_col) = (i64::MAX, i64::MIN);
        for s in samples {
            min_row = min_row.min(s.row);
            max_row = max_row.max(s.row);
            min_col = min_col.min(s.col);
            max_col = max_col.max(s.col);
        }

        // Shift so the minimum lands on 1, plus one empty row/col at the end.
        let origin_row = min_row - 1;
        let origin_col = min_col - 1;
        let to_index = |v: i64| usize::try_from(v).unwrap_or(0);
        let rows = to_index(max_row - origin_row + 2);
        let cols = to_index(max_col - origin_col + 2);

        let mut mask = Raster::new(rows, cols);
        let mut values = Raster::new(rows, cols);
        let mut skel = Raster::new(rows, cols);
        for (i, s) in samples.iter().enumerate() {
            let row = to_index(s.row - origin_row);
            let col = to_index(s.col - origin_col);
            mask.set(row, col, 1);
            values.set(row, col, s.value);
            if let SkeletonSource::Supplied(sv) = skeleton {
                skel.set(row, col, u8::from(sv[i] != 0));
            }
        }
        if matches!(skeleton, SkeletonSource::Derived) {
            skel = crate::skeleton::thin(&mask);
        }

        let rasters = Self {
            mask,
            values,
            skeleton: skel,
            transposed: false,
        };
        if cols > rows {
            Ok(rasters)
        } else {
            Ok(rasters.transposed())
        }
    }

    /// Raster height.
    #[must_use]
    pub const fn rows(&self) -> usize {
        self.mask.rows()
    }

    /// Raster width.
    #[must_use]
    pub const fn cols(&self) -> usize {
        self.mask.cols()
    }

    /// Transpose all three rasters together.
    #[must_use]
    fn transposed(&self) -> Self {
        Self {
            mask: self.mask.transposed(),
            values: self.values.transposed(),
            skeleton: self.skeleton.transposed(),
            transposed: !self.transposed,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn block(rows: i64, cols: i64, offset: (i64, i64)) -> Vec<PixelSample> {
        let mut out = Vec::new();
        for r in 0..rows {
            for c in 0..cols {
                out.push(PixelSample {
                    row: r + offset.0,
                    col: c + offset.1,
                    value: f64::from(u8::try_from(r * cols + c).unwrap_or(0)),
                });
            }
        }
        out
    }

    #[test]
    fn empty_samples_are_rejected() {
        let result = ObjectRasters::from_samples(
            &[],
            &SkeletonSource::Supplied(vec![]),
            &MeasureConfig::default(),
        );
        assert!(matches!(result, Err(MeasureError::EmptyInput)));
    }

    #[test]
    fn small_object_is_insufficient_area() {
        let samples = block(3, 6, (0, 0)); // 18 pixels
        let skel = SkeletonSource::Supplied(vec![0; samples.len()]);
        let result = ObjectRasters::from_samples(&samples, &skel, &MeasureConfig::default());
        assert!(matches!(
            result,
            Err(MeasureError::InsufficientArea {
                pixels: 18,
                min_area: 20
            })
        ));
    }

    #[test]
    fn origin_shift_leaves_one_pixel_border() {
        let samples = block(3, 10, (100, 250));
        let skel = SkeletonSource::Supplied(vec![0; samples.len()]);
        let r = ObjectRasters::from_samples(&samples, &skel, &MeasureConfig::default()).unwrap();
        assert_eq!((r.rows(), r.cols()), (5, 12));
        assert!(!r.transposed);
        for (row, col, v) in r.mask.iter() {
            let inside = (1..=3).contains(&row) && (1..=10).contains(&col);
            assert_eq!(v == 1, inside, "mask mismatch at ({row}, {col})");
        }
        assert!((r.values.get(1, 1).unwrap() - 0.0).abs() < f64::EPSILON);
        assert!((r.values.get(3, 10).unwrap() - 29.0).abs() < f64::EPSILON);
    }

    #[test]
    fn tall_object_is_transposed() {
        let samples = block(10, 3, (0, 0));
        let mut skel_values = vec![0; samples.len()];
        // Mark the sample at source (row 4, col 1) as skeleton.
        skel_values[4 * 3 + 1] = 7;
        let skel = SkeletonSource::Supplied(skel_values);
        let r = ObjectRasters::from_samples(&samples, &skel, &MeasureConfig::default()).unwrap();
        assert!(r.transposed);
        assert_eq!((r.rows(), r.cols()), (5, 12));
        // Source (row 4, col 1) -> index (5, 2) -> transposed (2, 5).
        assert_eq!(r.skeleton.get(2, 5), Some(1));
        assert_eq!(r.skeleton.count_set(), 1);
        assert_eq!(r.mask.get(2, 5), Some(1));
        assert!((r.values.get(2, 5).unwrap() - 13.0).abs() < f64::EPSILON);
    }

    #[test]
    fn square_object_is_transposed() {
        let samples = block(5, 5, (0, 0));
        let skel = SkeletonSource::Supplied(vec![0; samples.len()]);
        let r = ObjectRasters::from_samples(&samples, &skel, &MeasureConfig::default()).unwrap();
        assert!(r.transposed);
        assert!(r.cols() >= r.rows());
    }

    #[test]
    fn misaligned_skeleton_is_rejected() {
        let samples = block(3, 10, (0, 0));
        let skel = SkeletonSource::Supplied(vec![0; 5]);
        let result = ObjectRasters::from_samples(&samples, &skel, &MeasureConfig::default());
        assert!(matches!(
            result,
            Err(MeasureError::MisalignedSkeleton { pixels: 30, skeleton: 5 })
        ));
    }

    #[test]
    fn transpose_round_trip() {
        let r = Raster::from_fn(2, 3, |row, col| u8::try_from(row * 3 + col).unwrap());
        let t = r.transposed();
        assert_eq!((t.rows(), t.cols()), (3, 2));
        assert_eq!(t.get(2, 1), Some(5));
        assert_eq!(t.transposed(), r);
    }

    #[test]
    fn out_of_range_access_is_none() {
        let r: Raster<u8> = Raster::new(2, 2);
        assert_eq!(r.get(2, 0), None);
        assert_eq!(r.get_signed(-1, 0), None);
        assert!(!r.is_set(0, -1));
    }

    #[test]
    fn gray_image_uses_column_as_x() {
        let mut r: Raster<u8> = Raster::new(2, 4);
        r.set(1, 3, 1);
        let img = r.to_gray_image();
        assert_eq!(img.dimensions(), (4, 2));
        assert_eq!(img.get_pixel(3, 1).0[0], 255);
        assert_eq!(img.get_pixel(0, 0).0[0], 0);
    }
}
