//! Loading one object from its CSV files.
//!
//! An object named `<base>` is stored as:
//!
//! * `<base>.csv`: a header line, then `x,y,value` rows. `x` is the
//!   row coordinate and `y` the column coordinate.
//! * `<base>-skel.csv`: the same `x,y` sequence with a skeleton flag in
//!   the third column (zero or nonzero).
//! * `<base>-skel_info.csv` (optional): skeleton analyser output; the
//!   first data row holds the branch count in column 0 and the branch
//!   length in column 8.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use filmeter_pipeline::{PixelSample, SkeletonSummary};

/// Column of the branch count in a skeleton info file.
const INFO_BRANCHES_COLUMN: usize = 0;
/// Column of the branch length in a skeleton info file.
const INFO_LENGTH_COLUMN: usize = 8;

/// Errors reading an object's files.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    /// The file could not be opened or read, or is not valid CSV.
    #[error("cannot read {}: {source}", .path.display())]
    Csv {
        /// Offending file.
        path: PathBuf,
        /// Underlying reader error.
        source: csv::Error,
    },

    /// A row is shorter than required.
    #[error("{}: data row {row} has {found} columns, expected at least {expected}", .path.display())]
    MissingColumn {
        /// Offending file.
        path: PathBuf,
        /// Zero-based data row (header excluded).
        row: usize,
        /// Columns present.
        found: usize,
        /// Columns required.
        expected: usize,
    },

    /// A cell could not be parsed as a number.
    #[error("{}: data row {row}, column {column}: cannot parse {value:?}", .path.display())]
    Parse {
        /// Offending file.
        path: PathBuf,
        /// Zero-based data row.
        row: usize,
        /// Zero-based column.
        column: usize,
        /// The cell text.
        value: String,
    },

    /// The skeleton list does not follow the pixel list's coordinates.
    #[error("{}: skeleton differs from the pixel list at row {index}", .path.display())]
    MisalignedSkeleton {
        /// The skeleton file.
        path: PathBuf,
        /// First differing data row.
        index: usize,
    },

    /// A skeleton info file with no data row.
    #[error("{}: no skeleton info row", .path.display())]
    EmptySkeletonInfo {
        /// The skeleton info file.
        path: PathBuf,
    },
}

/// Paths of one object's files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectFiles {
    /// Object name: the pixel file's stem.
    pub name: String,
    /// `<base>`, the pixel file path without `.csv`.
    pub base: PathBuf,
    /// `<base>.csv`.
    pub pixels: PathBuf,
    /// `<base>-skel.csv`.
    pub skeleton: PathBuf,
    /// `<base>-skel_info.csv`.
    pub skeleton_info: PathBuf,
}

impl ObjectFiles {
    /// Derive the sibling paths from a pixel file path.
    #[must_use]
    pub fn from_pixel_path(pixels: &Path) -> Self {
        let base = pixels.with_extension("");
        let name = base
            .file_name()
            .map_or_else(String::new, |n| n.to_string_lossy().into_owned());
        Self {
            name,
            skeleton: sibling(&base, "-skel.csv"),
            skeleton_info: sibling(&base, "-skel_info.csv"),
            pixels: pixels.to_path_buf(),
            base,
        }
    }

    /// `<base><suffix>`, e.g. `sibling("-overlay.png")`.
    #[must_use]
    pub fn sibling(&self, suffix: &str) -> PathBuf {
        sibling(&self.base, suffix)
    }
}

fn sibling(base: &Path, suffix: &str) -> PathBuf {
    let mut s = OsString::from(base.as_os_str());
    s.push(suffix);
    PathBuf::from(s)
}

/// Read every data row of a CSV file as trimmed string cells.
fn read_rows(path: &Path) -> Result<Vec<csv::StringRecord>, LoadError> {
    let csv_err = |source| LoadError::Csv {
        path: path.to_path_buf(),
        source,
    };
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(csv_err)?;
    reader.records().map(|r| r.map_err(csv_err)).collect()
}

fn cell<'a>(
    path: &Path,
    record: &'a csv::StringRecord,
    row: usize,
    column: usize,
    expected: usize,
) -> Result<&'a str, LoadError> {
    record.get(column).ok_or_else(|| LoadError::MissingColumn {
        path: path.to_path_buf(),
        row,
        found: record.len(),
        expected,
    })
}

fn parse<T: std::str::FromStr>(
    path: &Path,
    record: &csv::StringRecord,
    row: usize,
    column: usize,
    expected: usize,
) -> Result<T, LoadError> {
    let text = cell(path, record, row, column, expected)?;
    text.parse().map_err(|_| LoadError::Parse {
        path: path.to_path_buf(),
        row,
        column,
        value: text.to_string(),
    })
}

/// `(x, y, value)` rows of a pixel or skeleton list.
fn read_triples(path: &Path) -> Result<Vec<(i64, i64, f64)>, LoadError> {
    read_rows(path)?
        .iter()
        .enumerate()
        .map(|(row, record)| -> Result<_, LoadError> {
            Ok((
                parse(path, record, row, 0, 3)?,
                parse(path, record, row, 1, 3)?,
                parse(path, record, row, 2, 3)?,
            ))
        })
        .collect()
}

/// Read a pixel list. `x` becomes the row and `y` the column.
///
/// # Errors
///
/// Returns [`LoadError`] if the file cannot be read or a row is
/// malformed.
pub fn read_pixels(path: &Path) -> Result<Vec<PixelSample>, LoadError> {
    Ok(read_triples(path)?
        .into_iter()
        .map(|(x, y, value)| PixelSample {
            row: x,
            col: y,
            value,
        })
        .collect())
}

/// Read a skeleton list aligned with `pixels`, binarising the flag
/// column.
///
/// # Errors
///
/// Returns [`LoadError::MisalignedSkeleton`] when the coordinates do
/// not match `pixels` row for row, and other [`LoadError`]s for
/// unreadable or malformed files.
pub fn read_skeleton(path: &Path, pixels: &[PixelSample]) -> Result<Vec<u8>, LoadError> {
    let rows = read_triples(path)?;
    let misaligned = |index| LoadError::MisalignedSkeleton {
        path: path.to_path_buf(),
        index,
    };
    for (index, (&(x, y, _), p)) in rows.iter().zip(pixels).enumerate() {
        if x != p.row || y != p.col {
            return Err(misaligned(index));
        }
    }
    if rows.len() != pixels.len() {
        return Err(misaligned(rows.len().min(pixels.len())));
    }
    Ok(rows.iter().map(|&(_, _, v)| u8::from(v != 0.0)).collect())
}

/// Read the branch count and length from a skeleton info file.
///
/// # Errors
///
/// Returns [`LoadError::EmptySkeletonInfo`] when there is no data row,
/// and other [`LoadError`]s for unreadable or malformed files.
pub fn read_skeleton_info(path: &Path) -> Result<SkeletonSummary, LoadError> {
    let rows = read_rows(path)?;
    let record = rows.first().ok_or_else(|| LoadError::EmptySkeletonInfo {
        path: path.to_path_buf(),
    })?;
    let expected = INFO_LENGTH_COLUMN + 1;
    Ok(SkeletonSummary {
        branches: parse(path, record, 0, INFO_BRANCHES_COLUMN, expected)?,
        length: parse(path, record, 0, INFO_LENGTH_COLUMN, expected)?,
    })
}

/// Read the skeleton info file if it exists.
///
/// # Errors
///
/// Same as [`read_skeleton_info`] for a file that exists.
pub fn read_optional_skeleton_info(path: &Path) -> Result<Option<SkeletonSummary>, LoadError> {
    if path.is_file() {
        read_skeleton_info(path).map(Some)
    } else {
        log::debug!("{} not found, skeleton will be summarised", path.display());
        Ok(None)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn temp_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("filmeter-load-{name}-{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn temp_dir_discards_earlier_runs() {
        let dir = temp_dir("stale");
        std::fs::write(dir.join("absent.csv"), "x,y,v\n1,1,1\n").unwrap();
        let dir = temp_dir("stale");
        assert_eq!(std::fs::read_dir(&dir).unwrap().count(), 0);
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn sibling_paths() {
        let files = ObjectFiles::from_pixel_path(Path::new("/data/run1/obj7.csv"));
        assert_eq!(files.name, "obj7");
        assert_eq!(files.skeleton, Path::new("/data/run1/obj7-skel.csv"));
        assert_eq!(files.skeleton_info, Path::new("/data/run1/obj7-skel_info.csv"));
        assert_eq!(
            files.sibling("broken_end_detection.png"),
            Path::new("/data/run1/obj7broken_end_detection.png")
        );
    }

    #[test]
    fn pixels_map_x_to_row() {
        let dir = temp_dir("pixels");
        let path = dir.join("p.csv");
        std::fs::write(&path, "x,y,v\n3, 7, 1.5\n4,8,2\n").unwrap();
        let pixels = read_pixels(&path).unwrap();
        assert_eq!(
            pixels,
            vec![
                PixelSample {
                    row: 3,
                    col: 7,
                    value: 1.5
                },
                PixelSample {
                    row: 4,
                    col: 8,
                    value: 2.0
                },
            ]
        );
    }

    #[test]
    fn skeleton_is_binarised_and_aligned() {
        let dir = temp_dir("skel");
        let pixels = [
            PixelSample {
                row: 1,
                col: 1,
                value: 1.0,
            },
            PixelSample {
                row: 1,
                col: 2,
                value: 1.0,
            },
        ];
        let good = dir.join("good.csv");
        std::fs::write(&good, "x,y,s\n1,1,0\n1,2,255\n").unwrap();
        assert_eq!(read_skeleton(&good, &pixels).unwrap(), vec![0, 1]);

        let shuffled = dir.join("shuffled.csv");
        std::fs::write(&shuffled, "x,y,s\n1,2,0\n1,1,1\n").unwrap();
        assert!(matches!(
            read_skeleton(&shuffled, &pixels),
            Err(LoadError::MisalignedSkeleton { index: 0, .. })
        ));

        let short = dir.join("short.csv");
        std::fs::write(&short, "x,y,s\n1,1,0\n").unwrap();
        assert!(matches!(
            read_skeleton(&short, &pixels),
            Err(LoadError::MisalignedSkeleton { index: 1, .. })
        ));
    }

    #[test]
    fn skeleton_info_reads_branches_and_length() {
        let dir = temp_dir("info");
        let path = dir.join("info.csv");
        std::fs::write(
            &path,
            "branches,junctions,a,b,c,d,e,f,length\n1,0,0,0,0,0,0,0,24.5\n3,0,0,0,0,0,0,0,9\n",
        )
        .unwrap();
        let summary = read_skeleton_info(&path).unwrap();
        assert_eq!(summary.branches, 1);
        assert!((summary.length - 24.5).abs() < f64::EPSILON);
    }

    #[test]
    fn short_info_row_is_missing_column() {
        let dir = temp_dir("short-info");
        let path = dir.join("info.csv");
        std::fs::write(&path, "branches,length\n1,24.5\n").unwrap();
        assert!(matches!(
            read_skeleton_info(&path),
            Err(LoadError::MissingColumn {
                found: 2,
                expected: 9,
                ..
            })
        ));
    }

    #[test]
    fn bad_number_is_parse_error() {
        let dir = temp_dir("parse");
        let path = dir.join("p.csv");
        std::fs::write(&path, "x,y,v\n1,two,3\n").unwrap();
        assert!(matches!(
            read_pixels(&path),
            Err(LoadError::Parse {
                row: 0,
                column: 1,
                ..
            })
        ));
    }

    #[test]
    fn missing_info_file_is_none() {
        let dir = temp_dir("no-info");
        assert!(
            read_optional_skeleton_info(&dir.join("absent.csv"))
                .unwrap()
                .is_none()
        );
    }

    #[test]
    fn missing_pixel_file_is_an_error() {
        let dir = temp_dir("missing");
        assert!(matches!(
            read_pixels(&dir.join("absent.csv")),
            Err(LoadError::Csv { .. })
        ));
    }
}
