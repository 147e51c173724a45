//! Tab-separated results file.
//!
//! One header line (`mean_width`, `skel_length`) followed by one line
//! per accepted object. An unavailable width is written as `NA`.

use std::io::Write;
use std::path::{Path, PathBuf};

use filmeter_pipeline::{ResultRow, Width};

const HEADER: [&str; 2] = ["mean_width", "skel_length"];

/// Marker written for an unavailable width.
pub const MISSING: &str = "NA";

/// Error writing the results file.
#[derive(Debug, thiserror::Error)]
#[error("cannot write results: {0}")]
pub struct ResultsError(#[from] csv::Error);

/// Results path for a batch directory: `<dir>-res.tsv` next to it.
#[must_use]
pub fn results_path(dir: &Path) -> PathBuf {
    let trimmed = dir.components().as_path();
    let mut name = trimmed.as_os_str().to_os_string();
    name.push("-res.tsv");
    PathBuf::from(name)
}

fn width_cell(width: Width) -> String {
    width.value().map_or_else(|| MISSING.to_string(), |w| w.to_string())
}

/// Streaming writer: the header on creation, then one flushed line per
/// accepted row.
pub struct ResultsWriter<W: Write> {
    inner: csv::Writer<W>,
}

impl ResultsWriter<std::fs::File> {
    /// Create (or truncate) the results file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`ResultsError`] if the file cannot be created or the
    /// header cannot be written.
    pub fn create(path: &Path) -> Result<Self, ResultsError> {
        let file = std::fs::File::create(path).map_err(csv::Error::from)?;
        Self::new(file)
    }
}

impl<W: Write> ResultsWriter<W> {
    /// Wrap `writer` and write the header line.
    ///
    /// # Errors
    ///
    /// Returns [`ResultsError`] if the header cannot be written.
    pub fn new(writer: W) -> Result<Self, ResultsError> {
        let mut inner = csv::WriterBuilder::new()
            .delimiter(b'\t')
            .from_writer(writer);
        inner.write_record(HEADER)?;
        inner.flush().map_err(csv::Error::from)?;
        Ok(Self { inner })
    }

    /// Append one accepted row and flush it.
    ///
    /// # Errors
    ///
    /// Returns [`ResultsError`] if the line cannot be written.
    pub fn write_row(&mut self, row: &ResultRow) -> Result<(), ResultsError> {
        self.inner
            .write_record([width_cell(row.width), row.total_length.to_string()])?;
        self.inner.flush().map_err(csv::Error::from)?;
        Ok(())
    }

    /// Recover the underlying writer.
    ///
    /// # Errors
    ///
    /// Returns [`ResultsError`] if buffered data cannot be flushed.
    pub fn into_inner(self) -> Result<W, ResultsError> {
        self.inner
            .into_inner()
            .map_err(|e| ResultsError(csv::Error::from(e.into_error())))
    }
}
