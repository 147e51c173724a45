//! Lazy batch cursor over a directory of objects.
//!
//! Each [`next`](Iterator::next) loads, measures and renders one object
//! and yields either a reviewable [`Candidate`] or an [`ObjectFailure`].
//! One bad object never stops the batch.

use std::path::{Path, PathBuf};

use filmeter_export::ExportError;
use filmeter_pipeline::{Candidate, MeasureConfig, MeasureError, SkeletonSource, Skipped};

use crate::load::{self, LoadError, ObjectFiles};

/// How the cursor measures and what it writes alongside.
#[derive(Debug, Clone, Default)]
pub struct BatchOptions {
    /// Measurement configuration.
    pub config: MeasureConfig,
    /// Thin the mask instead of reading `<base>-skel.csv`.
    pub derive_skeleton: bool,
    /// Write `<base>-masked.png` for every measured object.
    pub write_masked: bool,
    /// Write `<base>broken_end_detection.png` for topology failures.
    pub write_diagnostics: bool,
}

/// Why an object produced no candidate.
#[derive(Debug, thiserror::Error)]
pub enum FailureKind {
    /// Its files could not be read.
    #[error(transparent)]
    Load(#[from] LoadError),
    /// The measurement rejected it.
    #[error(transparent)]
    Measure(#[from] MeasureError),
    /// Its overlay could not be rendered.
    #[error(transparent)]
    Render(#[from] ExportError),
}

/// An object that failed, with any diagnostic image written for it.
#[derive(Debug, thiserror::Error)]
#[error("{name}: {kind}")]
pub struct ObjectFailure {
    /// Object name.
    pub name: String,
    /// What went wrong.
    #[source]
    pub kind: FailureKind,
    /// Path of the skeleton diagnostic, if one was written.
    pub diagnostic: Option<PathBuf>,
}

impl ObjectFailure {
    /// Whether this is a routine filter rather than something to report.
    #[must_use]
    pub const fn is_quiet(&self) -> bool {
        matches!(&self.kind, FailureKind::Measure(e) if e.is_quiet())
    }
}

impl From<ObjectFailure> for Skipped {
    fn from(failure: ObjectFailure) -> Self {
        Self {
            quiet: failure.is_quiet(),
            reason: failure.kind.to_string(),
            name: failure.name,
        }
    }
}

/// Pixel files of a directory: `*.csv` without `skel` in the name,
/// sorted by name.
///
/// # Errors
///
/// Returns the I/O error if the directory cannot be listed.
pub fn object_files(dir: &Path) -> std::io::Result<Vec<ObjectFiles>> {
    let mut pixels = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        let is_csv = path.extension().is_some_and(|e| e == "csv");
        let is_skeleton = path
            .file_name()
            .is_some_and(|n| n.to_string_lossy().contains("skel"));
        if is_csv && !is_skeleton && path.is_file() {
            pixels.push(path);
        }
    }
    pixels.sort();
    Ok(pixels.iter().map(|p| ObjectFiles::from_pixel_path(p)).collect())
}

/// Iterator over the objects of one directory.
pub struct BatchCursor {
    files: std::vec::IntoIter<ObjectFiles>,
    options: BatchOptions,
}

impl BatchCursor {
    /// A cursor over the objects in `dir`.
    ///
    /// # Errors
    ///
    /// Returns the I/O error if the directory cannot be listed.
    pub fn open(dir: &Path, options: BatchOptions) -> std::io::Result<Self> {
        let files = object_files(dir)?;
        log::info!("{} objects in {}", files.len(), dir.display());
        Ok(Self::new(files, options))
    }

    /// A cursor over an explicit list of objects.
    #[must_use]
    pub fn new(files: Vec<ObjectFiles>, options: BatchOptions) -> Self {
        Self {
            files: files.into_iter(),
            options,
        }
    }

    /// Objects not yet visited.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.files.len()
    }

    fn process(&self, files: &ObjectFiles) -> Result<Candidate, FailureKind> {
        let config = &self.options.config;
        let samples = load::read_pixels(&files.pixels)?;
        if samples.len() < config.min_area {
            return Err(MeasureError::InsufficientArea {
                pixels: samples.len(),
                min_area: config.min_area,
            }
            .into());
        }
        let skeleton = if self.options.derive_skeleton {
            SkeletonSource::Derived
        } else {
            SkeletonSource::Supplied(load::read_skeleton(&files.skeleton, &samples)?)
        };
        let summary = load::read_optional_skeleton_info(&files.skeleton_info)?;

        let measurement = filmeter_pipeline::measure(samples, skeleton, summary, config)?;
        if self.options.write_masked {
            let path = files.sibling("-masked.png");
            write_png(&path, filmeter_export::render_values(&measurement.masked));
        }
        let overlay_png = filmeter_export::render_overlay(&measurement)?;
        Ok(Candidate {
            name: files.name.clone(),
            result: measurement.result,
            overlay_png,
        })
    }

    /// Write the skeleton diagnostic for a topology failure.
    fn write_diagnostic(&self, files: &ObjectFiles, kind: &FailureKind) -> Option<PathBuf> {
        let FailureKind::Measure(MeasureError::InvalidSkeletonTopology {
            skeleton: Some(skeleton),
            ..
        }) = kind
        else {
            return None;
        };
        if !self.options.write_diagnostics {
            return None;
        }
        let path = files.sibling("broken_end_detection.png");
        write_png(&path, filmeter_export::render_skeleton(skeleton)).then_some(path)
    }
}

/// Write rendered PNG bytes, logging rather than failing.
fn write_png(path: &Path, png: Result<Vec<u8>, ExportError>) -> bool {
    match png.map_err(|e| e.to_string()).and_then(|bytes| {
        std::fs::write(path, bytes).map_err(|e| e.to_string())
    }) {
        Ok(()) => true,
        Err(e) => {
            log::warn!("could not write {}: {e}", path.display());
            false
        }
    }
}

impl Iterator for BatchCursor {
    type Item = Result<Candidate, ObjectFailure>;

    fn next(&mut self) -> Option<Self::Item> {
        let files = self.files.next()?;
        log::debug!("processing {}", files.pixels.display());
        Some(self.process(&files).map_err(|kind| {
            let diagnostic = self.write_diagnostic(&files, &kind);
            ObjectFailure {
                name: files.name.clone(),
                kind,
                diagnostic,
            }
        }))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.files.size_hint()
    }
}
