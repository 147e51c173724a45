//! filmeter-export: Pure PNG renderers (sans-IO)
//!
//! Turns measurements and rasters into encoded PNG byte streams for
//! review and manual inspection. Every raster cell is drawn as a
//! [`CELL_SIZE`]-pixel square; vector overlays (tangents, boundary
//! segments, markers) are stroked with `tiny-skia` on top.

mod canvas;
pub mod overlay;

pub use canvas::CELL_SIZE;
pub use overlay::{render_overlay, render_skeleton, render_values};

/// Errors from rendering or encoding an image.
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    /// The raster is empty or too large for a canvas.
    #[error("cannot allocate a {width}x{height} canvas")]
    Canvas {
        /// Requested width in pixels.
        width: u64,
        /// Requested height in pixels.
        height: u64,
    },

    /// PNG encoding failed.
    #[error("PNG encoding failed: {0}")]
    Encode(#[from] image::ImageError),
}
