//! Measurement overlays and raster diagnostics.

use tiny_skia::Color;

use filmeter_pipeline::{Measurement, Raster, TipExtension};

use crate::ExportError;
use crate::canvas::Canvas;

const SKELETON: [u8; 3] = [220, 40, 40];
const TANGENT: [u8; 3] = [60, 160, 255];
const EXTENSION: [u8; 3] = [255, 210, 0];
const ORIGIN_MARKER: [u8; 3] = [0, 220, 120];
const TERMINAL_MARKER: [u8; 3] = [255, 120, 0];

fn opaque([r, g, b]: [u8; 3]) -> Color {
    Color::from_rgba8(r, g, b, 255)
}

/// Grey level of `value` relative to `max`; zero stays black.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn grey(value: f64, max: f64) -> Color {
    let level = if max > 0.0 {
        (value / max).clamp(0.0, 1.0) * 255.0
    } else {
        0.0
    };
    let v = level.round() as u8;
    opaque([v, v, v])
}

fn draw_values(canvas: &mut Canvas, values: &Raster<f64>) {
    let max = values
        .values()
        .iter()
        .copied()
        .filter(|v| v.is_finite())
        .fold(0.0, f64::max);
    for (row, col, v) in values.iter() {
        if v > 0.0 {
            canvas.fill_cell(row, col, grey(v, max));
        }
    }
}

fn draw_skeleton(canvas: &mut Canvas, skeleton: &Raster<u8>) {
    for (row, col, v) in skeleton.iter() {
        if v == 1 {
            canvas.fill_cell(row, col, opaque(SKELETON));
        }
    }
}

fn draw_tip(canvas: &mut Canvas, tip: &TipExtension) {
    let fit = &tip.tangent;
    canvas.line(
        fit.line.point_at(fit.min_col),
        fit.line.point_at(fit.max_col),
        opaque(TANGENT),
        2.0,
    );
    canvas.line(tip.origin, tip.terminal, opaque(EXTENSION), 2.0);
    canvas.marker(tip.origin, opaque(ORIGIN_MARKER), 3.0);
    canvas.marker(tip.terminal, opaque(TERMINAL_MARKER), 3.0);
}

/// Render the reviewer's overlay: the value raster after masking, the
/// skeleton, each tip's fitted tangent over its fit window, and the
/// extrapolated segment with markers at the endpoint and the boundary.
///
/// # Errors
///
/// Returns [`ExportError`] if the canvas cannot be allocated or the PNG
/// cannot be encoded.
pub fn render_overlay(measurement: &Measurement) -> Result<Vec<u8>, ExportError> {
    let masked = &measurement.masked;
    let mut canvas = Canvas::new(masked.rows(), masked.cols())?;
    draw_values(&mut canvas, masked);
    draw_skeleton(&mut canvas, &measurement.skeleton);
    for tip in &measurement.result.tips {
        draw_tip(&mut canvas, tip);
    }
    canvas.encode_png()
}

/// Render a skeleton on its own, for objects rejected for their
/// topology.
///
/// # Errors
///
/// Returns [`ExportError`] if the canvas cannot be allocated or the PNG
/// cannot be encoded.
pub fn render_skeleton(skeleton: &Raster<u8>) -> Result<Vec<u8>, ExportError> {
    let mut canvas = Canvas::new(skeleton.rows(), skeleton.cols())?;
    draw_skeleton(&mut canvas, skeleton);
    canvas.encode_png()
}

/// Render a value raster in grey levels scaled to its maximum.
///
/// # Errors
///
/// Returns [`ExportError`] if the canvas cannot be allocated or the PNG
/// cannot be encoded.
pub fn render_values(values: &Raster<f64>) -> Result<Vec<u8>, ExportError> {
    let mut canvas = Canvas::new(values.rows(), values.cols())?;
    draw_values(&mut canvas, values);
    canvas.encode_png()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use filmeter_pipeline::{MeasureConfig, PixelSample, SkeletonSource};
    use image::RgbaImage;

    use super::*;
    use crate::CELL_SIZE;

    fn bar_measurement() -> Measurement {
        let mut samples = Vec::new();
        let mut skel = Vec::new();
        for row in 0..3 {
            for col in 0..30 {
                samples.push(PixelSample {
                    row,
                    col,
                    value: 3.0,
                });
                skel.push(u8::from(row == 1 && (2..=27).contains(&col)));
            }
        }
        filmeter_pipeline::measure(
            samples,
            SkeletonSource::Supplied(skel),
            None,
            &MeasureConfig::default(),
        )
        .unwrap()
    }

    fn decode(png: &[u8]) -> RgbaImage {
        image::load_from_memory(png).unwrap().to_rgba8()
    }

    fn cell_centre(img: &RgbaImage, row: u32, col: u32) -> [u8; 4] {
        let half = CELL_SIZE / 2;
        img.get_pixel(col * CELL_SIZE + half, row * CELL_SIZE + half).0
    }

    #[test]
    fn overlay_shows_values_and_skeleton() {
        let m = bar_measurement();
        let img = decode(&render_overlay(&m).unwrap());
        assert_eq!(img.dimensions(), (32 * CELL_SIZE, 5 * CELL_SIZE));
        // Skeleton in the middle, away from both tangents.
        assert_eq!(cell_centre(&img, 2, 15), [220, 40, 40, 255]);
        // Surviving outline value at the maximum.
        assert_eq!(cell_centre(&img, 1, 15), [255, 255, 255, 255]);
        // Inside an endcap disc: zeroed.
        assert_eq!(cell_centre(&img, 1, 5), [0, 0, 0, 255]);
    }

    #[test]
    fn overlay_marks_tip_origins() {
        let m = bar_measurement();
        let img = decode(&render_overlay(&m).unwrap());
        // Tip origins sit on the endpoint cells.
        assert_eq!(cell_centre(&img, 2, 3), [0, 220, 120, 255]);
        assert_eq!(cell_centre(&img, 2, 28), [0, 220, 120, 255]);
    }

    #[test]
    fn skeleton_render_has_only_skeleton() {
        let mut skel: Raster<u8> = Raster::new(3, 6);
        skel.set(1, 2, 1);
        let img = decode(&render_skeleton(&skel).unwrap());
        assert_eq!(cell_centre(&img, 1, 2), [220, 40, 40, 255]);
        assert_eq!(cell_centre(&img, 1, 3), [0, 0, 0, 255]);
    }

    #[test]
    fn values_are_scaled_to_maximum() {
        let values = Raster::from_fn(1, 3, |_, col| [0.0, 2.0, 4.0][col]);
        let img = decode(&render_values(&values).unwrap());
        assert_eq!(cell_centre(&img, 0, 0), [0, 0, 0, 255]);
        assert_eq!(cell_centre(&img, 0, 1), [128, 128, 128, 255]);
        assert_eq!(cell_centre(&img, 0, 2), [255, 255, 255, 255]);
    }

    #[test]
    fn empty_raster_is_an_error() {
        let values: Raster<f64> = Raster::new(0, 0);
        assert!(matches!(
            render_values(&values),
            Err(ExportError::Canvas { .. })
        ));
    }
}
