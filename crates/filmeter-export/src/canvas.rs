//! Cell-scaled drawing surface backed by a `tiny-skia` pixmap.

use image::{ImageEncoder, Rgba, RgbaImage};
use tiny_skia::{Color, FillRule, LineCap, Paint, PathBuilder, Pixmap, Rect, Stroke, Transform};

use filmeter_pipeline::Point;

use crate::ExportError;

/// Side length, in output pixels, of one raster cell.
pub const CELL_SIZE: u32 = 8;

/// A drawing surface where one unit is one raster cell.
pub struct Canvas {
    pixmap: Pixmap,
}

impl Canvas {
    /// A black canvas for a `rows x cols` raster.
    pub fn new(rows: usize, cols: usize) -> Result<Self, ExportError> {
        let scaled = |n: usize| {
            u64::try_from(n)
                .unwrap_or(u64::MAX)
                .saturating_mul(u64::from(CELL_SIZE))
        };
        let (width, height) = (scaled(cols), scaled(rows));
        let pixmap = u32::try_from(width)
            .ok()
            .zip(u32::try_from(height).ok())
            .and_then(|(w, h)| Pixmap::new(w, h))
            .ok_or(ExportError::Canvas { width, height })?;
        let mut canvas = Self { pixmap };
        canvas.pixmap.fill(Color::BLACK);
        Ok(canvas)
    }

    /// Fill the square of cell `(row, col)`.
    #[allow(clippy::cast_precision_loss)]
    pub fn fill_cell(&mut self, row: usize, col: usize, color: Color) {
        let size = CELL_SIZE as f32;
        let Some(rect) = Rect::from_xywh(col as f32 * size, row as f32 * size, size, size) else {
            return;
        };
        let mut paint = Paint::default();
        paint.set_color(color);
        paint.anti_alias = false;
        self.pixmap
            .fill_rect(rect, &paint, Transform::identity(), None);
    }

    /// Stroke a straight segment between two raster-space points.
    pub fn line(&mut self, from: Point, to: Point, color: Color, width: f32) {
        let mut pb = PathBuilder::new();
        let (x0, y0) = to_canvas(from);
        let (x1, y1) = to_canvas(to);
        pb.move_to(x0, y0);
        pb.line_to(x1, y1);
        let Some(path) = pb.finish() else {
            return;
        };
        let stroke = Stroke {
            width,
            line_cap: LineCap::Round,
            ..Stroke::default()
        };
        let mut paint = Paint::default();
        paint.set_color(color);
        paint.anti_alias = true;
        self.pixmap
            .stroke_path(&path, &paint, &stroke, Transform::identity(), None);
    }

    /// Draw a filled circular marker centred on a raster-space point.
    pub fn marker(&mut self, at: Point, color: Color, radius: f32) {
        let (x, y) = to_canvas(at);
        let Some(path) = PathBuilder::from_circle(x, y, radius) else {
            return;
        };
        let mut paint = Paint::default();
        paint.set_color(color);
        paint.anti_alias = true;
        self.pixmap
            .fill_path(&path, &paint, FillRule::Winding, Transform::identity(), None);
    }

    /// Encode the canvas as PNG.
    pub fn encode_png(&self) -> Result<Vec<u8>, ExportError> {
        let img = self.to_rgba();
        let mut buf = Vec::new();
        image::codecs::png::PngEncoder::new(&mut buf).write_image(
            img.as_raw(),
            img.width(),
            img.height(),
            image::ExtendedColorType::Rgba8,
        )?;
        Ok(buf)
    }

    /// Convert the premultiplied pixmap into a straight-alpha image.
    #[allow(clippy::cast_possible_truncation)]
    fn to_rgba(&self) -> RgbaImage {
        let data = self.pixmap.data();
        let mut img = RgbaImage::new(self.pixmap.width(), self.pixmap.height());
        for (i, pixel) in img.pixels_mut().enumerate() {
            let off = i * 4;
            let a = data[off + 3];
            if a == 0 {
                *pixel = Rgba([0, 0, 0, 0]);
            } else {
                let r = u16::from(data[off]) * 255 / u16::from(a);
                let g = u16::from(data[off + 1]) * 255 / u16::from(a);
                let b = u16::from(data[off + 2]) * 255 / u16::from(a);
                *pixel = Rgba([r as u8, g as u8, b as u8, a]);
            }
        }
        img
    }
}

/// Centre of the cell a raster-space point falls in, in canvas pixels.
#[allow(clippy::cast_possible_truncation)]
fn to_canvas(p: Point) -> (f32, f32) {
    let size = f64::from(CELL_SIZE);
    (((p.x + 0.5) * size) as f32, ((p.y + 0.5) * size) as f32)
}
