use std::path::Path;

use anyhow::{Context, Result};
use image::{ImageFormat, Rgb, RgbImage};

use super::font::{self, ADVANCE, GLYPH_HEIGHT};

pub const WHITE: Rgb<u8> = Rgb([255, 255, 255]);
pub const BLACK: Rgb<u8> = Rgb([0, 0, 0]);
pub const GREY: Rgb<u8> = Rgb([128, 128, 128]);

// ---------------------------------------------------------------------------
// Geometry
// ---------------------------------------------------------------------------

/// Axis-aligned rectangle in pixel coordinates, y growing downwards.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x0: f64,
    pub y0: f64,
    pub x1: f64,
    pub y1: f64,
}

impl Rect {
    pub fn new(x0: f64, y0: f64, x1: f64, y1: f64) -> Self {
        Rect {
            x0: x0.min(x1),
            y0: y0.min(y1),
            x1: x0.max(x1),
            y1: y0.max(y1),
        }
    }

    pub fn width(&self) -> f64 {
        self.x1 - self.x0
    }

    pub fn height(&self) -> f64 {
        self.y1 - self.y0
    }

    pub fn center_x(&self) -> f64 {
        (self.x0 + self.x1) / 2.0
    }

    pub fn center_y(&self) -> f64 {
        (self.y0 + self.y1) / 2.0
    }

    pub fn intersect(&self, other: &Rect) -> Rect {
        let x0 = self.x0.max(other.x0);
        let y0 = self.y0.max(other.y0);
        Rect {
            x0,
            y0,
            x1: self.x1.min(other.x1).max(x0),
            y1: self.y1.min(other.y1).max(y0),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HAlign {
    Left,
    Center,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VAlign {
    Top,
    Middle,
    Bottom,
}

/// Text direction. `Vertical` reads bottom to top.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Orientation {
    Horizontal,
    Vertical,
}

/// Where a string goes relative to its reference point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Anchor {
    pub h: HAlign,
    pub v: VAlign,
}

impl Anchor {
    pub const CENTER: Anchor = Anchor {
        h: HAlign::Center,
        v: VAlign::Middle,
    };

    pub fn new(h: HAlign, v: VAlign) -> Self {
        Anchor { h, v }
    }
}

// ---------------------------------------------------------------------------
// Canvas
// ---------------------------------------------------------------------------

/// RGB raster with an optional clip rectangle. Everything outside the clip
/// (or the image) is silently dropped.
pub struct Canvas {
    image: RgbImage,
    clip: Option<Rect>,
}

impl Canvas {
    /// White canvas of `width × height` pixels.
    pub fn new(width: u32, height: u32) -> Self {
        Canvas {
            image: RgbImage::from_pixel(width.max(1), height.max(1), WHITE),
            clip: None,
        }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    #[cfg(test)]
    pub fn image(&self) -> &RgbImage {
        &self.image
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<Rgb<u8>> {
        (x < self.width() && y < self.height()).then(|| *self.image.get_pixel(x, y))
    }

    pub fn set_clip(&mut self, clip: Option<Rect>) {
        self.clip = clip;
    }

    /// Pixel index range `[lo, hi)` whose centres fall in `[a, b)`, limited
    /// to the image and the clip.
    fn span(&self, a: f64, b: f64, clip_a: f64, clip_b: f64, size: u32) -> (i64, i64) {
        let a = a.max(clip_a);
        let b = b.min(clip_b);
        let lo = (a - 0.5).ceil().max(0.0) as i64;
        let hi = ((b - 0.5).ceil() as i64).min(size as i64);
        (lo, hi)
    }

    fn clip_bounds(&self) -> Rect {
        let full = Rect::new(0.0, 0.0, self.width() as f64, self.height() as f64);
        match self.clip {
            Some(clip) => full.intersect(&clip),
            None => full,
        }
    }

    pub fn put(&mut self, x: i64, y: i64, color: Rgb<u8>) {
        if x < 0 || y < 0 {
            return;
        }
        let bounds = self.clip_bounds();
        let (fx, fy) = (x as f64 + 0.5, y as f64 + 0.5);
        if fx < bounds.x0 || fx >= bounds.x1 || fy < bounds.y0 || fy >= bounds.y1 {
            return;
        }
        self.image.put_pixel(x as u32, y as u32, color);
    }

    pub fn fill_rect(&mut self, rect: Rect, color: Rgb<u8>) {
        let bounds = self.clip_bounds();
        let (x_lo, x_hi) = self.span(rect.x0, rect.x1, bounds.x0, bounds.x1, self.width());
        let (y_lo, y_hi) = self.span(rect.y0, rect.y1, bounds.y0, bounds.y1, self.height());
        for y in y_lo..y_hi {
            for x in x_lo..x_hi {
                self.image.put_pixel(x as u32, y as u32, color);
            }
        }
    }

    /// Horizontal line of `thickness` pixels centred on `y`.
    pub fn hline(&mut self, x0: f64, x1: f64, y: f64, thickness: f64, color: Rgb<u8>) {
        let half = thickness.max(1.0) / 2.0;
        self.fill_rect(Rect::new(x0, y - half, x1, y + half), color);
    }

    /// Vertical line of `thickness` pixels centred on `x`.
    pub fn vline(&mut self, x: f64, y0: f64, y1: f64, thickness: f64, color: Rgb<u8>) {
        let half = thickness.max(1.0) / 2.0;
        self.fill_rect(Rect::new(x - half, y0, x + half, y1), color);
    }

    pub fn dashed_hline(&mut self, x0: f64, x1: f64, y: f64, dash: f64, thickness: f64, color: Rgb<u8>) {
        let (x0, x1) = (x0.min(x1), x0.max(x1));
        let dash = dash.max(1.0);
        let mut x = x0;
        while x < x1 {
            self.hline(x, (x + dash).min(x1), y, thickness, color);
            x += 2.0 * dash;
        }
    }

    pub fn dashed_vline(&mut self, x: f64, y0: f64, y1: f64, dash: f64, thickness: f64, color: Rgb<u8>) {
        let (y0, y1) = (y0.min(y1), y0.max(y1));
        let dash = dash.max(1.0);
        let mut y = y0;
        while y < y1 {
            self.vline(x, y, (y + dash).min(y1), thickness, color);
            y += 2.0 * dash;
        }
    }

    /// Outline drawn inside `rect`.
    pub fn stroke_rect(&mut self, rect: Rect, thickness: f64, color: Rgb<u8>) {
        let t = thickness.max(1.0);
        self.fill_rect(Rect::new(rect.x0, rect.y0, rect.x1, rect.y0 + t), color);
        self.fill_rect(Rect::new(rect.x0, rect.y1 - t, rect.x1, rect.y1), color);
        self.fill_rect(Rect::new(rect.x0, rect.y0, rect.x0 + t, rect.y1), color);
        self.fill_rect(Rect::new(rect.x1 - t, rect.y0, rect.x1, rect.y1), color);
    }

    /// Fill every pixel whose centre lies inside the triangle.
    pub fn fill_triangle(&mut self, points: [(f64, f64); 3], color: Rgb<u8>) {
        let [a, b, c] = points;
        let edge = |p: (f64, f64), q: (f64, f64), x: f64, y: f64| (q.0 - p.0) * (y - p.1) - (q.1 - p.1) * (x - p.0);
        let area = edge(a, b, c.0, c.1);
        if area == 0.0 {
            return;
        }

        let x_min = a.0.min(b.0).min(c.0);
        let x_max = a.0.max(b.0).max(c.0);
        let y_min = a.1.min(b.1).min(c.1);
        let y_max = a.1.max(b.1).max(c.1);
        let bounds = self.clip_bounds();
        let (x_lo, x_hi) = self.span(x_min, x_max, bounds.x0, bounds.x1, self.width());
        let (y_lo, y_hi) = self.span(y_min, y_max, bounds.y0, bounds.y1, self.height());

        for y in y_lo..y_hi {
            for x in x_lo..x_hi {
                let (px, py) = (x as f64 + 0.5, y as f64 + 0.5);
                let w0 = edge(b, c, px, py) * area.signum();
                let w1 = edge(c, a, px, py) * area.signum();
                let w2 = edge(a, b, px, py) * area.signum();
                if w0 >= 0.0 && w1 >= 0.0 && w2 >= 0.0 {
                    self.image.put_pixel(x as u32, y as u32, color);
                }
            }
        }
    }

    // -- text ---------------------------------------------------------------

    /// Size of `text` as laid out horizontally, in pixels.
    pub fn text_size(text: &str, scale: u32) -> (u32, u32) {
        let n = text.chars().count() as u32;
        if n == 0 {
            return (0, 0);
        }
        ((n * ADVANCE - 1) * scale, GLYPH_HEIGHT * scale)
    }

    /// Size of `text` once rotated for `orientation`.
    pub fn oriented_size(text: &str, scale: u32, orientation: Orientation) -> (u32, u32) {
        let (w, h) = Self::text_size(text, scale);
        match orientation {
            Orientation::Horizontal => (w, h),
            Orientation::Vertical => (h, w),
        }
    }

    pub fn draw_text(
        &mut self,
        text: &str,
        x: f64,
        y: f64,
        scale: u32,
        anchor: Anchor,
        orientation: Orientation,
        color: Rgb<u8>,
    ) {
        let scale = scale.max(1);
        let (text_w, _) = Self::text_size(text, scale);
        let (box_w, box_h) = Self::oriented_size(text, scale, orientation);
        let left = match anchor.h {
            HAlign::Left => x,
            HAlign::Center => x - box_w as f64 / 2.0,
            HAlign::Right => x - box_w as f64,
        }
        .round() as i64;
        let top = match anchor.v {
            VAlign::Top => y,
            VAlign::Middle => y - box_h as f64 / 2.0,
            VAlign::Bottom => y - box_h as f64,
        }
        .round() as i64;

        for (k, c) in text.chars().enumerate() {
            let origin = (k as u32 * ADVANCE * scale) as i64;
            for row in 0..GLYPH_HEIGHT {
                for col in 0..font::GLYPH_WIDTH {
                    if !font::pixel(c, col, row) {
                        continue;
                    }
                    // Unrotated position of the font pixel's top-left corner.
                    let gx = origin + (col * scale) as i64;
                    let gy = (row * scale) as i64;
                    for dy in 0..scale as i64 {
                        for dx in 0..scale as i64 {
                            let (tx, ty) = (gx + dx, gy + dy);
                            let (px, py) = match orientation {
                                Orientation::Horizontal => (tx, ty),
                                Orientation::Vertical => (ty, text_w as i64 - 1 - tx),
                            };
                            self.put(left + px, top + py, color);
                        }
                    }
                }
            }
        }
    }

    // -- output -------------------------------------------------------------

    /// Write the canvas as PNG, creating missing parent directories.
    pub fn save_png(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating output directory {}", parent.display()))?;
        }
        self.image
            .save_with_format(path, ImageFormat::Png)
            .with_context(|| format!("writing {}", path.display()))?;
        log::info!("Saved {}×{} figure to {}", self.width(), self.height(), path.display());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const RED: Rgb<u8> = Rgb([255, 0, 0]);

    fn count(canvas: &Canvas, color: Rgb<u8>) -> usize {
        canvas.image().pixels().filter(|&&p| p == color).count()
    }

    #[test]
    fn fill_rect_covers_pixel_centres() {
        let mut canvas = Canvas::new(10, 10);
        canvas.fill_rect(Rect::new(2.0, 3.0, 5.0, 4.0), RED);
        assert_eq!(count(&canvas, RED), 3);
        assert_eq!(canvas.pixel(2, 3), Some(RED));
        assert_eq!(canvas.pixel(5, 3), Some(WHITE));
    }

    #[test]
    fn clip_limits_drawing() {
        let mut canvas = Canvas::new(10, 10);
        canvas.set_clip(Some(Rect::new(0.0, 0.0, 5.0, 5.0)));
        canvas.fill_rect(Rect::new(-3.0, -3.0, 20.0, 20.0), RED);
        assert_eq!(count(&canvas, RED), 25);
        canvas.set_clip(None);
        canvas.put(9, 9, RED);
        assert_eq!(canvas.pixel(9, 9), Some(RED));
    }

    #[test]
    fn triangle_fills_half_a_square() {
        let mut canvas = Canvas::new(10, 10);
        canvas.fill_triangle([(0.0, 0.0), (10.0, 0.0), (0.0, 10.0)], RED);
        let n = count(&canvas, RED);
        assert!((45..=55).contains(&n), "{n}");
        assert_eq!(canvas.pixel(0, 0), Some(RED));
        assert_eq!(canvas.pixel(9, 9), Some(WHITE));
    }

    #[test]
    fn dashed_line_leaves_gaps() {
        let mut canvas = Canvas::new(20, 3);
        canvas.dashed_hline(0.0, 20.0, 1.5, 2.0, 1.0, RED);
        assert_eq!(count(&canvas, RED), 10);
        assert_eq!(canvas.pixel(0, 1), Some(RED));
        assert_eq!(canvas.pixel(2, 1), Some(WHITE));
    }

    #[test]
    fn vertical_text_swaps_extent() {
        assert_eq!(Canvas::text_size("AB", 2), (22, 14));
        assert_eq!(Canvas::oriented_size("AB", 2, Orientation::Vertical), (14, 22));
        assert_eq!(Canvas::text_size("", 3), (0, 0));

        let mut canvas = Canvas::new(40, 40);
        canvas.draw_text("I", 20.0, 20.0, 1, Anchor::CENTER, Orientation::Vertical, BLACK);
        // 'I' is 3 px wide and 7 px tall; rotated it lies on its side.
        let black: Vec<(u32, u32)> = canvas
            .image()
            .enumerate_pixels()
            .filter(|(_, _, p)| **p == BLACK)
            .map(|(x, y, _)| (x, y))
            .collect();
        let xs = black.iter().map(|p| p.0);
        let ys = black.iter().map(|p| p.1);
        let width = xs.clone().max().unwrap() - xs.min().unwrap() + 1;
        let height = ys.clone().max().unwrap() - ys.min().unwrap() + 1;
        assert_eq!((width, height), (7, 3));
    }

    #[test]
    fn save_png_creates_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/out.png");
        let mut canvas = Canvas::new(8, 4);
        canvas.draw_text("0", 0.0, 0.0, 1, Anchor::new(HAlign::Left, VAlign::Top), Orientation::Horizontal, BLACK);
        canvas.save_png(&path).unwrap();
        let decoded = image::open(&path).unwrap().to_rgb8();
        assert_eq!(decoded.dimensions(), (8, 4));
        assert_eq!(decoded.get_pixel(1, 0), &BLACK);
    }
}
