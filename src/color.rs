use image::Rgb;
use palette::{Clamp, IntoColor, Lab, Mix, Srgb};

// ---------------------------------------------------------------------------
// Diverging colormaps
// ---------------------------------------------------------------------------

/// The two diverging colormaps the figures use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Colormap {
    /// Blue → white → red, linear in sRGB components.
    Bwr,
    /// Moreland's cool-warm map, interpolated in CIE L*a*b*.
    Coolwarm,
}

const BWR_ANCHORS: [(u8, u8, u8); 3] = [(0, 0, 255), (255, 255, 255), (255, 0, 0)];
const COOLWARM_ANCHORS: [(u8, u8, u8); 3] = [(59, 76, 192), (221, 221, 221), (180, 4, 38)];

fn srgb((r, g, b): (u8, u8, u8)) -> Srgb {
    Srgb::new(r, g, b).into_format()
}

fn to_pixel(c: Srgb) -> Rgb<u8> {
    let c: Srgb<u8> = c.clamp().into_format();
    Rgb([c.red, c.green, c.blue])
}

impl Colormap {
    /// Colour at position `t` in `[0, 1]` (clamped).
    pub fn sample(self, t: f64) -> Rgb<u8> {
        let t = (if t.is_nan() { 0.5 } else { t.clamp(0.0, 1.0) }) as f32;
        // Lower half runs anchor 0 → 1, upper half anchor 1 → 2.
        let (lo, hi, f) = if t < 0.5 {
            (0, 1, t * 2.0)
        } else {
            (1, 2, (t - 0.5) * 2.0)
        };

        match self {
            Colormap::Bwr => to_pixel(srgb(BWR_ANCHORS[lo]).mix(srgb(BWR_ANCHORS[hi]), f)),
            Colormap::Coolwarm => {
                let a: Lab = srgb(COOLWARM_ANCHORS[lo]).into_color();
                let b: Lab = srgb(COOLWARM_ANCHORS[hi]).into_color();
                let rgb: Srgb = a.mix(b, f).into_color();
                to_pixel(rgb)
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Color scale: data value → pixel colour
// ---------------------------------------------------------------------------

/// Whether the colorbar shows over/under triangles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Extend {
    Neither,
    Both,
}

/// A colormap bound to a value range.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColorScale {
    pub colormap: Colormap,
    pub vmin: f64,
    pub vmax: f64,
    pub extend: Extend,
}

impl ColorScale {
    /// Range `[-limit, limit]`, as every panel in the figures uses.
    pub fn symmetric(colormap: Colormap, limit: f64, extend: Extend) -> Self {
        ColorScale {
            colormap,
            vmin: -limit.abs(),
            vmax: limit.abs(),
            extend,
        }
    }

    /// Position of `value` in the range, unclamped.
    pub fn normalize(&self, value: f64) -> f64 {
        let span = self.vmax - self.vmin;
        if span.abs() < f64::EPSILON {
            0.5
        } else {
            (value - self.vmin) / span
        }
    }

    /// Colour for a value; `None` for missing data, which is left undrawn.
    pub fn color_for(&self, value: f64) -> Option<Rgb<u8>> {
        if value.is_nan() {
            return None;
        }
        Some(self.colormap.sample(self.normalize(value)))
    }

    /// Colour of the under-range triangle.
    pub fn under_color(&self) -> Rgb<u8> {
        self.colormap.sample(0.0)
    }

    /// Colour of the over-range triangle.
    pub fn over_color(&self) -> Rgb<u8> {
        self.colormap.sample(1.0)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
