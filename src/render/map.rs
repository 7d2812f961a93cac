use image::Rgb;

use super::canvas::{Anchor, BLACK, Canvas, GREY, HAlign, Orientation, Rect, VAlign, WHITE};
use super::ticks::{degree_ticks, lat_label, lon_label};
use crate::color::ColorScale;
use crate::data::mask::LandMask;
use crate::data::model::GridField;

const GRIDLINE_INTERVALS: usize = 6;

// ---------------------------------------------------------------------------
// Extent and projection
// ---------------------------------------------------------------------------

/// Geographic window `[lon_min, lon_max, lat_min, lat_max]` shown on a map.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MapExtent {
    pub lon_min: f64,
    pub lon_max: f64,
    pub lat_min: f64,
    pub lat_max: f64,
}

impl MapExtent {
    pub fn from_array([lon_min, lon_max, lat_min, lat_max]: [f64; 4]) -> Self {
        MapExtent {
            lon_min,
            lon_max,
            lat_min,
            lat_max,
        }
    }

    pub fn lon_span(&self) -> f64 {
        self.lon_max - self.lon_min
    }

    pub fn lat_span(&self) -> f64 {
        self.lat_max - self.lat_min
    }

    /// Width over height in Plate Carrée.
    pub fn aspect(&self) -> f64 {
        self.lon_span() / self.lat_span()
    }

    /// Largest rectangle with the extent's aspect that fits in `area`,
    /// centred in it.
    pub fn fit(&self, area: Rect) -> Rect {
        let aspect = self.aspect();
        let (w, h) = if area.width() / area.height() > aspect {
            (area.height() * aspect, area.height())
        } else {
            (area.width(), area.width() / aspect)
        };
        let x0 = area.center_x() - w / 2.0;
        let y0 = area.center_y() - h / 2.0;
        Rect::new(x0, y0, x0 + w, y0 + h)
    }

    /// Shift `lon` by whole turns into `[lon_min, lon_min + 360)`.
    pub fn wrap(&self, lon: f64) -> f64 {
        self.lon_min + (lon - self.lon_min).rem_euclid(360.0)
    }
}

/// Plate Carrée mapping of an extent onto a pixel rectangle.
#[derive(Debug, Clone, Copy)]
pub struct Projection {
    pub extent: MapExtent,
    pub rect: Rect,
}

impl Projection {
    pub fn x(&self, lon: f64) -> f64 {
        self.rect.x0 + (lon - self.extent.lon_min) / self.extent.lon_span() * self.rect.width()
    }

    pub fn y(&self, lat: f64) -> f64 {
        self.rect.y1 - (lat - self.extent.lat_min) / self.extent.lat_span() * self.rect.height()
    }
}

/// Cell boundaries halfway between coordinates, extended by half a step at
/// both ends.
pub fn cell_edges(coords: &[f64]) -> Vec<f64> {
    match coords.len() {
        0 => Vec::new(),
        1 => vec![coords[0] - 0.5, coords[0] + 0.5],
        n => {
            let mut edges = Vec::with_capacity(n + 1);
            edges.push(coords[0] - (coords[1] - coords[0]) / 2.0);
            edges.extend(coords.windows(2).map(|w| (w[0] + w[1]) / 2.0));
            edges.push(coords[n - 1] + (coords[n - 1] - coords[n - 2]) / 2.0);
            edges
        }
    }
}

/// Screen-space cell boundaries of a grid.
struct CellGrid {
    /// `(x_left, x_right)` per longitude.
    cols: Vec<(f64, f64)>,
    /// `(y_top, y_bottom)` per latitude.
    rows: Vec<(f64, f64)>,
}

impl CellGrid {
    fn new(projection: &Projection, lat: &[f64], lon: &[f64]) -> Self {
        let lon_edges = cell_edges(lon);
        let lat_edges = cell_edges(lat);
        let cols = lon
            .iter()
            .enumerate()
            .map(|(i, &c)| {
                // Wrap the centre, keep the cell's width.
                let centre = projection.extent.wrap(c);
                let a = projection.x(centre + lon_edges[i] - c);
                let b = projection.x(centre + lon_edges[i + 1] - c);
                (a.min(b), a.max(b))
            })
            .collect();
        let rows = (0..lat.len())
            .map(|j| {
                let a = projection.y(lat_edges[j]);
                let b = projection.y(lat_edges[j + 1]);
                (a.min(b), a.max(b))
            })
            .collect();
        CellGrid { cols, rows }
    }

    fn rect(&self, j: usize, i: usize) -> Rect {
        let (x0, x1) = self.cols[i];
        let (y0, y1) = self.rows[j];
        Rect::new(x0, y0, x1, y1)
    }
}

// ---------------------------------------------------------------------------
// Panel
// ---------------------------------------------------------------------------

/// Which gridline labels to draw and at what size.
#[derive(Debug, Clone, Copy)]
pub struct PanelStyle {
    pub left_labels: bool,
    pub bottom_labels: bool,
    pub label_scale: u32,
    pub line_width: f64,
}

/// Draw one map: filled cells, ocean mask, gridlines, coastlines, frame and
/// gridline labels. Returns the map rectangle actually used inside `area`.
pub fn draw_map_panel(
    canvas: &mut Canvas,
    area: Rect,
    extent: &MapExtent,
    field: &GridField,
    scale: &ColorScale,
    mask: Option<&LandMask>,
    style: &PanelStyle,
) -> Rect {
    let rect = extent.fit(area);
    let projection = Projection {
        extent: *extent,
        rect,
    };
    let cells = CellGrid::new(&projection, &field.lat, &field.lon);
    let mask = mask.filter(|m| {
        let fits = m.land.dim() == field.values.dim();
        if !fits {
            log::warn!(
                "Land mask is {:?} but field is {:?}; drawing without it",
                m.land.dim(),
                field.values.dim()
            );
        }
        fits
    });

    canvas.set_clip(Some(rect));

    for ((j, i), &value) in field.values.indexed_iter() {
        let color = match mask {
            Some(m) if !m.is_land(j, i) => Some(WHITE),
            _ => scale.color_for(value),
        };
        if let Some(color) = color {
            canvas.fill_rect(cells.rect(j, i), color);
        }
    }

    draw_gridlines(canvas, &projection, style);

    if let Some(mask) = mask {
        draw_coastlines(canvas, &cells, mask, style.line_width, BLACK);
    }

    canvas.set_clip(None);
    canvas.stroke_rect(rect, style.line_width, BLACK);
    draw_gridline_labels(canvas, &projection, style);
    rect
}

fn draw_gridlines(canvas: &mut Canvas, projection: &Projection, style: &PanelStyle) {
    let extent = projection.extent;
    let rect = projection.rect;
    let dash = (style.line_width * 4.0).max(2.0);
    for lon in degree_ticks(extent.lon_min, extent.lon_max, GRIDLINE_INTERVALS) {
        canvas.dashed_vline(projection.x(lon), rect.y0, rect.y1, dash, style.line_width, GREY);
    }
    for lat in degree_ticks(extent.lat_min, extent.lat_max, GRIDLINE_INTERVALS) {
        canvas.dashed_hline(rect.x0, rect.x1, projection.y(lat), dash, style.line_width, GREY);
    }
}

/// Black segments wherever a land cell borders an ocean cell.
fn draw_coastlines(canvas: &mut Canvas, cells: &CellGrid, mask: &LandMask, width: f64, color: Rgb<u8>) {
    let (n_lat, n_lon) = mask.land.dim();
    for j in 0..n_lat {
        for i in 0..n_lon {
            let here = mask.is_land(j, i);
            if i + 1 < n_lon && here != mask.is_land(j, i + 1) {
                let (y0, y1) = cells.rows[j];
                let x = (cells.cols[i].1 + cells.cols[i + 1].0) / 2.0;
                canvas.vline(x, y0, y1, width, color);
            }
            if j + 1 < n_lat && here != mask.is_land(j + 1, i) {
                let (x0, x1) = cells.cols[i];
                let (a, b) = (cells.rows[j], cells.rows[j + 1]);
                // Latitudes may run either way up the screen.
                let y = if a.0 >= b.1 - 1e-9 {
                    (a.0 + b.1) / 2.0
                } else {
                    (a.1 + b.0) / 2.0
                };
                canvas.hline(x0, x1, y, width, color);
            }
        }
    }
}

fn draw_gridline_labels(canvas: &mut Canvas, projection: &Projection, style: &PanelStyle) {
    let extent = projection.extent;
    let rect = projection.rect;
    let pad = (style.label_scale * 3) as f64;

    if style.bottom_labels {
        for lon in degree_ticks(extent.lon_min, extent.lon_max, GRIDLINE_INTERVALS) {
            canvas.draw_text(
                &lon_label(lon),
                projection.x(lon),
                rect.y1 + pad,
                style.label_scale,
                Anchor::new(HAlign::Center, VAlign::Top),
                Orientation::Horizontal,
                BLACK,
            );
        }
    }
    if style.left_labels {
        for lat in degree_ticks(extent.lat_min, extent.lat_max, GRIDLINE_INTERVALS) {
            canvas.draw_text(
                &lat_label(lat),
                rect.x0 - pad,
                projection.y(lat),
                style.label_scale,
                Anchor::new(HAlign::Right, VAlign::Middle),
                Orientation::Horizontal,
                BLACK,
            );
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::{Colormap, Extend};
    use ndarray::array;

    const BLUE: Rgb<u8> = Rgb([0, 0, 255]);
    const RED: Rgb<u8> = Rgb([255, 0, 0]);

    fn extent() -> MapExtent {
        MapExtent::from_array([0.0, 40.0, 0.0, 20.0])
    }

    fn field() -> GridField {
        GridField {
            lat: vec![5.0, 15.0],
            lon: vec![10.0, 30.0],
            values: array![[-10.0, 10.0], [f64::NAN, 0.0]],
        }
    }

    fn style() -> PanelStyle {
        PanelStyle {
            left_labels: true,
            bottom_labels: true,
            label_scale: 1,
            line_width: 1.0,
        }
    }

    fn render(field: &GridField, mask: Option<&LandMask>) -> (Canvas, Rect) {
        let mut canvas = Canvas::new(120, 80);
        let scale = ColorScale::symmetric(Colormap::Bwr, 10.0, Extend::Both);
        let rect = draw_map_panel(
            &mut canvas,
            Rect::new(20.0, 10.0, 100.0, 50.0),
            &extent(),
            field,
            &scale,
            mask,
            &style(),
        );
        (canvas, rect)
    }

    #[test]
    fn fit_keeps_aspect_and_centres() {
        let fitted = extent().fit(Rect::new(0.0, 0.0, 100.0, 100.0));
        assert_eq!(fitted, Rect::new(0.0, 25.0, 100.0, 75.0));
        let fitted = extent().fit(Rect::new(0.0, 0.0, 100.0, 20.0));
        assert_eq!(fitted, Rect::new(30.0, 0.0, 70.0, 20.0));
    }

    #[test]
    fn longitudes_wrap_into_extent_frame() {
        let na = MapExtent::from_array([-170.0, -65.0, 23.0, 71.0]);
        assert_eq!(na.wrap(190.0), -170.0);
        assert_eq!(na.wrap(295.0), -65.0);
        assert_eq!(na.wrap(-100.0), -100.0);
    }

    #[test]
    fn edges_extend_half_a_step() {
        assert_eq!(cell_edges(&[0.0, 1.0, 3.0]), vec![-0.5, 0.5, 2.0, 4.0]);
        assert_eq!(cell_edges(&[40.0, 30.0]), vec![45.0, 35.0, 25.0]);
        assert_eq!(cell_edges(&[7.0]), vec![6.5, 7.5]);
    }

    #[test]
    fn cells_take_scale_colours_and_skip_nan() {
        let (canvas, rect) = render(&field(), None);
        assert_eq!(rect, Rect::new(20.0, 10.0, 100.0, 50.0));
        assert_eq!(canvas.pixel(25, 45), Some(BLUE));
        assert_eq!(canvas.pixel(65, 45), Some(RED));
        assert_eq!(canvas.pixel(25, 15), Some(WHITE));
        // Frame.
        assert_eq!(canvas.pixel(20, 30), Some(BLACK));
        assert_eq!(canvas.pixel(99, 30), Some(BLACK));
    }

    #[test]
    fn data_in_0_360_lands_on_negative_extent() {
        let extent = MapExtent::from_array([-40.0, 0.0, 0.0, 20.0]);
        let shifted = GridField {
            lon: vec![330.0, 350.0],
            ..field()
        };
        let mut canvas = Canvas::new(120, 80);
        let scale = ColorScale::symmetric(Colormap::Bwr, 10.0, Extend::Both);
        draw_map_panel(
            &mut canvas,
            Rect::new(20.0, 10.0, 100.0, 50.0),
            &extent,
            &shifted,
            &scale,
            None,
            &style(),
        );
        assert_eq!(canvas.pixel(25, 45), Some(BLUE));
        assert_eq!(canvas.pixel(65, 45), Some(RED));
    }

    #[test]
    fn ocean_is_white_and_coast_is_black() {
        let mask = LandMask {
            lat: vec![5.0, 15.0],
            lon: vec![10.0, 30.0],
            land: array![[true, false], [true, true]],
        };
        let (canvas, _) = render(&field(), Some(&mask));
        assert_eq!(canvas.pixel(25, 45), Some(BLUE));
        assert_eq!(canvas.pixel(65, 45), Some(WHITE));
        // Vertical coast between the two bottom cells at x = 60.
        assert_eq!(canvas.pixel(59, 35), Some(BLACK));
        // Horizontal coast above the ocean cell at y = 30.
        assert_eq!(canvas.pixel(85, 29), Some(BLACK));
    }

    #[test]
    fn labels_sit_outside_the_frame() {
        let (canvas, _) = render(&field(), None);
        let below = (0..120).any(|x| (51..80).any(|y| canvas.pixel(x, y) == Some(BLACK)));
        let left = (0..20).any(|x| (0..80).any(|y| canvas.pixel(x, y) == Some(BLACK)));
        assert!(below && left);
    }
}
