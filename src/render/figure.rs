use super::canvas::{Anchor, BLACK, Canvas, HAlign, Orientation, Rect, VAlign};
use super::colorbar::{ColorbarStyle, draw_colorbar};
use super::font::scale_for;
use super::map::{MapExtent, PanelStyle, draw_map_panel};
use crate::color::ColorScale;
use crate::config::FigureSize;
use crate::data::mask::LandMask;
use crate::data::model::GridField;

// Layout in figure fractions; x from the left, y from the top.
const GRID_TOP: f64 = 0.09;
const GRID_BOTTOM: f64 = 0.96;
const ROW_GAP: f64 = 0.04;
const TITLE_Y: f64 = 0.02;
const COMMON_LABEL_X: f64 = 0.015;
const MAP_COLUMNS: [(f64, f64); 3] = [(0.08, 0.32), (0.335, 0.575), (0.68, 0.92)];
const TEMPERATURE_BAR: (f64, f64) = (0.59, 0.605);
const RESIDUAL_BAR: (f64, f64) = (0.935, 0.95);

const TITLE_PT: f64 = 16.0;
const HEADING_PT: f64 = 12.0;
const LABEL_PT: f64 = 10.0;
const TICK_PT: f64 = 8.0;

/// One row of three maps.
#[derive(Debug, Clone)]
pub struct FigureRow {
    pub label: String,
    pub drybulb: GridField,
    pub wetbulb: GridField,
    pub residual: GridField,
}

impl FigureRow {
    fn fields(&self) -> [&GridField; 3] {
        [&self.drybulb, &self.wetbulb, &self.residual]
    }
}

/// Everything needed to draw a drybulb / wetbulb / residual comparison.
#[derive(Debug, Clone)]
pub struct FigureSpec {
    pub title: String,
    pub column_titles: [String; 3],
    pub rows: Vec<FigureRow>,
    pub row_label_orientation: Orientation,
    /// Row label x position, as a fraction of the map width left of the map.
    pub row_label_offset: f64,
    pub common_ylabel: Option<String>,
    /// Shared by the drybulb and wetbulb columns.
    pub temperature_scale: ColorScale,
    pub residual_scale: ColorScale,
    pub colorbar_label: String,
    pub extent: MapExtent,
    pub size: FigureSize,
}

pub fn render_figure(spec: &FigureSpec, mask: Option<&LandMask>) -> Canvas {
    let (width, height) = spec.size.pixels();
    let (w, h) = (width as f64, height as f64);
    let dpi = spec.size.dpi;
    let line_width = (dpi / 100.0).round().max(1.0);
    let mut canvas = Canvas::new(width, height);

    let tick_scale = scale_for(TICK_PT, dpi);
    let label_scale = scale_for(LABEL_PT, dpi);
    let heading_scale = scale_for(HEADING_PT, dpi);

    log::debug!(
        "Rendering '{}' at {}×{} px with {} rows",
        spec.title,
        width,
        height,
        spec.rows.len()
    );

    // -- maps ---------------------------------------------------------------
    let n_rows = spec.rows.len().max(1) as f64;
    let row_height = (GRID_BOTTOM - GRID_TOP - ROW_GAP * (n_rows - 1.0)) / n_rows;
    let mut map_rects: Vec<[Rect; 3]> = Vec::with_capacity(spec.rows.len());

    for (r, row) in spec.rows.iter().enumerate() {
        let top = (GRID_TOP + r as f64 * (row_height + ROW_GAP)) * h;
        let bottom = top + row_height * h;
        let mut rects = [Rect::new(0.0, 0.0, 0.0, 0.0); 3];
        for (c, field) in row.fields().into_iter().enumerate() {
            let (x0, x1) = MAP_COLUMNS[c];
            let scale = if c == 2 {
                &spec.residual_scale
            } else {
                &spec.temperature_scale
            };
            let style = PanelStyle {
                left_labels: c != 1,
                bottom_labels: true,
                label_scale: tick_scale,
                line_width,
            };
            rects[c] = draw_map_panel(
                &mut canvas,
                Rect::new(x0 * w, top, x1 * w, bottom),
                &spec.extent,
                field,
                scale,
                mask,
                &style,
            );
        }

        let first = rects[0];
        canvas.draw_text(
            &row.label,
            first.x0 - spec.row_label_offset * first.width(),
            first.y1 - 0.55 * first.height(),
            heading_scale,
            Anchor::CENTER,
            spec.row_label_orientation,
            BLACK,
        );
        map_rects.push(rects);
    }

    // -- titles -------------------------------------------------------------
    if let Some(first_row) = map_rects.first() {
        for (title, rect) in spec.column_titles.iter().zip(first_row) {
            canvas.draw_text(
                title,
                rect.center_x(),
                rect.y0 - (heading_scale * 4) as f64,
                heading_scale,
                Anchor::new(HAlign::Center, VAlign::Bottom),
                Orientation::Horizontal,
                BLACK,
            );
        }
    }

    canvas.draw_text(
        &spec.title,
        w / 2.0,
        TITLE_Y * h,
        scale_for(TITLE_PT, dpi),
        Anchor::new(HAlign::Center, VAlign::Top),
        Orientation::Horizontal,
        BLACK,
    );

    if let Some(label) = &spec.common_ylabel {
        canvas.draw_text(
            label,
            COMMON_LABEL_X * w,
            (GRID_TOP + GRID_BOTTOM) / 2.0 * h,
            heading_scale,
            Anchor::CENTER,
            Orientation::Vertical,
            BLACK,
        );
    }

    // -- colorbars ----------------------------------------------------------
    if let (Some(first), Some(last)) = (map_rects.first(), map_rects.last()) {
        let style = ColorbarStyle {
            label_scale,
            line_width,
            tick_length: 3.0 * line_width,
        };
        let bars = [
            (TEMPERATURE_BAR, 1, &spec.temperature_scale),
            (RESIDUAL_BAR, 2, &spec.residual_scale),
        ];
        for ((x0, x1), column, scale) in bars {
            let rect = Rect::new(x0 * w, first[column].y0, x1 * w, last[column].y1);
            draw_colorbar(&mut canvas, rect, scale, &spec.colorbar_label, &style);
        }
    }

    canvas
}
