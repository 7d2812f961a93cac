use super::canvas::{Anchor, BLACK, Canvas, HAlign, Orientation, Rect, VAlign};
use super::ticks::{format_tick, nice_step, ticks_with_step};
use crate::color::{ColorScale, Extend};

/// Length of each extension triangle relative to the whole bar.
const EXTEND_FRACTION: f64 = 0.05;
const TICK_INTERVALS: usize = 8;

#[derive(Debug, Clone, Copy)]
pub struct ColorbarStyle {
    pub label_scale: u32,
    pub line_width: f64,
    pub tick_length: f64,
}

/// Vertical colorbar filling `rect`, with triangles for `Extend::Both`,
/// ticks and tick labels on the right and a rotated `label` beyond them.
pub fn draw_colorbar(canvas: &mut Canvas, rect: Rect, scale: &ColorScale, label: &str, style: &ColorbarStyle) {
    let tri = match scale.extend {
        Extend::Both => rect.height() * EXTEND_FRACTION,
        Extend::Neither => 0.0,
    };
    let body = Rect::new(rect.x0, rect.y0 + tri, rect.x1, rect.y1 - tri);

    // Gradient, one pixel row at a time, top = vmax.
    let rows = body.height().ceil().max(1.0) as usize;
    for k in 0..rows {
        let y = body.y0 + k as f64;
        let t = 1.0 - (k as f64 + 0.5) / body.height();
        let color = scale.colormap.sample(t);
        canvas.fill_rect(Rect::new(body.x0, y, body.x1, (y + 1.0).min(body.y1)), color);
    }

    if tri > 0.0 {
        canvas.fill_triangle(
            [(body.x0, body.y0), (body.x1, body.y0), (body.center_x(), rect.y0)],
            scale.over_color(),
        );
        canvas.fill_triangle(
            [(body.x0, body.y1), (body.x1, body.y1), (body.center_x(), rect.y1)],
            scale.under_color(),
        );
    }
    canvas.stroke_rect(body, style.line_width, BLACK);

    let step = nice_step(scale.vmax - scale.vmin, TICK_INTERVALS);
    let pad = (style.label_scale * 2) as f64;
    let text_x = body.x1 + style.tick_length + pad;
    let mut widest = 0u32;
    for value in ticks_with_step(scale.vmin, scale.vmax, step) {
        let y = body.y1 - scale.normalize(value) * body.height();
        canvas.hline(body.x1, body.x1 + style.tick_length, y, style.line_width, BLACK);
        let text = format_tick(value, step);
        widest = widest.max(Canvas::text_size(&text, style.label_scale).0);
        canvas.draw_text(
            &text,
            text_x,
            y,
            style.label_scale,
            Anchor::new(HAlign::Left, VAlign::Middle),
            Orientation::Horizontal,
            BLACK,
        );
    }

    if !label.is_empty() {
        canvas.draw_text(
            label,
            text_x + widest as f64 + pad * 2.0,
            body.center_y(),
            style.label_scale,
            Anchor::new(HAlign::Left, VAlign::Middle),
            Orientation::Vertical,
            BLACK,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::Colormap;
    use crate::render::canvas::WHITE;
    use image::Rgb;

    fn style() -> ColorbarStyle {
        ColorbarStyle {
            label_scale: 1,
            line_width: 1.0,
            tick_length: 3.0,
        }
    }

    #[test]
    fn gradient_runs_from_vmin_at_bottom_to_vmax_at_top() {
        let mut canvas = Canvas::new(80, 120);
        let scale = ColorScale::symmetric(Colormap::Bwr, 10.0, Extend::Neither);
        draw_colorbar(&mut canvas, Rect::new(10.0, 10.0, 20.0, 110.0), &scale, "degC", &style());
        let top = canvas.pixel(15, 12).unwrap();
        let bottom = canvas.pixel(15, 107).unwrap();
        assert!(top[0] > 240 && top[2] < 20, "{top:?}");
        assert!(bottom[2] > 240 && bottom[0] < 20, "{bottom:?}");
        // No triangles: just above the bar stays white.
        assert_eq!(canvas.pixel(15, 8), Some(WHITE));
    }

    #[test]
    fn extension_triangles_use_end_colours() {
        let mut canvas = Canvas::new(80, 120);
        let scale = ColorScale::symmetric(Colormap::Bwr, 10.0, Extend::Both);
        draw_colorbar(&mut canvas, Rect::new(10.0, 10.0, 20.0, 110.0), &scale, "degC", &style());
        // Triangles are 5 px tall; sample just inside each, on the centre line.
        assert_eq!(canvas.pixel(15, 13), Some(Rgb([255, 0, 0])));
        assert_eq!(canvas.pixel(15, 106), Some(Rgb([0, 0, 255])));
        // The apex column narrows: a corner next to the tip is still white.
        assert_eq!(canvas.pixel(10, 10), Some(WHITE));
    }

    #[test]
    fn ticks_and_label_draw_right_of_the_bar() {
        let mut canvas = Canvas::new(80, 120);
        let scale = ColorScale::symmetric(Colormap::Coolwarm, 5.0, Extend::Neither);
        draw_colorbar(&mut canvas, Rect::new(10.0, 10.0, 20.0, 110.0), &scale, "degC", &style());
        // Tick at 0 sits at the middle of the bar.
        assert_eq!(canvas.pixel(21, 59), Some(BLACK));
        let right_ink = (25..80).any(|x| (0..120).any(|y| canvas.pixel(x, y) == Some(BLACK)));
        assert!(right_ink);
    }
}
