//! Tick placement and label formatting for colorbars and map gridlines.

const NICE_MULTIPLES: [f64; 5] = [1.0, 2.0, 2.5, 5.0, 10.0];
const DEGREE_STEPS: [f64; 10] = [1.0, 2.0, 5.0, 10.0, 15.0, 20.0, 30.0, 45.0, 60.0, 90.0];
const EPS: f64 = 1e-9;

/// Smallest step of the form {1, 2, 2.5, 5} × 10^k that splits the range
/// into at most `max_intervals` pieces.
pub fn nice_step(span: f64, max_intervals: usize) -> f64 {
    let span = span.abs();
    if span == 0.0 || !span.is_finite() {
        return 1.0;
    }
    let raw = span / max_intervals.max(1) as f64;
    let magnitude = 10f64.powf(raw.log10().floor());
    NICE_MULTIPLES
        .iter()
        .map(|m| m * magnitude)
        .find(|&step| step >= raw * (1.0 - EPS))
        .unwrap_or(10.0 * magnitude)
}

/// Multiples of `step` inside `[lo, hi]`.
pub fn ticks_with_step(lo: f64, hi: f64, step: f64) -> Vec<f64> {
    let (lo, hi) = (lo.min(hi), lo.max(hi));
    if step <= 0.0 || !step.is_finite() {
        return Vec::new();
    }
    let first = (lo / step - EPS).ceil() as i64;
    let last = (hi / step + EPS).floor() as i64;
    (first..=last)
        .map(|k| {
            let v = k as f64 * step;
            if v.abs() < step * EPS { 0.0 } else { v }
        })
        .collect()
}

/// Nice ticks covering `[lo, hi]`.
#[cfg(test)]
pub fn nice_ticks(lo: f64, hi: f64, max_intervals: usize) -> Vec<f64> {
    ticks_with_step(lo, hi, nice_step(hi - lo, max_intervals))
}

/// Gridline positions in degrees, on steps a map reader expects.
pub fn degree_ticks(lo: f64, hi: f64, max_intervals: usize) -> Vec<f64> {
    let raw = (hi - lo).abs() / max_intervals.max(1) as f64;
    let step = DEGREE_STEPS
        .iter()
        .copied()
        .find(|&s| s >= raw)
        .unwrap_or(90.0);
    ticks_with_step(lo, hi, step)
}

/// Decimal places needed to print multiples of `step` exactly.
fn decimals_for(step: f64) -> usize {
    (0..=4)
        .find(|&d| {
            let scaled = step * 10f64.powi(d as i32);
            (scaled - scaled.round()).abs() < 1e-6
        })
        .unwrap_or(4)
}

/// Label for a tick at `value` on an axis stepping by `step`. Never `-0`.
pub fn format_tick(value: f64, step: f64) -> String {
    let text = format!("{:.*}", decimals_for(step), value);
    if text.starts_with('-') && text[1..].chars().all(|c| c == '0' || c == '.') {
        text[1..].to_string()
    } else {
        text
    }
}

fn format_degrees(value: f64) -> String {
    if (value - value.round()).abs() < 1e-6 {
        format!("{}", value.round() as i64)
    } else {
        format!("{value:.1}")
    }
}

/// Wrap a longitude into `(-180, 180]`.
pub fn wrap_longitude(lon: f64) -> f64 {
    let wrapped = (lon + 180.0).rem_euclid(360.0) - 180.0;
    if wrapped == -180.0 { 180.0 } else { wrapped }
}

/// `160°W`, `20°E`, `0°`, `180°`.
pub fn lon_label(lon: f64) -> String {
    let lon = wrap_longitude(lon);
    if lon.abs() < 1e-6 || (lon - 180.0).abs() < 1e-6 {
        format!("{}°", format_degrees(lon.abs()))
    } else if lon < 0.0 {
        format!("{}°W", format_degrees(-lon))
    } else {
        format!("{}°E", format_degrees(lon))
    }
}

/// `30°N`, `15°S`, `0°`.
pub fn lat_label(lat: f64) -> String {
    if lat.abs() < 1e-6 {
        "0°".to_string()
    } else if lat < 0.0 {
        format!("{}°S", format_degrees(-lat))
    } else {
        format!("{}°N", format_degrees(lat))
    }
}
