use ndarray::Axis;
use serde::{Deserialize, Serialize};

use super::error::DataError;
use super::model::GriddedSeries;
use super::time::CfDate;

// ---------------------------------------------------------------------------
// Region – inclusive lat/lon label slice
// ---------------------------------------------------------------------------

/// Bounding box in the dataset's own coordinate convention (longitudes in
/// 0–360 for CESM output).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Region {
    pub lat_min: f64,
    pub lat_max: f64,
    pub lon_min: f64,
    pub lon_max: f64,
}

impl Region {
    /// Standard North America grid.
    pub const NORTH_AMERICA: Region = Region {
        lat_min: 23.0,
        lat_max: 72.0,
        lon_min: 190.0,
        lon_max: 295.0,
    };
}

impl Default for Region {
    fn default() -> Self {
        Region::NORTH_AMERICA
    }
}

/// Indices of `coords` whose label lies in `[a, b]` (bounds in either order).
pub fn label_slice(coords: &[f64], a: f64, b: f64) -> Vec<usize> {
    let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
    coords
        .iter()
        .enumerate()
        .filter(|(_, c)| (lo..=hi).contains(*c))
        .map(|(i, _)| i)
        .collect()
}

// ---------------------------------------------------------------------------
// Time selection
// ---------------------------------------------------------------------------

/// Keep the time steps with `start <= t <= end`. Both ends are inclusive;
/// an empty result is not an error.
pub fn select_time(series: &GriddedSeries, start: CfDate, end: CfDate) -> GriddedSeries {
    let keep: Vec<usize> = series
        .times
        .iter()
        .enumerate()
        .filter(|(_, t)| **t >= start && **t <= end)
        .map(|(i, _)| i)
        .collect();

    log::debug!(
        "{}: {} of {} time steps in [{start}, {end}]",
        series.name,
        keep.len(),
        series.len()
    );

    GriddedSeries {
        name: series.name.clone(),
        units: series.units.clone(),
        times: keep.iter().map(|&i| series.times[i]).collect(),
        lat: series.lat.clone(),
        lon: series.lon.clone(),
        values: series.values.select(Axis(0), &keep),
    }
}

/// Final time step, the open end of a "from here on" window.
pub fn last_time(series: &GriddedSeries) -> Option<CfDate> {
    series.last_time()
}

/// Time steps from `start` (inclusive) to the end of the series.
pub fn select_from(series: &GriddedSeries, start: CfDate) -> GriddedSeries {
    match last_time(series) {
        Some(last) => select_time(series, start, last),
        None => series.clone(),
    }
}

// ---------------------------------------------------------------------------
// Spatial selection
// ---------------------------------------------------------------------------

/// Cut one series down to `region`.
pub fn select_region(series: &GriddedSeries, region: &Region) -> Result<GriddedSeries, DataError> {
    let lat_idx = label_slice(&series.lat, region.lat_min, region.lat_max);
    let lon_idx = label_slice(&series.lon, region.lon_min, region.lon_max);
    if lat_idx.is_empty() || lon_idx.is_empty() {
        return Err(DataError::EmptySelection(format!(
            "{}: no grid points in lat [{}, {}] × lon [{}, {}]",
            series.name, region.lat_min, region.lat_max, region.lon_min, region.lon_max
        )));
    }

    let values = series
        .values
        .select(Axis(1), &lat_idx)
        .select(Axis(2), &lon_idx);

    Ok(GriddedSeries {
        name: series.name.clone(),
        units: series.units.clone(),
        times: series.times.clone(),
        lat: lat_idx.iter().map(|&i| series.lat[i]).collect(),
        lon: lon_idx.iter().map(|&i| series.lon[i]).collect(),
        values,
    })
}

/// Apply the same region to the wet-bulb and dry-bulb series and check that
/// both end up on the same grid.
pub fn select_grid(
    wetbulb: &GriddedSeries,
    drybulb: &GriddedSeries,
    region: &Region,
) -> Result<(GriddedSeries, GriddedSeries), DataError> {
    let wetbulb = select_region(wetbulb, region)?;
    let drybulb = select_region(drybulb, region)?;
    wetbulb.ensure_same_grid(&drybulb)?;
    log::info!(
        "Region lat [{}, {}] lon [{}, {}]: {} × {} grid points",
        region.lat_min,
        region.lat_max,
        region.lon_min,
        region.lon_max,
        wetbulb.lat.len(),
        wetbulb.lon.len()
    );
    Ok((wetbulb, drybulb))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
