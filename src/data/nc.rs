//! CF-convention NetCDF input.
//!
//! The wet-bulb files are written by xarray, so the data variable keeps
//! xarray's default name (`__xarray_dataarray_variable__`); the dry-bulb
//! files are CESM history output (`TREFHT`, K). Both use `(time, lat, lon)`
//! dimension order and a `noleap` calendar.

use std::path::Path;

use ndarray::{Array2, Array3, Axis};

use super::error::DataError;
use super::model::{GridField, GriddedSeries};
use super::time::TimeUnits;

/// Values at or beyond this magnitude are treated as fill values.
const FILL_THRESHOLD: f64 = 1.0e30;

const LAT_NAMES: [&str; 2] = ["lat", "latitude"];
const LON_NAMES: [&str; 2] = ["lon", "longitude"];

pub fn read_series(path: &Path, variable: &str) -> Result<GriddedSeries, DataError> {
    let file = netcdf::open(path)?;
    let var = file
        .variable(variable)
        .ok_or_else(|| DataError::MissingVariable(variable.to_string()))?;

    let dims: Vec<String> = var.dimensions().iter().map(|d| d.name()).collect();
    let [time_dim, lat_dim, lon_dim] = dims.as_slice() else {
        return Err(bad_dims(variable, &dims));
    };
    if !LAT_NAMES.contains(&lat_dim.as_str()) || !LON_NAMES.contains(&lon_dim.as_str()) {
        return Err(bad_dims(variable, &dims));
    }

    let time_var = file
        .variable(time_dim)
        .ok_or_else(|| DataError::MissingVariable(time_dim.clone()))?;
    let units = attr_string(&time_var, "units").ok_or_else(|| DataError::InvalidTimeUnits(String::new()))?;
    let calendar = attr_string(&time_var, "calendar").unwrap_or_else(|| "standard".to_string());
    let raw_times: Vec<f64> = time_var.get_values(..)?;
    let times = TimeUnits::parse(&units, &calendar)?.decode_all(&raw_times)?;

    let lat = read_coord(&file, lat_dim)?;
    let lon = read_coord(&file, lon_dim)?;

    let raw: Vec<f64> = var.get_values(..)?;
    let values = Array3::from_shape_vec((times.len(), lat.len(), lon.len()), unpack(&var, raw))
        .map_err(|e| DataError::BadShape {
            name: variable.to_string(),
            detail: e.to_string(),
        })?;

    log::debug!("{variable}: time units '{units}', calendar '{calendar}'");
    GriddedSeries::new(variable, attr_string(&var, "units").unwrap_or_default(), times, lat, lon, values)
}

/// A `(lat, lon)` or `(time, lat, lon)` variable as a single field; the
/// latter is reduced to its first time step.
pub fn read_field(path: &Path, variable: &str) -> Result<GridField, DataError> {
    let file = netcdf::open(path)?;
    let var = file
        .variable(variable)
        .ok_or_else(|| DataError::MissingVariable(variable.to_string()))?;

    let dims: Vec<String> = var.dimensions().iter().map(|d| d.name()).collect();
    let lens: Vec<usize> = var.dimensions().iter().map(|d| d.len()).collect();
    let (lat_dim, lon_dim) = match dims.as_slice() {
        [lat, lon] | [_, lat, lon] => (lat, lon),
        _ => return Err(bad_dims(variable, &dims)),
    };
    let lat = read_coord(&file, lat_dim)?;
    let lon = read_coord(&file, lon_dim)?;

    let raw: Vec<f64> = var.get_values(..)?;
    let values = unpack(&var, raw);
    let steps = if lens.len() == 3 { lens[0] } else { 1 };
    let all = Array3::from_shape_vec((steps, lat.len(), lon.len()), values).map_err(|e| DataError::BadShape {
        name: variable.to_string(),
        detail: e.to_string(),
    })?;
    if steps == 0 {
        return Err(DataError::EmptySelection(format!("'{variable}' has no time steps")));
    }
    let values: Array2<f64> = all.index_axis(Axis(0), 0).to_owned();
    Ok(GridField { lat, lon, values })
}

fn bad_dims(variable: &str, dims: &[String]) -> DataError {
    DataError::BadShape {
        name: variable.to_string(),
        detail: format!("expected (time, lat, lon) dimensions, found {dims:?}"),
    }
}

fn read_coord(file: &netcdf::File, name: &str) -> Result<Vec<f64>, DataError> {
    let var = file
        .variable(name)
        .ok_or_else(|| DataError::MissingVariable(name.to_string()))?;
    Ok(var.get_values(..)?)
}

/// Apply fill values, `scale_factor` and `add_offset`.
fn unpack(var: &netcdf::Variable, raw: Vec<f64>) -> Vec<f64> {
    let fills: Vec<f64> = ["_FillValue", "missing_value"]
        .iter()
        .filter_map(|name| attr_f64(var, name))
        .collect();
    let scale = attr_f64(var, "scale_factor").unwrap_or(1.0);
    let offset = attr_f64(var, "add_offset").unwrap_or(0.0);

    raw.into_iter()
        .map(|v| {
            if !v.is_finite() || v.abs() >= FILL_THRESHOLD || fills.contains(&v) {
                f64::NAN
            } else {
                v * scale + offset
            }
        })
        .collect()
}

fn attr_f64(var: &netcdf::Variable, name: &str) -> Option<f64> {
    match var.attribute_value(name)?.ok()? {
        netcdf::AttributeValue::Double(d) => Some(d),
        netcdf::AttributeValue::Float(f) => Some(f as f64),
        netcdf::AttributeValue::Doubles(v) => v.first().copied(),
        netcdf::AttributeValue::Floats(v) => v.first().map(|&f| f as f64),
        netcdf::AttributeValue::Short(s) => Some(s as f64),
        netcdf::AttributeValue::Int(i) => Some(i as f64),
        _ => None,
    }
}

fn attr_string(var: &netcdf::Variable, name: &str) -> Option<String> {
    match var.attribute_value(name)?.ok()? {
        netcdf::AttributeValue::Str(s) => Some(s),
        _ => None,
    }
}
