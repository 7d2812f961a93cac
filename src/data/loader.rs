use std::collections::BTreeSet;
use std::path::Path;

use anyhow::{Context, Result, bail};
use arrow::array::{Array, ArrayRef, AsArray, Float64Array};
use arrow::compute::cast;
use arrow::datatypes::DataType;
use ndarray::{Array2, Array3};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;

use super::error::DataError;
use super::model::{COORD_TOLERANCE, GridField, GriddedSeries};
use super::time::CfDate;
use crate::config::InputSpec;

// ---------------------------------------------------------------------------
// Public entry-points
// ---------------------------------------------------------------------------

/// Load a `(time, lat, lon)` variable from a file. Dispatch by extension.
///
/// Supported formats:
/// * `.nc` / `.nc4` / `.cdf` – NetCDF with CF time coordinate (feature `netcdf`)
/// * `.parquet`            – long table with `time`, `lat`, `lon`, `<variable>`
/// * `.csv`                – same long layout, header row required
pub fn load_series(path: &Path, variable: &str) -> Result<GriddedSeries> {
    log::info!("Loading '{variable}' from {}", path.display());
    let series = match extension(path).as_str() {
        "nc" | "nc4" | "cdf" => load_netcdf_series(path, variable)?,
        "parquet" | "pq" => load_parquet(path, variable, true)?.into_series(variable)?,
        "csv" => load_csv(path, variable, true)?.into_series(variable)?,
        other => return Err(DataError::UnsupportedExtension(other.to_string()).into()),
    };
    log::info!(
        "'{variable}': {} time steps × {} lat × {} lon ({} – {})",
        series.len(),
        series.lat.len(),
        series.lon.len(),
        series.first_time().map(|t| t.to_string()).unwrap_or_default(),
        series.last_time().map(|t| t.to_string()).unwrap_or_default(),
    );
    Ok(series)
}

/// Load a single lat × lon field (a land fraction, for instance). A time
/// axis, if the source has one, is reduced to its first step.
pub fn load_field(path: &Path, variable: &str) -> Result<GridField> {
    log::info!("Loading field '{variable}' from {}", path.display());
    match extension(path).as_str() {
        "nc" | "nc4" | "cdf" => load_netcdf_field(path, variable),
        "parquet" | "pq" => load_parquet(path, variable, false)?.into_field(variable),
        "csv" => load_csv(path, variable, false)?.into_field(variable),
        other => Err(DataError::UnsupportedExtension(other.to_string()).into()),
    }
}

/// Load both temperature inputs and align their naming and units: the
/// wet-bulb variable becomes `wetbulb`, the dry-bulb variable `drybulb`,
/// each with its configured unit offset applied.
pub fn init_data(wetbulb: &InputSpec, drybulb: &InputSpec) -> Result<(GriddedSeries, GriddedSeries)> {
    let load = |spec: &InputSpec, name: &str| -> Result<GriddedSeries> {
        let series = load_series(&spec.path, &spec.variable)
            .with_context(|| format!("loading {name} from {}", spec.path.display()))?;
        Ok(series.renamed(name).offset(spec.offset, spec.units.clone()))
    };
    Ok((load(wetbulb, "wetbulb")?, load(drybulb, "drybulb")?))
}

fn extension(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase()
}

// ---------------------------------------------------------------------------
// NetCDF
// ---------------------------------------------------------------------------

#[cfg(feature = "netcdf")]
fn load_netcdf_series(path: &Path, variable: &str) -> Result<GriddedSeries> {
    super::nc::read_series(path, variable).with_context(|| format!("reading NetCDF {}", path.display()))
}

#[cfg(feature = "netcdf")]
fn load_netcdf_field(path: &Path, variable: &str) -> Result<GridField> {
    super::nc::read_field(path, variable).with_context(|| format!("reading NetCDF {}", path.display()))
}

#[cfg(not(feature = "netcdf"))]
fn load_netcdf_series(path: &Path, _variable: &str) -> Result<GriddedSeries> {
    Err(DataError::FeatureDisabled("netcdf")).with_context(|| format!("reading {}", path.display()))
}

#[cfg(not(feature = "netcdf"))]
fn load_netcdf_field(path: &Path, _variable: &str) -> Result<GridField> {
    Err(DataError::FeatureDisabled("netcdf")).with_context(|| format!("reading {}", path.display()))
}

// ---------------------------------------------------------------------------
// Long-format tables → grids
// ---------------------------------------------------------------------------

/// Rows of `(time, lat, lon, value)` before they are placed on a grid.
#[derive(Debug, Default)]
struct LongTable {
    times: Option<Vec<CfDate>>,
    lat: Vec<f64>,
    lon: Vec<f64>,
    values: Vec<f64>,
}

/// Sorted, de-duplicated coordinate axis.
fn unique_axis(coords: &[f64]) -> Vec<f64> {
    let mut axis: Vec<f64> = coords.iter().copied().filter(|c| c.is_finite()).collect();
    axis.sort_by(f64::total_cmp);
    axis.dedup_by(|b, a| (*b - *a).abs() <= COORD_TOLERANCE);
    axis
}

/// Position of `value` on a sorted axis built by [`unique_axis`].
fn axis_position(axis: &[f64], value: f64) -> Option<usize> {
    let i = axis.partition_point(|&c| c < value - COORD_TOLERANCE);
    (i < axis.len() && (axis[i] - value).abs() <= COORD_TOLERANCE).then_some(i)
}

impl LongTable {
    fn into_series(self, variable: &str) -> Result<GriddedSeries> {
        let row_times = self
            .times
            .as_deref()
            .ok_or_else(|| DataError::MissingColumn("time".to_string()))?;
        let times: Vec<CfDate> = row_times.iter().copied().collect::<BTreeSet<_>>().into_iter().collect();
        let lat = unique_axis(&self.lat);
        let lon = unique_axis(&self.lon);

        let mut values = Array3::from_elem((times.len(), lat.len(), lon.len()), f64::NAN);
        for (row, &value) in self.values.iter().enumerate() {
            let (Some(j), Some(i)) = (axis_position(&lat, self.lat[row]), axis_position(&lon, self.lon[row])) else {
                bail!("row {row}: non-finite coordinate");
            };
            // Every row time is in `times` by construction.
            let t = times.binary_search(&row_times[row]).unwrap_or_default();
            values[[t, j, i]] = value;
        }

        Ok(GriddedSeries::new(variable, "", times, lat, lon, values)?)
    }

    fn into_field(self, variable: &str) -> Result<GridField> {
        let first = self.times.as_ref().and_then(|t| t.iter().min().copied());
        let lat = unique_axis(&self.lat);
        let lon = unique_axis(&self.lon);
        if lat.is_empty() || lon.is_empty() {
            return Err(DataError::EmptySelection(format!("'{variable}' has no rows")).into());
        }

        let mut values = Array2::from_elem((lat.len(), lon.len()), f64::NAN);
        for (row, &value) in self.values.iter().enumerate() {
            if let (Some(times), Some(first)) = (&self.times, first) {
                if times[row] != first {
                    continue;
                }
            }
            let (Some(j), Some(i)) = (axis_position(&lat, self.lat[row]), axis_position(&lon, self.lon[row])) else {
                bail!("row {row}: non-finite coordinate");
            };
            values[[j, i]] = value;
        }
        Ok(GridField { lat, lon, values })
    }
}

// ---------------------------------------------------------------------------
// CSV loader
// ---------------------------------------------------------------------------

/// CSV layout: header row with `time`, `lat`, `lon` and the variable column.
/// An empty value cell is a missing value.
fn load_csv(path: &Path, variable: &str, require_time: bool) -> Result<LongTable> {
    let mut reader = csv::Reader::from_path(path).context("opening CSV")?;
    let headers: Vec<String> = reader
        .headers()
        .context("reading CSV headers")?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    let column = |name: &str| -> Result<usize> {
        headers
            .iter()
            .position(|h| h == name)
            .ok_or_else(|| DataError::MissingColumn(name.to_string()).into())
    };
    let time_idx = match column("time") {
        Ok(idx) => Some(idx),
        Err(_) if !require_time => None,
        Err(e) => return Err(e),
    };
    let lat_idx = column("lat")?;
    let lon_idx = column("lon")?;
    let value_idx = column(variable)?;

    let mut table = LongTable {
        times: time_idx.map(|_| Vec::new()),
        ..LongTable::default()
    };

    for (row_no, result) in reader.records().enumerate() {
        let record = result.with_context(|| format!("CSV row {row_no}"))?;
        let cell = |idx: usize| record.get(idx).unwrap_or("").trim();

        if let (Some(idx), Some(times)) = (time_idx, table.times.as_mut()) {
            times.push(CfDate::parse(cell(idx)).with_context(|| format!("CSV row {row_no}: time"))?);
        }
        table.lat.push(parse_float(cell(lat_idx), row_no, "lat")?);
        table.lon.push(parse_float(cell(lon_idx), row_no, "lon")?);
        let raw = cell(value_idx);
        table.values.push(if raw.is_empty() {
            f64::NAN
        } else {
            parse_float(raw, row_no, variable)?
        });
    }

    Ok(table)
}

fn parse_float(s: &str, row: usize, col: &str) -> Result<f64> {
    s.parse::<f64>()
        .with_context(|| format!("Row {row}, {col}: '{s}' is not a number"))
}

// ---------------------------------------------------------------------------
// Parquet loader
// ---------------------------------------------------------------------------

/// Load a long-format Parquet table.
///
/// Expected schema:
/// - `time`: Utf8 / LargeUtf8 / Date32 / Timestamp
/// - `lat`, `lon`: any numeric type
/// - `<variable>`: any numeric type, nullable
fn load_parquet(path: &Path, variable: &str, require_time: bool) -> Result<LongTable> {
    let file = std::fs::File::open(path).context("opening parquet file")?;
    let builder = ParquetRecordBatchReaderBuilder::try_new(file).context("reading parquet metadata")?;
    let reader = builder.build().context("building parquet reader")?;

    let mut table = LongTable::default();

    for batch_result in reader {
        let batch = batch_result.context("reading parquet record batch")?;
        let schema = batch.schema();
        let column = |name: &str| -> Result<&ArrayRef> {
            let idx = schema
                .index_of(name)
                .map_err(|_| DataError::MissingColumn(name.to_string()))?;
            Ok(batch.column(idx))
        };

        match column("time") {
            Ok(col) => {
                let times = table.times.get_or_insert_with(Vec::new);
                times.extend(extract_times(col)?);
            }
            Err(e) if require_time => return Err(e),
            Err(_) => {}
        }
        table.lat.extend(extract_f64(column("lat")?).context("column 'lat'")?);
        table.lon.extend(extract_f64(column("lon")?).context("column 'lon'")?);
        table
            .values
            .extend(extract_f64(column(variable)?).with_context(|| format!("column '{variable}'"))?);
    }

    Ok(table)
}

// -- Parquet / Arrow helpers --

/// Any numeric column as `f64`, nulls as `NaN`.
fn extract_f64(col: &ArrayRef) -> Result<Vec<f64>> {
    let as_f64 = cast(col, &DataType::Float64)
        .with_context(|| format!("cannot read {:?} as Float64", col.data_type()))?;
    let arr = as_f64
        .as_any()
        .downcast_ref::<Float64Array>()
        .context("expected Float64Array")?;
    Ok(arr.iter().map(|v| v.unwrap_or(f64::NAN)).collect())
}

/// Text or temporal column as parsed dates.
fn extract_times(col: &ArrayRef) -> Result<Vec<CfDate>> {
    let text = cast(col, &DataType::Utf8)
        .with_context(|| format!("cannot read {:?} as dates", col.data_type()))?;
    let strings = text.as_string::<i32>();
    (0..strings.len())
        .map(|row| {
            if strings.is_null(row) {
                bail!("Row {row}: null time");
            }
            CfDate::parse(strings.value(row)).with_context(|| format!("Row {row}: time"))
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::Arc;

    use arrow::array::{Float32Array, StringArray};
    use arrow::datatypes::{Field, Schema};
    use arrow::record_batch::RecordBatch;
    use parquet::arrow::ArrowWriter;

    #[test]
    fn csv_rows_land_on_a_sorted_grid() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wetbulb.csv");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "time,lat,lon,wb").unwrap();
        // Out of order, one missing cell, one empty value.
        writeln!(file, "2000-02-01,30.0,200.0,4.0").unwrap();
        writeln!(file, "2000-01-01,25.0,200.0,1.0").unwrap();
        writeln!(file, "2000-01-01,30.0,190.0,2.0").unwrap();
        writeln!(file, "2000-01-01,25.0,190.0,").unwrap();
        writeln!(file, "2000-01-01,30.0,200.0,3.0").unwrap();
        drop(file);

        let series = load_series(&path, "wb").unwrap();
        assert_eq!(series.times, vec![CfDate::ymd(2000, 1, 1), CfDate::ymd(2000, 2, 1)]);
        assert_eq!(series.lat, vec![25.0, 30.0]);
        assert_eq!(series.lon, vec![190.0, 200.0]);
        assert!(series.values[[0, 0, 0]].is_nan());
        assert_eq!(series.values[[0, 0, 1]], 1.0);
        assert_eq!(series.values[[0, 1, 0]], 2.0);
        assert_eq!(series.values[[0, 1, 1]], 3.0);
        assert_eq!(series.values[[1, 1, 1]], 4.0);
        assert!(series.values[[1, 0, 0]].is_nan());
    }

    #[test]
    fn csv_without_value_column_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t.csv");
        std::fs::write(&path, "time,lat,lon,other\n2000-01-01,1,2,3\n").unwrap();
        let err = load_series(&path, "TREFHT").unwrap_err();
        assert!(err.to_string().contains("TREFHT") || format!("{err:#}").contains("TREFHT"));
    }

    #[test]
    fn parquet_float32_values_with_nulls() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t.parquet");

        let schema = Arc::new(Schema::new(vec![
            Field::new("time", DataType::Utf8, false),
            Field::new("lat", DataType::Float64, false),
            Field::new("lon", DataType::Float64, false),
            Field::new("TREFHT", DataType::Float32, true),
        ]));
        let batch = RecordBatch::try_new(
            schema.clone(),
            vec![
                Arc::new(StringArray::from(vec!["1980-01-01 00:00:00", "1980-01-01 00:00:00", "1980-07-01"])),
                Arc::new(Float64Array::from(vec![40.0, 40.0, 40.0])),
                Arc::new(Float64Array::from(vec![250.0, 255.0, 250.0])),
                Arc::new(Float32Array::from(vec![Some(280.5), None, Some(300.0)])),
            ],
        )
        .unwrap();
        let file = std::fs::File::create(&path).unwrap();
        let mut writer = ArrowWriter::try_new(file, schema, None).unwrap();
        writer.write(&batch).unwrap();
        writer.close().unwrap();

        let series = load_series(&path, "TREFHT").unwrap();
        assert_eq!(series.values.dim(), (2, 1, 2));
        assert_eq!(series.values[[0, 0, 0]], 280.5);
        assert!(series.values[[0, 0, 1]].is_nan());
        assert_eq!(series.values[[1, 0, 0]], 300.0);
    }

    #[test]
    fn field_without_time_column() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("landfrac.csv");
        std::fs::write(&path, "lat,lon,LANDFRAC\n30,200,1.0\n30,190,0.0\n").unwrap();
        let field = load_field(&path, "LANDFRAC").unwrap();
        assert_eq!(field.lon, vec![190.0, 200.0]);
        assert_eq!(field.values[[0, 0]], 0.0);
        assert_eq!(field.values[[0, 1]], 1.0);
    }

    #[test]
    fn unknown_extension_is_rejected() {
        let err = load_series(Path::new("data.grib"), "x").unwrap_err();
        assert!(matches!(
            err.downcast_ref::<DataError>(),
            Some(DataError::UnsupportedExtension(ext)) if ext == "grib"
        ));
    }

    #[cfg(not(feature = "netcdf"))]
    #[test]
    fn netcdf_requires_feature() {
        let err = load_series(Path::new("wetbulb.nc"), "x").unwrap_err();
        assert!(matches!(
            err.downcast_ref::<DataError>(),
            Some(DataError::FeatureDisabled("netcdf"))
        ));
    }
}
