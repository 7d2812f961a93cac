use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use arrow::array::{ArrayRef, Float64Array, StringArray};
use arrow::datatypes::{Field, Schema};
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;

const LATS: std::ops::RangeInclusive<i32> = 0..=12; // 24°N + 4° steps
const LONS: std::ops::RangeInclusive<i32> = 0..=26; // 190°E + 4° steps
const FIRST_YEAR: i32 = 1970;
const LAST_YEAR: i32 = 2085;

/// Minimal deterministic PRNG (xoshiro256**)
struct SimpleRng {
    state: [u64; 4],
}

impl SimpleRng {
    fn new(seed: u64) -> Self {
        let mut s = [0u64; 4];
        let mut x = seed;
        for slot in &mut s {
            x = x.wrapping_mul(6364136223846793005).wrapping_add(1);
            *slot = x;
        }
        SimpleRng { state: s }
    }

    fn next_u64(&mut self) -> u64 {
        let result = (self.state[1].wrapping_mul(5)).rotate_left(7).wrapping_mul(9);
        let t = self.state[1] << 17;
        self.state[2] ^= self.state[0];
        self.state[3] ^= self.state[1];
        self.state[1] ^= self.state[2];
        self.state[0] ^= self.state[3];
        self.state[2] ^= t;
        self.state[3] = self.state[3].rotate_left(45);
        result
    }

    fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    /// Box-Muller transform for normal distribution
    fn gauss(&mut self, mean: f64, std_dev: f64) -> f64 {
        let u1 = self.next_f64().max(1e-15);
        let u2 = self.next_f64();
        let z = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
        mean + std_dev * z
    }
}

fn grid() -> Vec<(f64, f64)> {
    LATS.flat_map(|j| LONS.map(move |i| (24.0 + 4.0 * j as f64, 190.0 + 4.0 * i as f64)))
        .collect()
}

/// Rough land/ocean split: the Pacific west of ~125°W and the Atlantic
/// south-east of a diagonal through the Gulf of Maine are ocean.
fn land_fraction(lat: f64, lon: f64) -> f64 {
    let west = 360.0 - lon;
    let pacific = west > 125.0 + (lat - 30.0).max(0.0) * 0.8;
    let atlantic = west < 80.0 - (lat - 30.0) * 0.6;
    let gulf = lat < 29.0 && (80.0..98.0).contains(&west);
    if pacific || atlantic || gulf { 0.0 } else { 1.0 }
}

/// Dry-bulb climate in degC: colder to the north, stronger seasonal cycle
/// inland and further north, warming faster after 2000.
fn drybulb(lat: f64, land: f64, year: i32, month: u32) -> f64 {
    let phase = 2.0 * std::f64::consts::PI * (month as f64 - 7.0) / 12.0;
    let amplitude = 6.0 + 0.25 * (lat - 24.0) * (0.5 + 0.5 * land);
    let years = (year - FIRST_YEAR) as f64;
    let trend = 0.015 * years + 0.02 * (year - 2000).max(0) as f64;
    28.0 - 0.6 * (lat - 24.0) + amplitude * phase.cos() + trend
}

/// Wet-bulb depression shrinks over the ocean and in winter.
fn depression(lat: f64, land: f64, month: u32) -> f64 {
    let summer = (2.0 * std::f64::consts::PI * (month as f64 - 7.0) / 12.0).cos().max(0.0);
    (1.5 + 4.0 * land * summer) * (1.0 - (lat - 24.0) / 120.0)
}

fn f64s(values: Vec<f64>) -> ArrayRef {
    Arc::new(Float64Array::from(values))
}

fn write_parquet(path: &Path, columns: Vec<(&str, ArrayRef)>) -> Result<()> {
    let schema = Arc::new(Schema::new(
        columns
            .iter()
            .map(|(name, array)| Field::new(*name, array.data_type().clone(), false))
            .collect::<Vec<_>>(),
    ));
    let batch = RecordBatch::try_new(schema.clone(), columns.into_iter().map(|(_, a)| a).collect())
        .context("building record batch")?;

    let file = std::fs::File::create(path).with_context(|| format!("creating {}", path.display()))?;
    let mut writer = ArrowWriter::try_new(file, schema, None)?;
    writer.write(&batch)?;
    writer.close()?;
    Ok(())
}

fn main() -> Result<()> {
    let mut rng = SimpleRng::new(42);
    let cells = grid();

    let mut times = Vec::new();
    let mut lats = Vec::new();
    let mut lons = Vec::new();
    let mut wet = Vec::new();
    let mut dry_kelvin = Vec::new();

    for year in FIRST_YEAR..=LAST_YEAR {
        for month in 1..=12u32 {
            let stamp = format!("{year}-{month:02}-15 00:00:00");
            // One anomaly per month shared by the whole domain, plus local noise.
            let weather = rng.gauss(0.0, 1.2);
            for &(lat, lon) in &cells {
                let land = land_fraction(lat, lon);
                let dry = drybulb(lat, land, year, month) + weather + rng.gauss(0.0, 0.4);
                let wb = dry - depression(lat, land, month) + rng.gauss(0.0, 0.2);
                times.push(stamp.clone());
                lats.push(lat);
                lons.push(lon);
                dry_kelvin.push(dry + 273.15);
                wet.push(wb);
            }
        }
    }
    let n_rows = times.len();

    let time: ArrayRef = Arc::new(StringArray::from(times));
    let lat = f64s(lats);
    let lon = f64s(lons);

    write_parquet(
        Path::new("sample_wetbulb.parquet"),
        vec![
            ("time", time.clone()),
            ("lat", lat.clone()),
            ("lon", lon.clone()),
            ("__xarray_dataarray_variable__", f64s(wet)),
        ],
    )?;
    write_parquet(
        Path::new("sample_drybulb.parquet"),
        vec![
            ("time", time),
            ("lat", lat),
            ("lon", lon),
            ("TREFHT", f64s(dry_kelvin)),
        ],
    )?;

    let (mask_lat, mask_lon): (Vec<f64>, Vec<f64>) = cells.iter().copied().unzip();
    let fraction: Vec<f64> = cells.iter().map(|&(lat, lon)| land_fraction(lat, lon)).collect();
    write_parquet(
        Path::new("sample_landfrac.parquet"),
        vec![
            ("lat", f64s(mask_lat)),
            ("lon", f64s(mask_lon)),
            ("LANDFRAC", f64s(fraction)),
        ],
    )?;

    let config = serde_json::json!({
        "wetbulb": { "path": "sample_wetbulb.parquet", "variable": "__xarray_dataarray_variable__" },
        "drybulb": { "path": "sample_drybulb.parquet", "variable": "TREFHT", "offset": -273.15 },
        "land_mask": { "path": "sample_landfrac.parquet" },
        "seasonal_title": format!(
            "Average Seasonal Wetbulb and Drybulb Temperature over North America ({FIRST_YEAR}-{LAST_YEAR})"
        ),
        "figure": { "width_in": 14.0, "height_in": 12.0, "dpi": 100.0 },
        "output_dir": "figures"
    });
    std::fs::write("sample_config.json", serde_json::to_string_pretty(&config)?)
        .context("writing sample_config.json")?;

    println!(
        "Wrote {n_rows} rows ({} cells × {} months) to sample_wetbulb.parquet / sample_drybulb.parquet, \
         land mask to sample_landfrac.parquet, config to sample_config.json",
        cells.len(),
        (LAST_YEAR - FIRST_YEAR + 1) * 12
    );
    Ok(())
}
