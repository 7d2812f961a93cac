use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail, ensure};
use serde::{Deserialize, Serialize};

use crate::climatology::Period;
use crate::data::mask::DEFAULT_LAND_THRESHOLD;
use crate::data::model::Season;
use crate::data::select::Region;
use crate::data::time::CfDate;

// ---------------------------------------------------------------------------
// Input descriptions
// ---------------------------------------------------------------------------

/// Where a variable lives and how to bring it to degC.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputSpec {
    pub path: PathBuf,
    pub variable: String,
    /// Added to every value after loading.
    #[serde(default)]
    pub offset: f64,
    #[serde(default = "default_units")]
    pub units: String,
}

fn default_units() -> String {
    "degC".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LandMaskSpec {
    pub path: PathBuf,
    #[serde(default = "default_land_variable")]
    pub variable: String,
    #[serde(default = "default_land_threshold")]
    pub threshold: f64,
}

fn default_land_variable() -> String {
    "LANDFRAC".to_string()
}

fn default_land_threshold() -> f64 {
    DEFAULT_LAND_THRESHOLD
}

impl LandMaskSpec {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        LandMaskSpec {
            path: path.into(),
            variable: default_land_variable(),
            threshold: default_land_threshold(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FigureSize {
    pub width_in: f64,
    pub height_in: f64,
    pub dpi: f64,
}

impl Default for FigureSize {
    fn default() -> Self {
        FigureSize {
            width_in: 14.0,
            height_in: 12.0,
            dpi: 300.0,
        }
    }
}

impl FigureSize {
    pub fn pixels(&self) -> (u32, u32) {
        (
            (self.width_in * self.dpi).round().max(1.0) as u32,
            (self.height_in * self.dpi).round().max(1.0) as u32,
        )
    }
}

// ---------------------------------------------------------------------------
// AnalysisConfig
// ---------------------------------------------------------------------------

/// Everything the two figures need. Defaults reproduce the CESM Large
/// Ensemble single-member analysis over North America; a JSON file only
/// has to name the fields it changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub wetbulb: InputSpec,
    pub drybulb: InputSpec,
    pub land_mask: Option<LandMaskSpec>,
    pub region: Region,
    /// Map extent `[lon_min, lon_max, lat_min, lat_max]` in degrees east/north.
    pub extent: [f64; 4],
    pub reference_period: Option<(String, String)>,
    pub drop_reference_period: bool,
    pub periods: Vec<(String, String)>,
    pub time_slice_season: Season,
    pub figure: FigureSize,
    pub output_dir: PathBuf,
    pub seasonal_output: PathBuf,
    pub time_slice_output: PathBuf,
    pub seasonal_title: String,
}

pub const DEFAULT_EXTENT: [f64; 4] = [-170.0, -65.0, 23.08900524, 71.15183246];

impl Default for AnalysisConfig {
    fn default() -> Self {
        let period = |year: i32| {
            (
                format!("{year}-01-01 00:00:00"),
                format!("{}-01-01 00:00:00", year + 1),
            )
        };
        AnalysisConfig {
            wetbulb: InputSpec {
                path: PathBuf::from("b.e11.BRCP85C5CNBDRD.f09_g16.001.cam.h1.WETBULB.19200101-21001231.nc"),
                variable: "__xarray_dataarray_variable__".to_string(),
                offset: 0.0,
                units: default_units(),
            },
            drybulb: InputSpec {
                path: PathBuf::from("b.e11.B20TRC5-BRCP85C5CNBDRD.f09_g16.001.cam.h1.TREFHT.19200101-21001231.nc"),
                variable: "TREFHT".to_string(),
                offset: -273.15,
                units: default_units(),
            },
            land_mask: None,
            region: Region::NORTH_AMERICA,
            extent: DEFAULT_EXTENT,
            reference_period: Some((
                "1980-01-01 00:00:00".to_string(),
                "2000-01-01 00:00:00".to_string(),
            )),
            drop_reference_period: true,
            periods: [2020, 2030, 2050, 2080].into_iter().map(period).collect(),
            time_slice_season: Season::Djf,
            figure: FigureSize::default(),
            output_dir: PathBuf::from("."),
            seasonal_output: PathBuf::from("seasonal-comparison-wetbulb.png"),
            time_slice_output: PathBuf::from("winter-comparison-wetbulb.png"),
            seasonal_title: "Average Seasonal Wetbulb and Drybulb Temperature over North America (1920-2100)"
                .to_string(),
        }
    }
}

/// A labelled time-slice row.
#[derive(Debug, Clone, PartialEq)]
pub struct LabelledPeriod {
    pub label: String,
    pub period: Period,
}

impl AnalysisConfig {
    /// Read a (possibly partial) JSON config.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let config: AnalysisConfig =
            serde_json::from_str(&text).with_context(|| format!("parsing config {}", path.display()))?;
        log::info!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Check ranges and parse every date string.
    pub fn validate(&self) -> Result<()> {
        ensure!(
            self.figure.dpi > 0.0 && self.figure.width_in > 0.0 && self.figure.height_in > 0.0,
            "figure size and dpi must be positive"
        );
        let r = &self.region;
        ensure!(
            [r.lat_min, r.lat_max, r.lon_min, r.lon_max].iter().all(|v| v.is_finite()),
            "region bounds must be finite"
        );
        let [lon0, lon1, lat0, lat1] = self.extent;
        ensure!(lon0 < lon1 && lat0 < lat1, "extent must be [lon_min, lon_max, lat_min, lat_max]");
        self.reference()?;
        self.time_slices()?;
        Ok(())
    }

    pub fn reference(&self) -> Result<Option<Period>> {
        self.reference_period
            .as_ref()
            .map(|(start, end)| parse_period(start, end).context("reference_period"))
            .transpose()
    }

    /// Time-slice rows, each labelled with the first four characters of its
    /// start (the year).
    pub fn time_slices(&self) -> Result<Vec<LabelledPeriod>> {
        self.periods
            .iter()
            .map(|(start, end)| {
                let period = parse_period(start, end).context("periods")?;
                let label: String = start.trim().chars().take(4).collect();
                Ok(LabelledPeriod { label, period })
            })
            .collect()
    }

    pub fn output_path(&self, file: &Path) -> PathBuf {
        if file.is_absolute() {
            file.to_path_buf()
        } else {
            self.output_dir.join(file)
        }
    }
}

fn parse_period(start: &str, end: &str) -> Result<Period> {
    let start_date = CfDate::parse(start)?;
    let end_date = CfDate::parse(end)?;
    if start_date > end_date {
        bail!("period starts after it ends: {start} > {end}");
    }
    Ok(Period::new(start_date, end_date))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_north_america_analysis() {
        let config = AnalysisConfig::default();
        config.validate().unwrap();
        assert_eq!(config.drybulb.variable, "TREFHT");
        assert_eq!(config.drybulb.offset, -273.15);
        assert_eq!(config.region, Region::NORTH_AMERICA);
        assert_eq!(config.figure.pixels(), (4200, 3600));

        let reference = config.reference().unwrap().unwrap();
        assert_eq!(reference.start, CfDate::ymd(1980, 1, 1));
        assert_eq!(reference.end, CfDate::ymd(2000, 1, 1));

        let slices = config.time_slices().unwrap();
        let labels: Vec<&str> = slices.iter().map(|s| s.label.as_str()).collect();
        assert_eq!(labels, vec!["2020", "2030", "2050", "2080"]);
        assert_eq!(slices[3].period.end, CfDate::ymd(2081, 1, 1));
    }

    #[test]
    fn partial_json_overrides_only_named_fields() {
        let json = r#"{
            "wetbulb": { "path": "wb.parquet", "variable": "wb" },
            "reference_period": null,
            "time_slice_season": "JJA",
            "figure": { "width_in": 7, "height_in": 6, "dpi": 50 }
        }"#;
        let config: AnalysisConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.wetbulb.path, PathBuf::from("wb.parquet"));
        assert_eq!(config.wetbulb.offset, 0.0);
        assert_eq!(config.wetbulb.units, "degC");
        assert_eq!(config.drybulb.variable, "TREFHT");
        assert!(config.reference().unwrap().is_none());
        assert_eq!(config.time_slice_season, Season::Jja);
        assert_eq!(config.figure.pixels(), (350, 300));
        assert_eq!(config.periods.len(), 4);
    }

    #[test]
    fn nested_partial_json_keeps_remaining_defaults() {
        let config: AnalysisConfig = serde_json::from_str(r#"{ "figure": { "dpi": 150 } }"#).unwrap();
        assert_eq!(config.figure.width_in, 14.0);
        assert_eq!(config.figure.height_in, 12.0);
        assert_eq!(config.figure.pixels(), (2100, 1800));

        let config: AnalysisConfig = serde_json::from_str(r#"{ "region": { "lat_min": 20 } }"#).unwrap();
        assert_eq!(config.region.lat_min, 20.0);
        assert_eq!(config.region.lat_max, Region::NORTH_AMERICA.lat_max);
        assert_eq!(config.region.lon_min, Region::NORTH_AMERICA.lon_min);
        assert_eq!(config.region.lon_max, Region::NORTH_AMERICA.lon_max);
        config.validate().unwrap();
    }

    #[test]
    fn validate_rejects_reversed_period() {
        let config = AnalysisConfig {
            periods: vec![("2031-01-01".to_string(), "2030-01-01".to_string())],
            ..AnalysisConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn relative_outputs_land_in_output_dir() {
        let config = AnalysisConfig {
            output_dir: PathBuf::from("figures"),
            ..AnalysisConfig::default()
        };
        assert_eq!(
            config.output_path(&config.seasonal_output),
            PathBuf::from("figures/seasonal-comparison-wetbulb.png")
        );
    }
}
