use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use ndarray::{Array2, Array3, Zip};
use serde::{Deserialize, Serialize};

use super::error::DataError;
use super::time::CfDate;

/// Coordinates closer than this are considered the same grid point.
pub const COORD_TOLERANCE: f64 = 1e-6;

// ---------------------------------------------------------------------------
// Season – meteorological season of a calendar month
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Season {
    #[serde(rename = "DJF")]
    Djf,
    #[serde(rename = "MAM")]
    Mam,
    #[serde(rename = "JJA")]
    Jja,
    #[serde(rename = "SON")]
    Son,
}

impl Season {
    pub const ALL: [Season; 4] = [Season::Djf, Season::Mam, Season::Jja, Season::Son];

    /// December is grouped with January and February of the same year.
    pub fn from_month(month: u32) -> Season {
        match month {
            12 | 1 | 2 => Season::Djf,
            3..=5 => Season::Mam,
            6..=8 => Season::Jja,
            _ => Season::Son,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Season::Djf => "DJF",
            Season::Mam => "MAM",
            Season::Jja => "JJA",
            Season::Son => "SON",
        }
    }
}

impl fmt::Display for Season {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Season {
    type Err = DataError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Season::ALL
            .into_iter()
            .find(|season| season.label().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| DataError::InvalidSeason(s.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Grid comparison helpers
// ---------------------------------------------------------------------------

fn same_coords(a: &[f64], b: &[f64]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| (x - y).abs() <= COORD_TOLERANCE)
}

/// Fail with [`DataError::GridMismatch`] unless both lat/lon axes agree.
pub fn ensure_same_grid(
    left: (&str, &[f64], &[f64]),
    right: (&str, &[f64], &[f64]),
) -> Result<(), DataError> {
    let (left_name, left_lat, left_lon) = left;
    let (right_name, right_lat, right_lon) = right;
    let detail = if !same_coords(left_lat, right_lat) {
        format!("lat {} vs {} points", left_lat.len(), right_lat.len())
    } else if !same_coords(left_lon, right_lon) {
        format!("lon {} vs {} points", left_lon.len(), right_lon.len())
    } else {
        return Ok(());
    };
    Err(DataError::GridMismatch {
        left: left_name.to_string(),
        right: right_name.to_string(),
        detail,
    })
}

// ---------------------------------------------------------------------------
// GriddedSeries – (time, lat, lon) field
// ---------------------------------------------------------------------------

/// One scalar variable on a regular lat/lon grid over time. Missing values
/// are `NaN`.
#[derive(Debug, Clone)]
pub struct GriddedSeries {
    pub name: String,
    pub units: String,
    pub times: Vec<CfDate>,
    pub lat: Vec<f64>,
    pub lon: Vec<f64>,
    /// Shape `(times.len(), lat.len(), lon.len())`.
    pub values: Array3<f64>,
}

impl GriddedSeries {
    pub fn new(
        name: impl Into<String>,
        units: impl Into<String>,
        times: Vec<CfDate>,
        lat: Vec<f64>,
        lon: Vec<f64>,
        values: Array3<f64>,
    ) -> Result<Self, DataError> {
        let name = name.into();
        let expected = (times.len(), lat.len(), lon.len());
        if values.dim() != expected {
            return Err(DataError::BadShape {
                detail: format!("values are {:?}, coordinates imply {expected:?}", values.dim()),
                name,
            });
        }
        Ok(GriddedSeries {
            name,
            units: units.into(),
            times,
            lat,
            lon,
            values,
        })
    }

    pub fn len(&self) -> usize {
        self.times.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    /// Earliest time step; NetCDF time axes are not guaranteed sorted.
    pub fn first_time(&self) -> Option<CfDate> {
        self.times.iter().min().copied()
    }

    pub fn last_time(&self) -> Option<CfDate> {
        self.times.iter().max().copied()
    }

    /// Rename the variable (e.g. `__xarray_dataarray_variable__` → `wetbulb`).
    pub fn renamed(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Add a constant to every value and relabel the units.
    pub fn offset(mut self, delta: f64, units: impl Into<String>) -> Self {
        if delta != 0.0 {
            self.values.mapv_inplace(|v| v + delta);
        }
        self.units = units.into();
        self
    }

    pub fn ensure_same_grid(&self, other: &GriddedSeries) -> Result<(), DataError> {
        ensure_same_grid(
            (&self.name, &self.lat, &self.lon),
            (&other.name, &other.lat, &other.lon),
        )
    }
}

// ---------------------------------------------------------------------------
// GridField – a single lat × lon slab
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct GridField {
    pub lat: Vec<f64>,
    pub lon: Vec<f64>,
    /// Shape `(lat.len(), lon.len())`.
    pub values: Array2<f64>,
}

// ---------------------------------------------------------------------------
// SeasonalMeans – one lat × lon field per season
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct SeasonalMeans {
    pub name: String,
    pub lat: Vec<f64>,
    pub lon: Vec<f64>,
    pub by_season: BTreeMap<Season, Array2<f64>>,
}

impl SeasonalMeans {
    pub fn seasons(&self) -> impl Iterator<Item = Season> + '_ {
        self.by_season.keys().copied()
    }

    pub fn get(&self, season: Season) -> Result<GridField, DataError> {
        let values = self
            .by_season
            .get(&season)
            .ok_or(DataError::MissingSeason(season))?;
        Ok(GridField {
            lat: self.lat.clone(),
            lon: self.lon.clone(),
            values: values.clone(),
        })
    }

    /// `self - other`, keeping only seasons present in both.
    pub fn subtract(&self, other: &SeasonalMeans, name: impl Into<String>) -> Result<SeasonalMeans, DataError> {
        ensure_same_grid(
            (&self.name, &self.lat, &self.lon),
            (&other.name, &other.lat, &other.lon),
        )?;
        let by_season = self
            .by_season
            .iter()
            .filter_map(|(season, a)| {
                let b = other.by_season.get(season)?;
                let mut diff = a.clone();
                Zip::from(&mut diff).and(b).for_each(|d, &b| *d -= b);
                Some((*season, diff))
            })
            .collect();
        Ok(SeasonalMeans {
            name: name.into(),
            lat: self.lat.clone(),
            lon: self.lon.clone(),
            by_season,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
