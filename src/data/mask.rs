use ndarray::Array2;

use super::error::DataError;
use super::model::{GridField, ensure_same_grid};
use super::select::{Region, label_slice};

/// Land fraction at or above which a cell counts as land.
pub const DEFAULT_LAND_THRESHOLD: f64 = 0.5;

// ---------------------------------------------------------------------------
// LandMask – land / ocean classification of the data grid
// ---------------------------------------------------------------------------

/// Boolean land/ocean grid. Drives the ocean mask and coastlines on maps.
#[derive(Debug, Clone, PartialEq)]
pub struct LandMask {
    pub lat: Vec<f64>,
    pub lon: Vec<f64>,
    /// `true` for land, shape `(lat.len(), lon.len())`.
    pub land: Array2<bool>,
}

impl LandMask {
    /// Classify a land-fraction field. Missing fractions count as ocean.
    pub fn from_fraction(field: &GridField, threshold: f64) -> Self {
        LandMask {
            lat: field.lat.clone(),
            lon: field.lon.clone(),
            land: field.values.mapv(|f| f >= threshold),
        }
    }

    pub fn is_land(&self, j: usize, i: usize) -> bool {
        self.land.get((j, i)).copied().unwrap_or(false)
    }

    pub fn land_fraction(&self) -> f64 {
        if self.land.is_empty() {
            return 0.0;
        }
        self.land.iter().filter(|&&l| l).count() as f64 / self.land.len() as f64
    }

    /// Cut the mask down to the same region as the data.
    pub fn select_region(&self, region: &Region) -> Result<LandMask, DataError> {
        let lat_idx = label_slice(&self.lat, region.lat_min, region.lat_max);
        let lon_idx = label_slice(&self.lon, region.lon_min, region.lon_max);
        if lat_idx.is_empty() || lon_idx.is_empty() {
            return Err(DataError::EmptySelection("land mask outside region".to_string()));
        }
        Ok(LandMask {
            lat: lat_idx.iter().map(|&j| self.lat[j]).collect(),
            lon: lon_idx.iter().map(|&i| self.lon[i]).collect(),
            land: Array2::from_shape_fn((lat_idx.len(), lon_idx.len()), |(j, i)| {
                self.land[[lat_idx[j], lon_idx[i]]]
            }),
        })
    }

    pub fn ensure_grid(&self, lat: &[f64], lon: &[f64]) -> Result<(), DataError> {
        ensure_same_grid(("land mask", &self.lat, &self.lon), ("data", lat, lon))
    }
}
