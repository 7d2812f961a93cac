use anyhow::{Context, Result};

use crate::config::{AnalysisConfig, LandMaskSpec};
use crate::data::loader::{init_data, load_field};
use crate::data::mask::LandMask;
use crate::data::model::GriddedSeries;
use crate::data::select::{Region, select_grid};

// ---------------------------------------------------------------------------
// Analysis inputs
// ---------------------------------------------------------------------------

/// Both temperature series cut to the analysis region, plus the land mask
/// on the same grid when one is configured.
#[derive(Debug, Clone)]
pub struct AnalysisInputs {
    pub wetbulb: GriddedSeries,
    pub drybulb: GriddedSeries,
    pub land_mask: Option<LandMask>,
}

impl AnalysisInputs {
    /// Load, rename and unit-convert both series, then subset them (and the
    /// mask) to the configured region.
    pub fn load(config: &AnalysisConfig) -> Result<Self> {
        let (wetbulb, drybulb) = init_data(&config.wetbulb, &config.drybulb)?;
        let (wetbulb, drybulb) = select_grid(&wetbulb, &drybulb, &config.region).context("selecting region")?;
        log::info!("{} wetbulb and {} drybulb time steps", wetbulb.len(), drybulb.len());

        let land_mask = match &config.land_mask {
            Some(spec) => Some(load_mask(spec, &config.region, &wetbulb)?),
            None => {
                log::warn!("No land mask configured; maps are drawn without ocean mask or coastlines");
                None
            }
        };

        Ok(AnalysisInputs {
            wetbulb,
            drybulb,
            land_mask,
        })
    }
}

fn load_mask(spec: &LandMaskSpec, region: &Region, grid: &GriddedSeries) -> Result<LandMask> {
    let field = load_field(&spec.path, &spec.variable)
        .with_context(|| format!("loading land mask from {}", spec.path.display()))?;
    let mask = LandMask::from_fraction(&field, spec.threshold).select_region(region)?;
    mask.ensure_grid(&grid.lat, &grid.lon)?;
    log::info!(
        "Land mask '{}': {:.0}% land at threshold {}",
        spec.variable,
        mask.land_fraction() * 100.0,
        spec.threshold
    );
    Ok(mask)
}
