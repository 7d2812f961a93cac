use std::path::Path;

use anyhow::{Context, Result};

use crate::climatology::{Period, SeasonalAnomalies, climatology, period_anomalies, seasonal_averages};
use crate::color::{ColorScale, Colormap, Extend};
use crate::config::{FigureSize, LabelledPeriod};
use crate::data::error::DataError;
use crate::data::mask::LandMask;
use crate::data::model::{GriddedSeries, Season};
use crate::render::canvas::Orientation;
use crate::render::figure::{FigureRow, FigureSpec, render_figure};
use crate::render::map::MapExtent;

pub const COLUMN_TITLES: [&str; 3] = [
    "Drybulb Temperature",
    "Wetbulb Temperature",
    "Drybulb - Wetbulb Temperature",
];
pub const COLORBAR_LABEL: &str = "degC";

/// `(temperature, residual)` colour limits.
fn seasonal_limits(has_reference: bool) -> (f64, f64) {
    if has_reference { (10.0, 5.0) } else { (30.0, 15.0) }
}

fn time_slice_limits(has_reference: bool) -> (f64, f64) {
    if has_reference { (15.0, 5.0) } else { (40.0, 10.0) }
}

fn column_titles() -> [String; 3] {
    COLUMN_TITLES.map(str::to_string)
}

fn row(label: impl Into<String>, anomalies: &SeasonalAnomalies, season: Season) -> Result<FigureRow, DataError> {
    Ok(FigureRow {
        label: label.into(),
        drybulb: anomalies.drybulb.get(season)?,
        wetbulb: anomalies.wetbulb.get(season)?,
        residual: anomalies.residual.get(season)?,
    })
}

// ---------------------------------------------------------------------------
// Seasonal comparison
// ---------------------------------------------------------------------------

/// Four rows (DJF, MAM, JJA, SON) of drybulb, wetbulb and residual maps.
///
/// With a reference period the maps show anomalies against it (see
/// [`seasonal_averages`]); without one, the plain seasonal climatology.
pub fn seasonal_average_plot(
    drybulb: &GriddedSeries,
    wetbulb: &GriddedSeries,
    extent: MapExtent,
    reference: Option<&Period>,
    drop_reference_period: bool,
    title: &str,
    size: FigureSize,
) -> Result<FigureSpec, DataError> {
    let anomalies = match reference {
        Some(reference) => seasonal_averages(drybulb, wetbulb, reference, drop_reference_period)?,
        None => climatology(drybulb, wetbulb)?,
    };

    let rows = Season::ALL
        .iter()
        .map(|&season| row(season.label(), &anomalies, season))
        .collect::<Result<Vec<_>, _>>()?;

    let (temperature, residual) = seasonal_limits(reference.is_some());
    Ok(FigureSpec {
        title: title.to_string(),
        column_titles: column_titles(),
        rows,
        row_label_orientation: Orientation::Vertical,
        row_label_offset: 0.2,
        common_ylabel: Some("Season".to_string()),
        temperature_scale: ColorScale::symmetric(Colormap::Bwr, temperature, Extend::Both),
        residual_scale: ColorScale::symmetric(Colormap::Coolwarm, residual, Extend::Neither),
        colorbar_label: COLORBAR_LABEL.to_string(),
        extent,
        size,
    })
}

// ---------------------------------------------------------------------------
// Time slices
// ---------------------------------------------------------------------------

/// One row per period, each showing `season` only.
pub fn time_slice_plot(
    drybulb: &GriddedSeries,
    wetbulb: &GriddedSeries,
    season: Season,
    periods: &[LabelledPeriod],
    extent: MapExtent,
    reference: Option<&Period>,
    size: FigureSize,
) -> Result<FigureSpec, DataError> {
    let mut rows = Vec::with_capacity(periods.len());
    for labelled in periods {
        let anomalies = period_anomalies(drybulb, wetbulb, &labelled.period, reference)?;
        rows.push(row(labelled.label.clone(), &anomalies, season)?);
    }

    let (temperature, residual) = time_slice_limits(reference.is_some());
    Ok(FigureSpec {
        title: format!("Time evolution of {season} temperatures over NA"),
        column_titles: column_titles(),
        rows,
        row_label_orientation: Orientation::Horizontal,
        row_label_offset: 0.3,
        common_ylabel: None,
        temperature_scale: ColorScale::symmetric(Colormap::Bwr, temperature, Extend::Both),
        residual_scale: ColorScale::symmetric(Colormap::Coolwarm, residual, Extend::Both),
        colorbar_label: COLORBAR_LABEL.to_string(),
        extent,
        size,
    })
}

/// Render a figure and write it as PNG.
pub fn save_figure(spec: &FigureSpec, mask: Option<&LandMask>, path: &Path) -> Result<()> {
    log::info!("Drawing '{}' ({} rows)", spec.title, spec.rows.len());
    render_figure(spec, mask)
        .save_png(path)
        .with_context(|| format!("saving figure '{}'", spec.title))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_EXTENT;
    use crate::data::time::CfDate;
    use approx::assert_relative_eq;
    use ndarray::Array3;

    /// Monthly series 1975–2030 on a 2 × 3 grid, `base` plus `trend` per
    /// year since 1975.
    fn series(name: &str, base: f64, trend: f64) -> GriddedSeries {
        let times: Vec<CfDate> = (1975..2031)
            .flat_map(|y| (1..=12).map(move |m| CfDate::ymd(y, m, 1)))
            .collect();
        let values = Array3::from_shape_fn((times.len(), 2, 3), |(t, _, _)| {
            base + trend * (times[t].year - 1975) as f64
        });
        GriddedSeries::new(name, "degC", times, vec![30.0, 40.0], vec![240.0, 250.0, 260.0], values).unwrap()
    }

    fn small() -> FigureSize {
        FigureSize {
            width_in: 7.0,
            height_in: 6.0,
            dpi: 20.0,
        }
    }

    fn reference() -> Period {
        Period::new(CfDate::ymd(1980, 1, 1), CfDate::ymd(2000, 1, 1))
    }

    #[test]
    fn seasonal_plot_with_reference_uses_tight_limits() {
        let dry = series("drybulb", 10.0, 0.1);
        let wet = series("wetbulb", 5.0, 0.05);
        let extent = MapExtent::from_array(DEFAULT_EXTENT);
        let spec = seasonal_average_plot(&dry, &wet, extent, Some(&reference()), true, "t", small()).unwrap();

        let labels: Vec<&str> = spec.rows.iter().map(|r| r.label.as_str()).collect();
        assert_eq!(labels, vec!["DJF", "MAM", "JJA", "SON"]);
        assert_eq!(spec.temperature_scale.vmax, 10.0);
        assert_eq!(spec.residual_scale.vmax, 5.0);
        assert_eq!(spec.residual_scale.extend, Extend::Neither);
        assert_eq!(spec.common_ylabel.as_deref(), Some("Season"));

        // Anomalies are positive with a warming trend; residual = dry - wet.
        let row = &spec.rows[0];
        let dry_v = row.drybulb.values[[0, 0]];
        let wet_v = row.wetbulb.values[[0, 0]];
        assert!(dry_v > 0.0 && wet_v > 0.0);
        assert_relative_eq!(row.residual.values[[0, 0]], dry_v - wet_v, epsilon = 1e-9);
    }

    #[test]
    fn seasonal_plot_without_reference_is_a_climatology() {
        let dry = series("drybulb", 10.0, 0.0);
        let wet = series("wetbulb", 4.0, 0.0);
        let extent = MapExtent::from_array(DEFAULT_EXTENT);
        let spec = seasonal_average_plot(&dry, &wet, extent, None, true, "t", small()).unwrap();
        assert_eq!(spec.temperature_scale.vmin, -30.0);
        assert_eq!(spec.residual_scale.vmax, 15.0);
        assert_relative_eq!(spec.rows[2].drybulb.values[[1, 2]], 10.0);
        assert_relative_eq!(spec.rows[2].residual.values[[1, 2]], 6.0);
    }

    #[test]
    fn time_slice_rows_follow_periods() {
        let dry = series("drybulb", 0.0, 1.0);
        let wet = series("wetbulb", 0.0, 0.5);
        let periods = vec![
            LabelledPeriod {
                label: "2020".to_string(),
                period: Period::new(CfDate::ymd(2020, 1, 1), CfDate::ymd(2021, 1, 1)),
            },
            LabelledPeriod {
                label: "2030".to_string(),
                period: Period::new(CfDate::ymd(2030, 1, 1), CfDate::ymd(2031, 1, 1)),
            },
        ];
        let extent = MapExtent::from_array(DEFAULT_EXTENT);
        let spec = time_slice_plot(&dry, &wet, Season::Jja, &periods, extent, None, small()).unwrap();

        assert_eq!(spec.title, "Time evolution of JJA temperatures over NA");
        assert_eq!(spec.rows.len(), 2);
        assert_eq!(spec.temperature_scale.vmax, 40.0);
        assert_eq!(spec.residual_scale.extend, Extend::Both);
        assert_eq!(spec.row_label_orientation, Orientation::Horizontal);
        // JJA of 2020 only: 45 for drybulb, 22.5 for wetbulb.
        assert_relative_eq!(spec.rows[0].drybulb.values[[0, 0]], 45.0);
        assert_relative_eq!(spec.rows[0].wetbulb.values[[0, 0]], 22.5);
        assert_relative_eq!(spec.rows[1].residual.values[[0, 0]], 27.5);

        let with_ref = time_slice_plot(&dry, &wet, Season::Jja, &periods, extent, Some(&reference()), small()).unwrap();
        assert_eq!(with_ref.temperature_scale.vmax, 15.0);
        assert_eq!(with_ref.residual_scale.vmax, 5.0);
    }

    #[test]
    fn period_without_data_reports_missing_season() {
        let dry = series("drybulb", 0.0, 0.0);
        let wet = series("wetbulb", 0.0, 0.0);
        let periods = vec![LabelledPeriod {
            label: "2080".to_string(),
            period: Period::new(CfDate::ymd(2080, 1, 1), CfDate::ymd(2081, 1, 1)),
        }];
        let extent = MapExtent::from_array(DEFAULT_EXTENT);
        let err = time_slice_plot(&dry, &wet, Season::Djf, &periods, extent, None, small()).unwrap_err();
        assert!(matches!(err, DataError::MissingSeason(Season::Djf)));
    }

    #[test]
    fn save_figure_writes_png() {
        let dir = tempfile::tempdir().unwrap();
        let dry = series("drybulb", 10.0, 0.1);
        let wet = series("wetbulb", 5.0, 0.05);
        let extent = MapExtent::from_array(DEFAULT_EXTENT);
        let spec = seasonal_average_plot(&dry, &wet, extent, Some(&reference()), true, "t", small()).unwrap();
        let path = dir.path().join("out/seasonal.png");
        save_figure(&spec, None, &path).unwrap();
        let png = image::open(&path).unwrap();
        assert_eq!((png.width(), png.height()), (140, 120));
    }
}
