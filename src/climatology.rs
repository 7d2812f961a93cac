use std::collections::{BTreeMap, HashMap};

use ndarray::{Array2, ArrayView2, Axis, Zip};

use crate::data::error::DataError;
use crate::data::model::{GriddedSeries, Season, SeasonalMeans};
use crate::data::select::{select_from, select_time};
use crate::data::time::CfDate;

// ---------------------------------------------------------------------------
// Periods
// ---------------------------------------------------------------------------

/// Inclusive time window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Period {
    pub start: CfDate,
    pub end: CfDate,
}

impl Period {
    pub fn new(start: CfDate, end: CfDate) -> Self {
        Period { start, end }
    }
}

/// Drybulb, wetbulb and residual fields that are plotted together.
#[derive(Debug, Clone)]
pub struct SeasonalAnomalies {
    pub drybulb: SeasonalMeans,
    pub wetbulb: SeasonalMeans,
    pub residual: SeasonalMeans,
}

// ---------------------------------------------------------------------------
// Seasonal means
// ---------------------------------------------------------------------------

/// NaN-skipping mean over all time steps of each season present in the
/// series. Cells without a single valid sample stay `NaN`.
pub fn seasonal_mean(series: &GriddedSeries) -> SeasonalMeans {
    let (_, n_lat, n_lon) = series.values.dim();
    let mut sums: BTreeMap<Season, (Array2<f64>, Array2<u32>)> = BTreeMap::new();

    for (t, slab) in series.values.axis_iter(Axis(0)).enumerate() {
        let season = Season::from_month(series.times[t].month);
        let (sum, count) = sums
            .entry(season)
            .or_insert_with(|| (Array2::zeros((n_lat, n_lon)), Array2::zeros((n_lat, n_lon))));
        accumulate(sum, count, slab);
    }

    let by_season = sums
        .into_iter()
        .map(|(season, (sum, count))| {
            let mean = Zip::from(&sum)
                .and(&count)
                .map_collect(|&s, &n| if n == 0 { f64::NAN } else { s / n as f64 });
            (season, mean)
        })
        .collect();

    SeasonalMeans {
        name: series.name.clone(),
        lat: series.lat.clone(),
        lon: series.lon.clone(),
        by_season,
    }
}

fn accumulate(sum: &mut Array2<f64>, count: &mut Array2<u32>, slab: ArrayView2<f64>) {
    Zip::from(sum).and(count).and(slab).for_each(|s, n, &v| {
        if !v.is_nan() {
            *s += v;
            *n += 1;
        }
    });
}

/// Seasonal mean over the reference window only.
pub fn reference_period_seasonal_mean(series: &GriddedSeries, reference: &Period) -> SeasonalMeans {
    seasonal_mean(&select_time(series, reference.start, reference.end))
}

// ---------------------------------------------------------------------------
// Residual (drybulb − wetbulb)
// ---------------------------------------------------------------------------

/// Elementwise `drybulb - wetbulb` over the time steps both series share.
pub fn residual(drybulb: &GriddedSeries, wetbulb: &GriddedSeries) -> Result<GriddedSeries, DataError> {
    drybulb.ensure_same_grid(wetbulb)?;

    let wet_index: HashMap<CfDate, usize> = wetbulb.times.iter().enumerate().map(|(i, &t)| (t, i)).collect();
    let pairs: Vec<(usize, usize)> = drybulb
        .times
        .iter()
        .enumerate()
        .filter_map(|(i, t)| wet_index.get(t).map(|&k| (i, k)))
        .collect();
    if pairs.len() < drybulb.len() || pairs.len() < wetbulb.len() {
        log::debug!(
            "residual: {} shared time steps (drybulb {}, wetbulb {})",
            pairs.len(),
            drybulb.len(),
            wetbulb.len()
        );
    }

    let dry_idx: Vec<usize> = pairs.iter().map(|p| p.0).collect();
    let wet_idx: Vec<usize> = pairs.iter().map(|p| p.1).collect();
    let values = &drybulb.values.select(Axis(0), &dry_idx) - &wetbulb.values.select(Axis(0), &wet_idx);

    GriddedSeries::new(
        "residual",
        drybulb.units.clone(),
        dry_idx.iter().map(|&i| drybulb.times[i]).collect(),
        drybulb.lat.clone(),
        drybulb.lon.clone(),
        values,
    )
}

fn residual_of(drybulb: &SeasonalMeans, wetbulb: &SeasonalMeans) -> Result<SeasonalMeans, DataError> {
    drybulb.subtract(wetbulb, "residual")
}

// ---------------------------------------------------------------------------
// Anomaly formulas
// ---------------------------------------------------------------------------

/// Seasonal anomalies relative to a reference period.
///
/// With `drop_reference_period` the anomaly is the seasonal mean from the
/// end of the reference period to the end of the data, minus the reference
/// mean. Without it, the seasonal mean of the whole record minus the
/// reference mean. The residual is always `drybulb - wetbulb` of the two
/// anomalies.
pub fn seasonal_averages(
    drybulb: &GriddedSeries,
    wetbulb: &GriddedSeries,
    reference: &Period,
    drop_reference_period: bool,
) -> Result<SeasonalAnomalies, DataError> {
    let dry_ref = reference_period_seasonal_mean(drybulb, reference);
    let wet_ref = reference_period_seasonal_mean(wetbulb, reference);

    let (dry_mean, wet_mean) = if drop_reference_period {
        (
            seasonal_mean(&select_from(drybulb, reference.end)),
            seasonal_mean(&select_from(wetbulb, reference.end)),
        )
    } else {
        (seasonal_mean(drybulb), seasonal_mean(wetbulb))
    };

    let drybulb = dry_mean.subtract(&dry_ref, "drybulb")?;
    let wetbulb = wet_mean.subtract(&wet_ref, "wetbulb")?;
    let residual = residual_of(&drybulb, &wetbulb)?;
    Ok(SeasonalAnomalies {
        drybulb,
        wetbulb,
        residual,
    })
}

/// Plain seasonal climatology without a reference period. The residual is
/// computed on the raw series before averaging.
pub fn climatology(drybulb: &GriddedSeries, wetbulb: &GriddedSeries) -> Result<SeasonalAnomalies, DataError> {
    let residual = seasonal_mean(&residual(drybulb, wetbulb)?);
    Ok(SeasonalAnomalies {
        drybulb: seasonal_mean(drybulb),
        wetbulb: seasonal_mean(wetbulb),
        residual,
    })
}

/// Seasonal means over `period`, minus the reference seasonal means when a
/// reference period is given.
pub fn period_anomalies(
    drybulb: &GriddedSeries,
    wetbulb: &GriddedSeries,
    period: &Period,
    reference: Option<&Period>,
) -> Result<SeasonalAnomalies, DataError> {
    let mut dry = seasonal_mean(&select_time(drybulb, period.start, period.end));
    let mut wet = seasonal_mean(&select_time(wetbulb, period.start, period.end));

    if let Some(reference) = reference {
        dry = dry.subtract(&reference_period_seasonal_mean(drybulb, reference), "drybulb")?;
        wet = wet.subtract(&reference_period_seasonal_mean(wetbulb, reference), "wetbulb")?;
    }

    let residual = residual_of(&dry, &wet)?;
    Ok(SeasonalAnomalies {
        drybulb: dry,
        wetbulb: wet,
        residual,
    })
}

// ---------------------------------------------------------------------------
// Domain statistics
// ---------------------------------------------------------------------------

/// Area-weighted (cos lat), NaN-skipping mean of a lat × lon field.
pub fn domain_mean(values: &Array2<f64>, lat: &[f64]) -> f64 {
    let mut weighted = 0.0;
    let mut total_weight = 0.0;
    for (row, &phi) in values.axis_iter(Axis(0)).zip(lat) {
        let w = phi.to_radians().cos().max(0.0);
        for &v in row.iter().filter(|v| !v.is_nan()) {
            weighted += w * v;
            total_weight += w;
        }
    }
    if total_weight == 0.0 {
        f64::NAN
    } else {
        weighted / total_weight
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::{Array3, array};

    /// Monthly series on a 1 × 2 grid: `before` up to and including
    /// `split`, `after` from the next month on.
    fn step_series(name: &str, years: std::ops::Range<i32>, split: CfDate, before: f64, after: f64) -> GriddedSeries {
        let times: Vec<CfDate> = years
            .flat_map(|y| (1..=12).map(move |m| CfDate::ymd(y, m, 1)))
            .collect();
        let values = Array3::from_shape_fn((times.len(), 1, 2), |(t, _, _)| {
            if times[t] <= split { before } else { after }
        });
        GriddedSeries::new(name, "degC", times, vec![40.0], vec![250.0, 260.0], values).unwrap()
    }

    fn reference() -> Period {
        Period::new(CfDate::ymd(1980, 1, 1), CfDate::ymd(2000, 1, 1))
    }

    #[test]
    fn seasonal_mean_groups_by_month_and_skips_nan() {
        let times = vec![
            CfDate::ymd(2000, 1, 15),
            CfDate::ymd(2000, 2, 15),
            CfDate::ymd(2000, 7, 15),
            CfDate::ymd(2000, 12, 15),
        ];
        let values = Array3::from_shape_vec(
            (4, 1, 2),
            vec![1.0, f64::NAN, 2.0, f64::NAN, 10.0, 20.0, 6.0, f64::NAN],
        )
        .unwrap();
        let series = GriddedSeries::new("t", "degC", times, vec![0.0], vec![0.0, 1.0], values).unwrap();
        let means = seasonal_mean(&series);

        assert_eq!(means.seasons().collect::<Vec<_>>(), vec![Season::Djf, Season::Jja]);
        let djf = means.get(Season::Djf).unwrap().values;
        assert_relative_eq!(djf[[0, 0]], 3.0);
        assert!(djf[[0, 1]].is_nan());
        assert_eq!(means.get(Season::Jja).unwrap().values, array![[10.0, 20.0]]);
    }

    #[test]
    fn dropping_reference_gives_later_minus_reference() {
        // The step happens right after the reference window closes.
        let split = CfDate::ymd(2000, 1, 1);
        let dry = step_series("drybulb", 1980..2020, split, 10.0, 12.0);
        let wet = step_series("wetbulb", 1980..2020, split, 5.0, 6.0);

        let anomalies = seasonal_averages(&dry, &wet, &reference(), true).unwrap();
        for season in Season::ALL {
            let d = anomalies.drybulb.get(season).unwrap().values;
            let w = anomalies.wetbulb.get(season).unwrap().values;
            let r = anomalies.residual.get(season).unwrap().values;
            // 2000-01-01 itself belongs to both windows, so the 60 DJF months
            // of the later mean include one at the reference value.
            let (dry_expected, wet_expected) = if season == Season::Djf {
                ((59.0 * 12.0 + 10.0) / 60.0 - 10.0, (59.0 * 6.0 + 5.0) / 60.0 - 5.0)
            } else {
                (2.0, 1.0)
            };
            assert_relative_eq!(d[[0, 0]], dry_expected, epsilon = 1e-12);
            assert_relative_eq!(w[[0, 1]], wet_expected, epsilon = 1e-12);
            assert_relative_eq!(r[[0, 0]], d[[0, 0]] - w[[0, 0]], epsilon = 1e-12);
        }
    }

    #[test]
    fn full_period_anomaly_includes_reference_years() {
        let split = CfDate::ymd(2000, 1, 1);
        let dry = step_series("drybulb", 1980..2020, split, 10.0, 12.0);
        let wet = step_series("wetbulb", 1980..2020, split, 5.0, 5.0);

        let anomalies = seasonal_averages(&dry, &wet, &reference(), false).unwrap();
        // JJA: 20 reference years at 10, 20 later years at 12.
        let d = anomalies.drybulb.get(Season::Jja).unwrap().values;
        assert_relative_eq!(d[[0, 0]], 1.0, epsilon = 1e-12);
        let w = anomalies.wetbulb.get(Season::Jja).unwrap().values;
        assert_relative_eq!(w[[0, 0]], 0.0, epsilon = 1e-12);
        let r = anomalies.residual.get(Season::Jja).unwrap().values;
        assert_relative_eq!(r[[0, 1]], 1.0, epsilon = 1e-12);
    }

    #[test]
    fn both_branches_agree_without_a_trend() {
        let split = CfDate::ymd(1900, 1, 1);
        let dry = step_series("drybulb", 1980..2010, split, 0.0, 25.0);
        let wet = step_series("wetbulb", 1980..2010, split, 0.0, 18.0);
        let dropped = seasonal_averages(&dry, &wet, &reference(), true).unwrap();
        let full = seasonal_averages(&dry, &wet, &reference(), false).unwrap();
        for season in Season::ALL {
            let a = dropped.residual.get(season).unwrap().values;
            let b = full.residual.get(season).unwrap().values;
            assert_relative_eq!(a[[0, 0]], 0.0, epsilon = 1e-12);
            assert_relative_eq!(b[[0, 0]], 0.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn residual_aligns_on_shared_times() {
        let dry = step_series("drybulb", 2000..2002, CfDate::ymd(3000, 1, 1), 20.0, 0.0);
        let wet = step_series("wetbulb", 2001..2003, CfDate::ymd(3000, 1, 1), 15.0, 0.0);
        let r = residual(&dry, &wet).unwrap();
        assert_eq!(r.len(), 12);
        assert_eq!(r.first_time(), Some(CfDate::ymd(2001, 1, 1)));
        assert!(r.values.iter().all(|&v| v == 5.0));
    }

    #[test]
    fn climatology_averages_residual_of_raw_series() {
        let dry = step_series("drybulb", 2000..2002, CfDate::ymd(2000, 12, 31), 20.0, 30.0);
        let wet = step_series("wetbulb", 2000..2002, CfDate::ymd(2000, 12, 31), 15.0, 20.0);
        let clim = climatology(&dry, &wet).unwrap();
        let r = clim.residual.get(Season::Mam).unwrap().values;
        assert_relative_eq!(r[[0, 0]], 7.5);
        let d = clim.drybulb.get(Season::Mam).unwrap().values;
        assert_relative_eq!(d[[0, 0]], 25.0);
    }

    #[test]
    fn period_anomaly_with_and_without_reference() {
        let split = CfDate::ymd(2019, 12, 31);
        let dry = step_series("drybulb", 1980..2022, split, 10.0, 13.0);
        let wet = step_series("wetbulb", 1980..2022, split, 5.0, 7.0);
        let period = Period::new(CfDate::ymd(2020, 1, 1), CfDate::ymd(2021, 1, 1));

        let raw = period_anomalies(&dry, &wet, &period, None).unwrap();
        let d = raw.drybulb.get(Season::Djf).unwrap().values;
        assert_relative_eq!(d[[0, 0]], 13.0);
        let r = raw.residual.get(Season::Djf).unwrap().values;
        assert_relative_eq!(r[[0, 0]], 6.0);

        let anom = period_anomalies(&dry, &wet, &period, Some(&reference())).unwrap();
        let d = anom.drybulb.get(Season::Son).unwrap().values;
        assert_relative_eq!(d[[0, 0]], 3.0);
        let r = anom.residual.get(Season::Son).unwrap().values;
        assert_relative_eq!(r[[0, 1]], 1.0);
    }

    #[test]
    fn empty_period_has_no_seasons() {
        let dry = step_series("drybulb", 1980..1990, CfDate::ymd(3000, 1, 1), 1.0, 1.0);
        let wet = step_series("wetbulb", 1980..1990, CfDate::ymd(3000, 1, 1), 1.0, 1.0);
        let period = Period::new(CfDate::ymd(2050, 1, 1), CfDate::ymd(2051, 1, 1));
        let anom = period_anomalies(&dry, &wet, &period, None).unwrap();
        assert!(matches!(
            anom.drybulb.get(Season::Djf),
            Err(DataError::MissingSeason(Season::Djf))
        ));
    }

    #[test]
    fn domain_mean_weights_by_latitude() {
        let values = array![[1.0, 1.0], [3.0, f64::NAN]];
        let lat = [0.0, 60.0];
        // Weights 1 (two cells) and 0.5 (one valid cell).
        assert_relative_eq!(domain_mean(&values, &lat), (1.0 + 1.0 + 1.5) / 2.5, epsilon = 1e-12);
        assert!(domain_mean(&array![[f64::NAN]], &[10.0]).is_nan());
    }
}
