/// Data layer: core types, loading, calendars and subsetting.
///
/// Architecture:
/// ```text
///  .nc / .parquet / .csv
///        │
///        ▼
///   ┌──────────┐
///   │  loader   │  parse file → GriddedSeries (time × lat × lon)
///   └──────────┘      ▲
///        │            │ CF units + calendar
///        │       ┌──────────┐
///        │       │   time    │  CfDate, noleap / 360_day / gregorian
///        │       └──────────┘
///        ▼
///   ┌──────────┐
///   │  select   │  inclusive label slices in time and space
///   └──────────┘
///        │
///        ▼
///   ┌──────────┐
///   │   mask    │  land fraction → LandMask on the same grid
///   └──────────┘
/// ```

pub mod error;
pub mod loader;
pub mod mask;
pub mod model;
#[cfg(feature = "netcdf")]
pub mod nc;
pub mod select;
pub mod time;
