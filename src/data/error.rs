use thiserror::Error;

use super::model::Season;

// ---------------------------------------------------------------------------
// DataError – everything the data layer can reject
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum DataError {
    #[cfg_attr(not(feature = "netcdf"), allow(dead_code))]
    #[error("variable not found: {0}")]
    MissingVariable(String),

    #[error("column not found: {0}")]
    MissingColumn(String),

    #[error("unexpected shape for '{name}': {detail}")]
    BadShape { name: String, detail: String },

    #[error("grids of '{left}' and '{right}' do not match ({detail})")]
    GridMismatch {
        left: String,
        right: String,
        detail: String,
    },

    #[error("selection is empty: {0}")]
    EmptySelection(String),

    #[error("no data for season {0}")]
    MissingSeason(Season),

    #[error("'{0}' is not a season (expected DJF, MAM, JJA or SON)")]
    InvalidSeason(String),

    #[error("invalid date '{0}'")]
    InvalidDate(String),

    #[cfg_attr(not(feature = "netcdf"), allow(dead_code))]
    #[error("invalid time units '{0}'")]
    InvalidTimeUnits(String),

    #[cfg_attr(not(feature = "netcdf"), allow(dead_code))]
    #[error("unsupported calendar '{0}'")]
    UnsupportedCalendar(String),

    #[error("unsupported file extension: .{0}")]
    UnsupportedExtension(String),

    #[error("support for {0} was not compiled in (enable the '{0}' feature)")]
    FeatureDisabled(&'static str),

    #[cfg(feature = "netcdf")]
    #[error("NetCDF error: {0}")]
    Netcdf(#[from] netcdf::Error),
}
