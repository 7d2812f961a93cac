use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use arrow::array::{ArrayRef, Float64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use arrow::util::pretty::pretty_format_batches;
use clap::{Parser, Subcommand};
use parquet::arrow::ArrowWriter;

use crate::climatology::{SeasonalAnomalies, climatology, domain_mean, seasonal_averages};
use crate::config::{AnalysisConfig, LandMaskSpec};
use crate::data::error::DataError;
use crate::data::model::{Season, SeasonalMeans};
use crate::figures::{save_figure, seasonal_average_plot, time_slice_plot};
use crate::render::map::MapExtent;
use crate::state::AnalysisInputs;

// ---------------------------------------------------------------------------
// Command line
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(name = "wetbulb-atlas")]
#[command(version)]
#[command(about = "Seasonal wet-bulb and dry-bulb temperature maps over North America")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// JSON config; fields it omits keep their defaults
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Wet-bulb input file (overrides the config)
    #[arg(long, global = true)]
    pub wetbulb: Option<PathBuf>,

    /// Dry-bulb input file (overrides the config)
    #[arg(long, global = true)]
    pub drybulb: Option<PathBuf>,

    /// Land fraction file used for the ocean mask and coastlines
    #[arg(long, global = true)]
    pub land_mask: Option<PathBuf>,

    /// Output resolution in dots per inch
    #[arg(long, global = true)]
    pub dpi: Option<f64>,

    /// Directory for relative output paths
    #[arg(long, global = true)]
    pub output_dir: Option<PathBuf>,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Four-season comparison figure
    Seasonal {
        /// Plot the raw seasonal climatology instead of anomalies
        #[arg(long)]
        no_reference: bool,

        /// Average over the whole record, reference years included
        #[arg(long)]
        keep_reference: bool,

        /// Output PNG
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// One season across the configured time slices
    TimeSlice {
        /// Season to show (DJF, MAM, JJA or SON)
        #[arg(long)]
        season: Option<Season>,

        /// Plot period means instead of anomalies
        #[arg(long)]
        no_reference: bool,

        /// Output PNG
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Both figures with the configured defaults
    All,

    /// Print dataset dimensions and domain-mean seasonal anomalies
    Inspect {
        /// Also write the table to a .parquet or .csv file
        #[arg(long)]
        export: Option<PathBuf>,
    },
}

impl Cli {
    /// Defaults, then the config file, then command-line overrides.
    pub fn resolve_config(&self) -> Result<AnalysisConfig> {
        let mut config = match &self.config {
            Some(path) => AnalysisConfig::load(path)?,
            None => AnalysisConfig::default(),
        };

        if let Some(path) = &self.wetbulb {
            config.wetbulb.path = path.clone();
        }
        if let Some(path) = &self.drybulb {
            config.drybulb.path = path.clone();
        }
        if let Some(path) = &self.land_mask {
            config.land_mask = Some(match config.land_mask.take() {
                Some(spec) => LandMaskSpec {
                    path: path.clone(),
                    ..spec
                },
                None => LandMaskSpec::new(path.clone()),
            });
        }
        if let Some(dpi) = self.dpi {
            config.figure.dpi = dpi;
        }
        if let Some(dir) = &self.output_dir {
            config.output_dir = dir.clone();
        }

        config.validate().context("invalid configuration")?;
        Ok(config)
    }
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

pub fn run(cli: Cli) -> Result<()> {
    let config = cli.resolve_config()?;
    let command = cli.command.clone().unwrap_or(Command::All);
    log::debug!("Running {command:?}");

    let inputs = AnalysisInputs::load(&config)?;

    match command {
        Command::Seasonal {
            no_reference,
            keep_reference,
            output,
        } => {
            let drop = config.drop_reference_period && !keep_reference;
            let output = output.unwrap_or_else(|| config.seasonal_output.clone());
            seasonal(&config, &inputs, !no_reference, drop, &output)
        }
        Command::TimeSlice {
            season,
            no_reference,
            output,
        } => {
            let season = season.unwrap_or(config.time_slice_season);
            let output = output.unwrap_or_else(|| config.time_slice_output.clone());
            time_slice(&config, &inputs, season, !no_reference, &output)
        }
        Command::All => {
            seasonal(
                &config,
                &inputs,
                true,
                config.drop_reference_period,
                &config.seasonal_output,
            )?;
            time_slice(
                &config,
                &inputs,
                config.time_slice_season,
                true,
                &config.time_slice_output,
            )
        }
        Command::Inspect { export } => inspect(&config, &inputs, export.as_deref()),
    }
}

fn seasonal(
    config: &AnalysisConfig,
    inputs: &AnalysisInputs,
    use_reference: bool,
    drop_reference_period: bool,
    output: &Path,
) -> Result<()> {
    let reference = if use_reference { config.reference()? } else { None };
    let spec = seasonal_average_plot(
        &inputs.drybulb,
        &inputs.wetbulb,
        MapExtent::from_array(config.extent),
        reference.as_ref(),
        drop_reference_period,
        &config.seasonal_title,
        config.figure,
    )
    .context("computing seasonal averages")?;
    save_figure(&spec, inputs.land_mask.as_ref(), &config.output_path(output))
}

fn time_slice(
    config: &AnalysisConfig,
    inputs: &AnalysisInputs,
    season: Season,
    use_reference: bool,
    output: &Path,
) -> Result<()> {
    let reference = if use_reference { config.reference()? } else { None };
    let periods = config.time_slices()?;
    let spec = time_slice_plot(
        &inputs.drybulb,
        &inputs.wetbulb,
        season,
        &periods,
        MapExtent::from_array(config.extent),
        reference.as_ref(),
        config.figure,
    )
    .with_context(|| format!("computing {season} time slices"))?;
    save_figure(&spec, inputs.land_mask.as_ref(), &config.output_path(output))
}

// ---------------------------------------------------------------------------
// Inspect
// ---------------------------------------------------------------------------

fn inspect(config: &AnalysisConfig, inputs: &AnalysisInputs, export: Option<&Path>) -> Result<()> {
    for series in [&inputs.wetbulb, &inputs.drybulb] {
        log::info!(
            "{} [{}]: {} × {} × {}, {} – {}",
            series.name,
            series.units,
            series.len(),
            series.lat.len(),
            series.lon.len(),
            series.first_time().map(|t| t.to_string()).unwrap_or_default(),
            series.last_time().map(|t| t.to_string()).unwrap_or_default(),
        );
    }
    if let Some(mask) = &inputs.land_mask {
        log::info!("land mask: {:.1}% land", mask.land_fraction() * 100.0);
    }

    let anomalies = match config.reference()? {
        Some(reference) => seasonal_averages(
            &inputs.drybulb,
            &inputs.wetbulb,
            &reference,
            config.drop_reference_period,
        )?,
        None => climatology(&inputs.drybulb, &inputs.wetbulb)?,
    };

    let batch = summary_batch(&anomalies)?;
    println!("{}", pretty_format_batches(std::slice::from_ref(&batch))?);

    if let Some(path) = export {
        export_summary(&batch, &config.output_path(path))?;
    }
    Ok(())
}

/// One row per season: cos(lat)-weighted domain means of each field.
pub fn summary_batch(anomalies: &SeasonalAnomalies) -> Result<RecordBatch> {
    let seasons: Vec<Season> = anomalies.drybulb.seasons().collect();
    let column = |means: &SeasonalMeans| -> Result<ArrayRef> {
        let values = seasons
            .iter()
            .map(|&season| {
                let field = means.get(season)?;
                Ok(domain_mean(&field.values, &field.lat))
            })
            .collect::<Result<Vec<f64>, DataError>>()?;
        Ok(Arc::new(Float64Array::from(values)))
    };

    let schema = Arc::new(Schema::new(vec![
        Field::new("season", DataType::Utf8, false),
        Field::new("drybulb", DataType::Float64, false),
        Field::new("wetbulb", DataType::Float64, false),
        Field::new("residual", DataType::Float64, false),
    ]));
    let labels: Vec<&str> = seasons.iter().map(|s| s.label()).collect();

    RecordBatch::try_new(
        schema,
        vec![
            Arc::new(StringArray::from(labels)),
            column(&anomalies.drybulb)?,
            column(&anomalies.wetbulb)?,
            column(&anomalies.residual)?,
        ],
    )
    .context("building summary table")
}

fn export_summary(batch: &RecordBatch, path: &Path) -> Result<()> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();
    if !matches!(ext.as_str(), "parquet" | "pq" | "csv") {
        return Err(DataError::UnsupportedExtension(ext).into());
    }

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let file = std::fs::File::create(path).with_context(|| format!("creating {}", path.display()))?;
    if ext == "csv" {
        let mut writer = arrow::csv::Writer::new(file);
        writer.write(batch)?;
    } else {
        let mut writer = ArrowWriter::try_new(file, batch.schema(), None)?;
        writer.write(batch)?;
        writer.close()?;
    }
    log::info!("Wrote summary to {}", path.display());
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
