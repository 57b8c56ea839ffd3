#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Command-line spatial statistics for areal crime data.
//!
//! Loads a `GeoJSON` `FeatureCollection` of areal units, builds contiguity
//! weights, and runs the requested stage: neighbour summaries, exploratory
//! statistics, global and local Moran's I, OLS with spatial diagnostics,
//! or the SLX model. `report` runs all of them.
//!
//! Uses `indicatif-log-bridge` (via [`crime_stats_cli_utils::init_logger`])
//! so that log lines and the permutation progress bar share the terminal.

mod analysis;
mod config;
mod report;

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use crime_stats_cli_utils::{IndicatifProgress, MultiProgress};

use crate::analysis::Analysis;
use crate::config::AnalysisConfig;
use crate::report::Report;

#[derive(Parser)]
#[command(
    name = "crime_stats",
    about = "Spatial autocorrelation and regression diagnostics for areal crime data"
)]
struct Cli {
    /// `GeoJSON` `FeatureCollection` of areal units
    #[arg(short, long, global = true)]
    input: Option<PathBuf>,

    /// Analysis config (TOML); the built-in default is used when omitted
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Output format
    #[arg(short, long, global = true, value_enum, default_value_t = Format::Text)]
    format: Format,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Format {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Summarize the contiguity relation
    Neighbours {
        /// Also list every unit's neighbours
        #[arg(long)]
        list: bool,
    },
    /// Descriptive statistics and correlations with the outcome
    Describe,
    /// Global Moran's I (analytic and permutation nulls)
    Moran {
        /// Variable to test; defaults to the outcome
        #[arg(long)]
        variable: Option<String>,
        /// Override the configured number of permutations (0 disables)
        #[arg(long)]
        permutations: Option<usize>,
        /// Override the configured permutation seed
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Local Moran's I cluster classification
    Local {
        /// Variable to test; defaults to the outcome
        #[arg(long)]
        variable: Option<String>,
    },
    /// Spatial lag `Wx` of a variable
    Lag {
        /// Variable to lag; defaults to the outcome
        #[arg(long)]
        variable: Option<String>,
    },
    /// OLS with residual Moran's I and Lagrange Multiplier tests
    Regress,
    /// Spatially-lagged-exogenous regression
    Slx,
    /// Run every stage
    Report,
    /// Print the effective analysis config
    ShowConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let multi = crime_stats_cli_utils::init_logger(cli.verbose);

    let mut config = AnalysisConfig::load(cli.config.as_deref())?;

    if let Commands::ShowConfig = cli.command {
        print!("{}", toml::to_string_pretty(&config)?);
        return Ok(());
    }

    if let Commands::Moran {
        permutations, seed, ..
    } = &cli.command
    {
        if let Some(permutations) = permutations {
            config.moran.permutations = *permutations;
        }
        if let Some(seed) = seed {
            config.moran.seed = *seed;
        }
    }

    let input = cli
        .input
        .as_deref()
        .ok_or("--input <GEOJSON> is required for this command")?;
    let analysis = Analysis::load(input, config)?;
    let report = run(&cli, &analysis, &multi, input.display().to_string())?;

    match cli.format {
        Format::Text => print!("{}", report.to_text()),
        Format::Json => println!("{}", report.to_json()?),
    }

    Ok(())
}

fn run(
    cli: &Cli,
    analysis: &Analysis,
    multi: &MultiProgress,
    input: String,
) -> Result<Report, Box<dyn std::error::Error>> {
    let outcome = analysis.config().dataset.outcome.clone();
    let show_progress = cli.format == Format::Text;
    let mut report = Report::new(input, analysis.units());

    match &cli.command {
        Commands::Neighbours { list } => {
            let (summary, lists) = analysis.neighbours(*list);
            report.neighbours = Some(summary);
            report.neighbour_lists = lists;
        }
        Commands::Describe => {
            let (summaries, correlations) = analysis.describe()?;
            report.summaries = Some(summaries);
            report.correlations = Some(correlations);
        }
        Commands::Moran { variable, .. } => {
            let variable = variable.as_deref().unwrap_or(&outcome);
            let progress =
                IndicatifProgress::permutations_bar_if(show_progress, multi, "Permuting");
            let (moran, permutation) = analysis.moran(variable, progress.as_ref())?;
            report.moran = Some(moran);
            report.moran_permutation = permutation;
        }
        Commands::Local { variable } => {
            let variable = variable.as_deref().unwrap_or(&outcome);
            report.local_moran = Some(analysis.local_moran(variable)?);
        }
        Commands::Lag { variable } => {
            let variable = variable.as_deref().unwrap_or(&outcome);
            report.lag = Some(analysis.lag(variable)?);
        }
        Commands::Regress => {
            report.regression = Some(analysis.regress()?);
        }
        Commands::Slx => {
            report.slx = Some(analysis.slx()?);
        }
        Commands::Report => {
            log::info!("Running full report on {} units", analysis.units());
            let (summary, _) = analysis.neighbours(false);
            report.neighbours = Some(summary);

            let (summaries, correlations) = analysis.describe()?;
            report.summaries = Some(summaries);
            report.correlations = Some(correlations);

            let progress =
                IndicatifProgress::permutations_bar_if(show_progress, multi, "Permuting");
            let (moran, permutation) = analysis.moran(&outcome, progress.as_ref())?;
            report.moran = Some(moran);
            report.moran_permutation = permutation;
            report.local_moran = Some(analysis.local_moran(&outcome)?);

            report.regression = Some(analysis.regress()?);
            report.slx = Some(analysis.slx()?);
        }
        Commands::ShowConfig => {}
    }

    Ok(report)
}
