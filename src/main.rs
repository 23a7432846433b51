//! `oclc-resolver`: resolve ISBN / EAN-13 identifiers in MARC files and
//! spreadsheets against the WorldCat metadata service.
//!
//! ## Commands
//!
//! - `marc`: add the OCLC number as `941 $f` to each record
//! - `spreadsheet`: fill a `Work ID` column from the `EAN-13` column
//! - `resolve`: pick one of the above from the input's extension

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use oclc_resolver::formats::marc::{derived_output_path, MarcBatch};
use oclc_resolver::formats::spreadsheet::SpreadsheetBatch;
use oclc_resolver::telemetry::{init_tracing, level_for};
use oclc_resolver::{
    BatchDriver, BatchFormat, BatchOutcome, LogProgress, ServiceConfig, SourceFormat,
};
use std::path::{Path, PathBuf};
use tracing::info;

/// Log a progress line every this many records.
const PROGRESS_INTERVAL: usize = 100;

#[derive(Parser)]
#[command(name = "oclc-resolver")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Resolve ISBNs to OCLC numbers and Work IDs", long_about = None)]
struct Cli {
    /// Service configuration file
    #[arg(short, long, env = "OCLC_RESOLVER_CONFIG", default_value = "config.yml", global = true)]
    config: PathBuf,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON log lines and print the summary as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Add OCLC numbers (941 $f) to a MARC file
    Marc {
        /// ISO 2709 input file
        input: PathBuf,

        /// Output file (default: updated_<input> next to the input)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Add Work IDs to a spreadsheet with an EAN-13 column
    Spreadsheet {
        /// CSV or .xlsx input file
        input: PathBuf,

        /// Output file (default: overwrite the input)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Resolve a file of any supported format, chosen by extension
    Resolve {
        /// .mrc, .marc, .csv or .xlsx input file
        input: PathBuf,

        /// Output file (default as for `marc` or `spreadsheet`)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.json, level_for(cli.verbose));

    let config = ServiceConfig::load(&cli.config)
        .with_context(|| format!("failed to load configuration from {}", cli.config.display()))?;
    let mut driver = BatchDriver::from_config(&config).context("invalid service configuration")?;

    let outcome = match cli.command {
        Commands::Marc { input, output } => resolve_marc(&mut driver, &input, output).await?,
        Commands::Spreadsheet { input, output } => {
            resolve_sheet(&mut driver, &input, output).await?
        },
        Commands::Resolve { input, output } => {
            let format = SourceFormat::from_path(&input).with_context(|| {
                format!(
                    "cannot tell the format of {}; expected .mrc, .marc, .csv or .xlsx",
                    input.display()
                )
            })?;
            info!(format = %format, "detected input format");
            match format {
                SourceFormat::Marc => resolve_marc(&mut driver, &input, output).await?,
                SourceFormat::Spreadsheet(_) => resolve_sheet(&mut driver, &input, output).await?,
            }
        },
    };

    if cli.json {
        println!("{}", serde_json::to_string(&outcome)?);
    } else {
        print_summary(&outcome);
    }
    Ok(())
}

async fn resolve_marc(
    driver: &mut BatchDriver,
    input: &Path,
    output: Option<PathBuf>,
) -> Result<BatchOutcome> {
    let output = output.unwrap_or_else(|| derived_output_path(input));
    let batch = MarcBatch::open(input, &output)
        .with_context(|| format!("failed to open {}", input.display()))?;
    run(driver, batch).await
}

async fn resolve_sheet(
    driver: &mut BatchDriver,
    input: &Path,
    output: Option<PathBuf>,
) -> Result<BatchOutcome> {
    let output = output.unwrap_or_else(|| input.to_path_buf());
    let batch = SpreadsheetBatch::open(input, &output)
        .with_context(|| format!("failed to read {}", input.display()))?;
    run(driver, batch).await
}

async fn run<F: BatchFormat>(driver: &mut BatchDriver, mut batch: F) -> Result<BatchOutcome> {
    info!(format = ?batch, "starting batch");
    let mut progress = LogProgress::new(PROGRESS_INTERVAL);
    driver
        .run(&mut batch, &mut progress)
        .await
        .context("batch did not complete")
}

fn print_summary(outcome: &BatchOutcome) {
    println!("{outcome}");
    if let Some(output) = &outcome.output {
        println!("Output written to {}", output.display());
    }
}
