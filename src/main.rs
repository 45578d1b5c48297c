//! Autocurator - index a multi-file netCDF dataset and export its layout.

use std::fs::File;
use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::{Context, Result};
use autocurator::report::{write_report, ReportFormat};
use autocurator::{DatasetIndex, IndexConfig, WorkerPartition};
use clap::{Parser, ValueEnum};
use tracing::Level;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Format {
    Xml,
    Csv,
}

impl From<Format> for ReportFormat {
    fn from(format: Format) -> Self {
        match format {
            Format::Xml => ReportFormat::Xml,
            Format::Csv => ReportFormat::Csv,
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "autocurator")]
#[command(about = "Index a dataset spread over many netCDF files", long_about = None)]
struct Args {
    /// Search pattern of the member files, e.g. data/tas_*.nc
    #[arg(long)]
    files: String,

    /// Path of the report to write
    #[arg(long)]
    out: PathBuf,

    /// Report format; CSV for a .csv output path, XML otherwise
    #[arg(long, value_enum)]
    format: Option<Format>,

    /// Name of the record (time) dimension
    #[arg(long, default_value = "time")]
    record_dim: String,

    /// Comma-separated grid dimension names
    #[arg(long, value_delimiter = ',')]
    grid_dims: Vec<String>,

    /// Enable logging to specified file
    #[arg(long)]
    log: Option<PathBuf>,
}

fn main() {
    let args = Args::parse();
    if let Err(err) = run(args) {
        eprintln!("Error: {:#}", err);
        std::process::exit(1);
    }
}

fn run(args: Args) -> Result<()> {
    init_logging(&args)?;

    let config = IndexConfig::default()
        .with_record_dim(args.record_dim.as_str())
        .with_grid_dims(args.grid_dims.iter().map(String::as_str));

    let mut index = DatasetIndex::new(config);
    index
        .populate(&args.files)
        .with_context(|| format!("Unable to index \"{}\"", args.files))?;
    tracing::info!(
        "Indexed {} files, {} times, {} variables",
        index.filenames().len(),
        index.time_count(),
        index.variables().len()
    );

    let format = args
        .format
        .map(ReportFormat::from)
        .unwrap_or_else(|| ReportFormat::from_path(&args.out));
    write_report(&index, format, &args.out, &WorkerPartition::single())
        .with_context(|| format!("Unable to write \"{}\"", args.out.display()))?;
    Ok(())
}

fn init_logging(args: &Args) -> Result<()> {
    // Set up logging to a file if --log option is provided
    if let Some(log_path) = &args.log {
        let file = File::create(log_path)
            .with_context(|| format!("Failed to open log file {}", log_path.display()))?;
        let subscriber = FmtSubscriber::builder()
            .with_max_level(Level::DEBUG)
            .with_ansi(false)
            .with_writer(Mutex::new(file))
            .finish();
        tracing::subscriber::set_global_default(subscriber)?;
        tracing::info!("Starting autocurator");
        return Ok(());
    }

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}
