//! amex-claims CLI - Split corporate card statements into per-employee claims
//!
//! # Main Commands
//!
//! ```bash
//! amex-claims convert March.csv                  # Write Amex_Output.zip (csv claims)
//! amex-claims convert March.xlsx --format excel  # Spreadsheet claims
//! amex-claims inspect March.csv                  # Show detected header and columns
//! amex-claims schema                             # Print the claim schema as JSON
//! amex-claims serve                              # Start HTTP server (port 3000)
//! ```
//!
//! Flags can also come from `CLAIMS_*` environment variables or a `.env` file.

use clap::{ArgAction, Args, Parser, Subcommand};
use std::fs;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

use amex_claims::archive::ARCHIVE_NAME;
use amex_claims::config::{
    HeaderLocator, PipelineOptions, DEFAULT_HEADER_SCAN_ROWS, DEFAULT_MAX_UPLOAD_BYTES,
    DEFAULT_PREAMBLE_ROWS,
};
use amex_claims::server::{start_server, ServerConfig};
use amex_claims::{convert_file, inspect, ClaimSchema, ExportFormat, RawStatement};

#[derive(Parser)]
#[command(name = "amex-claims", version)]
#[command(about = "Split an Amex corporate card statement into per-employee claim files", long_about = None)]
struct Cli {
    /// More log output (-v debug, -vv trace). RUST_LOG takes precedence.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert a statement into a zip of claim files
    Convert {
        /// Statement file (.csv, .xls, .xlsx)
        input: PathBuf,

        /// Claim file format: csv or excel
        #[arg(short, long, default_value = "csv")]
        format: ExportFormat,

        /// Archive to write
        #[arg(short, long, default_value = ARCHIVE_NAME)]
        output: PathBuf,

        /// Also write the run report as JSON
        #[arg(long)]
        report: Option<PathBuf>,

        #[command(flatten)]
        pipeline: PipelineArgs,
    },

    /// Show how a statement would be read, without converting it
    Inspect {
        /// Statement file (.csv, .xls, .xlsx)
        input: PathBuf,

        #[command(flatten)]
        pipeline: PipelineArgs,
    },

    /// Print the claim schema in effect as JSON
    Schema {
        #[command(flatten)]
        pipeline: PipelineArgs,
    },

    /// Start HTTP server
    Serve {
        /// Port to listen on
        #[arg(short, long, env = "CLAIMS_PORT", default_value = "3000")]
        port: u16,

        /// Largest accepted upload, in bytes
        #[arg(long, env = "CLAIMS_MAX_UPLOAD_BYTES", default_value_t = DEFAULT_MAX_UPLOAD_BYTES)]
        max_upload_bytes: usize,

        #[command(flatten)]
        pipeline: PipelineArgs,
    },
}

/// Options shared by every command that reads statements
#[derive(Args, Debug, Clone, Default)]
struct PipelineArgs {
    /// JSON options file; flags below override it
    #[arg(long)]
    config: Option<PathBuf>,

    /// Metadata rows before the header (fixed preamble)
    #[arg(long, env = "CLAIMS_PREAMBLE_ROWS")]
    preamble_rows: Option<usize>,

    /// Find the header by its column names, falling back to --preamble-rows
    #[arg(long, env = "CLAIMS_DETECT_HEADER")]
    detect_header: bool,

    /// Field delimiter (sniffed if not specified)
    #[arg(short, long)]
    delimiter: Option<char>,

    /// Keep rows whose amount cannot be parsed, with a blank amount
    #[arg(long)]
    keep_unparseable: bool,

    /// Claim schema JSON file
    #[arg(long)]
    schema: Option<PathBuf>,

    /// Branch written on every claim line
    #[arg(long, env = "CLAIMS_BRANCH")]
    branch: Option<String>,

    /// Payment method written on every claim line
    #[arg(long, env = "CLAIMS_PAID_WITH")]
    paid_with: Option<String>,
}

impl PipelineArgs {
    fn into_options(self) -> Result<PipelineOptions, Box<dyn std::error::Error>> {
        let mut options = match &self.config {
            Some(path) => PipelineOptions::from_json_file(path)?,
            None => PipelineOptions::default(),
        };

        match (self.preamble_rows, self.detect_header) {
            (preamble, true) => {
                options.header = HeaderLocator::Detect {
                    max_scan_rows: DEFAULT_HEADER_SCAN_ROWS,
                    fallback_preamble_rows: preamble.unwrap_or(DEFAULT_PREAMBLE_ROWS),
                }
            }
            (Some(preamble_rows), false) => options.header = HeaderLocator::Fixed { preamble_rows },
            (None, false) => {}
        }

        if self.delimiter.is_some() {
            options.delimiter = self.delimiter;
        }
        if self.keep_unparseable {
            options.drop_unparseable_amounts = false;
        }
        if let Some(path) = &self.schema {
            options.schema = ClaimSchema::from_json(&fs::read_to_string(path)?)?;
        }
        if let Some(branch) = &self.branch {
            set_constant(&mut options.schema, "Branch", branch)?;
        }
        if let Some(paid_with) = &self.paid_with {
            set_constant(&mut options.schema, "Paid With", paid_with)?;
        }

        options.schema.validate()?;
        Ok(options)
    }
}

fn set_constant(
    schema: &mut ClaimSchema,
    field: &str,
    value: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    if schema.set_constant(field, value) {
        Ok(())
    } else {
        Err(format!("claim schema has no constant field '{}'", field).into())
    }
}

#[tokio::main]
async fn main() {
    // Load .env file (if present)
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        Commands::Convert { input, format, output, report, pipeline } => {
            cmd_convert(&input, format, &output, report.as_deref(), pipeline)
        }
        Commands::Inspect { input, pipeline } => cmd_inspect(&input, pipeline),
        Commands::Schema { pipeline } => cmd_schema(pipeline),
        Commands::Serve { port, max_upload_bytes, pipeline } => {
            cmd_serve(port, max_upload_bytes, pipeline).await
        }
    };

    if let Err(e) = result {
        tracing::error!("{}", e);
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn cmd_convert(
    input: &Path,
    format: ExportFormat,
    output: &Path,
    report_path: Option<&Path>,
    pipeline: PipelineArgs,
) -> Result<(), Box<dyn std::error::Error>> {
    let options = pipeline.into_options()?;
    let outcome = convert_file(input, format, &options)?;

    fs::write(output, &outcome.archive.bytes)?;

    let report = &outcome.report;
    eprintln!();
    eprintln!("Claim files: {}", report.files.len());
    for entry in &report.files {
        eprintln!("   {:<40} {:>5} rows", entry.file_name, entry.rows);
    }
    eprintln!("Rows read:     {}", report.row_count);
    eprintln!("Rows excluded: {}", report.excluded_rows());
    eprintln!("Archive written to: {}", output.display());

    if let Some(path) = report_path {
        fs::write(path, serde_json::to_string_pretty(report)?)?;
        eprintln!("Report written to: {}", path.display());
    }

    Ok(())
}

fn cmd_inspect(input: &Path, pipeline: PipelineArgs) -> Result<(), Box<dyn std::error::Error>> {
    let options = pipeline.into_options()?;
    let statement = RawStatement::from_path(input)?;
    let preview = inspect(&statement, &options)?;
    println!("{}", serde_json::to_string_pretty(&preview)?);
    Ok(())
}

fn cmd_schema(pipeline: PipelineArgs) -> Result<(), Box<dyn std::error::Error>> {
    let options = pipeline.into_options()?;
    println!("{}", options.schema.to_json()?);
    Ok(())
}

async fn cmd_serve(
    port: u16,
    max_upload_bytes: usize,
    pipeline: PipelineArgs,
) -> Result<(), Box<dyn std::error::Error>> {
    let options = pipeline.into_options()?;
    start_server(ServerConfig { port, max_upload_bytes, options }).await
}
