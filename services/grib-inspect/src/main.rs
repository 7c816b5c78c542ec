//! grib-inspect
//!
//! Inventory, index, report on and unpack collections of GRIB2 files.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::error;
use tracing_subscriber::{fmt, EnvFilter};

use grib2_report::ReportKind;
use grib_inspect::{commands, files::collect_files, InspectConfig, LogFormat};

/// GRIB2 collection inspector
#[derive(Parser, Debug)]
#[command(name = "grib-inspect")]
#[command(about = "Inventory, index, report on and unpack GRIB2 files")]
struct Args {
    /// YAML configuration file
    #[arg(short, long, env = "GRIB_INSPECT_CONFIG")]
    config: Option<PathBuf>,

    /// Log level
    #[arg(long, default_value = "warn", env = "RUST_LOG")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List every record of the given files
    Scan {
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },
    /// Build or refresh the collection index sidecar
    Index {
        #[arg(required = true)]
        paths: Vec<PathBuf>,
        /// Sidecar path (defaults to the configured name)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Rescan every file
        #[arg(long)]
        force: bool,
    },
    /// Run a diagnostic report
    Report {
        /// Report kind, e.g. gribIndex, uniqueTemplates, pdsSummary
        kind: ReportKind,
        #[arg(required = true)]
        paths: Vec<PathBuf>,
        /// Show and reset counters after each file
        #[arg(long)]
        each_file: bool,
        /// Extra detail lines
        #[arg(long)]
        extra: bool,
        /// Scan files instead of using index sidecars
        #[arg(long)]
        no_index: bool,
    },
    /// Unpack one record and print its statistics
    Unpack {
        path: PathBuf,
        /// Record number within the file, starting at 0
        #[arg(short, long, default_value_t = 0)]
        record: usize,
        /// Number of leading values to print
        #[arg(long, default_value_t = 10)]
        head: usize,
    },
}

fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    let args = Args::parse();

    let config = match InspectConfig::load(args.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {e:#}");
            return ExitCode::FAILURE;
        }
    };

    init_tracing(&args.log_level, config.log_format);

    match run(args.command, config) {
        Ok(text) => {
            print!("{text}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{e:#}");
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(log_level: &str, format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));
    let builder = fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_level(true)
        .with_writer(std::io::stderr);

    match format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Text => builder.init(),
    }
}

fn run(command: Command, mut config: InspectConfig) -> Result<String> {
    match command {
        Command::Scan { paths } => {
            let files = collect_files(&paths, &config.extensions, config.recursive)?;
            commands::scan(&files, &config.report.extractor)
        }
        Command::Index {
            paths,
            output,
            force,
        } => {
            config.index.force |= force;
            let files = collect_files(&paths, &config.extensions, config.recursive)?;
            let sidecar = output.unwrap_or_else(|| PathBuf::from(&config.sidecar));
            commands::index(&files, &sidecar, &config)
        }
        Command::Report {
            kind,
            paths,
            each_file,
            extra,
            no_index,
        } => {
            config.report.each_file |= each_file;
            config.report.extra |= extra;
            if no_index {
                config.report.use_index = false;
            }
            let files = collect_files(&paths, &config.extensions, config.recursive)?;
            commands::report(kind, &files, &config)
        }
        Command::Unpack { path, record, head } => commands::unpack(&path, record, head, &config),
    }
}
