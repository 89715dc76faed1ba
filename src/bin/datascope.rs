use clap::{Parser, ValueEnum};
use color_eyre::Result;
use std::path::PathBuf;
use tracing::error;

use datascope::config::Settings;
use datascope::core::{AddDatasetResult, DatasetSession};
use datascope::io::{LoadContext, load_dataset};

/// Terminal data exploration: load sources, run transformation pipelines.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Data sources to load on startup: local files (.csv, .parquet, .json,
    /// .xlsx, .xls, .db) or http(s) URLs.
    #[arg(value_name = "SOURCE")]
    sources: Vec<String>,
    /// Enable file logging at the given level (overrides RUST_LOG)
    #[arg(long = "logging", value_enum)]
    logging: Option<LogLevel>,
    /// Path to a config file (overrides default config discovery)
    #[arg(long = "config", value_name = "PATH")]
    config: Option<PathBuf>,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

fn main() -> Result<()> {
    color_eyre::install()?;
    let args = Args::parse();

    let level = match args.logging {
        Some(LogLevel::Error) => Some(tracing::Level::ERROR),
        Some(LogLevel::Warn) => Some(tracing::Level::WARN),
        Some(LogLevel::Info) => Some(tracing::Level::INFO),
        Some(LogLevel::Debug) => Some(tracing::Level::DEBUG),
        Some(LogLevel::Trace) => Some(tracing::Level::TRACE),
        None => None,
    };
    datascope::logging::init_with(None, level)?;

    let settings = Settings::from_path(args.config.as_ref())?;
    let mut session = DatasetSession::with_capacity(settings.max_datasets);

    let progress = |fraction: f64, message: &str| {
        eprintln!("[{:>3.0}%] {message}", fraction * 100.0);
    };
    let ctx = LoadContext::new(&settings).with_progress(&progress);

    for source in &args.sources {
        match load_dataset(source, &ctx) {
            Ok(dataset) => match session.add_dataset(dataset) {
                AddDatasetResult::Success => {}
                AddDatasetResult::WarningEightDatasets => {
                    eprintln!("warning: 8 datasets open; consider closing some");
                }
                AddDatasetResult::WarningNineDatasets => {
                    eprintln!(
                        "warning: 9 datasets open; one slot remains before the limit"
                    );
                }
                AddDatasetResult::ErrorAtLimit => {
                    eprintln!(
                        "error: dataset limit ({}) reached, '{source}' not added",
                        session.max_datasets
                    );
                }
            },
            Err(err) => {
                error!(%source, %err, "failed to load source");
                eprintln!("error: failed to load '{source}': {err}");
            }
        }
    }

    if let Some(active) = session.active_dataset() {
        println!(
            "{}: {} rows x {} columns (from {})",
            active.name,
            active.row_count,
            active.schema.len(),
            active.source
        );
        for (column, dtype) in &active.schema {
            println!("  {column}: {dtype}");
        }
        if let Some(page) = active.get_page(0, settings.default_page_size) {
            println!("{page}");
        }
    } else {
        println!("no datasets loaded; pass one or more SOURCE arguments");
    }

    Ok(())
}
