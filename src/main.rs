//! WeChat Chat Export - dump one chat's message timeline from a WeChat backup.
//!
//! This tool reads the decrypted `SQLite` databases of a WeChat desktop
//! backup, finds the chat whose nickname matches `--name`, and writes one CSV
//! row `(timestamp, 1, sender)` per message.
//!
//! QUICK START:
//!   wechat-chat-export -p <data-dir> -n Alice                 # latest 50000 messages
//!   wechat-chat-export -p <data-dir> -n Alice -o alice.csv    # custom output
//!   wechat-chat-export -p <data-dir> -n Alice -d forward -l 100 -a 1700000000
//!   wechat-chat-export -p <data-dir> -n Alice -f json         # JSON summary

mod application;
mod cli;
mod domain;
mod infrastructure;

use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;

use clap::Parser;
use colored::Colorize;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use application::{format_summary_json, format_summary_table, ExportPipeline, OutputFormat};
use cli::Cli;
use domain::{AppConfig, AppError, LoggingConfig};
use infrastructure::{load_config, CsvSink, WechatStore};

fn main() {
    let cli = Cli::parse();

    if let Err(e) = start(&cli) {
        if let Some(stage) = e.stage() {
            tracing::error!(stage = %stage, error = %e.root(), "Export failed");
        }
        eprintln!("{} {}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}

/// Loads configuration, installs logging and runs the export.
fn start(cli: &Cli) -> domain::Result<()> {
    let format = cli
        .output_format()
        .map_err(|message| AppError::Config { message })?;

    let mut config = load_config(cli.config.as_deref())?;
    cli.apply_overrides(&mut config)
        .map_err(|message| AppError::Config { message })?;

    setup_logging(cli.verbose, &config.logging)?;

    run(cli, &config, format)
}

/// Main application logic.
fn run(cli: &Cli, config: &AppConfig, format: OutputFormat) -> domain::Result<()> {
    tracing::info!("====================== wechat-chat-export ======================");

    let store = WechatStore::open(&cli.path)?;
    tracing::debug!(prefix = store.prefix(), "Opened WeChat store");

    let request = cli.export_request(config);
    let output: &Path = &config.export.output;

    let summary =
        ExportPipeline::new(store.contacts(), &store).run(&request, || CsvSink::create(output))?;

    let report = match format {
        OutputFormat::Table => format_summary_table(&summary),
        OutputFormat::Json => format_summary_json(&summary).map_err(AppError::json_parse)?,
    };

    println!("{report}");
    if matches!(format, OutputFormat::Table) {
        println!();
        println!("{} {}", "📁 Written to".bold(), output.display());
    }

    Ok(())
}

/// Setup tracing/logging based on verbosity level.
///
/// Logs always go to stderr, leaving stdout to the summary; when
/// `logging.file` is set they are appended to that file as well.
fn setup_logging(verbosity: u8, logging: &LoggingConfig) -> domain::Result<()> {
    let filter = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    let file_layer = match &logging.file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|e| {
                    AppError::io(format!("Failed to open log file {}", path.display()), e)
                })?;
            Some(
                fmt::layer()
                    .with_ansi(false)
                    .with_file(true)
                    .with_line_number(true)
                    .with_writer(Mutex::new(file)),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_target(false)
                .without_time()
                .with_writer(std::io::stderr),
        )
        .with(file_layer)
        .with(filter)
        .init();

    Ok(())
}
