//! CLI interface using clap.
//!
//! Provides command-line arguments for the export.

use std::path::PathBuf;

use clap::builder::{NonEmptyStringValueParser, TypedValueParser};
use clap::Parser;

use crate::application::OutputFormat;
use crate::domain::{AppConfig, Direction, ExportRequest};

/// WeChat Chat Export - write one chat's message timeline to CSV.
///
/// Example: wechat-chat-export -p 'E:\wechatDataBackup\User\wxid_xxx' -n Alice -o alice.csv
#[derive(Parser, Debug)]
#[command(name = "wechat-chat-export")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// WeChat user data directory (e.g. .../User/wxid_xxx).
    #[arg(short, long, value_parser = NonEmptyStringValueParser::new().map(PathBuf::from))]
    pub path: PathBuf,

    /// Nickname of the chat to export.
    #[arg(short, long, value_parser = NonEmptyStringValueParser::new())]
    pub name: String,

    /// Output CSV path [default: messages.csv].
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Maximum number of messages to export [default: 50000].
    #[arg(short, long)]
    pub limit: Option<usize>,

    /// Time anchor in seconds since the epoch (0 = latest).
    #[arg(short, long)]
    pub anchor: Option<i64>,

    /// Retrieval direction: backward or forward.
    #[arg(short, long)]
    pub direction: Option<String>,

    /// Configuration file (defaults to ~/.wechat-chat-export/config.toml).
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Also write log lines to this file.
    #[arg(long, value_name = "FILE")]
    pub log_file: Option<PathBuf>,

    /// Summary format: table or json.
    #[arg(short, long, default_value = "table")]
    pub format: String,

    /// Enable verbose logging (use multiple times for more verbosity).
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

impl Cli {
    /// Parse the summary format argument.
    pub fn output_format(&self) -> Result<OutputFormat, String> {
        self.format.parse()
    }

    /// Command-line flags take precedence over the config file.
    pub fn apply_overrides(&self, config: &mut AppConfig) -> Result<(), String> {
        if let Some(output) = &self.output {
            config.export.output.clone_from(output);
        }
        if let Some(limit) = self.limit {
            config.export.max_rows = limit;
        }
        if let Some(anchor) = self.anchor {
            config.export.anchor = anchor;
        }
        if let Some(direction) = &self.direction {
            config.export.direction = direction.parse::<Direction>()?;
        }
        if let Some(log_file) = &self.log_file {
            config.logging.file = Some(log_file.clone());
        }
        Ok(())
    }

    /// Builds the export request from the merged configuration.
    pub fn export_request(&self, config: &AppConfig) -> ExportRequest {
        ExportRequest {
            target_name: self.name.clone(),
            anchor: config.export.anchor,
            max_count: config.export.max_rows,
            direction: config.export.direction,
        }
    }
}
