//! Output formatting for export summaries.
//!
//! Supports a human-readable table and JSON.

use chrono::DateTime;
use colored::Colorize;
use comfy_table::{presets::UTF8_FULL, Table};

use crate::domain::ExportSummary;

/// Summary output format options.
#[derive(Debug, Clone, Copy, Default)]
pub enum OutputFormat {
    /// Colored header plus a per-sender table.
    #[default]
    Table,
    /// JSON format for programmatic use.
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "table" => Ok(Self::Table),
            "json" => Ok(Self::Json),
            _ => Err(format!("Unknown format: {s}. Use: table, json")),
        }
    }
}

/// Formats the summary as text with a per-sender table.
pub fn format_summary_table(summary: &ExportSummary) -> String {
    let mut out = format!(
        "{} {} rows for {} ({})\n",
        "✓".green().bold(),
        summary.rows_written.to_string().cyan(),
        summary.target_name.bold(),
        summary.chat_id
    );

    out.push_str(&format!(
        "  Messages retrieved: {}\n",
        summary.messages_retrieved.to_string().yellow()
    ));

    if let (Some(first), Some(last)) = (summary.first_timestamp, summary.last_timestamp) {
        out.push_str(&format!(
            "  Time range: {} → {}\n",
            format_timestamp(first),
            format_timestamp(last)
        ));
    }

    if !summary.per_sender.is_empty() {
        let mut table = Table::new();
        table.load_preset(UTF8_FULL);
        table.set_header(vec!["Sender", "Messages"]);
        for sender in &summary.per_sender {
            table.add_row(vec![sender.name.clone(), sender.count.to_string()]);
        }
        out.push('\n');
        out.push_str(&table.to_string());
    }

    out
}

/// Formats the summary as JSON.
///
/// # Errors
/// Returns error if serialization fails.
pub fn format_summary_json(summary: &ExportSummary) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(summary)
}

/// Formats epoch seconds as a UTC date-time.
fn format_timestamp(secs: i64) -> String {
    DateTime::from_timestamp(secs, 0).map_or_else(
        || secs.to_string(),
        |dt| dt.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
    )
}
