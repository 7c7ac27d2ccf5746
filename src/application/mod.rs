//! Application layer - use cases and orchestration.
//!
//! This layer contains the export pipeline, sender name resolution and
//! summary formatting.

pub mod formatter;
pub mod pipeline;
pub mod resolver;

pub use formatter::{format_summary_json, format_summary_table, OutputFormat};
pub use pipeline::{ExportPipeline, MessageRetriever, RowSink};
