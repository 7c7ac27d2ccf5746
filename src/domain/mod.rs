//! Domain layer - core business logic and types.
//!
//! This layer contains pure domain models and error types
//! without any external dependencies (DB, IO, etc.).

pub mod config;
pub mod error;
pub mod models;

pub use config::{AppConfig, LoggingConfig};
pub use error::{AppError, ExportStage, Result};
pub use models::{
    ContactBook, Direction, ExportRequest, ExportRow, ExportSummary, Identity, Message,
    SenderCount, EXPORT_HEADER,
};
