//! Infrastructure layer - external adapters (database, filesystem).
//!
//! This layer handles all I/O operations and external dependencies.

pub mod bytes_extra;
pub mod config;
pub mod csv_sink;
pub mod wechat_paths;
pub mod wechat_store;

pub use config::load_config;
pub use csv_sink::CsvSink;
pub use wechat_store::WechatStore;
