//! CSV row sink.
//!
//! Writes export rows with the `csv` crate: comma separated, one record per
//! line, quoting only when a field needs it.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use crate::application::RowSink;
use crate::domain::{AppError, ExportRow, Result};

/// CSV writer over any `Write` destination.
pub struct CsvSink<W: Write> {
    writer: csv::Writer<W>,
}

impl CsvSink<File> {
    /// Creates (or truncates) the output file.
    ///
    /// # Errors
    /// Returns error if the file cannot be created.
    pub fn create(path: &Path) -> Result<Self> {
        let file = File::create(path)
            .map_err(|e| AppError::io(format!("Failed to create {}", path.display()), e))?;

        tracing::debug!("Opened output file: {}", path.display());

        Ok(Self::from_writer(file))
    }
}

impl<W: Write> CsvSink<W> {
    /// Wraps an arbitrary writer.
    pub fn from_writer(inner: W) -> Self {
        let writer = csv::WriterBuilder::new()
            .terminator(csv::Terminator::Any(b'\n'))
            .from_writer(inner);
        Self { writer }
    }

    /// Flushes and returns the underlying writer.
    ///
    /// # Errors
    /// Returns error if the flush fails.
    pub fn into_inner(self) -> Result<W> {
        self.writer.into_inner().map_err(|e| AppError::Io {
            message: "Failed to flush CSV output".into(),
            source: Some(e.into_error()),
        })
    }
}

impl<W: Write> RowSink for CsvSink<W> {
    fn write_header(&mut self, header: &[&str; 3]) -> Result<()> {
        self.writer.write_record(header).map_err(AppError::sink)
    }

    fn write_row(&mut self, row: &ExportRow) -> Result<()> {
        self.writer
            .write_record(row.to_record())
            .map_err(AppError::sink)
    }

    fn finish(self) -> Result<()> {
        self.into_inner().map(drop)
    }
}
