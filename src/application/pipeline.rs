//! Export pipeline.
//!
//! Resolves the chat, fetches one batch of messages, projects them into
//! rows and writes the rows to a sink. Every failure is terminal.

use std::collections::HashMap;

use crate::domain::{
    AppError, ContactBook, Direction, ExportRequest, ExportRow, ExportStage, ExportSummary,
    Identity, Message, Result, SenderCount, EXPORT_HEADER,
};

use super::resolver::{find_chat_id, resolve_display_name};

/// Source of chat messages.
pub trait MessageRetriever {
    /// Fetches up to `max_count` messages of `chat_id` starting at `anchor`.
    ///
    /// The batch must be ordered according to `direction` and free of
    /// duplicates.
    ///
    /// # Errors
    /// Returns error if the underlying store cannot be queried.
    fn retrieve(
        &self,
        chat_id: &str,
        anchor: i64,
        max_count: usize,
        direction: Direction,
    ) -> Result<Vec<Message>>;
}

/// Destination for export rows.
pub trait RowSink {
    /// Writes the column header.
    ///
    /// # Errors
    /// Returns error if the write fails.
    fn write_header(&mut self, header: &[&str; 3]) -> Result<()>;

    /// Writes a single data row.
    ///
    /// # Errors
    /// Returns error if the write fails.
    fn write_row(&mut self, row: &ExportRow) -> Result<()>;

    /// Flushes buffered output and releases the sink.
    ///
    /// # Errors
    /// Returns error if the flush fails.
    fn finish(self) -> Result<()>;
}

/// Single-chat export over a contact book and a message retriever.
pub struct ExportPipeline<'a, R> {
    contacts: &'a ContactBook,
    retriever: &'a R,
}

impl<'a, R: MessageRetriever> ExportPipeline<'a, R> {
    pub const fn new(contacts: &'a ContactBook, retriever: &'a R) -> Self {
        Self {
            contacts,
            retriever,
        }
    }

    /// Runs the export.
    ///
    /// `open_sink` is only called once the messages have been retrieved, so
    /// a failed lookup or retrieval never creates the output.
    ///
    /// # Errors
    /// Returns a [`AppError::Stage`] naming the failed stage.
    pub fn run<S, F>(&self, request: &ExportRequest, open_sink: F) -> Result<ExportSummary>
    where
        S: RowSink,
        F: FnOnce() -> Result<S>,
    {
        // An empty name would match any contact without a nickname.
        let chat_id = Some(request.target_name.as_str())
            .filter(|name| !name.is_empty())
            .and_then(|name| find_chat_id(name, &self.contacts.users))
            .ok_or_else(|| {
                AppError::TargetNotFound {
                    name: request.target_name.clone(),
                }
                .at(ExportStage::Lookup)
            })?;

        tracing::info!(
            target_name = %request.target_name,
            chat_id,
            "Resolved chat"
        );

        let messages = self
            .retriever
            .retrieve(
                chat_id,
                request.anchor,
                request.max_count,
                request.direction,
            )
            .map_err(|e| e.at(ExportStage::Retrieve))?;

        tracing::info!(
            count = messages.len(),
            direction = %request.direction,
            anchor = request.anchor,
            "Retrieved messages"
        );

        let rows = project(&messages, &self.contacts.self_identity);

        let sink = open_sink().map_err(|e| e.at(ExportStage::Emit))?;
        emit(sink, &rows).map_err(|e| e.at(ExportStage::Emit))?;

        tracing::info!(rows = rows.len(), "Export written");

        Ok(summarize(request, chat_id, messages.len(), &rows))
    }
}

/// Maps messages to rows in batch order, skipping unresolvable senders.
pub fn project(messages: &[Message], self_identity: &Identity) -> Vec<ExportRow> {
    messages
        .iter()
        .filter_map(|m| {
            resolve_display_name(m, self_identity).map(|username| ExportRow {
                timestamp: m.create_time,
                username,
            })
        })
        .collect()
}

/// Writes header and rows, then finishes the sink.
fn emit<S: RowSink>(mut sink: S, rows: &[ExportRow]) -> Result<()> {
    sink.write_header(&EXPORT_HEADER)?;
    for row in rows {
        sink.write_row(row)?;
    }
    sink.finish()
}

fn summarize(
    request: &ExportRequest,
    chat_id: &str,
    messages_retrieved: usize,
    rows: &[ExportRow],
) -> ExportSummary {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for row in rows {
        *counts.entry(row.username.as_str()).or_default() += 1;
    }

    let mut per_sender: Vec<SenderCount> = counts
        .into_iter()
        .map(|(name, count)| SenderCount {
            name: name.to_string(),
            count,
        })
        .collect();
    per_sender.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.name.cmp(&b.name)));

    ExportSummary {
        target_name: request.target_name.clone(),
        chat_id: chat_id.to_string(),
        messages_retrieved,
        rows_written: rows.len(),
        first_timestamp: rows.iter().map(|r| r.timestamp).min(),
        last_timestamp: rows.iter().map(|r| r.timestamp).max(),
        per_sender,
    }
}
