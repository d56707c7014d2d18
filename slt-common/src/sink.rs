//! Persistence port
//!
//! The submission coordinator hands a whole batch of [`Row`]s to a
//! [`RowSink`] in one call. Implementations live in the service crate
//! (SQLite table, Google Sheets).

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

/// One persisted response row: one item with all of its dimensions
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Row {
    pub contact: String,
    pub section_id: String,
    /// 1-based item number within the section
    pub item_number: usize,
    pub media: Vec<String>,
    /// `(dimension name, answer)` in declared dimension order
    pub answers: Vec<(String, String)>,
}

impl Row {
    /// Flattened layout: `[contact, section, item, media..., answers...]`
    ///
    /// Width is constant for all rows of one section.
    pub fn cells(&self) -> Vec<String> {
        let mut cells = Vec::with_capacity(3 + self.media.len() + self.answers.len());
        cells.push(self.contact.clone());
        cells.push(self.section_id.clone());
        cells.push(self.item_number.to_string());
        cells.extend(self.media.iter().cloned());
        cells.extend(self.answers.iter().map(|(_, value)| value.clone()));
        cells
    }
}

/// Acknowledgement from a sink
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Ack {
    pub rows_written: usize,
}

/// Failure of a batch append
#[derive(Debug, Error)]
pub enum PersistenceError {
    /// Database write failed
    #[error("Database error: {0}")]
    Database(String),

    /// Remote store unreachable or transport failure
    #[error("HTTP error: {0}")]
    Http(String),

    /// Remote store answered but refused the append
    #[error("Append rejected (status {status}): {message}")]
    Rejected { status: u16, message: String },
}

/// Append-only row store
#[async_trait]
pub trait RowSink: Send + Sync {
    /// Sink name for logging
    fn name(&self) -> &'static str;

    /// Append the full batch as a single logical submission
    async fn append_rows(&self, rows: &[Row]) -> Result<Ack, PersistenceError>;
}
