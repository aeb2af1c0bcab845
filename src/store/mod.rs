//! External tabular store the batch reads records from and writes results to.

pub mod sheets;

use thiserror::Error;

use crate::state_machine::{AttendeeRecord, ProcessingResult};

pub use sheets::SheetsStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("network error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("sheets API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("malformed worksheet: {0}")]
    Malformed(String),

    #[error("row {0} was not read from the worksheet")]
    UnknownRow(u32),
}

/// Row-indexed source of attendee records.
///
/// Row numbers handed out by [`read_all`](RecordStore::read_all) stay valid
/// for the whole run; results are written back by row.
pub trait RecordStore {
    async fn read_all(&mut self) -> Result<Vec<AttendeeRecord>, StoreError>;

    async fn write_status(&mut self, row: u32, result: &ProcessingResult)
    -> Result<(), StoreError>;
}
