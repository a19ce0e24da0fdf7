//! Bulk loading of consumption records: CSV rows are parsed into a record
//! stream, checked, and written to storage in retried batches.

pub mod csv_source;
pub mod loader;
pub mod validation;

use std::pin::Pin;

use consumption_client::domain::ConsumptionRecord;
use futures::Stream;

pub use csv_source::ConsumptionCsvSource;
pub use loader::{BatchWriter, PgBatchWriter, SeedLoader};
pub use validation::{validate_consumption, validated};

#[derive(thiserror::Error, Debug)]
pub enum IngestError {
    #[error("unreadable record: {0}")]
    Parse(String),
    #[error("invalid record: {0}")]
    Invalid(String),
    #[error("write failed: {0}")]
    Write(String),
}

/// Counts reported once the input is exhausted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestSummary {
    pub written: usize,
    pub rejected: usize,
}

/// Records in file order. `Err` items are rows that were rejected; the stream
/// carries on after them.
pub type RecordStream = Pin<Box<dyn Stream<Item = Result<ConsumptionRecord, IngestError>> + Send>>;
