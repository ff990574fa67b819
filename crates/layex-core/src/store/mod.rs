//! Record persistence.

mod json;
mod lines;

use crate::error::StoreError;
use crate::models::record::ParsedRecord;

pub use json::JsonRecordStore;
pub use lines::JsonLinesStore;

/// Destination for parsed records, keyed by case identifier.
///
/// Only the orchestrator thread writes to a store.
pub trait RecordStore {
    /// Insert or replace the record with the same case identifier.
    fn upsert(&mut self, record: &ParsedRecord) -> Result<(), StoreError>;

    /// Start grouping upserts into one delayed write.
    fn begin_batch(&mut self) -> Result<(), StoreError> {
        Ok(())
    }

    /// Make every upsert since `begin_batch` durable.
    fn end_batch(&mut self) -> Result<(), StoreError> {
        Ok(())
    }

    /// Drop every upsert since `begin_batch` and close the batch.
    fn abort_batch(&mut self) -> Result<(), StoreError> {
        Ok(())
    }
}

impl<S: RecordStore + ?Sized> RecordStore for Box<S> {
    fn upsert(&mut self, record: &ParsedRecord) -> Result<(), StoreError> {
        (**self).upsert(record)
    }

    fn begin_batch(&mut self) -> Result<(), StoreError> {
        (**self).begin_batch()
    }

    fn end_batch(&mut self) -> Result<(), StoreError> {
        (**self).end_batch()
    }

    fn abort_batch(&mut self) -> Result<(), StoreError> {
        (**self).abort_batch()
    }
}
