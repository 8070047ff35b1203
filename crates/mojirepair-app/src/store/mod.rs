//! Access to the remote record collection.

pub mod postgrest;
pub mod types;

use async_trait::async_trait;

pub use postgrest::PostgrestStore;
pub use types::{Record, RecordId, RecordPatch, StoreError};

/// Paged reads and partial writes against the record collection.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Returns the records in `[offset, offset + limit)`; an empty page means exhaustion.
    async fn fetch_page(&self, offset: usize, limit: usize) -> Result<Vec<Record>, StoreError>;

    /// Applies `patch` to the record keyed by `id`. Empty patches fail without a request.
    async fn update(&self, id: &RecordId, patch: &RecordPatch) -> Result<(), StoreError>;
}
