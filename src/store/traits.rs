use async_trait::async_trait;
use serde_json::Value;

use super::{error::StoreResult, schema::Collection};

/// Durable keyed storage for the six record collections.
///
/// Records are JSON objects whose key lives in [`Collection::key_field`].
/// A `put` replaces the whole record. Secondary index entries are written in
/// the same atomic step as the record they describe, so an index lookup never
/// returns a stale or missing record.
///
/// Every operation fails with `StoreError::NotInitialized` until
/// [`init`](LocalStore::init) has completed.
#[async_trait]
pub trait LocalStore: Send + Sync {
    /// Opens the store, creating or upgrading its layout. Safe to call more
    /// than once; existing data is never discarded.
    async fn init(&self) -> StoreResult<()>;

    fn is_initialized(&self) -> bool;

    /// Inserts or replaces a record under its key.
    async fn put(&self, collection: Collection, record: Value) -> StoreResult<()>;

    async fn get(&self, collection: Collection, key: &str) -> StoreResult<Option<Value>>;

    /// All records in a collection, ordered by key.
    async fn get_all(&self, collection: Collection) -> StoreResult<Vec<Value>>;

    /// Removes a record and its index entries. Absent keys are not an error.
    async fn delete(&self, collection: Collection, key: &str) -> StoreResult<()>;

    /// Records whose indexed field equals `value`, ordered by key.
    async fn get_by_index(
        &self,
        collection: Collection,
        index: &str,
        value: &Value,
    ) -> StoreResult<Vec<Value>>;

    /// Single-record lookup, meant for unique indexes.
    async fn get_one_by_index(
        &self,
        collection: Collection,
        index: &str,
        value: &Value,
    ) -> StoreResult<Option<Value>> {
        Ok(self
            .get_by_index(collection, index, value)
            .await?
            .into_iter()
            .next())
    }
}
