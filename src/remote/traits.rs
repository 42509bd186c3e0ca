use std::{
    pin::Pin,
    task::{Context, Poll},
};

use async_trait::async_trait;
use futures::Stream;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio_util::sync::{CancellationToken, DropGuard};

use super::error::RemoteResult;
use crate::store::Collection;

/// Sort applied to remote scans.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderBy {
    pub field: String,
    pub descending: bool,
}

impl OrderBy {
    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            descending: true,
        }
    }
}

/// Document-level access to the remote replica.
///
/// Records cross this boundary in the same JSON shape the local store uses,
/// key field included.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Creates or fully replaces the document `id`.
    async fn upsert(&self, collection: Collection, id: &str, record: &Value) -> RemoteResult<()>;

    async fn get(&self, collection: Collection, id: &str) -> RemoteResult<Option<Value>>;

    async fn list(&self, collection: Collection, order: &OrderBy) -> RemoteResult<Vec<Value>>;

    /// Removes the document `id`. Absent documents are not an error.
    async fn delete(&self, collection: Collection, id: &str) -> RemoteResult<()>;

    /// Opens a listener delivering the full ordered collection every time it
    /// changes. The first snapshot arrives without waiting for a change. An
    /// `Err` item means the listener is broken and will yield nothing more.
    async fn subscribe(&self, collection: Collection, order: &OrderBy)
    -> RemoteResult<RemoteListener>;
}

/// Stream of remote snapshots. Dropping it stops the producer.
pub struct RemoteListener {
    snapshots: mpsc::Receiver<RemoteResult<Vec<Value>>>,
    _guard: DropGuard,
}

impl RemoteListener {
    /// `cancel` is triggered when the listener is dropped; producers should
    /// stop once it fires.
    pub fn new(
        snapshots: mpsc::Receiver<RemoteResult<Vec<Value>>>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            snapshots,
            _guard: cancel.drop_guard(),
        }
    }
}

impl Stream for RemoteListener {
    type Item = RemoteResult<Vec<Value>>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.snapshots.poll_recv(cx)
    }
}
