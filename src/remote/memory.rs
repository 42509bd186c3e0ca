use std::{
    collections::HashMap,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::{RwLock, broadcast, mpsc};
use tokio_util::sync::CancellationToken;

use super::{
    error::{RemoteError, RemoteResult},
    traits::{OrderBy, RemoteListener, RemoteStore},
};
use crate::store::{Collection, compare_by_field};

const EVENT_CAPACITY: usize = 256;

#[derive(Debug, Clone)]
enum RemoteEvent {
    Changed(Collection),
    Outage,
}

struct Inner {
    documents: RwLock<HashMap<Collection, HashMap<String, Value>>>,
    available: AtomicBool,
    events: broadcast::Sender<RemoteEvent>,
}

/// In-process remote replica.
///
/// Behaves like a document database shared by every clone of the handle:
/// writes from one clone are visible to listeners opened on another. Taking it
/// offline with [`set_available(false)`](Self::set_available) makes every call
/// fail with `Unavailable` and breaks live listeners.
#[derive(Clone)]
pub struct MemoryRemote {
    inner: Arc<Inner>,
}

impl Default for MemoryRemote {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryRemote {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            inner: Arc::new(Inner {
                documents: RwLock::new(HashMap::new()),
                available: AtomicBool::new(true),
                events,
            }),
        }
    }

    pub fn set_available(&self, available: bool) {
        let was = self.inner.available.swap(available, Ordering::SeqCst);
        if was && !available {
            let _ = self.inner.events.send(RemoteEvent::Outage);
        }
    }

    pub fn is_available(&self) -> bool {
        self.inner.available.load(Ordering::SeqCst)
    }

    /// Number of documents currently held, regardless of availability.
    pub async fn count(&self, collection: Collection) -> usize {
        self.inner
            .documents
            .read()
            .await
            .get(&collection)
            .map_or(0, HashMap::len)
    }

    fn ensure_available(&self) -> RemoteResult<()> {
        if self.is_available() {
            Ok(())
        } else {
            Err(RemoteError::Unavailable("remote replica is offline".into()))
        }
    }

    fn notify(&self, collection: Collection) {
        let _ = self.inner.events.send(RemoteEvent::Changed(collection));
    }
}

#[async_trait]
impl RemoteStore for MemoryRemote {
    async fn upsert(&self, collection: Collection, id: &str, record: &Value) -> RemoteResult<()> {
        self.ensure_available()?;
        let mut record = record.clone();
        if let Some(object) = record.as_object_mut() {
            object.insert(collection.key_field().into(), Value::String(id.to_string()));
        }
        self.inner
            .documents
            .write()
            .await
            .entry(collection)
            .or_default()
            .insert(id.to_string(), record);
        self.notify(collection);
        Ok(())
    }

    async fn get(&self, collection: Collection, id: &str) -> RemoteResult<Option<Value>> {
        self.ensure_available()?;
        Ok(self
            .inner
            .documents
            .read()
            .await
            .get(&collection)
            .and_then(|docs| docs.get(id))
            .cloned())
    }

    async fn list(&self, collection: Collection, order: &OrderBy) -> RemoteResult<Vec<Value>> {
        self.ensure_available()?;
        let mut records: Vec<Value> = self
            .inner
            .documents
            .read()
            .await
            .get(&collection)
            .map(|docs| docs.values().cloned().collect())
            .unwrap_or_default();
        records.sort_by(|a, b| {
            let ord = compare_by_field(a, b, &order.field);
            if order.descending { ord.reverse() } else { ord }
        });
        Ok(records)
    }

    async fn delete(&self, collection: Collection, id: &str) -> RemoteResult<()> {
        self.ensure_available()?;
        let removed = self
            .inner
            .documents
            .write()
            .await
            .get_mut(&collection)
            .and_then(|docs| docs.remove(id));
        if removed.is_some() {
            self.notify(collection);
        }
        Ok(())
    }

    async fn subscribe(
        &self,
        collection: Collection,
        order: &OrderBy,
    ) -> RemoteResult<RemoteListener> {
        self.ensure_available()?;

        // Subscribe before the first snapshot so no change slips between them.
        let mut events = self.inner.events.subscribe();
        let (tx, rx) = mpsc::channel(16);
        let cancel = CancellationToken::new();
        let stop = cancel.clone();
        let remote = self.clone();
        let order = order.clone();

        tokio::spawn(async move {
            let mut send_snapshot = true;
            loop {
                if send_snapshot {
                    let snapshot = remote.list(collection, &order).await;
                    let failed = snapshot.is_err();
                    if tx.send(snapshot).await.is_err() || failed {
                        return;
                    }
                }

                let event = tokio::select! {
                    biased;
                    _ = stop.cancelled() => return,
                    event = events.recv() => event,
                };
                send_snapshot = match event {
                    Ok(RemoteEvent::Changed(changed)) => changed == collection,
                    Ok(RemoteEvent::Outage) => {
                        let _ = tx
                            .send(Err(RemoteError::Unavailable(
                                "remote replica went offline".into(),
                            )))
                            .await;
                        return;
                    }
                    Err(broadcast::error::RecvError::Lagged(_)) => true,
                    Err(broadcast::error::RecvError::Closed) => return,
                };
            }
        });

        Ok(RemoteListener::new(rx, cancel))
    }
}
