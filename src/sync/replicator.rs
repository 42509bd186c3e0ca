//! Best-effort propagation of local writes to the remote replica.
//!
//! In `detached` mode operations go through a single FIFO worker, so the
//! remote sees writes in the order the local store committed them even though
//! callers never wait. In `awaited` mode each operation runs inline.
//!
//! Keys with a write still on its way to the remote are tracked as pending.
//! Until it lands the remote copy of such a key is older than the local one,
//! so full scans must not let it win.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError},
};

use serde_json::Value;
use tokio::sync::{
    mpsc::{self, error::TrySendError},
    oneshot,
};

use crate::{config::RemoteWriteMode, remote::RemoteStore, store::Collection};

/// Queued remote operations before new writes are refused.
const QUEUE_CAPACITY: usize = 1000;

type RecordRef = (Collection, String);

pub(crate) enum RemoteOp {
    Upsert {
        collection: Collection,
        key: String,
        record: Value,
    },
    Delete {
        collection: Collection,
        key: String,
    },
    Flush(oneshot::Sender<()>),
}

impl RemoteOp {
    fn target(&self) -> Option<RecordRef> {
        match self {
            RemoteOp::Upsert { collection, key, .. } | RemoteOp::Delete { collection, key } => {
                Some((*collection, key.clone()))
            }
            RemoteOp::Flush(_) => None,
        }
    }
}

/// Number of unfinished remote writes per record.
#[derive(Default)]
struct PendingKeys(Mutex<HashMap<RecordRef, usize>>);

impl PendingKeys {
    fn lock(&self) -> MutexGuard<'_, HashMap<RecordRef, usize>> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn mark(&self, target: &RecordRef) {
        *self.lock().entry(target.clone()).or_insert(0) += 1;
    }

    fn settle(&self, target: &RecordRef) {
        let mut pending = self.lock();
        if let Some(count) = pending.get_mut(target) {
            *count -= 1;
            if *count == 0 {
                pending.remove(target);
            }
        }
    }

    fn contains(&self, collection: Collection, key: &str) -> bool {
        self.lock().contains_key(&(collection, key.to_string()))
    }
}

pub(crate) struct Replicator {
    remote: Arc<dyn RemoteStore>,
    mode: RemoteWriteMode,
    queue: OnceLock<mpsc::Sender<RemoteOp>>,
    pending: Arc<PendingKeys>,
}

impl Replicator {
    pub(crate) fn new(remote: Arc<dyn RemoteStore>, mode: RemoteWriteMode) -> Self {
        Self {
            remote,
            mode,
            queue: OnceLock::new(),
            pending: Arc::new(PendingKeys::default()),
        }
    }

    pub(crate) async fn submit(&self, op: RemoteOp) {
        let target = op.target();
        if let Some(target) = &target {
            self.pending.mark(target);
        }

        match self.mode {
            RemoteWriteMode::Awaited => {
                apply(self.remote.as_ref(), op).await;
                if let Some(target) = &target {
                    self.pending.settle(target);
                }
            }
            RemoteWriteMode::Detached => {
                if let Err(e) = self.sender().try_send(op) {
                    match e {
                        TrySendError::Full(_) => tracing::warn!(
                            capacity = QUEUE_CAPACITY,
                            "Remote write queue full; write kept locally only"
                        ),
                        TrySendError::Closed(_) => {
                            tracing::warn!("Remote write queue closed; write kept locally only")
                        }
                    }
                    if let Some(target) = &target {
                        self.pending.settle(target);
                    }
                }
            }
        }
    }

    /// True while a write of this record has not reached the remote yet.
    pub(crate) fn is_pending(&self, collection: Collection, key: &str) -> bool {
        self.pending.contains(collection, key)
    }

    /// Waits until every operation submitted so far has been attempted.
    pub(crate) async fn flush(&self) {
        let Some(queue) = self.queue.get() else {
            return;
        };
        let (done, wait) = oneshot::channel();
        if queue.send(RemoteOp::Flush(done)).await.is_ok() {
            let _ = wait.await;
        }
    }

    /// Lazily starts the worker; must be called from within a Tokio runtime.
    fn sender(&self) -> &mpsc::Sender<RemoteOp> {
        self.queue.get_or_init(|| {
            let (tx, mut rx) = mpsc::channel::<RemoteOp>(QUEUE_CAPACITY);
            let remote = Arc::clone(&self.remote);
            let pending = Arc::clone(&self.pending);
            tokio::spawn(async move {
                while let Some(op) = rx.recv().await {
                    let target = op.target();
                    apply(remote.as_ref(), op).await;
                    if let Some(target) = &target {
                        pending.settle(target);
                    }
                }
                tracing::debug!("Remote write worker stopped");
            });
            tx
        })
    }
}

async fn apply(remote: &dyn RemoteStore, op: RemoteOp) {
    match op {
        RemoteOp::Upsert {
            collection,
            key,
            record,
        } => match remote.upsert(collection, &key, &record).await {
            Ok(()) => tracing::debug!(collection = %collection, key = %key, "Replicated write"),
            Err(e) => tracing::warn!(
                collection = %collection,
                key = %key,
                error = %e,
                "Remote write failed; local copy kept"
            ),
        },
        RemoteOp::Delete { collection, key } => match remote.delete(collection, &key).await {
            Ok(()) => tracing::debug!(collection = %collection, key = %key, "Replicated delete"),
            Err(e) => tracing::warn!(
                collection = %collection,
                key = %key,
                error = %e,
                "Remote delete failed; record may reappear on the next merge"
            ),
        },
        RemoteOp::Flush(done) => {
            let _ = done.send(());
        }
    }
}
