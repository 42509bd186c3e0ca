use std::{sync::Arc, time::Duration};

use futures::StreamExt;
use serde_json::Value;
use tokio::{
    sync::watch,
    time::{Instant, MissedTickBehavior},
};
use tokio_util::sync::CancellationToken;

use super::replicator::Replicator;
use crate::{
    remote::{OrderBy, RemoteListener, RemoteReplica},
    store::{Collection, LocalStore},
};

pub type SnapshotCallback = Arc<dyn Fn(Vec<Value>) + Send + Sync>;

/// Where a subscription's snapshots currently come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionMode {
    /// Following a live remote listener.
    RemoteLive,
    /// Re-reading the local store on a fixed interval.
    LocalPoll,
}

/// Handle to a running subscription.
///
/// The same handle controls the subscription whichever mode it is in.
/// Dropping it unsubscribes.
pub struct Subscription {
    cancel: CancellationToken,
    mode: watch::Receiver<SubscriptionMode>,
}

impl Subscription {
    /// Stops delivery. Idempotent. A callback already running may finish,
    /// but pending ticks and listener events are discarded.
    pub fn unsubscribe(&self) {
        self.cancel.cancel();
    }

    pub fn is_active(&self) -> bool {
        !self.cancel.is_cancelled()
    }

    pub fn mode(&self) -> SubscriptionMode {
        *self.mode.borrow()
    }

    /// Resolves once the subscription reaches `mode`. Returns `false` if the
    /// subscription ended first.
    pub async fn wait_for_mode(&mut self, mode: SubscriptionMode) -> bool {
        self.mode.wait_for(|current| *current == mode).await.is_ok()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

pub(crate) struct SubscriptionWorker {
    local: Arc<dyn LocalStore>,
    remote: RemoteReplica,
    replicator: Option<Arc<Replicator>>,
    collection: Collection,
    order: OrderBy,
    poll_interval: Duration,
    callback: SnapshotCallback,
    cancel: CancellationToken,
    mode: watch::Sender<SubscriptionMode>,
}

impl SubscriptionWorker {
    /// Spawns the worker and returns its handle.
    pub(crate) fn spawn(
        local: Arc<dyn LocalStore>,
        remote: RemoteReplica,
        replicator: Option<Arc<Replicator>>,
        collection: Collection,
        order: OrderBy,
        poll_interval: Duration,
        callback: SnapshotCallback,
    ) -> Subscription {
        let cancel = CancellationToken::new();
        let (mode_tx, mode_rx) = watch::channel(SubscriptionMode::LocalPoll);

        let worker = SubscriptionWorker {
            local,
            remote,
            replicator,
            collection,
            order,
            poll_interval,
            callback,
            cancel: cancel.clone(),
            mode: mode_tx,
        };
        tokio::spawn(worker.run());

        Subscription {
            cancel,
            mode: mode_rx,
        }
    }

    async fn run(self) {
        if self.remote.is_enabled() {
            let listener = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return,
                listener = self.remote.subscribe(self.collection, &self.order) => listener,
            };
            match listener {
                Ok(listener) => {
                    self.mode.send_replace(SubscriptionMode::RemoteLive);
                    tracing::debug!(collection = %self.collection, "Subscription following remote");
                    self.follow_remote(listener).await;
                    if self.cancel.is_cancelled() {
                        return;
                    }
                    self.mode.send_replace(SubscriptionMode::LocalPoll);
                    self.deliver_local().await;
                    self.poll_local(Instant::now() + self.poll_interval).await;
                    return;
                }
                Err(e) => {
                    tracing::warn!(
                        collection = %self.collection,
                        error = %e,
                        "Remote listener unavailable; polling local store"
                    );
                }
            }
        }
        self.poll_local(Instant::now()).await;
    }

    async fn follow_remote(&self, mut listener: RemoteListener) {
        loop {
            let item = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return,
                item = listener.next() => item,
            };
            match item {
                Some(Ok(records)) => {
                    for record in &records {
                        if self.has_pending_write(record) {
                            continue;
                        }
                        if let Err(e) = self.local.put(self.collection, record.clone()).await {
                            tracing::warn!(
                                collection = %self.collection,
                                error = %e,
                                "Failed to cache remote record locally"
                            );
                        }
                    }
                    self.emit(records);
                }
                Some(Err(e)) => {
                    tracing::warn!(
                        collection = %self.collection,
                        error = %e,
                        "Remote listener failed; falling back to local polling"
                    );
                    return;
                }
                None => {
                    tracing::warn!(
                        collection = %self.collection,
                        "Remote listener closed; falling back to local polling"
                    );
                    return;
                }
            }
        }
    }

    async fn poll_local(&self, start: Instant) {
        let mut ticker = tokio::time::interval_at(start, self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return,
                _ = ticker.tick() => {}
            }
            self.deliver_local().await;
        }
    }

    async fn deliver_local(&self) {
        match self.local.get_all(self.collection).await {
            Ok(records) => self.emit(records),
            Err(e) => tracing::warn!(
                collection = %self.collection,
                error = %e,
                "Failed to read local snapshot"
            ),
        }
    }

    /// A record whose local write is still queued for the remote.
    fn has_pending_write(&self, record: &Value) -> bool {
        let (Some(replicator), Ok(key)) = (&self.replicator, self.collection.record_key(record))
        else {
            return false;
        };
        replicator.is_pending(self.collection, &key)
    }

    fn emit(&self, records: Vec<Value>) {
        // A tick that raced with unsubscribe is dropped here.
        if self.cancel.is_cancelled() {
            return;
        }
        (self.callback)(records);
    }
}
