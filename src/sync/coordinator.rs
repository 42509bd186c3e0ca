use std::{collections::HashMap, sync::Arc, time::Duration};

use serde::Serialize;
use serde_json::{Map, Value};

use super::{
    error::{SyncError, SyncResult},
    replicator::{RemoteOp, Replicator},
    subscription::{Subscription, SubscriptionWorker},
};
use crate::{
    config::SyncConfig,
    models::{Entity, new_id, now_millis},
    remote::{OrderBy, RemoteReplica},
    store::{Collection, LocalStore, StoreError},
};

/// Unified CRUD and subscribe surface over the local store and the optional
/// remote replica.
///
/// The local store is always written first and read first. The remote is
/// consulted for misses and full scans, receives every write on a best-effort
/// basis, and never causes an operation to fail.
#[derive(Clone)]
pub struct SyncCoordinator {
    local: Arc<dyn LocalStore>,
    remote: RemoteReplica,
    replicator: Option<Arc<Replicator>>,
    config: SyncConfig,
}

impl SyncCoordinator {
    pub fn new(local: Arc<dyn LocalStore>, remote: RemoteReplica, config: SyncConfig) -> Self {
        let replicator = match &remote {
            RemoteReplica::Connected(store) => Some(Arc::new(Replicator::new(
                Arc::clone(store),
                config.remote_writes,
            ))),
            RemoteReplica::Disabled => None,
        };
        Self {
            local,
            remote,
            replicator,
            config,
        }
    }

    pub fn local(&self) -> &Arc<dyn LocalStore> {
        &self.local
    }

    pub fn is_remote_enabled(&self) -> bool {
        self.remote.is_enabled()
    }

    /// Remote scan order. Collections without creation stamps order by key,
    /// since remote queries drop documents missing the order field.
    fn order(&self, collection: Collection) -> OrderBy {
        if collection.stamps_created() {
            OrderBy::desc(self.config.order_by.clone())
        } else {
            OrderBy::desc(collection.key_field())
        }
    }

    fn is_pending(&self, collection: Collection, key: &str) -> bool {
        self.replicator
            .as_ref()
            .is_some_and(|replicator| replicator.is_pending(collection, key))
    }

    /// Waits for detached remote writes submitted so far.
    pub async fn flush(&self) {
        if let Some(replicator) = &self.replicator {
            replicator.flush().await;
        }
    }

    /// Writes a complete record: local first, then the remote best-effort.
    pub async fn put_record(&self, collection: Collection, record: Value) -> SyncResult<()> {
        let key = collection.record_key(&record)?;
        self.local.put(collection, record.clone()).await?;

        if let Some(replicator) = &self.replicator {
            replicator
                .submit(RemoteOp::Upsert {
                    collection,
                    key,
                    record,
                })
                .await;
        }
        Ok(())
    }

    /// Local hit wins; a miss falls through to the remote and caches the
    /// result locally.
    pub async fn get_record(&self, collection: Collection, id: &str) -> SyncResult<Option<Value>> {
        if let Some(record) = self.local.get(collection, id).await? {
            return Ok(Some(record));
        }
        if !self.remote.is_enabled() {
            return Ok(None);
        }

        match self.remote.get(collection, id).await {
            Ok(Some(record)) => {
                self.local.put(collection, record.clone()).await?;
                tracing::debug!(collection = %collection, id, "Cached remote record locally");
                Ok(Some(record))
            }
            Ok(None) => Ok(None),
            Err(e) => {
                tracing::warn!(collection = %collection, id, error = %e, "Remote read failed");
                Ok(None)
            }
        }
    }

    /// Union of local and remote records, remote winning on key collisions.
    /// Every remote record is written back locally. Order is unspecified.
    ///
    /// Keys with a local write not yet replicated keep their local version;
    /// the remote copy of those is stale and is neither merged nor cached.
    pub async fn list_records(&self, collection: Collection) -> SyncResult<Vec<Value>> {
        let local = self.local.get_all(collection).await?;
        if !self.remote.is_enabled() {
            return Ok(local);
        }

        let remote = match self.remote.list(collection, &self.order(collection)).await {
            Ok(remote) => remote,
            Err(e) => {
                tracing::warn!(collection = %collection, error = %e, "Remote scan failed; using local records");
                return Ok(local);
            }
        };

        let mut merged: HashMap<String, Value> = local
            .into_iter()
            .filter_map(|record| {
                collection
                    .record_key(&record)
                    .ok()
                    .map(|key| (key, record))
            })
            .collect();

        for record in remote {
            let key = match collection.record_key(&record) {
                Ok(key) => key,
                Err(e) => {
                    tracing::warn!(collection = %collection, error = %e, "Skipping malformed remote record");
                    continue;
                }
            };
            if self.is_pending(collection, &key) {
                tracing::debug!(collection = %collection, key = %key, "Keeping local record with unreplicated write");
                continue;
            }
            match self.local.put(collection, record.clone()).await {
                Ok(()) => {}
                Err(e @ (StoreError::Conflict(_) | StoreError::InvalidRecord(_))) => {
                    tracing::warn!(collection = %collection, key = %key, error = %e, "Remote record not cached locally");
                }
                Err(e) => return Err(e.into()),
            }
            merged.insert(key, record);
        }

        Ok(merged.into_values().collect())
    }

    /// Removes locally, then remotely best-effort. Never cascades.
    pub async fn delete_record(&self, collection: Collection, id: &str) -> SyncResult<()> {
        self.local.delete(collection, id).await?;
        if let Some(replicator) = &self.replicator {
            replicator
                .submit(RemoteOp::Delete {
                    collection,
                    key: id.to_string(),
                })
                .await;
        }
        Ok(())
    }

    /// Persists a new record, assigning a key and timestamps when absent.
    pub async fn create_record(&self, collection: Collection, data: Value) -> SyncResult<Value> {
        let Value::Object(mut object) = data else {
            return Err(SyncError::Validation(format!(
                "{} records must be JSON objects",
                collection
            )));
        };

        let key_field = collection.key_field();
        let has_key = matches!(object.get(key_field), Some(Value::String(k)) if !k.is_empty());
        if !has_key {
            object.insert(key_field.to_string(), Value::String(new_id()));
        }

        let now = now_millis();
        if collection.stamps_created() && !object.contains_key("createdAt") {
            object.insert("createdAt".into(), now.into());
        }
        if collection.stamps_updated() && !object.contains_key("updatedAt") {
            let created = object.get("createdAt").and_then(Value::as_i64).unwrap_or(now);
            object.insert("updatedAt".into(), now.max(created).into());
        }

        let record = Value::Object(object);
        self.put_record(collection, record.clone()).await?;
        Ok(record)
    }

    /// Shallow-merges `changes` into an existing record.
    ///
    /// The key and `createdAt` cannot be changed. `updatedAt` strictly
    /// increases even when two updates land in the same millisecond.
    pub async fn update_record(
        &self,
        collection: Collection,
        id: &str,
        changes: Value,
    ) -> SyncResult<Value> {
        let Value::Object(changes) = changes else {
            return Err(SyncError::Validation("changes must be a JSON object".into()));
        };
        let existing = self
            .get_record(collection, id)
            .await?
            .ok_or_else(|| SyncError::not_found(collection, id))?;
        let Value::Object(mut object) = existing else {
            return Err(StoreError::InvalidRecord(format!("{} '{}' is not an object", collection, id)).into());
        };

        let previous_stamp = object
            .get("updatedAt")
            .or_else(|| object.get("createdAt"))
            .and_then(Value::as_i64);

        let key_field = collection.key_field();
        for (field, value) in changes {
            if field == key_field || field == "createdAt" {
                continue;
            }
            object.insert(field, value);
        }
        object.insert(key_field.to_string(), Value::String(id.to_string()));

        if collection.stamps_updated() {
            let floor = previous_stamp.map_or(i64::MIN, |stamp| stamp.saturating_add(1));
            object.insert("updatedAt".into(), now_millis().max(floor).into());
        }

        let record = Value::Object(object);
        self.put_record(collection, record.clone()).await?;
        Ok(record)
    }

    /// Starts delivering snapshots of `collection` to `callback`.
    ///
    /// Follows the remote listener when one can be opened, otherwise polls the
    /// local store every `sync.poll_interval_ms`. Must be called from within a
    /// Tokio runtime.
    pub fn subscribe<F>(&self, collection: Collection, callback: F) -> Subscription
    where
        F: Fn(Vec<Value>) + Send + Sync + 'static,
    {
        SubscriptionWorker::spawn(
            Arc::clone(&self.local),
            self.remote.clone(),
            self.replicator.clone(),
            collection,
            self.order(collection),
            Duration::from_millis(self.config.poll_interval_ms),
            Arc::new(callback),
        )
    }

    /// Records whose indexed field equals `value`. Local store only.
    pub async fn list_by_index(
        &self,
        collection: Collection,
        index: &str,
        value: &Value,
    ) -> SyncResult<Vec<Value>> {
        Ok(self.local.get_by_index(collection, index, value).await?)
    }

    // Typed helpers

    pub async fn get<T: Entity>(&self, id: &str) -> SyncResult<Option<T>> {
        self.get_record(T::COLLECTION, id)
            .await?
            .map(serde_json::from_value)
            .transpose()
            .map_err(SyncError::from)
    }

    pub async fn list<T: Entity>(&self) -> SyncResult<Vec<T>> {
        let records = self.list_records(T::COLLECTION).await?;
        Ok(decode_all(T::COLLECTION, records))
    }

    /// Local-only full scan, skipping the remote merge.
    pub async fn list_local<T: Entity>(&self) -> SyncResult<Vec<T>> {
        let records = self.local.get_all(T::COLLECTION).await?;
        Ok(decode_all(T::COLLECTION, records))
    }

    pub async fn find_by_index<T: Entity>(&self, index: &str, value: &Value) -> SyncResult<Vec<T>> {
        let records = self.list_by_index(T::COLLECTION, index, value).await?;
        Ok(decode_all(T::COLLECTION, records))
    }

    pub async fn create<T: Entity>(&self, data: &impl Serialize) -> SyncResult<T> {
        let record = self.create_record(T::COLLECTION, serde_json::to_value(data)?).await?;
        Ok(serde_json::from_value(record)?)
    }

    pub async fn update<T: Entity>(&self, id: &str, changes: &impl Serialize) -> SyncResult<T> {
        let record = self
            .update_record(T::COLLECTION, id, serde_json::to_value(changes)?)
            .await?;
        Ok(serde_json::from_value(record)?)
    }

    /// Writes an entity as-is, replacing any previous version.
    pub async fn save<T: Entity>(&self, entity: &T) -> SyncResult<()> {
        self.put_record(T::COLLECTION, serde_json::to_value(entity)?).await
    }

    pub async fn delete<T: Entity>(&self, id: &str) -> SyncResult<()> {
        self.delete_record(T::COLLECTION, id).await
    }
}

/// Decodes records into `T`, dropping (and logging) any that do not fit.
pub(crate) fn decode_all<T: Entity>(collection: Collection, records: Vec<Value>) -> Vec<T> {
    records
        .into_iter()
        .filter_map(|record| match serde_json::from_value::<T>(record) {
            Ok(entity) => Some(entity),
            Err(e) => {
                tracing::warn!(collection = %collection, error = %e, "Skipping undecodable record");
                None
            }
        })
        .collect()
}

/// Builds an object from `(field, value)` pairs; handy for partial updates.
pub fn fields<I, K>(pairs: I) -> Value
where
    I: IntoIterator<Item = (K, Value)>,
    K: Into<String>,
{
    Value::Object(pairs.into_iter().map(|(k, v)| (k.into(), v)).collect::<Map<_, _>>())
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use serde_json::json;

    use super::*;
    use crate::{
        config::RemoteWriteMode,
        remote::{MemoryRemote, RemoteListener, RemoteResult, RemoteStore},
        store::MemoryLocalStore,
        sync::SubscriptionMode,
    };

    /// Remote whose writes take a while to land; reads are immediate.
    struct SlowWrites {
        inner: MemoryRemote,
        delay: Duration,
    }

    #[async_trait]
    impl RemoteStore for SlowWrites {
        async fn upsert(&self, collection: Collection, id: &str, record: &Value) -> RemoteResult<()> {
            tokio::time::sleep(self.delay).await;
            self.inner.upsert(collection, id, record).await
        }

        async fn get(&self, collection: Collection, id: &str) -> RemoteResult<Option<Value>> {
            self.inner.get(collection, id).await
        }

        async fn list(&self, collection: Collection, order: &OrderBy) -> RemoteResult<Vec<Value>> {
            self.inner.list(collection, order).await
        }

        async fn delete(&self, collection: Collection, id: &str) -> RemoteResult<()> {
            tokio::time::sleep(self.delay).await;
            self.inner.delete(collection, id).await
        }

        async fn subscribe(
            &self,
            collection: Collection,
            order: &OrderBy,
        ) -> RemoteResult<RemoteListener> {
            self.inner.subscribe(collection, order).await
        }
    }

    async fn with_slow_remote(remote: &MemoryRemote) -> SyncCoordinator {
        let slow = SlowWrites {
            inner: remote.clone(),
            delay: Duration::from_millis(150),
        };
        SyncCoordinator::new(
            local_store().await,
            RemoteReplica::connected(Arc::new(slow)),
            SyncConfig {
                remote_writes: RemoteWriteMode::Detached,
                ..Default::default()
            },
        )
    }

    async fn local_store() -> Arc<dyn LocalStore> {
        let store = MemoryLocalStore::new();
        store.init().await.expect("init");
        Arc::new(store)
    }

    fn awaited() -> SyncConfig {
        SyncConfig {
            remote_writes: RemoteWriteMode::Awaited,
            poll_interval_ms: 20,
            ..Default::default()
        }
    }

    async fn local_only() -> SyncCoordinator {
        SyncCoordinator::new(local_store().await, RemoteReplica::Disabled, awaited())
    }

    async fn with_remote(remote: &MemoryRemote) -> SyncCoordinator {
        SyncCoordinator::new(
            local_store().await,
            RemoteReplica::connected(Arc::new(remote.clone())),
            awaited(),
        )
    }

    #[tokio::test]
    async fn test_create_then_get_round_trip() {
        let sync = local_only().await;
        let created = sync
            .create_record(Collection::Prompts, json!({"title": "A", "content": "x"}))
            .await
            .expect("create");
        let id = created["id"].as_str().expect("id assigned");
        assert_eq!(created["createdAt"], created["updatedAt"]);

        let fetched = sync
            .get_record(Collection::Prompts, id)
            .await
            .expect("get")
            .expect("present");
        assert_eq!(fetched, created);
    }

    #[tokio::test]
    async fn test_update_scenario() {
        let sync = local_only().await;
        let created = sync
            .create_record(Collection::Prompts, json!({"title": "A", "content": "x"}))
            .await
            .expect("create");
        let id = created["id"].as_str().expect("id");

        let updated = sync
            .update_record(Collection::Prompts, id, json!({"title": "B", "id": "hijack", "createdAt": 0}))
            .await
            .expect("update");

        assert_eq!(updated["id"], id);
        assert_eq!(updated["title"], "B");
        assert_eq!(updated["content"], "x");
        assert_eq!(updated["createdAt"], created["createdAt"]);
        let created_at = updated["createdAt"].as_i64().expect("createdAt");
        let updated_at = updated["updatedAt"].as_i64().expect("updatedAt");
        assert!(updated_at > created_at);

        let all = sync.list_records(Collection::Prompts).await.expect("list");
        assert_eq!(all.len(), 1);
        assert_eq!(all[0]["title"], "B");
    }

    #[tokio::test]
    async fn test_update_missing_is_not_found() {
        let sync = local_only().await;
        let result = sync
            .update_record(Collection::Prompts, "ghost", json!({"title": "B"}))
            .await;
        assert!(matches!(result, Err(SyncError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_delete_then_get_is_absent() {
        let sync = local_only().await;
        let created = sync
            .create_record(Collection::Prompts, json!({"title": "A"}))
            .await
            .expect("create");
        let id = created["id"].as_str().expect("id");

        sync.delete_record(Collection::Prompts, id).await.expect("delete");
        sync.delete_record(Collection::Prompts, id).await.expect("delete twice");
        assert!(sync.get_record(Collection::Prompts, id).await.expect("get").is_none());
    }

    #[tokio::test]
    async fn test_local_failures_surface() {
        let uninitialized: Arc<dyn LocalStore> = Arc::new(MemoryLocalStore::new());
        let sync = SyncCoordinator::new(uninitialized, RemoteReplica::Disabled, awaited());
        let result = sync.create_record(Collection::Prompts, json!({"title": "A"})).await;
        assert!(matches!(result, Err(SyncError::Store(StoreError::NotInitialized))));
    }

    #[tokio::test]
    async fn test_merge_prefers_remote() {
        let remote = MemoryRemote::new();
        let sync = with_remote(&remote).await;

        sync.local()
            .put(Collection::Prompts, json!({"id": "k", "title": "L", "createdAt": 1}))
            .await
            .expect("local put");
        sync.local()
            .put(Collection::Prompts, json!({"id": "local-only", "title": "Mine", "createdAt": 2}))
            .await
            .expect("local put");
        remote
            .upsert(Collection::Prompts, "k", &json!({"title": "R", "createdAt": 1}))
            .await
            .expect("remote upsert");

        let merged = sync.list_records(Collection::Prompts).await.expect("list");
        assert_eq!(merged.len(), 2);
        let k = merged.iter().find(|r| r["id"] == "k").expect("k present");
        assert_eq!(k["title"], "R");

        let cached = sync
            .local()
            .get(Collection::Prompts, "k")
            .await
            .expect("get")
            .expect("present");
        assert_eq!(cached["title"], "R");
    }

    #[tokio::test]
    async fn test_remote_outage_keeps_local_writes() {
        let remote = MemoryRemote::new();
        remote.set_available(false);
        let sync = with_remote(&remote).await;

        let created = sync
            .create_record(Collection::Prompts, json!({"title": "offline"}))
            .await
            .expect("local write succeeds");
        let id = created["id"].as_str().expect("id");

        let listed = sync.list_records(Collection::Prompts).await.expect("list");
        assert_eq!(listed.len(), 1);
        assert!(sync.get_record(Collection::Prompts, id).await.expect("get").is_some());
        assert_eq!(remote.count(Collection::Prompts).await, 0);
    }

    #[tokio::test]
    async fn test_read_miss_fills_local_cache() {
        let remote = MemoryRemote::new();
        let sync = with_remote(&remote).await;
        remote
            .upsert(Collection::Prompts, "r1", &json!({"title": "From remote"}))
            .await
            .expect("remote upsert");

        let fetched = sync
            .get_record(Collection::Prompts, "r1")
            .await
            .expect("get")
            .expect("found remotely");
        assert_eq!(fetched["title"], "From remote");

        remote.set_available(false);
        let cached = sync
            .get_record(Collection::Prompts, "r1")
            .await
            .expect("get")
            .expect("served locally");
        assert_eq!(cached["title"], "From remote");
    }

    #[tokio::test]
    async fn test_detached_writes_reach_remote_in_order() {
        let remote = MemoryRemote::new();
        let sync = SyncCoordinator::new(
            local_store().await,
            RemoteReplica::connected(Arc::new(remote.clone())),
            SyncConfig::default(),
        );

        let created = sync
            .create_record(Collection::Prompts, json!({"title": "v1"}))
            .await
            .expect("create");
        let id = created["id"].as_str().expect("id");
        sync.update_record(Collection::Prompts, id, json!({"title": "v2"}))
            .await
            .expect("update");
        sync.flush().await;

        let replicated = remote
            .get(Collection::Prompts, id)
            .await
            .expect("get")
            .expect("replicated");
        assert_eq!(replicated["title"], "v2");

        sync.delete_record(Collection::Prompts, id).await.expect("delete");
        sync.flush().await;
        assert_eq!(remote.count(Collection::Prompts).await, 0);
    }

    #[tokio::test]
    async fn test_poll_subscription_delivers_and_stops() {
        let sync = local_only().await;
        sync.create_record(Collection::Prompts, json!({"title": "A"}))
            .await
            .expect("create");

        let seen = Arc::new(Mutex::new(Vec::<usize>::new()));
        let sink = Arc::clone(&seen);
        let subscription = sync.subscribe(Collection::Prompts, move |records| {
            sink.lock().expect("lock").push(records.len());
        });
        assert_eq!(subscription.mode(), SubscriptionMode::LocalPoll);

        tokio::time::sleep(Duration::from_millis(70)).await;
        subscription.unsubscribe();
        subscription.unsubscribe();
        let delivered = seen.lock().expect("lock").len();
        assert!(delivered >= 1, "expected at least one snapshot");
        assert!(seen.lock().expect("lock").iter().all(|n| *n == 1));

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(seen.lock().expect("lock").len(), delivered);
        assert!(!subscription.is_active());
    }

    #[tokio::test]
    async fn test_live_subscription_falls_back_to_polling() {
        let remote = MemoryRemote::new();
        let sync = with_remote(&remote).await;
        remote
            .upsert(Collection::Prompts, "r1", &json!({"title": "remote", "createdAt": 1}))
            .await
            .expect("remote upsert");

        let seen = Arc::new(Mutex::new(Vec::<Vec<Value>>::new()));
        let sink = Arc::clone(&seen);
        let mut subscription = sync.subscribe(Collection::Prompts, move |records| {
            sink.lock().expect("lock").push(records);
        });

        let live = tokio::time::timeout(
            Duration::from_secs(2),
            subscription.wait_for_mode(SubscriptionMode::RemoteLive),
        )
        .await
        .expect("went live in time");
        assert!(live);

        // Snapshots from the listener are cached locally before delivery.
        tokio::time::timeout(Duration::from_secs(2), async {
            loop {
                if sync.local().get(Collection::Prompts, "r1").await.expect("get").is_some()
                    && !seen.lock().expect("lock").is_empty()
                {
                    break;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("remote snapshot delivered");

        remote.set_available(false);
        let polling = tokio::time::timeout(
            Duration::from_secs(2),
            subscription.wait_for_mode(SubscriptionMode::LocalPoll),
        )
        .await
        .expect("fell back in time");
        assert!(polling);

        let before = seen.lock().expect("lock").len();
        tokio::time::sleep(Duration::from_millis(70)).await;
        let after = seen.lock().expect("lock").len();
        assert!(after > before, "local polling keeps delivering");
        let last = seen.lock().expect("lock").last().cloned().expect("snapshot");
        assert_eq!(last.len(), 1);
        assert_eq!(last[0]["title"], "remote");

        subscription.unsubscribe();
    }

    #[tokio::test]
    async fn test_typed_helpers() {
        use crate::models::Prompt;

        let sync = local_only().await;
        let prompt: Prompt = sync
            .create(&json!({"title": "Typed", "content": "c"}))
            .await
            .expect("create");
        let fetched: Prompt = sync.get(&prompt.id).await.expect("get").expect("present");
        assert_eq!(fetched, prompt);

        let renamed: Prompt = sync
            .update(&prompt.id, &fields([("title", json!("Renamed"))]))
            .await
            .expect("update");
        assert_eq!(renamed.title, "Renamed");
        assert!(renamed.updated_at > prompt.updated_at);
    }

    #[tokio::test]
    async fn test_scan_keeps_unreplicated_local_update() {
        let remote = MemoryRemote::new();
        let sync = with_slow_remote(&remote).await;

        let created = sync
            .create_record(Collection::Prompts, json!({"title": "v1"}))
            .await
            .expect("create");
        let id = created["id"].as_str().expect("id");
        sync.flush().await;

        sync.update_record(Collection::Prompts, id, json!({"title": "v2"}))
            .await
            .expect("update");
        let listed = sync.list_records(Collection::Prompts).await.expect("list");
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0]["title"], "v2");

        let local = sync
            .local()
            .get(Collection::Prompts, id)
            .await
            .expect("get")
            .expect("present");
        assert_eq!(local["title"], "v2");

        sync.flush().await;
        let replicated = remote
            .get(Collection::Prompts, id)
            .await
            .expect("get")
            .expect("replicated");
        assert_eq!(replicated["title"], "v2");

        // Once replicated, the remote copy takes part in merges again.
        let mut edited = replicated.clone();
        edited["title"] = json!("v3");
        remote
            .upsert(Collection::Prompts, id, &edited)
            .await
            .expect("remote edit");
        let listed = sync.list_records(Collection::Prompts).await.expect("list");
        assert_eq!(listed[0]["title"], "v3");
    }

    #[tokio::test]
    async fn test_scan_does_not_resurrect_unreplicated_delete() {
        let remote = MemoryRemote::new();
        let sync = with_slow_remote(&remote).await;

        let created = sync
            .create_record(Collection::Prompts, json!({"title": "doomed"}))
            .await
            .expect("create");
        let id = created["id"].as_str().expect("id");
        sync.flush().await;

        sync.delete_record(Collection::Prompts, id).await.expect("delete");
        let listed = sync.list_records(Collection::Prompts).await.expect("list");
        assert!(listed.is_empty());
        assert!(
            sync.local()
                .get(Collection::Prompts, id)
                .await
                .expect("get")
                .is_none()
        );

        sync.flush().await;
        assert_eq!(remote.count(Collection::Prompts).await, 0);
    }

    #[tokio::test]
    async fn test_settings_scan_orders_by_key() {
        let remote = MemoryRemote::new();
        let sync = with_remote(&remote).await;
        assert_eq!(sync.order(Collection::Settings), OrderBy::desc("key"));
        assert_eq!(sync.order(Collection::Prompts), OrderBy::desc("createdAt"));

        remote
            .upsert(Collection::Settings, "theme", &json!({"key": "theme", "value": "dark"}))
            .await
            .expect("remote upsert");
        let listed = sync.list_records(Collection::Settings).await.expect("list");
        assert_eq!(listed, vec![json!({"key": "theme", "value": "dark"})]);
    }
}
