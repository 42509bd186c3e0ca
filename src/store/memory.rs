use std::{
    collections::{BTreeMap, BTreeSet, HashMap},
    sync::atomic::{AtomicBool, Ordering},
};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;

use super::{
    error::{StoreError, StoreResult},
    schema::{Collection, IndexDef, index_token},
    traits::LocalStore,
};

type IndexEntries = Vec<(&'static IndexDef, String)>;

#[derive(Default)]
struct Bucket {
    records: BTreeMap<String, Value>,
    /// index name -> token -> keys
    indexes: HashMap<&'static str, HashMap<String, BTreeSet<String>>>,
}

impl Bucket {
    fn unique_holder(&self, def: &IndexDef, token: &str, key: &str) -> Option<&String> {
        self.indexes
            .get(def.name)
            .and_then(|tokens| tokens.get(token))
            .and_then(|keys| keys.iter().find(|k| k.as_str() != key))
    }

    fn add_entries(&mut self, key: &str, entries: &IndexEntries) {
        for (def, token) in entries {
            self.indexes
                .entry(def.name)
                .or_default()
                .entry(token.clone())
                .or_default()
                .insert(key.to_string());
        }
    }

    fn remove_entries(&mut self, key: &str, entries: &IndexEntries) {
        for (def, token) in entries {
            if let Some(tokens) = self.indexes.get_mut(def.name)
                && let Some(keys) = tokens.get_mut(token)
            {
                keys.remove(key);
                if keys.is_empty() {
                    tokens.remove(token);
                }
            }
        }
    }
}

/// In-process local store.
///
/// Contents live only as long as the value does. Useful for tests and for
/// throwaway sessions; it honours the same initialization and index
/// semantics as the SQLite engine.
#[derive(Default)]
pub struct MemoryLocalStore {
    initialized: AtomicBool,
    buckets: RwLock<HashMap<Collection, Bucket>>,
}

impl MemoryLocalStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn ensure_initialized(&self) -> StoreResult<()> {
        if self.is_initialized() {
            Ok(())
        } else {
            Err(StoreError::NotInitialized)
        }
    }
}

#[async_trait]
impl LocalStore for MemoryLocalStore {
    async fn init(&self) -> StoreResult<()> {
        self.initialized.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::SeqCst)
    }

    async fn put(&self, collection: Collection, record: Value) -> StoreResult<()> {
        self.ensure_initialized()?;
        let key = collection.record_key(&record)?;
        let entries = collection.index_entries(&record);

        let mut buckets = self.buckets.write().await;
        let bucket = buckets.entry(collection).or_default();

        // Check every unique index before touching anything.
        for (def, token) in entries.iter().filter(|(def, _)| def.unique) {
            if let Some(holder) = bucket.unique_holder(def, token, &key) {
                return Err(StoreError::Conflict(format!(
                    "{}.{} value already used by '{}'",
                    collection, def.name, holder
                )));
            }
        }

        let previous = bucket
            .records
            .get(&key)
            .map(|old| collection.index_entries(old))
            .unwrap_or_default();
        bucket.remove_entries(&key, &previous);
        bucket.add_entries(&key, &entries);
        bucket.records.insert(key, record);
        Ok(())
    }

    async fn get(&self, collection: Collection, key: &str) -> StoreResult<Option<Value>> {
        self.ensure_initialized()?;
        let buckets = self.buckets.read().await;
        Ok(buckets
            .get(&collection)
            .and_then(|bucket| bucket.records.get(key))
            .cloned())
    }

    async fn get_all(&self, collection: Collection) -> StoreResult<Vec<Value>> {
        self.ensure_initialized()?;
        let buckets = self.buckets.read().await;
        Ok(buckets
            .get(&collection)
            .map(|bucket| bucket.records.values().cloned().collect())
            .unwrap_or_default())
    }

    async fn delete(&self, collection: Collection, key: &str) -> StoreResult<()> {
        self.ensure_initialized()?;
        let mut buckets = self.buckets.write().await;
        if let Some(bucket) = buckets.get_mut(&collection)
            && let Some(old) = bucket.records.remove(key)
        {
            let entries = collection.index_entries(&old);
            bucket.remove_entries(key, &entries);
        }
        Ok(())
    }

    async fn get_by_index(
        &self,
        collection: Collection,
        index: &str,
        value: &Value,
    ) -> StoreResult<Vec<Value>> {
        self.ensure_initialized()?;
        let def = collection.index(index)?;
        let Some(token) = index_token(value) else {
            return Ok(Vec::new());
        };

        let buckets = self.buckets.read().await;
        let Some(bucket) = buckets.get(&collection) else {
            return Ok(Vec::new());
        };
        let keys = bucket
            .indexes
            .get(def.name)
            .and_then(|tokens| tokens.get(&token));
        Ok(keys
            .into_iter()
            .flatten()
            .filter_map(|key| bucket.records.get(key).cloned())
            .collect())
    }
}
