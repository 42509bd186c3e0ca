//! Firestore REST backend for the remote replica.
//!
//! Talks to the v1 documents API with the web API key. Documents map one to
//! one onto local records: the document id is the record key and every other
//! top-level field becomes a typed Firestore field.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode, Url};
use serde_json::{Map, Value, json};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::{
    error::{RemoteError, RemoteResult},
    traits::{OrderBy, RemoteListener, RemoteStore},
};
use crate::{
    config::{RemoteConfig, RemoteCredentials},
    store::Collection,
};

/// Buffered snapshots per listener before the producer waits.
const LISTENER_BUFFER: usize = 16;

#[derive(Clone)]
pub struct FirestoreRemote {
    client: Client,
    base_url: String,
    project_id: String,
    database: String,
    api_key: String,
    listen_interval: Duration,
}

impl FirestoreRemote {
    pub fn new(config: &RemoteConfig, credentials: RemoteCredentials) -> RemoteResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            base_url: config.base_url.clone(),
            project_id: credentials.project_id,
            database: config.database.clone(),
            api_key: credentials.api_key,
            listen_interval: Duration::from_millis(config.listen_interval_ms),
        })
    }

    /// `{base}/projects/{project}/databases/{database}/{tail...}`
    fn url(&self, tail: &[&str]) -> RemoteResult<Url> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| RemoteError::Unavailable(format!("invalid base URL: {}", e)))?;
        url.path_segments_mut()
            .map_err(|_| RemoteError::Unavailable("base URL cannot carry a path".into()))?
            .pop_if_empty()
            .extend([
                "projects",
                self.project_id.as_str(),
                "databases",
                self.database.as_str(),
            ])
            .extend(tail);
        Ok(url)
    }

    fn document_url(&self, collection: Collection, id: &str) -> RemoteResult<Url> {
        self.url(&["documents", collection.as_str(), id])
    }
}

/// Turns a non-success response into an `Unavailable` error.
/// The key field is not stored in the document body; it is the document name.
fn order_field_path<'a>(collection: Collection, order: &'a OrderBy) -> &'a str {
    if order.field == collection.key_field() {
        "__name__"
    } else {
        &order.field
    }
}

async fn check_status(response: Response) -> RemoteResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let snippet: String = body.chars().take(200).collect();
    Err(RemoteError::Unavailable(format!("HTTP {}: {}", status, snippet)))
}

#[async_trait]
impl RemoteStore for FirestoreRemote {
    async fn upsert(&self, collection: Collection, id: &str, record: &Value) -> RemoteResult<()> {
        let body = json!({ "fields": encode_fields(record, collection.key_field()) });
        let response = self
            .client
            .patch(self.document_url(collection, id)?)
            .query(&[("key", &self.api_key)])
            .json(&body)
            .send()
            .await?;
        check_status(response).await?;
        tracing::debug!(collection = %collection, id, "Remote document upserted");
        Ok(())
    }

    async fn get(&self, collection: Collection, id: &str) -> RemoteResult<Option<Value>> {
        let response = self
            .client
            .get(self.document_url(collection, id)?)
            .query(&[("key", &self.api_key)])
            .send()
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let document: Value = check_status(response).await?.json().await?;
        decode_document(&document, collection.key_field()).map(Some)
    }

    async fn list(&self, collection: Collection, order: &OrderBy) -> RemoteResult<Vec<Value>> {
        let query = json!({
            "structuredQuery": {
                "from": [{ "collectionId": collection.as_str() }],
                "orderBy": [{
                    "field": { "fieldPath": order_field_path(collection, order) },
                    "direction": if order.descending { "DESCENDING" } else { "ASCENDING" },
                }],
            }
        });
        let response = self
            .client
            .post(self.url(&["documents:runQuery"])?)
            .query(&[("key", &self.api_key)])
            .json(&query)
            .send()
            .await?;
        let rows: Vec<Value> = check_status(response).await?.json().await?;

        // Rows without a `document` only carry read metadata.
        rows.iter()
            .filter_map(|row| row.get("document"))
            .map(|doc| decode_document(doc, collection.key_field()))
            .collect()
    }

    async fn delete(&self, collection: Collection, id: &str) -> RemoteResult<()> {
        let response = self
            .client
            .delete(self.document_url(collection, id)?)
            .query(&[("key", &self.api_key)])
            .send()
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(());
        }
        check_status(response).await?;
        Ok(())
    }

    async fn subscribe(
        &self,
        collection: Collection,
        order: &OrderBy,
    ) -> RemoteResult<RemoteListener> {
        let (tx, rx) = mpsc::channel(LISTENER_BUFFER);
        let cancel = CancellationToken::new();
        let stop = cancel.clone();
        let remote = self.clone();
        let order = order.clone();

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(remote.listen_interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            let mut last: Option<Vec<Value>> = None;

            loop {
                tokio::select! {
                    biased;
                    _ = stop.cancelled() => break,
                    _ = ticker.tick() => {}
                }
                let result = tokio::select! {
                    biased;
                    _ = stop.cancelled() => break,
                    result = remote.list(collection, &order) => result,
                };
                match result {
                    Ok(snapshot) => {
                        if last.as_ref() == Some(&snapshot) {
                            continue;
                        }
                        last = Some(snapshot.clone());
                        if tx.send(Ok(snapshot)).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        let _ = tx.send(Err(e)).await;
                        break;
                    }
                }
            }
            tracing::debug!(collection = %collection, "Remote listener stopped");
        });

        Ok(RemoteListener::new(rx, cancel))
    }
}

/// Encodes every top-level field except `skip` as a Firestore value.
pub(crate) fn encode_fields(record: &Value, skip: &str) -> Value {
    let fields: Map<String, Value> = record
        .as_object()
        .map(|object| {
            object
                .iter()
                .filter(|(name, _)| name.as_str() != skip)
                .map(|(name, value)| (name.clone(), encode_value(value)))
                .collect()
        })
        .unwrap_or_default();
    Value::Object(fields)
}

fn encode_value(value: &Value) -> Value {
    match value {
        Value::Null => json!({ "nullValue": null }),
        Value::Bool(b) => json!({ "booleanValue": b }),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                json!({ "integerValue": i.to_string() })
            } else if let Some(u) = n.as_u64() {
                json!({ "integerValue": u.to_string() })
            } else {
                json!({ "doubleValue": n.as_f64() })
            }
        }
        Value::String(s) => json!({ "stringValue": s }),
        Value::Array(items) => json!({
            "arrayValue": { "values": items.iter().map(encode_value).collect::<Vec<_>>() }
        }),
        Value::Object(_) => json!({ "mapValue": { "fields": encode_fields(value, "") } }),
    }
}

/// Decodes a Firestore document into a record, taking the key from the
/// last segment of the document name.
pub(crate) fn decode_document(document: &Value, key_field: &str) -> RemoteResult<Value> {
    let name = document
        .get("name")
        .and_then(Value::as_str)
        .ok_or_else(|| RemoteError::InvalidDocument("document has no name".into()))?;
    let id = name
        .rsplit('/')
        .next()
        .filter(|id| !id.is_empty())
        .ok_or_else(|| RemoteError::InvalidDocument(format!("malformed name '{}'", name)))?;

    let mut record = decode_fields(document.get("fields"));
    record.insert(key_field.to_string(), Value::String(id.to_string()));
    Ok(Value::Object(record))
}

fn decode_fields(fields: Option<&Value>) -> Map<String, Value> {
    fields
        .and_then(Value::as_object)
        .map(|fields| {
            fields
                .iter()
                .map(|(name, value)| (name.clone(), decode_value(value)))
                .collect()
        })
        .unwrap_or_default()
}

fn decode_value(value: &Value) -> Value {
    let Some((kind, inner)) = value.as_object().and_then(|o| o.iter().next()) else {
        return Value::Null;
    };
    match kind.as_str() {
        "nullValue" => Value::Null,
        "booleanValue" => inner.clone(),
        "integerValue" => match inner {
            Value::String(s) => s.parse::<i64>().map(Value::from).unwrap_or(Value::Null),
            other => other.clone(),
        },
        "doubleValue" => inner.clone(),
        // Timestamps surface as epoch milliseconds, like every local stamp.
        "timestampValue" => inner
            .as_str()
            .and_then(|s| chrono::DateTime::parse_from_rfc3339(s).ok())
            .map(|ts| Value::from(ts.timestamp_millis()))
            .unwrap_or(Value::Null),
        "arrayValue" => Value::Array(
            inner
                .get("values")
                .and_then(Value::as_array)
                .map(|values| values.iter().map(decode_value).collect())
                .unwrap_or_default(),
        ),
        "mapValue" => Value::Object(decode_fields(inner.get("fields"))),
        // stringValue, referenceValue, bytesValue, geoPointValue
        _ => inner.clone(),
    }
}
