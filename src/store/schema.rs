//! Collection layout of the local store: names, key fields and secondary
//! indexes. Bumping [`SCHEMA_VERSION`] must only ever add collections or
//! indexes.

use std::{cmp::Ordering, fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::error::{StoreError, StoreResult};

/// Version of the collection layout described in this module.
pub const SCHEMA_VERSION: i64 = 1;

/// A named bucket of records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Collection {
    Prompts,
    /// Spaces are persisted under the historical `collections` name.
    #[serde(rename = "collections")]
    Spaces,
    Runs,
    SmartViews,
    ShareLinks,
    Settings,
}

/// A secondary index over a single top-level record field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexDef {
    pub name: &'static str,
    pub field: &'static str,
    pub unique: bool,
}

const fn index(name: &'static str) -> IndexDef {
    IndexDef {
        name,
        field: name,
        unique: false,
    }
}

const PROMPT_INDEXES: &[IndexDef] = &[index("title"), index("createdAt"), index("updatedAt")];
const SPACE_INDEXES: &[IndexDef] = &[index("name"), index("type")];
const RUN_INDEXES: &[IndexDef] = &[index("promptId"), index("createdAt"), index("model")];
const SHARE_LINK_INDEXES: &[IndexDef] = &[
    IndexDef {
        name: "token",
        field: "token",
        unique: true,
    },
    index("promptId"),
];

impl Collection {
    pub const ALL: [Collection; 6] = [
        Collection::Prompts,
        Collection::Spaces,
        Collection::Runs,
        Collection::SmartViews,
        Collection::ShareLinks,
        Collection::Settings,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Collection::Prompts => "prompts",
            Collection::Spaces => "collections",
            Collection::Runs => "runs",
            Collection::SmartViews => "smartViews",
            Collection::ShareLinks => "shareLinks",
            Collection::Settings => "settings",
        }
    }

    /// Name of the field holding the record key.
    pub fn key_field(&self) -> &'static str {
        match self {
            Collection::Settings => "key",
            _ => "id",
        }
    }

    pub fn indexes(&self) -> &'static [IndexDef] {
        match self {
            Collection::Prompts => PROMPT_INDEXES,
            Collection::Spaces => SPACE_INDEXES,
            Collection::Runs => RUN_INDEXES,
            Collection::ShareLinks => SHARE_LINK_INDEXES,
            Collection::SmartViews | Collection::Settings => &[],
        }
    }

    /// Looks up an index definition by name.
    pub fn index(&self, name: &str) -> StoreResult<&'static IndexDef> {
        self.indexes()
            .iter()
            .find(|def| def.name == name)
            .ok_or_else(|| StoreError::UnknownIndex {
                collection: self.as_str().to_string(),
                index: name.to_string(),
            })
    }

    /// Whether records carry a `createdAt` stamp.
    pub fn stamps_created(&self) -> bool {
        !matches!(self, Collection::Settings)
    }

    /// Whether records carry an `updatedAt` stamp refreshed on every update.
    pub fn stamps_updated(&self) -> bool {
        matches!(self, Collection::Prompts | Collection::Spaces)
    }

    /// Extracts and validates the key of `record`.
    pub fn record_key(&self, record: &Value) -> StoreResult<String> {
        let object = record.as_object().ok_or_else(|| {
            StoreError::InvalidRecord(format!("{} records must be JSON objects", self))
        })?;
        match object.get(self.key_field()) {
            Some(Value::String(key)) if !key.is_empty() => Ok(key.clone()),
            _ => Err(StoreError::InvalidRecord(format!(
                "{} record is missing a non-empty string '{}'",
                self,
                self.key_field()
            ))),
        }
    }

    /// Index entries a record contributes, as `(index, token)` pairs.
    /// Fields that are absent or not scalar contribute nothing.
    pub fn index_entries(&self, record: &Value) -> Vec<(&'static IndexDef, String)> {
        self.indexes()
            .iter()
            .filter_map(|def| {
                record
                    .get(def.field)
                    .and_then(index_token)
                    .map(|token| (def, token))
            })
            .collect()
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Collection {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Collection::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| StoreError::InvalidRecord(format!("unknown collection '{}'", s)))
    }
}

/// Stored form of an indexed value. Scalars are tagged by type so the string
/// `"1"` and the number `1` never collide.
pub fn index_token(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(format!("s:{}", s)),
        Value::Bool(b) => Some(format!("b:{}", b)),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Some(format!("n:{}", i))
            } else if let Some(u) = n.as_u64() {
                Some(format!("n:{}", u))
            } else {
                let f = n.as_f64()?;
                if f.fract() == 0.0 && f.abs() < i64::MAX as f64 {
                    Some(format!("n:{}", f as i64))
                } else {
                    Some(format!("n:{}", f))
                }
            }
        }
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

/// Orders two records by a top-level field: numbers numerically, strings
/// lexically, missing values first.
pub fn compare_by_field(a: &Value, b: &Value, field: &str) -> Ordering {
    match (a.get(field), b.get(field)) {
        (Some(Value::Number(x)), Some(Value::Number(y))) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        _ => Ordering::Equal,
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_collection_names_round_trip() {
        for collection in Collection::ALL {
            let parsed: Collection = collection.as_str().parse().expect("known name");
            assert_eq!(parsed, collection);
        }
        assert_eq!(Collection::Spaces.as_str(), "collections");
    }

    #[test]
    fn test_record_key_validation() {
        let key = Collection::Settings
            .record_key(&json!({"key": "theme", "value": "dark"}))
            .expect("settings keyed by 'key'");
        assert_eq!(key, "theme");

        assert!(matches!(
            Collection::Prompts.record_key(&json!({"title": "no id"})),
            Err(StoreError::InvalidRecord(_))
        ));
        assert!(matches!(
            Collection::Prompts.record_key(&json!({"id": 7})),
            Err(StoreError::InvalidRecord(_))
        ));
        assert!(matches!(
            Collection::Prompts.record_key(&json!(["not", "an", "object"])),
            Err(StoreError::InvalidRecord(_))
        ));
    }

    #[test]
    fn test_unknown_index() {
        assert!(Collection::ShareLinks.index("token").expect("exists").unique);
        assert!(matches!(
            Collection::SmartViews.index("name"),
            Err(StoreError::UnknownIndex { .. })
        ));
    }

    #[test]
    fn test_index_tokens() {
        assert_eq!(index_token(&json!("1")), Some("s:1".into()));
        assert_eq!(index_token(&json!(1)), Some("n:1".into()));
        assert_eq!(index_token(&json!(1.0)), Some("n:1".into()));
        assert_eq!(index_token(&json!(true)), Some("b:true".into()));
        assert_eq!(index_token(&json!(null)), None);
        assert_eq!(index_token(&json!(["a"])), None);
    }

    #[test]
    fn test_index_entries_skip_missing_fields() {
        let entries = Collection::Prompts.index_entries(&json!({
            "id": "p1",
            "title": "Greeting",
            "createdAt": 10,
        }));
        let names: Vec<_> = entries.iter().map(|(def, _)| def.name).collect();
        assert_eq!(names, vec!["title", "createdAt"]);
    }
}
