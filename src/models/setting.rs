use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::Entity;
use crate::store::Collection;

/// A user preference, keyed by name rather than id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Setting {
    pub key: String,
    #[serde(default)]
    pub value: Value,
}

impl Entity for Setting {
    const COLLECTION: Collection = Collection::Settings;
}
