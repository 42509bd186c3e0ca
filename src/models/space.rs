use serde::{Deserialize, Serialize};

use super::{Entity, now_millis};
use crate::store::Collection;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpaceKind {
    #[default]
    Personal,
    Team,
    Public,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpacePermissions {
    #[serde(default)]
    pub owner_id: String,
    #[serde(default)]
    pub editors: Vec<String>,
    #[serde(default)]
    pub viewers: Vec<String>,
}

/// A named grouping of prompts. Stored in the `collections` collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Space {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "type", default)]
    pub kind: SpaceKind,
    #[serde(default)]
    pub permissions: SpacePermissions,
    #[serde(default)]
    pub prompt_ids: Vec<String>,
    #[serde(default = "now_millis")]
    pub created_at: i64,
    #[serde(default = "now_millis")]
    pub updated_at: i64,
}

impl Entity for Space {
    const COLLECTION: Collection = Collection::Spaces;
}
