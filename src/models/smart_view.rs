use serde::{Deserialize, Serialize};

use super::{Entity, now_millis};
use crate::store::Collection;

/// Inclusive `createdAt` window in epoch milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: i64,
    pub end: i64,
}

impl DateRange {
    pub fn contains(&self, millis: i64) -> bool {
        millis >= self.start && millis <= self.end
    }
}

/// Criteria for advanced prompt search. Empty criteria match everything.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchFilters {
    /// Case-insensitive substring of the title
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Every listed tag must be present
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_range: Option<DateRange>,
}

/// A saved search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SmartView {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub filters: SearchFilters,
    #[serde(default = "now_millis")]
    pub created_at: i64,
}

impl Entity for SmartView {
    const COLLECTION: Collection = Collection::SmartViews;
}
