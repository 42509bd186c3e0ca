use base64::Engine;
use rand::Rng;
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::{Entity, now_millis};
use crate::store::Collection;

/// What the holder of a share link may do with the prompt.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShareLinkKind {
    #[default]
    Readonly,
    Reusable,
    Forkable,
}

impl std::str::FromStr for ShareLinkKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "readonly" => Ok(ShareLinkKind::Readonly),
            "reusable" => Ok(ShareLinkKind::Reusable),
            "forkable" => Ok(ShareLinkKind::Forkable),
            _ => Err(format!("Invalid share link type: {}", s)),
        }
    }
}

/// A token granting access to one prompt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShareLink {
    pub id: String,
    pub prompt_id: String,
    #[serde(rename = "type", default)]
    pub kind: ShareLinkKind,
    pub token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<i64>,
    #[serde(default = "now_millis")]
    pub created_at: i64,
    #[serde(default)]
    pub access_count: u64,
}

impl Entity for ShareLink {
    const COLLECTION: Collection = Collection::ShareLinks;
}

impl ShareLink {
    pub fn is_expired_at(&self, now: i64) -> bool {
        self.expires_at.is_some_and(|expires| now >= expires)
    }
}

/// Request to share a prompt
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateShareLink {
    #[validate(length(min = 1))]
    pub prompt_id: String,
    #[serde(default, rename = "type")]
    pub kind: ShareLinkKind,
    /// Lifetime in seconds; `None` never expires
    #[validate(range(min = 1))]
    pub expires_in_secs: Option<i64>,
}

/// Generate a share token: 32 random bytes, URL-safe base64 without padding.
pub fn generate_share_token() -> String {
    let mut random_bytes = [0u8; 32];
    rand::thread_rng().fill(&mut random_bytes);
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(random_bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokens_are_url_safe_and_distinct() {
        let a = generate_share_token();
        let b = generate_share_token();
        assert_eq!(a.len(), 43);
        assert_ne!(a, b);
        assert!(a.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }

    #[test]
    fn test_expiry() {
        let mut link = ShareLink {
            id: "s1".into(),
            prompt_id: "p1".into(),
            kind: ShareLinkKind::Readonly,
            token: "t".into(),
            expires_at: None,
            created_at: 0,
            access_count: 0,
        };
        assert!(!link.is_expired_at(i64::MAX));
        link.expires_at = Some(100);
        assert!(!link.is_expired_at(99));
        assert!(link.is_expired_at(100));
    }
}
