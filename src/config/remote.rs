use serde::{Deserialize, Serialize};

use super::ConfigError;

/// Remote replica configuration.
///
/// Mirrors the shape of a Firebase web-app config block so an existing
/// `firebaseConfig` can be pasted in as-is (camelCase keys are accepted as
/// aliases). The replica stays disabled unless both `api_key` and
/// `project_id` carry real values.
///
/// ```toml
/// [remote]
/// apiKey = "${PROMPTKIT_API_KEY}"
/// projectId = "prompt-kit"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RemoteConfig {
    #[serde(default, alias = "apiKey")]
    pub api_key: Option<String>,

    #[serde(default, alias = "projectId")]
    pub project_id: Option<String>,

    #[serde(default, alias = "authDomain")]
    pub auth_domain: Option<String>,

    #[serde(default, alias = "storageBucket")]
    pub storage_bucket: Option<String>,

    #[serde(default, alias = "messagingSenderId")]
    pub messaging_sender_id: Option<String>,

    #[serde(default, alias = "appId")]
    pub app_id: Option<String>,

    /// Document database REST endpoint.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Database id within the project.
    #[serde(default = "default_database")]
    pub database: String,

    /// HTTP request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// How often a live listener re-reads the remote collection.
    #[serde(default = "default_listen_interval_ms")]
    pub listen_interval_ms: u64,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            project_id: None,
            auth_domain: None,
            storage_bucket: None,
            messaging_sender_id: None,
            app_id: None,
            base_url: default_base_url(),
            database: default_database(),
            timeout_secs: default_timeout_secs(),
            listen_interval_ms: default_listen_interval_ms(),
        }
    }
}

/// Credentials that passed the placeholder check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteCredentials {
    pub api_key: String,
    pub project_id: String,
}

impl RemoteConfig {
    /// Returns usable credentials, or `None` when either value is missing,
    /// blank, or still a template placeholder such as `YOUR_API_KEY`.
    pub fn credentials(&self) -> Option<RemoteCredentials> {
        let api_key = real_value(self.api_key.as_deref())?;
        let project_id = real_value(self.project_id.as_deref())?;
        Some(RemoteCredentials {
            api_key: api_key.to_string(),
            project_id: project_id.to_string(),
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "remote.timeout_secs must be greater than 0".into(),
            ));
        }
        if self.listen_interval_ms == 0 {
            return Err(ConfigError::Validation(
                "remote.listen_interval_ms must be greater than 0".into(),
            ));
        }
        Ok(())
    }
}

fn real_value(value: Option<&str>) -> Option<&str> {
    let value = value?.trim();
    if value.is_empty() || value.starts_with("YOUR_") {
        None
    } else {
        Some(value)
    }
}

fn default_base_url() -> String {
    "https://firestore.googleapis.com/v1".into()
}

fn default_database() -> String {
    "(default)".into()
}

fn default_timeout_secs() -> u64 {
    10
}

fn default_listen_interval_ms() -> u64 {
    2000
}
