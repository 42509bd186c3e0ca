//! Configuration module for promptkit.
//!
//! promptkit is configured via a TOML file, with support for environment
//! variable interpolation using `${VAR_NAME}` syntax. Every section is
//! optional; an empty file yields a local-only setup backed by SQLite.
//!
//! # Example
//!
//! ```toml
//! [storage]
//! type = "sqlite"
//! path = "promptkit.db"
//!
//! [remote]
//! apiKey = "${PROMPTKIT_API_KEY}"
//! projectId = "my-project"
//!
//! [sync]
//! poll_interval_ms = 1000
//! remote_writes = "detached"
//! ```

mod observability;
mod remote;
mod storage;
mod sync;

use std::path::Path;

pub use observability::*;
pub use remote::*;
use serde::{Deserialize, Serialize};
pub use storage::*;
pub use sync::*;

/// Root configuration for promptkit.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PromptKitConfig {
    /// Local store engine.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Optional remote replica. Absent or placeholder credentials keep
    /// promptkit in local-only mode.
    #[serde(default)]
    pub remote: RemoteConfig,

    /// Reconciliation policy between the local store and the remote replica.
    #[serde(default)]
    pub sync: SyncConfig,

    /// Logging configuration.
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl PromptKitConfig {
    /// Load configuration from a TOML file.
    ///
    /// Environment variables in the format `${VAR_NAME}` are expanded.
    /// Missing variables cause an error.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::Io(e, path.as_ref().to_path_buf()))?;

        Self::from_str(&contents)
    }

    /// Parse configuration from a TOML string.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(contents: &str) -> Result<Self, ConfigError> {
        let expanded = expand_env_vars(contents)?;
        let config: PromptKitConfig = toml::from_str(&expanded)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        self.storage.validate()?;
        self.remote.validate()?;
        self.sync.validate()?;
        Ok(())
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {1}: {0}")]
    Io(std::io::Error, std::path::PathBuf),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Environment variable not found: {0}")]
    EnvVarNotFound(String),

    #[error("Configuration validation error: {0}")]
    Validation(String),
}

/// Expand environment variables in the format `${VAR_NAME}`.
/// Variables that appear after a `#` on the same line are left untouched.
fn expand_env_vars(input: &str) -> Result<String, ConfigError> {
    let re = regex::Regex::new(r"\$\{([^}]+)\}")
        .map_err(|e| ConfigError::Validation(e.to_string()))?;
    let mut result = String::with_capacity(input.len());

    for line in input.lines() {
        let comment_pos = line.find('#');
        let mut last_end = 0;

        for cap in re.captures_iter(line) {
            let Some(whole) = cap.get(0) else { continue };
            if let Some(pos) = comment_pos
                && whole.start() >= pos
            {
                continue;
            }

            result.push_str(&line[last_end..whole.start()]);
            let var_name = &cap[1];
            let value = std::env::var(var_name)
                .map_err(|_| ConfigError::EnvVarNotFound(var_name.to_string()))?;
            result.push_str(&value);
            last_end = whole.end();
        }

        result.push_str(&line[last_end..]);
        result.push('\n');
    }

    if !input.ends_with('\n') && result.ends_with('\n') {
        result.pop();
    }

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_is_local_only() {
        let config = PromptKitConfig::from_str("").expect("empty config parses");

        assert!(config.remote.credentials().is_none());
        assert_eq!(config.sync.poll_interval_ms, 1000);
        assert!(matches!(config.storage, StorageConfig::Sqlite(_)));
    }

    #[test]
    fn test_full_config() {
        let config = PromptKitConfig::from_str(
            r#"
            [storage]
            type = "memory"

            [remote]
            apiKey = "AIza-test"
            projectId = "prompt-kit"
            authDomain = "prompt-kit.firebaseapp.com"

            [sync]
            poll_interval_ms = 250
            remote_writes = "awaited"

            [observability.logging]
            level = "debug"
            format = "json"
        "#,
        )
        .expect("config parses");

        assert!(matches!(config.storage, StorageConfig::Memory));
        let creds = config.remote.credentials().expect("credentials present");
        assert_eq!(creds.project_id, "prompt-kit");
        assert_eq!(config.sync.poll_interval_ms, 250);
        assert_eq!(config.sync.remote_writes, RemoteWriteMode::Awaited);
        assert_eq!(config.observability.logging.format, LogFormat::Json);
    }

    #[test]
    fn test_unknown_section_rejected() {
        let result = PromptKitConfig::from_str(
            r#"
            [server]
            port = 8080
        "#,
        );
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_zero_poll_interval_rejected() {
        let result = PromptKitConfig::from_str(
            r#"
            [sync]
            poll_interval_ms = 0
        "#,
        );
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }

    #[test]
    fn test_env_var_expansion() {
        temp_env::with_var("PROMPTKIT_TEST_API_KEY", Some("AIza-from-env"), || {
            let config = PromptKitConfig::from_str(
                r#"
                [remote]
                apiKey = "${PROMPTKIT_TEST_API_KEY}"
                projectId = "prompt-kit"
            "#,
            )
            .expect("config parses");
            let creds = config.remote.credentials().expect("credentials present");
            assert_eq!(creds.api_key, "AIza-from-env");
        });
    }

    #[test]
    fn test_missing_env_var() {
        temp_env::with_var_unset("PROMPTKIT_TEST_MISSING", || {
            let result = PromptKitConfig::from_str(
                r#"
                [remote]
                apiKey = "${PROMPTKIT_TEST_MISSING}"
            "#,
            );
            assert!(
                matches!(result, Err(ConfigError::EnvVarNotFound(name)) if name == "PROMPTKIT_TEST_MISSING")
            );
        });
    }

    #[test]
    fn test_env_var_in_comment_not_expanded() {
        temp_env::with_var_unset("PROMPTKIT_TEST_COMMENTED", || {
            let config = PromptKitConfig::from_str(
                r#"
                [storage]
                type = "memory" # path = "${PROMPTKIT_TEST_COMMENTED}"
            "#,
            );
            assert!(config.is_ok());
        });
    }
}
