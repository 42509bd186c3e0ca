use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;

use super::ServiceResult;
use crate::{models::Setting, sync::SyncCoordinator};

/// Key/value user preferences
#[derive(Clone)]
pub struct SettingsService {
    sync: SyncCoordinator,
}

impl SettingsService {
    pub fn new(sync: SyncCoordinator) -> Self {
        Self { sync }
    }

    /// Read a setting, or `None` if it is unset or does not decode as `T`.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> ServiceResult<Option<T>> {
        let Some(setting) = self.sync.get::<Setting>(key).await? else {
            return Ok(None);
        };
        match serde_json::from_value(setting.value) {
            Ok(value) => Ok(Some(value)),
            Err(e) => {
                tracing::warn!(key, error = %e, "Ignoring setting with unexpected shape");
                Ok(None)
            }
        }
    }

    pub async fn set(&self, key: &str, value: &impl Serialize) -> ServiceResult<()> {
        let setting = Setting {
            key: key.to_string(),
            value: serde_json::to_value(value).map_err(crate::sync::SyncError::from)?,
        };
        Ok(self.sync.save(&setting).await?)
    }

    pub async fn all(&self) -> ServiceResult<Vec<Setting>> {
        let mut settings: Vec<Setting> = self.sync.list().await?;
        settings.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(settings)
    }

    pub async fn remove(&self, key: &str) -> ServiceResult<()> {
        Ok(self.sync.delete::<Setting>(key).await?)
    }

    /// Raw JSON value of a setting.
    pub async fn get_raw(&self, key: &str) -> ServiceResult<Option<Value>> {
        Ok(self.sync.get::<Setting>(key).await?.map(|s| s.value))
    }
}
