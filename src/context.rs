//! Application context shared with storage consumers

use std::sync::Arc;

use crate::config::AppConfig;
use crate::storage::StorageService;
use crate::Result;

/// Everything built once at startup and handed to consumers.
#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<AppConfig>,
    pub storage: StorageService,
}

impl AppContext {
    /// Build the storage facade for the configured provider.
    ///
    /// Fails with `InvalidConfiguration` when the provider is unknown or its
    /// settings are incomplete; the application must not start in that case.
    pub async fn from_config(config: AppConfig) -> Result<Self> {
        let storage = StorageService::from_section(&config.storage).await?;

        Ok(Self {
            config: Arc::new(config),
            storage,
        })
    }

    pub fn storage(&self) -> &StorageService {
        &self.storage
    }
}
