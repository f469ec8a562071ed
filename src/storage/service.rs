//! Storage facade: one active backend chosen at construction

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, instrument};

use super::{create_storage, Provider, Storage, StorageConfig};
use crate::config::StorageSection;
use crate::types::{DownloadedFile, StorageTarget, UploadRequest};
use crate::Result;

/// Single entry point consumers depend on.
///
/// Calls are forwarded unchanged to the adapter selected when the service was
/// built; there is no retry, fallback or per-call re-selection.
#[derive(Clone)]
pub struct StorageService {
    provider: Provider,
    adapter: Arc<dyn Storage>,
}

impl StorageService {
    /// Wrap an adapter that has already been built.
    pub fn new(provider: Provider, adapter: Arc<dyn Storage>) -> Self {
        Self { provider, adapter }
    }

    /// Build the adapter for the configured provider, and only that one.
    pub async fn from_config(config: StorageConfig) -> Result<Self> {
        let provider = config.provider();
        let adapter = create_storage(config).await?;
        info!(%provider, "storage backend initialised");
        Ok(Self::new(provider, Arc::from(adapter)))
    }

    /// Validate a configuration section and build the selected adapter.
    pub async fn from_section(section: &StorageSection) -> Result<Self> {
        Self::from_config(section.to_runtime()?).await
    }

    pub fn provider(&self) -> Provider {
        self.provider
    }
}

#[async_trait]
impl Storage for StorageService {
    #[instrument(skip(self, file), fields(provider = %self.provider, path = %file.path))]
    async fn upload(&self, file: UploadRequest, target: Option<&StorageTarget>) -> Result<String> {
        self.adapter.upload(file, target).await
    }

    #[instrument(skip(self), fields(provider = %self.provider))]
    async fn download(
        &self,
        path: &str,
        target: Option<&StorageTarget>,
    ) -> Result<DownloadedFile> {
        self.adapter.download(path, target).await
    }

    #[instrument(skip(self), fields(provider = %self.provider))]
    async fn delete(&self, path: &str, target: Option<&StorageTarget>) -> Result<()> {
        self.adapter.delete(path, target).await
    }
}
