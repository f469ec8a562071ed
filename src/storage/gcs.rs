//! Google Cloud Storage backend

use std::sync::Arc;

use async_trait::async_trait;
use object_store::gcp::GoogleCloudStorageBuilder;
use object_store::ObjectStore;
use tracing::{debug, instrument};

use super::remote::{ContainerStores, StoreFactory};
use super::{required, Storage};
use crate::types::{DownloadedFile, StorageTarget, UploadRequest};
use crate::Result;

const BACKEND: &str = "gcs";

/// Settings for [`GcsStorage`].
#[derive(Debug, Clone, Default)]
pub struct GcsSettings {
    pub project_id: String,
    /// Service account JSON file; application default credentials when unset.
    pub key_filename: Option<String>,
    pub bucket: String,
}

impl GcsSettings {
    pub fn validate(&self) -> Result<()> {
        required(&self.project_id, "storage.gcp.project_id")?;
        required(&self.bucket, "storage.gcp.bucket")
    }
}

/// Google Cloud Storage backend
pub struct GcsStorage {
    project_id: String,
    stores: ContainerStores,
}

impl GcsStorage {
    pub fn new(settings: GcsSettings) -> Result<Self> {
        settings.validate()?;

        let key_filename = settings.key_filename.filter(|p| !p.trim().is_empty());
        let factory: StoreFactory = Arc::new(move |bucket: &str| {
            let mut builder = GoogleCloudStorageBuilder::new().with_bucket_name(bucket);
            if let Some(path) = &key_filename {
                builder = builder.with_service_account_path(path);
            }
            Ok(Arc::new(builder.build()?) as Arc<dyn ObjectStore>)
        });

        Self::with_store_factory(settings.project_id, settings.bucket, factory)
    }

    /// Build on top of caller-provided clients, one per bucket.
    pub fn with_store_factory(
        project_id: impl Into<String>,
        bucket: impl Into<String>,
        factory: StoreFactory,
    ) -> Result<Self> {
        let bucket = bucket.into();
        required(&bucket, "storage.gcp.bucket")?;

        Ok(Self {
            project_id: project_id.into(),
            stores: ContainerStores::new(BACKEND, bucket, factory)?,
        })
    }

    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    pub fn default_bucket(&self) -> &str {
        self.stores.default_container()
    }
}

/// `gs://` URI for an object.
pub fn object_uri(bucket: &str, key: &str) -> String {
    format!("gs://{}/{}", bucket, key)
}

#[async_trait]
impl Storage for GcsStorage {
    #[instrument(skip(self, file), fields(path = %file.path, size = file.data.len()))]
    async fn upload(&self, file: UploadRequest, target: Option<&StorageTarget>) -> Result<String> {
        let (bucket, store) = self.stores.resolve(target)?;
        let uri = object_uri(bucket, &file.path);

        self.stores.put(store.as_ref(), file).await?;
        debug!(%uri, "uploaded object");
        Ok(uri)
    }

    #[instrument(skip(self))]
    async fn download(
        &self,
        path: &str,
        target: Option<&StorageTarget>,
    ) -> Result<DownloadedFile> {
        let (_, store) = self.stores.resolve(target)?;
        self.stores.get(store.as_ref(), path).await
    }

    #[instrument(skip(self))]
    async fn delete(&self, path: &str, target: Option<&StorageTarget>) -> Result<()> {
        let (_, store) = self.stores.resolve(target)?;
        self.stores.delete(store.as_ref(), path).await
    }
}
