//! Shared driver for backends reached through the `object_store` crate
//!
//! GCS and Azure adapters differ only in how clients are built and how
//! locators look; reads, writes and deletes go through here.

use std::sync::Arc;

use dashmap::DashMap;
use object_store::path::Path as ObjectPath;
use object_store::{Attribute, AttributeValue, Attributes, ObjectStore, PutOptions, PutPayload};

use super::stream::collect_body;
use super::validate_key;
use crate::types::{resolve_container, DownloadedFile, StorageTarget, UploadRequest};
use crate::{Error, Result};

/// Builds a client bound to one bucket or container.
pub type StoreFactory =
    Arc<dyn Fn(&str) -> object_store::Result<Arc<dyn ObjectStore>> + Send + Sync>;

/// Upper bound on memoized clients, the default container included.
pub(crate) const MAX_CACHED_CONTAINERS: usize = 64;

/// Client handles keyed by container, with the default built up front.
///
/// Override containers are memoized until [`MAX_CACHED_CONTAINERS`] is
/// reached; past that, each call builds a client that is dropped afterwards.
pub(crate) struct ContainerStores {
    backend: &'static str,
    default_container: String,
    factory: StoreFactory,
    stores: DashMap<String, Arc<dyn ObjectStore>>,
}

impl ContainerStores {
    pub(crate) fn new(
        backend: &'static str,
        default_container: String,
        factory: StoreFactory,
    ) -> Result<Self> {
        let default_store = factory(&default_container).map_err(|e| {
            Error::config(format!(
                "failed to create {} client for '{}': {}",
                backend, default_container, e
            ))
        })?;

        let stores = DashMap::new();
        stores.insert(default_container.clone(), default_store);

        Ok(Self {
            backend,
            default_container,
            factory,
            stores,
        })
    }

    pub(crate) fn default_container(&self) -> &str {
        &self.default_container
    }

    /// Pick the container for a call and the client bound to it.
    pub(crate) fn resolve<'a>(
        &'a self,
        target: Option<&'a StorageTarget>,
    ) -> Result<(&'a str, Arc<dyn ObjectStore>)> {
        let container = resolve_container(target, &self.default_container);
        if let Some(store) = self.stores.get(container) {
            return Ok((container, Arc::clone(store.value())));
        }

        let store = (self.factory)(container).map_err(|e| {
            Error::backend(
                self.backend,
                format!("failed to create client for '{}'", container),
                e,
            )
        })?;
        if self.stores.len() >= MAX_CACHED_CONTAINERS {
            return Ok((container, store));
        }
        let entry = self.stores.entry(container.to_string()).or_insert(store);
        Ok((container, Arc::clone(entry.value())))
    }

    #[cfg(test)]
    fn cached(&self) -> usize {
        self.stores.len()
    }

    pub(crate) async fn put(&self, store: &dyn ObjectStore, file: UploadRequest) -> Result<()> {
        let location = object_path(&file.path)?;

        let mut attributes = Attributes::new();
        if !file.mimetype.trim().is_empty() {
            attributes.insert(Attribute::ContentType, AttributeValue::from(file.mimetype));
        }
        let options = PutOptions {
            attributes,
            ..Default::default()
        };

        store
            .put_opts(&location, PutPayload::from(file.data), options)
            .await
            .map_err(|e| self.translate(&file.path, "put", e))?;
        Ok(())
    }

    pub(crate) async fn get(&self, store: &dyn ObjectStore, path: &str) -> Result<DownloadedFile> {
        let location = object_path(path)?;

        let result = store
            .get(&location)
            .await
            .map_err(|e| self.translate(path, "get", e))?;

        let mimetype = result.attributes.get(&Attribute::ContentType).map(|value| {
            let value: &str = value.as_ref();
            value.to_string()
        });
        let data = collect_body(result.into_stream())
            .await
            .map_err(|e| self.translate(path, "body read", e))?;

        Ok(DownloadedFile::new(path, mimetype, data))
    }

    /// Stores differ on deleting a missing key, so existence is checked first.
    pub(crate) async fn delete(&self, store: &dyn ObjectStore, path: &str) -> Result<()> {
        let location = object_path(path)?;

        store
            .head(&location)
            .await
            .map_err(|e| self.translate(path, "head", e))?;
        store
            .delete(&location)
            .await
            .map_err(|e| self.translate(path, "delete", e))?;
        Ok(())
    }

    fn translate(&self, path: &str, operation: &str, err: object_store::Error) -> Error {
        match err {
            object_store::Error::NotFound { .. } => Error::not_found_with(path, err),
            other => Error::backend(
                self.backend,
                format!("{} '{}' failed", operation, path),
                other,
            ),
        }
    }
}

pub(crate) fn object_path(path: &str) -> Result<ObjectPath> {
    validate_key(path)?;
    ObjectPath::parse(path).map_err(|e| Error::invalid_path(path, e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;
    use object_store::memory::InMemory;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting_factory(built: Arc<AtomicUsize>) -> StoreFactory {
        Arc::new(move |_container: &str| {
            built.fetch_add(1, Ordering::SeqCst);
            Ok(Arc::new(InMemory::new()) as Arc<dyn ObjectStore>)
        })
    }

    #[test]
    fn builds_default_client_eagerly_and_memoizes_overrides() {
        let built = Arc::new(AtomicUsize::new(0));
        let stores =
            ContainerStores::new("test", "primary".into(), counting_factory(built.clone()))
                .unwrap();
        assert_eq!(built.load(Ordering::SeqCst), 1);

        let (container, _) = stores.resolve(None).unwrap();
        assert_eq!(container, "primary");
        assert_eq!(built.load(Ordering::SeqCst), 1);

        let target = StorageTarget::new("archive");
        let (container, first) = stores.resolve(Some(&target)).unwrap();
        let (_, second) = stores.resolve(Some(&target)).unwrap();
        assert_eq!(container, "archive");
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(built.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn override_clients_stop_being_memoized_at_the_cap() {
        let built = Arc::new(AtomicUsize::new(0));
        let stores =
            ContainerStores::new("test", "primary".into(), counting_factory(built.clone()))
                .unwrap();

        for i in 0..MAX_CACHED_CONTAINERS * 2 {
            let target = StorageTarget::new(format!("tenant-{}", i));
            let (container, _) = stores.resolve(Some(&target)).unwrap();
            assert_eq!(container, format!("tenant-{}", i));
        }
        assert_eq!(stores.cached(), MAX_CACHED_CONTAINERS);
        assert_eq!(built.load(Ordering::SeqCst), 1 + MAX_CACHED_CONTAINERS * 2);

        // Memoized containers keep their client; later ones get a fresh one per call.
        let early = StorageTarget::new("tenant-0");
        let (_, a) = stores.resolve(Some(&early)).unwrap();
        let (_, b) = stores.resolve(Some(&early)).unwrap();
        assert!(Arc::ptr_eq(&a, &b));

        let late = StorageTarget::new(format!("tenant-{}", MAX_CACHED_CONTAINERS * 2 - 1));
        let (_, c) = stores.resolve(Some(&late)).unwrap();
        let (_, d) = stores.resolve(Some(&late)).unwrap();
        assert!(!Arc::ptr_eq(&c, &d));
        assert_eq!(stores.cached(), MAX_CACHED_CONTAINERS);
    }

    #[test]
    fn failing_default_client_is_configuration_error() {
        let factory: StoreFactory = Arc::new(|container: &str| {
            Err(object_store::Error::Generic {
                store: "test",
                source: format!("no credentials for {}", container).into(),
            })
        });

        let err = ContainerStores::new("test", "primary".into(), factory)
            .err()
            .expect("construction must fail");
        assert_eq!(err.kind(), ErrorKind::InvalidConfiguration);
    }

    #[tokio::test]
    async fn content_type_survives_round_trip() {
        let built = Arc::new(AtomicUsize::new(0));
        let stores = ContainerStores::new("test", "primary".into(), counting_factory(built)).unwrap();
        let (_, store) = stores.resolve(None).unwrap();

        let file = UploadRequest::new("docs/readme.md", "text/markdown", "# hi");
        stores.put(store.as_ref(), file).await.unwrap();

        let downloaded = stores.get(store.as_ref(), "docs/readme.md").await.unwrap();
        assert_eq!(downloaded.name, "readme.md");
        assert_eq!(downloaded.mimetype, "text/markdown");
        assert_eq!(downloaded.data.as_ref(), b"# hi");
    }

    #[tokio::test]
    async fn deleting_missing_object_is_not_found() {
        let built = Arc::new(AtomicUsize::new(0));
        let stores = ContainerStores::new("test", "primary".into(), counting_factory(built)).unwrap();
        let (_, store) = stores.resolve(None).unwrap();

        let err = stores.delete(store.as_ref(), "ghost.txt").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }
}
