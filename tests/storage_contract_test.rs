//! Contract tests shared by every backend that can run without network access.
//!
//! GCS and Azure adapters are driven through in-memory object stores, one per
//! bucket/container, so the tests can see which container received the I/O.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use object_store::memory::InMemory;
use object_store::path::Path as ObjectPath;
use object_store::ObjectStore;
use omnistore::storage::{AzureBlobStorage, GcsStorage, LocalStorage, StoreFactory};
use omnistore::{ErrorKind, Storage, StorageTarget, UploadRequest};
use tempfile::TempDir;

type Buckets = Arc<Mutex<HashMap<String, Arc<InMemory>>>>;

fn bucket_factory(buckets: Buckets) -> StoreFactory {
    Arc::new(move |name: &str| {
        let mut buckets = buckets.lock().unwrap();
        let store = buckets
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(InMemory::new()))
            .clone();
        Ok(store as Arc<dyn ObjectStore>)
    })
}

fn bucket(buckets: &Buckets, name: &str) -> Option<Arc<InMemory>> {
    buckets.lock().unwrap().get(name).cloned()
}

struct Backends {
    _dir: TempDir,
    all: Vec<(&'static str, Box<dyn Storage>)>,
}

fn backends() -> Backends {
    let dir = TempDir::new().unwrap();
    let local = LocalStorage::new(dir.path().join("uploads")).unwrap();
    let gcs = GcsStorage::with_store_factory(
        "test-project",
        "media",
        bucket_factory(Buckets::default()),
    )
    .unwrap();
    let azure = AzureBlobStorage::with_store_factory(
        "https://acme.blob.core.windows.net",
        "media",
        bucket_factory(Buckets::default()),
    )
    .unwrap();

    Backends {
        _dir: dir,
        all: vec![
            ("local", Box::new(local) as Box<dyn Storage>),
            ("gcs", Box::new(gcs) as Box<dyn Storage>),
            ("azure", Box::new(azure) as Box<dyn Storage>),
        ],
    }
}

#[tokio::test]
async fn round_trip_returns_identical_bytes() {
    let backends = backends();
    let payload: Vec<u8> = (0..=255u8).cycle().take(64 * 1024 + 7).collect();

    for (name, storage) in &backends.all {
        let file = UploadRequest::new(
            "nested/dir/blob.bin",
            "application/octet-stream",
            payload.clone(),
        );
        storage.upload(file, None).await.unwrap();

        let downloaded = storage.download("nested/dir/blob.bin", None).await.unwrap();
        assert_eq!(downloaded.data.as_ref(), payload.as_slice(), "backend {}", name);
        assert_eq!(downloaded.name, "blob.bin", "backend {}", name);
    }
}

#[tokio::test]
async fn empty_payload_round_trips() {
    let backends = backends();

    for (name, storage) in &backends.all {
        storage
            .upload(UploadRequest::new("empty.txt", "text/plain", Bytes::new()), None)
            .await
            .unwrap();
        let downloaded = storage.download("empty.txt", None).await.unwrap();
        assert!(downloaded.data.is_empty(), "backend {}", name);
    }
}

#[tokio::test]
async fn deleting_never_uploaded_path_is_not_found() {
    let backends = backends();

    for (name, storage) in &backends.all {
        let err = storage.delete("never/uploaded.txt", None).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound, "backend {}", name);
    }
}

#[tokio::test]
async fn downloading_missing_path_is_not_found() {
    let backends = backends();

    for (name, storage) in &backends.all {
        let err = storage.download("missing.txt", None).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound, "backend {}", name);
    }
}

#[tokio::test]
async fn upload_delete_download_reports_not_found() {
    let backends = backends();

    for (name, storage) in &backends.all {
        storage
            .upload(UploadRequest::new("c/gone.txt", "text/plain", "bye"), None)
            .await
            .unwrap();
        storage.delete("c/gone.txt", None).await.unwrap();

        let err = storage.download("c/gone.txt", None).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound, "backend {}", name);
    }
}

#[tokio::test]
async fn key_below_existing_file_is_not_found() {
    let backends = backends();

    for (name, storage) in &backends.all {
        storage
            .upload(UploadRequest::new("a.txt", "text/plain", "leaf"), None)
            .await
            .unwrap();

        let err = storage.download("a.txt/b.txt", None).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound, "backend {}", name);
        let err = storage.delete("a.txt/b.txt", None).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound, "backend {}", name);

        let leaf = storage.download("a.txt", None).await.unwrap();
        assert_eq!(leaf.data.as_ref(), b"leaf", "backend {}", name);
    }
}

#[tokio::test]
async fn mimetype_is_reported_on_download() {
    let backends = backends();

    for (name, storage) in &backends.all {
        storage
            .upload(UploadRequest::new("docs/page.html", "text/html", "<p/>"), None)
            .await
            .unwrap();
        let downloaded = storage.download("docs/page.html", None).await.unwrap();
        assert_eq!(downloaded.mimetype, "text/html", "backend {}", name);
    }
}

#[tokio::test]
async fn gcs_default_and_explicit_bucket() {
    let buckets = Buckets::default();
    let storage =
        GcsStorage::with_store_factory("test-project", "media", bucket_factory(buckets.clone()))
            .unwrap();
    let key = ObjectPath::from("report.csv");

    let uri = storage
        .upload(UploadRequest::new("report.csv", "text/csv", "a,b"), None)
        .await
        .unwrap();
    assert_eq!(uri, "gs://media/report.csv");
    assert!(bucket(&buckets, "media").unwrap().head(&key).await.is_ok());
    assert!(bucket(&buckets, "archive").is_none());

    let archive = StorageTarget::new("archive");
    let uri = storage
        .upload(UploadRequest::new("report.csv", "text/csv", "c,d"), Some(&archive))
        .await
        .unwrap();
    assert_eq!(uri, "gs://archive/report.csv");

    let from_archive = storage.download("report.csv", Some(&archive)).await.unwrap();
    let from_default = storage.download("report.csv", None).await.unwrap();
    assert_eq!(from_archive.data.as_ref(), b"c,d");
    assert_eq!(from_default.data.as_ref(), b"a,b");

    storage.delete("report.csv", Some(&archive)).await.unwrap();
    assert!(bucket(&buckets, "archive").unwrap().head(&key).await.is_err());
    assert!(bucket(&buckets, "media").unwrap().head(&key).await.is_ok());
}

#[tokio::test]
async fn azure_default_and_explicit_container() {
    let containers = Buckets::default();
    let storage = AzureBlobStorage::with_store_factory(
        "https://acme.blob.core.windows.net",
        "files",
        bucket_factory(containers.clone()),
    )
    .unwrap();
    let key = ObjectPath::from("a/b.txt");
    let other = StorageTarget::new("other");

    let url = storage
        .upload(UploadRequest::new("a/b.txt", "text/plain", "hello"), Some(&other))
        .await
        .unwrap();
    assert_eq!(url, "https://acme.blob.core.windows.net/other/a/b.txt");
    assert!(bucket(&containers, "other").unwrap().head(&key).await.is_ok());
    assert!(bucket(&containers, "files").unwrap().head(&key).await.is_err());

    let err = storage.download("a/b.txt", None).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn local_upload_lands_under_directory() {
    let dir = TempDir::new().unwrap();
    let root = dir.path().join("uploads");
    let storage = LocalStorage::new(&root).unwrap();

    let locator = storage
        .upload(UploadRequest::new("a/b.txt", "text/plain", "hello"), None)
        .await
        .unwrap();

    assert_eq!(locator, root.join("a/b.txt").display().to_string());
    assert_eq!(std::fs::read_to_string(root.join("a/b.txt")).unwrap(), "hello");
}

#[tokio::test]
async fn concurrent_uploads_do_not_interfere() {
    let dir = TempDir::new().unwrap();
    let storage: Arc<dyn Storage> = Arc::new(LocalStorage::new(dir.path()).unwrap());

    let mut handles = Vec::new();
    for i in 0..16 {
        let storage = storage.clone();
        handles.push(tokio::spawn(async move {
            let key = format!("batch/{}.txt", i);
            storage
                .upload(
                    UploadRequest::new(key.clone(), "text/plain", format!("item {}", i)),
                    None,
                )
                .await
                .unwrap();
            storage.download(&key, None).await.unwrap()
        }));
    }

    for (i, handle) in handles.into_iter().enumerate() {
        let file = handle.await.unwrap();
        assert_eq!(file.data, Bytes::from(format!("item {}", i)));
    }
}
