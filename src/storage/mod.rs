//! Storage abstraction layer
//!
//! Provides one interface over S3, Google Cloud Storage, Azure Blob Storage
//! and the local filesystem. The backend is picked once, by [`create_storage`].

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

use crate::types::{DownloadedFile, StorageTarget, UploadRequest};
use crate::{Error, Result};

pub mod azure;
pub mod gcs;
pub mod local;
pub mod remote;
pub mod s3;
pub mod service;
pub mod stream;

pub use azure::{AzureBlobStorage, AzureSettings};
pub use gcs::{GcsSettings, GcsStorage};
pub use local::{LocalSettings, LocalStorage};
pub use remote::StoreFactory;
pub use s3::{S3Settings, S3Storage};
pub use service::StorageService;

/// Capability set every backend adapter provides.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Write the whole payload and return where it now lives.
    async fn upload(&self, file: UploadRequest, target: Option<&StorageTarget>) -> Result<String>;

    /// Read an object fully into memory.
    async fn download(&self, path: &str, target: Option<&StorageTarget>)
        -> Result<DownloadedFile>;

    /// Remove an object. Missing objects are reported as [`Error::NotFound`].
    async fn delete(&self, path: &str, target: Option<&StorageTarget>) -> Result<()>;
}

/// Which backend is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Provider {
    Aws,
    Gcp,
    Azure,
    Local,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Aws => "aws",
            Provider::Gcp => "gcp",
            Provider::Azure => "azure",
            Provider::Local => "local",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Provider {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "aws" => Ok(Provider::Aws),
            "gcp" => Ok(Provider::Gcp),
            "azure" => Ok(Provider::Azure),
            "local" => Ok(Provider::Local),
            other => Err(Error::config(format!(
                "unknown storage provider '{}' (expected one of aws, gcp, azure, local)",
                other
            ))),
        }
    }
}

/// Resolved settings for the selected backend.
#[derive(Debug, Clone)]
pub enum StorageConfig {
    Aws(S3Settings),
    Gcp(GcsSettings),
    Azure(AzureSettings),
    Local(LocalSettings),
}

impl StorageConfig {
    pub fn provider(&self) -> Provider {
        match self {
            StorageConfig::Aws(_) => Provider::Aws,
            StorageConfig::Gcp(_) => Provider::Gcp,
            StorageConfig::Azure(_) => Provider::Azure,
            StorageConfig::Local(_) => Provider::Local,
        }
    }
}

/// Create storage backend from config
pub async fn create_storage(config: StorageConfig) -> Result<Box<dyn Storage>> {
    match config {
        StorageConfig::Aws(settings) => {
            let backend = S3Storage::new(settings).await?;
            Ok(Box::new(backend))
        }
        StorageConfig::Gcp(settings) => {
            let backend = GcsStorage::new(settings)?;
            Ok(Box::new(backend))
        }
        StorageConfig::Azure(settings) => {
            let backend = AzureBlobStorage::new(settings)?;
            Ok(Box::new(backend))
        }
        StorageConfig::Local(settings) => {
            let backend = LocalStorage::new(settings.directory)?;
            Ok(Box::new(backend))
        }
    }
}

/// Reject keys that are empty or could step outside the backend root.
pub(crate) fn validate_key(path: &str) -> Result<()> {
    if path.trim().is_empty() {
        return Err(Error::invalid_path(path, "path must not be empty"));
    }
    if path.starts_with('/') {
        return Err(Error::invalid_path(path, "path must be relative"));
    }
    for segment in path.split('/') {
        match segment {
            "" => return Err(Error::invalid_path(path, "path contains an empty segment")),
            "." | ".." => {
                return Err(Error::invalid_path(
                    path,
                    "path must not contain '.' or '..' segments",
                ))
            }
            _ => {}
        }
    }
    Ok(())
}

/// Unreserved URL characters stay as-is; `/` separates segments and is kept.
const KEY_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Percent-encode each segment of a key for use in an HTTP locator.
pub(crate) fn encode_key(key: &str) -> String {
    key.split('/')
        .map(|segment| utf8_percent_encode(segment, KEY_SEGMENT).to_string())
        .collect::<Vec<_>>()
        .join("/")
}

pub(crate) fn required(value: &str, field: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(Error::config(format!("{} must be specified", field)));
    }
    Ok(())
}
