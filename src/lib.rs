//! Omnistore - provider-neutral file storage
//!
//! One async [`storage::Storage`] contract with four backends:
//! - AWS S3 through `aws-sdk-s3`
//! - Google Cloud Storage and Azure Blob Storage through `object_store`
//! - The local filesystem through `tokio::fs`
//!
//! The backend is chosen once from configuration by
//! [`storage::StorageService::from_config`].

pub mod config;
pub mod context;
pub mod error;
pub mod storage;
pub mod types;

pub use context::AppContext;
pub use error::{Error, ErrorKind, Result};
pub use storage::{Provider, Storage, StorageConfig, StorageService};
pub use types::{DownloadedFile, StorageTarget, UploadRequest};
