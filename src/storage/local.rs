//! Local filesystem storage backend

use std::io::ErrorKind as IoErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::fs;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use super::{required, validate_key, Storage};
use crate::types::{DownloadedFile, StorageTarget, UploadRequest};
use crate::{Error, Result};

/// Settings for [`LocalStorage`].
#[derive(Debug, Clone)]
pub struct LocalSettings {
    pub directory: String,
}

impl Default for LocalSettings {
    fn default() -> Self {
        Self {
            directory: "./uploads".to_string(),
        }
    }
}

/// Local filesystem storage
///
/// Every key lives under one root directory; [`StorageTarget`] is ignored.
pub struct LocalStorage {
    root_path: PathBuf,
}

impl LocalStorage {
    pub fn new(root_path: impl Into<PathBuf>) -> Result<Self> {
        let root_path = root_path.into();
        required(&root_path.to_string_lossy(), "storage.local.directory")?;
        std::fs::create_dir_all(&root_path)
            .map_err(|e| Error::io(root_path.display().to_string(), e))?;
        Ok(Self { root_path })
    }

    pub fn root_path(&self) -> &Path {
        &self.root_path
    }

    fn resolve_path(&self, key: &str) -> Result<PathBuf> {
        validate_key(key)?;
        Ok(self.root_path.join(key))
    }
}

/// Hidden sibling the payload is written to before being renamed into place.
fn staging_path(dest: &Path) -> PathBuf {
    let name = dest
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    dest.with_file_name(format!(".{}.{}.tmp", name, Uuid::new_v4().simple()))
}

async fn write_atomic(dest: &Path, data: &[u8]) -> std::io::Result<()> {
    let staging = staging_path(dest);
    let result = async {
        fs::write(&staging, data).await?;
        fs::rename(&staging, dest).await
    }
    .await;

    if result.is_err() {
        let _ = fs::remove_file(&staging).await;
    }
    result
}

fn mimetype_for(key: &str) -> Option<String> {
    mime_guess::from_path(key).first_raw().map(str::to_string)
}

/// A key below an existing file (`a.txt/b.txt`) is missing, not an I/O fault.
fn translate(key: &str, path: &Path, err: std::io::Error) -> Error {
    if matches!(err.kind(), IoErrorKind::NotFound | IoErrorKind::NotADirectory) {
        Error::not_found_with(key, err)
    } else {
        warn!(path = %path.display(), error = %err, "local storage I/O failed");
        Error::io(path.display().to_string(), err)
    }
}

#[async_trait]
impl Storage for LocalStorage {
    #[instrument(skip(self, file, _target), fields(path = %file.path, size = file.data.len()))]
    async fn upload(&self, file: UploadRequest, _target: Option<&StorageTarget>) -> Result<String> {
        let dest = self.resolve_path(&file.path)?;

        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| Error::io(parent.display().to_string(), e))?;
        }
        write_atomic(&dest, &file.data)
            .await
            .map_err(|e| Error::io(dest.display().to_string(), e))?;

        let locator = dest.display().to_string();
        debug!(%locator, "wrote file");
        Ok(locator)
    }

    #[instrument(skip(self, _target))]
    async fn download(
        &self,
        path: &str,
        _target: Option<&StorageTarget>,
    ) -> Result<DownloadedFile> {
        let source = self.resolve_path(path)?;
        let data = fs::read(&source)
            .await
            .map_err(|e| translate(path, &source, e))?;

        Ok(DownloadedFile::new(path, mimetype_for(path), Bytes::from(data)))
    }

    #[instrument(skip(self, _target))]
    async fn delete(&self, path: &str, _target: Option<&StorageTarget>) -> Result<()> {
        let target_path = self.resolve_path(path)?;
        fs::remove_file(&target_path)
            .await
            .map_err(|e| translate(path, &target_path, e))
    }
}
