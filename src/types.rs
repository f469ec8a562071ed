//! Request and response types shared by every storage backend

use std::fmt;

use bytes::Bytes;

/// MIME type reported when a backend cannot tell.
pub const DEFAULT_MIMETYPE: &str = "application/octet-stream";

/// A file to be written to storage.
#[derive(Debug, Clone)]
pub struct UploadRequest {
    /// Backend-relative key, `/` separated.
    pub path: String,
    pub mimetype: String,
    pub data: Bytes,
}

impl UploadRequest {
    pub fn new(path: impl Into<String>, mimetype: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self {
            path: path.into(),
            mimetype: mimetype.into(),
            data: data.into(),
        }
    }
}

/// A file read back from storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadedFile {
    /// Final segment of the requested path.
    pub name: String,
    pub mimetype: String,
    pub data: Bytes,
}

impl DownloadedFile {
    pub fn new(path: &str, mimetype: Option<String>, data: Bytes) -> Self {
        Self {
            name: file_name(path).to_string(),
            mimetype: mimetype
                .filter(|m| !m.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_MIMETYPE.to_string()),
            data,
        }
    }
}

/// Per-call override of the bucket or container an adapter talks to.
///
/// The local backend has a single root and ignores it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StorageTarget {
    container: String,
}

impl StorageTarget {
    pub fn new(container: impl Into<String>) -> Self {
        Self {
            container: container.into(),
        }
    }

    pub fn container(&self) -> &str {
        &self.container
    }
}

impl From<&str> for StorageTarget {
    fn from(container: &str) -> Self {
        Self::new(container)
    }
}

impl From<String> for StorageTarget {
    fn from(container: String) -> Self {
        Self::new(container)
    }
}

impl fmt::Display for StorageTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.container)
    }
}

/// Returns the container to use for a call: the override when given, else the default.
pub fn resolve_container<'a>(target: Option<&'a StorageTarget>, default: &'a str) -> &'a str {
    target.map(StorageTarget::container).unwrap_or(default)
}

fn file_name(path: &str) -> &str {
    path.trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or(path)
}
