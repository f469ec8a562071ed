//! Error types for omnistore

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Boxed native error kept as the source of a translated failure.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Object not found: {path}")]
    NotFound {
        path: String,
        #[source]
        source: Option<BoxError>,
    },

    #[error("{backend} backend unavailable: {message}")]
    BackendUnavailable {
        backend: &'static str,
        message: String,
        #[source]
        source: Option<BoxError>,
    },

    #[error("Invalid storage configuration: {0}")]
    InvalidConfiguration(String),

    #[error("IO error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid object path '{path}': {reason}")]
    InvalidPath { path: String, reason: String },
}

/// Coarse classification of [`Error`], stable across backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    BackendUnavailable,
    InvalidConfiguration,
    IoFailure,
    InvalidPath,
}

impl Error {
    pub fn not_found(path: impl Into<String>) -> Self {
        Error::NotFound {
            path: path.into(),
            source: None,
        }
    }

    pub fn not_found_with(path: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Error::NotFound {
            path: path.into(),
            source: Some(source.into()),
        }
    }

    pub fn backend(
        backend: &'static str,
        message: impl Into<String>,
        source: impl Into<BoxError>,
    ) -> Self {
        Error::BackendUnavailable {
            backend,
            message: message.into(),
            source: Some(source.into()),
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Error::InvalidConfiguration(msg.into())
    }

    pub fn io(path: impl Into<String>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }

    pub fn invalid_path(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::InvalidPath {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::NotFound { .. } => ErrorKind::NotFound,
            Error::BackendUnavailable { .. } => ErrorKind::BackendUnavailable,
            Error::InvalidConfiguration(_) => ErrorKind::InvalidConfiguration,
            Error::Io { .. } => ErrorKind::IoFailure,
            Error::InvalidPath { .. } => ErrorKind::InvalidPath,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }
}
