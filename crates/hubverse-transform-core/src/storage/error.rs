//! Storage error types shared by the local and object-store backends.

use std::{error::Error, fmt, io};

use snafu::{Backtrace, IntoError, prelude::*};

/// Errors produced by a storage backend implementation.
///
/// Backend-specific errors are wrapped in this enum so higher layers can map
/// them into `StorageError` variants with additional context.
#[derive(Debug)]
pub enum BackendError {
    /// A local filesystem I/O error.
    Local(io::Error),
    /// An error from an `object_store` backend (S3, in-memory).
    ObjectStore(object_store::Error),
}

impl fmt::Display for BackendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendError::Local(e) => write!(f, "local I/O error: {e}"),
            BackendError::ObjectStore(e) => write!(f, "object store error: {e}"),
        }
    }
}

impl Error for BackendError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            BackendError::Local(e) => Some(e),
            BackendError::ObjectStore(e) => Some(e),
        }
    }
}

impl BackendError {
    /// True when the backend reports that the object or file does not exist.
    pub fn is_not_found(&self) -> bool {
        match self {
            BackendError::Local(e) => e.kind() == io::ErrorKind::NotFound,
            BackendError::ObjectStore(e) => matches!(e, object_store::Error::NotFound { .. }),
        }
    }
}

/// Errors that can occur during storage operations.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum StorageError {
    /// The specified path was not found.
    #[snafu(display("Path not found: {path}"))]
    NotFound {
        /// The path that was not found.
        path: String,
        /// Underlying backend error that caused the failure.
        source: BackendError,
        /// The backtrace at the time the error occurred.
        backtrace: Backtrace,
    },

    /// Any other backend failure.
    #[snafu(display("I/O error at {path}: {source}"))]
    OtherIo {
        /// The path where the I/O error occurred.
        path: String,
        /// Underlying backend error with platform-specific details.
        source: BackendError,
        /// The backtrace at the time the error occurred.
        backtrace: Backtrace,
    },

    /// A location string could not be turned into a storage backend.
    #[snafu(display("Invalid storage location {spec}: {reason}"))]
    InvalidLocation {
        /// The location string as given.
        spec: String,
        /// What was wrong with it.
        reason: String,
        /// The backtrace captured when the error occurred.
        backtrace: Backtrace,
    },
}

impl StorageError {
    /// Classify a backend failure at `path` as `NotFound` or `OtherIo`.
    pub(crate) fn from_backend(path: impl Into<String>, source: BackendError) -> Self {
        let path = path.into();
        if source.is_not_found() {
            NotFoundSnafu { path }.into_error(source)
        } else {
            OtherIoSnafu { path }.into_error(source)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_missing_paths_as_not_found() {
        let missing = BackendError::Local(io::Error::new(io::ErrorKind::NotFound, "gone"));
        let err = StorageError::from_backend("raw/missing.csv", missing);
        assert!(matches!(err, StorageError::NotFound { ref path, .. } if path == "raw/missing.csv"));

        let denied = BackendError::Local(io::Error::new(io::ErrorKind::PermissionDenied, "no"));
        let err = StorageError::from_backend("raw/locked.csv", denied);
        assert!(matches!(err, StorageError::OtherIo { .. }));
        assert!(err.to_string().contains("raw/locked.csv"));
    }

    #[test]
    fn object_store_not_found_is_classified() {
        let missing = BackendError::ObjectStore(object_store::Error::NotFound {
            path: "raw/missing.csv".to_string(),
            source: "no such key".into(),
        });
        assert!(missing.is_not_found());
        assert!(matches!(
            StorageError::from_backend("raw/missing.csv", missing),
            StorageError::NotFound { .. }
        ));
    }
}
