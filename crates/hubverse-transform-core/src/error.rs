//! Error types and SNAFU context selectors for transform runs.
//!
//! `TransformError` covers everything that makes a run fail: malformed
//! submission names (format errors), storage failures, and decode/encode
//! failures in the Arrow/Parquet layer. Conditions a caller is expected to
//! skip quietly (unsupported file types, deleting an output that is already
//! gone) are *not* errors; they are reported as
//! [`crate::outcome::SkipReason`] values instead.

use std::fmt;

use arrow::error::ArrowError;
use parquet::errors::ParquetError;
use snafu::prelude::*;

use crate::storage::StorageError;

/// Convenience alias for results of transform operations.
pub type TransformResult<T> = Result<T, TransformError>;

/// The storage capability that was in use when a backend call failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageOperation {
    /// Reading an object or file.
    Read,
    /// Writing (and committing) an object or file.
    Write,
    /// Deleting an object or file.
    Delete,
    /// Probing whether an object or file exists.
    Exists,
}

impl fmt::Display for StorageOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StorageOperation::Read => "read",
            StorageOperation::Write => "write",
            StorageOperation::Delete => "delete",
            StorageOperation::Exists => "exists",
        };
        f.write_str(s)
    }
}

/// Errors from a single add/update or delete run.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum TransformError {
    /// The file name does not start with a `YYYY-MM-DD` round id.
    #[snafu(display("Unable to get YYYY-MM-DD round_id from file name {file_name}"))]
    MissingRoundId {
        /// The offending file name (stem, without extension).
        file_name: String,
    },

    /// Nothing is left of the file name once the round id and its
    /// separators are removed.
    #[snafu(display("Unable to get model_id from file name {file_name}"))]
    MissingModelId {
        /// The offending file name (stem, without extension).
        file_name: String,
    },

    /// The submission path is not under the configured origin prefix.
    #[snafu(display("Model output path {path} does not begin with {origin_prefix}"))]
    MissingOriginPrefix {
        /// The submission path as received.
        path: String,
        /// The origin prefix every submission path must start with.
        origin_prefix: String,
    },

    /// A storage backend call failed.
    #[snafu(display("Storage {operation} failed for {path}: {source}"))]
    Storage {
        /// Which capability was being used.
        operation: StorageOperation,
        /// Fully resolved URI of the object or file.
        path: String,
        /// Underlying storage error.
        source: StorageError,
    },

    /// The CSV file could not be parsed.
    #[snafu(display("Failed to read CSV file {path}: {source}"))]
    CsvRead {
        /// URI of the CSV file.
        path: String,
        /// Underlying Arrow CSV error.
        source: ArrowError,
    },

    /// The Parquet file could not be opened or decoded.
    #[snafu(display("Failed to read Parquet file {path}: {source}"))]
    ParquetRead {
        /// URI of the Parquet file.
        path: String,
        /// Underlying Parquet error.
        source: ParquetError,
    },

    /// Column conversion or table assembly failed.
    #[snafu(display("Failed to convert columns of {path}: {source}"))]
    Arrow {
        /// URI of the file being converted.
        path: String,
        /// Underlying Arrow error.
        source: ArrowError,
    },

    /// Encoding the output Parquet file failed.
    #[snafu(display("Failed to write Parquet file {path}: {source}"))]
    ParquetWrite {
        /// URI of the output file.
        path: String,
        /// Underlying Parquet error.
        source: ParquetError,
    },

    /// The configured null tokens do not form a valid pattern.
    #[snafu(display("Invalid null-token pattern: {source}"))]
    NullTokenPattern {
        /// Underlying regex compilation error.
        source: regex::Error,
    },
}

impl TransformError {
    /// True for errors caused by a submission that violates the naming
    /// contract (bad round id, empty model id, or outside the origin prefix).
    pub fn is_format_error(&self) -> bool {
        matches!(
            self,
            TransformError::MissingRoundId { .. }
                | TransformError::MissingModelId { .. }
                | TransformError::MissingOriginPrefix { .. }
        )
    }
}
