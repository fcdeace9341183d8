//! Run outcomes.
//!
//! A run either produces something ([`Outcome::Written`],
//! [`Outcome::Deleted`]), is skipped for an expected reason
//! ([`Outcome::Skipped`]), or fails with a [`TransformError`]. Callers
//! branch on these values; nothing is signalled through errors that are
//! meant to be caught and ignored.

use std::fmt;

use crate::error::{TransformError, TransformResult};

/// Why a run was skipped instead of producing output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// The submission has an extension other than csv, parquet, or pqt.
    UnsupportedFileType {
        /// URI of the submission.
        path: String,
        /// The lower-cased extension found.
        extension: String,
    },

    /// The submission has no extension at all (for example, the event was
    /// raised for a folder placeholder).
    NoFileExtension {
        /// URI of the submission.
        path: String,
    },

    /// Deletion was requested but the canonical output does not exist.
    MissingOutput {
        /// URI of the canonical output that was looked for.
        path: String,
    },

    /// The storage event is neither a creation nor a removal.
    UnhandledEvent {
        /// The event name as delivered by the storage service.
        event_name: String,
    },
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::UnsupportedFileType { path, extension } => {
                write!(f, "Input file type .{extension} is not supported: {path}")
            }
            SkipReason::NoFileExtension { path } => {
                write!(f, "Input file has no extension: {path}")
            }
            SkipReason::MissingOutput { path } => {
                write!(f, "Model-output file not found: {path}")
            }
            SkipReason::UnhandledEvent { event_name } => {
                write!(f, "Event {event_name} does not require a transform")
            }
        }
    }
}

/// Successful result of an add/update or delete operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// A canonical Parquet file was written.
    Written {
        /// URI of the written file.
        output_uri: String,
        /// Number of rows written.
        rows: usize,
    },
    /// The canonical Parquet file was removed.
    Deleted {
        /// URI of the removed file.
        output_uri: String,
    },
    /// Nothing was done; the reason is expected and not an operational failure.
    Skipped(SkipReason),
}

impl Outcome {
    /// URI of the canonical output touched by this run, if any.
    pub fn output_uri(&self) -> Option<&str> {
        match self {
            Outcome::Written { output_uri, .. } | Outcome::Deleted { output_uri } => {
                Some(output_uri)
            }
            Outcome::Skipped(_) => None,
        }
    }
}

/// Terminal state of one run, folded from a [`TransformResult<Outcome>`].
#[derive(Debug)]
pub enum RunOutcome {
    /// Output written or deleted at the given URI.
    Success(String),
    /// Skipped for an expected reason.
    Skipped(SkipReason),
    /// Failed; the caller should alert.
    Failed(TransformError),
}

impl RunOutcome {
    /// True when the run failed and the caller should treat it as an
    /// operational problem.
    pub fn is_failure(&self) -> bool {
        matches!(self, RunOutcome::Failed(_))
    }
}

impl From<TransformResult<Outcome>> for RunOutcome {
    fn from(result: TransformResult<Outcome>) -> Self {
        match result {
            Ok(Outcome::Written { output_uri, .. }) | Ok(Outcome::Deleted { output_uri }) => {
                RunOutcome::Success(output_uri)
            }
            Ok(Outcome::Skipped(reason)) => RunOutcome::Skipped(reason),
            Err(e) => RunOutcome::Failed(e),
        }
    }
}
