use std::path::PathBuf;

use hubverse_transform_core::{EventError, StorageError, TransformError};
use snafu::Snafu;

pub type CliResult<T> = std::result::Result<T, CliError>;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum CliError {
    #[snafu(display("Invalid location '{spec}': {source}"))]
    InvalidLocation {
        spec: String,
        #[snafu(source(from(StorageError, Box::new)))]
        source: Box<StorageError>,
    },

    #[snafu(display("Failed to add model-output file {path}: {source}"))]
    AddModelOutput {
        path: String,
        #[snafu(source(from(TransformError, Box::new)))]
        source: Box<TransformError>,
    },

    #[snafu(display("Failed to delete model-output file for {path}: {source}"))]
    DeleteModelOutput {
        path: String,
        #[snafu(source(from(TransformError, Box::new)))]
        source: Box<TransformError>,
    },

    #[snafu(display("Invalid model-output file name '{file_name}': {source}"))]
    ParseFileName {
        file_name: String,
        #[snafu(source(from(TransformError, Box::new)))]
        source: Box<TransformError>,
    },

    #[snafu(display("Failed to read event notification from {}", path.display()))]
    ReadEventFile {
        path: PathBuf,
        source: std::io::Error,
    },

    #[snafu(display("Failed to read event notification from stdin"))]
    ReadEventStdin { source: std::io::Error },

    #[snafu(display("{source}"))]
    DecodeEvent { source: EventError },

    #[snafu(display("{failed} of {total} storage events failed"))]
    EventsFailed { failed: usize, total: usize },
}
