//! Core engine for normalizing hub model-output submissions.
//!
//! A hub collects "model-output" files from contributors, one file per
//! model per round, as CSV or Parquet under a raw prefix (for example
//! `raw/model-output/teamabc/2024-07-07-teamabc-model.csv`). This crate turns
//! one such submission into one canonical Parquet file:
//!
//! - The submission path is sanitized once on entry (`sanitize` module) and
//!   the file name is parsed into a `round_id` and a `model_id`
//!   (`identity` module).
//! - The output location is derived by stripping the raw prefix
//!   (`location` module); add/update and delete share the same derivation.
//! - Column types are resolved (`schema` module), optionally refined by the
//!   hub's task configuration (`hub_config` module), and the file is loaded
//!   into an Arrow table (`reader` module).
//! - Identity columns are appended (`table` module) and the result is
//!   written as Parquet (`writer` module).
//!
//! All I/O goes through the `storage` module, which supports the local
//! filesystem and any `object_store` backend. The `handler` module ties the
//! steps together and the `event` module maps storage-change notifications
//! onto the add/update and delete entry points.
#![deny(missing_docs)]

pub mod config;
pub mod error;
pub mod event;
pub mod handler;
pub mod hub_config;
pub mod identity;
pub mod location;
pub mod outcome;
pub mod reader;
pub mod sanitize;
pub mod schema;
pub mod storage;
pub mod table;
pub mod writer;

pub use config::{DEFAULT_ORIGIN_PREFIX, TransformOptions};
pub use error::{TransformError, TransformResult};
pub use event::{ChangeKind, EventError, StorageEvent, dispatch};
pub use handler::{ModelOutputHandler, Submission, add_model_output, delete_model_output};
pub use hub_config::{HubConfig, HubConfigError, TaskSchema};
pub use identity::{FileType, SubmissionIdentity, parse_file_name};
pub use location::OutputLocation;
pub use outcome::{Outcome, RunOutcome, SkipReason};
pub use sanitize::{SanitizedPath, sanitize_path};
pub use storage::{StorageError, StorageLocation};
pub use table::ModelOutputTable;
