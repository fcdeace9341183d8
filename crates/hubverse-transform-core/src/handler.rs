//! Add/update and delete pipelines for one submission.
//!
//! [`ModelOutputHandler::identify`] runs every check that does not need
//! storage: sanitizing the path, the origin-prefix contract, the file type,
//! and the file-name grammar. A handler that comes out of it can then run
//! either pipeline:
//!
//! ```text
//! add:    hub config (optional) -> read -> add round_id/model_id -> write
//! delete: exists? -> delete, or skip when the output is already gone
//! ```

use std::{fmt, sync::Arc};

use object_store::ObjectStore;
use snafu::ResultExt;

use crate::config::TransformOptions;
use crate::error::{ArrowSnafu, StorageOperation, StorageSnafu, TransformResult};
use crate::hub_config::{HubConfig, HubConfigError, TaskSchema};
use crate::identity::{FileType, SubmissionIdentity};
use crate::location::{OutputLocation, strip_origin};
use crate::outcome::{Outcome, SkipReason};
use crate::reader::read_model_output;
use crate::sanitize::{SanitizedPath, decode, sanitize_path};
use crate::schema::resolve_schema;
use crate::storage::{self, StorageError, StorageLocation};
use crate::table::ModelOutputTable;
use crate::writer;

/// Result of identifying a submission.
#[derive(Debug)]
pub enum Submission {
    /// A csv/parquet file with a valid name; ready to transform or delete.
    Supported(Box<ModelOutputHandler>),
    /// Not a model-output file this system handles. Not an error.
    Unsupported(SkipReason),
}

/// Transforms (or removes the transformed copy of) one model-output file.
#[derive(Debug, Clone)]
pub struct ModelOutputHandler {
    hub: StorageLocation,
    output: StorageLocation,
    input_path: SanitizedPath,
    output_location: OutputLocation,
    output_uri: String,
    identity: SubmissionIdentity,
    options: TransformOptions,
}

impl ModelOutputHandler {
    /// Identify the submission at `mo_path` (relative to `hub`).
    ///
    /// Outputs go under `output`, at the submission's path with the origin
    /// prefix removed and the extension replaced by `.parquet`.
    ///
    /// # Errors
    ///
    /// Format errors only: `MissingOriginPrefix`, `MissingRoundId`,
    /// `MissingModelId`. Nothing here touches storage.
    pub fn identify(
        hub: StorageLocation,
        mo_path: &str,
        output: StorageLocation,
        options: TransformOptions,
    ) -> TransformResult<Submission> {
        let input_path = sanitize_path(mo_path);
        let input_uri = hub.uri_for(&input_path);

        strip_origin(&input_path, &options.origin_prefix)?;

        let file_type = match input_path.extension() {
            None => {
                return Ok(unsupported(SkipReason::NoFileExtension { path: input_uri }));
            }
            Some(ext) => match FileType::from_extension(ext) {
                Some(file_type) => file_type,
                None => {
                    return Ok(unsupported(SkipReason::UnsupportedFileType {
                        path: input_uri,
                        extension: ext.to_ascii_lowercase(),
                    }));
                }
            },
        };

        let identity = SubmissionIdentity::new(input_uri, decode(input_path.stem()), file_type)?;
        let output_location = OutputLocation::derive(&input_path, &options.origin_prefix)?;
        let output_uri = output.uri_for(output_location.rel_path());

        log::debug!(
            input_uri:% = identity.input_uri, output_uri:% = output_uri,
            round_id:% = identity.round_id, model_id:% = identity.model_id;
            "identified model-output file"
        );

        Ok(Submission::Supported(Box::new(Self {
            hub,
            output,
            input_path,
            output_location,
            output_uri,
            identity,
            options,
        })))
    }

    /// Identify `key` in an object-store bucket whose hub data and
    /// transformed output share the bucket root.
    pub fn for_bucket(
        store: Arc<dyn ObjectStore>,
        bucket: &str,
        key: &str,
        options: TransformOptions,
    ) -> TransformResult<Submission> {
        let root = StorageLocation::object_store(store, format!("s3://{bucket}"));
        Self::identify(root.clone(), key, root, options)
    }

    /// Identity parsed from the file name.
    pub fn identity(&self) -> &SubmissionIdentity {
        &self.identity
    }

    /// Fully resolved, percent-encoded URI of the raw file.
    pub fn input_uri(&self) -> &str {
        &self.identity.input_uri
    }

    /// Fully resolved, percent-encoded URI of the canonical output.
    pub fn output_uri(&self) -> &str {
        &self.output_uri
    }

    /// Output path relative to the output location.
    pub fn output_location(&self) -> &OutputLocation {
        &self.output_location
    }

    /// Column types declared by the hub for this submission's round.
    ///
    /// A hub without configuration (or with an unreadable one) gets `None`;
    /// the reader then falls back to its default typing.
    pub async fn load_task_schema(&self) -> Option<TaskSchema> {
        if !self.options.use_hub_config {
            return None;
        }
        match HubConfig::load(&self.hub, &self.options).await {
            Ok(config) => {
                let schema = config.task_schema(Some(&self.identity.round_id));
                (!schema.is_empty()).then_some(schema)
            }
            Err(HubConfigError::MissingConfig { path }) => {
                log::debug!(path:% = path; "no hub config, using default column types");
                None
            }
            Err(e) => {
                log::warn!(
                    input_uri:% = self.input_uri(), reason:% = e;
                    "ignoring unusable hub config"
                );
                None
            }
        }
    }

    /// Read the raw file, typed for `task_schema` when given.
    pub async fn read_file(
        &self,
        task_schema: Option<&TaskSchema>,
    ) -> TransformResult<ModelOutputTable> {
        let schema = resolve_schema(self.identity.file_type, task_schema);
        read_model_output(
            &self.hub,
            &self.input_path,
            self.identity.file_type,
            &schema,
            self.options.csv_infer_records,
        )
        .await
    }

    /// Append the `round_id` and `model_id` columns.
    pub fn add_columns(&self, table: ModelOutputTable) -> TransformResult<ModelOutputTable> {
        table
            .with_identity(&self.identity.round_id, &self.identity.model_id)
            .context(ArrowSnafu {
                path: self.input_uri(),
            })
    }

    /// Write the table to the canonical output location.
    pub async fn write_parquet(&self, table: ModelOutputTable) -> TransformResult<String> {
        writer::write_parquet(
            &self.output,
            &self.output_location,
            table,
            self.options.writer_properties(),
        )
        .await
    }

    /// Transform the raw file and write its canonical Parquet copy.
    pub async fn add_model_output(&self) -> TransformResult<Outcome> {
        let task_schema = self.load_task_schema().await;
        let table = self.read_file(task_schema.as_ref()).await?;
        let table = self.add_columns(table)?;
        let rows = table.num_rows();
        let output_uri = self.write_parquet(table).await?;

        log::info!(
            input_uri:% = self.input_uri(), output_uri:% = output_uri, rows = rows;
            "transformed model-output file"
        );
        Ok(Outcome::Written { output_uri, rows })
    }

    /// Remove the canonical Parquet copy of the raw file.
    ///
    /// An output that does not exist is a skip, so deleting twice is safe.
    pub async fn delete_model_output(&self) -> TransformResult<Outcome> {
        let path = self.output_location.rel_path();
        let present = storage::exists(&self.output, path)
            .await
            .context(StorageSnafu {
                operation: StorageOperation::Exists,
                path: self.output_uri.clone(),
            })?;
        if !present {
            return Ok(self.missing_output());
        }

        match storage::delete(&self.output, path).await {
            Ok(()) => {}
            Err(StorageError::NotFound { .. }) => return Ok(self.missing_output()),
            Err(source) => {
                return Err(source).context(StorageSnafu {
                    operation: StorageOperation::Delete,
                    path: self.output_uri.clone(),
                });
            }
        }

        log::info!(output_uri:% = self.output_uri; "deleted model-output parquet file");
        Ok(Outcome::Deleted {
            output_uri: self.output_uri.clone(),
        })
    }

    fn missing_output(&self) -> Outcome {
        let reason = SkipReason::MissingOutput {
            path: self.output_uri.clone(),
        };
        log::warn!(reason:% = reason; "nothing to delete");
        Outcome::Skipped(reason)
    }
}

impl fmt::Display for ModelOutputHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Handle model-output data transforms for {}.", self.input_uri())
    }
}

fn unsupported(reason: SkipReason) -> Submission {
    log::warn!(reason:% = reason; "skipping model-output file");
    Submission::Unsupported(reason)
}

/// Identify and transform the submission at `mo_path`.
pub async fn add_model_output(
    hub: &StorageLocation,
    mo_path: &str,
    output: &StorageLocation,
    options: &TransformOptions,
) -> TransformResult<Outcome> {
    match ModelOutputHandler::identify(hub.clone(), mo_path, output.clone(), options.clone())? {
        Submission::Supported(handler) => handler.add_model_output().await,
        Submission::Unsupported(reason) => Ok(Outcome::Skipped(reason)),
    }
}

/// Identify the submission at `mo_path` and delete its canonical output.
pub async fn delete_model_output(
    hub: &StorageLocation,
    mo_path: &str,
    output: &StorageLocation,
    options: &TransformOptions,
) -> TransformResult<Outcome> {
    match ModelOutputHandler::identify(hub.clone(), mo_path, output.clone(), options.clone())? {
        Submission::Supported(handler) => handler.delete_model_output().await,
        Submission::Unsupported(reason) => Ok(Outcome::Skipped(reason)),
    }
}
