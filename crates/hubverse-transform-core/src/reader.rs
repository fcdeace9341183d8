//! Reading raw submissions into a [`ModelOutputTable`].
//!
//! CSV files are type-inferred (with null tokens excluded from inference),
//! re-typed with the [`ColumnSchema`], and decoded with the null tokens
//! mapped to null. Parquet files are decoded with their own schema and each
//! column whose type differs from the target is cast afterwards; the cast is
//! strict, so a value that cannot be represented fails the run instead of
//! silently becoming null.

use std::io::Cursor;

use arrow::array::ArrayRef;
use arrow::compute::{CastOptions, cast_with_options, concat_batches};
use arrow::datatypes::SchemaRef;
use arrow::error::ArrowError;
use arrow::record_batch::RecordBatch;
use arrow_csv::reader::{Format, ReaderBuilder};
use bytes::Bytes;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use snafu::ResultExt;

use crate::error::{
    ArrowSnafu, CsvReadSnafu, ParquetReadSnafu, StorageOperation, StorageSnafu, TransformResult,
};
use crate::identity::FileType;
use crate::sanitize::SanitizedPath;
use crate::schema::ColumnSchema;
use crate::storage::{self, StorageLocation};
use crate::table::ModelOutputTable;

/// Read the submission at `path` under `location`.
///
/// `csv_infer_records` limits how many CSV records are used for type
/// inference (`None` reads them all). It is ignored for Parquet.
pub async fn read_model_output(
    location: &StorageLocation,
    path: &SanitizedPath,
    file_type: FileType,
    schema: &ColumnSchema,
    csv_infer_records: Option<usize>,
) -> TransformResult<ModelOutputTable> {
    let uri = location.uri_for(path);
    log::info!(input_uri:% = uri; "reading model-output file");

    let bytes = storage::read_all_bytes(location, path)
        .await
        .context(StorageSnafu {
            operation: StorageOperation::Read,
            path: uri.clone(),
        })?;

    let batch = match file_type {
        FileType::Csv => decode_csv(bytes, schema, csv_infer_records, &uri)?,
        FileType::Parquet => decode_parquet(bytes, schema, &uri)?,
    };

    log::debug!(
        input_uri:% = uri, rows = batch.num_rows(), columns = batch.num_columns();
        "read model-output file"
    );
    Ok(ModelOutputTable::new(batch))
}

/// Decode CSV bytes under `schema`.
pub fn decode_csv(
    bytes: Bytes,
    schema: &ColumnSchema,
    infer_records: Option<usize>,
    uri: &str,
) -> TransformResult<RecordBatch> {
    let mut format = Format::default().with_header(true);
    if let Some(tokens) = schema.null_tokens() {
        format = format.with_null_regex(tokens.to_regex()?);
    }

    let (native, _) = format
        .infer_schema(Cursor::new(&bytes[..]), infer_records)
        .context(CsvReadSnafu { path: uri })?;
    let target = schema.apply(&native);

    let reader = ReaderBuilder::new(target.clone())
        .with_format(format)
        .build(Cursor::new(bytes))
        .context(CsvReadSnafu { path: uri })?;

    let batches = reader
        .collect::<Result<Vec<_>, _>>()
        .context(CsvReadSnafu { path: uri })?;
    concat_batches(&target, &batches).context(ArrowSnafu { path: uri })
}

/// Decode Parquet bytes and cast columns to the types `schema` asks for.
pub fn decode_parquet(
    bytes: Bytes,
    schema: &ColumnSchema,
    uri: &str,
) -> TransformResult<RecordBatch> {
    let builder =
        ParquetRecordBatchReaderBuilder::try_new(bytes).context(ParquetReadSnafu { path: uri })?;
    let target = schema.apply(builder.schema());
    let reader = builder.build().context(ParquetReadSnafu { path: uri })?;

    let mut batches = Vec::new();
    for batch in reader {
        let batch = batch.context(ArrowSnafu { path: uri })?;
        batches.push(coerce_batch(batch, &target).context(ArrowSnafu { path: uri })?);
    }
    concat_batches(&target, &batches).context(ArrowSnafu { path: uri })
}

/// Cast every column of `batch` to the matching type in `target`.
fn coerce_batch(batch: RecordBatch, target: &SchemaRef) -> Result<RecordBatch, ArrowError> {
    let options = CastOptions {
        safe: false,
        ..Default::default()
    };
    let columns = batch
        .columns()
        .iter()
        .zip(target.fields())
        .map(|(column, field)| {
            if column.data_type() == field.data_type() {
                Ok(column.clone())
            } else {
                cast_with_options(column, field.data_type(), &options)
            }
        })
        .collect::<Result<Vec<ArrayRef>, ArrowError>>()?;
    RecordBatch::try_new(target.clone(), columns)
}
