//! Writing the canonical Parquet file.

use parquet::arrow::ArrowWriter;
use parquet::file::properties::WriterProperties;
use snafu::ResultExt;

use crate::error::{ParquetWriteSnafu, StorageOperation, StorageSnafu, TransformResult};
use crate::location::OutputLocation;
use crate::storage::{StorageLocation, open_output_sink};
use crate::table::ModelOutputTable;

/// Write `table` to `output` under `location` and return the output URI.
///
/// An existing file at the same path is replaced. The new contents only
/// become visible once the whole file has been written.
pub async fn write_parquet(
    location: &StorageLocation,
    output: &OutputLocation,
    table: ModelOutputTable,
    props: WriterProperties,
) -> TransformResult<String> {
    let uri = location.uri_for(output.rel_path());

    let sink = open_output_sink(location, output.rel_path())
        .await
        .context(StorageSnafu {
            operation: StorageOperation::Write,
            path: uri.clone(),
        })?;

    let batch = table.into_batch();
    let mut writer = ArrowWriter::try_new(sink, batch.schema(), Some(props))
        .context(ParquetWriteSnafu { path: uri.clone() })?;
    writer
        .write(&batch)
        .context(ParquetWriteSnafu { path: uri.clone() })?;
    let sink = writer
        .into_inner()
        .context(ParquetWriteSnafu { path: uri.clone() })?;

    sink.finish().await.context(StorageSnafu {
        operation: StorageOperation::Write,
        path: uri.clone(),
    })?;

    log::info!(output_uri:% = uri, rows = batch.num_rows(); "finished writing parquet file");
    Ok(uri)
}
