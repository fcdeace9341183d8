#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;

use arrow::array::{Array, Float64Array, Int64Array, StringArray};
use arrow::compute::concat_batches;
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use bytes::Bytes;
use parquet::arrow::ArrowWriter;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;

pub type TestResult<T = ()> = Result<T, Box<dyn std::error::Error>>;

/// Six rows; two have a missing `output_type_id` (one blank, one `NA`).
pub const NUMERIC_OUTPUT_TYPE_IDS_CSV: &str = "\
origin_date,target,horizon,location,output_type,output_type_id,value
2024-07-07,wk inc flu hosp,1,US,quantile,0.25,100.5
2024-07-07,wk inc flu hosp,1,US,quantile,0.5,120
2024-07-07,wk inc flu hosp,1,US,quantile,0.75,150.25
2024-07-07,wk inc flu hosp,1,US,mean,,125
2024-07-07,wk inc flu hosp,2,US,mean,NA,130
2024-07-07,wk inc flu hosp,2,US,quantile,0.5,128
";

/// Location codes with a leading zero that must survive the transform.
pub const LOCATIONS_CSV: &str = "\
reference_date,horizon,location,output_type,output_type_id,value
2024-05-04,0,02,quantile,0.01,1.5
2024-05-04,1,02,quantile,0.5,2.5
";

pub fn write_file(root: &Path, rel: &str, contents: &[u8]) -> TestResult {
    let path = root.join(rel);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, contents)?;
    Ok(())
}

/// Parquet file whose `location` is an integer column and whose
/// `output_type_id` is a float column.
pub fn numeric_location_parquet(rows: usize) -> TestResult<Vec<u8>> {
    let schema = Arc::new(Schema::new(vec![
        Field::new("location", DataType::Int64, true),
        Field::new("output_type", DataType::Utf8, true),
        Field::new("output_type_id", DataType::Float64, true),
        Field::new("value", DataType::Float64, true),
    ]));
    let batch = RecordBatch::try_new(
        schema.clone(),
        vec![
            Arc::new(Int64Array::from(vec![2; rows])),
            Arc::new(StringArray::from(vec!["quantile"; rows])),
            Arc::new(Float64Array::from(vec![0.01; rows])),
            Arc::new(Float64Array::from((0..rows).map(|i| i as f64).collect::<Vec<_>>())),
        ],
    )?;

    let mut buf = Vec::new();
    let mut writer = ArrowWriter::try_new(&mut buf, schema, None)?;
    writer.write(&batch)?;
    writer.close()?;
    Ok(buf)
}

pub fn read_parquet(bytes: impl Into<Bytes>) -> TestResult<RecordBatch> {
    let builder = ParquetRecordBatchReaderBuilder::try_new(bytes.into())?;
    let schema = builder.schema().clone();
    let batches = builder.build()?.collect::<Result<Vec<_>, _>>()?;
    Ok(concat_batches(&schema, &batches)?)
}

pub fn read_local_parquet(path: &Path) -> TestResult<RecordBatch> {
    read_parquet(std::fs::read(path)?)
}

pub fn strings(batch: &RecordBatch, name: &str) -> TestResult<Vec<Option<String>>> {
    let column = batch
        .column_by_name(name)
        .ok_or_else(|| format!("missing column {name}"))?;
    let array = column
        .as_any()
        .downcast_ref::<StringArray>()
        .ok_or_else(|| format!("column {name} is {}", column.data_type()))?;
    Ok(array.iter().map(|v| v.map(str::to_string)).collect())
}

pub fn column_type(batch: &RecordBatch, name: &str) -> TestResult<DataType> {
    Ok(batch.schema().field_with_name(name)?.data_type().clone())
}
