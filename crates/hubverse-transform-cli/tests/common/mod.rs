use std::path::Path;
use std::process::{Command, Output};
use std::{io, sync::Arc};

use arrow::array::{Array, StringArray};
use arrow::record_batch::RecordBatch;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;

pub type TestResult<T = ()> = Result<T, Box<dyn std::error::Error>>;

pub const MODEL_OUTPUT_CSV: &str = "\
reference_date,horizon,location,output_type,output_type_id,value
2420-01-01,0,02,quantile,0.25,1.5
2420-01-01,0,02,quantile,0.5,2.5
2420-01-01,1,US,mean,NA,3
";

pub fn cli_bin() -> &'static str {
    env!("CARGO_BIN_EXE_hubverse-transform")
}

pub fn run_cli(args: &[&str]) -> io::Result<Output> {
    Command::new(cli_bin())
        .args(args)
        .env_remove("HUBVERSE_ORIGIN_PREFIX")
        .env("RUST_LOG", "warn")
        .output()
}

pub fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

pub fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

pub fn assert_cli_success(output: &Output) {
    assert!(
        output.status.success(),
        "stdout:\n{}\nstderr:\n{}",
        stdout(output),
        stderr(output)
    );
}

pub fn write_file(root: &Path, rel: &str, contents: &str) -> TestResult {
    let path = root.join(rel);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, contents)?;
    Ok(())
}

pub fn read_parquet(path: &Path) -> TestResult<Vec<RecordBatch>> {
    let file = std::fs::File::open(path)?;
    let reader = ParquetRecordBatchReaderBuilder::try_new(file)?.build()?;
    Ok(reader.collect::<Result<Vec<_>, _>>()?)
}

pub fn string_values(batches: &[RecordBatch], name: &str) -> TestResult<Vec<Option<String>>> {
    let mut out = Vec::new();
    for batch in batches {
        let column = Arc::clone(
            batch
                .column_by_name(name)
                .ok_or_else(|| format!("missing column {name}"))?,
        );
        let array = column
            .as_any()
            .downcast_ref::<StringArray>()
            .ok_or_else(|| format!("column {name} is not a string column"))?;
        out.extend(array.iter().map(|v| v.map(str::to_string)));
    }
    Ok(out)
}
