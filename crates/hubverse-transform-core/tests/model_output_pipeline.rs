#![allow(missing_docs)]

mod common;

use std::sync::Arc;

use arrow::datatypes::DataType;
use hubverse_transform_core::{
    ModelOutputHandler, Outcome, SkipReason, StorageLocation, Submission, TransformError,
    TransformOptions, add_model_output, delete_model_output,
};
use object_store::memory::InMemory;
use object_store::path::Path as ObjectPath;
use object_store::{ObjectStore, PutPayload};
use serde_json::json;
use tempfile::TempDir;

use common::{
    LOCATIONS_CSV, NUMERIC_OUTPUT_TYPE_IDS_CSV, TestResult, column_type, numeric_location_parquet,
    read_local_parquet, read_parquet, strings, write_file,
};

fn written(outcome: Outcome) -> TestResult<(String, usize)> {
    match outcome {
        Outcome::Written { output_uri, rows } => Ok((output_uri, rows)),
        other => Err(format!("expected a written file, got {other:?}").into()),
    }
}

#[tokio::test]
async fn numeric_output_type_ids_become_nullable_strings() -> TestResult {
    let tmp = TempDir::new()?;
    let mo_path = "raw/teamA/2024-07-07-teamabc-output_type_ids_numeric.csv";
    write_file(tmp.path(), mo_path, NUMERIC_OUTPUT_TYPE_IDS_CSV.as_bytes())?;

    let hub = StorageLocation::local(tmp.path());
    let output = hub.join("model-output");
    let outcome = add_model_output(&hub, mo_path, &output, &TransformOptions::default()).await?;
    let (output_uri, rows) = written(outcome)?;
    assert_eq!(rows, 6);
    assert!(output_uri.ends_with(
        "model-output/teamA/2024-07-07-teamabc-output_type_ids_numeric.parquet"
    ));

    let batch = read_local_parquet(
        &tmp.path()
            .join("model-output/teamA/2024-07-07-teamabc-output_type_ids_numeric.parquet"),
    )?;
    assert_eq!(batch.num_rows(), 6);
    assert_eq!(column_type(&batch, "output_type_id")?, DataType::Utf8);
    assert_eq!(
        strings(&batch, "output_type_id")?,
        vec![
            Some("0.25".to_string()),
            Some("0.5".to_string()),
            Some("0.75".to_string()),
            None,
            None,
            Some("0.5".to_string()),
        ]
    );
    assert_eq!(strings(&batch, "round_id")?, vec![Some("2024-07-07".to_string()); 6]);
    assert_eq!(
        strings(&batch, "model_id")?,
        vec![Some("teamabc-output_type_ids_numeric".to_string()); 6]
    );
    Ok(())
}

#[tokio::test]
async fn csv_locations_keep_leading_zeros() -> TestResult {
    let tmp = TempDir::new()?;
    let mo_path = "raw/2024-05-04-teamabc-locations_numeric.csv";
    write_file(tmp.path(), mo_path, LOCATIONS_CSV.as_bytes())?;

    let hub = StorageLocation::local(tmp.path());
    let output = hub.join("model-output");
    add_model_output(&hub, mo_path, &output, &TransformOptions::default()).await?;

    let batch = read_local_parquet(
        &tmp.path()
            .join("model-output/2024-05-04-teamabc-locations_numeric.parquet"),
    )?;
    assert_eq!(strings(&batch, "location")?, vec![Some("02".to_string()); 2]);
    assert_eq!(strings(&batch, "output_type_id")?[0].as_deref(), Some("0.01"));
    Ok(())
}

#[tokio::test]
async fn parquet_numeric_columns_are_rewritten_as_strings() -> TestResult {
    let tmp = TempDir::new()?;
    let mo_path = "raw/2024-05-04-teamabc-locations_numeric.parquet";
    write_file(tmp.path(), mo_path, &numeric_location_parquet(23)?)?;

    let hub = StorageLocation::local(tmp.path());
    let output = hub.join("model-output");
    let (_, rows) =
        written(add_model_output(&hub, mo_path, &output, &TransformOptions::default()).await?)?;
    assert_eq!(rows, 23);

    let batch = read_local_parquet(
        &tmp.path()
            .join("model-output/2024-05-04-teamabc-locations_numeric.parquet"),
    )?;
    assert_eq!(column_type(&batch, "location")?, DataType::Utf8);
    assert_eq!(column_type(&batch, "output_type_id")?, DataType::Utf8);
    assert_eq!(column_type(&batch, "value")?, DataType::Float64);
    assert_eq!(strings(&batch, "location")?, vec![Some("2".to_string()); 23]);
    assert_eq!(strings(&batch, "output_type_id")?[0].as_deref(), Some("0.01"));
    Ok(())
}

#[tokio::test]
async fn bucket_hub_writes_under_output_prefix() -> TestResult {
    let store = Arc::new(InMemory::new());
    store
        .put(
            &ObjectPath::from("raw/2420-01-01-team_one-model.csv"),
            PutPayload::from(LOCATIONS_CSV.as_bytes().to_vec()),
        )
        .await?;

    let hub = StorageLocation::object_store(store.clone(), "bucket123");
    let output = hub.join("prefix1/prefix2");
    let options = TransformOptions::default();

    let submission = ModelOutputHandler::identify(
        hub.clone(),
        "raw/2420-01-01-team_one-model.csv",
        output,
        options,
    )?;
    let Submission::Supported(handler) = submission else {
        return Err("expected a supported submission".into());
    };
    assert_eq!(handler.identity().round_id, "2420-01-01");
    assert_eq!(handler.identity().model_id, "team_one-model");

    let (output_uri, _) = written(handler.add_model_output().await?)?;
    assert_eq!(output_uri, "bucket123/prefix1/prefix2/2420-01-01-team_one-model.parquet");

    let bytes = store
        .get(&ObjectPath::from("prefix1/prefix2/2420-01-01-team_one-model.parquet"))
        .await?
        .bytes()
        .await?;
    let batch = read_parquet(bytes)?;
    assert_eq!(strings(&batch, "model_id")?, vec![Some("team_one-model".to_string()); 2]);
    Ok(())
}

#[tokio::test]
async fn deleting_a_missing_output_is_a_skip() -> TestResult {
    let tmp = TempDir::new()?;
    let hub = StorageLocation::local(tmp.path());
    let output = hub.join("model-output");

    let outcome = delete_model_output(
        &hub,
        "raw/2420-01-01-team-model.csv",
        &output,
        &TransformOptions::default(),
    )
    .await?;
    match outcome {
        Outcome::Skipped(SkipReason::MissingOutput { path }) => {
            assert!(path.ends_with("model-output/2420-01-01-team-model.parquet"));
        }
        other => return Err(format!("expected a skip, got {other:?}").into()),
    }
    Ok(())
}

#[tokio::test]
async fn add_then_delete_twice() -> TestResult {
    let tmp = TempDir::new()?;
    let mo_path = "raw/team a/2420-01-01-team-model.csv";
    write_file(tmp.path(), mo_path, LOCATIONS_CSV.as_bytes())?;

    let hub = StorageLocation::local(tmp.path());
    let output = hub.join("model-output");
    let options = TransformOptions::default();
    let parquet = tmp.path().join("model-output/team a/2420-01-01-team-model.parquet");

    add_model_output(&hub, mo_path, &output, &options).await?;
    assert!(parquet.exists());

    let first = delete_model_output(&hub, mo_path, &output, &options).await?;
    assert!(matches!(first, Outcome::Deleted { .. }));
    assert!(!parquet.exists());

    let second = delete_model_output(&hub, mo_path, &output, &options).await?;
    assert!(matches!(second, Outcome::Skipped(SkipReason::MissingOutput { .. })));
    Ok(())
}

#[tokio::test]
async fn path_outside_origin_fails_before_io() -> TestResult {
    let hub = StorageLocation::local("/nonexistent-hub");
    let output = hub.join("model-output");
    let options = TransformOptions::default();

    for result in [
        add_model_output(&hub, "prefix1/2420-01-01-team_name-model.csv", &output, &options).await,
        delete_model_output(&hub, "prefix1/2420-01-01-team_name-model.csv", &output, &options)
            .await,
    ] {
        let err = result.err().ok_or("expected a format error")?;
        assert!(matches!(err, TransformError::MissingOriginPrefix { .. }), "{err}");
        assert!(err.is_format_error());
    }
    Ok(())
}

#[tokio::test]
async fn unsupported_submission_is_skipped_without_output() -> TestResult {
    let tmp = TempDir::new()?;
    write_file(tmp.path(), "raw/2420-01-01-team-model.txt", b"not a model output")?;

    let hub = StorageLocation::local(tmp.path());
    let output = hub.join("model-output");
    let outcome = add_model_output(
        &hub,
        "raw/2420-01-01-team-model.txt",
        &output,
        &TransformOptions::default(),
    )
    .await?;
    assert!(matches!(
        outcome,
        Outcome::Skipped(SkipReason::UnsupportedFileType { .. })
    ));
    assert!(!tmp.path().join("model-output").exists());
    Ok(())
}

#[tokio::test]
async fn custom_origin_prefix_is_stripped() -> TestResult {
    let tmp = TempDir::new()?;
    let mo_path = "different-raw-prefix/2420-01-01-team-model.csv";
    write_file(tmp.path(), mo_path, LOCATIONS_CSV.as_bytes())?;

    let hub = StorageLocation::local(tmp.path());
    let options = TransformOptions::default().with_origin_prefix("different-raw-prefix");
    add_model_output(&hub, mo_path, &hub, &options).await?;
    assert!(tmp.path().join("2420-01-01-team-model.parquet").exists());
    Ok(())
}

#[tokio::test]
async fn literal_percent_in_file_name_is_read_and_kept() -> TestResult {
    let tmp = TempDir::new()?;
    let mo_path = "raw/2420-01-01-team-model%41.csv";
    write_file(tmp.path(), mo_path, LOCATIONS_CSV.as_bytes())?;

    let hub = StorageLocation::local(tmp.path());
    let output = hub.join("model-output");
    let options = TransformOptions::default();
    let (output_uri, rows) = written(add_model_output(&hub, mo_path, &output, &options).await?)?;
    assert_eq!(rows, 2);
    assert!(output_uri.ends_with("model-output/2420-01-01-team-model%2541.parquet"));

    let parquet = tmp.path().join("model-output/2420-01-01-team-model%41.parquet");
    let batch = read_local_parquet(&parquet)?;
    assert_eq!(strings(&batch, "model_id")?, vec![Some("team-model%41".to_string()); 2]);
    assert!(!tmp.path().join("model-output/2420-01-01-team-modelA.parquet").exists());

    delete_model_output(&hub, mo_path, &output, &options).await?;
    assert!(!parquet.exists());
    Ok(())
}

#[tokio::test]
async fn hub_config_types_task_id_columns() -> TestResult {
    let tmp = TempDir::new()?;
    let tasks = json!({
        "schema_version": "https://link_to_tasks_schema.json",
        "rounds": [{
            "round_id_from_variable": true,
            "round_id": "reference_date",
            "model_tasks": [{
                "task_ids": {
                    "reference_date": {"required": null, "optional": ["2024-05-04"]},
                    "horizon": {"required": null, "optional": [0, 1, 2]},
                    "location": {"required": ["02", "US"]}
                },
                "output_type": {
                    "quantile": {
                        "output_type_id": {"required": [0.01, 0.5]},
                        "value": {"type": "double"}
                    }
                }
            }]
        }]
    });
    write_file(tmp.path(), "hub-config/admin.json", br#"{"name": "Test Hub"}"#)?;
    write_file(tmp.path(), "hub-config/tasks.json", &serde_json::to_vec(&tasks)?)?;
    let mo_path = "raw/2024-05-04-teamabc-model.csv";
    write_file(tmp.path(), mo_path, LOCATIONS_CSV.as_bytes())?;

    let hub = StorageLocation::local(tmp.path());
    let configured = hub.join("configured");
    let heuristic = hub.join("heuristic");
    let options = TransformOptions::default();

    add_model_output(&hub, mo_path, &configured, &options).await?;
    add_model_output(&hub, mo_path, &heuristic, &options.clone().with_hub_config(false)).await?;

    let batch = read_local_parquet(&tmp.path().join("configured/2024-05-04-teamabc-model.parquet"))?;
    assert_eq!(column_type(&batch, "horizon")?, DataType::Int32);
    assert_eq!(column_type(&batch, "reference_date")?, DataType::Date32);
    assert_eq!(column_type(&batch, "output_type_id")?, DataType::Utf8);
    assert_eq!(strings(&batch, "location")?, vec![Some("02".to_string()); 2]);

    let batch = read_local_parquet(&tmp.path().join("heuristic/2024-05-04-teamabc-model.parquet"))?;
    assert_eq!(column_type(&batch, "horizon")?, DataType::Int64);
    Ok(())
}
