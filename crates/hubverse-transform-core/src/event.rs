//! Storage-event dispatch.
//!
//! Cloud-hosted hubs run the transform whenever an object under `raw/`
//! changes. An S3 event notification carries one or more records; each
//! becomes a [`StorageEvent`], and [`dispatch`] routes it to add/update
//! (object created) or delete (object removed).

use percent_encoding::percent_decode_str;
use serde::Deserialize;
use snafu::prelude::*;

use crate::config::TransformOptions;
use crate::handler::{add_model_output, delete_model_output};
use crate::outcome::{RunOutcome, SkipReason};
use crate::storage::StorageLocation;

/// Errors raised while decoding an event notification.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum EventError {
    /// The notification is not valid JSON or lacks the expected fields.
    #[snafu(display("Invalid storage event notification: {source}"))]
    InvalidNotification {
        /// Underlying JSON error.
        source: serde_json::Error,
    },
}

/// What happened to the object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    /// The object was created or overwritten.
    Created,
    /// The object was deleted.
    Removed,
    /// Anything else (restores, tagging, ...).
    Other,
}

impl ChangeKind {
    /// Classify an S3 `eventName` such as `ObjectCreated:Put`.
    pub fn from_event_name(name: &str) -> Self {
        let name = name.strip_prefix("s3:").unwrap_or(name);
        if name.starts_with("ObjectCreated:") {
            ChangeKind::Created
        } else if name.starts_with("ObjectRemoved:") {
            ChangeKind::Removed
        } else {
            ChangeKind::Other
        }
    }
}

/// One object change in a bucket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageEvent {
    /// Bucket holding the object.
    pub bucket: String,
    /// Object key, decoded.
    pub key: String,
    /// Kind of change.
    pub change: ChangeKind,
    /// Event name as delivered.
    pub event_name: String,
}

#[derive(Deserialize)]
struct Notification {
    #[serde(rename = "Records", default)]
    records: Vec<NotificationRecord>,
}

#[derive(Deserialize)]
struct NotificationRecord {
    #[serde(rename = "eventName")]
    event_name: String,
    s3: S3Entity,
}

#[derive(Deserialize)]
struct S3Entity {
    bucket: S3Bucket,
    object: S3Object,
}

#[derive(Deserialize)]
struct S3Bucket {
    name: String,
}

#[derive(Deserialize)]
struct S3Object {
    key: String,
}

impl StorageEvent {
    /// Decode every record of an S3 event notification.
    ///
    /// Object keys arrive form-encoded (`+` for spaces, `%XX` escapes) and
    /// are decoded here.
    pub fn from_s3_notification(json: &str) -> Result<Vec<StorageEvent>, EventError> {
        let notification: Notification =
            serde_json::from_str(json).context(InvalidNotificationSnafu)?;
        Ok(notification
            .records
            .into_iter()
            .map(|r| StorageEvent {
                bucket: r.s3.bucket.name,
                key: unquote_plus(&r.s3.object.key),
                change: ChangeKind::from_event_name(&r.event_name),
                event_name: r.event_name,
            })
            .collect())
    }
}

/// Decode a form-encoded string.
fn unquote_plus(s: &str) -> String {
    percent_decode_str(&s.replace('+', " "))
        .decode_utf8_lossy()
        .into_owned()
}

/// Run the pipeline an event calls for.
///
/// `hub` is where `event.key` lives and `output` where canonical files go;
/// for a bucket-hosted hub both are the bucket root.
pub async fn dispatch(
    event: &StorageEvent,
    hub: &StorageLocation,
    output: &StorageLocation,
    options: &TransformOptions,
) -> RunOutcome {
    log::info!(
        bucket:% = event.bucket, key:% = event.key, event:% = event.event_name;
        "received storage event"
    );

    let run: RunOutcome = match event.change {
        ChangeKind::Created => add_model_output(hub, &event.key, output, options).await.into(),
        ChangeKind::Removed => delete_model_output(hub, &event.key, output, options).await.into(),
        ChangeKind::Other => RunOutcome::Skipped(SkipReason::UnhandledEvent {
            event_name: event.event_name.clone(),
        }),
    };

    match &run {
        RunOutcome::Success(uri) => log::info!(
            bucket:% = event.bucket, key:% = event.key, output_uri:% = uri;
            "event handled"
        ),
        RunOutcome::Skipped(reason) => log::info!(
            bucket:% = event.bucket, key:% = event.key, reason:% = reason;
            "event skipped"
        ),
        RunOutcome::Failed(e) => log::error!(
            bucket:% = event.bucket, key:% = event.key, reason:% = e;
            "event failed"
        ),
    }
    run
}
