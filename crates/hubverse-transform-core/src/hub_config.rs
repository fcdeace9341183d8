//! Hub configuration (`admin.json`, `tasks.json`).
//!
//! The transform only consumes field types from the task configuration:
//! [`TaskSchema`] maps task-id columns, `output_type`, `output_type_id`,
//! and `value` to Arrow types so the reader can refine its column schema.
//! Everything else in the hub configuration is kept as parsed JSON.

use std::{
    collections::{BTreeMap, BTreeSet},
    fmt,
};

use arrow::datatypes::DataType;
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::Value;
use snafu::prelude::*;

use crate::config::TransformOptions;
use crate::sanitize::sanitize_path;
use crate::storage::{self, StorageError, StorageLocation};

/// Admin file name inside the hub configuration directory.
pub const ADMIN_FILE: &str = "admin.json";

/// Tasks file name inside the hub configuration directory.
pub const TASKS_FILE: &str = "tasks.json";

/// Hub name reported when `admin.json` has none.
pub const UNKNOWN_HUB_NAME: &str = "unknown hub name";

/// Errors raised while loading a hub configuration.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum HubConfigError {
    /// A configuration file does not exist.
    #[snafu(display("Hub config not found at {path}"))]
    MissingConfig {
        /// URI of the missing file.
        path: String,
    },

    /// A configuration file could not be read.
    #[snafu(display("Failed to read hub config {path}: {source}"))]
    ReadConfig {
        /// URI of the file.
        path: String,
        /// Underlying storage error.
        source: StorageError,
    },

    /// A configuration file is not valid JSON (or not the expected shape).
    #[snafu(display("Failed to parse hub config {path}: {source}"))]
    ParseConfig {
        /// URI of the file.
        path: String,
        /// Underlying JSON error.
        source: serde_json::Error,
    },
}

/// The `tasks.json` document, limited to the parts used for typing columns.
/// Unknown fields are ignored.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TasksConfig {
    /// Modeling rounds.
    #[serde(default)]
    pub rounds: Vec<Round>,
    /// Hub-wide `output_type_id` data type (`auto`, `character`, `double`,
    /// `integer`, `logical`, `Date`).
    #[serde(default)]
    pub output_type_id_datatype: Option<String>,
}

/// One modeling round.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Round {
    /// When true, `round_id` names the task-id variable holding the round id.
    #[serde(default)]
    pub round_id_from_variable: bool,
    /// Literal round id, or a task-id name when `round_id_from_variable`.
    #[serde(default)]
    pub round_id: Option<String>,
    /// Model tasks accepted in this round.
    #[serde(default)]
    pub model_tasks: Vec<ModelTask>,
}

/// A set of task ids with the output types accepted for them.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ModelTask {
    /// Task-id column name to allowed values.
    #[serde(default)]
    pub task_ids: BTreeMap<String, AllowedValues>,
    /// Output type name to its definition.
    #[serde(default)]
    pub output_type: BTreeMap<String, OutputTypeSpec>,
}

/// Required and optional values of a task id or output type id.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AllowedValues {
    /// Values every submission must include.
    #[serde(default)]
    pub required: Option<Vec<Value>>,
    /// Values a submission may include.
    #[serde(default)]
    pub optional: Option<Vec<Value>>,
}

impl AllowedValues {
    /// Required and optional values together.
    pub fn values(&self) -> impl Iterator<Item = &Value> {
        self.required
            .iter()
            .flatten()
            .chain(self.optional.iter().flatten())
    }
}

/// Definition of one output type.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OutputTypeSpec {
    /// Allowed `output_type_id` values.
    #[serde(default)]
    pub output_type_id: Option<AllowedValues>,
    /// Constraints on the `value` column.
    #[serde(default)]
    pub value: Option<ValueSpec>,
}

/// Constraints on the `value` column of an output type.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ValueSpec {
    /// `double` or `integer`.
    #[serde(rename = "type", default)]
    pub value_type: Option<String>,
}

/// A hub's configuration, as loaded from its configuration directory.
#[derive(Debug, Clone)]
pub struct HubConfig {
    config_uri: String,
    admin: Value,
    tasks: TasksConfig,
}

impl HubConfig {
    /// Load `admin.json` and `tasks.json` from
    /// `{hub}/{options.hub_config_dir}/`.
    pub async fn load(
        hub: &StorageLocation,
        options: &TransformOptions,
    ) -> Result<Self, HubConfigError> {
        let dir = options.hub_config_dir.trim_matches('/');
        let config_uri = hub.uri_for(&sanitize_path(dir));

        let admin = read_json(hub, &format!("{dir}/{ADMIN_FILE}")).await?;
        let tasks = read_json(hub, &format!("{dir}/{TASKS_FILE}")).await?;

        let config = Self {
            config_uri,
            admin,
            tasks,
        };
        log::debug!(
            hub_name:% = config.hub_name(), config_uri:% = config.config_uri;
            "loaded hub config"
        );
        Ok(config)
    }

    /// Build a configuration from already-parsed documents.
    pub fn from_parts(config_uri: impl Into<String>, admin: Value, tasks: TasksConfig) -> Self {
        Self {
            config_uri: config_uri.into(),
            admin,
            tasks,
        }
    }

    /// URI of the configuration directory.
    pub fn config_uri(&self) -> &str {
        &self.config_uri
    }

    /// The `admin.json` document.
    pub fn admin(&self) -> &Value {
        &self.admin
    }

    /// The parsed `tasks.json` document.
    pub fn tasks(&self) -> &TasksConfig {
        &self.tasks
    }

    /// The hub's `name` from `admin.json`.
    pub fn hub_name(&self) -> &str {
        self.admin
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or(UNKNOWN_HUB_NAME)
    }

    /// Every task id across all rounds and model tasks, with the union of
    /// its required and optional values rendered as strings.
    pub fn task_id_values(&self) -> BTreeMap<String, BTreeSet<String>> {
        let mut out: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        for task in self.tasks.rounds.iter().flat_map(|r| &r.model_tasks) {
            for (task_id, allowed) in &task.task_ids {
                out.entry(task_id.clone())
                    .or_default()
                    .extend(allowed.values().map(render_value));
            }
        }
        out
    }

    /// Column types for submissions to `round_id` (or to any round).
    pub fn task_schema(&self, round_id: Option<&str>) -> TaskSchema {
        TaskSchema::from_tasks(&self.tasks, round_id)
    }
}

impl fmt::Display for HubConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hubverse config information for {}.", self.hub_name())
    }
}

async fn read_json<T>(hub: &StorageLocation, rel: &str) -> Result<T, HubConfigError>
where
    T: serde::de::DeserializeOwned,
{
    let path = sanitize_path(rel);
    let uri = hub.uri_for(&path);
    let bytes = match storage::read_all_bytes(hub, &path).await {
        Ok(bytes) => bytes,
        Err(StorageError::NotFound { .. }) => return MissingConfigSnafu { path: uri }.fail(),
        Err(source) => return Err(source).context(ReadConfigSnafu { path: uri }),
    };
    serde_json::from_slice(&bytes).context(ParseConfigSnafu { path: uri })
}

fn render_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Column types declared by a hub's task configuration.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskSchema {
    fields: BTreeMap<String, DataType>,
}

impl TaskSchema {
    /// Derive column types from `tasks`.
    ///
    /// With a `round_id`, only rounds matching it are consulted: a literal
    /// `round_id`, or a `round_id_from_variable` round whose variable lists
    /// the id among its values. When nothing matches, every round is used.
    pub fn from_tasks(tasks: &TasksConfig, round_id: Option<&str>) -> Self {
        let mut rounds: Vec<&Round> = match round_id {
            Some(id) => tasks
                .rounds
                .iter()
                .filter(|r| round_matches(r, id))
                .collect(),
            None => Vec::new(),
        };
        if rounds.is_empty() {
            rounds = tasks.rounds.iter().collect();
        }

        let mut task_values: BTreeMap<&str, Vec<&Value>> = BTreeMap::new();
        let mut output_type_ids: Vec<&Value> = Vec::new();
        let mut value_types: BTreeSet<&str> = BTreeSet::new();
        let mut has_output_types = false;

        for task in rounds.iter().flat_map(|r| &r.model_tasks) {
            for (task_id, allowed) in &task.task_ids {
                task_values
                    .entry(task_id.as_str())
                    .or_default()
                    .extend(allowed.values());
            }
            for spec in task.output_type.values() {
                has_output_types = true;
                if let Some(ids) = &spec.output_type_id {
                    output_type_ids.extend(ids.values());
                }
                if let Some(t) = spec.value.as_ref().and_then(|v| v.value_type.as_deref()) {
                    value_types.insert(t);
                }
            }
        }

        let mut fields = BTreeMap::new();
        for (task_id, values) in task_values {
            if let Some(data_type) = infer_type(&values) {
                fields.insert(task_id.to_string(), data_type);
            }
        }
        if has_output_types {
            fields.insert("output_type".to_string(), DataType::Utf8);
        }
        let output_type_id = match tasks.output_type_id_datatype.as_deref() {
            Some("auto") | None => infer_type(&output_type_ids),
            Some(declared) => Some(hub_type(declared)),
        };
        if let Some(data_type) = output_type_id {
            fields.insert("output_type_id".to_string(), data_type);
        }
        if let Some(data_type) = value_type(&value_types) {
            fields.insert("value".to_string(), data_type);
        }

        Self { fields }
    }

    /// Build a schema from explicit column types.
    pub fn from_fields<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = (S, DataType)>,
        S: Into<String>,
    {
        Self {
            fields: fields.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }

    /// Declared type of `column`, if any.
    pub fn get(&self, column: &str) -> Option<&DataType> {
        self.fields.get(column)
    }

    /// All declared columns and types.
    pub fn fields(&self) -> &BTreeMap<String, DataType> {
        &self.fields
    }

    /// True when nothing is declared.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

fn round_matches(round: &Round, id: &str) -> bool {
    let Some(round_id) = round.round_id.as_deref() else {
        return false;
    };
    if !round.round_id_from_variable {
        return round_id == id;
    }
    round
        .model_tasks
        .iter()
        .filter_map(|t| t.task_ids.get(round_id))
        .flat_map(AllowedValues::values)
        .any(|v| render_value(v) == id)
}

/// Map a hub data type name to an Arrow type.
fn hub_type(name: &str) -> DataType {
    match name {
        "double" => DataType::Float64,
        "integer" => DataType::Int32,
        "logical" => DataType::Boolean,
        "Date" => DataType::Date32,
        _ => DataType::Utf8,
    }
}

fn value_type(types: &BTreeSet<&str>) -> Option<DataType> {
    match types.len() {
        0 => None,
        1 => types.first().map(|t| hub_type(t)),
        _ if types.iter().all(|t| matches!(*t, "double" | "integer")) => Some(DataType::Float64),
        _ => Some(DataType::Utf8),
    }
}

/// Infer a column type from allowed values. `None` when there are none.
fn infer_type(values: &[&Value]) -> Option<DataType> {
    if values.is_empty() {
        return None;
    }
    let data_type = if values.iter().all(|v| v.is_i64() || v.is_u64()) {
        DataType::Int32
    } else if values.iter().all(|v| v.is_number()) {
        DataType::Float64
    } else if values.iter().all(|v| v.is_boolean()) {
        DataType::Boolean
    } else if values.iter().all(|v| v.as_str().is_some_and(is_iso_date)) {
        DataType::Date32
    } else {
        DataType::Utf8
    };
    Some(data_type)
}

fn is_iso_date(s: &str) -> bool {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").is_ok()
}
