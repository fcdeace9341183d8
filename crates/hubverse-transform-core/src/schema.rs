//! Column typing rules for model-output files.
//!
//! Submissions come from many contributors and tools, so the same column can
//! arrive as integers in one file and strings in the next. Two columns are
//! always read as strings: `location` (FIPS codes such as `"03"` must keep
//! their leading zero) and `output_type_id` (mixes numeric quantile levels
//! with category names across output types). Other columns keep the type
//! found in the file unless the hub's task configuration declares one.

use std::collections::BTreeMap;
use std::sync::Arc;

use arrow::datatypes::{DataType, Field, Schema, SchemaRef};
use regex::Regex;
use snafu::ResultExt;

use crate::error::{NullTokenPatternSnafu, TransformResult};
use crate::hub_config::TaskSchema;
use crate::identity::FileType;

/// Columns read as `Utf8` no matter what the file or the hub declares.
pub const STRING_COLUMNS: [&str; 2] = ["location", "output_type_id"];

/// CSV cell values read as null, in every column.
pub const NULL_TOKENS: [&str; 8] = ["na", "NA", "", " ", "null", "Null", "NaN", "nan"];

/// Set of CSV cell values treated as missing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NullTokens(Vec<String>);

impl Default for NullTokens {
    fn default() -> Self {
        NullTokens(NULL_TOKENS.iter().map(|t| t.to_string()).collect())
    }
}

impl NullTokens {
    /// The tokens, in declaration order.
    pub fn tokens(&self) -> &[String] {
        &self.0
    }

    /// True when `cell` is exactly one of the tokens.
    pub fn contains(&self, cell: &str) -> bool {
        self.0.iter().any(|t| t == cell)
    }

    /// Anchored pattern matching exactly the tokens, for the CSV decoder.
    pub fn to_regex(&self) -> TransformResult<Regex> {
        let alternatives: Vec<String> = self.0.iter().map(|t| regex::escape(t)).collect();
        Regex::new(&format!("^(?:{})$", alternatives.join("|"))).context(NullTokenPatternSnafu)
    }
}

/// Target column types for one submission.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ColumnSchema {
    declared: BTreeMap<String, DataType>,
    null_tokens: Option<NullTokens>,
}

impl ColumnSchema {
    /// Target type of `column`, or `None` to keep the file's own type.
    pub fn type_for(&self, column: &str) -> Option<DataType> {
        if STRING_COLUMNS.contains(&column) {
            return Some(DataType::Utf8);
        }
        self.declared.get(column).cloned()
    }

    /// Null tokens to apply while decoding, if the format has any.
    pub fn null_tokens(&self) -> Option<&NullTokens> {
        self.null_tokens.as_ref()
    }

    /// Target schema for a file whose own schema is `source`.
    ///
    /// Columns keep their order, name, and metadata. A column whose type
    /// changes becomes nullable. Columns whose type could not be inferred
    /// (every cell null) are read as strings.
    pub fn apply(&self, source: &Schema) -> SchemaRef {
        let fields: Vec<Field> = source
            .fields()
            .iter()
            .map(|field| {
                let target = match self.type_for(field.name()) {
                    Some(t) => t,
                    None if field.data_type() == &DataType::Null => DataType::Utf8,
                    None => return field.as_ref().clone(),
                };
                if &target == field.data_type() {
                    field.as_ref().clone()
                } else {
                    Field::new(field.name(), target, true).with_metadata(field.metadata().clone())
                }
            })
            .collect();
        Arc::new(Schema::new_with_metadata(fields, source.metadata().clone()))
    }
}

/// Decide the column types (and null tokens) for a submission.
///
/// With a task schema, its declared types take precedence over the file's;
/// `location` and `output_type_id` are `Utf8` either way. Null tokens only
/// apply to CSV: Parquet has real nulls.
pub fn resolve_schema(file_type: FileType, task_schema: Option<&TaskSchema>) -> ColumnSchema {
    let declared = task_schema
        .map(|schema| {
            schema
                .fields()
                .iter()
                .filter(|(name, _)| !STRING_COLUMNS.contains(&name.as_str()))
                .map(|(name, t)| (name.clone(), t.clone()))
                .collect()
        })
        .unwrap_or_default();

    let null_tokens = match file_type {
        FileType::Csv => Some(NullTokens::default()),
        FileType::Parquet => None,
    };

    ColumnSchema {
        declared,
        null_tokens,
    }
}
