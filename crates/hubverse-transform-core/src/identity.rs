//! Submission identity: file type, round id, and model id.
//!
//! Model-output files are named `<round_id><separators><model_id>.<ext>`,
//! where `round_id` is a `YYYY-MM-DD` date, the separators are any run of
//! `-` and `_`, and `model_id` is everything that follows. Model ids may
//! themselves contain hyphens (`team_one-model`), so the name is never split
//! any further than that.

use snafu::ensure;

use crate::error::{MissingModelIdSnafu, MissingRoundIdSnafu, TransformResult};

/// Length of a `YYYY-MM-DD` round id.
const ROUND_ID_LEN: usize = 10;

/// Return the leading `YYYY-MM-DD` token of `name`, if there is one.
/// Only ASCII digits count.
fn round_id_prefix(name: &str) -> Option<&str> {
    let head = name.get(..ROUND_ID_LEN)?;
    let is_date = head.bytes().enumerate().all(|(i, b)| match i {
        4 | 7 => b == b'-',
        _ => b.is_ascii_digit(),
    });
    is_date.then_some(head)
}

/// Supported submission formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileType {
    /// Comma-separated values with a header row.
    Csv,
    /// Apache Parquet (`.parquet` or `.pqt`).
    Parquet,
}

impl FileType {
    /// Map a file extension (case-insensitive, without the dot) to a type.
    pub fn from_extension(ext: &str) -> Option<FileType> {
        match ext.to_ascii_lowercase().as_str() {
            "csv" => Some(FileType::Csv),
            "parquet" | "pqt" => Some(FileType::Parquet),
            _ => None,
        }
    }
}

/// The two identifiers encoded in a model-output file name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileNameParts {
    /// Round the submission belongs to (`YYYY-MM-DD`).
    pub round_id: String,
    /// Model that produced the submission.
    pub model_id: String,
}

/// Parse a model-output file name (stem, without extension).
///
/// # Errors
///
/// Returns `TransformError::MissingRoundId` when the name does not start with
/// a `YYYY-MM-DD` token and `TransformError::MissingModelId` when nothing but
/// separators and whitespace follows it.
pub fn parse_file_name(file_name: &str) -> TransformResult<FileNameParts> {
    let round_id = round_id_prefix(file_name)
        .ok_or_else(|| MissingRoundIdSnafu { file_name }.build())?;

    let rest = &file_name[round_id.len()..];
    let model_id = rest.trim_start_matches(['-', '_']).trim();
    ensure!(!model_id.is_empty(), MissingModelIdSnafu { file_name });

    let parts = FileNameParts {
        round_id: round_id.to_string(),
        model_id: model_id.to_string(),
    };
    log::debug!(
        round_id:% = parts.round_id, model_id:% = parts.model_id;
        "parsed model-output file name"
    );
    Ok(parts)
}

/// Identity of one submission, derived once when the submission is
/// identified and never changed afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionIdentity {
    /// Fully resolved, percent-encoded URI of the raw file.
    pub input_uri: String,
    /// File stem, decoded.
    pub file_name: String,
    /// Lower-cased extension of the raw file.
    pub file_type: FileType,
    /// Round id parsed from the file name.
    pub round_id: String,
    /// Model id parsed from the file name.
    pub model_id: String,
}

impl SubmissionIdentity {
    /// Build an identity from a decoded file stem.
    pub fn new(
        input_uri: impl Into<String>,
        file_name: impl Into<String>,
        file_type: FileType,
    ) -> TransformResult<Self> {
        let file_name = file_name.into();
        let FileNameParts { round_id, model_id } = parse_file_name(&file_name)?;
        Ok(Self {
            input_uri: input_uri.into(),
            file_name,
            file_type,
            round_id,
            model_id,
        })
    }
}
