//! Canonical output location of a submission.
//!
//! Both add/update and delete compute the output path with
//! [`OutputLocation::derive`], so a deletion always targets exactly the file
//! an earlier add wrote. The derivation is pure: it looks only at the
//! sanitized submission path and the origin prefix, never at storage.
//!
//! ```text
//! raw/team-a/2420-01-01-team-model.csv  ->  team-a/2420-01-01-team-model.parquet
//! ```

use snafu::ensure;

use crate::error::{MissingOriginPrefixSnafu, TransformResult};
use crate::sanitize::{SanitizedPath, decode};

/// Extension of every canonical output file.
pub const OUTPUT_EXTENSION: &str = "parquet";

/// Check that `path` starts with the `origin_prefix` segments and return the
/// encoded segments that follow them.
///
/// Segments are compared in decoded form, so `raw` matches whether or not
/// the caller's prefix needed escaping.
pub fn strip_origin<'a>(
    path: &'a SanitizedPath,
    origin_prefix: &str,
) -> TransformResult<Vec<&'a str>> {
    let mut segments = path.segments();
    let matches = origin_prefix
        .split('/')
        .filter(|s| !s.is_empty())
        .all(|expected| segments.next().is_some_and(|seg| decode(seg) == expected));

    ensure!(
        matches,
        MissingOriginPrefixSnafu {
            path: path.decoded(),
            origin_prefix,
        }
    );
    Ok(segments.collect())
}

/// Path of a canonical output file, relative to the output base.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputLocation {
    rel_path: SanitizedPath,
}

impl OutputLocation {
    /// Derive the output path for a submission.
    ///
    /// The origin prefix is removed, the directories below it are kept, and
    /// the file name becomes `{stem}.parquet`. The submission's segments are
    /// already encoded and are reused as-is.
    ///
    /// # Errors
    ///
    /// `TransformError::MissingOriginPrefix` when `submission` is not under
    /// `origin_prefix`.
    pub fn derive(submission: &SanitizedPath, origin_prefix: &str) -> TransformResult<Self> {
        let rest = strip_origin(submission, origin_prefix)?;
        let dirs = rest.split_last().map(|(_, dirs)| dirs).unwrap_or_default();

        let mut rel = String::new();
        for dir in dirs {
            rel.push_str(dir);
            rel.push('/');
        }
        rel.push_str(submission.stem());
        rel.push('.');
        rel.push_str(OUTPUT_EXTENSION);

        Ok(Self {
            rel_path: SanitizedPath::from_encoded(rel),
        })
    }

    /// Encoded path relative to the output base.
    pub fn rel_path(&self) -> &SanitizedPath {
        &self.rel_path
    }
}
