//! Path sanitizing for storage-backend APIs.
//!
//! Contributor-supplied paths can contain spaces, non-ASCII characters, and
//! stray whitespace around the file stem (`my-model .csv`). Every path that
//! enters the system goes through [`sanitize_path`] exactly once; the result
//! is a [`SanitizedPath`] whose text is percent-encoded with `:` and `/`
//! left intact. The input is taken literally: a `%` in a file name is a
//! character of that name and is escaped like any other.
//!
//! Paths derived from a `SanitizedPath` (for example the output location)
//! are assembled from its already-encoded segments and never passed through
//! [`sanitize_path`] again, so encoding happens once per logical path.
//! Storage backends decode a `SanitizedPath` back to its literal form when
//! resolving it to a filesystem path or object key.

use std::fmt;

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, percent_decode_str, utf8_percent_encode};

/// Characters escaped in a sanitized path: everything except RFC 3986
/// unreserved characters plus `:` and `/`.
const PATH_ESCAPES: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~')
    .remove(b'/')
    .remove(b':');

/// A percent-encoded, whitespace-trimmed storage path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SanitizedPath(String);

impl SanitizedPath {
    /// Wrap a path that was assembled from already-sanitized segments.
    pub(crate) fn from_encoded(encoded: String) -> Self {
        SanitizedPath(encoded)
    }

    /// The encoded path text.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The literal (percent-decoded) path.
    pub fn decoded(&self) -> String {
        decode(&self.0)
    }

    /// Encoded path segments, skipping empty ones.
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('/').filter(|s| !s.is_empty())
    }

    /// Encoded final segment (empty when the path ends with `/`).
    pub fn file_name(&self) -> &str {
        match self.0.rfind('/') {
            Some(i) => &self.0[i + 1..],
            None => &self.0,
        }
    }

    /// Encoded file name without its extension.
    pub fn stem(&self) -> &str {
        split_extension(self.file_name()).0
    }

    /// Extension of the file name, as written (without the dot).
    pub fn extension(&self) -> Option<&str> {
        split_extension(self.file_name()).1
    }
}

impl fmt::Display for SanitizedPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for SanitizedPath {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Percent-decode `s`, replacing invalid UTF-8 sequences.
pub(crate) fn decode(s: &str) -> String {
    percent_decode_str(s).decode_utf8_lossy().into_owned()
}

/// Split a file name into stem and extension the way path libraries do:
/// the extension starts at the last dot, a leading dot (`.csv`) or a
/// trailing dot (`model.`) does not start one.
fn split_extension(name: &str) -> (&str, Option<&str>) {
    match name.rfind('.') {
        None | Some(0) => (name, None),
        Some(i) if i + 1 == name.len() => (name, None),
        Some(i) => (&name[..i], Some(&name[i + 1..])),
    }
}

/// Sanitize a raw path or URI.
///
/// Whitespace is trimmed from the whole string and from the file stem (but
/// not from directory names), then the path is percent-encoded. `raw` is the
/// literal path; it is never decoded first.
pub fn sanitize_path(raw: &str) -> SanitizedPath {
    let trimmed = raw.trim();

    let (dir, name) = match trimmed.rfind('/') {
        Some(i) => trimmed.split_at(i + 1),
        None => ("", trimmed),
    };
    let (stem, ext) = split_extension(name);

    let mut clean = String::with_capacity(trimmed.len());
    clean.push_str(dir);
    clean.push_str(stem.trim());
    if let Some(ext) = ext {
        clean.push('.');
        clean.push_str(ext);
    }

    SanitizedPath(utf8_percent_encode(&clean, PATH_ESCAPES).to_string())
}
