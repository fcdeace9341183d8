//! Storage backends for hub submissions and canonical outputs.
//!
//! A [`StorageLocation`] names the root of a hub (or of an output tree) on
//! one backend: a local directory, or a prefix inside an `object_store`
//! store such as an S3 bucket. The transform pipeline only needs four
//! capabilities from a backend, exposed here as free functions:
//!
//! - [`read_all_bytes`]: fetch a whole file or object.
//! - [`open_output_sink`]: stream bytes to a path, committed on
//!   [`OutputSink::finish`] (temp file + rename locally, single `put` on
//!   object stores), so readers never observe a partial file.
//! - [`delete`]: remove a file or object.
//! - [`exists`]: probe for a file or object.
//!
//! Paths passed to these functions are [`SanitizedPath`] values relative to
//! the location root. They are percent-decoded here, at the backend
//! boundary, and nowhere else.

pub mod error;
mod output;

use std::{
    fmt, io,
    path::{Path, PathBuf},
    sync::Arc,
};

use bytes::Bytes;
use object_store::{ObjectStore, aws::AmazonS3Builder, path::Path as ObjectPath};
use snafu::prelude::*;
use tokio::fs;

pub use error::{BackendError, StorageError};
pub(crate) use error::{InvalidLocationSnafu, OtherIoSnafu};
pub use output::{OutputSink, open_output_sink};

use crate::sanitize::{SanitizedPath, decode};

/// General result type used by storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Scheme prefix for S3 bucket locations.
const S3_SCHEME: &str = "s3://";

/// Scheme prefix accepted (and stripped) for local paths.
const FILE_SCHEME: &str = "file://";

/// A prefix inside an `object_store` store.
#[derive(Clone)]
pub struct ObjectStoreLocation {
    store: Arc<dyn ObjectStore>,
    /// Display form of the location root, used to build URIs.
    url: String,
    /// Key prefix all paths are resolved under.
    prefix: ObjectPath,
}

impl ObjectStoreLocation {
    /// The store backing this location.
    pub fn store(&self) -> &Arc<dyn ObjectStore> {
        &self.store
    }

    /// Key prefix of this location inside the store.
    pub fn prefix(&self) -> &ObjectPath {
        &self.prefix
    }

    /// Object key for `path`, relative to this location.
    pub(crate) fn key_for(&self, path: &SanitizedPath) -> ObjectPath {
        let mut key = self.prefix.clone();
        for segment in path.segments() {
            key = key.child(decode(segment));
        }
        key
    }
}

impl fmt::Debug for ObjectStoreLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectStoreLocation")
            .field("store", &format_args!("{}", self.store))
            .field("url", &self.url)
            .field("prefix", &self.prefix)
            .finish()
    }
}

/// The root of a hub or output tree on some storage backend.
#[derive(Clone, Debug)]
pub enum StorageLocation {
    /// A directory on the local filesystem.
    Local(PathBuf),
    /// A key prefix inside an `object_store` store (S3, in-memory).
    ObjectStore(ObjectStoreLocation),
}

impl StorageLocation {
    /// Creates a new `StorageLocation` for a local filesystem path.
    pub fn local(root: impl Into<PathBuf>) -> Self {
        StorageLocation::Local(root.into())
    }

    /// Creates a location at the root of `store`.
    ///
    /// `url` is the display form of the root (for example `s3://bucket123`)
    /// and only affects the URIs reported in outcomes and logs.
    pub fn object_store(store: Arc<dyn ObjectStore>, url: impl Into<String>) -> Self {
        let url = url.into();
        StorageLocation::ObjectStore(ObjectStoreLocation {
            store,
            url: url.trim_end_matches('/').to_string(),
            prefix: ObjectPath::default(),
        })
    }

    /// Parse a user-facing location string.
    ///
    /// `s3://bucket[/prefix]` builds an S3 store configured from the
    /// environment (`AWS_REGION`, credentials, `AWS_ENDPOINT`, ...);
    /// anything else, optionally prefixed with `file://`, is a local path.
    pub fn parse(spec: &str) -> StorageResult<Self> {
        let trimmed = spec.trim();
        ensure!(
            !trimmed.is_empty(),
            InvalidLocationSnafu {
                spec,
                reason: "location is empty",
            }
        );

        if let Some(rest) = trimmed.strip_prefix(S3_SCHEME) {
            let (bucket, prefix) = match rest.split_once('/') {
                Some((bucket, prefix)) => (bucket, prefix),
                None => (rest, ""),
            };
            ensure!(
                !bucket.is_empty(),
                InvalidLocationSnafu {
                    spec,
                    reason: "missing bucket name",
                }
            );

            let s3 = AmazonS3Builder::from_env()
                .with_bucket_name(bucket)
                .build()
                .map_err(|e| {
                    InvalidLocationSnafu {
                        spec,
                        reason: e.to_string(),
                    }
                    .build()
                })?;

            let root = StorageLocation::object_store(Arc::new(s3), format!("{S3_SCHEME}{bucket}"));
            return Ok(root.join(prefix));
        }

        let local = trimmed.strip_prefix(FILE_SCHEME).unwrap_or(trimmed);
        Ok(StorageLocation::Local(PathBuf::from(local)))
    }

    /// A location for the literal (decoded) relative directory `sub` under
    /// this one. Empty segments are ignored.
    pub fn join(&self, sub: &str) -> Self {
        let parts = sub.split('/').filter(|p| !p.is_empty());
        match self {
            StorageLocation::Local(root) => {
                let mut root = root.clone();
                for part in parts {
                    root.push(part);
                }
                StorageLocation::Local(root)
            }
            StorageLocation::ObjectStore(loc) => {
                let mut prefix = loc.prefix.clone();
                let mut url = loc.url.clone();
                for part in parts {
                    prefix = prefix.child(part);
                    url.push('/');
                    url.push_str(part);
                }
                StorageLocation::ObjectStore(ObjectStoreLocation {
                    store: Arc::clone(&loc.store),
                    url,
                    prefix,
                })
            }
        }
    }

    /// Display form of the location root.
    pub fn uri(&self) -> String {
        match self {
            StorageLocation::Local(root) => root.display().to_string(),
            StorageLocation::ObjectStore(loc) => loc.url.clone(),
        }
    }

    /// Fully resolved, percent-encoded URI of `path` under this location.
    pub fn uri_for(&self, path: &SanitizedPath) -> String {
        let base = self.uri();
        let base = base.trim_end_matches('/');
        let rel = path.as_str().trim_start_matches('/');
        if base.is_empty() {
            rel.to_string()
        } else {
            format!("{base}/{rel}")
        }
    }
}

/// Join a local root with a sanitized relative path.
fn join_local(root: &Path, path: &SanitizedPath) -> PathBuf {
    root.join(path.decoded().trim_start_matches('/'))
}

async fn create_parent_dir(abs: &Path) -> StorageResult<()> {
    if let Some(parent) = abs.parent() {
        fs::create_dir_all(parent)
            .await
            .map_err(BackendError::Local)
            .context(OtherIoSnafu {
                path: parent.display().to_string(),
            })?;
    }
    Ok(())
}

/// Guard that removes a temporary file on drop unless disarmed.
/// Used to ensure cleanup on error paths during atomic writes.
struct TempFileGuard {
    path: PathBuf,
    armed: bool,
}

impl TempFileGuard {
    fn new(path: PathBuf) -> Self {
        Self { path, armed: true }
    }

    /// Disarm the guard so the file is NOT removed on drop.
    /// Call this after a successful rename.
    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for TempFileGuard {
    fn drop(&mut self) {
        if self.armed {
            // Best-effort.
            let _ = std::fs::remove_file(&self.path);
        }
    }
}

/// Read the full contents of `path` within `location`.
///
/// Errors:
/// - If the file or object does not exist this returns `StorageError::NotFound`.
/// - Any other backend failure returns `StorageError::OtherIo`.
pub async fn read_all_bytes(
    location: &StorageLocation,
    path: &SanitizedPath,
) -> StorageResult<Bytes> {
    match location {
        StorageLocation::Local(root) => {
            let abs = join_local(root, path);
            fs::read(&abs).await.map(Bytes::from).map_err(|e| {
                StorageError::from_backend(abs.display().to_string(), BackendError::Local(e))
            })
        }
        StorageLocation::ObjectStore(loc) => {
            let key = loc.key_for(path);
            let uri = location.uri_for(path);
            let result = loc
                .store
                .get(&key)
                .await
                .map_err(|e| StorageError::from_backend(uri.clone(), BackendError::ObjectStore(e)))?;
            result
                .bytes()
                .await
                .map_err(|e| StorageError::from_backend(uri, BackendError::ObjectStore(e)))
        }
    }
}

/// Probe whether a regular file or object exists at `path`.
pub async fn exists(location: &StorageLocation, path: &SanitizedPath) -> StorageResult<bool> {
    match location {
        StorageLocation::Local(root) => {
            let abs = join_local(root, path);
            match fs::metadata(&abs).await {
                Ok(meta) => Ok(meta.is_file()),
                Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
                Err(e) => Err(BackendError::Local(e)).context(OtherIoSnafu {
                    path: abs.display().to_string(),
                }),
            }
        }
        StorageLocation::ObjectStore(loc) => match loc.store.head(&loc.key_for(path)).await {
            Ok(_) => Ok(true),
            Err(object_store::Error::NotFound { .. }) => Ok(false),
            Err(e) => Err(BackendError::ObjectStore(e)).context(OtherIoSnafu {
                path: location.uri_for(path),
            }),
        },
    }
}

/// Remove the file or object at `path`.
///
/// A missing local file is reported as `StorageError::NotFound`. Object
/// stores may treat deleting a missing key as success.
pub async fn delete(location: &StorageLocation, path: &SanitizedPath) -> StorageResult<()> {
    match location {
        StorageLocation::Local(root) => {
            let abs = join_local(root, path);
            fs::remove_file(&abs).await.map_err(|e| {
                StorageError::from_backend(abs.display().to_string(), BackendError::Local(e))
            })
        }
        StorageLocation::ObjectStore(loc) => loc
            .store
            .delete(&loc.key_for(path))
            .await
            .map_err(|e| {
                StorageError::from_backend(location.uri_for(path), BackendError::ObjectStore(e))
            }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sanitize::sanitize_path;
    use object_store::memory::InMemory;
    use tempfile::TempDir;

    type TestResult = Result<(), Box<dyn std::error::Error>>;

    fn memory_location() -> (Arc<InMemory>, StorageLocation) {
        let store = Arc::new(InMemory::new());
        let location = StorageLocation::object_store(store.clone(), "bucket123");
        (store, location)
    }

    #[tokio::test]
    async fn local_read_decodes_sanitized_path() -> TestResult {
        let tmp = TempDir::new()?;
        let dir = tmp.path().join("raw").join("prefix 1");
        std::fs::create_dir_all(&dir)?;
        std::fs::write(dir.join("2420-01-01-team model.csv"), "a,b\n1,2\n")?;

        let location = StorageLocation::local(tmp.path());
        let path = sanitize_path("raw/prefix 1/2420-01-01-team model.csv");
        let bytes = read_all_bytes(&location, &path).await?;
        assert_eq!(&bytes[..], b"a,b\n1,2\n");
        Ok(())
    }

    #[tokio::test]
    async fn local_read_returns_not_found_for_missing_file() -> TestResult {
        let tmp = TempDir::new()?;
        let location = StorageLocation::local(tmp.path());

        let err = read_all_bytes(&location, &sanitize_path("raw/missing.csv"))
            .await
            .expect_err("expected NotFound error");
        assert!(matches!(err, StorageError::NotFound { .. }));
        Ok(())
    }

    #[tokio::test]
    async fn local_exists_and_delete() -> TestResult {
        let tmp = TempDir::new()?;
        let location = StorageLocation::local(tmp.path());
        let path = sanitize_path("team/2420-01-01-team-model.parquet");

        assert!(!exists(&location, &path).await?);

        std::fs::create_dir_all(tmp.path().join("team"))?;
        std::fs::write(tmp.path().join("team/2420-01-01-team-model.parquet"), b"x")?;
        assert!(exists(&location, &path).await?);

        delete(&location, &path).await?;
        assert!(!exists(&location, &path).await?);

        let err = delete(&location, &path).await.expect_err("already deleted");
        assert!(matches!(err, StorageError::NotFound { .. }));
        Ok(())
    }

    #[tokio::test]
    async fn directories_are_not_reported_as_files() -> TestResult {
        let tmp = TempDir::new()?;
        std::fs::create_dir_all(tmp.path().join("team/2420-01-01-team-model.parquet"))?;
        let location = StorageLocation::local(tmp.path());
        let path = sanitize_path("team/2420-01-01-team-model.parquet");
        assert!(!exists(&location, &path).await?);
        Ok(())
    }

    #[tokio::test]
    async fn object_store_keys_are_decoded_and_prefixed() -> TestResult {
        let (store, root) = memory_location();
        let location = root.join("prefix1/prefix2");
        let path = sanitize_path("team a/2420-01-01-team_one-model.csv");

        store
            .put(
                &ObjectPath::from("prefix1/prefix2/team a/2420-01-01-team_one-model.csv"),
                b"x,y\n".to_vec().into(),
            )
            .await?;

        assert!(exists(&location, &path).await?);
        let bytes = read_all_bytes(&location, &path).await?;
        assert_eq!(&bytes[..], b"x,y\n");
        assert_eq!(
            location.uri_for(&path),
            "bucket123/prefix1/prefix2/team%20a/2420-01-01-team_one-model.csv"
        );
        Ok(())
    }

    #[tokio::test]
    async fn object_store_missing_key_is_not_found() -> TestResult {
        let (_store, location) = memory_location();
        let path = sanitize_path("raw/2420-01-01-team-model.csv");

        assert!(!exists(&location, &path).await?);
        let err = read_all_bytes(&location, &path)
            .await
            .expect_err("expected NotFound error");
        assert!(matches!(err, StorageError::NotFound { .. }));
        Ok(())
    }

    #[test]
    fn parse_local_and_s3_locations() -> TestResult {
        let local = StorageLocation::parse(" /tmp/hub ")?;
        assert!(matches!(local, StorageLocation::Local(ref p) if p == Path::new("/tmp/hub")));

        let file = StorageLocation::parse("file:///tmp/hub")?;
        assert!(matches!(file, StorageLocation::Local(ref p) if p == Path::new("/tmp/hub")));

        let s3 = StorageLocation::parse("s3://bucket123/prefix1/prefix2")?;
        assert_eq!(s3.uri(), "s3://bucket123/prefix1/prefix2");
        match s3 {
            StorageLocation::ObjectStore(loc) => {
                assert_eq!(loc.prefix().as_ref(), "prefix1/prefix2");
            }
            StorageLocation::Local(_) => panic!("expected object store location"),
        }
        Ok(())
    }

    #[test]
    fn parse_rejects_empty_and_bucketless_locations() {
        for spec in ["", "   ", "s3://", "s3:///prefix"] {
            let err = StorageLocation::parse(spec).expect_err("should fail");
            assert!(
                matches!(err, StorageError::InvalidLocation { .. }),
                "{spec}: {err:?}"
            );
        }
    }

    #[test]
    fn uri_for_joins_encoded_path() {
        let location = StorageLocation::local("/hub");
        let path = sanitize_path("raw/team/2420-01-01-my model.csv");
        assert_eq!(
            location.uri_for(&path),
            "/hub/raw/team/2420-01-01-my%20model.csv"
        );
    }
}
