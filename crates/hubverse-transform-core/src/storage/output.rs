use std::{
    ffi::OsString,
    io::{self, Write},
    path::{Path, PathBuf},
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
};

use object_store::{ObjectStore, PutPayload, path::Path as ObjectPath};
use snafu::ResultExt;
use tokio::fs;

use crate::sanitize::SanitizedPath;
use crate::storage::{
    BackendError, OtherIoSnafu, StorageError, StorageLocation, StorageResult, TempFileGuard,
    create_parent_dir, join_local,
};

static TMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Temp file next to `final_path`, unique per process and per sink.
fn tmp_path_for(final_path: &Path) -> PathBuf {
    let mut name = final_path
        .file_name()
        .map(OsString::from)
        .unwrap_or_default();
    let n = TMP_COUNTER.fetch_add(1, Ordering::Relaxed);
    name.push(format!(".{}.{n}.tmp", std::process::id()));
    final_path.with_file_name(name)
}

/// Local filesystem sink that writes to a temp file and renames on finish.
struct LocalSink {
    tmp_path: PathBuf,
    final_path: PathBuf,
    writer: io::BufWriter<std::fs::File>,
    guard: TempFileGuard,
}

impl LocalSink {
    async fn open(final_path: PathBuf) -> StorageResult<Self> {
        create_parent_dir(&final_path).await?;

        let tmp_path = tmp_path_for(&final_path);

        // Use std::fs::File because Arrow writers require std::io::Write.
        let file = std::fs::File::create(&tmp_path)
            .map_err(BackendError::Local)
            .context(OtherIoSnafu {
                path: tmp_path.display().to_string(),
            })?;

        let writer = io::BufWriter::new(file);
        let guard = TempFileGuard::new(tmp_path.clone());

        Ok(Self {
            tmp_path,
            final_path,
            writer,
            guard,
        })
    }

    async fn finish(mut self) -> StorageResult<()> {
        self.writer
            .flush()
            .map_err(BackendError::Local)
            .context(OtherIoSnafu {
                path: self.tmp_path.display().to_string(),
            })?;

        self.writer
            .get_ref()
            .sync_all()
            .map_err(BackendError::Local)
            .context(OtherIoSnafu {
                path: self.tmp_path.display().to_string(),
            })?;

        fs::rename(&self.tmp_path, &self.final_path)
            .await
            .map_err(BackendError::Local)
            .context(OtherIoSnafu {
                path: self.final_path.display().to_string(),
            })?;

        self.guard.disarm();
        Ok(())
    }
}

/// Object-store sink: buffers the whole payload and commits it with a single
/// `put`, which replaces the object atomically.
struct ObjectStoreSink {
    store: Arc<dyn ObjectStore>,
    key: ObjectPath,
    uri: String,
    buf: Vec<u8>,
}

impl ObjectStoreSink {
    async fn finish(self) -> StorageResult<()> {
        self.store
            .put(&self.key, PutPayload::from(self.buf))
            .await
            .map_err(|e| StorageError::from_backend(self.uri, BackendError::ObjectStore(e)))?;
        Ok(())
    }
}

enum OutputSinkInner {
    Local(LocalSink),
    ObjectStore(ObjectStoreSink),
}

/// A streaming output sink for writing bytes to a storage backend.
///
/// Callers obtain a sink via [`open_output_sink`], stream bytes through its
/// [`Write`] implementation, and commit with [`OutputSink::finish`].
/// Dropping a sink without finishing leaves any previous file or object at
/// the target untouched.
pub struct OutputSink {
    inner: OutputSinkInner,
}

impl Write for OutputSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match &mut self.inner {
            OutputSinkInner::Local(s) => s.writer.write(buf),
            OutputSinkInner::ObjectStore(s) => s.buf.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match &mut self.inner {
            OutputSinkInner::Local(s) => s.writer.flush(),
            OutputSinkInner::ObjectStore(_) => Ok(()),
        }
    }
}

impl OutputSink {
    /// Flush and commit to the final location.
    pub async fn finish(self) -> StorageResult<()> {
        match self.inner {
            OutputSinkInner::Local(s) => s.finish().await,
            OutputSinkInner::ObjectStore(s) => s.finish().await,
        }
    }
}

/// Open a streaming output sink at `location` + `path`.
///
/// For local filesystems this creates intermediate directories and performs
/// a temp-file write and atomic rename on `finish()`.
pub async fn open_output_sink(
    location: &StorageLocation,
    path: &SanitizedPath,
) -> StorageResult<OutputSink> {
    let inner = match location {
        StorageLocation::Local(root) => {
            OutputSinkInner::Local(LocalSink::open(join_local(root, path)).await?)
        }
        StorageLocation::ObjectStore(loc) => OutputSinkInner::ObjectStore(ObjectStoreSink {
            store: Arc::clone(loc.store()),
            key: loc.key_for(path),
            uri: location.uri_for(path),
            buf: Vec::new(),
        }),
    };
    Ok(OutputSink { inner })
}
