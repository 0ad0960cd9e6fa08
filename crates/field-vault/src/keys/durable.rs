//! Durable key storage: the [`DurableKeyStore`] seam and a file-backed implementation.

use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::debug;

use super::{identity_digest, KeyRecord, StorageError};

/// Medium that keeps one [`KeyRecord`] per identity across process restarts.
///
/// Implementations must make [`put`](Self::put) atomic: after a crash or a
/// cancelled call a reader sees either the complete record or nothing.
#[async_trait]
pub trait DurableKeyStore: Send + Sync {
    /// Check that the medium can be opened and written.
    async fn probe(&self) -> Result<(), StorageError>;

    /// Fetch the record for `identity`, if any.
    async fn get(&self, identity: &str) -> Result<Option<KeyRecord>, StorageError>;

    /// Store the record for `identity`, replacing any existing one.
    async fn put(&self, identity: &str, record: &KeyRecord) -> Result<(), StorageError>;

    /// Remove the record for `identity`. Removing a missing record is not an error.
    async fn delete(&self, identity: &str) -> Result<(), StorageError>;
}

/// Extension of key record files.
const RECORD_EXT: &str = "key";

/// One JSON record file per identity inside a private directory.
///
/// File names are derived from a SHA-256 digest of the identity, so arbitrary
/// identity strings are safe to use and do not appear on disk.
#[derive(Debug, Clone)]
pub struct FileKeyStore {
    dir: PathBuf,
}

impl FileKeyStore {
    /// Create a store rooted at `dir`. The directory is created on first probe.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Directory holding the record files.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn record_path(&self, identity: &str) -> PathBuf {
        self.dir
            .join(format!("{}.{RECORD_EXT}", identity_digest(identity)))
    }
}

#[async_trait]
impl DurableKeyStore for FileKeyStore {
    async fn probe(&self) -> Result<(), StorageError> {
        let dir = self.dir.clone();
        blocking(move || {
            ensure_private_dir(&dir)?;
            // A throwaway temp file proves the directory is writable.
            let _probe = tempfile::NamedTempFile::new_in(&dir)?;
            Ok(())
        })
        .await
    }

    async fn get(&self, identity: &str) -> Result<Option<KeyRecord>, StorageError> {
        let path = self.record_path(identity);
        blocking(move || {
            let text = match std::fs::read_to_string(&path) {
                Ok(text) => text,
                Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
                Err(e) => return Err(e.into()),
            };
            let record: KeyRecord = serde_json::from_str(&text)
                .map_err(|e| StorageError::Corrupt(format!("unreadable key record: {e}")))?;
            Ok(Some(record))
        })
        .await
    }

    async fn put(&self, identity: &str, record: &KeyRecord) -> Result<(), StorageError> {
        let dir = self.dir.clone();
        let path = self.record_path(identity);
        let json = serde_json::to_vec(record)
            .map_err(|e| StorageError::Corrupt(format!("failed to encode key record: {e}")))?;
        blocking(move || {
            ensure_private_dir(&dir)?;
            write_atomic(&dir, &path, &json)?;
            debug!(path = %path.display(), "key record written");
            Ok(())
        })
        .await
    }

    async fn delete(&self, identity: &str) -> Result<(), StorageError> {
        let path = self.record_path(identity);
        blocking(move || match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        })
        .await
    }
}

/// Write `bytes` to `path` via a temp file in `dir` followed by an atomic rename.
///
/// `NamedTempFile` creates files readable by the owner only.
pub(crate) fn write_atomic(dir: &Path, path: &Path, bytes: &[u8]) -> Result<(), StorageError> {
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| StorageError::Io(e.error))?;
    Ok(())
}

/// Run blocking file I/O off the async executor.
pub(crate) async fn blocking<T, F>(f: F) -> Result<T, StorageError>
where
    F: FnOnce() -> Result<T, StorageError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| StorageError::Unreachable(format!("storage task failed: {e}")))?
}

fn ensure_private_dir(dir: &Path) -> Result<(), StorageError> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        std::fs::DirBuilder::new()
            .recursive(true)
            .mode(0o700)
            .create(dir)?;
    }
    #[cfg(not(unix))]
    std::fs::create_dir_all(dir)?;
    Ok(())
}
