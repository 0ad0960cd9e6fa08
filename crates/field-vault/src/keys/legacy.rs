//! Legacy key source: raw keys left behind in a plain text key-value store.
//!
//! Older clients kept each identity's raw AES key, base64 encoded, under
//! `fp_key_<identity>` in a browser-`localStorage`-like medium. Entries are
//! read at most once: [`super::KeyStore`] imports and deletes them, or deletes
//! them without retry when they cannot be imported.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde_json::{Map, Value};
use thiserror::Error;
use tokio::sync::Mutex;

use super::durable::{blocking, write_atomic};
use super::{FieldKey, StorageError};
use crate::crypto::KEY_LEN;

/// Prefix of legacy entry names.
pub const LEGACY_KEY_PREFIX: &str = "fp_key_";

/// Name of the legacy entry that may hold `identity`'s key.
pub fn legacy_entry_name(identity: &str) -> String {
    format!("{LEGACY_KEY_PREFIX}{identity}")
}

/// Read-once text store holding legacy key entries.
#[async_trait]
pub trait LegacyKeySource: Send + Sync {
    /// Fetch the text stored under `entry`, if any.
    async fn get(&self, entry: &str) -> Result<Option<String>, StorageError>;

    /// Delete `entry`. Deleting a missing entry is not an error.
    async fn remove(&self, entry: &str) -> Result<(), StorageError>;
}

/// Legacy key material that could not be turned into a key.
#[derive(Debug, Error)]
pub enum KeyImportError {
    /// The entry is not valid base64.
    #[error("legacy key is not valid base64")]
    Encoding,

    /// The decoded key is not [`KEY_LEN`] bytes.
    #[error("legacy key has invalid length: expected {KEY_LEN} bytes, got {0}")]
    InvalidLength(usize),
}

/// Import a base64-encoded raw key.
///
/// # Errors
///
/// Returns [`KeyImportError`] for invalid encoding or a wrong key length.
pub(crate) fn import_legacy_key(encoded: &str) -> Result<FieldKey, KeyImportError> {
    let bytes = STANDARD
        .decode(encoded.trim())
        .map_err(|_| KeyImportError::Encoding)?;
    FieldKey::from_slice(&bytes).ok_or(KeyImportError::InvalidLength(bytes.len()))
}

/// A single JSON object file shaped like a `localStorage` dump:
/// `{"fp_key_<identity>": "<base64>", ...}`.
///
/// Removals rewrite the whole file through a temp file and rename. A mutex
/// serialises the read-modify-write so concurrent removals do not lose each
/// other's updates.
#[derive(Debug)]
pub struct JsonFileLegacyStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonFileLegacyStore {
    /// Open the legacy file at `path`. A missing file holds no entries.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// Location of the legacy file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn read_entries(path: &Path) -> Result<Option<Map<String, Value>>, StorageError> {
    let text = match std::fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    match serde_json::from_str::<Value>(&text) {
        Ok(Value::Object(map)) => Ok(Some(map)),
        Ok(_) => Err(StorageError::Corrupt("legacy store is not a JSON object".into())),
        Err(e) => Err(StorageError::Corrupt(format!("unreadable legacy store: {e}"))),
    }
}

#[async_trait]
impl LegacyKeySource for JsonFileLegacyStore {
    async fn get(&self, entry: &str) -> Result<Option<String>, StorageError> {
        let path = self.path.clone();
        let entry = entry.to_owned();
        blocking(move || {
            let Some(map) = read_entries(&path)? else {
                return Ok(None);
            };
            Ok(match map.get(&entry) {
                Some(Value::String(s)) => Some(s.clone()),
                // A non-string value is still an entry; let import reject it.
                Some(other) => Some(other.to_string()),
                None => None,
            })
        })
        .await
    }

    async fn remove(&self, entry: &str) -> Result<(), StorageError> {
        let _guard = self.write_lock.lock().await;
        let path = self.path.clone();
        let entry = entry.to_owned();
        blocking(move || {
            let Some(mut map) = read_entries(&path)? else {
                return Ok(());
            };
            if map.remove(&entry).is_none() {
                return Ok(());
            }
            let dir = match path.parent() {
                Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
                _ => PathBuf::from("."),
            };
            let json = serde_json::to_vec_pretty(&Value::Object(map))
                .map_err(|e| StorageError::Corrupt(format!("failed to encode legacy store: {e}")))?;
            write_atomic(&dir, &path, &json)
        })
        .await
    }
}
