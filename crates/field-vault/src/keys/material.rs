//! [`FieldKey`]: in-memory key material, and [`KeyRecord`]: its durable form.

use aes_gcm::aead::{rand_core::RngCore, OsRng};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};

use super::StorageError;
use crate::crypto::KEY_LEN;

/// Record format version written by this crate.
pub const RECORD_VERSION: u8 = 1;

/// Algorithm tag stored alongside the key bytes.
pub const RECORD_ALGORITHM: &str = "A256GCM";

/// Fixed-size key buffer that holds exactly [`KEY_LEN`] bytes.
///
/// Not `Clone`: the key store hands out `Arc<FieldKey>` so a single buffer
/// backs every in-flight operation for an identity. The memory is overwritten
/// with zeroes when the last reference is dropped.
pub struct FieldKey(Box<[u8; KEY_LEN]>);

impl FieldKey {
    /// Generate a fresh random key from the OS CSPRNG.
    pub(crate) fn generate() -> Self {
        let mut buf = Box::new([0u8; KEY_LEN]);
        OsRng.fill_bytes(&mut buf[..]);
        Self(buf)
    }

    /// Copy raw key bytes into a new buffer.
    ///
    /// Returns `None` if `bytes` is not exactly [`KEY_LEN`] long.
    pub(crate) fn from_slice(bytes: &[u8]) -> Option<Self> {
        if bytes.len() != KEY_LEN {
            return None;
        }
        let mut buf = Box::new([0u8; KEY_LEN]);
        buf.copy_from_slice(bytes);
        Some(Self(buf))
    }

    pub(crate) fn as_bytes(&self) -> &[u8] {
        &self.0[..]
    }

    /// Serialise into the record handed to a [`super::DurableKeyStore`].
    pub(crate) fn to_record(&self) -> KeyRecord {
        KeyRecord {
            version: RECORD_VERSION,
            algorithm: RECORD_ALGORITHM.to_owned(),
            key: STANDARD.encode(self.as_bytes()),
        }
    }
}

impl Drop for FieldKey {
    fn drop(&mut self) {
        self.0.iter_mut().for_each(|b| *b = 0);
    }
}

impl std::fmt::Debug for FieldKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("FieldKey([REDACTED])")
    }
}

/// Durable representation of one identity's key.
///
/// Storage backends treat this as an opaque value: persist it (the type is
/// `Serialize`/`Deserialize`) and hand it back unchanged. Only this crate can
/// turn it back into a usable [`FieldKey`].
///
/// The encoded key is zeroed when the record is dropped. Copies a backend
/// makes while serialising it, and the bytes at rest, are not scrubbed.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyRecord {
    version: u8,
    algorithm: String,
    key: String,
}

impl KeyRecord {
    /// Parse the record back into key material.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Corrupt`] for an unknown version or algorithm,
    /// invalid base64, or a key of the wrong length.
    pub(crate) fn to_key(&self) -> Result<FieldKey, StorageError> {
        if self.version != RECORD_VERSION {
            return Err(StorageError::Corrupt(format!(
                "unsupported record version {}",
                self.version
            )));
        }
        if self.algorithm != RECORD_ALGORITHM {
            return Err(StorageError::Corrupt(format!(
                "unsupported algorithm {}",
                self.algorithm
            )));
        }
        let bytes = STANDARD
            .decode(&self.key)
            .map_err(|_| StorageError::Corrupt("key is not valid base64".into()))?;
        FieldKey::from_slice(&bytes).ok_or_else(|| {
            StorageError::Corrupt(format!(
                "key has invalid length: expected {KEY_LEN} bytes, got {}",
                bytes.len()
            ))
        })
    }
}

impl Drop for KeyRecord {
    fn drop(&mut self) {
        scrub(&mut self.key);
    }
}

/// Overwrite every byte of `text` with zero, keeping its length.
fn scrub(text: &mut String) {
    let mut bytes = std::mem::take(text).into_bytes();
    bytes.iter_mut().for_each(|b| *b = 0);
    // All-zero bytes are valid UTF-8.
    *text = String::from_utf8(bytes).unwrap_or_default();
}

impl std::fmt::Debug for KeyRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyRecord")
            .field("version", &self.version)
            .field("algorithm", &self.algorithm)
            .field("key", &"[REDACTED]")
            .finish()
    }
}
