//! Per-identity key custody: lookup, creation, persistence, caching, and
//! one-time migration of legacy key material.
//!
//! # Resolution order
//!
//! 1. In-memory cache.
//! 2. Availability probe of the durable medium ([`KeyError::StorageUnavailable`] on failure).
//! 3. Durable record.
//! 4. Legacy entry `fp_key_<identity>`: imported, persisted, and deleted; or
//!    deleted without retry if it cannot be imported.
//! 5. A freshly generated key, persisted before it is handed out.
//!
//! Steps 3–5 run under a per-identity lock.
//!
//! # Security invariants
//!
//! - Key bytes never leave this crate except inside a [`KeyRecord`] handed to
//!   a [`DurableKeyStore`].
//! - Identities are logged only as [`identity_fingerprint`]s; key material is
//!   never logged.

mod cache;
pub mod durable;
pub mod legacy;
pub mod material;
pub mod memory;
pub mod store;

pub use durable::{DurableKeyStore, FileKeyStore};
pub use legacy::{legacy_entry_name, JsonFileLegacyStore, KeyImportError, LegacyKeySource};
pub use material::{FieldKey, KeyRecord};
pub use memory::{MemoryKeyStore, MemoryLegacyStore};
pub use store::{KeyStore, KeyStoreBuilder, DEFAULT_CACHE_CAPACITY};

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Failures of a key storage medium.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Filesystem or OS-level failure.
    #[error("key storage I/O failed: {0}")]
    Io(#[from] std::io::Error),

    /// The medium answered but its contents cannot be parsed.
    #[error("key storage holds unreadable data: {0}")]
    Corrupt(String),

    /// The medium cannot be reached at all.
    #[error("key storage unreachable: {0}")]
    Unreachable(String),
}

/// Errors surfaced by [`KeyStore`].
#[derive(Debug, Error)]
pub enum KeyError {
    /// The durable key-storage medium cannot be opened or queried.
    #[error("secure storage unavailable")]
    StorageUnavailable(#[source] StorageError),
}

/// URL-safe SHA-256 digest of `identity`, used for on-disk names.
pub(crate) fn identity_digest(identity: &str) -> String {
    URL_SAFE_NO_PAD.encode(Sha256::digest(identity.as_bytes()))
}

/// Short, non-reversible tag that lets log lines for one identity be correlated.
pub fn identity_fingerprint(identity: &str) -> String {
    let digest = Sha256::digest(identity.as_bytes());
    URL_SAFE_NO_PAD.encode(&digest[..6])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digest_is_filename_safe() {
        let d = identity_digest("a/b\\c:d");
        assert_eq!(d.len(), 43);
        assert!(d.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }

    #[test]
    fn fingerprint_is_stable_and_short() {
        assert_eq!(identity_fingerprint("u1"), identity_fingerprint("u1"));
        assert_ne!(identity_fingerprint("u1"), identity_fingerprint("u2"));
        assert_eq!(identity_fingerprint("u1").len(), 8);
    }

    #[test]
    fn key_error_hides_storage_detail_in_message() {
        let e = KeyError::StorageUnavailable(StorageError::Unreachable("locked".into()));
        assert_eq!(e.to_string(), "secure storage unavailable");
        assert!(std::error::Error::source(&e).is_some());
    }
}
