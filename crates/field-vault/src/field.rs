//! [`FieldCipher`]: the encrypt/decrypt contract used by the profile flow.
//!
//! Error policy is deliberately asymmetric. An unreachable key store is
//! systemic and surfaces as [`VaultError::StorageUnavailable`]; a field that
//! cannot be decrypted is local to that field and reads back as absent, so one
//! damaged attribute never blocks the rest of a profile.

use common::{EncryptedField, ServiceError};
use thiserror::Error;
use tracing::debug;

use crate::crypto::cipher::{self, CipherError, SealedField};
use crate::keys::{identity_fingerprint, KeyError, KeyStore, StorageError};

/// Errors that cross the field-cipher boundary.
#[derive(Debug, Error)]
pub enum VaultError {
    /// The durable key-storage medium cannot be opened or queried.
    #[error("secure storage unavailable")]
    StorageUnavailable(#[source] StorageError),

    /// The AEAD refused to encrypt (not expected with a valid key).
    #[error("field encryption failed")]
    Encryption(#[source] CipherError),
}

impl From<KeyError> for VaultError {
    fn from(e: KeyError) -> Self {
        match e {
            KeyError::StorageUnavailable(inner) => VaultError::StorageUnavailable(inner),
        }
    }
}

impl From<VaultError> for ServiceError {
    fn from(e: VaultError) -> Self {
        match e {
            VaultError::StorageUnavailable(_) => ServiceError::StorageUnavailable,
            VaultError::Encryption(e) => ServiceError::Internal(e.to_string()),
        }
    }
}

/// Encrypts and decrypts individual attributes under each identity's key.
///
/// Cheap to clone; clones share one [`KeyStore`].
#[derive(Clone)]
pub struct FieldCipher {
    keys: KeyStore,
}

impl FieldCipher {
    /// Create a cipher that resolves keys through `keys`.
    pub fn new(keys: KeyStore) -> Self {
        Self { keys }
    }

    /// The key store backing this cipher.
    pub fn keys(&self) -> &KeyStore {
        &self.keys
    }

    /// Encrypt `plaintext` for `identity`.
    ///
    /// Returns `Ok(None)` for an empty plaintext without touching the key
    /// store. Otherwise resolves (and on first use creates) the identity's key
    /// and encrypts under a fresh nonce.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::StorageUnavailable`] if the key cannot be resolved.
    pub async fn encrypt_field(
        &self,
        identity: &str,
        plaintext: &str,
    ) -> Result<Option<EncryptedField>, VaultError> {
        if plaintext.is_empty() {
            return Ok(None);
        }
        let key = self.keys.resolve_or_create_key(identity).await?;
        let sealed =
            cipher::seal(plaintext.as_bytes(), key.as_bytes()).map_err(VaultError::Encryption)?;
        Ok(Some(sealed.to_wire()))
    }

    /// Decrypt a stored field for `identity`.
    ///
    /// Returns `Ok(None)` when the field is missing or incomplete, and also
    /// when it cannot be decrypted (bad encoding, tampering, another
    /// identity's key, non-UTF-8 plaintext).
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::StorageUnavailable`] if the key cannot be resolved.
    pub async fn decrypt_field(
        &self,
        identity: &str,
        field: Option<&EncryptedField>,
    ) -> Result<Option<String>, VaultError> {
        let Some(field) = field.filter(|f| !f.is_incomplete()) else {
            return Ok(None);
        };
        let key = self.keys.resolve_or_create_key(identity).await?;

        let opened = SealedField::from_wire(field)
            .and_then(|sealed| cipher::open(&sealed, key.as_bytes()));
        let bytes = match opened {
            Ok(bytes) => bytes,
            Err(e) => {
                debug!(identity = %identity_fingerprint(identity), error = %e, "field not decryptable");
                return Ok(None);
            }
        };
        match String::from_utf8(bytes) {
            Ok(text) => Ok(Some(text)),
            Err(_) => {
                debug!(identity = %identity_fingerprint(identity), "decrypted field is not UTF-8");
                Ok(None)
            }
        }
    }

    /// [`decrypt_field`](Self::decrypt_field), with "no value" as `""`.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::StorageUnavailable`] if the key cannot be resolved.
    pub async fn decrypt_field_or_empty(
        &self,
        identity: &str,
        field: Option<&EncryptedField>,
    ) -> Result<String, VaultError> {
        Ok(self
            .decrypt_field(identity, field)
            .await?
            .unwrap_or_default())
    }
}
