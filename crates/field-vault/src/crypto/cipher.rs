//! AES-256-GCM encryption and decryption of individual string fields.
//!
//! The output layout matches what WebCrypto's `AES-GCM` produces: a 96-bit
//! nonce carried separately, and the ciphertext with the 128-bit tag appended.
//! Fields written by the browser client therefore decrypt here unchanged.
//!
//! **Never reuse a nonce under the same key.** GCM nonce reuse breaks both
//! confidentiality and authentication; every call to [`seal`] draws a fresh
//! nonce from the OS CSPRNG.

use aes_gcm::{
    aead::{rand_core::RngCore, Aead, KeyInit, OsRng},
    Aes256Gcm, Nonce,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use common::EncryptedField;
use thiserror::Error;

/// Byte length of an AES-256 key (32 bytes = 256 bits).
pub const KEY_LEN: usize = 32;

/// Byte length of an AES-GCM nonce (12 bytes = 96 bits).
pub const NONCE_LEN: usize = 12;

/// Byte length of the GCM authentication tag appended to every ciphertext.
pub const TAG_LEN: usize = 16;

/// A decoded, encrypted field value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SealedField {
    /// Raw nonce bytes.
    pub nonce: [u8; NONCE_LEN],
    /// Raw ciphertext + authentication tag bytes.
    pub ciphertext: Vec<u8>,
}

impl SealedField {
    /// Encode this value as the base64 `{iv, value}` pair the document store persists.
    pub fn to_wire(&self) -> EncryptedField {
        EncryptedField {
            iv: STANDARD.encode(self.nonce),
            value: STANDARD.encode(&self.ciphertext),
        }
    }

    /// Decode a stored `{iv, value}` pair.
    ///
    /// # Errors
    ///
    /// Returns [`CipherError::InvalidFormat`] if either component is not valid
    /// base64, the nonce is not [`NONCE_LEN`] bytes, or the ciphertext is too
    /// short to carry a tag.
    pub fn from_wire(field: &EncryptedField) -> Result<Self, CipherError> {
        let nonce_bytes = STANDARD
            .decode(field.iv.trim())
            .map_err(|_| CipherError::InvalidFormat)?;
        let nonce: [u8; NONCE_LEN] = nonce_bytes
            .try_into()
            .map_err(|_| CipherError::InvalidFormat)?;

        let ciphertext = STANDARD
            .decode(field.value.trim())
            .map_err(|_| CipherError::InvalidFormat)?;
        if ciphertext.len() < TAG_LEN {
            return Err(CipherError::InvalidFormat);
        }

        Ok(Self { nonce, ciphertext })
    }
}

/// Errors produced by the cipher layer.
#[derive(Debug, Error)]
pub enum CipherError {
    /// The key is the wrong length (must be [`KEY_LEN`] bytes).
    #[error("invalid key length: expected {KEY_LEN} bytes")]
    InvalidKeyLength,

    /// AES-GCM encryption or decryption failed (wrong key or tampered data).
    #[error("aead operation failed")]
    AeadFailure,

    /// The stored field does not decode to a nonce and ciphertext.
    #[error("invalid encrypted field format")]
    InvalidFormat,
}

/// Encrypt `plaintext` under `key` with a freshly generated nonce.
///
/// # Errors
///
/// Returns [`CipherError::InvalidKeyLength`] if `key` is not [`KEY_LEN`] bytes.
/// Returns [`CipherError::AeadFailure`] on an internal AEAD error (unreachable
/// with a valid key and nonce).
pub fn seal(plaintext: &[u8], key: &[u8]) -> Result<SealedField, CipherError> {
    let cipher = build_cipher(key)?;

    let mut nonce_bytes = [0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut nonce_bytes);
    let nonce = Nonce::from_slice(&nonce_bytes);

    let ciphertext = cipher
        .encrypt(nonce, plaintext)
        .map_err(|_| CipherError::AeadFailure)?;

    Ok(SealedField {
        nonce: nonce_bytes,
        ciphertext,
    })
}

/// Decrypt and authenticate a [`SealedField`].
///
/// # Errors
///
/// Returns [`CipherError::InvalidKeyLength`] if `key` is not [`KEY_LEN`] bytes.
/// Returns [`CipherError::AeadFailure`] if authentication fails.
pub fn open(field: &SealedField, key: &[u8]) -> Result<Vec<u8>, CipherError> {
    let cipher = build_cipher(key)?;
    let nonce = Nonce::from_slice(&field.nonce);
    cipher
        .decrypt(nonce, field.ciphertext.as_ref())
        .map_err(|_| CipherError::AeadFailure)
}

fn build_cipher(key: &[u8]) -> Result<Aes256Gcm, CipherError> {
    if key.len() != KEY_LEN {
        return Err(CipherError::InvalidKeyLength);
    }
    Aes256Gcm::new_from_slice(key).map_err(|_| CipherError::InvalidKeyLength)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn random_key() -> Vec<u8> {
        let mut key = vec![0u8; KEY_LEN];
        OsRng.fill_bytes(&mut key);
        key
    }

    #[test]
    fn seal_open_round_trip() {
        let key = random_key();
        let sealed = seal(b"+33 6 12 34 56 78", &key).unwrap();
        assert_eq!(sealed.ciphertext.len(), 17 + TAG_LEN);
        let opened = open(&sealed, &key).unwrap();
        assert_eq!(opened, b"+33 6 12 34 56 78");
    }

    #[test]
    fn nonces_differ_between_calls() {
        let key = random_key();
        let a = seal(b"same", &key).unwrap();
        let b = seal(b"same", &key).unwrap();
        assert_ne!(a.nonce, b.nonce);
        assert_ne!(a.ciphertext, b.ciphertext);
    }

    #[test]
    fn wrong_key_fails_decryption() {
        let sealed = seal(b"secret", &random_key()).unwrap();
        assert!(matches!(
            open(&sealed, &random_key()),
            Err(CipherError::AeadFailure)
        ));
    }

    #[test]
    fn invalid_key_length_rejected() {
        assert!(matches!(
            seal(b"x", &[0u8; 16]),
            Err(CipherError::InvalidKeyLength)
        ));
    }

    // AES-256-GCM, all-zero key and nonce, one zero block (McGrew & Viega GCM test case 14).
    #[test]
    fn known_answer_vector() {
        let field = SealedField {
            nonce: [0u8; NONCE_LEN],
            ciphertext: [
                0xce, 0xa7, 0x40, 0x3d, 0x4d, 0x60, 0x6b, 0x6e, 0x07, 0x4e, 0xc5, 0xd3, 0xba,
                0xf3, 0x9d, 0x18, 0xd0, 0xd1, 0xc8, 0xa7, 0x99, 0x99, 0x6b, 0xf0, 0x26, 0x5b,
                0x98, 0xb5, 0xd4, 0x8a, 0xb9, 0x19,
            ]
            .to_vec(),
        };
        let opened = open(&field, &[0u8; KEY_LEN]).unwrap();
        assert_eq!(opened, vec![0u8; 16]);
    }

    #[test]
    fn wire_round_trip() {
        let key = random_key();
        let sealed = seal(b"1990-04-12", &key).unwrap();
        let wire = sealed.to_wire();
        assert_eq!(wire.iv.len(), 16);
        let parsed = SealedField::from_wire(&wire).unwrap();
        assert_eq!(parsed, sealed);
    }

    #[test]
    fn from_wire_rejects_short_nonce() {
        let wire = EncryptedField {
            iv: STANDARD.encode([0u8; 8]),
            value: STANDARD.encode([0u8; 32]),
        };
        assert!(SealedField::from_wire(&wire).is_err());
    }

    #[test]
    fn from_wire_rejects_bad_base64() {
        let wire = EncryptedField {
            iv: "!!!".into(),
            value: "abc".into(),
        };
        assert!(SealedField::from_wire(&wire).is_err());
    }

    #[test]
    fn from_wire_rejects_truncated_ciphertext() {
        let wire = EncryptedField {
            iv: STANDARD.encode([0u8; NONCE_LEN]),
            value: STANDARD.encode([0u8; TAG_LEN - 1]),
        };
        assert!(SealedField::from_wire(&wire).is_err());
    }

    #[test]
    fn tampered_ciphertext_fails_auth() {
        let key = random_key();
        let mut sealed = seal(b"tamper me", &key).unwrap();
        sealed.ciphertext[0] ^= 0xFF;
        assert!(open(&sealed, &key).is_err());
    }

    #[test]
    fn tampered_nonce_fails_auth() {
        let key = random_key();
        let mut sealed = seal(b"tamper me", &key).unwrap();
        sealed.nonce[NONCE_LEN - 1] ^= 0x01;
        assert!(open(&sealed, &key).is_err());
    }
}
