//! AES-256-GCM field encryption primitives.
//!
//! This module is free of storage and HTTP dependencies. It provides the
//! low-level seal/open operations used by [`crate::field::FieldCipher`].
//!
//! # Stored format
//!
//! ```text
//! { "iv": base64(nonce), "value": base64(ciphertext ‖ tag) }
//! ```

pub mod cipher;

pub use cipher::{CipherError, SealedField, KEY_LEN, NONCE_LEN};
