//! Per-identity key custody and field encryption for sensitive profile attributes.
//!
//! Each identity gets exactly one AES-256-GCM key, created on first use,
//! persisted to a durable [`keys::DurableKeyStore`], cached in memory, and
//! migrated once from a legacy text store when one is configured.
//! [`FieldCipher`] turns attribute values into `{iv, value}` pairs and back.
//!
//! ```no_run
//! # async fn demo() -> Result<(), field_vault::VaultError> {
//! use std::sync::Arc;
//! use field_vault::{keys::{FileKeyStore, KeyStore}, FieldCipher};
//!
//! let keys = KeyStore::new(Arc::new(FileKeyStore::new("/var/lib/field-vault/keys")));
//! let cipher = FieldCipher::new(keys);
//!
//! let stored = cipher.encrypt_field("user-42", "alice@example.com").await?;
//! let email = cipher.decrypt_field_or_empty("user-42", stored.as_ref()).await?;
//! assert_eq!(email, "alice@example.com");
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod crypto;
pub mod field;
pub mod keys;
pub mod profile;
pub mod server;
pub mod telemetry;

pub use common::EncryptedField;
pub use field::{FieldCipher, VaultError};
pub use profile::{open_profile, seal_profile, EncryptedProfile, ProfileSecrets};
