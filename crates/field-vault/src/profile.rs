//! Sealing and opening the sensitive part of a user profile.
//!
//! Each attribute is encrypted independently, so one unreadable attribute
//! leaves the others intact. The sealed shape is what the document store keeps
//! alongside the rest of the profile.

use common::EncryptedField;
use serde::{Deserialize, Serialize};

use crate::field::{FieldCipher, VaultError};

/// Plaintext sensitive attributes. Empty strings mean "not provided".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileSecrets {
    /// Contact email address.
    #[serde(default)]
    pub email: String,
    /// Phone number, free-form.
    #[serde(default)]
    pub phone: String,
    /// Date of birth, free-form.
    #[serde(default)]
    pub dob: String,
}

/// Encrypted attributes as stored in the profile document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncryptedProfile {
    /// Encrypted email, `null` when none was provided.
    #[serde(default)]
    pub email_encrypted: Option<EncryptedField>,
    /// Encrypted phone number.
    #[serde(default)]
    pub phone_encrypted: Option<EncryptedField>,
    /// Encrypted date of birth.
    #[serde(default)]
    pub dob_encrypted: Option<EncryptedField>,
}

/// Encrypt every attribute of `secrets` for `identity`.
///
/// # Errors
///
/// Returns [`VaultError::StorageUnavailable`] if the identity's key cannot be resolved.
pub async fn seal_profile(
    cipher: &FieldCipher,
    identity: &str,
    secrets: &ProfileSecrets,
) -> Result<EncryptedProfile, VaultError> {
    Ok(EncryptedProfile {
        email_encrypted: cipher.encrypt_field(identity, &secrets.email).await?,
        phone_encrypted: cipher.encrypt_field(identity, &secrets.phone).await?,
        dob_encrypted: cipher.encrypt_field(identity, &secrets.dob).await?,
    })
}

/// Decrypt every attribute of `sealed` for `identity`.
///
/// Unreadable attributes come back empty. An empty email is replaced by
/// `fallback_email`, typically the address the session provider knows.
///
/// # Errors
///
/// Returns [`VaultError::StorageUnavailable`] if the identity's key cannot be resolved.
pub async fn open_profile(
    cipher: &FieldCipher,
    identity: &str,
    sealed: &EncryptedProfile,
    fallback_email: &str,
) -> Result<ProfileSecrets, VaultError> {
    let email = cipher
        .decrypt_field(identity, sealed.email_encrypted.as_ref())
        .await?
        .filter(|e| !e.is_empty())
        .unwrap_or_else(|| fallback_email.to_owned());
    let phone = cipher
        .decrypt_field_or_empty(identity, sealed.phone_encrypted.as_ref())
        .await?;
    let dob = cipher
        .decrypt_field_or_empty(identity, sealed.dob_encrypted.as_ref())
        .await?;
    Ok(ProfileSecrets { email, phone, dob })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::{KeyStore, MemoryKeyStore};
    use serde_json::json;
    use std::sync::Arc;

    fn cipher() -> (Arc<MemoryKeyStore>, FieldCipher) {
        let durable = Arc::new(MemoryKeyStore::new());
        (durable.clone(), FieldCipher::new(KeyStore::new(durable)))
    }

    #[tokio::test]
    async fn seal_and_open() {
        let (_, cipher) = cipher();
        let secrets = ProfileSecrets {
            email: "alice@example.com".into(),
            phone: "+44 20 7946 0000".into(),
            dob: "1991-02-03".into(),
        };
        let sealed = seal_profile(&cipher, "u1", &secrets).await.unwrap();
        let opened = open_profile(&cipher, "u1", &sealed, "fallback@example.com")
            .await
            .unwrap();
        assert_eq!(opened, secrets);
    }

    #[tokio::test]
    async fn empty_attributes_are_null() {
        let (_, cipher) = cipher();
        let secrets = ProfileSecrets {
            email: "bob@example.com".into(),
            ..Default::default()
        };
        let sealed = seal_profile(&cipher, "u1", &secrets).await.unwrap();
        let doc = serde_json::to_value(&sealed).unwrap();
        assert!(doc["emailEncrypted"]["iv"].is_string());
        assert_eq!(doc["phoneEncrypted"], json!(null));
        assert_eq!(doc["dobEncrypted"], json!(null));
    }

    #[tokio::test]
    async fn missing_email_uses_fallback() {
        let (_, cipher) = cipher();
        let sealed: EncryptedProfile = serde_json::from_value(json!({})).unwrap();
        let opened = open_profile(&cipher, "u1", &sealed, "session@example.com")
            .await
            .unwrap();
        assert_eq!(opened.email, "session@example.com");
        assert_eq!(opened.phone, "");
    }

    #[tokio::test]
    async fn one_damaged_field_does_not_block_others() {
        let (_, cipher) = cipher();
        let secrets = ProfileSecrets {
            email: "carol@example.com".into(),
            phone: "0612345678".into(),
            dob: "2000-01-01".into(),
        };
        let mut sealed = seal_profile(&cipher, "u1", &secrets).await.unwrap();
        if let Some(phone) = sealed.phone_encrypted.as_mut() {
            phone.value = "AAAAAAAAAAAAAAAAAAAAAAAA".into();
        }

        let opened = open_profile(&cipher, "u1", &sealed, "").await.unwrap();
        assert_eq!(opened.email, secrets.email);
        assert_eq!(opened.phone, "");
        assert_eq!(opened.dob, secrets.dob);
    }

    #[tokio::test]
    async fn partially_stored_field_does_not_block_others() {
        let (_, cipher) = cipher();
        let secrets = ProfileSecrets {
            email: "erin@example.com".into(),
            phone: "0700 900 123".into(),
            dob: "1985-07-30".into(),
        };
        let sealed = seal_profile(&cipher, "u1", &secrets).await.unwrap();
        let mut doc = serde_json::to_value(&sealed).unwrap();
        let iv_only = json!({"iv": doc["emailEncrypted"]["iv"].clone()});
        doc["emailEncrypted"] = iv_only;
        doc["dobEncrypted"]["value"] = json!(null);

        let damaged: EncryptedProfile = serde_json::from_value(doc).unwrap();
        let opened = open_profile(&cipher, "u1", &damaged, "session@example.com")
            .await
            .unwrap();
        assert_eq!(opened.email, "session@example.com");
        assert_eq!(opened.phone, secrets.phone);
        assert_eq!(opened.dob, "");
    }

    #[tokio::test]
    async fn storage_outage_fails_the_whole_profile() {
        let (durable, cipher) = cipher();
        let sealed = seal_profile(
            &cipher,
            "u1",
            &ProfileSecrets {
                email: "dave@example.com".into(),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        // A new cipher has an empty cache, so it must reach storage.
        let cold = FieldCipher::new(KeyStore::new(durable.clone()));
        durable.set_available(false);
        assert!(matches!(
            open_profile(&cold, "u1", &sealed, "").await,
            Err(VaultError::StorageUnavailable(_))
        ));
    }
}
