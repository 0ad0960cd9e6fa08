//! Request and response types exchanged between components.
//!
//! [`EncryptedField`] is the storage contract with the remote document store;
//! the remaining types are the JSON bodies of the loopback HTTP facade.

use serde::{Deserialize, Deserializer, Serialize};

// ---------------------------------------------------------------------------
// Stored field
// ---------------------------------------------------------------------------

/// One encrypted profile attribute as persisted by the document store.
///
/// Both components are standard base64 (with padding). `value` is the AEAD
/// ciphertext with the 16-byte authentication tag appended.
///
/// A component that is missing or `null` in stored JSON deserialises as an
/// empty string, which makes the field [incomplete](Self::is_incomplete)
/// rather than failing the surrounding document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedField {
    /// Base64-encoded 96-bit nonce, unique per encryption.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub iv: String,
    /// Base64-encoded ciphertext ‖ tag.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub value: String,
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

impl EncryptedField {
    /// Returns `true` when either component is missing.
    ///
    /// Incomplete fields are read as "no value", never as an error.
    pub fn is_incomplete(&self) -> bool {
        self.iv.is_empty() || self.value.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Field endpoints
// ---------------------------------------------------------------------------

/// Request body for `POST /v1/fields/encrypt`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncryptRequest {
    /// Opaque identity handle from the session provider.
    pub identity: String,
    /// Attribute value to encrypt. Empty strings are never encrypted.
    #[serde(default)]
    pub plaintext: String,
}

/// Successful response body for `POST /v1/fields/encrypt`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncryptResponse {
    /// `null` when the plaintext was empty.
    pub field: Option<EncryptedField>,
}

/// Request body for `POST /v1/fields/decrypt`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecryptRequest {
    /// Opaque identity handle from the session provider.
    pub identity: String,
    /// Stored field; `null` or absent reads back as the empty string.
    #[serde(default)]
    pub field: Option<EncryptedField>,
}

/// Successful response body for `POST /v1/fields/decrypt`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecryptResponse {
    /// Decrypted value, or `""` when the field is absent or unreadable.
    pub plaintext: String,
}

// ---------------------------------------------------------------------------
// Error response
// ---------------------------------------------------------------------------

/// Standard error response body returned on any non-2xx status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Short machine-readable error code (e.g. `"storage_unavailable"`).
    pub code: String,
    /// Human-readable description safe to expose to callers.
    pub message: String,
}

impl ErrorResponse {
    /// Construct an [`ErrorResponse`] from a code and message.
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }
}

impl From<&crate::ServiceError> for ErrorResponse {
    fn from(err: &crate::ServiceError) -> Self {
        Self::new(err.code(), err.to_string())
    }
}

// ---------------------------------------------------------------------------
// Health check
// ---------------------------------------------------------------------------

/// Response body for `GET /health`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Overall service status: `"ok"` or `"degraded"`.
    pub status: String,
    /// Whether the durable key store answered its availability probe.
    pub storage_available: bool,
    /// Number of identity keys currently held in memory.
    pub cached_keys: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn encrypted_field_json_shape() {
        let field = EncryptedField {
            iv: "AAECAwQFBgcICQoL".into(),
            value: "c2VjcmV0".into(),
        };
        let v = serde_json::to_value(&field).unwrap();
        assert_eq!(v, json!({"iv": "AAECAwQFBgcICQoL", "value": "c2VjcmV0"}));
        let back: EncryptedField = serde_json::from_value(v).unwrap();
        assert_eq!(back, field);
    }

    #[test]
    fn incomplete_field_detection() {
        let field = EncryptedField {
            iv: String::new(),
            value: "abc".into(),
        };
        assert!(field.is_incomplete());
    }

    #[test]
    fn missing_or_null_component_is_incomplete() {
        for doc in [
            json!({"iv": "AAAAAAAAAAAAAAAA"}),
            json!({"value": "c2VjcmV0"}),
            json!({"iv": null, "value": "c2VjcmV0"}),
            json!({"iv": "AAAAAAAAAAAAAAAA", "value": null}),
            json!({}),
        ] {
            let field: EncryptedField = serde_json::from_value(doc).unwrap();
            assert!(field.is_incomplete());
        }
    }

    #[test]
    fn decrypt_request_with_partial_field() {
        let req: DecryptRequest =
            serde_json::from_str(r#"{"identity":"u1","field":{"iv":"AAAAAAAAAAAAAAAA"}}"#)
                .unwrap();
        assert!(req.field.unwrap().is_incomplete());
    }

    #[test]
    fn decrypt_request_without_field() {
        let req: DecryptRequest = serde_json::from_str(r#"{"identity":"u1"}"#).unwrap();
        assert!(req.field.is_none());
    }

    #[test]
    fn encrypt_response_null_field() {
        let resp = EncryptResponse { field: None };
        assert_eq!(serde_json::to_string(&resp).unwrap(), r#"{"field":null}"#);
    }

    #[test]
    fn error_response_from_service_error() {
        let e = ErrorResponse::from(&crate::ServiceError::StorageUnavailable);
        assert_eq!(e.code, "storage_unavailable");
        assert_eq!(e.message, "secure storage unavailable");
    }
}
