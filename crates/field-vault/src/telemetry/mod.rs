//! Structured logging for the field-vault service.
//!
//! # Telemetry invariants
//!
//! - **No PII or key material** in any span attribute or log field. Identities
//!   appear only as [`crate::keys::identity_fingerprint`]s.
//! - Log level is configurable via `LOG_LEVEL` (default: `info`); `RUST_LOG`
//!   takes precedence when set.

pub mod init;

pub use init::init;
