//! Shared application state injected into every Axum handler.

use std::sync::Arc;

use crate::field::FieldCipher;
use crate::keys::{KeyStore, MemoryKeyStore};

/// Application state shared across all request handlers.
///
/// Cheaply cloneable: [`FieldCipher`] is `Arc`-backed, so Axum can clone the
/// state per request without copying key material.
#[derive(Clone)]
pub struct AppState {
    /// Field cipher, and through it the key store.
    pub cipher: FieldCipher,
}

impl AppState {
    /// Create a new [`AppState`] around `cipher`.
    pub fn new(cipher: FieldCipher) -> Self {
        Self { cipher }
    }
}

impl Default for AppState {
    /// Creates an [`AppState`] over an in-memory key store, suitable for tests.
    fn default() -> Self {
        Self::new(FieldCipher::new(KeyStore::new(Arc::new(
            MemoryKeyStore::new(),
        ))))
    }
}
