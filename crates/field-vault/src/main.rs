//! `field-vault` — loopback service binary entry point.
//!
//! Startup sequence:
//! 1. Load and validate [`Config`] from environment variables.
//! 2. Initialise structured JSON logging.
//! 3. Build the [`KeyStore`] over the key directory (and legacy file, if any).
//! 4. Build the Axum router and serve until Ctrl-C.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{info, warn};

use field_vault::config::Config;
use field_vault::keys::{FileKeyStore, JsonFileLegacyStore, KeyStore};
use field_vault::server::{self, state::AppState};
use field_vault::{telemetry, FieldCipher};

#[tokio::main]
async fn main() -> Result<()> {
    // -----------------------------------------------------------------------
    // 1. Configuration
    // -----------------------------------------------------------------------
    let cfg = Config::from_env().map_err(|e| {
        // Logging is not yet up; write to stderr directly.
        eprintln!("ERROR: configuration invalid: {e}");
        e
    })?;

    // -----------------------------------------------------------------------
    // 2. Telemetry
    // -----------------------------------------------------------------------
    telemetry::init(&cfg.log_level)?;
    let addr = cfg.socket_addr()?;
    info!(
        version = env!("CARGO_PKG_VERSION"),
        %addr,
        "field-vault starting"
    );

    // -----------------------------------------------------------------------
    // 3. Key store
    // -----------------------------------------------------------------------
    let mut builder = KeyStore::builder(Arc::new(FileKeyStore::new(&cfg.key_store_dir)))
        .cache_capacity(cfg.key_cache_capacity);
    if let Some(path) = &cfg.legacy_store_path {
        info!(path = %path, "legacy key migration enabled");
        builder = builder.legacy(Arc::new(JsonFileLegacyStore::new(path)));
    }
    let keys = builder.build();

    // Not fatal: the device may simply be locked. /health reports it.
    if let Err(e) = keys.probe().await {
        warn!(error = %e, "durable key store unreachable at startup");
    }

    // -----------------------------------------------------------------------
    // 4. HTTP server
    // -----------------------------------------------------------------------
    let router = server::router::build(AppState::new(FieldCipher::new(keys)));

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(%addr, "listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("field-vault stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for shutdown signal");
    }
}
