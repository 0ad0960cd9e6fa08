//! Configuration loading and validation for the field-vault service.
//!
//! All values are read from environment variables at startup. The process will
//! exit with a clear error message if any required variable is missing or invalid.

use std::net::{IpAddr, SocketAddr};

use anyhow::{Context, Result};
use serde::Deserialize;

/// Validated service configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Directory holding one key record per identity. **Required.**
    pub key_store_dir: String,

    /// JSON file with legacy `fp_key_<identity>` entries to migrate, if any.
    #[serde(default)]
    pub legacy_store_path: Option<String>,

    /// Address the HTTP facade binds to. Must be a loopback address.
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    /// Port the HTTP facade listens on.
    #[serde(default = "default_listen_port")]
    pub listen_port: u16,

    /// Maximum number of identity keys held in memory.
    #[serde(default = "default_key_cache_capacity")]
    pub key_cache_capacity: usize,

    /// Tracing log level (e.g. `"info"`, `"debug"`).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_listen_addr() -> String {
    "127.0.0.1".into()
}
fn default_listen_port() -> u16 {
    8787
}
fn default_key_cache_capacity() -> usize {
    crate::keys::DEFAULT_CACHE_CAPACITY
}
fn default_log_level() -> String {
    "info".into()
}

impl Config {
    /// Load and validate configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if any required variable is absent or cannot be parsed.
    pub fn from_env() -> Result<Self> {
        let cfg = config::Config::builder()
            .add_source(config::Environment::default())
            .build()
            .context("failed to build configuration from environment")?;

        let c: Config = cfg
            .try_deserialize()
            .context("failed to deserialise configuration")?;

        c.validate()?;
        Ok(c)
    }

    /// Socket address for the HTTP facade.
    ///
    /// # Errors
    ///
    /// Returns an error if `listen_addr` is not an IP address.
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        let ip: IpAddr = self
            .listen_addr
            .parse()
            .with_context(|| format!("LISTEN_ADDR is not an IP address: {}", self.listen_addr))?;
        Ok(SocketAddr::new(ip, self.listen_port))
    }

    /// Validate all fields, returning a descriptive error on the first failure.
    fn validate(&self) -> Result<()> {
        ensure_non_empty(&self.key_store_dir, "KEY_STORE_DIR")?;
        if let Some(path) = &self.legacy_store_path {
            ensure_non_empty(path, "LEGACY_STORE_PATH")?;
        }
        if self.key_cache_capacity == 0 {
            anyhow::bail!("KEY_CACHE_CAPACITY must be > 0");
        }
        // Plaintext crosses this socket, so it must never leave the device.
        if !self.socket_addr()?.ip().is_loopback() {
            anyhow::bail!("LISTEN_ADDR must be a loopback address");
        }
        Ok(())
    }
}

fn ensure_non_empty(value: &str, name: &str) -> Result<()> {
    if value.trim().is_empty() {
        anyhow::bail!("{name} is required and must not be empty");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> Config {
        Config {
            key_store_dir: "/var/lib/field-vault/keys".into(),
            legacy_store_path: None,
            listen_addr: default_listen_addr(),
            listen_port: default_listen_port(),
            key_cache_capacity: default_key_cache_capacity(),
            log_level: default_log_level(),
        }
    }

    #[test]
    fn defaults_are_correct() {
        assert_eq!(default_listen_addr(), "127.0.0.1");
        assert_eq!(default_listen_port(), 8787);
        assert_eq!(default_key_cache_capacity(), 1024);
        assert_eq!(default_log_level(), "info");
    }

    #[test]
    fn validate_accepts_valid_config() {
        assert!(valid().validate().is_ok());
        assert_eq!(
            valid().socket_addr().unwrap(),
            "127.0.0.1:8787".parse().unwrap()
        );
    }

    #[test]
    fn validate_rejects_empty_key_store_dir() {
        let cfg = Config {
            key_store_dir: "  ".into(),
            ..valid()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn validate_rejects_empty_legacy_path() {
        let cfg = Config {
            legacy_store_path: Some(String::new()),
            ..valid()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn validate_rejects_zero_cache_capacity() {
        let cfg = Config {
            key_cache_capacity: 0,
            ..valid()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn validate_rejects_public_listen_addr() {
        let cfg = Config {
            listen_addr: "0.0.0.0".into(),
            ..valid()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn validate_accepts_ipv6_loopback() {
        let cfg = Config {
            listen_addr: "::1".into(),
            ..valid()
        };
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn validate_rejects_hostname() {
        let cfg = Config {
            listen_addr: "localhost".into(),
            ..valid()
        };
        assert!(cfg.validate().is_err());
    }
}
