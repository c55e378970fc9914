//! Configuration loading and validation for the card-vault service.
//!
//! All values are read from environment variables at startup. The process
//! exits with a clear error message if any required variable is missing or
//! invalid, including a malformed `ENCRYPTION_KEY`.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::crypto::key::{self, EncryptionKey, KeyError};
use crate::crypto::IV_LEN;

/// Validated service configuration.
#[derive(Clone, Deserialize)]
pub struct Config {
    /// 64 hex digits decoding to the AES-256 key. **Required.**
    #[serde(default)]
    pub encryption_key: Option<String>,

    /// Directory holding encrypted containers.
    #[serde(default = "default_storage_dir")]
    pub storage_dir: String,

    /// Port the HTTP server listens on.
    #[serde(default = "default_listen_port")]
    pub listen_port: u16,

    /// Read size used when streaming a container to a client.
    #[serde(default = "default_stream_chunk_size")]
    pub stream_chunk_size: usize,

    /// Largest accepted upload body, in bytes.
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,

    /// Per-request timeout in seconds.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// OTLP endpoint for span export. Logs only when unset.
    #[serde(default)]
    pub otel_exporter_otlp_endpoint: Option<String>,

    /// Tracing log level (e.g. `"info"`, `"debug"`).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_storage_dir() -> String {
    "storage/cards".into()
}
fn default_listen_port() -> u16 {
    8080
}
fn default_stream_chunk_size() -> usize {
    64 * 1024
}
fn default_max_upload_bytes() -> usize {
    20 * 1024 * 1024
}
fn default_request_timeout_secs() -> u64 {
    30
}
fn default_log_level() -> String {
    "info".into()
}

impl Config {
    /// Load and validate configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if any variable is absent or cannot be parsed.
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

    /// Resolve the configured key. Called once at startup.
    ///
    /// # Errors
    ///
    /// Returns a [`KeyError`] if `ENCRYPTION_KEY` is missing or malformed.
    pub fn encryption_key(&self) -> Result<EncryptionKey, KeyError> {
        key::load(self.encryption_key.as_deref())
    }

    /// Storage directory as a path.
    pub fn storage_path(&self) -> PathBuf {
        PathBuf::from(&self.storage_dir)
    }

    /// Per-request timeout.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Validate all fields, returning a descriptive error on the first failure.
    fn validate(&self) -> Result<()> {
        if self.storage_dir.trim().is_empty() {
            anyhow::bail!("STORAGE_DIR must not be empty");
        }
        // Downloads read the IV from the first chunk.
        if self.stream_chunk_size < IV_LEN {
            anyhow::bail!("STREAM_CHUNK_SIZE must be at least {IV_LEN}");
        }
        if self.max_upload_bytes == 0 {
            anyhow::bail!("MAX_UPLOAD_BYTES must be > 0");
        }
        if self.request_timeout_secs == 0 {
            anyhow::bail!("REQUEST_TIMEOUT_SECS must be > 0");
        }
        if let Some(endpoint) = &self.otel_exporter_otlp_endpoint {
            if endpoint.trim().is_empty() {
                anyhow::bail!("OTEL_EXPORTER_OTLP_ENDPOINT must not be blank when set");
            }
        }
        Ok(())
    }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("encryption_key", &self.encryption_key.as_ref().map(|_| "[REDACTED]"))
            .field("storage_dir", &self.storage_dir)
            .field("listen_port", &self.listen_port)
            .field("stream_chunk_size", &self.stream_chunk_size)
            .field("max_upload_bytes", &self.max_upload_bytes)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("otel_exporter_otlp_endpoint", &self.otel_exporter_otlp_endpoint)
            .field("log_level", &self.log_level)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> Config {
        Config {
            encryption_key: Some("ab".repeat(32)),
            storage_dir: default_storage_dir(),
            listen_port: default_listen_port(),
            stream_chunk_size: default_stream_chunk_size(),
            max_upload_bytes: default_max_upload_bytes(),
            request_timeout_secs: default_request_timeout_secs(),
            otel_exporter_otlp_endpoint: None,
            log_level: default_log_level(),
        }
    }

    #[test]
    fn defaults_are_correct() {
        assert_eq!(default_storage_dir(), "storage/cards");
        assert_eq!(default_listen_port(), 8080);
        assert_eq!(default_stream_chunk_size(), 65536);
        assert_eq!(default_max_upload_bytes(), 20 * 1024 * 1024);
        assert_eq!(default_request_timeout_secs(), 30);
        assert_eq!(default_log_level(), "info");
    }

    #[test]
    fn validate_accepts_valid_config() {
        assert!(valid().validate().is_ok());
    }

    #[test]
    fn validate_rejects_empty_storage_dir() {
        let cfg = Config {
            storage_dir: "  ".into(),
            ..valid()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn validate_rejects_zero_chunk_size() {
        let cfg = Config {
            stream_chunk_size: 0,
            ..valid()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn validate_rejects_chunk_smaller_than_iv() {
        let cfg = Config {
            stream_chunk_size: IV_LEN - 1,
            ..valid()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn validate_rejects_blank_otlp_endpoint() {
        let cfg = Config {
            otel_exporter_otlp_endpoint: Some(" ".into()),
            ..valid()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn encryption_key_resolves_or_fails_fast() {
        assert!(valid().encryption_key().is_ok());
        let cfg = Config {
            encryption_key: None,
            ..valid()
        };
        assert_eq!(cfg.encryption_key().unwrap_err(), KeyError::Missing);
        let cfg = Config {
            encryption_key: Some("not-hex".into()),
            ..valid()
        };
        assert_eq!(cfg.encryption_key().unwrap_err(), KeyError::NotHex);
    }

    #[test]
    fn debug_redacts_key() {
        let printed = format!("{:?}", valid());
        assert!(printed.contains("REDACTED"));
        assert!(!printed.contains(&"ab".repeat(32)));
    }
}
