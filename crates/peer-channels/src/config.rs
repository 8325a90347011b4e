//! # Peer Channel Configuration
//!
//! Settings the channel core reads at startup. Everything has a usable
//! default; `from_env` overrides individual fields.

use std::env;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::domain::{ChannelError, ChannelResult};

/// Complete configuration of the channel core.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PeerConfig {
    /// Transport-layer TLS settings.
    pub tls: TlsConfig,
    /// Transaction validation settings.
    pub validation: ValidationConfig,
    /// Log output settings.
    pub log: LogConfig,
}

/// TLS settings relevant to client authentication.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TlsConfig {
    /// When false, trust roots are never pushed to the transport server.
    pub enabled: bool,
    /// Client CA certificates trusted regardless of channel membership.
    pub client_root_cas: Vec<Vec<u8>>,
    /// The server's own root CA certificates.
    pub server_root_cas: Vec<Vec<u8>>,
}

/// Validation pool settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationConfig {
    /// Transactions validated concurrently across all channels.
    pub pool_size: usize,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            pool_size: num_cpus::get(),
        }
    }
}

/// Log output settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// Filter directive (trace, debug, info, warn, error).
    pub level: String,
    /// JSON formatted output.
    pub json: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl PeerConfig {
    /// Create configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `PEER_TLS_ENABLED`: Push channel trust roots to the server (default: false)
    /// - `PEER_VALIDATOR_POOL_SIZE`: Validation slots (default: number of CPUs)
    /// - `PEER_LOG_LEVEL` or `RUST_LOG`: Log level (default: info)
    /// - `PEER_JSON_LOGS`: JSON log output (default: false)
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let flag = |v: String| v.eq_ignore_ascii_case("true") || v == "1";

        Self {
            tls: TlsConfig {
                enabled: lookup("PEER_TLS_ENABLED")
                    .map(flag)
                    .unwrap_or(defaults.tls.enabled),
                ..defaults.tls
            },
            validation: ValidationConfig {
                pool_size: lookup("PEER_VALIDATOR_POOL_SIZE")
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(defaults.validation.pool_size),
            },
            log: LogConfig {
                level: lookup("PEER_LOG_LEVEL")
                    .or_else(|| lookup("RUST_LOG"))
                    .unwrap_or(defaults.log.level),
                json: lookup("PEER_JSON_LOGS")
                    .map(flag)
                    .unwrap_or(defaults.log.json),
            },
        }
    }

    /// Reject unusable settings. TLS without any static roots is allowed but
    /// logged.
    pub fn validate(&self) -> ChannelResult<()> {
        if self.validation.pool_size == 0 {
            return Err(ChannelError::Config(
                "validation pool size must be at least 1".to_string(),
            ));
        }
        if self.tls.enabled
            && self.tls.client_root_cas.is_empty()
            && self.tls.server_root_cas.is_empty()
        {
            warn!("TLS is enabled but no static root CAs are configured");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_config() {
        let config = PeerConfig::default();
        assert!(!config.tls.enabled);
        assert_eq!(config.validation.pool_size, num_cpus::get());
        assert_eq!(config.log.level, "info");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_lookup_overrides() {
        let vars: HashMap<&str, &str> = [
            ("PEER_TLS_ENABLED", "TRUE"),
            ("PEER_VALIDATOR_POOL_SIZE", "3"),
            ("RUST_LOG", "debug"),
        ]
        .into_iter()
        .collect();

        let config = PeerConfig::from_lookup(|k| vars.get(k).map(|v| v.to_string()));

        assert!(config.tls.enabled);
        assert_eq!(config.validation.pool_size, 3);
        assert_eq!(config.log.level, "debug");
        assert!(!config.log.json);
    }

    #[test]
    fn test_unparsable_pool_size_falls_back() {
        let config = PeerConfig::from_lookup(|k| {
            (k == "PEER_VALIDATOR_POOL_SIZE").then(|| "many".to_string())
        });
        assert_eq!(config.validation.pool_size, num_cpus::get());
    }

    #[test]
    fn test_zero_pool_rejected() {
        let mut config = PeerConfig::default();
        config.validation.pool_size = 0;
        assert!(matches!(config.validate(), Err(ChannelError::Config(_))));
    }
}
