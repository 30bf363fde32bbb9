use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;

use thiserror::Error;

const DEFAULT_BIND_ADDR: &str = "127.0.0.1:8484";
const DEFAULT_LOG_FILTER: &str = "info";
const DEFAULT_SIGNATURE_FRESHNESS_SECONDS: i64 = 300;
const DEFAULT_RATE_LIMIT_PER_MINUTE: u64 = 20;
const DEFAULT_RATE_LIMIT_PER_HOUR: u64 = 100;
const DEFAULT_RATE_LIMIT_PER_DAY: u64 = 1000;
const DEFAULT_MAX_BODY_BYTES: usize = 1024 * 1024;

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: SocketAddr,
    pub log_filter: String,
    /// Server-side HMAC key for deriving api-key lookup ids. Raw bearer
    /// keys are never stored; without a pepper the gateway cannot resolve
    /// credentials and every signed route fails closed.
    pub api_key_pepper: Option<String>,
    pub signature_freshness_seconds: i64,
    pub rate_limit_per_minute: u64,
    pub rate_limit_per_hour: u64,
    pub rate_limit_per_day: u64,
    pub max_body_bytes: usize,
    pub store_snapshot_path: Option<PathBuf>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid TL_RELAY_BIND_ADDR value '{value}': {source}")]
    InvalidBindAddr {
        value: String,
        source: std::net::AddrParseError,
    },
    #[error("invalid {variable} value '{value}': expected a positive integer")]
    InvalidInteger {
        variable: &'static str,
        value: String,
    },
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let bind_addr_raw = env::var("TL_RELAY_BIND_ADDR")
            .ok()
            .filter(|value| !value.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());

        let bind_addr = bind_addr_raw
            .parse()
            .map_err(|source| ConfigError::InvalidBindAddr {
                value: bind_addr_raw,
                source,
            })?;

        let log_filter = env::var("TL_RELAY_LOG_FILTER")
            .ok()
            .filter(|value| !value.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string());

        let api_key_pepper = env::var("TL_RELAY_API_KEY_PEPPER")
            .ok()
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty());

        let signature_freshness_seconds = parse_positive_i64(
            "TL_RELAY_SIGNATURE_FRESHNESS_SECONDS",
            DEFAULT_SIGNATURE_FRESHNESS_SECONDS,
        )?;

        let rate_limit_per_minute =
            parse_positive_u64("TL_RELAY_RATE_LIMIT_PER_MINUTE", DEFAULT_RATE_LIMIT_PER_MINUTE)?;
        let rate_limit_per_hour =
            parse_positive_u64("TL_RELAY_RATE_LIMIT_PER_HOUR", DEFAULT_RATE_LIMIT_PER_HOUR)?;
        let rate_limit_per_day =
            parse_positive_u64("TL_RELAY_RATE_LIMIT_PER_DAY", DEFAULT_RATE_LIMIT_PER_DAY)?;

        let max_body_bytes = parse_positive_u64(
            "TL_RELAY_MAX_BODY_BYTES",
            DEFAULT_MAX_BODY_BYTES as u64,
        )? as usize;

        let store_snapshot_path = env::var("TL_RELAY_STORE_PATH")
            .ok()
            .filter(|value| !value.trim().is_empty())
            .map(PathBuf::from);

        Ok(Self {
            bind_addr,
            log_filter,
            api_key_pepper,
            signature_freshness_seconds,
            rate_limit_per_minute,
            rate_limit_per_hour,
            rate_limit_per_day,
            max_body_bytes,
            store_snapshot_path,
        })
    }

    pub fn for_tests() -> Self {
        let bind_addr = SocketAddr::from(([127, 0, 0, 1], 0));
        Self {
            bind_addr,
            log_filter: "debug".to_string(),
            api_key_pepper: Some("relay-test-pepper".to_string()),
            signature_freshness_seconds: DEFAULT_SIGNATURE_FRESHNESS_SECONDS,
            rate_limit_per_minute: DEFAULT_RATE_LIMIT_PER_MINUTE,
            rate_limit_per_hour: DEFAULT_RATE_LIMIT_PER_HOUR,
            rate_limit_per_day: DEFAULT_RATE_LIMIT_PER_DAY,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            store_snapshot_path: None,
        }
    }
}

fn parse_positive_u64(variable: &'static str, default: u64) -> Result<u64, ConfigError> {
    let Some(raw) = env::var(variable)
        .ok()
        .filter(|value| !value.trim().is_empty())
    else {
        return Ok(default);
    };

    raw.trim()
        .parse::<u64>()
        .ok()
        .filter(|value| *value > 0)
        .ok_or(ConfigError::InvalidInteger {
            variable,
            value: raw,
        })
}

fn parse_positive_i64(variable: &'static str, default: i64) -> Result<i64, ConfigError> {
    parse_positive_u64(variable, default as u64).map(|value| value as i64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_carries_rate_limit_defaults() {
        let config = Config::for_tests();
        assert_eq!(config.rate_limit_per_minute, 20);
        assert_eq!(config.rate_limit_per_hour, 100);
        assert_eq!(config.rate_limit_per_day, 1000);
        assert_eq!(config.signature_freshness_seconds, 300);
    }

    #[test]
    fn test_config_has_a_pepper() {
        let config = Config::for_tests();
        assert!(config.api_key_pepper.is_some());
    }
}
