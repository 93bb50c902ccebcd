//! Configuration module for the tabkeeper daemon.
//!
//! This module handles parsing configuration from environment variables.
//!
//! # Environment Variables
//!
//! | Variable | Required | Default | Description |
//! |----------|----------|---------|-------------|
//! | `TABKEEPER_DATA_DIR` | No | `~/.tabkeeper` | Directory holding `store.json` |
//! | `TABKEEPER_BRIDGE_URL` | Unless simulating | - | Tab bridge base URL (e.g., `http://127.0.0.1:7879`) |
//! | `TABKEEPER_PORT` | No | 7878 | HTTP port of the command surface |
//! | `TABKEEPER_BIND_ADDR` | No | `127.0.0.1` | Address the command surface binds to |
//! | `TABKEEPER_MAX_HISTORY` | No | 300 | History ring capacity |
//! | `TABKEEPER_MINUTE_SECS` | No | 60 | Seconds in one schedule minute (at most 3600) |
//! | `TABKEEPER_LOG_JSON` | No | false | Emit JSON logs instead of text |
//!
//! # Example
//!
//! ```no_run
//! use tabkeeper::config::Config;
//!
//! let config = Config::from_env().expect("Failed to load configuration");
//! println!("Store: {}", config.store_path().display());
//! ```

use std::env;
use std::net::{IpAddr, Ipv4Addr};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use directories::BaseDirs;
use thiserror::Error;

use crate::store::{MAX_HISTORY, STORE_FILE_NAME};

/// Default data directory name relative to home.
const DEFAULT_DATA_DIR: &str = ".tabkeeper";

/// Default HTTP port.
pub const DEFAULT_PORT: u16 = 7878;

/// Default bind address.
const DEFAULT_BIND_ADDR: IpAddr = IpAddr::V4(Ipv4Addr::LOCALHOST);

/// Default seconds per schedule minute.
const DEFAULT_MINUTE_SECS: u64 = 60;

/// Upper bound on seconds per schedule minute.
const MAX_MINUTE_SECS: u64 = 3600;

/// Errors that can occur during configuration parsing.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Required environment variable is missing.
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    /// Environment variable has an invalid value.
    #[error("invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    /// Failed to determine home directory.
    #[error("failed to determine home directory")]
    NoHomeDirectory,
}

/// Configuration for the tabkeeper daemon.
#[derive(Debug, Clone)]
pub struct Config {
    /// Directory holding the store file.
    pub data_dir: PathBuf,

    /// Base URL of the tab bridge. `None` is only usable in simulated mode.
    pub bridge_url: Option<String>,

    /// HTTP port of the command surface.
    pub port: u16,

    /// Address the command surface binds to.
    pub bind_addr: IpAddr,

    /// History ring capacity.
    pub max_history: usize,

    /// Wall-clock length of one schedule minute.
    pub minute: Duration,

    /// Emit JSON logs.
    pub log_json: bool,
}

impl Config {
    /// Creates a new `Config` by parsing environment variables.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if:
    /// - a numeric variable is set but not a positive integer
    /// - `TABKEEPER_MINUTE_SECS` exceeds one hour
    /// - `TABKEEPER_BIND_ADDR` is not an IP address
    /// - the home directory cannot be determined and `TABKEEPER_DATA_DIR` is unset
    pub fn from_env() -> Result<Self, ConfigError> {
        // Optional: TABKEEPER_DATA_DIR (default: ~/.tabkeeper)
        let data_dir = match env::var("TABKEEPER_DATA_DIR") {
            Ok(dir) => PathBuf::from(dir),
            Err(_) => {
                let base_dirs = BaseDirs::new().ok_or(ConfigError::NoHomeDirectory)?;
                base_dirs.home_dir().join(DEFAULT_DATA_DIR)
            }
        };

        let bridge_url = env::var("TABKEEPER_BRIDGE_URL")
            .ok()
            .map(|url| url.trim().to_string())
            .filter(|url| !url.is_empty());

        let port = parse_positive("TABKEEPER_PORT", DEFAULT_PORT)?;

        let bind_addr = match env::var("TABKEEPER_BIND_ADDR") {
            Ok(val) => IpAddr::from_str(val.trim()).map_err(|_| ConfigError::InvalidValue {
                key: "TABKEEPER_BIND_ADDR".to_string(),
                message: format!("expected IP address, got '{val}'"),
            })?,
            Err(_) => DEFAULT_BIND_ADDR,
        };

        let max_history = parse_positive("TABKEEPER_MAX_HISTORY", MAX_HISTORY)?;
        let minute_secs = parse_positive("TABKEEPER_MINUTE_SECS", DEFAULT_MINUTE_SECS)?;
        if minute_secs > MAX_MINUTE_SECS {
            return Err(ConfigError::InvalidValue {
                key: "TABKEEPER_MINUTE_SECS".to_string(),
                message: format!("must be at most {MAX_MINUTE_SECS}, got {minute_secs}"),
            });
        }

        let log_json = env::var("TABKEEPER_LOG_JSON")
            .map(|val| matches!(val.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
            .unwrap_or(false);

        Ok(Self {
            data_dir,
            bridge_url,
            port,
            bind_addr,
            max_history,
            minute: Duration::from_secs(minute_secs),
            log_json,
        })
    }

    /// Path of the store file inside the data directory.
    #[must_use]
    pub fn store_path(&self) -> PathBuf {
        self.data_dir.join(STORE_FILE_NAME)
    }

    /// Returns the bridge URL, or an error if it is not configured.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingEnvVar` if `TABKEEPER_BRIDGE_URL` is unset.
    pub fn require_bridge_url(&self) -> Result<&str, ConfigError> {
        self.bridge_url
            .as_deref()
            .ok_or_else(|| ConfigError::MissingEnvVar("TABKEEPER_BRIDGE_URL".to_string()))
    }
}

/// Parses an optional positive integer variable, falling back to `default`.
fn parse_positive<T>(key: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr + PartialEq + Default,
{
    let Ok(val) = env::var(key) else {
        return Ok(default);
    };
    let parsed = val
        .trim()
        .parse::<T>()
        .map_err(|_| ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("expected positive integer, got '{val}'"),
        })?;
    if parsed == T::default() {
        return Err(ConfigError::InvalidValue {
            key: key.to_string(),
            message: "must be greater than 0".to_string(),
        });
    }
    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::env;

    /// Helper to run tests with isolated environment variables.
    /// Clears all TABKEEPER_* vars before the test and restores them after.
    fn with_clean_env<F, R>(f: F) -> R
    where
        F: FnOnce() -> R,
    {
        let saved_vars: Vec<(String, String)> = env::vars()
            .filter(|(k, _)| k.starts_with("TABKEEPER_"))
            .collect();

        for (key, _) in &saved_vars {
            env::remove_var(key);
        }

        let result = f();

        let leaked: Vec<String> = env::vars()
            .map(|(k, _)| k)
            .filter(|k| k.starts_with("TABKEEPER_"))
            .collect();
        for key in leaked {
            env::remove_var(key);
        }
        for (key, value) in saved_vars {
            env::set_var(key, value);
        }

        result
    }

    #[test]
    #[serial]
    fn test_defaults() {
        with_clean_env(|| {
            let config = Config::from_env().expect("should parse empty environment");

            assert!(config.data_dir.ends_with(DEFAULT_DATA_DIR));
            assert!(config.bridge_url.is_none());
            assert_eq!(config.port, DEFAULT_PORT);
            assert_eq!(config.bind_addr.to_string(), "127.0.0.1");
            assert_eq!(config.max_history, 300);
            assert_eq!(config.minute, Duration::from_secs(60));
            assert!(!config.log_json);
            assert!(config.store_path().ends_with("store.json"));
        });
    }

    #[test]
    #[serial]
    fn test_full_config() {
        with_clean_env(|| {
            env::set_var("TABKEEPER_DATA_DIR", "/tmp/tabkeeper-test");
            env::set_var("TABKEEPER_BRIDGE_URL", " http://127.0.0.1:7879 ");
            env::set_var("TABKEEPER_PORT", "9000");
            env::set_var("TABKEEPER_BIND_ADDR", "0.0.0.0");
            env::set_var("TABKEEPER_MAX_HISTORY", "50");
            env::set_var("TABKEEPER_MINUTE_SECS", "1");
            env::set_var("TABKEEPER_LOG_JSON", "true");

            let config = Config::from_env().expect("should parse full config");

            assert_eq!(config.data_dir, PathBuf::from("/tmp/tabkeeper-test"));
            assert_eq!(config.require_bridge_url().unwrap(), "http://127.0.0.1:7879");
            assert_eq!(config.port, 9000);
            assert_eq!(config.bind_addr.to_string(), "0.0.0.0");
            assert_eq!(config.max_history, 50);
            assert_eq!(config.minute, Duration::from_secs(1));
            assert!(config.log_json);
        });
    }

    #[test]
    #[serial]
    fn test_missing_bridge_url_is_reported() {
        with_clean_env(|| {
            let config = Config::from_env().unwrap();
            let err = config.require_bridge_url().unwrap_err();
            assert!(
                matches!(err, ConfigError::MissingEnvVar(ref s) if s == "TABKEEPER_BRIDGE_URL")
            );
        });
    }

    #[test]
    #[serial]
    fn test_blank_bridge_url_is_unset() {
        with_clean_env(|| {
            env::set_var("TABKEEPER_BRIDGE_URL", "   ");
            let config = Config::from_env().unwrap();
            assert!(config.bridge_url.is_none());
        });
    }

    #[test]
    #[serial]
    fn test_invalid_port() {
        with_clean_env(|| {
            env::set_var("TABKEEPER_PORT", "not-a-port");
            let err = Config::from_env().unwrap_err();
            assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "TABKEEPER_PORT"));
        });
    }

    #[test]
    #[serial]
    fn test_zero_values_rejected() {
        with_clean_env(|| {
            env::set_var("TABKEEPER_MAX_HISTORY", "0");
            let err = Config::from_env().unwrap_err();
            assert!(
                matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "TABKEEPER_MAX_HISTORY")
            );
        });

        with_clean_env(|| {
            env::set_var("TABKEEPER_MINUTE_SECS", "0");
            let err = Config::from_env().unwrap_err();
            assert!(
                matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "TABKEEPER_MINUTE_SECS")
            );
        });
    }

    #[test]
    #[serial]
    fn test_oversized_minute_rejected() {
        with_clean_env(|| {
            env::set_var("TABKEEPER_MINUTE_SECS", "100000000000000000");
            let err = Config::from_env().unwrap_err();
            assert!(
                matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "TABKEEPER_MINUTE_SECS")
            );
        });

        with_clean_env(|| {
            env::set_var("TABKEEPER_MINUTE_SECS", "3600");
            let config = Config::from_env().unwrap();
            assert_eq!(config.minute, Duration::from_secs(3600));
        });
    }

    #[test]
    #[serial]
    fn test_invalid_bind_addr() {
        with_clean_env(|| {
            env::set_var("TABKEEPER_BIND_ADDR", "localhost");
            let err = Config::from_env().unwrap_err();
            assert!(
                matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "TABKEEPER_BIND_ADDR")
            );
        });
    }

    #[test]
    #[serial]
    fn test_log_json_flag_values() {
        with_clean_env(|| {
            env::set_var("TABKEEPER_LOG_JSON", "0");
            assert!(!Config::from_env().unwrap().log_json);
            env::set_var("TABKEEPER_LOG_JSON", "YES");
            assert!(Config::from_env().unwrap().log_json);
        });
    }
}
