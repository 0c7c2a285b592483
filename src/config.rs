//! Connection configuration: CLI flags, environment defaults, and an
//! optional config file, merged in that priority order.
//!
//! The password never comes from the config file; it is taken from the
//! environment or prompted for interactively by the caller.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::PathBuf;
use thiserror::Error;

/// Environment variables recognized as connection defaults
pub mod env_keys {
    pub const HOST: &str = "SSH_HOST";
    pub const PORT: &str = "SSH_PORT";
    pub const USER: &str = "SSH_USER";
    pub const PASSWORD: &str = "SSH_PASSWORD";
}

/// Default SSH port
const DEFAULT_PORT: u16 = 22;

/// Default TCP/handshake timeout in seconds
const DEFAULT_CONNECT_TIMEOUT: u64 = 30;

/// Error type for configuration resolution failures
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// A required field was not supplied by any source
    #[error("{field} is required (flag, ${env}, or config file)")]
    Missing {
        field: &'static str,
        env: &'static str,
    },
}

/// Fully resolved parameters for one session
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    /// TCP connect and SSH handshake timeout in seconds
    pub connect_timeout: u64,
}

/// On-disk configuration (`<config dir>/smon/config.toml`).
///
/// Only non-secret connection defaults live here.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub username: Option<String>,
    pub connect_timeout: Option<u64>,
}

impl FileConfig {
    /// Load the config file if present. A missing file is not an error; a
    /// malformed one is, so typos do not silently vanish.
    pub fn load() -> Result<Self> {
        let Some(path) = Self::path() else {
            return Ok(Self::default());
        };
        if !path.exists() {
            return Ok(Self::default());
        }

        let text = std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let config = toml::from_str(&text)
            .with_context(|| format!("failed to parse {}", path.display()))?;
        Ok(config)
    }

    /// Platform config file location
    #[must_use]
    pub fn path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("smon").join("config.toml"))
    }
}

/// Partially resolved parameters collected from one source.
///
/// Sources merge with [`ConnectionParams::or`], highest priority first, and
/// [`ConnectionParams::finish`] validates the result.
#[derive(Debug, Clone, Default)]
pub struct ConnectionParams {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub connect_timeout: Option<u64>,
}

impl ConnectionParams {
    /// Read defaults from the process environment
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read defaults from a loaded config file
    #[must_use]
    pub fn from_file(file: &FileConfig) -> Self {
        Self {
            host: file.host.clone(),
            port: file.port.filter(|p| *p > 0),
            username: file.username.clone(),
            password: None,
            connect_timeout: file.connect_timeout,
        }
    }

    /// Testable core of [`ConnectionParams::from_env`]
    fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Self {
        let port = get(env_keys::PORT).and_then(|raw| match raw.trim().parse::<u16>() {
            Ok(port) if port > 0 => Some(port),
            _ => {
                tracing::warn!("ignoring invalid {}='{}'", env_keys::PORT, raw);
                None
            }
        });

        Self {
            host: get(env_keys::HOST),
            port,
            username: get(env_keys::USER),
            password: get(env_keys::PASSWORD),
            connect_timeout: None,
        }
    }

    /// Fill any unset field from a lower-priority source
    #[must_use]
    pub fn or(self, other: Self) -> Self {
        Self {
            host: self.host.or(other.host),
            port: self.port.or(other.port),
            username: self.username.or(other.username),
            password: self.password.or(other.password),
            connect_timeout: self.connect_timeout.or(other.connect_timeout),
        }
    }

    /// Validate and produce a [`ConnectionConfig`].
    ///
    /// Host and username must be non-empty and a password must be present;
    /// port and timeout fall back to their defaults.
    ///
    /// # Errors
    /// [`ConfigError::Missing`] naming the first absent field.
    pub fn finish(self) -> Result<ConnectionConfig, ConfigError> {
        let host = self
            .host
            .filter(|h| !h.trim().is_empty())
            .ok_or(ConfigError::Missing {
                field: "host",
                env: env_keys::HOST,
            })?;
        let username = self
            .username
            .filter(|u| !u.trim().is_empty())
            .ok_or(ConfigError::Missing {
                field: "username",
                env: env_keys::USER,
            })?;
        let password = self
            .password
            .filter(|p| !p.is_empty())
            .ok_or(ConfigError::Missing {
                field: "password",
                env: env_keys::PASSWORD,
            })?;

        Ok(ConnectionConfig {
            host,
            port: self.port.unwrap_or(DEFAULT_PORT),
            username,
            password,
            connect_timeout: self.connect_timeout.unwrap_or(DEFAULT_CONNECT_TIMEOUT),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full() -> ConnectionParams {
        ConnectionParams {
            host: Some("login.cluster.example".to_string()),
            port: Some(2222),
            username: Some("alice".to_string()),
            password: Some("hunter2".to_string()),
            connect_timeout: None,
        }
    }

    #[test]
    fn test_from_lookup_reads_all_keys() {
        let params = ConnectionParams::from_lookup(|key| match key {
            env_keys::HOST => Some("login01".to_string()),
            env_keys::PORT => Some("2200".to_string()),
            env_keys::USER => Some("alice".to_string()),
            env_keys::PASSWORD => Some("secret".to_string()),
            _ => None,
        });
        assert_eq!(params.host.as_deref(), Some("login01"));
        assert_eq!(params.port, Some(2200));
        assert_eq!(params.username.as_deref(), Some("alice"));
        assert_eq!(params.password.as_deref(), Some("secret"));
    }

    #[test]
    fn test_from_lookup_rejects_bad_port() {
        let params = ConnectionParams::from_lookup(|key| match key {
            env_keys::PORT => Some("not-a-port".to_string()),
            _ => None,
        });
        assert_eq!(params.port, None);

        let params = ConnectionParams::from_lookup(|key| match key {
            env_keys::PORT => Some("0".to_string()),
            _ => None,
        });
        assert_eq!(params.port, None);
    }

    #[test]
    fn test_or_prefers_self() {
        let flags = ConnectionParams {
            host: Some("cli-host".to_string()),
            ..Default::default()
        };
        let merged = flags.or(full());
        assert_eq!(merged.host.as_deref(), Some("cli-host"));
        assert_eq!(merged.username.as_deref(), Some("alice"));
        assert_eq!(merged.port, Some(2222));
    }

    #[test]
    fn test_finish_applies_defaults() {
        let config = ConnectionParams {
            port: None,
            ..full()
        }
        .finish()
        .unwrap();
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.connect_timeout, DEFAULT_CONNECT_TIMEOUT);
    }

    #[test]
    fn test_finish_missing_host() {
        let err = ConnectionParams {
            host: None,
            ..full()
        }
        .finish()
        .unwrap_err();
        assert_eq!(
            err,
            ConfigError::Missing {
                field: "host",
                env: env_keys::HOST
            }
        );
    }

    #[test]
    fn test_finish_blank_username_is_missing() {
        let err = ConnectionParams {
            username: Some("   ".to_string()),
            ..full()
        }
        .finish()
        .unwrap_err();
        assert!(matches!(err, ConfigError::Missing { field: "username", .. }));
    }

    #[test]
    fn test_finish_missing_password() {
        let err = ConnectionParams {
            password: None,
            ..full()
        }
        .finish()
        .unwrap_err();
        assert!(matches!(err, ConfigError::Missing { field: "password", .. }));
    }
}
