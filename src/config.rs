// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! Environment variables are read once at startup into [`Config`].
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `DATA_DIR` | Root directory for the database, documents and audit logs | `/data` |
//! | `HOST` | Server bind address | `0.0.0.0` |
//! | `PORT` | Server bind port | `8080` |
//! | `JWT_SECRET` | HS256 signing secret, at least 32 bytes | Required |
//! | `TOKEN_TTL_SECS` | Session token lifetime | `3600` |
//! | `RAZORPAY_KEY_ID` | Razorpay API key id | Optional, recharge disabled without it |
//! | `RAZORPAY_KEY_SECRET` | Razorpay API key secret | Optional, recharge disabled without it |
//! | `RAZORPAY_API_BASE_URL` | Razorpay API base URL | `https://api.razorpay.com` |
//! | `DOCUMENT_SWEEP_INTERVAL_SECS` | Interval between document expiry sweeps | `300` |
//! | `TLS_CERT_PATH` / `TLS_KEY_PATH` | PEM certificate chain and key; both or neither | Plain HTTP |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,tower_http=debug` |

use std::path::PathBuf;
use std::time::Duration;

use crate::auth::tokens::DEFAULT_TOKEN_TTL;
use crate::providers::razorpay::{RazorpayConfig, DEFAULT_API_BASE_URL};
use crate::storage::paths::DATA_ROOT;

pub const DATA_DIR_ENV: &str = "DATA_DIR";
pub const HOST_ENV: &str = "HOST";
pub const PORT_ENV: &str = "PORT";
pub const JWT_SECRET_ENV: &str = "JWT_SECRET";
pub const TOKEN_TTL_ENV: &str = "TOKEN_TTL_SECS";
pub const RAZORPAY_KEY_ID_ENV: &str = "RAZORPAY_KEY_ID";
pub const RAZORPAY_KEY_SECRET_ENV: &str = "RAZORPAY_KEY_SECRET";
pub const RAZORPAY_API_BASE_URL_ENV: &str = "RAZORPAY_API_BASE_URL";
pub const DOCUMENT_SWEEP_INTERVAL_ENV: &str = "DOCUMENT_SWEEP_INTERVAL_SECS";
pub const TLS_CERT_PATH_ENV: &str = "TLS_CERT_PATH";
pub const TLS_KEY_PATH_ENV: &str = "TLS_KEY_PATH";
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(300);

/// Shortest accepted `JWT_SECRET`, in bytes.
pub const MIN_JWT_SECRET_LEN: usize = 32;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    MissingEnv(&'static str),

    #[error("invalid value for {name}: {reason}")]
    InvalidValue { name: &'static str, reason: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    Json,
    #[default]
    Pretty,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsPaths {
    pub cert: PathBuf,
    pub key: PathBuf,
}

#[derive(Clone, PartialEq, Eq)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub data_dir: PathBuf,
    pub jwt_secret: String,
    pub token_ttl: Duration,
    pub razorpay: Option<RazorpayConfig>,
    pub document_sweep_interval: Duration,
    pub tls: Option<TlsPaths>,
    pub log_format: LogFormat,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("data_dir", &self.data_dir)
            .field("token_ttl", &self.token_ttl)
            .field("razorpay_enabled", &self.razorpay.is_some())
            .field("document_sweep_interval", &self.document_sweep_interval)
            .field("tls", &self.tls)
            .field("log_format", &self.log_format)
            .finish_non_exhaustive()
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build the configuration from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |name: &str| {
            lookup(name)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let jwt_secret = get(JWT_SECRET_ENV).ok_or(ConfigError::MissingEnv(JWT_SECRET_ENV))?;
        if jwt_secret.len() < MIN_JWT_SECRET_LEN {
            return Err(ConfigError::InvalidValue {
                name: JWT_SECRET_ENV,
                reason: format!("must be at least {MIN_JWT_SECRET_LEN} bytes"),
            });
        }

        let port = match get(PORT_ENV) {
            Some(raw) => raw.parse().map_err(|_| ConfigError::InvalidValue {
                name: PORT_ENV,
                reason: format!("{raw:?} is not a port number"),
            })?,
            None => DEFAULT_PORT,
        };

        let token_ttl = parse_secs(get(TOKEN_TTL_ENV), TOKEN_TTL_ENV)?.unwrap_or(DEFAULT_TOKEN_TTL);
        let document_sweep_interval = parse_secs(
            get(DOCUMENT_SWEEP_INTERVAL_ENV),
            DOCUMENT_SWEEP_INTERVAL_ENV,
        )?
        .unwrap_or(DEFAULT_SWEEP_INTERVAL);

        let razorpay = match (get(RAZORPAY_KEY_ID_ENV), get(RAZORPAY_KEY_SECRET_ENV)) {
            (Some(key_id), Some(key_secret)) => Some(RazorpayConfig {
                key_id,
                key_secret,
                api_base_url: get(RAZORPAY_API_BASE_URL_ENV)
                    .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string()),
            }),
            (None, None) => None,
            (Some(_), None) => return Err(ConfigError::MissingEnv(RAZORPAY_KEY_SECRET_ENV)),
            (None, Some(_)) => return Err(ConfigError::MissingEnv(RAZORPAY_KEY_ID_ENV)),
        };

        let tls = match (get(TLS_CERT_PATH_ENV), get(TLS_KEY_PATH_ENV)) {
            (Some(cert), Some(key)) => Some(TlsPaths {
                cert: PathBuf::from(cert),
                key: PathBuf::from(key),
            }),
            (None, None) => None,
            (Some(_), None) => return Err(ConfigError::MissingEnv(TLS_KEY_PATH_ENV)),
            (None, Some(_)) => return Err(ConfigError::MissingEnv(TLS_CERT_PATH_ENV)),
        };

        let log_format = match get(LOG_FORMAT_ENV).map(|v| v.to_lowercase()).as_deref() {
            None | Some("pretty") => LogFormat::Pretty,
            Some("json") => LogFormat::Json,
            Some(other) => {
                return Err(ConfigError::InvalidValue {
                    name: LOG_FORMAT_ENV,
                    reason: format!("{other:?} is not json or pretty"),
                })
            }
        };

        Ok(Self {
            host: get(HOST_ENV).unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port,
            data_dir: get(DATA_DIR_ENV)
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DATA_ROOT)),
            jwt_secret,
            token_ttl,
            razorpay,
            document_sweep_interval,
            tls,
            log_format,
        })
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_secs(raw: Option<String>, name: &'static str) -> Result<Option<Duration>, ConfigError> {
    let Some(raw) = raw else {
        return Ok(None);
    };
    match raw.parse::<u64>() {
        Ok(secs) if secs > 0 => Ok(Some(Duration::from_secs(secs))),
        _ => Err(ConfigError::InvalidValue {
            name,
            reason: format!("{raw:?} is not a positive number of seconds"),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    const SECRET: &str = "0123456789abcdef0123456789abcdef";

    fn config_from(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|name| map.get(name).cloned())
    }

    #[test]
    fn defaults_apply_with_only_secret() {
        let config = config_from(&[(JWT_SECRET_ENV, SECRET)]).unwrap();
        assert_eq!(config.bind_address(), "0.0.0.0:8080");
        assert_eq!(config.data_dir, PathBuf::from("/data"));
        assert_eq!(config.token_ttl, Duration::from_secs(3600));
        assert_eq!(config.document_sweep_interval, DEFAULT_SWEEP_INTERVAL);
        assert!(config.razorpay.is_none());
        assert!(config.tls.is_none());
        assert_eq!(config.log_format, LogFormat::Pretty);
    }

    #[test]
    fn secret_is_required_and_must_be_long() {
        assert_eq!(
            config_from(&[]).unwrap_err(),
            ConfigError::MissingEnv(JWT_SECRET_ENV)
        );
        assert!(matches!(
            config_from(&[(JWT_SECRET_ENV, "short")]),
            Err(ConfigError::InvalidValue { .. })
        ));
    }

    #[test]
    fn razorpay_needs_both_keys() {
        let config = config_from(&[
            (JWT_SECRET_ENV, SECRET),
            (RAZORPAY_KEY_ID_ENV, "rzp_test"),
            (RAZORPAY_KEY_SECRET_ENV, "secret"),
        ])
        .unwrap();
        let razorpay = config.razorpay.unwrap();
        assert_eq!(razorpay.api_base_url, DEFAULT_API_BASE_URL);

        assert_eq!(
            config_from(&[(JWT_SECRET_ENV, SECRET), (RAZORPAY_KEY_ID_ENV, "rzp_test")])
                .unwrap_err(),
            ConfigError::MissingEnv(RAZORPAY_KEY_SECRET_ENV)
        );
    }

    #[test]
    fn invalid_numbers_are_reported() {
        assert!(config_from(&[(JWT_SECRET_ENV, SECRET), (PORT_ENV, "http")]).is_err());
        assert!(config_from(&[(JWT_SECRET_ENV, SECRET), (TOKEN_TTL_ENV, "0")]).is_err());
        assert!(config_from(&[(JWT_SECRET_ENV, SECRET), (LOG_FORMAT_ENV, "xml")]).is_err());
    }

    #[test]
    fn debug_output_hides_secrets() {
        let config = config_from(&[(JWT_SECRET_ENV, SECRET)]).unwrap();
        assert!(!format!("{config:?}").contains(SECRET));
    }
}
