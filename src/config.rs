// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! This module defines environment variable names and default values used
//! throughout the application. Configuration is loaded from the environment
//! at startup.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `HOST` | Server bind address | `0.0.0.0` |
//! | `PORT` | Server bind port | `8080` |
//! | `KEY_EXCHANGE_MODE` | `asymmetric` (RSA-wrapped key) or `transport` (raw key) | `asymmetric` |
//! | `ENCRYPTION_MODE` | `mandatory` or `optional` response sealing | `mandatory` |
//! | `ENCRYPTION_WHITELIST` | Extra comma-separated path prefixes exempt from encryption | empty |
//! | `ENCRYPTION_OPTIONAL` | Comma-separated prefixes where the key may be omitted in mandatory mode | empty |
//! | `UNWRAP_EXEMPT` | Extra comma-separated prefixes accepting plain request bodies | empty |
//! | `RSA_KEY_BITS` | RSA modulus size for the server keypair | `2048` |
//! | `TLS_CERT_PATH` | PEM certificate chain; enables HTTPS with `TLS_KEY_PATH` | unset |
//! | `TLS_KEY_PATH` | PEM private key for HTTPS | unset |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,tower_http=debug` |

use std::net::SocketAddr;
use std::path::PathBuf;

use crate::crypto::{KeyExchangeMode, DEFAULT_KEY_BITS};

pub const HOST_ENV: &str = "HOST";
pub const PORT_ENV: &str = "PORT";
pub const KEY_EXCHANGE_MODE_ENV: &str = "KEY_EXCHANGE_MODE";
pub const ENCRYPTION_MODE_ENV: &str = "ENCRYPTION_MODE";
pub const ENCRYPTION_WHITELIST_ENV: &str = "ENCRYPTION_WHITELIST";
pub const ENCRYPTION_OPTIONAL_ENV: &str = "ENCRYPTION_OPTIONAL";
pub const UNWRAP_EXEMPT_ENV: &str = "UNWRAP_EXEMPT";
pub const RSA_KEY_BITS_ENV: &str = "RSA_KEY_BITS";
pub const TLS_CERT_PATH_ENV: &str = "TLS_CERT_PATH";
pub const TLS_KEY_PATH_ENV: &str = "TLS_KEY_PATH";
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8080;

/// Default `RUST_LOG` filter when none is set.
pub const DEFAULT_LOG_FILTER: &str = "info,tower_http=debug";

/// Whether a key is required on non-whitelisted routes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EncryptionMode {
    /// Missing key is a 400; plaintext bodies are rejected.
    #[default]
    Mandatory,
    /// Missing key passes through unencrypted.
    Optional,
}

impl std::str::FromStr for EncryptionMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mandatory" | "required" => Ok(EncryptionMode::Mandatory),
            "optional" => Ok(EncryptionMode::Optional),
            other => Err(format!("unknown encryption mode '{other}'")),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Configuration errors reported at startup.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value for {var}: {reason}")]
    Invalid { var: &'static str, reason: String },
    #[error("{0} and {1} must be set together")]
    Incomplete(&'static str, &'static str),
}

/// TLS certificate and key locations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsPaths {
    pub cert: PathBuf,
    pub key: PathBuf,
}

/// Server configuration loaded from the environment.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub key_exchange: KeyExchangeMode,
    pub encryption_mode: EncryptionMode,
    /// Extra exempt prefixes appended to the built-in whitelist.
    pub extra_whitelist: Vec<String>,
    /// Prefixes where a key is optional even in mandatory mode.
    pub optional_prefixes: Vec<String>,
    /// Extra prefixes appended to the built-in unwrap-exempt list.
    pub extra_unwrap_exempt: Vec<String>,
    pub rsa_key_bits: usize,
    pub tls: Option<TlsPaths>,
    pub log_format: LogFormat,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            key_exchange: KeyExchangeMode::Asymmetric,
            encryption_mode: EncryptionMode::Mandatory,
            extra_whitelist: Vec::new(),
            optional_prefixes: Vec::new(),
            extra_unwrap_exempt: Vec::new(),
            rsa_key_bits: DEFAULT_KEY_BITS,
            tls: None,
            log_format: LogFormat::Pretty,
        }
    }
}

impl ServerConfig {
    /// Load configuration from process environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let port = match get(PORT_ENV) {
            Some(raw) => raw.trim().parse::<u16>().map_err(|e| ConfigError::Invalid {
                var: PORT_ENV,
                reason: format!("{e}"),
            })?,
            None => defaults.port,
        };

        let key_exchange = match get(KEY_EXCHANGE_MODE_ENV) {
            Some(raw) => raw.parse::<KeyExchangeMode>().map_err(|reason| ConfigError::Invalid {
                var: KEY_EXCHANGE_MODE_ENV,
                reason,
            })?,
            None => defaults.key_exchange,
        };

        let encryption_mode = match get(ENCRYPTION_MODE_ENV) {
            Some(raw) => raw.parse::<EncryptionMode>().map_err(|reason| ConfigError::Invalid {
                var: ENCRYPTION_MODE_ENV,
                reason,
            })?,
            None => defaults.encryption_mode,
        };

        let rsa_key_bits = match get(RSA_KEY_BITS_ENV) {
            Some(raw) => raw.trim().parse::<usize>().map_err(|e| ConfigError::Invalid {
                var: RSA_KEY_BITS_ENV,
                reason: format!("{e}"),
            })?,
            None => defaults.rsa_key_bits,
        };

        let extra_whitelist = get(ENCRYPTION_WHITELIST_ENV)
            .map(|raw| prefix_list(&raw))
            .unwrap_or_default();
        let optional_prefixes = get(ENCRYPTION_OPTIONAL_ENV)
            .map(|raw| prefix_list(&raw))
            .unwrap_or_default();
        let extra_unwrap_exempt = get(UNWRAP_EXEMPT_ENV)
            .map(|raw| prefix_list(&raw))
            .unwrap_or_default();

        let tls = match (get(TLS_CERT_PATH_ENV), get(TLS_KEY_PATH_ENV)) {
            (Some(cert), Some(key)) => Some(TlsPaths {
                cert: PathBuf::from(cert),
                key: PathBuf::from(key),
            }),
            (None, None) => None,
            _ => return Err(ConfigError::Incomplete(TLS_CERT_PATH_ENV, TLS_KEY_PATH_ENV)),
        };

        let log_format = match get(LOG_FORMAT_ENV).as_deref().map(str::trim) {
            Some("json") => LogFormat::Json,
            _ => LogFormat::Pretty,
        };

        Ok(Self {
            host: get(HOST_ENV).unwrap_or(defaults.host),
            port,
            key_exchange,
            encryption_mode,
            extra_whitelist,
            optional_prefixes,
            extra_unwrap_exempt,
            rsa_key_bits,
            tls,
            log_format,
        })
    }

    /// Socket address to bind.
    pub fn bind_addr(&self) -> Result<SocketAddr, ConfigError> {
        format!("{}:{}", self.host, self.port)
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::Invalid {
                var: HOST_ENV,
                reason: format!("{e}"),
            })
    }

    /// Transport-protected mode without TLS sends session keys in clear.
    pub fn transport_key_unprotected(&self) -> bool {
        self.key_exchange == KeyExchangeMode::Transport && self.tls.is_none()
    }
}

fn prefix_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|prefix| !prefix.is_empty())
        .map(str::to_string)
        .collect()
}
