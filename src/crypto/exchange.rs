// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Session key exchange over the `X-AES-Key` header.
//!
//! Two deployments share one header contract:
//!
//! | Mode | Header carries | Server work |
//! |------|----------------|-------------|
//! | `asymmetric` | Base64 RSA-OAEP/SHA-256 wrapped key | unwrap with the server private key |
//! | `transport` | Base64 raw key | decode only |
//!
//! The transport mode has no cryptographic protection of its own: the key
//! is only as confidential as the TLS channel carrying it.

use std::sync::Arc;

use rsa::RsaPublicKey;
use serde::{Deserialize, Serialize};

use super::{wrap_with_public_key, AsymmetricKeyProvider, CryptoError, SessionKey};

/// Header carrying the session key.
pub const SESSION_KEY_HEADER: &str = "x-aes-key";

/// How the session key travels to the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyExchangeMode {
    /// Key wrapped under the server RSA public key.
    Asymmetric,
    /// Raw key, confidentiality delegated to the outer transport.
    Transport,
}

impl KeyExchangeMode {
    pub fn as_str(self) -> &'static str {
        match self {
            KeyExchangeMode::Asymmetric => "asymmetric",
            KeyExchangeMode::Transport => "transport",
        }
    }
}

impl std::str::FromStr for KeyExchangeMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "asymmetric" | "rsa" => Ok(KeyExchangeMode::Asymmetric),
            "transport" | "raw" => Ok(KeyExchangeMode::Transport),
            other => Err(format!("unknown key exchange mode '{other}'")),
        }
    }
}

/// Server side of the key exchange: turn a header value into a session key.
///
/// The gates only ever see the resolved [`SessionKey`], never the strategy
/// that produced it.
pub trait KeyExchangeStrategy: Send + Sync {
    fn mode(&self) -> KeyExchangeMode;

    /// Resolve the `X-AES-Key` header value into a session key.
    fn resolve(&self, header_value: &str) -> Result<SessionKey, CryptoError>;

    /// Whether request bodies must arrive RSA-wrapped.
    fn unwraps_request_bodies(&self) -> bool {
        self.mode() == KeyExchangeMode::Asymmetric
    }
}

/// Asymmetric-protected exchange: the header holds an RSA-wrapped key.
pub struct WrappedKeyExchange {
    provider: AsymmetricKeyProvider,
}

impl WrappedKeyExchange {
    pub fn new(provider: AsymmetricKeyProvider) -> Self {
        Self { provider }
    }
}

impl KeyExchangeStrategy for WrappedKeyExchange {
    fn mode(&self) -> KeyExchangeMode {
        KeyExchangeMode::Asymmetric
    }

    fn resolve(&self, header_value: &str) -> Result<SessionKey, CryptoError> {
        let raw = self.provider.unwrap(header_value)?;
        SessionKey::from_bytes(raw)
    }
}

/// Transport-protected exchange: the header holds the raw key.
#[derive(Default)]
pub struct RawKeyExchange;

impl KeyExchangeStrategy for RawKeyExchange {
    fn mode(&self) -> KeyExchangeMode {
        KeyExchangeMode::Transport
    }

    fn resolve(&self, header_value: &str) -> Result<SessionKey, CryptoError> {
        SessionKey::from_base64(header_value)
    }
}

/// Build the server strategy for a deployment mode.
pub fn strategy_for(
    mode: KeyExchangeMode,
    provider: &AsymmetricKeyProvider,
) -> Arc<dyn KeyExchangeStrategy> {
    match mode {
        KeyExchangeMode::Asymmetric => Arc::new(WrappedKeyExchange::new(provider.clone())),
        KeyExchangeMode::Transport => Arc::new(RawKeyExchange),
    }
}

/// Client side of the key exchange: produce the `X-AES-Key` header value.
#[derive(Debug, Clone)]
pub enum ClientKeyExchange {
    Wrapped(RsaPublicKey),
    Raw,
}

impl ClientKeyExchange {
    pub fn mode(&self) -> KeyExchangeMode {
        match self {
            ClientKeyExchange::Wrapped(_) => KeyExchangeMode::Asymmetric,
            ClientKeyExchange::Raw => KeyExchangeMode::Transport,
        }
    }

    /// Encode `key` for the header.
    ///
    /// Wrapped values are randomized by OAEP, so the same key yields a new
    /// header value on every call.
    pub fn header_value(&self, key: &SessionKey) -> Result<String, CryptoError> {
        match self {
            ClientKeyExchange::Wrapped(public_key) => {
                wrap_with_public_key(public_key, key.as_bytes())
            }
            ClientKeyExchange::Raw => Ok(key.to_base64()),
        }
    }
}
