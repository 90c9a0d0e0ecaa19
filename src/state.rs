// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::sync::Arc;

use crate::{
    config::{EncryptionMode, ServerConfig},
    crypto::{strategy_for, AsymmetricKeyProvider, CryptoError, KeyExchangeMode, KeyExchangeStrategy},
    gate::RoutePolicy,
    store::{CodeStore, InMemoryCodeStore},
};

/// Everything the encryption gates need for one deployment.
#[derive(Clone)]
pub struct CryptoContext {
    pub provider: AsymmetricKeyProvider,
    pub exchange: Arc<dyn KeyExchangeStrategy>,
    pub policy: Arc<RoutePolicy>,
}

impl CryptoContext {
    pub fn new(
        provider: AsymmetricKeyProvider,
        mode: KeyExchangeMode,
        policy: RoutePolicy,
    ) -> Self {
        let exchange = strategy_for(mode, &provider);
        Self {
            provider,
            exchange,
            policy: Arc::new(policy),
        }
    }

    pub fn from_config(config: &ServerConfig) -> Result<Self, CryptoError> {
        let provider = AsymmetricKeyProvider::new(config.rsa_key_bits)?;
        Ok(Self::new(
            provider,
            config.key_exchange,
            RoutePolicy::from_config(config),
        ))
    }

    pub fn mode(&self) -> KeyExchangeMode {
        self.exchange.mode()
    }
}

impl Default for CryptoContext {
    fn default() -> Self {
        Self::new(
            AsymmetricKeyProvider::default(),
            KeyExchangeMode::Asymmetric,
            RoutePolicy::new(EncryptionMode::Mandatory),
        )
    }
}

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn CodeStore>,
    pub crypto: CryptoContext,
}

impl AppState {
    pub fn new(store: impl CodeStore + 'static, crypto: CryptoContext) -> Self {
        Self {
            store: Arc::new(store),
            crypto,
        }
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new(InMemoryCodeStore::new(), CryptoContext::default())
    }
}
