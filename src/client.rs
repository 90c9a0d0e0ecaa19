// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! HTTP client speaking the sealed JSON transport.
//!
//! Glues the client-side pieces together: the server public key is fetched
//! once and cached, the session key comes from a [`SessionKeyManager`], and
//! sealed responses are opened with [`EnvelopeCodec`] before the caller sees
//! them.
//!
//! ```ignore
//! let client = SecureClient::new("https://codes.example.com", KeyExchangeMode::Asymmetric)?;
//! let codes = client.get_json("/api/v1/codes").await?;
//! client.logout().await;
//! ```

use std::{sync::Arc, time::Duration};

use reqwest::{Client, Method, RequestBuilder, Response};
use rsa::RsaPublicKey;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::RwLock;

use crate::{
    api::crypto::PublicKeyResponse,
    crypto::{
        parse_public_key_pem, wrap_with_public_key, ClientKeyExchange, CryptoError,
        EncryptedRequest, EnvelopeCodec, KeyExchangeMode, KeySize, SessionKey,
        SessionKeyManager, SESSION_KEY_HEADER,
    },
};

const PUBLIC_KEY_PATH: &str = "/crypto/public-key";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error(transparent)]
    Crypto(#[from] CryptoError),

    #[error("server returned {status}: {body}")]
    Status { status: u16, body: Value },

    #[error("server response was invalid: {0}")]
    InvalidResponse(String),
}

/// Wrapped header cached for the session key it was built from.
struct CachedHeader {
    key: SessionKey,
    value: String,
}

#[derive(Clone)]
pub struct SecureClient {
    base_url: String,
    mode: KeyExchangeMode,
    http: Client,
    sessions: SessionKeyManager,
    public_key: Arc<RwLock<Option<RsaPublicKey>>>,
    header: Arc<RwLock<Option<CachedHeader>>>,
}

impl SecureClient {
    pub fn new(base_url: impl Into<String>, mode: KeyExchangeMode) -> Result<Self, ClientError> {
        Self::with_key_size(base_url, mode, KeySize::default())
    }

    pub fn with_key_size(
        base_url: impl Into<String>,
        mode: KeyExchangeMode,
        key_size: KeySize,
    ) -> Result<Self, ClientError> {
        let http = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            mode,
            http,
            sessions: SessionKeyManager::new(key_size),
            public_key: Arc::new(RwLock::new(None)),
            header: Arc::new(RwLock::new(None)),
        })
    }

    pub fn mode(&self) -> KeyExchangeMode {
        self.mode
    }

    pub fn sessions(&self) -> &SessionKeyManager {
        &self.sessions
    }

    /// GET `path` and return the opened JSON body.
    pub async fn get_json(&self, path: &str) -> Result<Value, ClientError> {
        let key = self.sessions.get_key().await;
        let request = self.request(Method::GET, path, &key).await?;
        decode(request.send().await?, &key).await
    }

    /// POST `body` to `path` and return the opened JSON body.
    ///
    /// In asymmetric mode the body is RSA-wrapped, which limits it to what
    /// one OAEP block holds (190 bytes under a 2048-bit key).
    pub async fn post_json<T: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &T,
    ) -> Result<Value, ClientError> {
        let key = self.sessions.get_key().await;
        let request = self.request(Method::POST, path, &key).await?;

        let request = match self.mode {
            KeyExchangeMode::Asymmetric => {
                let plain = serde_json::to_vec(body)
                    .map_err(|e| CryptoError::SealFailure(e.to_string()))?;
                let public_key = self.public_key().await?;
                let data = wrap_with_public_key(&public_key, &plain)?;
                request.json(&EncryptedRequest {
                    encrypted: true,
                    data,
                })
            }
            KeyExchangeMode::Transport => request.json(body),
        };

        decode(request.send().await?, &key).await
    }

    /// Drop the session key and any header derived from it.
    pub async fn logout(&self) {
        self.sessions.clear().await;
        self.header.write().await.take();
    }

    /// Switch to a fresh session key.
    pub async fn rotate_key(&self) -> SessionKey {
        self.header.write().await.take();
        self.sessions.rotate().await
    }

    /// Forget the cached server public key, e.g. after a server-side
    /// rotation. The next call fetches it again.
    pub async fn forget_public_key(&self) {
        self.public_key.write().await.take();
        self.header.write().await.take();
    }

    /// Server public key, fetched on first use.
    pub async fn public_key(&self) -> Result<RsaPublicKey, ClientError> {
        if let Some(key) = &*self.public_key.read().await {
            return Ok(key.clone());
        }

        let response = self
            .http
            .get(format!("{}{PUBLIC_KEY_PATH}", self.base_url))
            .send()
            .await?
            .error_for_status()?;
        let body: PublicKeyResponse = response.json().await?;
        let key = parse_public_key_pem(&body.public_key)?;

        tracing::debug!(key_size = body.key_size, "Fetched server public key");
        *self.public_key.write().await = Some(key.clone());
        Ok(key)
    }

    async fn request(
        &self,
        method: Method,
        path: &str,
        key: &SessionKey,
    ) -> Result<RequestBuilder, ClientError> {
        let header = self.key_header(key).await?;
        Ok(self
            .http
            .request(method, format!("{}{path}", self.base_url))
            .header(SESSION_KEY_HEADER, header))
    }

    async fn key_header(&self, key: &SessionKey) -> Result<String, ClientError> {
        if let Some(cached) = &*self.header.read().await {
            if cached.key == *key {
                return Ok(cached.value.clone());
            }
        }

        let exchange = match self.mode {
            KeyExchangeMode::Asymmetric => ClientKeyExchange::Wrapped(self.public_key().await?),
            KeyExchangeMode::Transport => ClientKeyExchange::Raw,
        };
        let value = exchange.header_value(key)?;

        *self.header.write().await = Some(CachedHeader {
            key: key.clone(),
            value: value.clone(),
        });
        Ok(value)
    }
}

async fn decode(response: Response, key: &SessionKey) -> Result<Value, ClientError> {
    let status = response.status();
    let bytes = response.bytes().await?;
    let body: Value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes)
            .map_err(|e| ClientError::InvalidResponse(format!("body is not JSON: {e}")))?
    };

    let body = EnvelopeCodec::open(body, key)?;
    if !status.is_success() {
        return Err(ClientError::Status {
            status: status.as_u16(),
            body,
        });
    }
    Ok(body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        api::router,
        config::EncryptionMode,
        crypto::test_support::shared_provider,
        gate::RoutePolicy,
        state::{AppState, CryptoContext},
        store::InMemoryCodeStore,
    };
    use serde_json::json;
    use tokio::net::TcpListener;

    async fn spawn_server(mode: KeyExchangeMode) -> String {
        let crypto = CryptoContext::new(
            shared_provider(),
            mode,
            RoutePolicy::new(EncryptionMode::Mandatory),
        );
        let app = router(AppState::new(InMemoryCodeStore::new(), crypto));

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    #[tokio::test]
    async fn asymmetric_client_round_trip() {
        let base_url = spawn_server(KeyExchangeMode::Asymmetric).await;
        let client = SecureClient::new(base_url, KeyExchangeMode::Asymmetric).unwrap();

        let created = client
            .post_json("/api/v1/codes", &json!({"code": "CLIENT10", "title": "Client"}))
            .await
            .unwrap();
        assert_eq!(created["success"], true);
        let code_id = created["data"]["id"].clone();

        let voted = client
            .post_json("/api/v1/votes", &json!({"codeId": code_id, "direction": "down"}))
            .await
            .unwrap();
        assert_eq!(voted["data"]["downvotes"], 1);

        let listed = client.get_json("/api/v1/codes").await.unwrap();
        assert_eq!(listed["data"][0]["code"], "CLIENT10");
        assert!(client.sessions().has_key().await);
    }

    #[tokio::test]
    async fn transport_client_round_trip() {
        let base_url = spawn_server(KeyExchangeMode::Transport).await;
        let client =
            SecureClient::with_key_size(base_url, KeyExchangeMode::Transport, KeySize::Aes128)
                .unwrap();

        let listed = client.get_json("/api/v1/codes").await.unwrap();
        assert_eq!(listed, json!({"success": true, "data": []}));
    }

    #[tokio::test]
    async fn server_errors_are_opened_and_reported() {
        let base_url = spawn_server(KeyExchangeMode::Transport).await;
        let client = SecureClient::new(base_url, KeyExchangeMode::Transport).unwrap();

        let err = client
            .post_json("/api/v1/favorites", &json!({"codeId": uuid::Uuid::new_v4()}))
            .await
            .unwrap_err();
        match err {
            ClientError::Status { status, body } => {
                assert_eq!(status, 404);
                assert_eq!(body, json!({"error": "Code not found"}));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn rotate_and_logout_replace_the_session_key() {
        let base_url = spawn_server(KeyExchangeMode::Asymmetric).await;
        let client = SecureClient::new(base_url, KeyExchangeMode::Asymmetric).unwrap();

        client.get_json("/api/v1/codes").await.unwrap();
        let first = client.sessions().get_key().await;

        let rotated = client.rotate_key().await;
        assert_ne!(first, rotated);
        client.get_json("/api/v1/codes").await.unwrap();

        client.logout().await;
        assert!(!client.sessions().has_key().await);
        client.get_json("/api/v1/codes").await.unwrap();
        assert_ne!(client.sessions().get_key().await, rotated);
    }
}
