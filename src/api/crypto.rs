// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Public-key handshake endpoint. Always whitelisted.

use axum::{extract::State, Json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::{
    crypto::{CryptoError, KEY_ALGORITHM, KEY_HASH},
    state::AppState,
};

/// Server RSA public key for wrapping session keys.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PublicKeyResponse {
    /// SPKI PEM.
    pub public_key: String,
    /// Always "RSA-OAEP".
    pub algorithm: String,
    /// Always "SHA-256".
    pub hash: String,
    /// Modulus size in bits.
    pub key_size: usize,
    pub created_at: DateTime<Utc>,
}

#[utoipa::path(
    get,
    path = "/crypto/public-key",
    tag = "Crypto",
    responses(
        (status = 200, description = "Server public key", body = PublicKeyResponse),
        (status = 500, description = "Keypair could not be generated")
    )
)]
pub async fn public_key(
    State(state): State<AppState>,
) -> Result<Json<PublicKeyResponse>, CryptoError> {
    // First call may generate the keypair.
    let provider = state.crypto.provider.clone();
    let keypair = tokio::task::spawn_blocking(move || provider.keypair())
        .await
        .map_err(|e| CryptoError::KeyGeneration(e.to_string()))??;

    Ok(Json(PublicKeyResponse {
        public_key: keypair.public_key_pem().to_string(),
        algorithm: KEY_ALGORITHM.to_string(),
        hash: KEY_HASH.to_string(),
        key_size: keypair.key_bits(),
        created_at: keypair.created_at(),
    }))
}
