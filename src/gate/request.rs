// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Request unwrap gate (asymmetric-protected deployments only).
//!
//! For POST/PUT/PATCH on non-exempt routes the body must be
//! `{"encrypted": true, "data": "<Base64 RSA-OAEP ciphertext>"}`. The gate
//! decrypts it and hands the plain JSON to the handler, which never knows
//! the body was wrapped.
//!
//! | Body | Mandatory route | Optional or unwrap-exempt route |
//! |------|-----------------|---------------------------------|
//! | empty | passes through | passes through |
//! | envelope | unwrapped | unwrapped |
//! | anything else | 400 "Encryption Required" | passes through |
//! | over `MAX_REQUEST_BODY_BYTES` | 413 | 413 |

use axum::{
    body::{to_bytes, Body, Bytes},
    extract::{Request, State},
    http::{
        header::{CONTENT_LENGTH, CONTENT_TYPE},
        HeaderValue, StatusCode,
    },
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde_json::Value;

use crate::{
    crypto::{AsymmetricKeyProvider, CryptoError, EncryptedRequest},
    error::ApiError,
    state::AppState,
};

/// Largest request body the gate will buffer.
pub const MAX_REQUEST_BODY_BYTES: usize = 64 * 1024;

/// Middleware: unwrap RSA-wrapped request bodies.
pub async fn request_unwrap_gate(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let crypto = &state.crypto;
    if !crypto.exchange.unwraps_request_bodies()
        || !crypto
            .policy
            .inspects_body(request.method(), request.uri().path())
    {
        return next.run(request).await;
    }

    let rejects_plain = crypto.policy.rejects_plain_body(request.uri().path());
    let (mut parts, body) = request.into_parts();

    let bytes = match to_bytes(body, MAX_REQUEST_BODY_BYTES).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!(error = %e, limit = MAX_REQUEST_BODY_BYTES, "Rejected request body");
            return ApiError::new(StatusCode::PAYLOAD_TOO_LARGE, "Request body too large")
                .into_response();
        }
    };

    if bytes.iter().all(u8::is_ascii_whitespace) {
        return next.run(Request::from_parts(parts, Body::from(bytes))).await;
    }

    // RSA unwrap (and first-use key generation) runs on the blocking pool.
    let provider = crypto.provider.clone();
    let body = bytes.clone();
    let unwrapped = tokio::task::spawn_blocking(move || unwrap_body(&provider, &body))
        .await
        .unwrap_or_else(|e| Err(CryptoError::KeyGeneration(e.to_string())));

    match unwrapped {
        Ok(Some(plain)) => {
            parts
                .headers
                .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
            parts.headers.insert(CONTENT_LENGTH, HeaderValue::from(plain.len()));
            next.run(Request::from_parts(parts, Body::from(plain))).await
        }
        Ok(None) if !rejects_plain => {
            next.run(Request::from_parts(parts, Body::from(bytes))).await
        }
        Ok(None) => CryptoError::InvalidEnvelopeFormat("plain request body".to_string())
            .into_response(),
        Err(e) => e.into_response(),
    }
}

/// Unwrap a request body.
///
/// Returns `Ok(None)` when the body is not an envelope attempt at all (not
/// JSON, or JSON without an `encrypted` field). A body that claims to be an
/// envelope but is malformed is an error either way.
pub fn unwrap_body(
    provider: &AsymmetricKeyProvider,
    body: &[u8],
) -> Result<Option<Vec<u8>>, CryptoError> {
    let Ok(value) = serde_json::from_slice::<Value>(body) else {
        return Ok(None);
    };
    if value.get("encrypted").is_none() {
        return Ok(None);
    }

    let envelope = EncryptedRequest::from_value(value)?;
    let plain = provider.unwrap(&envelope.data)?;

    // A payload that decrypts but is not JSON is reported like any other
    // decryption failure.
    serde_json::from_slice::<Value>(&plain).map_err(|_| CryptoError::UnwrapFailure)?;
    Ok(Some(plain))
}

/// Body bytes for a wrapped request, as a client would send them.
pub fn wrapped_body(envelope: &EncryptedRequest) -> Result<Bytes, CryptoError> {
    serde_json::to_vec(envelope)
        .map(Bytes::from)
        .map_err(|e| CryptoError::SealFailure(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::{test_support::shared_provider, wrap_with_public_key};
    use serde_json::json;

    fn envelope_for(provider: &AsymmetricKeyProvider, value: &Value) -> Vec<u8> {
        let public_key = provider.keypair().unwrap().public_key().clone();
        let data = wrap_with_public_key(&public_key, &serde_json::to_vec(value).unwrap()).unwrap();
        wrapped_body(&EncryptedRequest {
            encrypted: true,
            data,
        })
        .unwrap()
        .to_vec()
    }

    #[test]
    fn unwraps_well_formed_envelope() {
        let provider = shared_provider();
        let value = json!({"code": "SAVE10", "title": "10% off"});
        let body = envelope_for(&provider, &value);

        let plain = unwrap_body(&provider, &body).unwrap().unwrap();
        assert_eq!(serde_json::from_slice::<Value>(&plain).unwrap(), value);
    }

    #[test]
    fn plain_json_is_not_an_envelope_attempt() {
        let provider = shared_provider();
        assert_eq!(unwrap_body(&provider, br#"{"code":"SAVE10"}"#), Ok(None));
        assert_eq!(unwrap_body(&provider, b"not json"), Ok(None));
    }

    #[test]
    fn malformed_envelope_is_rejected() {
        let provider = shared_provider();
        assert!(matches!(
            unwrap_body(&provider, br#"{"encrypted":true,"data":42}"#),
            Err(CryptoError::InvalidEnvelopeFormat(_))
        ));
        assert!(matches!(
            unwrap_body(&provider, br#"{"encrypted":false,"data":"abc="}"#),
            Err(CryptoError::InvalidEnvelopeFormat(_))
        ));
        assert_eq!(
            unwrap_body(&provider, br#"{"encrypted":true,"data":"@@@"}"#),
            Err(CryptoError::InvalidCiphertext)
        );
    }

    #[test]
    fn decrypted_non_json_is_a_decryption_failure() {
        let provider = shared_provider();
        let public_key = provider.keypair().unwrap().public_key().clone();
        let data = wrap_with_public_key(&public_key, b"plain text, not json").unwrap();
        let body = serde_json::to_vec(&json!({"encrypted": true, "data": data})).unwrap();

        assert_eq!(unwrap_body(&provider, &body), Err(CryptoError::UnwrapFailure));
    }
}
