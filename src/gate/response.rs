// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Response wrap gate.
//!
//! Wraps every non-whitelisted route. The key is resolved from `X-AES-Key`
//! *before* the handler runs, so a bad or missing key never reaches
//! business logic. After the handler, any JSON body is replaced by
//! `{"encrypted": true, "data", "iv", "authTag"}` with the original status
//! preserved.

use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    extract::{Request, State},
    http::{
        header::{CONTENT_LENGTH, CONTENT_TYPE},
        HeaderMap, HeaderValue, StatusCode,
    },
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde_json::Value;

use super::RouteDecision;
use crate::{
    crypto::{seal_json, CryptoError, KeyExchangeStrategy, SessionKey, SESSION_KEY_HEADER},
    error::ApiError,
    state::AppState,
};

/// Middleware: resolve the session key and seal the handler's JSON output.
pub async fn response_wrap_gate(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let crypto = &state.crypto;
    let decision = crypto.policy.decide(request.uri().path());
    if decision == RouteDecision::Exempt {
        return next.run(request).await;
    }

    let header = request.headers().get(SESSION_KEY_HEADER).cloned();
    let key = match resolve_off_runtime(crypto.exchange.clone(), header).await {
        Ok(Some(key)) => key,
        Ok(None) if decision == RouteDecision::Optional => return next.run(request).await,
        Ok(None) => return CryptoError::MissingKey.into_response(),
        Err(e) => return e.into_response(),
    };

    let response = next.run(request).await;
    seal_response(response, &key).await
}

/// Read and resolve `X-AES-Key`. An absent or blank header is `Ok(None)`.
pub fn resolve_request_key(
    headers: &HeaderMap,
    exchange: &dyn KeyExchangeStrategy,
) -> Result<Option<SessionKey>, CryptoError> {
    match headers.get(SESSION_KEY_HEADER) {
        Some(value) => resolve_header_value(value, exchange),
        None => Ok(None),
    }
}

/// Resolve one `X-AES-Key` value. A blank value is `Ok(None)`.
pub fn resolve_header_value(
    value: &HeaderValue,
    exchange: &dyn KeyExchangeStrategy,
) -> Result<Option<SessionKey>, CryptoError> {
    let value = value.to_str().map_err(|_| CryptoError::InvalidCiphertext)?;
    if value.trim().is_empty() {
        return Ok(None);
    }
    exchange.resolve(value).map(Some)
}

/// RSA unwrap (and first-use key generation) runs on the blocking pool.
async fn resolve_off_runtime(
    exchange: Arc<dyn KeyExchangeStrategy>,
    header: Option<HeaderValue>,
) -> Result<Option<SessionKey>, CryptoError> {
    let Some(value) = header else {
        return Ok(None);
    };
    tokio::task::spawn_blocking(move || resolve_header_value(&value, exchange.as_ref()))
        .await
        .unwrap_or_else(|e| Err(CryptoError::KeyGeneration(e.to_string())))
}

/// Seal a handler response under `key`.
///
/// Successful non-JSON responses pass through untouched. Non-JSON error
/// responses (extractor rejections and the like) are replaced by a generic
/// `{"error"}` body before sealing, so their text never reaches the client.
/// Any sealing failure produces the fixed generic 500 body; the cause only
/// reaches the server log.
pub async fn seal_response(response: Response, key: &SessionKey) -> Response {
    let response = if is_json(response.headers()) {
        response
    } else if is_error(response.status()) {
        opaque_error(response).await
    } else {
        return response;
    };

    let (mut parts, body) = response.into_parts();
    let sealed = match to_bytes(body, usize::MAX).await {
        Ok(bytes) => seal_body(&bytes, key),
        Err(e) => Err(CryptoError::SealFailure(format!("unreadable response body: {e}"))),
    };

    match sealed {
        Ok(body) => {
            parts
                .headers
                .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
            parts.headers.remove(CONTENT_LENGTH);
            Response::from_parts(parts, Body::from(body))
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to seal response");
            CryptoError::SealFailure(String::new()).into_response()
        }
    }
}

/// Swap a non-JSON error body for the status reason phrase.
async fn opaque_error(response: Response) -> Response {
    let status = response.status();
    match to_bytes(response.into_body(), usize::MAX).await {
        Ok(bytes) => tracing::warn!(
            %status,
            detail = %String::from_utf8_lossy(&bytes),
            "Replaced non-JSON error response"
        ),
        Err(e) => tracing::warn!(%status, error = %e, "Unreadable error response"),
    }
    ApiError::new(status, status.canonical_reason().unwrap_or("Request failed")).into_response()
}

fn seal_body(bytes: &[u8], key: &SessionKey) -> Result<Vec<u8>, CryptoError> {
    let value: Value = serde_json::from_slice(bytes)
        .map_err(|e| CryptoError::SealFailure(format!("handler emitted invalid JSON: {e}")))?;
    let envelope = seal_json(&value, key)?;
    serde_json::to_vec(&envelope).map_err(|e| CryptoError::SealFailure(e.to_string()))
}

fn is_json(headers: &HeaderMap) -> bool {
    headers
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.starts_with("application/json"))
}

fn is_error(status: StatusCode) -> bool {
    status.is_client_error() || status.is_server_error()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::{EnvelopeCodec, KeySize, RawKeyExchange};
    use axum::Json;
    use serde_json::json;

    #[test]
    fn missing_or_blank_header_resolves_to_none() {
        let exchange = RawKeyExchange;
        let mut headers = HeaderMap::new();
        assert_eq!(resolve_request_key(&headers, &exchange), Ok(None));

        headers.insert(SESSION_KEY_HEADER, HeaderValue::from_static("  "));
        assert_eq!(resolve_request_key(&headers, &exchange), Ok(None));
    }

    #[test]
    fn header_is_resolved_through_strategy() {
        let key = SessionKey::generate(KeySize::Aes256);
        let mut headers = HeaderMap::new();
        headers.insert(
            SESSION_KEY_HEADER,
            HeaderValue::from_str(&key.to_base64()).unwrap(),
        );
        assert_eq!(resolve_request_key(&headers, &RawKeyExchange), Ok(Some(key)));
    }

    #[test]
    fn undecodable_header_is_an_error() {
        let mut headers = HeaderMap::new();
        headers.insert(SESSION_KEY_HEADER, HeaderValue::from_static("c2hvcnQ="));
        assert_eq!(
            resolve_request_key(&headers, &RawKeyExchange),
            Err(CryptoError::InvalidKeyLength(5))
        );
    }

    #[tokio::test]
    async fn json_response_is_sealed_with_status_preserved() {
        let key = SessionKey::generate(KeySize::Aes128);
        let original = json!({"success": false, "error": "Code not found"});
        let response = (StatusCode::NOT_FOUND, Json(original.clone())).into_response();

        let sealed = seal_response(response, &key).await;
        assert_eq!(sealed.status(), StatusCode::NOT_FOUND);

        let bytes = to_bytes(sealed.into_body(), usize::MAX).await.unwrap();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert!(EnvelopeCodec::is_sealed(&body));
        assert_eq!(EnvelopeCodec::open(body, &key).unwrap(), original);
    }

    #[tokio::test]
    async fn non_json_response_passes_through() {
        let key = SessionKey::generate(KeySize::Aes256);
        let response = "plain text".into_response();

        let passed = seal_response(response, &key).await;
        let bytes = to_bytes(passed.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&bytes[..], b"plain text");
    }

    #[tokio::test]
    async fn non_json_error_is_replaced_and_sealed() {
        let key = SessionKey::generate(KeySize::Aes256);
        let response = (
            StatusCode::UNPROCESSABLE_ENTITY,
            "missing field `title` at line 1 column 21",
        )
            .into_response();

        let sealed = seal_response(response, &key).await;
        assert_eq!(sealed.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let bytes = to_bytes(sealed.into_body(), usize::MAX).await.unwrap();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert!(EnvelopeCodec::is_sealed(&body));
        assert_eq!(
            EnvelopeCodec::open(body, &key).unwrap(),
            json!({"error": "Unprocessable Entity"})
        );
    }

    #[tokio::test]
    async fn blank_header_value_resolves_to_none() {
        let value = HeaderValue::from_static("");
        assert_eq!(resolve_header_value(&value, &RawKeyExchange), Ok(None));
        assert_eq!(
            resolve_off_runtime(Arc::new(RawKeyExchange), Some(value)).await,
            Ok(None)
        );
    }

    #[tokio::test]
    async fn invalid_json_yields_generic_500() {
        let key = SessionKey::generate(KeySize::Aes256);
        let response = Response::builder()
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from("{not json"))
            .unwrap();

        let failed = seal_response(response, &key).await;
        assert_eq!(failed.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let bytes = to_bytes(failed.into_body(), usize::MAX).await.unwrap();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body, json!({"error": "Encryption failed", "error_code": "encryption_failed"}));
    }
}
