// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Transport encryption errors.
//!
//! Every variant is terminal for the request it occurred in. The response body
//! never says which check failed: all decryption-class failures share one
//! message and one error code so the endpoint cannot be used as a padding or
//! tag oracle. Details belong in server-side logs only.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Client-visible message for a missing key or an unencrypted body.
pub const ENCRYPTION_REQUIRED_MESSAGE: &str = "Encryption Required";

/// Client-visible message for every decryption-class failure.
pub const DECRYPTION_FAILED_MESSAGE: &str = "Failed to decrypt request data";

/// Client-visible message when an outgoing response cannot be sealed.
pub const ENCRYPTION_FAILED_MESSAGE: &str = "Encryption failed";

/// Error type for the hybrid encryption transport.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CryptoError {
    /// `X-AES-Key` absent on a route that requires it.
    #[error("encryption key header is missing")]
    MissingKey,
    /// Body or envelope does not have the expected JSON shape.
    #[error("invalid envelope format: {0}")]
    InvalidEnvelopeFormat(String),
    /// Symmetric key is not 16, 24 or 32 bytes.
    #[error("invalid key length: {0} bytes")]
    InvalidKeyLength(usize),
    /// Input that should be Base64 is not.
    #[error("ciphertext is not valid base64")]
    InvalidCiphertext,
    /// RSA-OAEP decryption failed.
    #[error("key unwrap failed")]
    UnwrapFailure,
    /// AES-GCM tag did not verify.
    #[error("authentication failed")]
    AuthenticationFailure,
    /// Sealing an outgoing payload failed.
    #[error("failed to seal payload: {0}")]
    SealFailure(String),
    /// RSA keypair could not be generated.
    #[error("key generation failed: {0}")]
    KeyGeneration(String),
}

#[derive(Serialize)]
struct CryptoErrorBody {
    error: String,
    error_code: String,
}

impl CryptoError {
    /// Stable, generic error code exposed to clients.
    pub fn error_code(&self) -> &'static str {
        match self {
            CryptoError::MissingKey | CryptoError::InvalidEnvelopeFormat(_) => {
                "encryption_required"
            }
            CryptoError::InvalidKeyLength(_)
            | CryptoError::InvalidCiphertext
            | CryptoError::UnwrapFailure
            | CryptoError::AuthenticationFailure => "decryption_failed",
            CryptoError::SealFailure(_) | CryptoError::KeyGeneration(_) => "encryption_failed",
        }
    }

    /// Generic message exposed to clients. Never includes variant details.
    pub fn public_message(&self) -> &'static str {
        match self.error_code() {
            "encryption_required" => ENCRYPTION_REQUIRED_MESSAGE,
            "decryption_failed" => DECRYPTION_FAILED_MESSAGE,
            _ => ENCRYPTION_FAILED_MESSAGE,
        }
    }

    /// HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            CryptoError::SealFailure(_) | CryptoError::KeyGeneration(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            _ => StatusCode::BAD_REQUEST,
        }
    }

    /// True for failures that must not be told apart, in responses or in logs.
    pub fn is_decryption_failure(&self) -> bool {
        self.error_code() == "decryption_failed"
    }
}

impl IntoResponse for CryptoError {
    fn into_response(self) -> Response {
        if self.is_decryption_failure() {
            tracing::warn!("Rejected request: decryption failed");
        } else {
            tracing::warn!(error = %self, "Rejected request: transport encryption error");
        }

        let body = Json(CryptoErrorBody {
            error: self.public_message().to_string(),
            error_code: self.error_code().to_string(),
        });
        (self.status_code(), body).into_response()
    }
}
