// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! JSON envelopes for sealed payloads.
//!
//! Response (AES-GCM, all fields Base64):
//! ```json
//! {"encrypted": true, "data": "...", "iv": "<12 bytes>", "authTag": "<16 bytes>"}
//! ```
//!
//! Request (RSA-OAEP, asymmetric-protected deployments only):
//! ```json
//! {"encrypted": true, "data": "..."}
//! ```
//!
//! The envelope format is identical whichever key exchange produced the key.

use base64ct::{Base64, Encoding};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;

use super::{CryptoError, SealedEnvelope, SessionKey, SymmetricCipher, NONCE_LEN, TAG_LEN};

/// Sealed response body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct EncryptedResponse {
    /// Always `true`.
    pub encrypted: bool,
    /// Base64 AES-GCM ciphertext (tag detached).
    pub data: String,
    /// Base64 96-bit nonce.
    pub iv: String,
    /// Base64 128-bit authentication tag.
    pub auth_tag: String,
}

/// RSA-wrapped request body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct EncryptedRequest {
    /// Must be `true`.
    pub encrypted: bool,
    /// Base64 RSA-OAEP/SHA-256 ciphertext of the JSON body.
    pub data: String,
}

impl EncryptedRequest {
    /// Parse a request body, requiring the `{encrypted: true, data}` shape.
    pub fn from_value(value: Value) -> Result<Self, CryptoError> {
        let request: EncryptedRequest = serde_json::from_value(value)
            .map_err(|e| CryptoError::InvalidEnvelopeFormat(e.to_string()))?;
        if !request.encrypted {
            return Err(CryptoError::InvalidEnvelopeFormat(
                "encrypted flag is false".to_string(),
            ));
        }
        Ok(request)
    }
}

impl EncryptedResponse {
    pub fn from_sealed(sealed: &SealedEnvelope) -> Self {
        Self {
            encrypted: true,
            data: Base64::encode_string(&sealed.ciphertext),
            iv: Base64::encode_string(&sealed.nonce),
            auth_tag: Base64::encode_string(&sealed.tag),
        }
    }

    /// Decode the Base64 fields. A nonce or tag of the wrong size can never
    /// authenticate, so it is reported as an authentication failure.
    pub fn to_sealed(&self) -> Result<SealedEnvelope, CryptoError> {
        let ciphertext = decode(&self.data)?;
        let nonce: [u8; NONCE_LEN] = decode(&self.iv)?
            .try_into()
            .map_err(|_| CryptoError::AuthenticationFailure)?;
        let tag: [u8; TAG_LEN] = decode(&self.auth_tag)?
            .try_into()
            .map_err(|_| CryptoError::AuthenticationFailure)?;

        Ok(SealedEnvelope {
            ciphertext,
            nonce,
            tag,
        })
    }
}

fn decode(field: &str) -> Result<Vec<u8>, CryptoError> {
    Base64::decode_vec(field).map_err(|_| CryptoError::InvalidCiphertext)
}

/// Seal a JSON value under `key`.
///
/// This is the typed stage the response gate runs on every handler result
/// that needs protecting.
pub fn seal_json(value: &Value, key: &SessionKey) -> Result<EncryptedResponse, CryptoError> {
    let plaintext =
        serde_json::to_vec(value).map_err(|e| CryptoError::SealFailure(e.to_string()))?;
    let sealed = SymmetricCipher::seal_with_key(&plaintext, key)?;
    Ok(EncryptedResponse::from_sealed(&sealed))
}

/// Detects and opens sealed response bodies.
pub struct EnvelopeCodec;

impl EnvelopeCodec {
    /// Whether `body` has the sealed response shape.
    pub fn is_sealed(body: &Value) -> bool {
        let Some(object) = body.as_object() else {
            return false;
        };
        object.get("encrypted").and_then(Value::as_bool) == Some(true)
            && ["data", "iv", "authTag"]
                .iter()
                .all(|field| object.get(*field).is_some_and(Value::is_string))
    }

    /// Open `body` if it is sealed, otherwise return it unchanged.
    ///
    /// # Errors
    ///
    /// A sealed body that fails to open is an error. Ciphertext is never
    /// handed back in place of plaintext.
    pub fn open(body: Value, key: &SessionKey) -> Result<Value, CryptoError> {
        if !Self::is_sealed(&body) {
            return Ok(body);
        }

        let envelope: EncryptedResponse = serde_json::from_value(body)
            .map_err(|e| CryptoError::InvalidEnvelopeFormat(e.to_string()))?;
        let sealed = envelope.to_sealed()?;
        let plaintext = SymmetricCipher::open_envelope(&sealed, key)?;

        serde_json::from_slice(&plaintext).map_err(|_| {
            CryptoError::InvalidEnvelopeFormat("sealed payload is not JSON".to_string())
        })
    }

    /// Seal `value` and return the envelope as JSON.
    pub fn seal(value: &Value, key: &SessionKey) -> Result<Value, CryptoError> {
        let envelope = seal_json(value, key)?;
        serde_json::to_value(envelope).map_err(|e| CryptoError::SealFailure(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::KeySize;
    use serde_json::json;

    #[test]
    fn sealed_response_has_wire_shape() {
        let key = SessionKey::generate(KeySize::Aes256);
        let sealed = EnvelopeCodec::seal(&json!({"success": true}), &key).unwrap();

        assert_eq!(sealed["encrypted"], true);
        assert!(EnvelopeCodec::is_sealed(&sealed));

        let iv = Base64::decode_vec(sealed["iv"].as_str().unwrap()).unwrap();
        let tag = Base64::decode_vec(sealed["authTag"].as_str().unwrap()).unwrap();
        assert_eq!(iv.len(), 12);
        assert_eq!(tag.len(), 16);
    }

    #[test]
    fn open_recovers_original_value() {
        let key = SessionKey::generate(KeySize::Aes128);
        let value = json!({"success": true, "data": [1, 2, 3], "nested": {"k": null}});
        let sealed = EnvelopeCodec::seal(&value, &key).unwrap();

        assert_eq!(EnvelopeCodec::open(sealed, &key).unwrap(), value);
    }

    #[test]
    fn plain_bodies_pass_through() {
        let key = SessionKey::generate(KeySize::Aes256);
        for body in [
            json!({"success": true}),
            json!({"encrypted": false, "data": "x", "iv": "y", "authTag": "z"}),
            json!({"encrypted": true, "data": "only data"}),
            json!([1, 2, 3]),
            json!("text"),
        ] {
            assert!(!EnvelopeCodec::is_sealed(&body));
            assert_eq!(EnvelopeCodec::open(body.clone(), &key).unwrap(), body);
        }
    }

    #[test]
    fn open_with_wrong_key_is_an_error_not_ciphertext() {
        let key = SessionKey::generate(KeySize::Aes256);
        let other = SessionKey::generate(KeySize::Aes256);
        let sealed = EnvelopeCodec::seal(&json!({"secret": 1}), &key).unwrap();

        assert_eq!(
            EnvelopeCodec::open(sealed, &other),
            Err(CryptoError::AuthenticationFailure)
        );
    }

    #[test]
    fn truncated_iv_fails_closed() {
        let key = SessionKey::generate(KeySize::Aes256);
        let mut sealed = EnvelopeCodec::seal(&json!({"a": 1}), &key).unwrap();
        sealed["iv"] = json!(Base64::encode_string(&[0u8; 8]));

        assert_eq!(
            EnvelopeCodec::open(sealed, &key),
            Err(CryptoError::AuthenticationFailure)
        );
    }

    #[test]
    fn encrypted_request_requires_flag_and_data() {
        let ok = EncryptedRequest::from_value(json!({"encrypted": true, "data": "abc="})).unwrap();
        assert_eq!(ok.data, "abc=");

        assert!(matches!(
            EncryptedRequest::from_value(json!({"encrypted": false, "data": "abc="})),
            Err(CryptoError::InvalidEnvelopeFormat(_))
        ));
        assert!(matches!(
            EncryptedRequest::from_value(json!({"title": "plain"})),
            Err(CryptoError::InvalidEnvelopeFormat(_))
        ));
    }
}
