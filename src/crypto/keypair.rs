// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Server RSA keypair used to unwrap client session keys.
//!
//! ## Lifecycle
//!
//! - Generated on first use (or warmed at startup) and memoized
//! - Read-only afterwards; safe for any number of concurrent readers
//! - `rotate()` replaces it, after which every key wrapped under the old
//!   public key fails to unwrap
//!
//! The private key never leaves this module: only the SPKI PEM public key
//! is exposed.

use std::sync::{Arc, RwLock};

use base64ct::{Base64, Encoding};
use chrono::{DateTime, Utc};
use rsa::{
    pkcs8::{EncodePublicKey, LineEnding},
    traits::PublicKeyParts,
    Oaep, RsaPrivateKey, RsaPublicKey,
};
use sha2::Sha256;

use super::CryptoError;

/// Default RSA modulus size.
pub const DEFAULT_KEY_BITS: usize = 2048;

/// Smallest modulus accepted from configuration.
pub const MIN_KEY_BITS: usize = 1024;

/// Algorithm name advertised on the public-key endpoint.
pub const KEY_ALGORITHM: &str = "RSA-OAEP";

/// OAEP hash advertised on the public-key endpoint.
pub const KEY_HASH: &str = "SHA-256";

/// An RSA keypair owned by the server process.
pub struct KeyPair {
    private_key: RsaPrivateKey,
    public_key: RsaPublicKey,
    public_key_pem: String,
    created_at: DateTime<Utc>,
}

impl KeyPair {
    /// Generate a fresh keypair with public exponent 65537.
    pub fn generate(bits: usize) -> Result<Self, CryptoError> {
        let private_key = RsaPrivateKey::new(&mut rand::rngs::OsRng, bits)
            .map_err(|e| CryptoError::KeyGeneration(e.to_string()))?;
        Self::from_private_key(private_key)
    }

    /// Build a keypair around an existing private key.
    pub fn from_private_key(private_key: RsaPrivateKey) -> Result<Self, CryptoError> {
        let public_key = RsaPublicKey::from(&private_key);
        let public_key_pem = public_key
            .to_public_key_pem(LineEnding::LF)
            .map_err(|e| CryptoError::KeyGeneration(e.to_string()))?;

        Ok(Self {
            private_key,
            public_key,
            public_key_pem,
            created_at: Utc::now(),
        })
    }

    pub fn public_key(&self) -> &RsaPublicKey {
        &self.public_key
    }

    /// SPKI PEM encoding of the public key.
    pub fn public_key_pem(&self) -> &str {
        &self.public_key_pem
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Modulus size in bits.
    pub fn key_bits(&self) -> usize {
        self.public_key.size() * 8
    }

    /// RSA-OAEP/SHA-256 private-key decryption of raw ciphertext bytes.
    pub fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>, CryptoError> {
        self.private_key
            .decrypt(Oaep::new::<Sha256>(), ciphertext)
            .map_err(|_| CryptoError::UnwrapFailure)
    }
}

impl std::fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyPair")
            .field("key_bits", &self.key_bits())
            .field("created_at", &self.created_at)
            .finish_non_exhaustive()
    }
}

/// Process-scoped, lazily initialized holder of the server [`KeyPair`].
///
/// Cloning is cheap and all clones share the same keypair. Held in
/// `AppState` and handed to the gates through axum state.
#[derive(Clone)]
pub struct AsymmetricKeyProvider {
    key_bits: usize,
    keypair: Arc<RwLock<Option<Arc<KeyPair>>>>,
}

impl AsymmetricKeyProvider {
    /// Create a provider that generates `key_bits`-bit keys on first use.
    pub fn new(key_bits: usize) -> Result<Self, CryptoError> {
        if key_bits < MIN_KEY_BITS {
            return Err(CryptoError::KeyGeneration(format!(
                "RSA key size {key_bits} is below the {MIN_KEY_BITS}-bit minimum"
            )));
        }
        Ok(Self {
            key_bits,
            keypair: Arc::new(RwLock::new(None)),
        })
    }

    /// Create a provider around an already generated keypair.
    pub fn from_keypair(keypair: Arc<KeyPair>) -> Self {
        Self {
            key_bits: keypair.key_bits(),
            keypair: Arc::new(RwLock::new(Some(keypair))),
        }
    }

    /// Configured modulus size.
    pub fn key_bits(&self) -> usize {
        self.key_bits
    }

    /// Whether the keypair has been generated yet.
    pub fn is_initialized(&self) -> bool {
        self.keypair
            .read()
            .map(|slot| slot.is_some())
            .unwrap_or(false)
    }

    /// Get the keypair, generating it on first call.
    pub fn keypair(&self) -> Result<Arc<KeyPair>, CryptoError> {
        {
            let slot = self.keypair.read().unwrap_or_else(|e| e.into_inner());
            if let Some(keypair) = &*slot {
                return Ok(keypair.clone());
            }
        }

        // Concurrent first callers wait on the write lock instead of each
        // generating their own key.
        let mut slot = self.keypair.write().unwrap_or_else(|e| e.into_inner());
        if let Some(keypair) = &*slot {
            return Ok(keypair.clone());
        }

        let keypair = Arc::new(KeyPair::generate(self.key_bits)?);
        tracing::info!(
            key_bits = self.key_bits,
            created_at = %keypair.created_at(),
            "Generated RSA keypair"
        );
        *slot = Some(keypair.clone());
        Ok(keypair)
    }

    /// SPKI PEM of the current public key.
    pub fn public_key_pem(&self) -> Result<String, CryptoError> {
        Ok(self.keypair()?.public_key_pem().to_string())
    }

    /// Decode Base64 RSA-OAEP ciphertext and decrypt it with the private key.
    ///
    /// # Errors
    ///
    /// - `InvalidCiphertext` if `ciphertext` is not Base64
    /// - `UnwrapFailure` if OAEP decryption fails for any reason
    pub fn unwrap(&self, ciphertext: &str) -> Result<Vec<u8>, CryptoError> {
        let bytes =
            Base64::decode_vec(ciphertext.trim()).map_err(|_| CryptoError::InvalidCiphertext)?;
        self.keypair()?.decrypt(&bytes)
    }

    /// Replace the keypair. Keys wrapped under the previous one stop working.
    pub fn rotate(&self) -> Result<Arc<KeyPair>, CryptoError> {
        let keypair = Arc::new(KeyPair::generate(self.key_bits)?);
        let mut slot = self.keypair.write().unwrap_or_else(|e| e.into_inner());
        *slot = Some(keypair.clone());
        tracing::info!(
            key_bits = self.key_bits,
            created_at = %keypair.created_at(),
            "Rotated RSA keypair"
        );
        Ok(keypair)
    }
}

impl Default for AsymmetricKeyProvider {
    fn default() -> Self {
        Self {
            key_bits: DEFAULT_KEY_BITS,
            keypair: Arc::new(RwLock::new(None)),
        }
    }
}

/// RSA-OAEP/SHA-256 encrypt `plaintext` under `public_key`, Base64 encoded.
///
/// Client side of the handshake: used to wrap session keys and, in
/// asymmetric-protected deployments, small request bodies.
pub fn wrap_with_public_key(
    public_key: &RsaPublicKey,
    plaintext: &[u8],
) -> Result<String, CryptoError> {
    let ciphertext = public_key
        .encrypt(&mut rand::rngs::OsRng, Oaep::new::<Sha256>(), plaintext)
        .map_err(|e| CryptoError::SealFailure(e.to_string()))?;
    Ok(Base64::encode_string(&ciphertext))
}

/// Parse an SPKI PEM public key as served by `/crypto/public-key`.
pub fn parse_public_key_pem(pem: &str) -> Result<RsaPublicKey, CryptoError> {
    use rsa::pkcs8::DecodePublicKey;

    RsaPublicKey::from_public_key_pem(pem)
        .map_err(|e| CryptoError::InvalidEnvelopeFormat(format!("public key: {e}")))
}
