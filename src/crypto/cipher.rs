// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! AES-GCM sealing of JSON payloads.
//!
//! **Wire format** (Web Crypto API compatible, tag detached):
//! ```text
//! ciphertext (variable) | nonce (12 bytes) | tag (16 bytes)
//! ```
//!
//! - Key: 16, 24 or 32 bytes selects AES-128/192/256-GCM
//! - Nonce: 96 bits from the OS CSPRNG, fresh for every seal
//! - No Additional Authenticated Data
//!
//! A nonce must never repeat under the same key. Since keys are per-session
//! and nonces are random, the birthday bound (2^48 seals) is far outside any
//! realistic session.

use aes_gcm::{
    aead::{
        consts::{U12, U16},
        generic_array::GenericArray,
        AeadCore, AeadInPlace, KeyInit, OsRng,
    },
    aes::Aes192,
    Aes128Gcm, Aes256Gcm, AesGcm,
};
use base64ct::{Base64, Encoding};
use rand::RngCore;

use super::CryptoError;

/// AES-GCM nonce length in bytes.
pub const NONCE_LEN: usize = 12;

/// AES-GCM authentication tag length in bytes.
pub const TAG_LEN: usize = 16;

type Aes192Gcm = AesGcm<Aes192, U12>;

/// Supported session key sizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KeySize {
    Aes128,
    Aes192,
    #[default]
    Aes256,
}

impl KeySize {
    /// Key length in bytes.
    pub fn byte_len(self) -> usize {
        match self {
            KeySize::Aes128 => 16,
            KeySize::Aes192 => 24,
            KeySize::Aes256 => 32,
        }
    }

    /// Map a byte length onto a key size.
    pub fn from_len(len: usize) -> Result<Self, CryptoError> {
        match len {
            16 => Ok(KeySize::Aes128),
            24 => Ok(KeySize::Aes192),
            32 => Ok(KeySize::Aes256),
            other => Err(CryptoError::InvalidKeyLength(other)),
        }
    }
}

/// Raw symmetric key material for one client session.
///
/// Length is validated on construction, so a `SessionKey` is always usable
/// with [`SymmetricCipher`]. The key is never serialized implicitly and its
/// `Debug` output is redacted.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionKey(Vec<u8>);

impl SessionKey {
    /// Generate a fresh random key from the OS CSPRNG.
    pub fn generate(size: KeySize) -> Self {
        let mut bytes = vec![0u8; size.byte_len()];
        rand::rngs::OsRng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// Wrap existing key material, rejecting unsupported lengths.
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Result<Self, CryptoError> {
        let bytes = bytes.into();
        KeySize::from_len(bytes.len())?;
        Ok(Self(bytes))
    }

    /// Decode a Base64 key as carried in the `X-AES-Key` header.
    pub fn from_base64(encoded: &str) -> Result<Self, CryptoError> {
        let bytes =
            Base64::decode_vec(encoded.trim()).map_err(|_| CryptoError::InvalidCiphertext)?;
        Self::from_bytes(bytes)
    }

    /// Base64 encoding of the raw key.
    pub fn to_base64(&self) -> String {
        Base64::encode_string(&self.0)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn size(&self) -> KeySize {
        // Length was validated in every constructor.
        match self.0.len() {
            16 => KeySize::Aes128,
            24 => KeySize::Aes192,
            _ => KeySize::Aes256,
        }
    }
}

impl std::fmt::Debug for SessionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SessionKey({} bits, redacted)", self.0.len() * 8)
    }
}

/// Output of a seal: ciphertext with its nonce and detached tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SealedEnvelope {
    pub ciphertext: Vec<u8>,
    pub nonce: [u8; NONCE_LEN],
    pub tag: [u8; TAG_LEN],
}

/// AES-GCM seal/open over raw key bytes.
pub struct SymmetricCipher;

impl SymmetricCipher {
    /// Encrypt `plaintext` under `key` with a fresh random nonce.
    ///
    /// # Errors
    ///
    /// `InvalidKeyLength` before any cipher is built if `key` is not 16, 24
    /// or 32 bytes; `SealFailure` if the AEAD itself refuses.
    pub fn seal(plaintext: &[u8], key: &[u8]) -> Result<SealedEnvelope, CryptoError> {
        match KeySize::from_len(key.len())? {
            KeySize::Aes128 => seal_with::<Aes128Gcm>(key, plaintext),
            KeySize::Aes192 => seal_with::<Aes192Gcm>(key, plaintext),
            KeySize::Aes256 => seal_with::<Aes256Gcm>(key, plaintext),
        }
    }

    /// Verify the tag and decrypt.
    ///
    /// Fails closed: any mismatch, including a nonce or tag of the wrong
    /// length, is `AuthenticationFailure` and no plaintext is returned.
    pub fn open(
        ciphertext: &[u8],
        key: &[u8],
        nonce: &[u8],
        tag: &[u8],
    ) -> Result<Vec<u8>, CryptoError> {
        let size = KeySize::from_len(key.len())?;
        if nonce.len() != NONCE_LEN || tag.len() != TAG_LEN {
            return Err(CryptoError::AuthenticationFailure);
        }
        match size {
            KeySize::Aes128 => open_with::<Aes128Gcm>(key, ciphertext, nonce, tag),
            KeySize::Aes192 => open_with::<Aes192Gcm>(key, ciphertext, nonce, tag),
            KeySize::Aes256 => open_with::<Aes256Gcm>(key, ciphertext, nonce, tag),
        }
    }

    /// Seal under a validated session key.
    pub fn seal_with_key(plaintext: &[u8], key: &SessionKey) -> Result<SealedEnvelope, CryptoError> {
        Self::seal(plaintext, key.as_bytes())
    }

    /// Open a [`SealedEnvelope`] under a validated session key.
    pub fn open_envelope(envelope: &SealedEnvelope, key: &SessionKey) -> Result<Vec<u8>, CryptoError> {
        Self::open(
            &envelope.ciphertext,
            key.as_bytes(),
            &envelope.nonce,
            &envelope.tag,
        )
    }
}

fn seal_with<C>(key: &[u8], plaintext: &[u8]) -> Result<SealedEnvelope, CryptoError>
where
    C: KeyInit + AeadInPlace + AeadCore<NonceSize = U12, TagSize = U16>,
{
    let cipher =
        C::new_from_slice(key).map_err(|_| CryptoError::InvalidKeyLength(key.len()))?;
    let nonce = C::generate_nonce(&mut OsRng);

    let mut buffer = plaintext.to_vec();
    let tag = cipher
        .encrypt_in_place_detached(&nonce, b"", &mut buffer)
        .map_err(|e| CryptoError::SealFailure(e.to_string()))?;

    let mut nonce_bytes = [0u8; NONCE_LEN];
    nonce_bytes.copy_from_slice(&nonce);
    let mut tag_bytes = [0u8; TAG_LEN];
    tag_bytes.copy_from_slice(&tag);

    Ok(SealedEnvelope {
        ciphertext: buffer,
        nonce: nonce_bytes,
        tag: tag_bytes,
    })
}

fn open_with<C>(key: &[u8], ciphertext: &[u8], nonce: &[u8], tag: &[u8]) -> Result<Vec<u8>, CryptoError>
where
    C: KeyInit + AeadInPlace + AeadCore<NonceSize = U12, TagSize = U16>,
{
    let cipher =
        C::new_from_slice(key).map_err(|_| CryptoError::InvalidKeyLength(key.len()))?;

    let mut buffer = ciphertext.to_vec();
    cipher
        .decrypt_in_place_detached(
            GenericArray::from_slice(nonce),
            b"",
            &mut buffer,
            GenericArray::from_slice(tag),
        )
        .map_err(|_| CryptoError::AuthenticationFailure)?;

    Ok(buffer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    const ALL_SIZES: [KeySize; 3] = [KeySize::Aes128, KeySize::Aes192, KeySize::Aes256];

    #[test]
    fn seal_then_open_recovers_json_for_every_key_size() {
        let value = serde_json::json!({
            "success": true,
            "data": [{"code": "SPRING25", "votes": 3}, {"code": "ÜBER-10", "votes": -1}],
        });
        let plaintext = serde_json::to_vec(&value).unwrap();

        for size in ALL_SIZES {
            let key = SessionKey::generate(size);
            let sealed = SymmetricCipher::seal_with_key(&plaintext, &key).unwrap();
            assert_ne!(sealed.ciphertext, plaintext);

            let opened = SymmetricCipher::open_envelope(&sealed, &key).unwrap();
            let recovered: serde_json::Value = serde_json::from_slice(&opened).unwrap();
            assert_eq!(recovered, value);
        }
    }

    #[test]
    fn empty_plaintext_round_trips() {
        let key = SessionKey::generate(KeySize::Aes256);
        let sealed = SymmetricCipher::seal_with_key(b"", &key).unwrap();
        assert!(sealed.ciphertext.is_empty());
        assert_eq!(SymmetricCipher::open_envelope(&sealed, &key).unwrap(), b"");
    }

    #[test]
    fn single_bit_flips_are_rejected() {
        let key = SessionKey::generate(KeySize::Aes256);
        let sealed = SymmetricCipher::seal_with_key(b"{\"secret\":42}", &key).unwrap();

        for byte in 0..sealed.ciphertext.len() {
            for bit in 0..8 {
                let mut tampered = sealed.clone();
                tampered.ciphertext[byte] ^= 1 << bit;
                assert_eq!(
                    SymmetricCipher::open_envelope(&tampered, &key),
                    Err(CryptoError::AuthenticationFailure)
                );
            }
        }
        for byte in 0..NONCE_LEN {
            for bit in 0..8 {
                let mut tampered = sealed.clone();
                tampered.nonce[byte] ^= 1 << bit;
                assert_eq!(
                    SymmetricCipher::open_envelope(&tampered, &key),
                    Err(CryptoError::AuthenticationFailure)
                );
            }
        }
        for byte in 0..TAG_LEN {
            for bit in 0..8 {
                let mut tampered = sealed.clone();
                tampered.tag[byte] ^= 1 << bit;
                assert_eq!(
                    SymmetricCipher::open_envelope(&tampered, &key),
                    Err(CryptoError::AuthenticationFailure)
                );
            }
        }
    }

    #[test]
    fn wrong_key_fails_authentication() {
        let key = SessionKey::generate(KeySize::Aes128);
        let other = SessionKey::generate(KeySize::Aes128);
        let sealed = SymmetricCipher::seal_with_key(b"payload", &key).unwrap();
        assert_eq!(
            SymmetricCipher::open_envelope(&sealed, &other),
            Err(CryptoError::AuthenticationFailure)
        );
    }

    #[test]
    fn truncated_nonce_or_tag_fails_closed() {
        let key = SessionKey::generate(KeySize::Aes256);
        let sealed = SymmetricCipher::seal_with_key(b"payload", &key).unwrap();

        let short_nonce = SymmetricCipher::open(
            &sealed.ciphertext,
            key.as_bytes(),
            &sealed.nonce[..11],
            &sealed.tag,
        );
        assert_eq!(short_nonce, Err(CryptoError::AuthenticationFailure));

        let short_tag = SymmetricCipher::open(
            &sealed.ciphertext,
            key.as_bytes(),
            &sealed.nonce,
            &sealed.tag[..12],
        );
        assert_eq!(short_tag, Err(CryptoError::AuthenticationFailure));
    }

    #[test]
    fn only_16_24_32_byte_keys_are_accepted() {
        for len in 0..=64 {
            let key = vec![7u8; len];
            let result = SymmetricCipher::seal(b"x", &key);
            match len {
                16 | 24 | 32 => assert!(result.is_ok(), "length {len} should be accepted"),
                _ => assert_eq!(result, Err(CryptoError::InvalidKeyLength(len))),
            }
        }
    }

    #[test]
    fn open_checks_key_length_before_anything_else() {
        let result = SymmetricCipher::open(b"ct", &[0u8; 20], &[0u8; 3], &[0u8; 1]);
        assert_eq!(result, Err(CryptoError::InvalidKeyLength(20)));
    }

    #[test]
    fn nonces_do_not_repeat_under_one_key() {
        let key = SessionKey::generate(KeySize::Aes256);
        let mut seen = HashSet::new();
        for _ in 0..10_000 {
            let sealed = SymmetricCipher::seal_with_key(b"same plaintext", &key).unwrap();
            assert!(seen.insert(sealed.nonce), "nonce reused");
        }
    }

    #[test]
    fn session_key_base64_round_trip_and_validation() {
        let key = SessionKey::generate(KeySize::Aes192);
        let decoded = SessionKey::from_base64(&key.to_base64()).unwrap();
        assert_eq!(decoded, key);
        assert_eq!(decoded.size(), KeySize::Aes192);

        let ten_bytes = Base64::encode_string(&[1u8; 10]);
        assert_eq!(
            SessionKey::from_base64(&ten_bytes),
            Err(CryptoError::InvalidKeyLength(10))
        );
        assert_eq!(
            SessionKey::from_base64("not base64!!"),
            Err(CryptoError::InvalidCiphertext)
        );
    }

    #[test]
    fn session_key_debug_is_redacted() {
        let key = SessionKey::from_bytes(vec![0xAB; 32]).unwrap();
        let debug = format!("{key:?}");
        assert_eq!(debug, "SessionKey(256 bits, redacted)");
    }
}
