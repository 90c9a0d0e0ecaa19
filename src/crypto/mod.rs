// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Hybrid Payload Encryption
//!
//! RSA is used only to hand the server a per-session AES key; every JSON
//! payload is then sealed with AES-GCM under that key.
//!
//! ## Protocol Flow
//!
//! 1. Client fetches the server public key from `/crypto/public-key` (once)
//! 2. Client generates a session key (`SessionKeyManager`)
//! 3. Client sends the key in `X-AES-Key`, RSA-wrapped or raw depending on
//!    the deployment (`KeyExchangeStrategy`)
//! 4. Server resolves the key, runs the handler, seals the JSON result
//! 5. Client opens the envelope with its cached key (`EnvelopeCodec`)
//!
//! ## Security Considerations
//!
//! - Session keys live in memory only
//! - A fresh random nonce is drawn for every seal
//! - Tag mismatches fail closed and are reported like any other decryption
//!   failure

pub mod cipher;
pub mod envelope;
pub mod error;
pub mod exchange;
pub mod keypair;
pub mod session;

pub use cipher::{KeySize, SealedEnvelope, SessionKey, SymmetricCipher, NONCE_LEN, TAG_LEN};
pub use envelope::{seal_json, EncryptedRequest, EncryptedResponse, EnvelopeCodec};
pub use error::CryptoError;
pub use exchange::{
    strategy_for, ClientKeyExchange, KeyExchangeMode, KeyExchangeStrategy, RawKeyExchange,
    WrappedKeyExchange, SESSION_KEY_HEADER,
};
pub use keypair::{
    parse_public_key_pem, wrap_with_public_key, AsymmetricKeyProvider, KeyPair,
    DEFAULT_KEY_BITS, KEY_ALGORITHM, KEY_HASH,
};
pub use session::SessionKeyManager;
