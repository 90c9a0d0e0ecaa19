// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! CodeHarbor - code-aggregation API with sealed JSON transport
//!
//! A per-session AES key is handed to the server in the `X-AES-Key` header
//! (RSA-OAEP wrapped, or raw when TLS protects the transport) and every
//! non-whitelisted JSON response is sealed with AES-GCM under it.
//!
//! ## Modules
//!
//! - `api` - HTTP API handlers (Axum)
//! - `client` - reqwest client speaking the sealed transport
//! - `crypto` - keypair, session keys, cipher and envelopes
//! - `gate` - request-unwrap and response-wrap middleware
//! - `store` - code storage

pub mod api;
pub mod client;
pub mod config;
pub mod crypto;
pub mod error;
pub mod gate;
pub mod models;
pub mod state;
pub mod store;
