// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Encryption Gates
//!
//! Two axum middlewares that sit between the transport and the handlers:
//!
//! - [`request_unwrap_gate`] turns RSA-wrapped request bodies back into
//!   plain JSON (asymmetric deployments only)
//! - [`response_wrap_gate`] resolves `X-AES-Key` and seals JSON responses
//!
//! Handlers never see ciphertext and never decide whether to encrypt.
//!
//! ## Usage
//!
//! ```ignore
//! Router::new()
//!     .route("/api/v1/codes", get(list_codes))
//!     .layer(from_fn_with_state(state.clone(), request_unwrap_gate))
//!     .layer(from_fn_with_state(state.clone(), response_wrap_gate))
//! ```
//!
//! The response gate is the outer layer so a missing key is rejected before
//! the body is read.

pub mod policy;
pub mod request;
pub mod response;

pub use policy::{RouteDecision, RoutePolicy, DEFAULT_UNWRAP_EXEMPT, DEFAULT_WHITELIST};
pub use request::{request_unwrap_gate, unwrap_body, wrapped_body, MAX_REQUEST_BODY_BYTES};
pub use response::{resolve_header_value, resolve_request_key, response_wrap_gate, seal_response};
