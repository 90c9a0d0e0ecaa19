// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Which routes the encryption gates apply to.
//!
//! Every decision is a plain, ordered prefix test on the request path. No
//! regex, no parameter extraction: the table below is the whole story.
//!
//! | List | Effect |
//! |------|--------|
//! | `whitelist` | Both gates skipped, plain JSON both ways |
//! | `optional` | Key may be omitted even in mandatory mode |
//! | `unwrap_exempt` | Request body may be plain JSON; response still sealed |

use axum::http::Method;

use crate::config::{EncryptionMode, ServerConfig};

/// Paths that never require encryption.
pub const DEFAULT_WHITELIST: &[&str] = &["/health", "/crypto/public-key", "/docs", "/api-doc"];

/// Low-risk, increment-only mutations whose bodies need not be wrapped.
pub const DEFAULT_UNWRAP_EXEMPT: &[&str] = &["/api/v1/votes"];

/// Outcome of evaluating a path against the policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteDecision {
    /// Whitelisted: no key, no envelopes.
    Exempt,
    /// Seal when a key is supplied, pass through otherwise.
    Optional,
    /// A key is required.
    Mandatory,
}

#[derive(Debug, Clone)]
pub struct RoutePolicy {
    mode: EncryptionMode,
    whitelist: Vec<String>,
    optional: Vec<String>,
    unwrap_exempt: Vec<String>,
}

impl RoutePolicy {
    /// Policy with the built-in whitelist and overrides.
    pub fn new(mode: EncryptionMode) -> Self {
        Self {
            mode,
            whitelist: DEFAULT_WHITELIST.iter().map(|p| p.to_string()).collect(),
            optional: Vec::new(),
            unwrap_exempt: DEFAULT_UNWRAP_EXEMPT.iter().map(|p| p.to_string()).collect(),
        }
    }

    /// Built-in lists extended by `ENCRYPTION_WHITELIST`,
    /// `ENCRYPTION_OPTIONAL` and `UNWRAP_EXEMPT`.
    pub fn from_config(config: &ServerConfig) -> Self {
        let policy = config
            .extra_whitelist
            .iter()
            .fold(Self::new(config.encryption_mode), |policy, prefix| {
                policy.with_whitelisted(prefix.clone())
            });
        let policy = config
            .optional_prefixes
            .iter()
            .fold(policy, |policy, prefix| policy.with_optional(prefix.clone()));
        config
            .extra_unwrap_exempt
            .iter()
            .fold(policy, |policy, prefix| policy.with_unwrap_exempt(prefix.clone()))
    }

    pub fn with_whitelisted(mut self, prefix: impl Into<String>) -> Self {
        self.whitelist.push(prefix.into());
        self
    }

    pub fn with_optional(mut self, prefix: impl Into<String>) -> Self {
        self.optional.push(prefix.into());
        self
    }

    pub fn with_unwrap_exempt(mut self, prefix: impl Into<String>) -> Self {
        self.unwrap_exempt.push(prefix.into());
        self
    }

    pub fn mode(&self) -> EncryptionMode {
        self.mode
    }

    pub fn whitelist(&self) -> &[String] {
        &self.whitelist
    }

    pub fn is_whitelisted(&self, path: &str) -> bool {
        matches_any(&self.whitelist, path)
    }

    /// Decide how the response gate treats `path`.
    pub fn decide(&self, path: &str) -> RouteDecision {
        if self.is_whitelisted(path) {
            return RouteDecision::Exempt;
        }
        if self.mode == EncryptionMode::Optional || matches_any(&self.optional, path) {
            return RouteDecision::Optional;
        }
        RouteDecision::Mandatory
    }

    /// Whether the request gate looks at the body of this request.
    pub fn inspects_body(&self, method: &Method, path: &str) -> bool {
        is_body_method(method) && !self.is_whitelisted(path)
    }

    /// Whether a plain (non-envelope) body must be rejected. Wrapped bodies
    /// are still unwrapped on exempt routes.
    pub fn rejects_plain_body(&self, path: &str) -> bool {
        self.decide(path) == RouteDecision::Mandatory && !matches_any(&self.unwrap_exempt, path)
    }
}

impl Default for RoutePolicy {
    fn default() -> Self {
        Self::new(EncryptionMode::Mandatory)
    }
}

fn matches_any(prefixes: &[String], path: &str) -> bool {
    prefixes.iter().any(|prefix| path.starts_with(prefix.as_str()))
}

fn is_body_method(method: &Method) -> bool {
    *method == Method::POST || *method == Method::PUT || *method == Method::PATCH
}
