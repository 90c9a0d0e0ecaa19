// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;
use utoipa::ToSchema;

use crate::state::AppState;

/// Health check response with individual component status.
#[derive(Debug, Serialize, ToSchema)]
pub struct ReadyResponse {
    /// Overall health status ("ok" or "degraded").
    pub status: String,
    /// Individual health checks and their results.
    pub checks: HealthChecks,
}

/// Individual health check results.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthChecks {
    /// Whether the service process is running.
    pub service: String,
    /// RSA keypair status ("ok" or "pending").
    pub keypair: String,
    /// Key exchange mode of this deployment.
    pub key_exchange: String,
    /// Code store status ("ok" or "unavailable").
    pub store: String,
}

/// Simple health check response for liveness checks.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
}

fn check_keypair(state: &AppState) -> String {
    if state.crypto.provider.is_initialized() {
        "ok".to_string()
    } else {
        "pending".to_string()
    }
}

fn check_store(state: &AppState) -> String {
    match state.store.list() {
        Ok(_) => "ok".to_string(),
        Err(e) => {
            tracing::warn!(error = %e, "Code store health check failed");
            "unavailable".to_string()
        }
    }
}

/// Health check endpoint handler.
///
/// Returns 200 if all checks pass, 503 if any check fails. A keypair that
/// has not been generated yet is reported as degraded: the first encrypted
/// request would pay for key generation.
#[utoipa::path(
    get,
    path = "/health",
    tag = "Health",
    responses(
        (status = 200, description = "Service is healthy", body = ReadyResponse),
        (status = 503, description = "Service is unhealthy", body = ReadyResponse)
    )
)]
pub async fn health(State(state): State<AppState>) -> (StatusCode, Json<ReadyResponse>) {
    let keypair = check_keypair(&state);
    let store = check_store(&state);
    let all_ok = keypair == "ok" && store == "ok";

    let response = ReadyResponse {
        status: if all_ok { "ok" } else { "degraded" }.to_string(),
        checks: HealthChecks {
            service: "ok".to_string(),
            keypair,
            key_exchange: state.crypto.mode().as_str().to_string(),
            store,
        },
    };

    let status = if all_ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status, Json(response))
}

/// Liveness check handler.
///
/// Always returns 200 if the process is running.
#[utoipa::path(
    get,
    path = "/health/live",
    tag = "Health",
    responses(
        (status = 200, description = "Service is alive", body = HealthResponse)
    )
)]
pub async fn liveness() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

/// Readiness check handler.
///
/// Returns 200 only once the keypair is warm and the store answers.
#[utoipa::path(
    get,
    path = "/health/ready",
    tag = "Health",
    responses(
        (status = 200, description = "Service is ready", body = ReadyResponse),
        (status = 503, description = "Service is not ready", body = ReadyResponse)
    )
)]
pub async fn readiness(state: State<AppState>) -> (StatusCode, Json<ReadyResponse>) {
    health(state).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::EncryptionMode,
        crypto::{test_support::shared_provider, KeyExchangeMode},
        gate::RoutePolicy,
        state::CryptoContext,
        store::InMemoryCodeStore,
    };

    #[tokio::test]
    async fn cold_keypair_reports_degraded() {
        let state = AppState::default();
        let (status, Json(body)) = health(State(state)).await;

        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body.status, "degraded");
        assert_eq!(body.checks.keypair, "pending");
        assert_eq!(body.checks.store, "ok");
    }

    #[tokio::test]
    async fn warm_keypair_reports_ok() {
        let crypto = CryptoContext::new(
            shared_provider(),
            KeyExchangeMode::Transport,
            RoutePolicy::new(EncryptionMode::Mandatory),
        );
        let state = AppState::new(InMemoryCodeStore::new(), crypto);
        let (status, Json(body)) = readiness(State(state)).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.status, "ok");
        assert_eq!(body.checks.key_exchange, "transport");
    }

    #[tokio::test]
    async fn liveness_is_always_ok() {
        let Json(body) = liveness().await;
        assert_eq!(body.status, "ok");
    }
}
