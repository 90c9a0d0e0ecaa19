// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    middleware::from_fn_with_state,
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::CorsLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    crypto::{EncryptedRequest, EncryptedResponse},
    gate::{request_unwrap_gate, response_wrap_gate},
    models::{
        Code, CodeListResponse, CodeResponse, CreateCodeRequest, FavoriteRequest, VoteDirection,
        VoteRequest,
    },
    state::AppState,
};

pub mod codes;
pub mod crypto;
pub mod health;

/// Build the application router.
///
/// Every route sits behind both encryption gates; the route policy in
/// `state` decides which of them are exempt.
pub fn router(state: AppState) -> Router {
    let v1_routes = Router::new()
        .route("/codes", get(codes::list_codes).post(codes::create_code))
        .route("/votes", post(codes::vote))
        .route("/favorites", post(codes::favorite));

    Router::new()
        .route("/health", get(health::health))
        .route("/health/live", get(health::liveness))
        .route("/health/ready", get(health::readiness))
        .route("/crypto/public-key", get(crypto::public_key))
        .nest("/api/v1", v1_routes)
        .merge(SwaggerUi::new("/docs").url("/api-doc/openapi.json", ApiDoc::openapi()))
        // Innermost first: unwrap runs after the key has been resolved.
        .layer(from_fn_with_state(state.clone(), request_unwrap_gate))
        .layer(from_fn_with_state(state.clone(), response_wrap_gate))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health,
        health::liveness,
        health::readiness,
        crypto::public_key,
        codes::list_codes,
        codes::create_code,
        codes::vote,
        codes::favorite
    ),
    components(
        schemas(
            Code,
            CreateCodeRequest,
            VoteDirection,
            VoteRequest,
            FavoriteRequest,
            CodeListResponse,
            CodeResponse,
            EncryptedRequest,
            EncryptedResponse,
            crypto::PublicKeyResponse,
            health::ReadyResponse,
            health::HealthChecks,
            health::HealthResponse
        )
    ),
    tags(
        (name = "Health", description = "Liveness and readiness checks"),
        (name = "Crypto", description = "Public-key handshake"),
        (name = "Codes", description = "Code listing, voting and favorites")
    )
)]
struct ApiDoc;
