// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Code listing handlers.
//!
//! These handlers deal in plain JSON only. Unwrapping request bodies and
//! sealing responses happens in the gates around them.

use axum::{extract::State, http::StatusCode, Json};

use crate::{
    error::ApiError,
    models::{CodeListResponse, CodeResponse, CreateCodeRequest, FavoriteRequest, VoteRequest},
    state::AppState,
};

#[utoipa::path(
    get,
    path = "/api/v1/codes",
    tag = "Codes",
    params(("X-AES-Key" = Option<String>, Header, description = "Session key, raw or RSA-wrapped Base64")),
    responses(
        (status = 200, description = "Codes, newest first (sealed when a key is supplied)", body = CodeListResponse),
        (status = 400, description = "Missing or undecryptable session key")
    )
)]
pub async fn list_codes(State(state): State<AppState>) -> Result<Json<CodeListResponse>, ApiError> {
    let codes = state.store.list()?;
    Ok(Json(CodeListResponse::new(codes)))
}

#[utoipa::path(
    post,
    path = "/api/v1/codes",
    tag = "Codes",
    request_body = CreateCodeRequest,
    params(("X-AES-Key" = Option<String>, Header, description = "Session key, raw or RSA-wrapped Base64")),
    responses(
        (status = 201, description = "Code submitted", body = CodeResponse),
        (status = 400, description = "Invalid code or encryption error"),
        (status = 409, description = "Code already listed")
    )
)]
pub async fn create_code(
    State(state): State<AppState>,
    Json(request): Json<CreateCodeRequest>,
) -> Result<(StatusCode, Json<CodeResponse>), ApiError> {
    let code = state.store.create(request)?;
    tracing::info!(code_id = %code.id, "Code submitted");
    Ok((StatusCode::CREATED, Json(CodeResponse::new(code))))
}

/// Votes are increment-only, so a plain request body is accepted.
#[utoipa::path(
    post,
    path = "/api/v1/votes",
    tag = "Codes",
    request_body = VoteRequest,
    params(("X-AES-Key" = Option<String>, Header, description = "Session key, raw or RSA-wrapped Base64")),
    responses(
        (status = 200, description = "Vote recorded", body = CodeResponse),
        (status = 404, description = "Code not found")
    )
)]
pub async fn vote(
    State(state): State<AppState>,
    Json(request): Json<VoteRequest>,
) -> Result<Json<CodeResponse>, ApiError> {
    let code = state.store.vote(request.code_id, request.direction)?;
    Ok(Json(CodeResponse::new(code)))
}

#[utoipa::path(
    post,
    path = "/api/v1/favorites",
    tag = "Codes",
    request_body = FavoriteRequest,
    params(("X-AES-Key" = Option<String>, Header, description = "Session key, raw or RSA-wrapped Base64")),
    responses(
        (status = 200, description = "Favorite recorded", body = CodeResponse),
        (status = 404, description = "Code not found")
    )
)]
pub async fn favorite(
    State(state): State<AppState>,
    Json(request): Json<FavoriteRequest>,
) -> Result<Json<CodeResponse>, ApiError> {
    let code = state.store.favorite(request.code_id)?;
    Ok(Json(CodeResponse::new(code)))
}
