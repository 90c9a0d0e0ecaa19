// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # API Data Models
//!
//! Request and response structures for the code-listing API. All types
//! derive `Serialize`, `Deserialize`, and `ToSchema` for JSON handling and
//! OpenAPI documentation. Field names are camelCase on the wire.
//!
//! These are the plaintext shapes: whether they travel sealed is decided by
//! the encryption gates, never by the handlers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

// =============================================================================
// Codes
// =============================================================================

/// A promotional code discovered by the aggregator or submitted by a user.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Code {
    pub id: Uuid,
    /// The code itself, as entered at checkout.
    pub code: String,
    /// Short description of what the code unlocks.
    pub title: String,
    /// Where the code was found.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_url: Option<String>,
    pub upvotes: u64,
    pub downvotes: u64,
    pub favorites: u64,
    pub created_at: DateTime<Utc>,
}

/// Request to submit a new code.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateCodeRequest {
    pub code: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_url: Option<String>,
}

/// Direction of a vote.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum VoteDirection {
    Up,
    Down,
}

/// Increment-only vote on a code.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct VoteRequest {
    pub code_id: Uuid,
    pub direction: VoteDirection,
}

/// Mark a code as a favorite.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FavoriteRequest {
    pub code_id: Uuid,
}

// =============================================================================
// Response wrappers
// =============================================================================

/// List of codes, newest first.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CodeListResponse {
    pub success: bool,
    pub data: Vec<Code>,
}

/// A single code.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CodeResponse {
    pub success: bool,
    pub data: Code,
}

impl CodeListResponse {
    pub fn new(data: Vec<Code>) -> Self {
        Self {
            success: true,
            data,
        }
    }
}

impl CodeResponse {
    pub fn new(data: Code) -> Self {
        Self {
            success: true,
            data,
        }
    }
}
