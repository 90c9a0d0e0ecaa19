// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Code storage.
//!
//! Persistence is an external collaborator; the API only depends on the
//! [`CodeStore`] trait. [`InMemoryCodeStore`] backs development runs and
//! tests.

use std::collections::HashMap;
use std::sync::RwLock;

use chrono::Utc;
use uuid::Uuid;

use crate::models::{Code, CreateCodeRequest, VoteDirection};

/// Maximum accepted length of a code string.
pub const MAX_CODE_LEN: usize = 64;

/// Maximum accepted length of a title.
pub const MAX_TITLE_LEN: usize = 200;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("code not found: {0}")]
    NotFound(Uuid),
    #[error("invalid code: {0}")]
    Invalid(String),
    #[error("code already listed: {0}")]
    Duplicate(String),
    #[error("store lock poisoned")]
    Poisoned,
}

/// Storage for listed codes.
pub trait CodeStore: Send + Sync {
    /// All codes, newest first.
    fn list(&self) -> Result<Vec<Code>, StoreError>;

    fn create(&self, request: CreateCodeRequest) -> Result<Code, StoreError>;

    fn vote(&self, id: Uuid, direction: VoteDirection) -> Result<Code, StoreError>;

    fn favorite(&self, id: Uuid) -> Result<Code, StoreError>;
}

#[derive(Default)]
pub struct InMemoryCodeStore {
    codes: RwLock<HashMap<Uuid, Code>>,
}

impl InMemoryCodeStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn update<F>(&self, id: Uuid, apply: F) -> Result<Code, StoreError>
    where
        F: FnOnce(&mut Code),
    {
        let mut codes = self.codes.write().map_err(|_| StoreError::Poisoned)?;
        let code = codes.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        apply(code);
        Ok(code.clone())
    }
}

impl CodeStore for InMemoryCodeStore {
    fn list(&self) -> Result<Vec<Code>, StoreError> {
        let codes = self.codes.read().map_err(|_| StoreError::Poisoned)?;
        let mut list: Vec<Code> = codes.values().cloned().collect();
        list.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.code.cmp(&b.code)));
        Ok(list)
    }

    fn create(&self, request: CreateCodeRequest) -> Result<Code, StoreError> {
        let code = request.code.trim().to_string();
        let title = request.title.trim().to_string();

        if code.is_empty() || code.len() > MAX_CODE_LEN {
            return Err(StoreError::Invalid(format!(
                "code must be 1-{MAX_CODE_LEN} characters"
            )));
        }
        if title.is_empty() || title.len() > MAX_TITLE_LEN {
            return Err(StoreError::Invalid(format!(
                "title must be 1-{MAX_TITLE_LEN} characters"
            )));
        }

        let mut codes = self.codes.write().map_err(|_| StoreError::Poisoned)?;
        if codes.values().any(|existing| existing.code.eq_ignore_ascii_case(&code)) {
            return Err(StoreError::Duplicate(code));
        }

        let stored = Code {
            id: Uuid::new_v4(),
            code,
            title,
            source_url: request.source_url,
            upvotes: 0,
            downvotes: 0,
            favorites: 0,
            created_at: Utc::now(),
        };
        codes.insert(stored.id, stored.clone());
        Ok(stored)
    }

    fn vote(&self, id: Uuid, direction: VoteDirection) -> Result<Code, StoreError> {
        self.update(id, |code| match direction {
            VoteDirection::Up => code.upvotes += 1,
            VoteDirection::Down => code.downvotes += 1,
        })
    }

    fn favorite(&self, id: Uuid) -> Result<Code, StoreError> {
        self.update(id, |code| code.favorites += 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(code: &str) -> CreateCodeRequest {
        CreateCodeRequest {
            code: code.to_string(),
            title: "10% off".to_string(),
            source_url: None,
        }
    }

    #[test]
    fn create_list_vote_favorite() {
        let store = InMemoryCodeStore::new();
        let created = store.create(request("  SAVE10 ")).unwrap();
        assert_eq!(created.code, "SAVE10");

        store.vote(created.id, VoteDirection::Up).unwrap();
        store.vote(created.id, VoteDirection::Up).unwrap();
        let voted = store.vote(created.id, VoteDirection::Down).unwrap();
        assert_eq!((voted.upvotes, voted.downvotes), (2, 1));

        let favorited = store.favorite(created.id).unwrap();
        assert_eq!(favorited.favorites, 1);

        let listed = store.list().unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0], favorited);
    }

    #[test]
    fn rejects_invalid_and_duplicate_codes() {
        let store = InMemoryCodeStore::new();
        assert!(matches!(store.create(request("")), Err(StoreError::Invalid(_))));
        assert!(matches!(
            store.create(request(&"X".repeat(MAX_CODE_LEN + 1))),
            Err(StoreError::Invalid(_))
        ));

        store.create(request("SPRING")).unwrap();
        assert_eq!(
            store.create(request("spring")),
            Err(StoreError::Duplicate("spring".to_string()))
        );
    }

    #[test]
    fn unknown_code_is_not_found() {
        let store = InMemoryCodeStore::new();
        let id = Uuid::new_v4();
        assert_eq!(store.favorite(id), Err(StoreError::NotFound(id)));
    }
}
