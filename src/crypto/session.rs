// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Client-side session key holder.
//!
//! One manager per client lifetime. The key is created lazily on the first
//! encrypted call, lives in memory only, and is replaced by `rotate()` or
//! dropped by `clear()` (logout). A request that raced a rotation simply
//! fails its AEAD check.

use std::sync::Arc;

use tokio::sync::RwLock;

use super::{KeySize, SessionKey};

/// Lazily generated, rotatable symmetric session key.
///
/// # Example
///
/// ```ignore
/// let manager = SessionKeyManager::new(KeySize::Aes256);
/// let key = manager.get_key().await;
/// manager.rotate().await;
/// manager.clear().await;
/// ```
#[derive(Clone)]
pub struct SessionKeyManager {
    size: KeySize,
    key: Arc<RwLock<Option<SessionKey>>>,
}

impl SessionKeyManager {
    pub fn new(size: KeySize) -> Self {
        Self {
            size,
            key: Arc::new(RwLock::new(None)),
        }
    }

    pub fn key_size(&self) -> KeySize {
        self.size
    }

    /// Current key, generated on first use.
    pub async fn get_key(&self) -> SessionKey {
        {
            let key = self.key.read().await;
            if let Some(key) = &*key {
                return key.clone();
            }
        }

        let mut key = self.key.write().await;
        key.get_or_insert_with(|| {
            tracing::debug!(bits = self.size.byte_len() * 8, "Generated session key");
            SessionKey::generate(self.size)
        })
        .clone()
    }

    /// Replace the current key with a fresh one and return it.
    pub async fn rotate(&self) -> SessionKey {
        let fresh = SessionKey::generate(self.size);
        let mut key = self.key.write().await;
        *key = Some(fresh.clone());
        tracing::debug!("Rotated session key");
        fresh
    }

    /// Drop the key. The next `get_key()` generates a new one.
    pub async fn clear(&self) {
        let mut key = self.key.write().await;
        if key.take().is_some() {
            tracing::debug!("Cleared session key");
        }
    }

    pub async fn has_key(&self) -> bool {
        self.key.read().await.is_some()
    }
}

impl Default for SessionKeyManager {
    fn default() -> Self {
        Self::new(KeySize::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn key_is_created_lazily_and_cached() {
        let manager = SessionKeyManager::default();
        assert!(!manager.has_key().await);

        let first = manager.get_key().await;
        let second = manager.get_key().await;
        assert_eq!(first, second);
        assert_eq!(first.size(), KeySize::Aes256);
        assert!(manager.has_key().await);
    }

    #[tokio::test]
    async fn rotate_replaces_key() {
        let manager = SessionKeyManager::new(KeySize::Aes128);
        let before = manager.get_key().await;
        let rotated = manager.rotate().await;

        assert_ne!(before, rotated);
        assert_eq!(manager.get_key().await, rotated);
        assert_eq!(rotated.size(), KeySize::Aes128);
    }

    #[tokio::test]
    async fn clear_forces_a_new_key() {
        let manager = SessionKeyManager::new(KeySize::Aes192);
        let before = manager.get_key().await;
        manager.clear().await;
        assert!(!manager.has_key().await);

        let after = manager.get_key().await;
        assert_ne!(before, after);
    }

    #[tokio::test]
    async fn concurrent_first_use_yields_one_key() {
        let manager = SessionKeyManager::default();
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let manager = manager.clone();
                tokio::spawn(async move { manager.get_key().await })
            })
            .collect();

        let mut keys = Vec::new();
        for handle in handles {
            keys.push(handle.await.unwrap());
        }
        assert!(keys.windows(2).all(|pair| pair[0] == pair[1]));
    }
}
