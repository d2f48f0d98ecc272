// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! In-process credential store.

use crate::db::TokenStore;
use crate::error::AppError;
use crate::models::CredentialRecord;
use async_trait::async_trait;
use dashmap::DashMap;

/// Credential store backed by a concurrent map. Contents die with the process.
#[derive(Default)]
pub struct InMemoryTokenStore {
    records: DashMap<String, CredentialRecord>,
}

impl InMemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[async_trait]
impl TokenStore for InMemoryTokenStore {
    async fn get(&self, user_id: &str) -> Result<Option<CredentialRecord>, AppError> {
        Ok(self.records.get(user_id).map(|r| r.value().clone()))
    }

    async fn put(&self, user_id: &str, record: &CredentialRecord) -> Result<(), AppError> {
        self.records.insert(user_id.to_string(), record.clone());
        Ok(())
    }

    async fn delete(&self, user_id: &str) -> Result<(), AppError> {
        self.records.remove(user_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn record(user_id: &str, access: &str) -> CredentialRecord {
        CredentialRecord {
            user_id: user_id.to_string(),
            refresh_token: "refresh".to_string(),
            access_token: access.to_string(),
            access_token_expires_at: Utc::now(),
            email: "user@example.com".to_string(),
            name: "User".to_string(),
            picture: String::new(),
        }
    }

    #[tokio::test]
    async fn test_get_missing_is_none() {
        let store = InMemoryTokenStore::new();
        assert_eq!(store.get("nobody").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_put_overwrites() {
        let store = InMemoryTokenStore::new();
        store.put("u1", &record("u1", "first")).await.unwrap();
        store.put("u1", &record("u1", "second")).await.unwrap();

        let stored = store.get("u1").await.unwrap().unwrap();
        assert_eq!(stored.access_token, "second");
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let store = InMemoryTokenStore::new();
        store.put("u1", &record("u1", "a")).await.unwrap();

        store.delete("u1").await.unwrap();
        store.delete("u1").await.unwrap();

        assert!(store.is_empty());
    }
}
