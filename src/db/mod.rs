// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Credential storage.
//!
//! [`TokenStore`] is the seam between the credential resolver and the
//! backing key-value store. Production uses Firestore; tests and local
//! runs can use the in-memory store.

pub mod firestore;
pub mod memory;

pub use firestore::FirestoreDb;
pub use memory::InMemoryTokenStore;

use crate::error::AppError;
use crate::models::CredentialRecord;
use async_trait::async_trait;
use std::sync::Arc;

/// Collection names as constants.
pub mod collections {
    /// Google credentials (keyed by Google user ID)
    pub const USER_TOKENS: &str = "user_tokens";
}

/// Per-user credential persistence.
///
/// `get` reports absence as `Ok(None)`; `delete` of a missing record
/// succeeds.
#[async_trait]
pub trait TokenStore: Send + Sync {
    async fn get(&self, user_id: &str) -> Result<Option<CredentialRecord>, AppError>;

    /// Write or overwrite the whole record.
    async fn put(&self, user_id: &str, record: &CredentialRecord) -> Result<(), AppError>;

    async fn delete(&self, user_id: &str) -> Result<(), AppError>;
}

/// Shared handle used in application state.
pub type SharedTokenStore = Arc<dyn TokenStore>;
