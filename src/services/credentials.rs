// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Credential resolution: "give me a usable Google access token for user X".

use crate::db::SharedTokenStore;
use crate::error::AppError;
use crate::models::CredentialRecord;
use crate::services::google_oauth::TokenRefresher;
use chrono::{Duration, Utc};
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Margin before token expiration when we proactively refresh (5 minutes).
pub const TOKEN_REFRESH_MARGIN_SECS: i64 = 5 * 60;

/// Shared refresh locks type for use in AppState.
pub type RefreshLocks = Arc<DashMap<String, Arc<Mutex<()>>>>;

/// Combines the token store and the refresher.
///
/// Refreshes are serialized per user within this process. Separate
/// processes can still race; Google accepts a refresh token being used
/// more than once and the last write wins in the store.
#[derive(Clone)]
pub struct CredentialResolver {
    store: SharedTokenStore,
    refresher: Arc<dyn TokenRefresher>,
    refresh_locks: RefreshLocks,
    margin: Duration,
}

impl CredentialResolver {
    pub fn new(store: SharedTokenStore, refresher: Arc<dyn TokenRefresher>) -> Self {
        Self {
            store,
            refresher,
            refresh_locks: Arc::new(DashMap::new()),
            margin: Duration::seconds(TOKEN_REFRESH_MARGIN_SECS),
        }
    }

    /// Get a valid (non-expiring) access token for the given user.
    ///
    /// 1. Load the record; none means [`AppError::NoSession`]
    /// 2. Return the stored token if it outlives the refresh margin
    /// 3. Otherwise take the user's refresh lock and re-check the store
    /// 4. Refresh with Google and persist the new token
    /// 5. If the refresh fails for any reason, delete the record and
    ///    return [`AppError::RefreshInvalid`]
    pub async fn get_valid_access_token(&self, user_id: &str) -> Result<String, AppError> {
        let record = self.store.get(user_id).await?.ok_or(AppError::NoSession)?;

        if record.is_fresh(Utc::now(), self.margin) {
            return Ok(record.access_token);
        }

        let lock = self
            .refresh_locks
            .entry(user_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let result = {
            let _guard = lock.lock().await;
            self.refresh_if_stale(user_id).await
        };

        // Drop the lock entry unless another caller is still holding or waiting on it.
        self.refresh_locks
            .remove_if(user_id, |_, l| Arc::ptr_eq(l, &lock) && Arc::strong_count(l) == 2);

        result
    }

    async fn refresh_if_stale(&self, user_id: &str) -> Result<String, AppError> {
        // Another request may have refreshed while we waited.
        let record = self.store.get(user_id).await?.ok_or(AppError::NoSession)?;
        if record.is_fresh(Utc::now(), self.margin) {
            return Ok(record.access_token);
        }

        tracing::info!(user_id, "Access token expiring, refreshing");
        self.refresh_record(user_id, &record).await
    }

    async fn refresh_record(
        &self,
        user_id: &str,
        record: &CredentialRecord,
    ) -> Result<String, AppError> {
        let refreshed = match self.refresher.refresh(&record.refresh_token).await {
            Ok(t) => t,
            Err(e) => {
                tracing::warn!(
                    user_id,
                    error = %e,
                    "Token refresh failed, removing stored credentials"
                );
                if let Err(e) = self.store.delete(user_id).await {
                    tracing::error!(error = %e, user_id, "Failed to delete dead credentials");
                }
                return Err(AppError::RefreshInvalid);
            }
        };

        let updated = record.with_access_token(refreshed.access_token, refreshed.expires_at);
        self.store.put(user_id, &updated).await?;

        tracing::info!(user_id, expires_at = %updated.access_token_expires_at, "Token refreshed");
        Ok(updated.access_token)
    }
}
