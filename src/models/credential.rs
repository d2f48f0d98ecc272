// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Stored Google OAuth credentials.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// A user's Google credentials plus the profile fields shown in the UI.
///
/// Stored at `user_tokens/{user_id}`. `access_token` and
/// `access_token_expires_at` are always written together.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CredentialRecord {
    /// Google account subject (also used as document ID)
    pub user_id: String,
    pub refresh_token: String,
    pub access_token: String,
    /// Absolute expiry of `access_token`
    pub access_token_expires_at: DateTime<Utc>,
    pub email: String,
    pub name: String,
    pub picture: String,
}

impl CredentialRecord {
    /// Whether the access token is still usable after subtracting `skew`.
    pub fn is_fresh(&self, now: DateTime<Utc>, skew: Duration) -> bool {
        self.access_token_expires_at - skew > now
    }

    /// Copy of this record carrying a newly issued access token.
    ///
    /// The refresh token and profile fields are preserved.
    pub fn with_access_token(&self, access_token: String, expires_at: DateTime<Utc>) -> Self {
        Self {
            access_token,
            access_token_expires_at: expires_at,
            ..self.clone()
        }
    }
}
