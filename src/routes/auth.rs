// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Google OAuth sign-in routes.

use axum::{
    extract::{Query, State},
    response::Redirect,
    routing::{get, post},
    Extension, Json, Router,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::Utc;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use subtle::ConstantTimeEq;

use crate::error::{AppError, Result};
use crate::middleware::auth::{create_jwt, AuthUser, SESSION_COOKIE, SESSION_TTL_SECS};
use crate::models::CredentialRecord;
use crate::AppState;

// Type alias for HMAC-SHA256
type HmacSha256 = Hmac<Sha256>;

/// How long a signed `state` parameter stays valid (10 minutes).
const OAUTH_STATE_MAX_AGE_MS: u128 = 10 * 60 * 1000;

/// Public sign-in routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/oauth/authorize", get(authorize))
        .route("/api/oauth/callback", get(callback))
}

/// Routes that need a session (auth middleware applied in routes/mod.rs).
pub fn protected_routes() -> Router<Arc<AppState>> {
    Router::new().route("/api/oauth/logout", post(logout))
}

fn now_millis() -> Result<u128> {
    Ok(SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("System time error: {}", e)))?
        .as_millis())
}

/// Start OAuth flow - redirect to the Google consent screen.
async fn authorize(State(state): State<Arc<AppState>>) -> Result<Redirect> {
    let oauth_state = sign_state(&state.config.oauth_state_key, now_millis()?)?;
    let callback_url = state.config.oauth_callback_url();
    let auth_url = state.oauth.authorization_url(&callback_url, &oauth_state);

    tracing::info!(
        client_id = %state.config.google_client_id,
        callback = %callback_url,
        "Starting OAuth flow, redirecting to Google"
    );

    Ok(Redirect::temporary(&auth_url))
}

#[derive(Deserialize)]
pub struct CallbackParams {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    state: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// OAuth callback - exchange code, store credentials, hand the session
/// token to the frontend in the URL fragment.
async fn callback(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Query(params): Query<CallbackParams>,
) -> (CookieJar, Redirect) {
    let frontend_url = state.config.frontend_url.trim_end_matches('/').to_string();

    match complete_sign_in(&state, params).await {
        Ok(jwt) => {
            let cookie = Cookie::build((SESSION_COOKIE, jwt.clone()))
                .http_only(true)
                .secure(frontend_url.starts_with("https://"))
                .same_site(SameSite::Lax)
                .path("/")
                .max_age(time::Duration::seconds(SESSION_TTL_SECS as i64));

            (
                jar.add(cookie),
                Redirect::temporary(&format!("{}/#token={}", frontend_url, jwt)),
            )
        }
        Err(AppError::Forbidden(reason)) => {
            tracing::warn!(reason = %reason, "Sign-in refused");
            (
                jar,
                Redirect::temporary(&format!("{}/#error=not_authorized", frontend_url)),
            )
        }
        Err(e) => {
            tracing::warn!(error = %e, "OAuth callback failed");
            (
                jar,
                Redirect::temporary(&format!("{}/#error=auth_failed", frontend_url)),
            )
        }
    }
}

/// Validate the callback, persist credentials and mint a session JWT.
async fn complete_sign_in(state: &AppState, params: CallbackParams) -> Result<String> {
    if let Some(error) = params.error {
        return Err(AppError::BadRequest(format!("OAuth error from Google: {}", error)));
    }

    let oauth_state = params
        .state
        .ok_or_else(|| AppError::BadRequest("Missing OAuth state".to_string()))?;
    if !verify_state(&oauth_state, &state.config.oauth_state_key, now_millis()?) {
        tracing::error!("OAuth state verification failed! Potential tampering or replay.");
        return Err(AppError::BadRequest("Invalid OAuth state".to_string()));
    }

    let code = params
        .code
        .ok_or_else(|| AppError::BadRequest("Missing authorization code".to_string()))?;

    tracing::info!("Exchanging authorization code for tokens");
    let tokens = state
        .oauth
        .exchange_code(&code, &state.config.oauth_callback_url())
        .await?;
    let profile = state.oauth.get_user_info(&tokens.access_token).await?;

    if !state.config.is_email_allowed(&profile.email) {
        return Err(AppError::Forbidden(format!(
            "{} is not on the allowlist",
            profile.email
        )));
    }

    // Google only returns a refresh token on first consent; keep the old one otherwise.
    let refresh_token = match tokens.refresh_token.clone() {
        Some(t) => t,
        None => state
            .token_store
            .get(&profile.sub)
            .await?
            .map(|existing| existing.refresh_token)
            .ok_or_else(|| {
                AppError::GoogleApi("Google did not return a refresh token".to_string())
            })?,
    };

    let record = CredentialRecord {
        user_id: profile.sub.clone(),
        refresh_token,
        access_token_expires_at: tokens.expires_at(Utc::now()),
        access_token: tokens.access_token,
        email: profile.email.clone(),
        name: profile.name.clone(),
        picture: profile.picture.clone(),
    };
    state.token_store.put(&profile.sub, &record).await?;

    tracing::info!(user_id = %profile.sub, "OAuth successful, credentials stored");

    let user = AuthUser {
        user_id: profile.sub,
        email: profile.email,
        name: profile.name,
        picture: profile.picture,
    };
    create_jwt(&user, &state.config.jwt_signing_key)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("JWT creation failed: {}", e)))
}

#[derive(Serialize)]
pub struct LogoutResponse {
    pub success: bool,
}

/// Logout - revoke the Google grant (best effort) and forget the credentials.
async fn logout(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    jar: CookieJar,
) -> Result<(CookieJar, Json<LogoutResponse>)> {
    if let Some(record) = state.token_store.get(&user.user_id).await? {
        if let Err(e) = state.oauth.revoke(&record.refresh_token).await {
            tracing::warn!(error = %e, user_id = %user.user_id, "Google revocation failed, continuing");
        }
    }

    state.token_store.delete(&user.user_id).await?;
    tracing::info!(user_id = %user.user_id, "User logged out");

    Ok((
        jar.remove(Cookie::build(SESSION_COOKIE).path("/")),
        Json(LogoutResponse { success: true }),
    ))
}

/// Sign the issue time: base64url("timestamp_hex|signature_hex").
fn sign_state(secret: &[u8], now_ms: u128) -> Result<String> {
    let payload = format!("{:x}", now_ms);
    let signature = state_signature(secret, &payload)
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("HMAC init failed")))?;
    Ok(URL_SAFE_NO_PAD.encode(format!("{}|{}", payload, signature)))
}

/// Check signature and age of an OAuth `state` parameter.
fn verify_state(state: &str, secret: &[u8], now_ms: u128) -> bool {
    let Some(decoded) = URL_SAFE_NO_PAD
        .decode(state)
        .ok()
        .and_then(|b| String::from_utf8(b).ok())
    else {
        return false;
    };

    let Some((payload, signature_hex)) = decoded.split_once('|') else {
        return false;
    };

    let Some(expected) = state_signature(secret, payload) else {
        return false;
    };
    if !bool::from(expected.as_bytes().ct_eq(signature_hex.as_bytes())) {
        return false;
    }

    match u128::from_str_radix(payload, 16) {
        Ok(issued_ms) => issued_ms <= now_ms && now_ms - issued_ms <= OAUTH_STATE_MAX_AGE_MS,
        Err(_) => false,
    }
}

fn state_signature(secret: &[u8], payload: &str) -> Option<String> {
    let mut mac = HmacSha256::new_from_slice(secret).ok()?;
    mac.update(payload.as_bytes());
    Some(hex::encode(mac.finalize().into_bytes()))
}
