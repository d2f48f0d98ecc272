// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application configuration loaded from environment variables.
//!
//! Secrets are injected as environment variables by the hosting platform,
//! so everything is read once at startup and kept in memory.

use crate::services::classify::PERMANENT_ERROR_MARKERS;
use std::env;
use std::time::Duration;

/// Default number of properties fetched concurrently per batch.
pub const DEFAULT_REPORT_BATCH_SIZE: usize = 5;

/// Default pause before the single retry pass over transient failures.
pub const DEFAULT_REPORT_RETRY_DELAY_MS: u64 = 2_000;

/// Default transport timeout for outbound Google calls.
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;

/// Which backend holds credential records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenStoreKind {
    Firestore,
    Memory,
}

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    // --- Environment Variables (non-sensitive) ---
    /// Google OAuth client ID (public)
    pub google_client_id: String,
    /// Frontend URL for OAuth redirects
    pub frontend_url: String,
    /// Public base URL of this API (used for the OAuth redirect URI)
    pub api_url: String,
    /// GCP project ID (Firestore)
    pub gcp_project_id: String,
    /// Server port
    pub port: u16,
    /// Lower-cased emails allowed to sign in; empty allows everyone
    pub allowed_emails: Vec<String>,
    /// Properties fetched concurrently per batch
    pub report_batch_size: usize,
    /// Delay before retrying transient failures
    pub report_retry_delay: Duration,
    /// Transport timeout for Google requests
    pub http_timeout: Duration,
    /// Credential record backend
    pub token_store: TokenStoreKind,
    /// Substrings marking a per-property failure as permanent
    pub permanent_error_markers: Vec<String>,

    // --- Secrets ---
    /// Google OAuth client secret
    pub google_client_secret: String,
    /// JWT signing key for session tokens (raw bytes)
    pub jwt_signing_key: Vec<u8>,
    /// HMAC key for the OAuth `state` parameter
    pub oauth_state_key: Vec<u8>,
}

impl Config {
    /// Config for tests only.
    pub fn test_default() -> Self {
        Self {
            google_client_id: "test_client_id".to_string(),
            frontend_url: "http://localhost:5173".to_string(),
            api_url: "http://localhost:8080".to_string(),
            gcp_project_id: "test-project".to_string(),
            port: 8080,
            allowed_emails: Vec::new(),
            report_batch_size: DEFAULT_REPORT_BATCH_SIZE,
            report_retry_delay: Duration::from_millis(10),
            http_timeout: Duration::from_secs(5),
            token_store: TokenStoreKind::Memory,
            permanent_error_markers: default_error_markers(),
            google_client_secret: "test_secret".to_string(),
            jwt_signing_key: b"test_jwt_key_32_bytes_minimum!!".to_vec(),
            oauth_state_key: b"test_oauth_state_key_32_bytes!!".to_vec(),
        }
    }

    /// Load configuration from environment variables.
    ///
    /// A `.env` file is honoured for local development.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        let jwt_signing_key = env::var("JWT_SIGNING_KEY")
            .map_err(|_| ConfigError::Missing("JWT_SIGNING_KEY"))?
            .into_bytes();

        let oauth_state_key = env::var("OAUTH_STATE_KEY")
            .map(|v| v.trim().as_bytes().to_vec())
            .unwrap_or_else(|_| jwt_signing_key.clone());

        let token_store = match env::var("TOKEN_STORE").as_deref() {
            Ok("memory") => TokenStoreKind::Memory,
            Ok("firestore") | Err(_) => TokenStoreKind::Firestore,
            Ok(other) => {
                return Err(ConfigError::Invalid {
                    name: "TOKEN_STORE",
                    value: other.to_string(),
                })
            }
        };

        let report_batch_size = parse_or("REPORT_BATCH_SIZE", DEFAULT_REPORT_BATCH_SIZE)?;
        if report_batch_size == 0 {
            return Err(ConfigError::Invalid {
                name: "REPORT_BATCH_SIZE",
                value: "0".to_string(),
            });
        }

        let permanent_error_markers =
            match parse_list(&env::var("PERMANENT_ERROR_MARKERS").unwrap_or_default()) {
                markers if markers.is_empty() => default_error_markers(),
                markers => markers,
            };

        Ok(Self {
            google_client_id: env::var("GOOGLE_CLIENT_ID")
                .map(|v| v.trim().to_string())
                .map_err(|_| ConfigError::Missing("GOOGLE_CLIENT_ID"))?,
            frontend_url: env::var("FRONTEND_URL")
                .unwrap_or_else(|_| "http://localhost:5173".to_string()),
            api_url: env::var("API_URL").unwrap_or_else(|_| "http://localhost:8080".to_string()),
            gcp_project_id: env::var("GCP_PROJECT_ID").unwrap_or_else(|_| "local-dev".to_string()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .unwrap_or(8080),
            allowed_emails: parse_email_list(&env::var("ALLOWED_EMAILS").unwrap_or_default()),
            report_batch_size,
            report_retry_delay: Duration::from_millis(parse_or(
                "REPORT_RETRY_DELAY_MS",
                DEFAULT_REPORT_RETRY_DELAY_MS,
            )?),
            http_timeout: Duration::from_secs(parse_or(
                "HTTP_TIMEOUT_SECS",
                DEFAULT_HTTP_TIMEOUT_SECS,
            )?),
            token_store,
            permanent_error_markers,

            google_client_secret: env::var("GOOGLE_CLIENT_SECRET")
                .map(|v| v.trim().to_string())
                .map_err(|_| ConfigError::Missing("GOOGLE_CLIENT_SECRET"))?,
            jwt_signing_key,
            oauth_state_key,
        })
    }

    /// Whether `email` may use the dashboard.
    ///
    /// An empty allowlist admits every authenticated Google account.
    pub fn is_email_allowed(&self, email: &str) -> bool {
        if self.allowed_emails.is_empty() {
            return true;
        }
        let email = email.trim().to_lowercase();
        self.allowed_emails.iter().any(|allowed| *allowed == email)
    }

    /// OAuth redirect URI registered with Google.
    pub fn oauth_callback_url(&self) -> String {
        format!("{}/api/oauth/callback", self.api_url.trim_end_matches('/'))
    }
}

fn parse_or<T: std::str::FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid {
            name,
            value: raw.clone(),
        }),
        Err(_) => Ok(default),
    }
}

/// Split a comma-separated value into trimmed, non-empty entries.
pub fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|e| !e.is_empty())
        .map(str::to_string)
        .collect()
}

/// Split a comma-separated allowlist into normalized addresses.
pub fn parse_email_list(raw: &str) -> Vec<String> {
    parse_list(raw).into_iter().map(|e| e.to_lowercase()).collect()
}

fn default_error_markers() -> Vec<String> {
    PERMANENT_ERROR_MARKERS.iter().map(|m| m.to_string()).collect()
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for {name}: {value}")]
    Invalid { name: &'static str, value: String },
}
