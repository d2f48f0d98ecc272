// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use ga4_dashboard::config::Config;
use ga4_dashboard::db::{FirestoreDb, InMemoryTokenStore, SharedTokenStore};
use ga4_dashboard::error::{AppError, FetchError};
use ga4_dashboard::middleware::auth::{create_jwt, AuthUser};
use ga4_dashboard::models::{CredentialRecord, DateRange, PropertyMetrics, PropertyReport};
use ga4_dashboard::routes::create_router;
use ga4_dashboard::services::{Ga4Client, GoogleOAuthClient, RefreshedToken, ReportFetcher, TokenRefresher};
use ga4_dashboard::AppState;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Check if emulator is available via environment variable.
#[allow(dead_code)]
pub fn emulator_available() -> bool {
    std::env::var("FIRESTORE_EMULATOR_HOST").is_ok()
}

/// Skip test with message if emulator not available.
#[macro_export]
macro_rules! require_emulator {
    () => {
        if !crate::common::emulator_available() {
            eprintln!("⚠️  Skipping: FIRESTORE_EMULATOR_HOST not set");
            return;
        }
    };
}

/// Create a test database connection.
#[allow(dead_code)]
pub async fn test_db() -> FirestoreDb {
    FirestoreDb::new("test-project")
        .await
        .expect("Failed to connect to Firestore emulator")
}

/// A credential record expiring `expires_in` from now.
#[allow(dead_code)]
pub fn credential(user_id: &str, expires_in: Duration) -> CredentialRecord {
    credential_expiring_at(user_id, Utc::now() + expires_in)
}

#[allow(dead_code)]
pub fn credential_expiring_at(user_id: &str, expires_at: DateTime<Utc>) -> CredentialRecord {
    CredentialRecord {
        user_id: user_id.to_string(),
        refresh_token: format!("refresh-{}", user_id),
        access_token: format!("access-{}", user_id),
        access_token_expires_at: expires_at,
        email: format!("{}@example.com", user_id),
        name: "Test User".to_string(),
        picture: String::new(),
    }
}

/// Session JWT for a user, signed with the test key.
#[allow(dead_code)]
pub fn session_token(config: &Config, user_id: &str) -> String {
    let user = AuthUser {
        user_id: user_id.to_string(),
        email: format!("{}@example.com", user_id),
        name: "Test User".to_string(),
        picture: String::new(),
    };
    create_jwt(&user, &config.jwt_signing_key).unwrap()
}

/// Create a test app with offline dependencies and an in-memory store.
/// Google clients point at an unroutable address; tests that reach them
/// should use wiremock instead.
#[allow(dead_code)]
pub fn create_test_app() -> (axum::Router, Arc<AppState>, Arc<InMemoryTokenStore>) {
    create_test_app_with_google("http://127.0.0.1:9")
}

/// Same as [`create_test_app`] with Google APIs served from `base_url`.
#[allow(dead_code)]
pub fn create_test_app_with_google(
    base_url: &str,
) -> (axum::Router, Arc<AppState>, Arc<InMemoryTokenStore>) {
    create_test_app_with(Config::test_default(), base_url)
}

#[allow(dead_code)]
pub fn create_test_app_with(
    config: Config,
    base_url: &str,
) -> (axum::Router, Arc<AppState>, Arc<InMemoryTokenStore>) {
    let store = Arc::new(InMemoryTokenStore::new());
    let shared: SharedTokenStore = store.clone();

    let http = reqwest::Client::new();
    let oauth = GoogleOAuthClient::new(
        http.clone(),
        config.google_client_id.clone(),
        config.google_client_secret.clone(),
    )
    .with_base_url(base_url);
    let ga4 = Ga4Client::new(http).with_base_url(base_url);

    let state = Arc::new(AppState::new(config, shared, oauth, ga4));
    (create_router(state.clone()), state, store)
}

// ─── Fakes ───────────────────────────────────────────────────

/// How a [`CountingRefresher`] answers.
#[allow(dead_code)]
#[derive(Clone, Copy, PartialEq)]
pub enum RefreshOutcome {
    Succeed,
    Reject,
    Unreachable,
}

/// Refresher that counts calls and answers with a fixed outcome.
#[allow(dead_code)]
pub struct CountingRefresher {
    pub calls: AtomicUsize,
    pub outcome: RefreshOutcome,
    pub expires_in: Duration,
}

#[allow(dead_code)]
impl CountingRefresher {
    fn with_outcome(outcome: RefreshOutcome) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            outcome,
            expires_in: Duration::hours(1),
        }
    }

    pub fn succeeding() -> Self {
        Self::with_outcome(RefreshOutcome::Succeed)
    }

    pub fn rejecting() -> Self {
        Self::with_outcome(RefreshOutcome::Reject)
    }

    /// Fails the way a dropped connection to Google does.
    pub fn unreachable() -> Self {
        Self::with_outcome(RefreshOutcome::Unreachable)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TokenRefresher for CountingRefresher {
    async fn refresh(&self, _refresh_token: &str) -> Result<RefreshedToken, AppError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        match self.outcome {
            RefreshOutcome::Succeed => Ok(RefreshedToken {
                access_token: format!("refreshed-{}", n),
                expires_at: Utc::now() + self.expires_in,
            }),
            RefreshOutcome::Reject => Err(AppError::RefreshInvalid),
            RefreshOutcome::Unreachable => Err(AppError::GoogleApi(
                "Token refresh request failed: connection reset".to_string(),
            )),
        }
    }
}

/// What the scripted fetcher does for one attempt at a property.
#[allow(dead_code)]
#[derive(Clone)]
pub enum Step {
    Ok(u64),
    Fail(String),
    Panic,
    Delay(u64, Box<Step>),
}

/// Report fetcher driven by a per-property script of attempts.
///
/// Attempts past the end of a script repeat the last step. Also records
/// concurrency: the highest number of in-flight fetches, and how many
/// fetches had completed when each one started.
#[allow(dead_code)]
#[derive(Default)]
pub struct ScriptedFetcher {
    scripts: Mutex<HashMap<String, Vec<Step>>>,
    attempts: Mutex<HashMap<String, usize>>,
    in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
    completed: AtomicUsize,
    pub completed_at_start: Mutex<Vec<usize>>,
}

#[allow(dead_code)]
impl ScriptedFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script(self, property_id: &str, steps: Vec<Step>) -> Self {
        self.scripts
            .lock()
            .unwrap()
            .insert(property_id.to_string(), steps);
        self
    }

    pub fn attempts(&self, property_id: &str) -> usize {
        self.attempts
            .lock()
            .unwrap()
            .get(property_id)
            .copied()
            .unwrap_or(0)
    }

    pub fn total_attempts(&self) -> usize {
        self.attempts.lock().unwrap().values().sum()
    }

    fn next_step(&self, property_id: &str) -> Step {
        let attempt = {
            let mut attempts = self.attempts.lock().unwrap();
            let entry = attempts.entry(property_id.to_string()).or_insert(0);
            *entry += 1;
            *entry
        };
        let scripts = self.scripts.lock().unwrap();
        match scripts.get(property_id) {
            Some(steps) if !steps.is_empty() => {
                steps[(attempt - 1).min(steps.len() - 1)].clone()
            }
            _ => Step::Ok(1),
        }
    }
}

/// Report whose session count identifies what produced it.
#[allow(dead_code)]
pub fn report_with_sessions(sessions: u64) -> PropertyReport {
    PropertyReport {
        metrics: PropertyMetrics {
            sessions,
            ..Default::default()
        },
        sources: Vec::new(),
    }
}

#[async_trait]
impl ReportFetcher for ScriptedFetcher {
    async fn fetch(
        &self,
        property_id: &str,
        _date_range: DateRange,
        _access_token: &str,
    ) -> Result<PropertyReport, FetchError> {
        self.completed_at_start
            .lock()
            .unwrap()
            .push(self.completed.load(Ordering::SeqCst));
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        let mut step = self.next_step(property_id);
        // Always yield so batch members overlap.
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        while let Step::Delay(ms, inner) = step {
            tokio::time::sleep(std::time::Duration::from_millis(ms)).await;
            step = *inner;
        }

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.completed.fetch_add(1, Ordering::SeqCst);

        match step {
            Step::Ok(sessions) => Ok(report_with_sessions(sessions)),
            Step::Fail(message) => Err(FetchError::Unexpected(message)),
            Step::Panic => panic!("scripted panic for {}", property_id),
            Step::Delay(..) => unreachable!(),
        }
    }
}
