// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! GA4 Dashboard: multi-property Google Analytics reporting backend
//!
//! This crate signs users in with Google, keeps their OAuth credentials
//! fresh, and fans GA4 report requests out across every property they can
//! read, returning one aggregated JSON report.

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod time_utils;

use config::Config;
use db::SharedTokenStore;
use services::{
    AnalyticsService, CredentialResolver, ErrorClassifier, Ga4Client, GoogleOAuthClient,
    ReportOrchestrator,
};
use std::sync::Arc;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub token_store: SharedTokenStore,
    pub oauth: GoogleOAuthClient,
    pub analytics: AnalyticsService,
}

impl AppState {
    /// Wire services together from their clients.
    pub fn new(
        config: Config,
        token_store: SharedTokenStore,
        oauth: GoogleOAuthClient,
        ga4: Ga4Client,
    ) -> Self {
        let resolver = CredentialResolver::new(token_store.clone(), Arc::new(oauth.clone()));
        let orchestrator = ReportOrchestrator::new(Arc::new(ga4.clone()))
            .with_batch_size(config.report_batch_size)
            .with_retry_delay(config.report_retry_delay)
            .with_classifier(ErrorClassifier::new(&config.permanent_error_markers));
        let analytics = AnalyticsService::new(resolver, ga4, orchestrator);

        Self {
            config,
            token_store,
            oauth,
            analytics,
        }
    }
}

/// Outbound HTTP client shared by all Google API clients.
pub fn build_http_client(config: &Config) -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(config.http_timeout)
        .user_agent(concat!("ga4-dashboard/", env!("CARGO_PKG_VERSION")))
        .build()
}
