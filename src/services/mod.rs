// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - business logic layer.

pub mod analytics;
pub mod classify;
pub mod credentials;
pub mod ga4;
pub mod google_oauth;
pub mod orchestrator;

pub use analytics::AnalyticsService;
pub use classify::{ErrorClassifier, PERMANENT_ERROR_MARKERS};
pub use credentials::CredentialResolver;
pub use ga4::{Ga4Client, ReportFetcher};
pub use google_oauth::{GoogleOAuthClient, RefreshedToken, TokenRefresher};
pub use orchestrator::ReportOrchestrator;
