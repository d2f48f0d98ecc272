// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! GA4 Dashboard API Server
//!
//! Signs users in with Google and serves aggregated Google Analytics 4
//! reports across every property they can read.

use ga4_dashboard::{
    build_http_client,
    config::{Config, TokenStoreKind},
    db::{FirestoreDb, InMemoryTokenStore, SharedTokenStore},
    services::{Ga4Client, GoogleOAuthClient},
    AppState,
};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize structured JSON logging for GCP
    init_logging()?;

    let config = Config::from_env()?;
    tracing::info!(
        port = config.port,
        batch_size = config.report_batch_size,
        "Starting GA4 Dashboard API"
    );

    let token_store: SharedTokenStore = match config.token_store {
        TokenStoreKind::Firestore => Arc::new(FirestoreDb::new(&config.gcp_project_id).await?),
        TokenStoreKind::Memory => {
            tracing::warn!("Using in-memory token store; credentials are lost on restart");
            Arc::new(InMemoryTokenStore::new())
        }
    };

    let http = build_http_client(&config)?;
    let oauth = GoogleOAuthClient::new(
        http.clone(),
        config.google_client_id.clone(),
        config.google_client_secret.clone(),
    );
    let ga4 = Ga4Client::new(http);

    let port = config.port;
    let state = Arc::new(AppState::new(config, token_store, oauth, ga4));

    let app = ga4_dashboard::routes::create_router(state);

    let addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Server listening");

    axum::serve(listener, app).await?;
    Ok(())
}

/// Initialize structured JSON logging (GCP-compliant).
fn init_logging() -> Result<(), Box<dyn std::error::Error>> {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("ga4_dashboard=debug".parse()?)
                .add_directive("info".parse()?),
        )
        .with(format)
        .try_init()?;

    Ok(())
}
