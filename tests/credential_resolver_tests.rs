// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Credential resolution tests.
//!
//! These tests verify that:
//! 1. Fresh tokens are served from the store without refreshing
//! 2. Tokens inside the expiry margin are refreshed and persisted
//! 3. Any failed refresh deletes the record and demands re-auth
//! 4. Missing records surface as `NoSession`

use chrono::{Duration, Utc};
use ga4_dashboard::db::{InMemoryTokenStore, TokenStore};
use ga4_dashboard::error::AppError;
use ga4_dashboard::services::CredentialResolver;
use std::sync::Arc;

mod common;
use common::{credential, CountingRefresher};

fn resolver_with(
    refresher: Arc<CountingRefresher>,
) -> (CredentialResolver, Arc<InMemoryTokenStore>) {
    let store = Arc::new(InMemoryTokenStore::new());
    (CredentialResolver::new(store.clone(), refresher), store)
}

#[tokio::test]
async fn test_fresh_token_is_returned_without_refresh() {
    let refresher = Arc::new(CountingRefresher::succeeding());
    let (resolver, store) = resolver_with(refresher.clone());
    store
        .put("alice", &credential("alice", Duration::hours(1)))
        .await
        .unwrap();

    let token = resolver.get_valid_access_token("alice").await.unwrap();

    assert_eq!(token, "access-alice");
    assert_eq!(refresher.calls(), 0, "Fresh token must not be refreshed");
}

#[tokio::test]
async fn test_token_just_outside_margin_is_still_fresh() {
    let refresher = Arc::new(CountingRefresher::succeeding());
    let (resolver, store) = resolver_with(refresher.clone());
    store
        .put("alice", &credential("alice", Duration::minutes(6)))
        .await
        .unwrap();

    let token = resolver.get_valid_access_token("alice").await.unwrap();

    assert_eq!(token, "access-alice");
    assert_eq!(refresher.calls(), 0);
}

#[tokio::test]
async fn test_token_inside_margin_is_refreshed_and_persisted() {
    let refresher = Arc::new(CountingRefresher::succeeding());
    let (resolver, store) = resolver_with(refresher.clone());
    let original = credential("bob", Duration::minutes(4));
    store.put("bob", &original).await.unwrap();

    let token = resolver.get_valid_access_token("bob").await.unwrap();

    assert_eq!(token, "refreshed-1");
    assert_eq!(refresher.calls(), 1);

    let stored = store.get("bob").await.unwrap().expect("record kept");
    assert_eq!(stored.access_token, "refreshed-1");
    assert!(stored.access_token_expires_at > Utc::now() + Duration::minutes(50));
    // Everything except the access token survives the refresh.
    assert_eq!(stored.refresh_token, original.refresh_token);
    assert_eq!(stored.email, original.email);
}

#[tokio::test]
async fn test_expired_token_refreshes_once_then_serves_cached() {
    let refresher = Arc::new(CountingRefresher::succeeding());
    let (resolver, store) = resolver_with(refresher.clone());
    store
        .put("carol", &credential("carol", Duration::minutes(-30)))
        .await
        .unwrap();

    let first = resolver.get_valid_access_token("carol").await.unwrap();
    let second = resolver.get_valid_access_token("carol").await.unwrap();

    assert_eq!(first, "refreshed-1");
    assert_eq!(second, "refreshed-1");
    assert_eq!(refresher.calls(), 1);
}

#[tokio::test]
async fn test_rejected_refresh_deletes_record() {
    let refresher = Arc::new(CountingRefresher::rejecting());
    let (resolver, store) = resolver_with(refresher.clone());
    store
        .put("dave", &credential("dave", Duration::minutes(-1)))
        .await
        .unwrap();

    let result = resolver.get_valid_access_token("dave").await;

    assert!(matches!(result, Err(AppError::RefreshInvalid)));
    assert!(result.unwrap_err().requires_reauth());
    assert!(
        store.get("dave").await.unwrap().is_none(),
        "Dead credentials must be removed"
    );

    // Next call sees no session at all.
    let again = resolver.get_valid_access_token("dave").await;
    assert!(matches!(again, Err(AppError::NoSession)));
    assert_eq!(refresher.calls(), 1);
}

#[tokio::test]
async fn test_unreachable_refresh_deletes_record() {
    let refresher = Arc::new(CountingRefresher::unreachable());
    let (resolver, store) = resolver_with(refresher.clone());
    store
        .put("erin", &credential("erin", Duration::minutes(2)))
        .await
        .unwrap();

    let result = resolver.get_valid_access_token("erin").await;

    assert!(matches!(result, Err(AppError::RefreshInvalid)));
    assert!(store.get("erin").await.unwrap().is_none());
    assert_eq!(refresher.calls(), 1);
}

#[tokio::test]
async fn test_missing_record_is_no_session() {
    let refresher = Arc::new(CountingRefresher::succeeding());
    let (resolver, _store) = resolver_with(refresher.clone());

    let result = resolver.get_valid_access_token("nobody").await;

    assert!(matches!(result, Err(AppError::NoSession)));
    assert_eq!(refresher.calls(), 0);
}

#[tokio::test]
async fn test_users_are_resolved_independently() {
    let refresher = Arc::new(CountingRefresher::succeeding());
    let (resolver, store) = resolver_with(refresher.clone());
    store
        .put("fresh", &credential("fresh", Duration::hours(1)))
        .await
        .unwrap();
    store
        .put("stale", &credential("stale", Duration::minutes(-5)))
        .await
        .unwrap();

    let (a, b) = tokio::join!(
        resolver.get_valid_access_token("fresh"),
        resolver.get_valid_access_token("stale")
    );

    assert_eq!(a.unwrap(), "access-fresh");
    assert_eq!(b.unwrap(), "refreshed-1");
    assert_eq!(refresher.calls(), 1);
}
