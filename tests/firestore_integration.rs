// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firestore integration tests.
//!
//! These tests require the Firestore emulator to be running
//! (`FIRESTORE_EMULATOR_HOST` set); otherwise they are skipped.

use chrono::{Duration, TimeZone, Utc};
use ga4_dashboard::db::{FirestoreDb, TokenStore};
use ga4_dashboard::error::AppError;
use ga4_dashboard::services::CredentialResolver;
use std::sync::Arc;

mod common;
use common::{credential, credential_expiring_at, test_db, CountingRefresher};

/// Generate a unique user ID for test isolation.
fn unique_user_id() -> String {
    use std::time::{SystemTime, UNIX_EPOCH};
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    format!("test-user-{}", nanos)
}

#[tokio::test]
async fn test_credentials_roundtrip() {
    require_emulator!();

    let db = test_db().await;
    let user_id = unique_user_id();

    assert!(db.get(&user_id).await.unwrap().is_none());

    let expires = Utc.with_ymd_and_hms(2026, 5, 1, 12, 30, 0).unwrap();
    let record = credential_expiring_at(&user_id, expires);
    db.put(&user_id, &record).await.unwrap();

    let stored = db.get(&user_id).await.unwrap().expect("record stored");
    assert_eq!(stored, record);
}

#[tokio::test]
async fn test_put_replaces_whole_record() {
    require_emulator!();

    let db = test_db().await;
    let user_id = unique_user_id();

    let original = credential(&user_id, Duration::minutes(-5));
    db.put(&user_id, &original).await.unwrap();

    let updated = original.with_access_token("next".to_string(), Utc::now() + Duration::hours(1));
    db.put(&user_id, &updated).await.unwrap();

    let stored = db.get(&user_id).await.unwrap().unwrap();
    assert_eq!(stored.access_token, "next");
    assert_eq!(stored.refresh_token, original.refresh_token);
}

#[tokio::test]
async fn test_delete_is_idempotent() {
    require_emulator!();

    let db = test_db().await;
    let user_id = unique_user_id();

    db.put(&user_id, &credential(&user_id, Duration::hours(1)))
        .await
        .unwrap();
    db.delete(&user_id).await.unwrap();
    assert!(db.get(&user_id).await.unwrap().is_none());

    // Deleting again is not an error.
    db.delete(&user_id).await.unwrap();
}

#[tokio::test]
async fn test_resolver_refreshes_through_firestore() {
    require_emulator!();

    let db = Arc::new(test_db().await);
    let user_id = unique_user_id();
    db.put(&user_id, &credential(&user_id, Duration::minutes(1)))
        .await
        .unwrap();

    let refresher = Arc::new(CountingRefresher::succeeding());
    let resolver = CredentialResolver::new(db.clone(), refresher.clone());

    assert_eq!(
        resolver.get_valid_access_token(&user_id).await.unwrap(),
        "refreshed-1"
    );
    let stored = db.get(&user_id).await.unwrap().unwrap();
    assert_eq!(stored.access_token, "refreshed-1");
}

#[tokio::test]
async fn test_offline_db_reports_database_error() {
    let db = FirestoreDb::new_mock();

    let result = db.get("anyone").await;

    assert!(matches!(result, Err(AppError::Database(_))));
}
