// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! API routes for authenticated users.

use crate::error::{AppError, Result};
use crate::middleware::auth::AuthUser;
use crate::models::{DateRange, PropertyDetail, ReportEnvelope};
use crate::AppState;
use axum::{
    extract::{Query, State},
    routing::get,
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// API routes (require authentication via JWT).
/// The auth middleware is applied in routes/mod.rs for these routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/me", get(get_me))
        .route("/api/analytics", get(get_analytics))
        .route("/api/analytics-detail", get(get_analytics_detail))
}

// ─── User Profile ────────────────────────────────────────────

/// Current user response.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct UserResponse {
    pub user_id: String,
    pub email: String,
    pub name: String,
    pub picture: String,
}

impl From<AuthUser> for UserResponse {
    fn from(user: AuthUser) -> Self {
        Self {
            user_id: user.user_id,
            email: user.email,
            name: user.name,
            picture: user.picture,
        }
    }
}

/// Get current user profile (straight from the session claims).
async fn get_me(Extension(user): Extension<AuthUser>) -> Json<UserResponse> {
    Json(user.into())
}

// ─── Analytics ───────────────────────────────────────────────

/// Query parameters for the dashboard report.
#[derive(Debug, Deserialize)]
pub struct AnalyticsQuery {
    /// `7d`, `30d` or `90d`; defaults to `7d`.
    pub days: Option<String>,
}

/// Parse an optional `days` parameter, rejecting unknown values.
fn parse_date_range(days: Option<&str>) -> Result<DateRange> {
    match days {
        None | Some("") => Ok(DateRange::default()),
        Some(raw) => raw.parse(),
    }
}

/// Aggregated report across every property the user can read.
async fn get_analytics(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Query(query): Query<AnalyticsQuery>,
) -> Result<Json<ReportEnvelope>> {
    let date_range = parse_date_range(query.days.as_deref())?;

    let envelope = state
        .analytics
        .report_for_user(&user.user_id, date_range)
        .await?;

    Ok(Json(envelope))
}

/// Query parameters for the single-property drill-down.
#[derive(Debug, Deserialize)]
pub struct AnalyticsDetailQuery {
    pub property: Option<String>,
    pub days: Option<String>,
}

async fn get_analytics_detail(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Query(query): Query<AnalyticsDetailQuery>,
) -> Result<Json<PropertyDetail>> {
    let property_id = query
        .property
        .as_deref()
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .ok_or_else(|| AppError::BadRequest("Missing property parameter".to_string()))?;

    if !property_id.chars().all(|c| c.is_ascii_digit()) {
        return Err(AppError::BadRequest(format!(
            "Invalid property id: {}",
            property_id
        )));
    }

    let date_range = parse_date_range(query.days.as_deref())?;

    let detail = state
        .analytics
        .property_detail(&user.user_id, property_id, date_range)
        .await?;

    Ok(Json(detail))
}
