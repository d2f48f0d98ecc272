// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Dashboard reports for a signed-in user.
//!
//! Handles the full request path:
//! 1. Resolve a valid Google access token (refreshing if needed)
//! 2. Discover the user's GA4 properties
//! 3. Fan the report out across properties

use crate::error::{AppError, FetchError, Result};
use crate::models::{DateRange, PropertyDetail, ReportEnvelope};
use crate::services::credentials::CredentialResolver;
use crate::services::ga4::{Ga4Client, ReportFetcher};
use crate::services::orchestrator::ReportOrchestrator;
use chrono::Utc;

/// High-level analytics service used by the API routes.
#[derive(Clone)]
pub struct AnalyticsService {
    resolver: CredentialResolver,
    ga4: Ga4Client,
    orchestrator: ReportOrchestrator,
}

impl AnalyticsService {
    pub fn new(
        resolver: CredentialResolver,
        ga4: Ga4Client,
        orchestrator: ReportOrchestrator,
    ) -> Self {
        Self {
            resolver,
            ga4,
            orchestrator,
        }
    }

    /// Report across every property the user can read.
    ///
    /// Credential problems abort the call; per-property problems are
    /// carried inside the envelope.
    pub async fn report_for_user(
        &self,
        user_id: &str,
        date_range: DateRange,
    ) -> Result<ReportEnvelope> {
        let access_token = self.resolver.get_valid_access_token(user_id).await?;
        let properties = self.ga4.list_properties(&access_token).await?;

        tracing::info!(
            user_id,
            properties = properties.len(),
            date_range = %date_range,
            "Running dashboard report"
        );

        Ok(self
            .orchestrator
            .run_report(&access_token, &properties, date_range)
            .await)
    }

    /// Drill-down for one property the user can read.
    pub async fn property_detail(
        &self,
        user_id: &str,
        property_id: &str,
        date_range: DateRange,
    ) -> Result<PropertyDetail> {
        let access_token = self.resolver.get_valid_access_token(user_id).await?;

        let properties = self.ga4.list_properties(&access_token).await?;
        let property = properties
            .into_iter()
            .find(|p| p.property_id == property_id)
            .ok_or_else(|| AppError::NotFound(format!("Property {}", property_id)))?;

        let (report, top_pages) = tokio::try_join!(
            self.ga4.fetch(property_id, date_range, &access_token),
            self.ga4
                .fetch_top_pages(&access_token, property_id, date_range),
        )
        .map_err(|e| {
            tracing::warn!(property_id, error = %e, "Property detail fetch failed");
            fetch_error_to_app(e)
        })?;

        Ok(PropertyDetail {
            generated_at: Utc::now(),
            date_range,
            property_id: property.property_id,
            display_name: property.display_name,
            metrics: report.metrics,
            sources: report.sources,
            top_pages,
        })
    }
}

fn fetch_error_to_app(err: FetchError) -> AppError {
    match err {
        FetchError::Remote { message, .. } => AppError::GoogleApi(message),
        FetchError::Unexpected(message) => AppError::GoogleApi(message),
    }
}
