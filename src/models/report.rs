// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Report request/response models.

use crate::error::AppError;
use crate::models::metrics::{PropertyMetrics, PropertyReport, TrafficSource};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// Reporting window selectable in the dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub enum DateRange {
    #[default]
    #[serde(rename = "7d")]
    Last7Days,
    #[serde(rename = "30d")]
    Last30Days,
    #[serde(rename = "90d")]
    Last90Days,
}

impl DateRange {
    pub fn days(self) -> u32 {
        match self {
            DateRange::Last7Days => 7,
            DateRange::Last30Days => 30,
            DateRange::Last90Days => 90,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DateRange::Last7Days => "7d",
            DateRange::Last30Days => "30d",
            DateRange::Last90Days => "90d",
        }
    }

    /// GA4 relative start date, e.g. `7daysAgo`.
    pub fn start_date(self) -> String {
        format!("{}daysAgo", self.days())
    }

    /// GA4 end date; every window runs through today.
    pub fn end_date(self) -> &'static str {
        "today"
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DateRange {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "7d" => Ok(DateRange::Last7Days),
            "30d" => Ok(DateRange::Last30Days),
            "90d" => Ok(DateRange::Last90Days),
            other => Err(AppError::BadRequest(format!(
                "Invalid 'days' parameter '{}': expected 7d, 30d or 90d",
                other
            ))),
        }
    }
}

/// A GA4 property the user can read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceDescriptor {
    /// Numeric property ID without the `properties/` prefix
    pub property_id: String,
    pub display_name: String,
}

impl ResourceDescriptor {
    pub fn new(property_id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            property_id: property_id.into(),
            display_name: display_name.into(),
        }
    }
}

/// Whether a failed fetch is worth retrying.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Auth or permission problems; retrying cannot help.
    Permanent,
    /// Rate limits, network trouble, 5xx.
    Transient,
}

/// Outcome of fetching one property.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(into = "PropertyResult")]
pub enum FetchResult {
    Success {
        resource: ResourceDescriptor,
        data: PropertyReport,
    },
    Failure {
        resource: ResourceDescriptor,
        error_message: String,
        error_class: ErrorClass,
    },
}

impl FetchResult {
    pub fn resource(&self) -> &ResourceDescriptor {
        match self {
            FetchResult::Success { resource, .. } | FetchResult::Failure { resource, .. } => {
                resource
            }
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, FetchResult::Success { .. })
    }

    /// Failures that get the single retry pass.
    pub fn is_transient_failure(&self) -> bool {
        matches!(
            self,
            FetchResult::Failure {
                error_class: ErrorClass::Transient,
                ..
            }
        )
    }

    pub fn error_message(&self) -> Option<&str> {
        match self {
            FetchResult::Failure { error_message, .. } => Some(error_message),
            FetchResult::Success { .. } => None,
        }
    }
}

/// Wire shape of one property in the report, as the frontend expects it.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct PropertyResult {
    pub property_id: String,
    pub display_name: String,
    pub metrics: Option<PropertyMetrics>,
    pub sources: Vec<TrafficSource>,
    pub error: Option<String>,
}

impl From<FetchResult> for PropertyResult {
    fn from(result: FetchResult) -> Self {
        match result {
            FetchResult::Success { resource, data } => PropertyResult {
                property_id: resource.property_id,
                display_name: resource.display_name,
                metrics: Some(data.metrics),
                sources: data.sources,
                error: None,
            },
            FetchResult::Failure {
                resource,
                error_message,
                ..
            } => PropertyResult {
                property_id: resource.property_id,
                display_name: resource.display_name,
                metrics: None,
                sources: Vec::new(),
                error: Some(error_message),
            },
        }
    }
}

/// Result of one fan-out: every requested property, in request order.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportEnvelope {
    #[serde(serialize_with = "crate::time_utils::serialize_rfc3339")]
    pub generated_at: DateTime<Utc>,
    pub date_range: DateRange,
    #[serde(rename = "properties")]
    pub results: Vec<FetchResult>,
}

impl ReportEnvelope {
    pub fn success_count(&self) -> usize {
        self.results.iter().filter(|r| r.is_success()).count()
    }

    pub fn error_count(&self) -> usize {
        self.results.len() - self.success_count()
    }
}

/// Most viewed page paths for a property.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct PageMetric {
    pub page_path: String,
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub screen_page_views: u64,
}

/// Drill-down view of a single property.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyDetail {
    #[serde(serialize_with = "crate::time_utils::serialize_rfc3339")]
    pub generated_at: DateTime<Utc>,
    pub date_range: DateRange,
    pub property_id: String,
    pub display_name: String,
    pub metrics: PropertyMetrics,
    pub sources: Vec<TrafficSource>,
    pub top_pages: Vec<PageMetric>,
}
