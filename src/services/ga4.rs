// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Google Analytics 4 client.
//!
//! Handles:
//! - Property discovery through the Admin API (`accountSummaries`)
//! - Data API `runReport` calls
//! - Folding tabular report rows into typed metrics

use crate::error::{AppError, FetchError};
use crate::models::metrics::{merge_sources, DailyRow, MetricsAccumulator};
use crate::models::{DateRange, PageMetric, PropertyReport, ResourceDescriptor, TrafficSource};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

const GA4_DATA_API_URL: &str = "https://analyticsdata.googleapis.com/v1beta";
const GA4_ADMIN_API_URL: &str = "https://analyticsadmin.googleapis.com/v1beta";

/// Upper bound on `accountSummaries` pages followed during discovery.
const MAX_DISCOVERY_PAGES: usize = 20;
const DISCOVERY_PAGE_SIZE: u32 = 200;

/// Rows returned for the top pages breakdown.
pub const TOP_PAGES_LIMIT: u32 = 10;

/// Metrics requested for the daily report, in request order.
const DAILY_METRICS: &[&str] = &[
    "sessions",
    "activeUsers",
    "newUsers",
    "screenPageViews",
    "bounceRate",
    "averageSessionDuration",
];

/// Fetches the full report for one property.
#[async_trait]
pub trait ReportFetcher: Send + Sync {
    async fn fetch(
        &self,
        property_id: &str,
        date_range: DateRange,
        access_token: &str,
    ) -> Result<PropertyReport, FetchError>;
}

// ─── Wire types ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct ApiDateRange {
    start_date: String,
    end_date: String,
}

#[derive(Debug, Clone, Serialize)]
struct NamedField {
    name: String,
}

#[derive(Debug, Clone, Serialize)]
struct MetricOrderBy {
    metric: NamedField,
    desc: bool,
}

/// Body of a `runReport` call.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportRequest {
    date_ranges: Vec<ApiDateRange>,
    dimensions: Vec<NamedField>,
    metrics: Vec<NamedField>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    order_bys: Vec<MetricOrderBy>,
    #[serde(skip_serializing_if = "Option::is_none")]
    limit: Option<String>,
}

impl ReportRequest {
    pub fn new(date_range: DateRange, dimensions: &[&str], metrics: &[&str]) -> Self {
        let named = |names: &[&str]| -> Vec<NamedField> {
            names
                .iter()
                .map(|n| NamedField {
                    name: n.to_string(),
                })
                .collect()
        };
        Self {
            date_ranges: vec![ApiDateRange {
                start_date: date_range.start_date(),
                end_date: date_range.end_date().to_string(),
            }],
            dimensions: named(dimensions),
            metrics: named(metrics),
            order_bys: Vec::new(),
            limit: None,
        }
    }

    /// Sort descending by a metric.
    pub fn order_by_desc(mut self, metric: &str) -> Self {
        self.order_bys.push(MetricOrderBy {
            metric: NamedField {
                name: metric.to_string(),
            },
            desc: true,
        });
        self
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit.to_string());
        self
    }

    /// Totals and trend: one row per day.
    pub fn daily_metrics(date_range: DateRange) -> Self {
        Self::new(date_range, &["date"], DAILY_METRICS)
    }

    /// Sessions per default channel group.
    pub fn channel_sessions(date_range: DateRange) -> Self {
        Self::new(date_range, &["sessionDefaultChannelGroup"], &["sessions"])
            .order_by_desc("sessions")
    }

    /// Most viewed page paths.
    pub fn top_pages(date_range: DateRange) -> Self {
        Self::new(date_range, &["pagePath"], &["screenPageViews"])
            .order_by_desc("screenPageViews")
            .limit(TOP_PAGES_LIMIT)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Header {
    pub name: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Cell {
    #[serde(default)]
    pub value: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportRow {
    #[serde(default)]
    pub dimension_values: Vec<Cell>,
    #[serde(default)]
    pub metric_values: Vec<Cell>,
}

/// `runReport` response. `rows` is omitted by the API when there is no data.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReportResponse {
    #[serde(default)]
    pub dimension_headers: Vec<Header>,
    #[serde(default)]
    pub metric_headers: Vec<Header>,
    #[serde(default)]
    pub rows: Vec<ReportRow>,
}

impl RunReportResponse {
    fn metric_index(&self, name: &str) -> Option<usize> {
        self.metric_headers.iter().position(|h| h.name == name)
    }

    fn dimension_index(&self, name: &str) -> Option<usize> {
        self.dimension_headers.iter().position(|h| h.name == name)
    }
}

impl ReportRow {
    fn dimension(&self, index: Option<usize>) -> &str {
        index
            .and_then(|i| self.dimension_values.get(i))
            .map(|c| c.value.as_str())
            .unwrap_or("")
    }

    fn metric_u64(&self, index: Option<usize>) -> u64 {
        let raw = index
            .and_then(|i| self.metric_values.get(i))
            .map(|c| c.value.as_str())
            .unwrap_or("");
        // Integer metrics occasionally arrive as "12.0"
        raw.parse::<u64>()
            .ok()
            .or_else(|| raw.parse::<f64>().ok().map(|v| v.max(0.0).round() as u64))
            .unwrap_or(0)
    }

    fn metric_f64(&self, index: Option<usize>) -> f64 {
        index
            .and_then(|i| self.metric_values.get(i))
            .and_then(|c| c.value.parse::<f64>().ok())
            .filter(|v| v.is_finite())
            .unwrap_or(0.0)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AccountSummariesResponse {
    #[serde(default)]
    account_summaries: Vec<AccountSummary>,
    #[serde(default)]
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AccountSummary {
    #[serde(default)]
    property_summaries: Vec<PropertySummary>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PropertySummary {
    property: String,
    #[serde(default)]
    display_name: String,
}

#[derive(Debug, Deserialize)]
struct GoogleErrorEnvelope {
    error: Option<GoogleErrorBody>,
}

#[derive(Debug, Deserialize)]
struct GoogleErrorBody {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    status: Option<String>,
}

// ─── Parsing ─────────────────────────────────────────────────────────────────

/// Human-readable message from a Google error body.
///
/// Produces `STATUS: message` when both are present, otherwise whichever
/// exists, otherwise a generic message naming the HTTP status.
pub fn extract_error_message(status: u16, body: &str) -> String {
    let parsed = serde_json::from_str::<GoogleErrorEnvelope>(body)
        .ok()
        .and_then(|e| e.error);

    match parsed {
        Some(GoogleErrorBody {
            message: Some(message),
            status: Some(code),
        }) => format!("{}: {}", code, message),
        Some(GoogleErrorBody {
            message: Some(message),
            status: None,
        }) => message,
        Some(GoogleErrorBody {
            message: None,
            status: Some(code),
        }) => code,
        _ => format!("GA4 request failed with HTTP status {}", status),
    }
}

/// Daily rows from a [`ReportRequest::daily_metrics`] response.
pub fn parse_daily_rows(response: &RunReportResponse) -> Vec<DailyRow> {
    let date = response.dimension_index("date");
    let sessions = response.metric_index("sessions");
    let active_users = response.metric_index("activeUsers");
    let new_users = response.metric_index("newUsers");
    let views = response.metric_index("screenPageViews");
    let bounce = response.metric_index("bounceRate");
    let duration = response.metric_index("averageSessionDuration");

    response
        .rows
        .iter()
        .map(|row| DailyRow {
            date: row.dimension(date).to_string(),
            sessions: row.metric_u64(sessions),
            active_users: row.metric_u64(active_users),
            new_users: row.metric_u64(new_users),
            screen_page_views: row.metric_u64(views),
            bounce_rate: row.metric_f64(bounce),
            average_session_duration: row.metric_f64(duration),
        })
        .collect()
}

/// Channel breakdown from a [`ReportRequest::channel_sessions`] response.
pub fn parse_sources(response: &RunReportResponse) -> Vec<TrafficSource> {
    let channel = response.dimension_index("sessionDefaultChannelGroup");
    let sessions = response.metric_index("sessions");

    merge_sources(response.rows.iter().map(|row| TrafficSource {
        channel: match row.dimension(channel) {
            "" => "(not set)".to_string(),
            name => name.to_string(),
        },
        sessions: row.metric_u64(sessions),
    }))
}

/// Top pages from a [`ReportRequest::top_pages`] response.
pub fn parse_top_pages(response: &RunReportResponse) -> Vec<PageMetric> {
    let path = response.dimension_index("pagePath");
    let views = response.metric_index("screenPageViews");

    response
        .rows
        .iter()
        .map(|row| PageMetric {
            page_path: row.dimension(path).to_string(),
            screen_page_views: row.metric_u64(views),
        })
        .collect()
}

/// Combine the two per-property reports.
pub fn build_property_report(
    metrics: &RunReportResponse,
    sources: &RunReportResponse,
) -> PropertyReport {
    let mut acc = MetricsAccumulator::new();
    for row in parse_daily_rows(metrics) {
        acc.add_row(&row);
    }
    PropertyReport {
        metrics: acc.finish(),
        sources: parse_sources(sources),
    }
}

/// `properties/123` -> `123`
fn strip_property_prefix(name: &str) -> &str {
    name.strip_prefix("properties/").unwrap_or(name)
}

// ─── Client ──────────────────────────────────────────────────────────────────

/// GA4 Data + Admin API client.
#[derive(Clone)]
pub struct Ga4Client {
    http: reqwest::Client,
    data_api_url: String,
    admin_api_url: String,
}

impl Ga4Client {
    pub fn new(http: reqwest::Client) -> Self {
        Self {
            http,
            data_api_url: GA4_DATA_API_URL.to_string(),
            admin_api_url: GA4_ADMIN_API_URL.to_string(),
        }
    }

    /// Point both APIs at another host (tests).
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        let base = base_url.trim_end_matches('/');
        self.data_api_url = base.to_string();
        self.admin_api_url = base.to_string();
        self
    }

    /// Run one report against a property.
    pub async fn run_report(
        &self,
        access_token: &str,
        property_id: &str,
        request: &ReportRequest,
    ) -> Result<RunReportResponse, FetchError> {
        let url = format!(
            "{}/properties/{}:runReport",
            self.data_api_url,
            urlencoding::encode(property_id)
        );

        let response = self
            .http
            .post(&url)
            .bearer_auth(access_token)
            .json(request)
            .send()
            .await
            .map_err(|e| FetchError::Unexpected(format!("GA4 request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            if status.as_u16() == 429 {
                tracing::warn!(property_id, "GA4 rate limit hit (429)");
            }
            return Err(FetchError::Remote {
                status: status.as_u16(),
                message: extract_error_message(status.as_u16(), &body),
            });
        }

        response
            .json()
            .await
            .map_err(|e| FetchError::Unexpected(format!("GA4 JSON parse error: {}", e)))
    }

    /// Top pages for a property.
    pub async fn fetch_top_pages(
        &self,
        access_token: &str,
        property_id: &str,
        date_range: DateRange,
    ) -> Result<Vec<PageMetric>, FetchError> {
        let response = self
            .run_report(access_token, property_id, &ReportRequest::top_pages(date_range))
            .await?;
        Ok(parse_top_pages(&response))
    }

    /// Every GA4 property the token can see, in Admin API order.
    pub async fn list_properties(
        &self,
        access_token: &str,
    ) -> Result<Vec<ResourceDescriptor>, AppError> {
        let url = format!("{}/accountSummaries", self.admin_api_url);
        let mut properties = Vec::new();
        let mut page_token: Option<String> = None;

        for _ in 0..MAX_DISCOVERY_PAGES {
            let mut query = vec![("pageSize", DISCOVERY_PAGE_SIZE.to_string())];
            if let Some(token) = &page_token {
                query.push(("pageToken", token.clone()));
            }

            let response = self
                .http
                .get(&url)
                .bearer_auth(access_token)
                .query(&query)
                .send()
                .await
                .map_err(|e| AppError::GoogleApi(format!("Property discovery failed: {}", e)))?;

            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                let message = extract_error_message(status.as_u16(), &body);
                tracing::warn!(status = %status, message = %message, "Property discovery failed");
                if status.as_u16() == 401 {
                    return Err(AppError::InvalidToken);
                }
                return Err(AppError::GoogleApi(message));
            }

            let page: AccountSummariesResponse = response.json().await.map_err(|e| {
                AppError::GoogleApi(format!("Failed to parse account summaries: {}", e))
            })?;

            properties.extend(
                page.account_summaries
                    .into_iter()
                    .flat_map(|a| a.property_summaries)
                    .map(|p| {
                        ResourceDescriptor::new(strip_property_prefix(&p.property), p.display_name)
                    }),
            );

            match page.next_page_token.filter(|t| !t.is_empty()) {
                Some(next) => page_token = Some(next),
                None => return Ok(properties),
            }
        }

        tracing::warn!(
            count = properties.len(),
            "Stopped following account summary pages"
        );
        Ok(properties)
    }
}

#[async_trait]
impl ReportFetcher for Ga4Client {
    /// Metrics and channel reports run concurrently; both must succeed.
    async fn fetch(
        &self,
        property_id: &str,
        date_range: DateRange,
        access_token: &str,
    ) -> Result<PropertyReport, FetchError> {
        let metrics_request = ReportRequest::daily_metrics(date_range);
        let sources_request = ReportRequest::channel_sessions(date_range);

        let (metrics, sources) = tokio::try_join!(
            self.run_report(access_token, property_id, &metrics_request),
            self.run_report(access_token, property_id, &sources_request),
        )?;

        Ok(build_property_report(&metrics, &sources))
    }
}
