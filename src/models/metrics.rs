// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Aggregated GA4 metrics for a single property.
//!
//! GA4 returns one row per dimension value (per day, per channel). These
//! types fold those rows into the totals the dashboard shows. Counts are
//! summed; rates and durations are weighted by sessions so quiet days do
//! not drag the average around.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// One day of the traffic trend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct DailyMetric {
    /// `YYYY-MM-DD`
    pub date: String,
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub sessions: u64,
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub active_users: u64,
}

/// Sessions attributed to one default channel group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct TrafficSource {
    pub channel: String,
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub sessions: u64,
}

/// Headline numbers for a property over the selected window.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct PropertyMetrics {
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub sessions: u64,
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub active_users: u64,
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub new_users: u64,
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub screen_page_views: u64,
    /// Fraction in `0..=1`
    pub bounce_rate: f64,
    /// Seconds
    pub average_session_duration: f64,
    pub trend: Vec<DailyMetric>,
}

/// Everything fetched for one property: totals plus channel breakdown.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PropertyReport {
    pub metrics: PropertyMetrics,
    pub sources: Vec<TrafficSource>,
}

/// A single day's row from the metrics report.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DailyRow {
    /// GA4 `date` dimension, `YYYYMMDD`
    pub date: String,
    pub sessions: u64,
    pub active_users: u64,
    pub new_users: u64,
    pub screen_page_views: u64,
    pub bounce_rate: f64,
    pub average_session_duration: f64,
}

/// Folds daily rows into [`PropertyMetrics`].
#[derive(Debug, Default)]
pub struct MetricsAccumulator {
    metrics: PropertyMetrics,
    weighted_bounce: f64,
    weighted_duration: f64,
}

impl MetricsAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_row(&mut self, row: &DailyRow) {
        let weight = row.sessions as f64;

        self.metrics.sessions += row.sessions;
        self.metrics.active_users += row.active_users;
        self.metrics.new_users += row.new_users;
        self.metrics.screen_page_views += row.screen_page_views;

        self.weighted_bounce += row.bounce_rate * weight;
        self.weighted_duration += row.average_session_duration * weight;

        self.metrics.trend.push(DailyMetric {
            date: format_ga4_date(&row.date),
            sessions: row.sessions,
            active_users: row.active_users,
        });
    }

    pub fn finish(mut self) -> PropertyMetrics {
        if self.metrics.sessions > 0 {
            let total = self.metrics.sessions as f64;
            self.metrics.bounce_rate = self.weighted_bounce / total;
            self.metrics.average_session_duration = self.weighted_duration / total;
        }
        self.metrics.trend.sort_by(|a, b| a.date.cmp(&b.date));
        self.metrics
    }
}

/// Sum sessions per channel and order them busiest first.
pub fn merge_sources<I>(rows: I) -> Vec<TrafficSource>
where
    I: IntoIterator<Item = TrafficSource>,
{
    let mut by_channel: HashMap<String, u64> = HashMap::new();
    for row in rows {
        *by_channel.entry(row.channel).or_insert(0) += row.sessions;
    }

    let mut sources: Vec<TrafficSource> = by_channel
        .into_iter()
        .map(|(channel, sessions)| TrafficSource { channel, sessions })
        .collect();
    sources.sort_by(|a, b| {
        b.sessions
            .cmp(&a.sessions)
            .then_with(|| a.channel.cmp(&b.channel))
    });
    sources
}

/// `20260131` -> `2026-01-31`; anything else is passed through.
fn format_ga4_date(raw: &str) -> String {
    if raw.len() == 8 && raw.bytes().all(|b| b.is_ascii_digit()) {
        format!("{}-{}-{}", &raw[..4], &raw[4..6], &raw[6..])
    } else {
        raw.to_string()
    }
}
