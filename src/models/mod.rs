// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Data models for the application.

pub mod credential;
pub mod metrics;
pub mod report;

pub use credential::CredentialRecord;
pub use metrics::{DailyMetric, PropertyMetrics, PropertyReport, TrafficSource};
pub use report::{
    DateRange, ErrorClass, FetchResult, PageMetric, PropertyDetail, PropertyResult,
    ReportEnvelope, ResourceDescriptor,
};
