// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Report fan-out across many GA4 properties.
//!
//! Properties are fetched in fixed-size batches: everything in a batch runs
//! concurrently, and the next batch starts only after the previous one has
//! settled. Each property ends up with its own success or failure entry, so
//! one broken property never hides the others. Transient failures get a
//! single retry pass after a short pause.

use crate::config::{DEFAULT_REPORT_BATCH_SIZE, DEFAULT_REPORT_RETRY_DELAY_MS};
use crate::models::{DateRange, ErrorClass, FetchResult, ReportEnvelope, ResourceDescriptor};
use crate::services::classify::ErrorClassifier;
use crate::services::ga4::ReportFetcher;
use chrono::Utc;
use futures_util::future::join_all;
use futures_util::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

/// Batched, failure-isolating report runner.
#[derive(Clone)]
pub struct ReportOrchestrator {
    fetcher: Arc<dyn ReportFetcher>,
    batch_size: usize,
    retry_delay: Duration,
    classifier: ErrorClassifier,
}

impl ReportOrchestrator {
    pub fn new(fetcher: Arc<dyn ReportFetcher>) -> Self {
        Self {
            fetcher,
            batch_size: DEFAULT_REPORT_BATCH_SIZE,
            retry_delay: Duration::from_millis(DEFAULT_REPORT_RETRY_DELAY_MS),
            classifier: ErrorClassifier::default(),
        }
    }

    /// Zero is treated as one.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn with_retry_delay(mut self, retry_delay: Duration) -> Self {
        self.retry_delay = retry_delay;
        self
    }

    pub fn with_classifier(mut self, classifier: ErrorClassifier) -> Self {
        self.classifier = classifier;
        self
    }

    /// Fetch every property and assemble the envelope.
    ///
    /// Results come back in the order of `resources`. An empty list yields an
    /// empty envelope without touching the fetcher.
    pub async fn run_report(
        &self,
        access_token: &str,
        resources: &[ResourceDescriptor],
        date_range: DateRange,
    ) -> ReportEnvelope {
        let all: Vec<&ResourceDescriptor> = resources.iter().collect();
        let mut results = self.run_batches(access_token, &all, date_range).await;

        let retry_indices: Vec<usize> = results
            .iter()
            .enumerate()
            .filter(|(_, r)| r.is_transient_failure())
            .map(|(i, _)| i)
            .collect();

        if !retry_indices.is_empty() {
            tracing::info!(
                count = retry_indices.len(),
                delay_ms = self.retry_delay.as_millis() as u64,
                "Retrying transient report failures"
            );
            tokio::time::sleep(self.retry_delay).await;

            let retry_resources: Vec<&ResourceDescriptor> =
                retry_indices.iter().map(|&i| &resources[i]).collect();
            let retried = self
                .run_batches(access_token, &retry_resources, date_range)
                .await;

            for (index, result) in retry_indices.into_iter().zip(retried) {
                results[index] = result;
            }
        }

        let envelope = ReportEnvelope {
            generated_at: Utc::now(),
            date_range,
            results,
        };

        tracing::info!(
            properties = envelope.results.len(),
            succeeded = envelope.success_count(),
            failed = envelope.error_count(),
            date_range = %date_range,
            "Report fan-out complete"
        );

        envelope
    }

    /// Run batches one after another; output order matches `resources`.
    async fn run_batches(
        &self,
        access_token: &str,
        resources: &[&ResourceDescriptor],
        date_range: DateRange,
    ) -> Vec<FetchResult> {
        let mut results = Vec::with_capacity(resources.len());

        for (batch_index, batch) in resources.chunks(self.batch_size).enumerate() {
            tracing::debug!(batch = batch_index, size = batch.len(), "Dispatching batch");

            let settled = join_all(
                batch
                    .iter()
                    .map(|resource| self.fetch_one(access_token, resource, date_range)),
            )
            .await;

            results.extend(settled);
        }

        results
    }

    /// Fetch a single property, turning every failure (panics included)
    /// into a [`FetchResult::Failure`].
    async fn fetch_one(
        &self,
        access_token: &str,
        resource: &ResourceDescriptor,
        date_range: DateRange,
    ) -> FetchResult {
        let outcome = AssertUnwindSafe(self.fetcher.fetch(
            &resource.property_id,
            date_range,
            access_token,
        ))
        .catch_unwind()
        .await;

        let error_message = match outcome {
            Ok(Ok(data)) => {
                return FetchResult::Success {
                    resource: resource.clone(),
                    data,
                }
            }
            Ok(Err(err)) => err.to_string(),
            Err(panic) => format!("Unexpected failure: {}", panic_message(panic.as_ref())),
        };

        let error_class = self.classifier.classify(&error_message);
        match error_class {
            ErrorClass::Permanent => tracing::warn!(
                property_id = %resource.property_id,
                error = %error_message,
                "Property report failed permanently"
            ),
            ErrorClass::Transient => tracing::warn!(
                property_id = %resource.property_id,
                error = %error_message,
                "Property report failed, eligible for retry"
            ),
        }

        FetchResult::Failure {
            resource: resource.clone(),
            error_message,
            error_class,
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("panic in report fetch")
}
