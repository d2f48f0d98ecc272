// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Permanent vs. transient classification of report failures.
//!
//! Google only gives us free text, so classification is a substring match
//! against a marker table. Anything that matches no marker is transient.

use crate::models::ErrorClass;

/// Signatures of failures that retrying cannot fix (auth and permissions).
pub const PERMANENT_ERROR_MARKERS: &[&str] = &[
    "PERMISSION_DENIED",
    "UNAUTHENTICATED",
    "sufficient permissions",
    "invalid authentication credentials",
    "(401)",
    "(403)",
];

/// Case-insensitive marker matcher.
#[derive(Debug, Clone)]
pub struct ErrorClassifier {
    markers: Vec<String>,
}

impl Default for ErrorClassifier {
    fn default() -> Self {
        Self::new(PERMANENT_ERROR_MARKERS.iter().copied())
    }
}

impl ErrorClassifier {
    pub fn new<I, S>(markers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            markers: markers
                .into_iter()
                .map(|m| m.as_ref().to_lowercase())
                .filter(|m| !m.is_empty())
                .collect(),
        }
    }

    pub fn classify(&self, message: &str) -> ErrorClass {
        let message = message.to_lowercase();
        if self.markers.iter().any(|m| message.contains(m.as_str())) {
            ErrorClass::Permanent
        } else {
            ErrorClass::Transient
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FetchError;

    #[test]
    fn test_permission_denied_is_permanent() {
        let err = FetchError::Remote {
            status: 403,
            message: "PERMISSION_DENIED: User does not have sufficient permissions".to_string(),
        };
        assert_eq!(
            ErrorClassifier::default().classify(&err.to_string()),
            ErrorClass::Permanent
        );
    }

    #[test]
    fn test_bare_403_is_permanent() {
        let err = FetchError::Remote {
            status: 403,
            message: "GA4 request failed with HTTP status 403".to_string(),
        };
        assert_eq!(
            ErrorClassifier::default().classify(&err.to_string()),
            ErrorClass::Permanent
        );
    }

    #[test]
    fn test_rate_limit_and_server_errors_are_transient() {
        let classifier = ErrorClassifier::default();
        let rate_limited = FetchError::Remote {
            status: 429,
            message: "RESOURCE_EXHAUSTED: Exhausted property tokens per hour".to_string(),
        };
        let unavailable = FetchError::Remote {
            status: 503,
            message: "UNAVAILABLE: The service is currently unavailable".to_string(),
        };
        let network = FetchError::Unexpected("GA4 request failed: connection reset".to_string());

        assert_eq!(classifier.classify(&rate_limited.to_string()), ErrorClass::Transient);
        assert_eq!(classifier.classify(&unavailable.to_string()), ErrorClass::Transient);
        assert_eq!(classifier.classify(&network.to_string()), ErrorClass::Transient);
    }

    #[test]
    fn test_custom_markers_ignore_case() {
        let classifier = ErrorClassifier::new(["quota"]);
        assert_eq!(classifier.classify("QUOTA exceeded"), ErrorClass::Permanent);
        assert_eq!(classifier.classify("PERMISSION_DENIED"), ErrorClass::Transient);
    }
}
