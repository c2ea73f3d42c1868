//! Telemetry record types captured during a monitored browser session.
//!
//! Three record kinds accumulate in the store: network requests (mutated at
//! most once when their response or failure arrives), console messages, and
//! performance metric samples. All carry `chrono` UTC timestamps assigned at
//! capture time.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Opaque identifier correlating a network request with its later
/// response or failure event. Unique per in-flight request.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct RequestId(pub String);

impl RequestId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for RequestId {
    fn from(s: &str) -> Self {
        RequestId(s.to_string())
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Outcome of a network request.
///
/// `Pending` until a response or failure event correlates back to the
/// request; then either a numeric status code or `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestStatus {
    Pending,
    Status(u16),
    Failed,
}

impl RequestStatus {
    /// Success means a 2xx or 3xx response was received.
    pub fn is_success(self) -> bool {
        matches!(self, RequestStatus::Status(code) if (200..400).contains(&code))
    }

    /// Failure means the load failed outright or the server answered 4xx/5xx.
    pub fn is_failure(self) -> bool {
        match self {
            RequestStatus::Failed => true,
            RequestStatus::Status(code) => code >= 400,
            RequestStatus::Pending => false,
        }
    }

    pub fn is_pending(self) -> bool {
        matches!(self, RequestStatus::Pending)
    }
}

impl std::fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RequestStatus::Pending => f.write_str("pending"),
            RequestStatus::Status(code) => write!(f, "{code}"),
            RequestStatus::Failed => f.write_str("Failed"),
        }
    }
}

impl Serialize for RequestStatus {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// A captured network request and, once correlated, its outcome.
#[derive(Debug, Clone, Serialize)]
pub struct NetworkRequest {
    pub request_id: RequestId,
    pub url: String,
    pub method: String,
    /// Browser resource classification (Document, Script, XHR, ...).
    /// Empty when the protocol generation does not report it.
    pub resource_type: String,
    pub status: RequestStatus,
    pub status_text: String,
    pub mime_type: String,
    pub sent_at: DateTime<Utc>,
    pub received_at: Option<DateTime<Utc>>,
}

impl NetworkRequest {
    /// A fresh request observed on send, awaiting its response.
    pub fn pending(
        request_id: RequestId,
        url: impl Into<String>,
        method: impl Into<String>,
        resource_type: impl Into<String>,
    ) -> Self {
        NetworkRequest {
            request_id,
            url: url.into(),
            method: method.into(),
            resource_type: resource_type.into(),
            status: RequestStatus::Pending,
            status_text: String::new(),
            mime_type: String::new(),
            sent_at: Utc::now(),
            received_at: None,
        }
    }

    /// Wall-clock latency in milliseconds, once the response has arrived.
    pub fn latency_ms(&self) -> Option<i64> {
        self.received_at
            .map(|received| (received - self.sent_at).num_milliseconds())
    }
}

/// Severity of a captured console message. Parsed case-insensitively;
/// unrecognized levels collapse to `Info`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConsoleLevel {
    Info,
    Warning,
    Error,
}

impl ConsoleLevel {
    pub fn parse(level: &str) -> Self {
        if level.eq_ignore_ascii_case("error") {
            ConsoleLevel::Error
        } else if level.eq_ignore_ascii_case("warning") {
            ConsoleLevel::Warning
        } else {
            ConsoleLevel::Info
        }
    }
}

impl std::fmt::Display for ConsoleLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConsoleLevel::Info => f.write_str("info"),
            ConsoleLevel::Warning => f.write_str("warning"),
            ConsoleLevel::Error => f.write_str("error"),
        }
    }
}

/// A captured console message. Immutable once created.
#[derive(Debug, Clone, Serialize)]
pub struct ConsoleMessage {
    pub level: ConsoleLevel,
    pub text: String,
    pub url: String,
    /// Source line, 0 when unknown.
    pub line_number: u64,
    pub timestamp: DateTime<Utc>,
}

/// A single performance metric sample. Multiple samples accumulate per
/// metric name over a session, forming a time series.
///
/// The value is kept as the text the protocol delivered; use
/// [`PerformanceMetric::numeric_value`] for aggregation.
#[derive(Debug, Clone, Serialize)]
pub struct PerformanceMetric {
    pub name: String,
    pub value: String,
    pub timestamp: DateTime<Utc>,
}

impl PerformanceMetric {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        PerformanceMetric {
            name: name.into(),
            value: value.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn numeric_value(&self) -> Option<f64> {
        self.value.trim().parse::<f64>().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_display_matches_wire_convention() {
        assert_eq!(RequestStatus::Pending.to_string(), "pending");
        assert_eq!(RequestStatus::Status(200).to_string(), "200");
        assert_eq!(RequestStatus::Failed.to_string(), "Failed");
    }

    #[test]
    fn status_classification() {
        assert!(RequestStatus::Status(200).is_success());
        assert!(RequestStatus::Status(301).is_success());
        assert!(!RequestStatus::Status(404).is_success());
        assert!(RequestStatus::Status(404).is_failure());
        assert!(RequestStatus::Status(500).is_failure());
        assert!(RequestStatus::Failed.is_failure());
        assert!(RequestStatus::Pending.is_pending());
        assert!(!RequestStatus::Pending.is_failure());
    }

    #[test]
    fn console_level_parses_case_insensitively() {
        assert_eq!(ConsoleLevel::parse("ERROR"), ConsoleLevel::Error);
        assert_eq!(ConsoleLevel::parse("Warning"), ConsoleLevel::Warning);
        assert_eq!(ConsoleLevel::parse("info"), ConsoleLevel::Info);
        assert_eq!(ConsoleLevel::parse("verbose"), ConsoleLevel::Info);
    }

    #[test]
    fn pending_request_has_no_latency() {
        let req = NetworkRequest::pending("7".into(), "https://example.com", "GET", "Document");
        assert!(req.status.is_pending());
        assert_eq!(req.latency_ms(), None);
    }

    #[test]
    fn latency_is_received_minus_sent() {
        let mut req = NetworkRequest::pending("7".into(), "https://example.com", "GET", "");
        req.received_at = Some(req.sent_at + chrono::Duration::milliseconds(250));
        assert_eq!(req.latency_ms(), Some(250));
    }

    #[test]
    fn metric_numeric_value_parses_or_none() {
        assert_eq!(PerformanceMetric::new("Nodes", "42").numeric_value(), Some(42.0));
        assert_eq!(
            PerformanceMetric::new("JSHeapUsedSize", "1048576.5").numeric_value(),
            Some(1048576.5)
        );
        assert_eq!(PerformanceMetric::new("Bogus", "n/a").numeric_value(), None);
    }
}
