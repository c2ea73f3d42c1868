//! The report payload handed to an external reporting sink.
//!
//! Everything here is plain serializable data: summaries, alerts, a merged
//! event timeline, and screenshot recommendations. How it gets rendered is
//! the sink's business.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// Full telemetry report for one monitored session.
#[derive(Debug, Serialize)]
pub struct Report {
    pub session_id: Uuid,
    pub generated_at: DateTime<Utc>,
    pub network: NetworkSummary,
    pub console: ConsoleSummary,
    pub metrics: Vec<MetricSummary>,
    pub alerts: Vec<Alert>,
    pub timeline: Vec<TimelineEntry>,
    /// Screenshot prefixes the aggregator recommends capturing: one per
    /// distinct alert category plus one unconditional final capture.
    pub screenshots: Vec<String>,
}

/// Network request counts plus per-resource-type latency breakdown.
#[derive(Debug, Serialize)]
pub struct NetworkSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub pending: usize,
    pub resource_types: Vec<ResourceTypeStats>,
    /// Detail rows for every failed request (status `Failed` or >= 400).
    pub failures: Vec<FailedRequest>,
}

#[derive(Debug, Serialize)]
pub struct ResourceTypeStats {
    pub resource_type: String,
    pub requests: usize,
    /// Mean send-to-receive latency over completed requests, in
    /// milliseconds. Zero when no request of this type completed.
    pub avg_latency_ms: f64,
}

#[derive(Debug, Serialize)]
pub struct FailedRequest {
    pub method: String,
    pub url: String,
    pub status: String,
    pub status_text: String,
}

/// Console message counts by level.
#[derive(Debug, Serialize)]
pub struct ConsoleSummary {
    pub total: usize,
    pub errors: usize,
    pub warnings: usize,
    pub infos: usize,
}

/// Per-metric-name statistics over numeric samples.
#[derive(Debug, Serialize)]
pub struct MetricSummary {
    pub name: String,
    pub last: f64,
    pub min: f64,
    pub max: f64,
    pub avg: f64,
    pub samples: usize,
}

/// What a single alert is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertCategory {
    ConsoleError,
    SlowRequest,
    FailedRequest,
    HighMemory,
    NoIssues,
}

impl AlertCategory {
    /// Screenshot prefix suffix for this category. `NoIssues` warrants no
    /// capture beyond the unconditional final one.
    pub fn screenshot_slug(self) -> Option<&'static str> {
        match self {
            AlertCategory::ConsoleError => Some("JSError"),
            AlertCategory::SlowRequest => Some("SlowRequest"),
            AlertCategory::FailedRequest => Some("NetworkError"),
            AlertCategory::HighMemory => Some("HighMemory"),
            AlertCategory::NoIssues => None,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct Alert {
    pub category: AlertCategory,
    pub message: String,
}

/// Kind tag for merged timeline entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TimelineKind {
    RequestSent,
    ResponseReceived,
    Console,
    Metric,
}

/// One entry in the cross-correlation timeline, ordered ascending by
/// timestamp.
#[derive(Debug, Serialize)]
pub struct TimelineEntry {
    pub timestamp: DateTime<Utc>,
    pub kind: TimelineKind,
    pub detail: String,
}
