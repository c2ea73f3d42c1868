//! Concurrent, append-oriented telemetry storage.
//!
//! One store instance lives for one monitored browser session. Event
//! handlers and the metrics poller insert concurrently; the aggregator
//! reads snapshots at teardown. Network requests are keyed by
//! [`RequestId`] in a concurrent map so response correlation is O(1) and
//! race-free; console messages and metric samples are append-only lists.

use dashmap::DashMap;
use parking_lot::RwLock;

use chrono::Utc;

use pagewatch_types::{
    ConsoleMessage, NetworkRequest, PerformanceMetric, RequestId, RequestStatus,
};

/// Outcome applied to a pending request when its terminal event arrives.
#[derive(Debug, Clone)]
pub enum RequestOutcome {
    /// A response was received.
    Response {
        status: u16,
        status_text: String,
        mime_type: String,
    },
    /// The load failed before a response.
    Failure { error_text: String },
}

/// Thread-safe storage for the three telemetry record kinds.
#[derive(Default)]
pub struct TelemetryStore {
    requests: DashMap<RequestId, NetworkRequest>,
    console: RwLock<Vec<ConsoleMessage>>,
    metrics: RwLock<Vec<PerformanceMetric>>,
}

impl TelemetryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reset all three collections. Called once when a monitoring session
    /// starts; there is no finer-grained deletion.
    pub fn clear(&self) {
        self.requests.clear();
        self.console.write().clear();
        self.metrics.write().clear();
    }

    /// Record a request observed on send.
    ///
    /// Exactly one record exists per `RequestId`: a second insert with the
    /// same id is dropped, keeping the first-seen record intact.
    pub fn insert_request(&self, request: NetworkRequest) {
        self.requests
            .entry(request.request_id.clone())
            .or_insert(request);
    }

    /// Apply a response or failure to the matching pending request.
    ///
    /// Returns `false` when no request with this id exists (a correlation
    /// miss -- expected under races, deliberately not logged as an error)
    /// or when the request already has a terminal status (records are
    /// mutated at most once).
    pub fn complete_request(&self, id: &RequestId, outcome: RequestOutcome) -> bool {
        let Some(mut entry) = self.requests.get_mut(id) else {
            return false;
        };

        if !entry.status.is_pending() {
            return false;
        }

        match outcome {
            RequestOutcome::Response {
                status,
                status_text,
                mime_type,
            } => {
                entry.status = RequestStatus::Status(status);
                entry.status_text = status_text;
                entry.mime_type = mime_type;
            }
            RequestOutcome::Failure { error_text } => {
                entry.status = RequestStatus::Failed;
                entry.status_text = error_text;
            }
        }
        entry.received_at = Some(Utc::now());
        true
    }

    pub fn push_console(&self, message: ConsoleMessage) {
        self.console.write().push(message);
    }

    pub fn push_metric(&self, metric: PerformanceMetric) {
        self.metrics.write().push(metric);
    }

    pub fn request_count(&self) -> usize {
        self.requests.len()
    }

    pub fn console_count(&self) -> usize {
        self.console.read().len()
    }

    pub fn metric_count(&self) -> usize {
        self.metrics.read().len()
    }

    /// Snapshot of all network requests, in no particular order.
    pub fn requests(&self) -> Vec<NetworkRequest> {
        self.requests.iter().map(|r| r.value().clone()).collect()
    }

    /// Look up one request by id.
    pub fn request(&self, id: &RequestId) -> Option<NetworkRequest> {
        self.requests.get(id).map(|r| r.value().clone())
    }

    /// Snapshot of all console messages, in insertion order.
    pub fn console_messages(&self) -> Vec<ConsoleMessage> {
        self.console.read().clone()
    }

    /// Snapshot of all metric samples, in insertion order.
    pub fn metrics(&self) -> Vec<PerformanceMetric> {
        self.metrics.read().clone()
    }
}
