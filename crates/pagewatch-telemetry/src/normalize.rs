//! Normalization of version-specific wire events into telemetry records.
//!
//! Each protocol generation defines its own event-argument shape, so every
//! shape that differs between generations gets its own pure mapping
//! function, selected by exhaustive match on the resolved
//! [`ProtocolVersion`]; shapes that are stable across generations are
//! mapped once. A field the generation marks optional degrades to an empty
//! default when absent; a missing required field drops the event instead
//! of aborting anything.

use serde_json::Value;

use pagewatch_browser::CdpEvent;
use pagewatch_types::{
    ConsoleLevel, ConsoleMessage, NetworkRequest, PerformanceMetric, ProtocolVersion, RequestId,
};

use crate::store::{RequestOutcome, TelemetryStore};

/// A wire event reduced to its internal meaning.
#[derive(Debug)]
pub enum TelemetryEvent {
    RequestSent(NetworkRequest),
    RequestCompleted {
        request_id: RequestId,
        outcome: RequestOutcome,
    },
    Console(ConsoleMessage),
    Metrics(Vec<PerformanceMetric>),
}

/// Converts raw session events into [`TelemetryEvent`]s for one resolved
/// generation, and applies them to a store.
#[derive(Debug, Clone, Copy)]
pub struct EventNormalizer {
    version: ProtocolVersion,
}

impl EventNormalizer {
    pub fn new(version: ProtocolVersion) -> Self {
        Self { version }
    }

    pub fn version(&self) -> ProtocolVersion {
        self.version
    }

    /// Map one wire event. `None` means the event is not a telemetry event
    /// or a required field was missing.
    pub fn normalize(&self, event: &CdpEvent) -> Option<TelemetryEvent> {
        match self.version {
            ProtocolVersion::V85 => v85::normalize(event),
            ProtocolVersion::V112 => v112::normalize(event),
            ProtocolVersion::V120 => v120::normalize(event),
        }
    }

    /// Normalize and store. Correlation misses are silent no-ops; captured
    /// console messages are logged at a level mirroring their own.
    pub fn apply(&self, event: &CdpEvent, store: &TelemetryStore) {
        let Some(event) = self.normalize(event) else {
            return;
        };

        match event {
            TelemetryEvent::RequestSent(request) => {
                tracing::debug!(
                    method = %request.method,
                    url = %request.url,
                    "request captured"
                );
                store.insert_request(request);
            }
            TelemetryEvent::RequestCompleted { request_id, outcome } => {
                // A miss here is an expected race (event raced the send, or
                // monitoring started mid-flight), not an error.
                let matched = store.complete_request(&request_id, outcome);
                if !matched {
                    tracing::debug!(request_id = %request_id, "dropped uncorrelated completion");
                }
            }
            TelemetryEvent::Console(message) => {
                match message.level {
                    ConsoleLevel::Error => {
                        tracing::warn!(text = %message.text, "console error captured")
                    }
                    ConsoleLevel::Warning => {
                        tracing::warn!(text = %message.text, "console warning captured")
                    }
                    ConsoleLevel::Info => {
                        tracing::debug!(text = %message.text, "console message captured")
                    }
                }
                store.push_console(message);
            }
            TelemetryEvent::Metrics(samples) => {
                for metric in samples {
                    tracing::debug!(name = %metric.name, value = %metric.value, "metric sample");
                    store.push_metric(metric);
                }
            }
        }
    }
}

/// Stringify a metric value the way the wire delivered it.
fn metric_value_text(value: &Value) -> Option<String> {
    match value {
        Value::Number(n) => Some(n.to_string()),
        Value::String(s) => Some(s.clone()),
        _ => None,
    }
}

/// Response shape, stable across every supported generation.
fn response_received(params: &Value) -> Option<TelemetryEvent> {
    let request_id = params.get("requestId")?.as_str()?;
    let response = params.get("response")?;
    let status = u16::try_from(response.get("status")?.as_u64()?).ok()?;
    let status_text = response
        .get("statusText")
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_string();
    let mime_type = response
        .get("mimeType")
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_string();

    Some(TelemetryEvent::RequestCompleted {
        request_id: request_id.into(),
        outcome: RequestOutcome::Response {
            status,
            status_text,
            mime_type,
        },
    })
}

/// Failure shape, stable across every supported generation.
fn loading_failed(params: &Value) -> Option<TelemetryEvent> {
    let request_id = params.get("requestId")?.as_str()?;
    let error_text = params.get("errorText")?.as_str()?;

    Some(TelemetryEvent::RequestCompleted {
        request_id: request_id.into(),
        outcome: RequestOutcome::Failure {
            error_text: error_text.to_string(),
        },
    })
}

/// Shared by every generation: `{metrics: [{name, value}, ...]}` pairs.
/// Entries missing either half are skipped, not fatal.
fn metrics_from_pairs(params: &Value) -> Option<TelemetryEvent> {
    let entries = params.get("metrics")?.as_array()?;
    let samples = entries
        .iter()
        .filter_map(|entry| {
            let name = entry.get("name")?.as_str()?;
            let value = metric_value_text(entry.get("value")?)?;
            Some(PerformanceMetric::new(name, value))
        })
        .collect();
    Some(TelemetryEvent::Metrics(samples))
}

mod v85 {
    //! V85 wire shapes: no resource type on request-sent, console line in
    //! `message.line`.

    use super::*;

    pub(super) fn normalize(event: &CdpEvent) -> Option<TelemetryEvent> {
        match event.method.as_str() {
            "Network.requestWillBeSent" => request_sent(&event.params),
            "Network.responseReceived" => super::response_received(&event.params),
            "Network.loadingFailed" => super::loading_failed(&event.params),
            "Console.messageAdded" => message_added(&event.params),
            "Performance.metrics" => metrics_from_pairs(&event.params),
            _ => None,
        }
    }

    fn request_sent(params: &Value) -> Option<TelemetryEvent> {
        let request_id = params.get("requestId")?.as_str()?;
        let request = params.get("request")?;
        let url = request.get("url")?.as_str()?;
        let method = request.get("method")?.as_str()?;

        Some(TelemetryEvent::RequestSent(NetworkRequest::pending(
            request_id.into(),
            url,
            method,
            "",
        )))
    }

    fn message_added(params: &Value) -> Option<TelemetryEvent> {
        let message = params.get("message")?;
        let text = message.get("text")?.as_str()?;
        let level = message.get("level")?.as_str()?;
        let url = message
            .get("url")
            .and_then(|v| v.as_str())
            .unwrap_or_default();
        let line_number = message.get("line").and_then(|v| v.as_u64()).unwrap_or(0);

        Some(TelemetryEvent::Console(ConsoleMessage {
            level: ConsoleLevel::parse(level),
            text: text.to_string(),
            url: url.to_string(),
            line_number,
            timestamp: chrono::Utc::now(),
        }))
    }
}

mod v112 {
    //! V112 wire shapes: resource type arrives as `type` on request-sent,
    //! console line still in `message.line`.

    use super::*;

    pub(super) fn normalize(event: &CdpEvent) -> Option<TelemetryEvent> {
        match event.method.as_str() {
            "Network.requestWillBeSent" => request_sent(&event.params),
            "Network.responseReceived" => super::response_received(&event.params),
            "Network.loadingFailed" => super::loading_failed(&event.params),
            "Console.messageAdded" => message_added(&event.params),
            "Performance.metrics" => metrics_from_pairs(&event.params),
            _ => None,
        }
    }

    fn request_sent(params: &Value) -> Option<TelemetryEvent> {
        let request_id = params.get("requestId")?.as_str()?;
        let request = params.get("request")?;
        let url = request.get("url")?.as_str()?;
        let method = request.get("method")?.as_str()?;
        let resource_type = params
            .get("type")
            .and_then(|v| v.as_str())
            .unwrap_or_default();

        Some(TelemetryEvent::RequestSent(NetworkRequest::pending(
            request_id.into(),
            url,
            method,
            resource_type,
        )))
    }

    fn message_added(params: &Value) -> Option<TelemetryEvent> {
        let message = params.get("message")?;
        let text = message.get("text")?.as_str()?;
        let level = message.get("level")?.as_str()?;
        let url = message
            .get("url")
            .and_then(|v| v.as_str())
            .unwrap_or_default();
        let line_number = message.get("line").and_then(|v| v.as_u64()).unwrap_or(0);

        Some(TelemetryEvent::Console(ConsoleMessage {
            level: ConsoleLevel::parse(level),
            text: text.to_string(),
            url: url.to_string(),
            line_number,
            timestamp: chrono::Utc::now(),
        }))
    }
}

mod v120 {
    //! V120 wire shapes: as V112 except the console line number moved to
    //! `message.lineNumber`.

    use super::*;

    pub(super) fn normalize(event: &CdpEvent) -> Option<TelemetryEvent> {
        match event.method.as_str() {
            "Network.requestWillBeSent" => request_sent(&event.params),
            "Network.responseReceived" => super::response_received(&event.params),
            "Network.loadingFailed" => super::loading_failed(&event.params),
            "Console.messageAdded" => message_added(&event.params),
            "Performance.metrics" => metrics_from_pairs(&event.params),
            _ => None,
        }
    }

    fn request_sent(params: &Value) -> Option<TelemetryEvent> {
        let request_id = params.get("requestId")?.as_str()?;
        let request = params.get("request")?;
        let url = request.get("url")?.as_str()?;
        let method = request.get("method")?.as_str()?;
        let resource_type = params
            .get("type")
            .and_then(|v| v.as_str())
            .unwrap_or_default();

        Some(TelemetryEvent::RequestSent(NetworkRequest::pending(
            request_id.into(),
            url,
            method,
            resource_type,
        )))
    }

    fn message_added(params: &Value) -> Option<TelemetryEvent> {
        let message = params.get("message")?;
        let text = message.get("text")?.as_str()?;
        let level = message.get("level")?.as_str()?;
        let url = message
            .get("url")
            .and_then(|v| v.as_str())
            .unwrap_or_default();
        let line_number = message
            .get("lineNumber")
            .and_then(|v| v.as_u64())
            .unwrap_or(0);

        Some(TelemetryEvent::Console(ConsoleMessage {
            level: ConsoleLevel::parse(level),
            text: text.to_string(),
            url: url.to_string(),
            line_number,
            timestamp: chrono::Utc::now(),
        }))
    }
}
