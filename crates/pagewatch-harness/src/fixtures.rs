//! Canned wire events per protocol generation.
//!
//! Builders for the event payload shapes each generation actually
//! delivers, so tests inject realistic traffic instead of hand-rolled
//! JSON. Shape differences between generations are deliberate and mirror
//! the adapters: V85 has no resource type on request-sent, V120 renamed
//! the console line field.

use serde_json::json;

use pagewatch_browser::CdpEvent;

fn event(method: &str, params: serde_json::Value) -> CdpEvent {
    CdpEvent {
        method: method.to_string(),
        params,
    }
}

pub mod v85 {
    use super::*;

    pub fn request_will_be_sent(id: &str, url: &str, method: &str) -> CdpEvent {
        event(
            "Network.requestWillBeSent",
            json!({
                "requestId": id,
                "request": { "url": url, "method": method },
            }),
        )
    }

    pub fn response_received(id: &str, status: u16, status_text: &str, mime_type: &str) -> CdpEvent {
        event(
            "Network.responseReceived",
            json!({
                "requestId": id,
                "response": { "status": status, "statusText": status_text, "mimeType": mime_type },
            }),
        )
    }

    pub fn loading_failed(id: &str, error_text: &str) -> CdpEvent {
        event(
            "Network.loadingFailed",
            json!({ "requestId": id, "errorText": error_text }),
        )
    }

    pub fn console_message(level: &str, text: &str, url: &str, line: u64) -> CdpEvent {
        event(
            "Console.messageAdded",
            json!({
                "message": { "level": level, "text": text, "url": url, "line": line },
            }),
        )
    }

    pub fn metrics(pairs: &[(&str, f64)]) -> CdpEvent {
        super::metrics_event(pairs)
    }
}

pub mod v112 {
    use super::*;

    pub fn request_will_be_sent(id: &str, url: &str, method: &str, resource_type: &str) -> CdpEvent {
        event(
            "Network.requestWillBeSent",
            json!({
                "requestId": id,
                "type": resource_type,
                "request": { "url": url, "method": method },
            }),
        )
    }

    pub fn response_received(id: &str, status: u16, status_text: &str, mime_type: &str) -> CdpEvent {
        super::v85::response_received(id, status, status_text, mime_type)
    }

    pub fn loading_failed(id: &str, error_text: &str) -> CdpEvent {
        super::v85::loading_failed(id, error_text)
    }

    pub fn console_message(level: &str, text: &str, url: &str, line: u64) -> CdpEvent {
        super::v85::console_message(level, text, url, line)
    }

    pub fn metrics(pairs: &[(&str, f64)]) -> CdpEvent {
        super::metrics_event(pairs)
    }
}

pub mod v120 {
    use super::*;

    pub fn request_will_be_sent(id: &str, url: &str, method: &str, resource_type: &str) -> CdpEvent {
        super::v112::request_will_be_sent(id, url, method, resource_type)
    }

    pub fn response_received(id: &str, status: u16, status_text: &str, mime_type: &str) -> CdpEvent {
        super::v85::response_received(id, status, status_text, mime_type)
    }

    pub fn loading_failed(id: &str, error_text: &str) -> CdpEvent {
        super::v85::loading_failed(id, error_text)
    }

    pub fn console_message(level: &str, text: &str, url: &str, line: u64) -> CdpEvent {
        event(
            "Console.messageAdded",
            json!({
                "message": { "level": level, "text": text, "url": url, "lineNumber": line },
            }),
        )
    }

    pub fn metrics(pairs: &[(&str, f64)]) -> CdpEvent {
        super::metrics_event(pairs)
    }
}

fn metrics_event(pairs: &[(&str, f64)]) -> CdpEvent {
    let metrics: Vec<serde_json::Value> = pairs
        .iter()
        .map(|(name, value)| json!({ "name": name, "value": value }))
        .collect();
    event("Performance.metrics", json!({ "metrics": metrics }))
}
