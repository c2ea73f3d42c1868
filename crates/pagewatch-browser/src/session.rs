//! The browser debugging session boundary.
//!
//! [`DebugSession`] is the seam between the telemetry layer and whatever
//! actually speaks to a browser: the real [`CdpSession`] here, or a mock in
//! the test harness. Everything above this trait -- capability resolution,
//! domain binding, normalization, aggregation -- is transport-agnostic.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::broadcast;

use pagewatch_types::{Domain, ProtocolVersion};

use crate::cdp::{CdpClient, CdpEvent};
use crate::error::BrowserError;

/// A live connection to a browser's remote debugging interface.
///
/// The session advertises which protocol generations it exposes and which
/// domains resolve under them, carries commands, fans out events, and
/// executes page scripts (the degraded-path collaborator from the fallback
/// collector's point of view).
#[async_trait]
pub trait DebugSession: Send + Sync {
    /// Generation tags the endpoint advertises, e.g. `["V120", "V112"]`.
    /// Order is not significant; the capability registry sorts.
    fn version_tags(&self) -> Vec<String>;

    /// Whether `domain` resolves to a usable adapter under `version`.
    fn domain_resolves(&self, version: ProtocolVersion, domain: Domain) -> bool;

    /// Issue a protocol command and wait for its result.
    async fn invoke(&self, method: &str, params: Value) -> Result<Value, BrowserError>;

    /// Subscribe to the raw protocol event stream.
    fn subscribe(&self) -> broadcast::Receiver<CdpEvent>;

    /// Re-inject a synthetic event into the stream (snapshot responses).
    fn emit(&self, event: CdpEvent);

    /// Evaluate a script in the page context and return its value.
    async fn evaluate(&self, expression: &str) -> Result<Value, BrowserError>;

    /// Cheap probe that the rich debugging interface is reachable.
    async fn connectivity(&self) -> bool;
}

// ---------------------------------------------------------------------------
// CdpSession
// ---------------------------------------------------------------------------

/// [`DebugSession`] backed by a live CDP WebSocket connection.
///
/// On connect it performs two discovery commands: `Browser.getVersion` to
/// learn the endpoint's generation (every compiled-in generation at or
/// below the browser major is advertised), and `Schema.getDomains` to learn
/// which domains the target actually exposes. Either probe failing leaves
/// the corresponding answer empty, which downstream code treats as
/// "capability unavailable" rather than an error.
pub struct CdpSession {
    client: CdpClient,
    versions: Vec<String>,
    domains: HashSet<String>,
}

impl CdpSession {
    /// Connect to a page target's WebSocket endpoint and run discovery.
    pub async fn connect(ws_url: &str) -> Result<Self, BrowserError> {
        let client = CdpClient::connect(ws_url).await?;

        let versions = Self::discover_versions(&client).await;
        let domains = Self::discover_domains(&client).await;

        tracing::info!(
            versions = ?versions,
            domains = domains.len(),
            "debugging session discovery complete"
        );

        Ok(Self {
            client,
            versions,
            domains,
        })
    }

    /// Advertise every compiled-in generation the endpoint can serve.
    ///
    /// `Browser.getVersion` reports a product string like
    /// `"Chrome/120.0.6099.71"`; generations newer than the browser major
    /// cannot be served and are not advertised.
    async fn discover_versions(client: &CdpClient) -> Vec<String> {
        let result = match client.send_command("Browser.getVersion", serde_json::json!({})).await {
            Ok(v) => v,
            Err(e) => {
                tracing::info!(error = %e, "Browser.getVersion failed; no generations advertised");
                return Vec::new();
            }
        };

        let major = result
            .get("product")
            .and_then(|p| p.as_str())
            .and_then(parse_product_major);

        let Some(major) = major else {
            tracing::info!("could not parse browser product version; no generations advertised");
            return Vec::new();
        };

        ProtocolVersion::ALL
            .iter()
            .filter(|v| v.number() <= major)
            .map(|v| v.tag().to_string())
            .collect()
    }

    /// Ask the target which domains it exposes.
    async fn discover_domains(client: &CdpClient) -> HashSet<String> {
        let result = match client.send_command("Schema.getDomains", serde_json::json!({})).await {
            Ok(v) => v,
            Err(e) => {
                tracing::info!(error = %e, "Schema.getDomains failed; no domains resolvable");
                return HashSet::new();
            }
        };

        result
            .get("domains")
            .and_then(|d| d.as_array())
            .map(|domains| {
                domains
                    .iter()
                    .filter_map(|d| d.get("name").and_then(|n| n.as_str()))
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// Extract the major version from a product string like `"Chrome/120.0.1"`.
fn parse_product_major(product: &str) -> Option<u32> {
    let (_, version) = product.split_once('/')?;
    let major = version.split('.').next()?;
    major.parse().ok()
}

#[async_trait]
impl DebugSession for CdpSession {
    fn version_tags(&self) -> Vec<String> {
        self.versions.clone()
    }

    fn domain_resolves(&self, _version: ProtocolVersion, domain: Domain) -> bool {
        // A listed domain resolves under every advertised generation; the
        // generation cut happens in version_tags().
        self.domains.contains(domain.name())
    }

    async fn invoke(&self, method: &str, params: Value) -> Result<Value, BrowserError> {
        self.client.send_command(method, params).await
    }

    fn subscribe(&self) -> broadcast::Receiver<CdpEvent> {
        self.client.subscribe()
    }

    fn emit(&self, event: CdpEvent) {
        self.client.emit(event);
    }

    async fn evaluate(&self, expression: &str) -> Result<Value, BrowserError> {
        let result = self
            .client
            .send_command(
                "Runtime.evaluate",
                serde_json::json!({
                    "expression": expression,
                    "returnByValue": true,
                }),
            )
            .await?;

        if let Some(exception) = result.get("exceptionDetails") {
            let message = exception
                .get("exception")
                .and_then(|e| e.get("description"))
                .and_then(|d| d.as_str())
                .or_else(|| exception.get("text").and_then(|t| t.as_str()))
                .unwrap_or("unknown exception")
                .to_string();
            return Err(BrowserError::JsException { message });
        }

        Ok(result
            .get("result")
            .and_then(|r| r.get("value"))
            .cloned()
            .unwrap_or(Value::Null))
    }

    async fn connectivity(&self) -> bool {
        self.client
            .send_command_with_timeout(
                "Browser.getVersion",
                serde_json::json!({}),
                Duration::from_secs(5),
            )
            .await
            .is_ok()
    }
}

/// Shared handle type used throughout the telemetry layer.
pub type SharedSession = Arc<dyn DebugSession>;
