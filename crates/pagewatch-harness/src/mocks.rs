//! Mock implementations of the external collaborator boundaries.
//!
//! Provides lightweight, thread-safe test doubles:
//! - [`MockSession`]: a scriptable debugging session -- configurable
//!   generation tags, domain resolvability, command failures, a simulated
//!   page error buffer for the fallback path, and event injection
//! - [`MockScreenshots`]: records capture requests, optionally failing
//!
//! All mocks use `Arc<Mutex<_>>` for thread-safe interior mutability, so
//! they can be shared across async tasks safely.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::broadcast;

use pagewatch_browser::{BrowserError, CdpEvent, DebugSession};
use pagewatch_types::{Domain, ProtocolVersion, ScreenshotSink};

// ---------------------------------------------------------------------------
// MockSession
// ---------------------------------------------------------------------------

/// A buffered page error entry, as the fallback install script would
/// record it in page-local state.
#[derive(Debug, Clone)]
struct PageError {
    message: String,
    url: String,
    line: u64,
}

#[derive(Debug, Default)]
struct MockSessionInner {
    /// Every command method invoked, in order.
    invocations: Vec<String>,
    /// Every expression evaluated, in order.
    evaluations: Vec<String>,
    /// Simulated `window.__pagewatchErrors` buffer.
    page_errors: Vec<PageError>,
    /// Whether the fallback listener script was installed.
    fallback_installed: bool,
}

/// Scriptable [`DebugSession`] double.
///
/// Built via [`MockSessionBuilder`]; defaults to advertising every
/// supported generation with all domains resolvable and all commands
/// succeeding.
pub struct MockSession {
    versions: Vec<String>,
    resolvable: HashSet<(ProtocolVersion, Domain)>,
    failing_methods: HashSet<String>,
    connectivity: bool,
    metrics: Vec<(String, String)>,
    inner: Arc<Mutex<MockSessionInner>>,
    event_tx: broadcast::Sender<CdpEvent>,
}

impl MockSession {
    pub fn builder() -> MockSessionBuilder {
        MockSessionBuilder::new()
    }

    /// A fully-featured session bound to one generation.
    pub fn rich(version: ProtocolVersion) -> Arc<Self> {
        MockSessionBuilder::new()
            .with_version(version.tag())
            .with_all_domains(version)
            .build()
    }

    /// A session with no rich debugging interface at all.
    pub fn bare() -> Arc<Self> {
        MockSessionBuilder::new().build()
    }

    /// Command methods invoked so far, in order.
    pub fn invocations(&self) -> Vec<String> {
        self.inner.lock().expect("mock session lock poisoned").invocations.clone()
    }

    /// Expressions evaluated so far, in order.
    pub fn evaluations(&self) -> Vec<String> {
        self.inner.lock().expect("mock session lock poisoned").evaluations.clone()
    }

    pub fn fallback_installed(&self) -> bool {
        self.inner.lock().expect("mock session lock poisoned").fallback_installed
    }

    /// Append an entry to the simulated page error buffer.
    pub fn push_page_error(&self, message: &str, url: &str, line: u64) {
        self.inner
            .lock()
            .expect("mock session lock poisoned")
            .page_errors
            .push(PageError {
                message: message.to_string(),
                url: url.to_string(),
                line,
            });
    }

    fn page_errors_json(&self) -> Value {
        let inner = self.inner.lock().expect("mock session lock poisoned");
        Value::Array(
            inner
                .page_errors
                .iter()
                .map(|e| {
                    serde_json::json!({
                        "message": e.message,
                        "url": e.url,
                        "line": e.line,
                        "timestamp": chrono::Utc::now().to_rfc3339(),
                    })
                })
                .collect(),
        )
    }
}

#[async_trait]
impl DebugSession for MockSession {
    fn version_tags(&self) -> Vec<String> {
        self.versions.clone()
    }

    fn domain_resolves(&self, version: ProtocolVersion, domain: Domain) -> bool {
        self.resolvable.contains(&(version, domain))
    }

    async fn invoke(&self, method: &str, _params: Value) -> Result<Value, BrowserError> {
        self.inner
            .lock()
            .expect("mock session lock poisoned")
            .invocations
            .push(method.to_string());

        if self.failing_methods.contains(method) {
            return Err(BrowserError::CdpError {
                code: -32601,
                message: format!("'{method}' wasn't found"),
                data: None,
            });
        }

        if method == "Performance.getMetrics" {
            let metrics: Vec<Value> = self
                .metrics
                .iter()
                .map(|(name, value)| serde_json::json!({ "name": name, "value": value }))
                .collect();
            return Ok(serde_json::json!({ "metrics": metrics }));
        }

        Ok(Value::Null)
    }

    fn subscribe(&self) -> broadcast::Receiver<CdpEvent> {
        self.event_tx.subscribe()
    }

    fn emit(&self, event: CdpEvent) {
        // No subscribers is fine in tests that only exercise commands.
        let _ = self.event_tx.send(event);
    }

    async fn evaluate(&self, expression: &str) -> Result<Value, BrowserError> {
        let mut inner = self.inner.lock().expect("mock session lock poisoned");
        inner.evaluations.push(expression.to_string());

        if expression.contains("addEventListener('error'") {
            inner.fallback_installed = true;
            return Ok(Value::Null);
        }
        if expression.contains("__pagewatchErrors") {
            drop(inner);
            return Ok(self.page_errors_json());
        }
        Ok(Value::Null)
    }

    async fn connectivity(&self) -> bool {
        self.connectivity
    }
}

/// Fluent builder for [`MockSession`].
pub struct MockSessionBuilder {
    versions: Vec<String>,
    resolvable: HashSet<(ProtocolVersion, Domain)>,
    failing_methods: HashSet<String>,
    connectivity: bool,
    metrics: Vec<(String, String)>,
}

impl Default for MockSessionBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl MockSessionBuilder {
    pub fn new() -> Self {
        Self {
            versions: Vec::new(),
            resolvable: HashSet::new(),
            failing_methods: HashSet::new(),
            connectivity: true,
            metrics: vec![("Documents".to_string(), "1".to_string())],
        }
    }

    /// Advertise a generation tag. Tags need not be valid generations;
    /// the registry is expected to skip garbage.
    pub fn with_version(mut self, tag: &str) -> Self {
        self.versions.push(tag.to_string());
        self
    }

    /// Mark a single (version, domain) pair resolvable.
    pub fn with_domain(mut self, version: ProtocolVersion, domain: Domain) -> Self {
        self.resolvable.insert((version, domain));
        self
    }

    /// Mark all four domains resolvable under a generation.
    pub fn with_all_domains(mut self, version: ProtocolVersion) -> Self {
        for domain in Domain::ALL {
            self.resolvable.insert((version, domain));
        }
        self
    }

    /// Script a command method to fail with a method-not-found error.
    pub fn failing_method(mut self, method: &str) -> Self {
        self.failing_methods.insert(method.to_string());
        self
    }

    pub fn with_connectivity(mut self, reachable: bool) -> Self {
        self.connectivity = reachable;
        self
    }

    /// Replace the metric pairs returned by snapshot commands.
    pub fn with_metrics(mut self, pairs: &[(&str, &str)]) -> Self {
        self.metrics = pairs
            .iter()
            .map(|(name, value)| (name.to_string(), value.to_string()))
            .collect();
        self
    }

    pub fn build(self) -> Arc<MockSession> {
        let (event_tx, _) = broadcast::channel(256);
        Arc::new(MockSession {
            versions: self.versions,
            resolvable: self.resolvable,
            failing_methods: self.failing_methods,
            connectivity: self.connectivity,
            metrics: self.metrics,
            inner: Arc::new(Mutex::new(MockSessionInner::default())),
            event_tx,
        })
    }
}

// ---------------------------------------------------------------------------
// MockScreenshots
// ---------------------------------------------------------------------------

/// Screenshot sink double that records requested prefixes.
#[derive(Default)]
pub struct MockScreenshots {
    captures: Mutex<Vec<String>>,
    fail: bool,
}

impl MockScreenshots {
    pub fn new() -> Self {
        Self::default()
    }

    /// A sink whose captures always fail (empty path).
    pub fn failing() -> Self {
        Self {
            captures: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    /// Prefixes captured so far, in order.
    pub fn captured(&self) -> Vec<String> {
        self.captures.lock().expect("mock screenshots lock poisoned").clone()
    }
}

#[async_trait]
impl ScreenshotSink for MockScreenshots {
    async fn capture(&self, prefix: &str) -> PathBuf {
        self.captures
            .lock()
            .expect("mock screenshots lock poisoned")
            .push(prefix.to_string());
        if self.fail {
            PathBuf::new()
        } else {
            PathBuf::from(format!("screenshots/{prefix}_20260101_000000.png"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn failing_method_errors_and_is_recorded() {
        let session = MockSession::builder()
            .with_version("V120")
            .failing_method("Network.enable")
            .build();

        let result = session.invoke("Network.enable", Value::Null).await;
        assert!(result.is_err());
        assert_eq!(session.invocations(), ["Network.enable"]);
    }

    #[tokio::test]
    async fn page_error_buffer_round_trips_through_evaluate() {
        let session = MockSession::bare();
        session.push_page_error("boom", "https://example.com/app.js", 3);

        let value = session.evaluate("window.__pagewatchErrors || []").await.unwrap();
        let entries = value.as_array().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0]["message"], "boom");
        assert_eq!(entries[0]["line"], 3);
    }

    #[tokio::test]
    async fn install_script_flips_installed_flag() {
        let session = MockSession::bare();
        assert!(!session.fallback_installed());
        session
            .evaluate("window.addEventListener('error', function (e) {});")
            .await
            .unwrap();
        assert!(session.fallback_installed());
    }

    #[tokio::test]
    async fn mock_screenshots_record_prefixes() {
        let sink = MockScreenshots::new();
        let path = sink.capture("login_final").await;
        assert!(!path.as_os_str().is_empty());
        assert_eq!(sink.captured(), ["login_final"]);

        let failing = MockScreenshots::failing();
        assert!(failing.capture("x").await.as_os_str().is_empty());
    }
}
