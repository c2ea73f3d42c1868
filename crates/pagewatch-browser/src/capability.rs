//! Capability resolution across protocol generations.
//!
//! The automation endpoint exposes several incompatible generations of the
//! same debugging domains. Rather than probing event shapes at runtime, one
//! capability trait exists per logical domain and one concrete adapter per
//! supported generation; [`CapabilityRegistry::resolve`] picks the newest
//! generation for which every required domain resolves, once, at session
//! start. A generation is never partially bound: either all four domains
//! resolve under it or the registry moves on to the next candidate.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use pagewatch_types::{protocol::parse_version_number, Domain, ProtocolVersion};

use crate::cdp::CdpEvent;
use crate::error::BrowserError;
use crate::session::{DebugSession as _, SharedSession};

// ---------------------------------------------------------------------------
// Capability traits
// ---------------------------------------------------------------------------

/// Version-specific binding to the network domain's commands.
#[async_trait]
pub trait NetworkCapability: Send + Sync {
    async fn enable(&self) -> Result<(), BrowserError>;
    async fn disable(&self) -> Result<(), BrowserError>;
}

/// Version-specific binding to the console domain's commands.
#[async_trait]
pub trait ConsoleCapability: Send + Sync {
    async fn enable(&self) -> Result<(), BrowserError>;
    async fn disable(&self) -> Result<(), BrowserError>;
}

/// Version-specific binding to the performance domain's commands.
#[async_trait]
pub trait PerformanceCapability: Send + Sync {
    async fn enable(&self) -> Result<(), BrowserError>;
    async fn disable(&self) -> Result<(), BrowserError>;

    /// Request a metrics snapshot.
    ///
    /// The snapshot result is re-injected into the session's event stream
    /// as a metrics-received event, so polled and pushed metrics share one
    /// ingestion path.
    async fn request_metrics(&self) -> Result<(), BrowserError>;
}

/// The full set of adapters bound for one resolved generation.
pub struct ResolvedCapabilities {
    pub version: ProtocolVersion,
    pub network: Arc<dyn NetworkCapability>,
    pub console: Arc<dyn ConsoleCapability>,
    pub performance: Arc<dyn PerformanceCapability>,
}

impl std::fmt::Debug for ResolvedCapabilities {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedCapabilities")
            .field("version", &self.version)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// CapabilityRegistry
// ---------------------------------------------------------------------------

/// Resolves the newest fully-usable protocol generation for a session.
pub struct CapabilityRegistry;

impl CapabilityRegistry {
    /// Pick the newest advertised generation under which all four domains
    /// (network, console, performance, runtime support) resolve.
    ///
    /// Returns `None` when no generation qualifies; callers degrade to the
    /// fallback collector. This is logged as plain info, not an error --
    /// an endpoint without the rich interface is an expected environment.
    pub fn resolve(session: &SharedSession) -> Option<ResolvedCapabilities> {
        let mut candidates: Vec<(u32, String)> = session
            .version_tags()
            .into_iter()
            .filter_map(|tag| match parse_version_number(&tag) {
                Some(number) => Some((number, tag)),
                None => {
                    tracing::debug!(tag = %tag, "ignoring unparseable generation tag");
                    None
                }
            })
            .collect();

        // Newest generation first.
        candidates.sort_by(|a, b| b.0.cmp(&a.0));

        if candidates.is_empty() {
            tracing::info!("endpoint advertises no protocol generations; using fallback");
            return None;
        }

        for (_, tag) in &candidates {
            let Some(version) = ProtocolVersion::from_tag(tag) else {
                tracing::debug!(tag = %tag, "no compiled-in adapters for generation");
                continue;
            };

            let missing: Vec<&str> = Domain::ALL
                .iter()
                .filter(|d| !session.domain_resolves(version, **d))
                .map(|d| d.name())
                .collect();

            if missing.is_empty() {
                tracing::info!(version = %version, "resolved all domain adapters");
                return Some(Self::bind(version, session));
            }

            tracing::debug!(
                version = %version,
                missing = ?missing,
                "generation rejected; not all domains resolve"
            );
        }

        tracing::info!("no generation fully resolves; using fallback");
        None
    }

    /// Construct the adapter set for a selected generation.
    ///
    /// The exhaustive match is the one place generation selection happens;
    /// everything downstream works with the trait objects.
    fn bind(version: ProtocolVersion, session: &SharedSession) -> ResolvedCapabilities {
        match version {
            ProtocolVersion::V85 => ResolvedCapabilities {
                version,
                network: Arc::new(NetworkV85 { session: Arc::clone(session) }),
                console: Arc::new(ConsoleV85 { session: Arc::clone(session) }),
                performance: Arc::new(PerformanceV85 { session: Arc::clone(session) }),
            },
            ProtocolVersion::V112 => ResolvedCapabilities {
                version,
                network: Arc::new(NetworkV112 { session: Arc::clone(session) }),
                console: Arc::new(ConsoleV112 { session: Arc::clone(session) }),
                performance: Arc::new(PerformanceV112 { session: Arc::clone(session) }),
            },
            ProtocolVersion::V120 => ResolvedCapabilities {
                version,
                network: Arc::new(NetworkV120 { session: Arc::clone(session) }),
                console: Arc::new(ConsoleV120 { session: Arc::clone(session) }),
                performance: Arc::new(PerformanceV120 { session: Arc::clone(session) }),
            },
        }
    }
}

// ---------------------------------------------------------------------------
// Network adapters
// ---------------------------------------------------------------------------

/// V85 network binding: plain enable, no buffer hints.
struct NetworkV85 {
    session: SharedSession,
}

#[async_trait]
impl NetworkCapability for NetworkV85 {
    async fn enable(&self) -> Result<(), BrowserError> {
        self.session.invoke("Network.enable", serde_json::json!({})).await?;
        Ok(())
    }

    async fn disable(&self) -> Result<(), BrowserError> {
        self.session.invoke("Network.disable", serde_json::json!({})).await?;
        Ok(())
    }
}

/// V112/V120 network binding: enable accepts response buffer sizing.
struct NetworkV112 {
    session: SharedSession,
}

#[async_trait]
impl NetworkCapability for NetworkV112 {
    async fn enable(&self) -> Result<(), BrowserError> {
        self.session
            .invoke(
                "Network.enable",
                serde_json::json!({
                    "maxTotalBufferSize": 10_000_000,
                    "maxResourceBufferSize": 5_000_000,
                }),
            )
            .await?;
        Ok(())
    }

    async fn disable(&self) -> Result<(), BrowserError> {
        self.session.invoke("Network.disable", serde_json::json!({})).await?;
        Ok(())
    }
}

struct NetworkV120 {
    session: SharedSession,
}

#[async_trait]
impl NetworkCapability for NetworkV120 {
    async fn enable(&self) -> Result<(), BrowserError> {
        self.session
            .invoke(
                "Network.enable",
                serde_json::json!({
                    "maxTotalBufferSize": 10_000_000,
                    "maxResourceBufferSize": 5_000_000,
                }),
            )
            .await?;
        Ok(())
    }

    async fn disable(&self) -> Result<(), BrowserError> {
        self.session.invoke("Network.disable", serde_json::json!({})).await?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Console adapters
// ---------------------------------------------------------------------------

struct ConsoleV85 {
    session: SharedSession,
}

#[async_trait]
impl ConsoleCapability for ConsoleV85 {
    async fn enable(&self) -> Result<(), BrowserError> {
        self.session.invoke("Console.enable", serde_json::json!({})).await?;
        Ok(())
    }

    async fn disable(&self) -> Result<(), BrowserError> {
        self.session.invoke("Console.disable", serde_json::json!({})).await?;
        Ok(())
    }
}

struct ConsoleV112 {
    session: SharedSession,
}

#[async_trait]
impl ConsoleCapability for ConsoleV112 {
    async fn enable(&self) -> Result<(), BrowserError> {
        self.session.invoke("Console.enable", serde_json::json!({})).await?;
        Ok(())
    }

    async fn disable(&self) -> Result<(), BrowserError> {
        self.session.invoke("Console.disable", serde_json::json!({})).await?;
        Ok(())
    }
}

/// V120 console binding: the buffer is cleared on disable so a reattached
/// session does not replay stale messages.
struct ConsoleV120 {
    session: SharedSession,
}

#[async_trait]
impl ConsoleCapability for ConsoleV120 {
    async fn enable(&self) -> Result<(), BrowserError> {
        self.session.invoke("Console.enable", serde_json::json!({})).await?;
        Ok(())
    }

    async fn disable(&self) -> Result<(), BrowserError> {
        self.session.invoke("Console.clearMessages", serde_json::json!({})).await?;
        self.session.invoke("Console.disable", serde_json::json!({})).await?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Performance adapters
// ---------------------------------------------------------------------------

/// Method name for the synthetic metrics-received event produced from
/// snapshot responses. Matches the shape pushed by the browser itself.
pub const METRICS_EVENT: &str = "Performance.metrics";

async fn snapshot_metrics(session: &SharedSession) -> Result<(), BrowserError> {
    let result = session.invoke("Performance.getMetrics", serde_json::json!({})).await?;
    session.emit(CdpEvent {
        method: METRICS_EVENT.to_string(),
        params: result,
    });
    Ok(())
}

/// V85 performance binding: no time-domain support.
struct PerformanceV85 {
    session: SharedSession,
}

#[async_trait]
impl PerformanceCapability for PerformanceV85 {
    async fn enable(&self) -> Result<(), BrowserError> {
        self.session.invoke("Performance.enable", serde_json::json!({})).await?;
        Ok(())
    }

    async fn disable(&self) -> Result<(), BrowserError> {
        self.session.invoke("Performance.disable", serde_json::json!({})).await?;
        Ok(())
    }

    async fn request_metrics(&self) -> Result<(), BrowserError> {
        snapshot_metrics(&self.session).await
    }
}

/// V112/V120 performance binding: enable pins the thread-ticks time domain
/// so samples are comparable across snapshots.
struct PerformanceV112 {
    session: SharedSession,
}

#[async_trait]
impl PerformanceCapability for PerformanceV112 {
    async fn enable(&self) -> Result<(), BrowserError> {
        self.session
            .invoke(
                "Performance.enable",
                serde_json::json!({ "timeDomain": "threadTicks" }),
            )
            .await?;
        Ok(())
    }

    async fn disable(&self) -> Result<(), BrowserError> {
        self.session.invoke("Performance.disable", serde_json::json!({})).await?;
        Ok(())
    }

    async fn request_metrics(&self) -> Result<(), BrowserError> {
        snapshot_metrics(&self.session).await
    }
}

struct PerformanceV120 {
    session: SharedSession,
}

#[async_trait]
impl PerformanceCapability for PerformanceV120 {
    async fn enable(&self) -> Result<(), BrowserError> {
        self.session
            .invoke(
                "Performance.enable",
                serde_json::json!({ "timeDomain": "threadTicks" }),
            )
            .await?;
        Ok(())
    }

    async fn disable(&self) -> Result<(), BrowserError> {
        self.session.invoke("Performance.disable", serde_json::json!({})).await?;
        Ok(())
    }

    async fn request_metrics(&self) -> Result<(), BrowserError> {
        snapshot_metrics(&self.session).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::DebugSession;
    use std::collections::HashSet;
    use std::sync::Mutex;
    use tokio::sync::broadcast;

    /// Minimal scriptable session: a set of advertised tags and a set of
    /// (version, domain) pairs that resolve.
    struct StubSession {
        tags: Vec<String>,
        resolvable: HashSet<(ProtocolVersion, Domain)>,
        invoked: Mutex<Vec<String>>,
        events: broadcast::Sender<CdpEvent>,
    }

    impl StubSession {
        fn new(tags: &[&str], resolvable: &[(ProtocolVersion, Domain)]) -> Arc<Self> {
            let (events, _) = broadcast::channel(16);
            Arc::new(Self {
                tags: tags.iter().map(|t| t.to_string()).collect(),
                resolvable: resolvable.iter().copied().collect(),
                invoked: Mutex::new(Vec::new()),
                events,
            })
        }

        fn all_domains(tags: &[&str], versions: &[ProtocolVersion]) -> Arc<Self> {
            let resolvable: Vec<(ProtocolVersion, Domain)> = versions
                .iter()
                .flat_map(|v| Domain::ALL.iter().map(move |d| (*v, *d)))
                .collect();
            Self::new(tags, &resolvable)
        }
    }

    #[async_trait]
    impl DebugSession for StubSession {
        fn version_tags(&self) -> Vec<String> {
            self.tags.clone()
        }

        fn domain_resolves(&self, version: ProtocolVersion, domain: Domain) -> bool {
            self.resolvable.contains(&(version, domain))
        }

        async fn invoke(&self, method: &str, _params: Value) -> Result<Value, BrowserError> {
            self.invoked.lock().unwrap().push(method.to_string());
            if method == "Performance.getMetrics" {
                return Ok(serde_json::json!({
                    "metrics": [{ "name": "Documents", "value": 2 }]
                }));
            }
            Ok(Value::Null)
        }

        fn subscribe(&self) -> broadcast::Receiver<CdpEvent> {
            self.events.subscribe()
        }

        fn emit(&self, event: CdpEvent) {
            let _ = self.events.send(event);
        }

        async fn evaluate(&self, _expression: &str) -> Result<Value, BrowserError> {
            Ok(Value::Null)
        }

        async fn connectivity(&self) -> bool {
            true
        }
    }

    #[test]
    fn picks_newest_fully_resolvable_generation() {
        // V120 is advertised but incomplete; V112 resolves everything;
        // V85 also resolves but must never win over V112.
        let mut resolvable = vec![(ProtocolVersion::V120, Domain::Network)];
        for domain in Domain::ALL {
            resolvable.push((ProtocolVersion::V112, domain));
            resolvable.push((ProtocolVersion::V85, domain));
        }
        let session = StubSession::new(&["V85", "V112", "V120"], &resolvable);
        let shared: SharedSession = session;

        let caps = CapabilityRegistry::resolve(&shared).unwrap();
        assert_eq!(caps.version, ProtocolVersion::V112);
    }

    #[test]
    fn rejects_partially_resolvable_generations_entirely() {
        // Every advertised generation is missing at least one domain.
        let resolvable = vec![
            (ProtocolVersion::V120, Domain::Network),
            (ProtocolVersion::V112, Domain::Console),
            (ProtocolVersion::V85, Domain::Runtime),
        ];
        let session = StubSession::new(&["V85", "V112", "V120"], &resolvable);
        let shared: SharedSession = session;

        assert!(CapabilityRegistry::resolve(&shared).is_none());
    }

    #[test]
    fn no_advertised_versions_means_not_available() {
        let session = StubSession::new(&[], &[]);
        let shared: SharedSession = session;
        assert!(CapabilityRegistry::resolve(&shared).is_none());
    }

    #[test]
    fn unparseable_and_unknown_tags_are_skipped() {
        let session = StubSession::all_domains(&["stable", "V113", "V85"], &[ProtocolVersion::V85]);
        let shared: SharedSession = session;

        let caps = CapabilityRegistry::resolve(&shared).unwrap();
        assert_eq!(caps.version, ProtocolVersion::V85);
    }

    #[tokio::test]
    async fn snapshot_reinjects_metrics_event() {
        let session = StubSession::all_domains(&["V112"], &[ProtocolVersion::V112]);
        let shared: SharedSession = Arc::clone(&session) as SharedSession;
        let caps = CapabilityRegistry::resolve(&shared).unwrap();

        let mut rx = shared.subscribe();
        caps.performance.request_metrics().await.unwrap();

        let event = rx.recv().await.unwrap();
        assert_eq!(event.method, METRICS_EVENT);
        assert_eq!(event.params["metrics"][0]["name"], "Documents");
        assert!(session
            .invoked
            .lock()
            .unwrap()
            .contains(&"Performance.getMetrics".to_string()));
    }

    #[tokio::test]
    async fn v112_performance_enable_pins_time_domain() {
        let session = StubSession::all_domains(&["V112"], &[ProtocolVersion::V112]);
        let shared: SharedSession = Arc::clone(&session) as SharedSession;
        let caps = CapabilityRegistry::resolve(&shared).unwrap();

        caps.performance.enable().await.unwrap();
        let invoked = session.invoked.lock().unwrap();
        assert_eq!(*invoked, ["Performance.enable"]);
    }
}
