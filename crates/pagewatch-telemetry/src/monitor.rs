//! The per-session monitoring facade.
//!
//! One [`PageMonitor`] owns everything for one browser session: the
//! capability resolution result, the domain binder, the telemetry store,
//! the dispatch task feeding it, the metrics poller, and the fallback
//! collector. There is no process-wide state; construct one monitor per
//! session and pass it by reference, which keeps parallel test runs
//! isolated by construction.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use pagewatch_browser::{
    CapabilityRegistry, DebugSession, DomainBinder, FallbackCollector, ResolvedCapabilities,
    SharedSession,
};
use pagewatch_types::{ConsoleMessage, Domain, MonitorConfig, ProtocolVersion, ScreenshotSink};

use crate::aggregate::TelemetryAggregator;
use crate::normalize::EventNormalizer;
use crate::poller::MetricsPoller;
use crate::report::Report;
use crate::store::TelemetryStore;

/// Instrumentation context for one monitored browser session.
pub struct PageMonitor {
    session: Mutex<Option<SharedSession>>,
    caps: Option<Arc<ResolvedCapabilities>>,
    binder: Option<DomainBinder>,
    store: Arc<TelemetryStore>,
    poller: MetricsPoller,
    config: MonitorConfig,
    session_id: Uuid,
    dispatch_cancel: CancellationToken,
    disposed: AtomicBool,
}

impl PageMonitor {
    /// Build a monitor for a session.
    ///
    /// Resolves capabilities once, starts the event dispatch task when the
    /// rich interface is available, and begins with a fresh store and all
    /// domains disabled. When resolution reports the interface is not
    /// available the monitor still works in fallback mode.
    pub fn new(session: SharedSession, config: MonitorConfig) -> Self {
        let session_id = Uuid::new_v4();
        let store = Arc::new(TelemetryStore::new());
        let dispatch_cancel = CancellationToken::new();

        let caps = CapabilityRegistry::resolve(&session).map(Arc::new);

        let binder = caps.as_ref().map(|caps| DomainBinder::new(Arc::clone(caps)));

        if let Some(caps) = &caps {
            let normalizer = EventNormalizer::new(caps.version);
            let mut events = session.subscribe();
            let store_for_dispatch = Arc::clone(&store);
            let cancel = dispatch_cancel.clone();

            // The dispatch task is the single ingestion path: browser
            // events and re-injected snapshot responses both land here.
            tokio::spawn(async move {
                loop {
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        received = events.recv() => match received {
                            Ok(event) => normalizer.apply(&event, &store_for_dispatch),
                            Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                                tracing::warn!(skipped, "telemetry dispatch lagged; events lost");
                            }
                            Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                        },
                    }
                }
                tracing::debug!("telemetry dispatch task exited");
            });

            tracing::info!(
                session = %session_id,
                version = %caps.version,
                "monitoring session started (rich interface)"
            );
        } else {
            tracing::info!(
                session = %session_id,
                "monitoring session started (fallback mode)"
            );
        }

        Self {
            session: Mutex::new(Some(session)),
            caps,
            binder,
            store,
            poller: MetricsPoller::new(),
            config,
            session_id,
            dispatch_cancel,
            disposed: AtomicBool::new(false),
        }
    }

    /// Convenience constructor mirroring the usual test-fixture setup:
    /// probe connectivity, then either enable network monitoring or
    /// install the fallback collector.
    pub async fn setup(session: SharedSession, config: MonitorConfig) -> Self {
        let monitor = Self::new(session, config);
        if monitor.is_rich() && monitor.test_connectivity().await {
            monitor.enable_network().await;
        } else {
            monitor.use_fallback().await;
        }
        monitor
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    /// Whether the rich debugging interface resolved for this session.
    pub fn is_rich(&self) -> bool {
        self.caps.is_some()
    }

    /// The protocol generation monitoring is bound to, when rich.
    pub fn protocol_version(&self) -> Option<ProtocolVersion> {
        self.caps.as_ref().map(|c| c.version)
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    /// Read access for aggregation; the store is never handed out
    /// mutably.
    pub fn store(&self) -> &TelemetryStore {
        &self.store
    }

    fn session(&self) -> Option<SharedSession> {
        self.session.lock().ok().and_then(|guard| guard.clone())
    }

    /// Cheap probe that the rich interface is reachable.
    pub async fn test_connectivity(&self) -> bool {
        match self.session() {
            Some(session) => session.connectivity().await,
            None => false,
        }
    }

    // -----------------------------------------------------------------------
    // Enable / disable
    // -----------------------------------------------------------------------

    pub async fn enable_network(&self) -> bool {
        self.enable(Domain::Network).await
    }

    pub async fn enable_console(&self) -> bool {
        self.enable(Domain::Console).await
    }

    /// Enable performance monitoring and start the snapshot poller.
    pub async fn enable_performance(&self) -> bool {
        if !self.enable(Domain::Performance).await {
            return false;
        }
        if let Some(caps) = &self.caps {
            self.poller
                .start(self.config.poll_interval(), Arc::clone(&caps.performance));
        }
        true
    }

    /// Enable all three monitoring domains, or install the fallback when
    /// the rich interface is unreachable.
    pub async fn enable_all(&self) -> bool {
        if self.is_rich() && self.test_connectivity().await {
            let network = self.enable_network().await;
            let console = self.enable_console().await;
            let performance = self.enable_performance().await;
            network && console && performance
        } else {
            self.use_fallback().await
        }
    }

    pub async fn disable_network(&self) -> bool {
        self.disable(Domain::Network).await
    }

    pub async fn disable_console(&self) -> bool {
        self.disable(Domain::Console).await
    }

    /// Stop the poller, then disable the performance domain.
    pub async fn disable_performance(&self) -> bool {
        self.poller.stop();
        self.disable(Domain::Performance).await
    }

    /// Best-effort disable of everything that is enabled.
    pub async fn disable_all(&self) {
        self.poller.stop();
        if let Some(binder) = &self.binder {
            binder.disable_all().await;
        }
        tracing::info!(session = %self.session_id, "all monitoring disabled");
    }

    pub fn is_enabled(&self, domain: Domain) -> bool {
        self.binder
            .as_ref()
            .map(|b| b.is_enabled(domain))
            .unwrap_or(false)
    }

    async fn enable(&self, domain: Domain) -> bool {
        match &self.binder {
            Some(binder) => binder.enable(domain).await,
            None => {
                tracing::info!(domain = %domain, "rich interface unavailable; enable skipped");
                false
            }
        }
    }

    async fn disable(&self, domain: Domain) -> bool {
        match &self.binder {
            Some(binder) => binder.disable(domain).await,
            // Nothing was ever enabled: disabling is a successful no-op.
            None => true,
        }
    }

    // -----------------------------------------------------------------------
    // Fallback collection
    // -----------------------------------------------------------------------

    /// Install the degraded in-page error listener.
    pub async fn use_fallback(&self) -> bool {
        match self.session() {
            Some(session) => FallbackCollector::new(session).install().await,
            None => false,
        }
    }

    /// Collect page-buffered errors from the fallback listener.
    ///
    /// The page buffer persists until the page unloads, so repeated
    /// collects can overlap.
    pub async fn collect_fallback_errors(&self) -> Vec<ConsoleMessage> {
        match self.session() {
            Some(session) => FallbackCollector::new(session).collect().await,
            None => Vec::new(),
        }
    }

    // -----------------------------------------------------------------------
    // Reporting and teardown
    // -----------------------------------------------------------------------

    /// Aggregate the store into a report payload.
    pub fn summarize(&self) -> Report {
        TelemetryAggregator::new(&self.store, &self.config).summarize(self.session_id)
    }

    /// End-of-test processing: summarize, capture the recommended
    /// screenshots (named `{test_name}_{slug}`), then disable everything
    /// and release the session.
    pub async fn process_results(&self, test_name: &str, screenshots: &dyn ScreenshotSink) -> Report {
        let report = self.summarize();

        for slug in &report.screenshots {
            let prefix = format!("{test_name}_{slug}");
            let path = screenshots.capture(&prefix).await;
            if path.as_os_str().is_empty() {
                tracing::warn!(prefix = %prefix, "recommended screenshot was not captured");
            }
        }

        self.dispose().await;
        report
    }

    /// Release everything: stop the poller, disable all domains, end the
    /// dispatch task, drop the session reference. Idempotent and safe
    /// after partial initialization; never panics.
    pub async fn dispose(&self) {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return;
        }

        self.poller.stop();
        if let Some(binder) = &self.binder {
            binder.disable_all().await;
        }
        self.dispatch_cancel.cancel();
        if let Ok(mut guard) = self.session.lock() {
            guard.take();
        }

        tracing::info!(session = %self.session_id, "monitoring session disposed");
    }
}
