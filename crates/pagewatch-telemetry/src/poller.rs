//! Timer-driven performance metric snapshots.
//!
//! [`MetricsPoller`] spawns a background interval task. Every tick asks the
//! performance capability for a metrics snapshot, which the adapter
//! re-injects into the session event stream so samples arrive through the
//! same normalizer path as pushed events. Ticks are fire-and-forget: each
//! runs as its own task under a child cancellation token, overlapping
//! ticks are tolerated, and a failed tick logs a warning without stopping
//! the poller.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use pagewatch_browser::PerformanceCapability;

/// Recurring metrics snapshot driver for one monitored session.
///
/// `start` is one-shot per poller; `stop` is idempotent and also runs on
/// drop via the owning monitor's disposal.
pub struct MetricsPoller {
    cancel: CancellationToken,
    started: AtomicBool,
}

impl Default for MetricsPoller {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsPoller {
    pub fn new() -> Self {
        Self {
            cancel: CancellationToken::new(),
            started: AtomicBool::new(false),
        }
    }

    /// Begin polling. A second call on the same poller is ignored with a
    /// warning; construct a new poller per monitoring session instead.
    pub fn start(&self, interval: Duration, performance: Arc<dyn PerformanceCapability>) {
        if self.started.swap(true, Ordering::SeqCst) {
            tracing::warn!("metrics poller already started; ignoring");
            return;
        }
        if self.cancel.is_cancelled() {
            tracing::warn!("metrics poller already stopped; ignoring start");
            return;
        }

        tracing::info!(interval_ms = interval.as_millis() as u64, "metrics poller started");

        let cancel = self.cancel.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        // Each tick is independently cancellable and never
                        // waited on; a slow endpoint can overlap ticks.
                        let tick_cancel = cancel.child_token();
                        let performance = Arc::clone(&performance);
                        tokio::spawn(async move {
                            tokio::select! {
                                _ = tick_cancel.cancelled() => {}
                                result = performance.request_metrics() => {
                                    if let Err(e) = result {
                                        tracing::warn!(error = %e, "metrics snapshot failed");
                                    }
                                }
                            }
                        });
                    }
                }
            }

            tracing::debug!("metrics poller loop exited");
        });
    }

    /// Cancel the interval task and any in-flight ticks. Idempotent.
    pub fn stop(&self) {
        if !self.cancel.is_cancelled() {
            tracing::info!("metrics poller stopped");
        }
        self.cancel.cancel();
    }

    pub fn is_running(&self) -> bool {
        self.started.load(Ordering::SeqCst) && !self.cancel.is_cancelled()
    }
}
