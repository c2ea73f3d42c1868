//! Telemetry collection and aggregation for browser-driven UI tests.
//!
//! This crate is the consumer side of the pagewatch instrumentation
//! layer. Given a debugging session from `pagewatch-browser`, a
//! [`PageMonitor`] resolves capabilities, binds the monitoring domains,
//! normalizes the event stream into the concurrent [`TelemetryStore`],
//! polls performance snapshots, and at teardown aggregates everything
//! into a serializable [`Report`] for an external reporting sink.
//!
//! # Lifecycle
//!
//! ```ignore
//! let session = Arc::new(CdpSession::connect(ws_url).await?);
//! let monitor = PageMonitor::setup(session, MonitorConfig::default()).await;
//!
//! // ... drive the page under test ...
//!
//! let report = monitor.process_results("checkout_flow", &screenshots).await;
//! reporting_sink.render(&report);
//! ```

pub mod aggregate;
pub mod monitor;
pub mod normalize;
pub mod poller;
pub mod report;
pub mod store;

pub use aggregate::TelemetryAggregator;
pub use monitor::PageMonitor;
pub use normalize::{EventNormalizer, TelemetryEvent};
pub use poller::MetricsPoller;
pub use report::{Alert, AlertCategory, Report, TimelineEntry, TimelineKind};
pub use store::{RequestOutcome, TelemetryStore};
