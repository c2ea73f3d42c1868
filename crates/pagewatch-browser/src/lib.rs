//! Browser-side plumbing for pagewatch telemetry.
//!
//! This crate owns everything that touches the browser's remote debugging
//! interface:
//!
//! - **`cdp`**: low-level WebSocket client with JSON-RPC 2.0
//!   command/response correlation and broadcast event fan-out.
//! - **`session`**: the [`DebugSession`] boundary trait and its live
//!   [`CdpSession`] implementation with generation/domain discovery.
//! - **`capability`**: capability traits per debugging domain and one
//!   concrete adapter per supported protocol generation, resolved once per
//!   session by [`CapabilityRegistry`].
//! - **`binder`**: the idempotent, non-throwing enable/disable state
//!   machine over a resolved adapter set.
//! - **`fallback`**: degraded in-page error collection for endpoints
//!   without the rich interface.
//! - **`screenshot`**: `Page.captureScreenshot`-backed implementation of
//!   the `ScreenshotSink` collaborator boundary.
//!
//! # Browser setup
//!
//! The browser must expose its remote debugging port:
//!
//! ```sh
//! google-chrome --remote-debugging-port=9222
//! ```
//!
//! Query `http://localhost:9222/json` for page targets and hand the
//! WebSocket URL to [`CdpSession::connect`].

pub mod binder;
pub mod capability;
pub mod cdp;
pub mod error;
pub mod fallback;
pub mod screenshot;
pub mod session;

pub use binder::{DomainBinder, DomainState};
pub use capability::{
    CapabilityRegistry, ConsoleCapability, NetworkCapability, PerformanceCapability,
    ResolvedCapabilities, METRICS_EVENT,
};
pub use cdp::{CdpClient, CdpEvent};
pub use error::BrowserError;
pub use fallback::FallbackCollector;
pub use screenshot::CdpScreenshots;
pub use session::{CdpSession, DebugSession, SharedSession};
