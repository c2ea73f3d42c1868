//! Shared types for the pagewatch browser telemetry layer.
//!
//! This crate holds the vocabulary every other pagewatch crate speaks:
//! the three telemetry record kinds ([`NetworkRequest`], [`ConsoleMessage`],
//! [`PerformanceMetric`]), the protocol generation and domain enums used for
//! capability resolution, the [`MonitorConfig`] tuning knobs, the shared
//! error enum, and the [`ScreenshotSink`] collaborator boundary.

pub mod config;
pub mod error;
pub mod protocol;
pub mod record;
pub mod screenshot;

pub use config::MonitorConfig;
pub use error::TelemetryError;
pub use protocol::{Domain, ProtocolVersion};
pub use record::{
    ConsoleLevel, ConsoleMessage, NetworkRequest, PerformanceMetric, RequestId, RequestStatus,
};
pub use screenshot::ScreenshotSink;
