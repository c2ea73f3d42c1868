//! Error types shared across the pagewatch crates.

/// Errors surfaced by the telemetry layer.
///
/// Nothing here is fatal to a surrounding test run; every failure path
/// degrades to fewer telemetry records or fallback collection.
#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("debugging session error: {0}")]
    Session(String),

    #[error("capability resolution error: {0}")]
    Capability(String),
}
