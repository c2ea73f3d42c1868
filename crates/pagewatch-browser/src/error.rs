//! Error types for the pagewatch-browser crate.

use std::time::Duration;

use thiserror::Error;

/// Errors that can occur talking to the browser's debugging endpoint.
#[derive(Debug, Error)]
pub enum BrowserError {
    /// Failed to establish a WebSocket connection to the debugging endpoint.
    #[error("failed to connect to debugging endpoint at {url}: {reason}")]
    ConnectionFailed { url: String, reason: String },

    /// A protocol command returned an error response.
    #[error("CDP error {code}: {message}")]
    CdpError {
        code: i64,
        message: String,
        data: Option<String>,
    },

    /// A protocol command timed out waiting for a response.
    #[error("CDP command '{method}' timed out after {duration:?}")]
    Timeout { method: String, duration: Duration },

    /// A protocol-level error (serialization, unexpected message format, etc.).
    #[error("CDP protocol error: {detail}")]
    Protocol { detail: String },

    /// Page-script evaluation threw an exception.
    #[error("JavaScript exception: {message}")]
    JsException { message: String },

    /// The session has already been released.
    #[error("debugging session is closed")]
    SessionClosed,
}
