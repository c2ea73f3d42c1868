//! Screenshot capture collaborator boundary.
//!
//! The telemetry layer recommends captures but never performs them; a
//! [`ScreenshotSink`] implementation owns persistence. Failures are
//! non-fatal by contract.

use std::path::PathBuf;

use async_trait::async_trait;

/// External screenshot capture collaborator.
///
/// `capture` persists a raster image named `{prefix}_{timestamp}.png`
/// under the sink's directory and returns its path. On failure it returns
/// an empty path; implementations log a warning and never propagate the
/// error.
#[async_trait]
pub trait ScreenshotSink: Send + Sync {
    async fn capture(&self, prefix: &str) -> PathBuf;
}
