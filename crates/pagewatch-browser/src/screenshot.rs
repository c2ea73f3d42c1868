//! CDP-backed screenshot capture.
//!
//! Implements the [`ScreenshotSink`] collaborator boundary with
//! `Page.captureScreenshot`: the base64 payload is decoded and written as
//! `{prefix}_{timestamp}.png` under a target directory. Every failure path
//! returns an empty path after a logged warning; screenshots are never
//! worth failing a test run over.

use std::path::PathBuf;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as B64;
use base64::Engine as _;
use chrono::Utc;

use pagewatch_types::ScreenshotSink;

use crate::session::{DebugSession as _, SharedSession};

/// Screenshot sink writing PNG captures under a directory.
pub struct CdpScreenshots {
    session: SharedSession,
    dir: PathBuf,
}

impl CdpScreenshots {
    pub fn new(session: SharedSession, dir: impl Into<PathBuf>) -> Self {
        Self {
            session,
            dir: dir.into(),
        }
    }
}

#[async_trait]
impl ScreenshotSink for CdpScreenshots {
    async fn capture(&self, prefix: &str) -> PathBuf {
        let result = match self
            .session
            .invoke("Page.captureScreenshot", serde_json::json!({ "format": "png" }))
            .await
        {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(error = %e, prefix = prefix, "screenshot capture failed");
                return PathBuf::new();
            }
        };

        let Some(data) = result.get("data").and_then(|d| d.as_str()) else {
            tracing::warn!(prefix = prefix, "screenshot response carried no image data");
            return PathBuf::new();
        };

        let bytes = match B64.decode(data) {
            Ok(b) => b,
            Err(e) => {
                tracing::warn!(error = %e, prefix = prefix, "screenshot payload was not valid base64");
                return PathBuf::new();
            }
        };

        if let Err(e) = tokio::fs::create_dir_all(&self.dir).await {
            tracing::warn!(error = %e, dir = %self.dir.display(), "could not create screenshot dir");
            return PathBuf::new();
        }

        let timestamp = Utc::now().format("%Y%m%d_%H%M%S");
        let path = self.dir.join(format!("{prefix}_{timestamp}.png"));

        match tokio::fs::write(&path, bytes).await {
            Ok(()) => {
                tracing::info!(path = %path.display(), "screenshot saved");
                path
            }
            Err(e) => {
                tracing::warn!(error = %e, path = %path.display(), "failed to write screenshot");
                PathBuf::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cdp::CdpEvent;
    use crate::error::BrowserError;
    use crate::session::DebugSession;
    use pagewatch_types::{Domain, ProtocolVersion};
    use serde_json::Value;
    use std::sync::Arc;
    use tokio::sync::broadcast;

    /// Session stub answering only the screenshot command.
    struct ShotSession {
        data: Option<String>,
        events: broadcast::Sender<CdpEvent>,
    }

    impl ShotSession {
        fn with_png() -> Arc<Self> {
            // Minimal valid PNG header bytes, base64-encoded.
            let png = [0x89u8, b'P', b'N', b'G', b'\r', b'\n', 0x1a, b'\n'];
            let (events, _) = broadcast::channel(4);
            Arc::new(Self {
                data: Some(B64.encode(png)),
                events,
            })
        }

        fn without_data() -> Arc<Self> {
            let (events, _) = broadcast::channel(4);
            Arc::new(Self { data: None, events })
        }
    }

    #[async_trait]
    impl DebugSession for ShotSession {
        fn version_tags(&self) -> Vec<String> {
            vec![]
        }
        fn domain_resolves(&self, _version: ProtocolVersion, _domain: Domain) -> bool {
            false
        }
        async fn invoke(&self, method: &str, _params: Value) -> Result<Value, BrowserError> {
            assert_eq!(method, "Page.captureScreenshot");
            match &self.data {
                Some(data) => Ok(serde_json::json!({ "data": data })),
                None => Ok(serde_json::json!({})),
            }
        }
        fn subscribe(&self) -> broadcast::Receiver<CdpEvent> {
            self.events.subscribe()
        }
        fn emit(&self, _event: CdpEvent) {}
        async fn evaluate(&self, _expression: &str) -> Result<Value, BrowserError> {
            Ok(Value::Null)
        }
        async fn connectivity(&self) -> bool {
            true
        }
    }

    #[tokio::test]
    async fn capture_writes_named_png() {
        let dir = tempfile::tempdir().unwrap();
        let sink = CdpScreenshots::new(ShotSession::with_png(), dir.path());

        let path = sink.capture("checkout_JSError").await;
        assert!(!path.as_os_str().is_empty());
        let name = path.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("checkout_JSError_"));
        assert!(name.ends_with(".png"));
        assert!(path.exists());
    }

    #[tokio::test]
    async fn missing_image_data_yields_empty_path() {
        let dir = tempfile::tempdir().unwrap();
        let sink = CdpScreenshots::new(ShotSession::without_data(), dir.path());

        let path = sink.capture("final").await;
        assert!(path.as_os_str().is_empty());
    }
}
