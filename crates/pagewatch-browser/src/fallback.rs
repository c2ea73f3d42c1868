//! Degraded, page-script-based error collection.
//!
//! When capability resolution reports the rich debugging interface is not
//! available, monitoring degrades to an in-page listener: `install()`
//! registers a `window` error handler that buffers errors in page-local
//! state, and `collect()` reads that buffer back as console messages.

use chrono::{DateTime, Utc};
use serde_json::Value;

use pagewatch_types::{ConsoleLevel, ConsoleMessage};

use crate::session::{DebugSession as _, SharedSession};

/// Page script registering the error listener. Buffered entries live on
/// the page until it is unloaded.
const INSTALL_SCRIPT: &str = "\
window.addEventListener('error', function (e) {\
  if (!window.__pagewatchErrors) { window.__pagewatchErrors = []; }\
  window.__pagewatchErrors.push({\
    message: e.message,\
    url: e.filename,\
    line: e.lineno,\
    timestamp: new Date().toISOString()\
  });\
});";

/// Retrieval query against the page buffer.
const COLLECT_SCRIPT: &str = "window.__pagewatchErrors || []";

/// Collects page errors without the rich debugging interface.
///
/// Stateless on this side; all buffered state lives in the page, so a
/// collector can be constructed per call against the same session.
pub struct FallbackCollector {
    session: SharedSession,
}

impl FallbackCollector {
    pub fn new(session: SharedSession) -> Self {
        Self { session }
    }

    /// Inject the page-level error listener. Returns `false` (with a
    /// logged warning) when script evaluation fails; never errors.
    pub async fn install(&self) -> bool {
        match self.session.evaluate(INSTALL_SCRIPT).await {
            Ok(_) => {
                tracing::info!("fallback error collection installed");
                true
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to install fallback error collection");
                false
            }
        }
    }

    /// Read the buffered page errors as console messages with level
    /// `error`.
    ///
    /// The page buffer is NOT cleared: it persists until the page unloads,
    /// so repeated collects can return overlapping results. Callers that
    /// collect more than once own deduplication.
    pub async fn collect(&self) -> Vec<ConsoleMessage> {
        let value = match self.session.evaluate(COLLECT_SCRIPT).await {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(error = %e, "failed to collect fallback errors");
                return Vec::new();
            }
        };

        let Some(entries) = value.as_array() else {
            return Vec::new();
        };

        let messages: Vec<ConsoleMessage> = entries.iter().map(buffered_entry_to_message).collect();
        tracing::debug!(count = messages.len(), "collected fallback errors");
        messages
    }
}

/// Map one buffered `{message, url, line, timestamp}` entry. Absent fields
/// degrade to empty defaults; an unparseable timestamp becomes "now".
fn buffered_entry_to_message(entry: &Value) -> ConsoleMessage {
    let text = entry
        .get("message")
        .and_then(|m| m.as_str())
        .unwrap_or("Unknown error")
        .to_string();
    let url = entry
        .get("url")
        .and_then(|u| u.as_str())
        .unwrap_or_default()
        .to_string();
    let line_number = entry.get("line").and_then(|l| l.as_u64()).unwrap_or(0);
    let timestamp = entry
        .get("timestamp")
        .and_then(|t| t.as_str())
        .and_then(|t| t.parse::<DateTime<Utc>>().ok())
        .unwrap_or_else(Utc::now);

    ConsoleMessage {
        level: ConsoleLevel::Error,
        text,
        url,
        line_number,
        timestamp,
    }
}
