//! Read-only aggregation of the telemetry store into a [`Report`].
//!
//! Computes network/console/metric summaries, classifies alerts against
//! the configured thresholds, and builds the merged event timeline used
//! for cross-correlation debugging. The aggregator never mutates the
//! store and never captures anything itself; screenshot wishes come back
//! as recommendations.

use std::collections::BTreeMap;

use chrono::Utc;
use uuid::Uuid;

use pagewatch_types::{
    ConsoleLevel, ConsoleMessage, MonitorConfig, NetworkRequest, PerformanceMetric,
};

use crate::report::{
    Alert, AlertCategory, ConsoleSummary, FailedRequest, MetricSummary, NetworkSummary, Report,
    ResourceTypeStats, TimelineEntry, TimelineKind,
};
use crate::store::TelemetryStore;

/// Pure read-only summarizer over one session's store.
pub struct TelemetryAggregator<'a> {
    store: &'a TelemetryStore,
    config: &'a MonitorConfig,
}

impl<'a> TelemetryAggregator<'a> {
    pub fn new(store: &'a TelemetryStore, config: &'a MonitorConfig) -> Self {
        Self { store, config }
    }

    pub fn summarize(&self, session_id: Uuid) -> Report {
        let requests = self.store.requests();
        let console = self.store.console_messages();
        let metrics = self.store.metrics();

        let alerts = self.classify_alerts(&requests, &console, &metrics);
        let screenshots = screenshot_recommendations(&alerts);

        Report {
            session_id,
            generated_at: Utc::now(),
            network: network_summary(&requests),
            console: console_summary(&console),
            metrics: metric_summaries(&metrics),
            timeline: build_timeline(&requests, &console, &metrics),
            alerts,
            screenshots,
        }
    }

    fn classify_alerts(
        &self,
        requests: &[NetworkRequest],
        console: &[ConsoleMessage],
        metrics: &[PerformanceMetric],
    ) -> Vec<Alert> {
        let mut alerts = Vec::new();

        if let Some(first) = console.iter().find(|m| m.level == ConsoleLevel::Error) {
            let error_count = console
                .iter()
                .filter(|m| m.level == ConsoleLevel::Error)
                .count();
            alerts.push(Alert {
                category: AlertCategory::ConsoleError,
                message: format!(
                    "{error_count} console error(s) detected; first: {}",
                    first.text
                ),
            });
        }

        for request in requests {
            if let Some(latency) = request.latency_ms() {
                if latency > self.config.slow_request_threshold_ms {
                    alerts.push(Alert {
                        category: AlertCategory::SlowRequest,
                        message: format!(
                            "slow request: {} {} took {latency}ms (threshold {}ms)",
                            request.method, request.url, self.config.slow_request_threshold_ms
                        ),
                    });
                }
            }
            if request.status.is_failure() {
                alerts.push(Alert {
                    category: AlertCategory::FailedRequest,
                    message: format!(
                        "failed request: {} {} - {} {}",
                        request.method, request.url, request.status, request.status_text
                    ),
                });
            }
        }

        // Latest sample per JS-heap metric name against the memory
        // threshold; one alert per offending name.
        let mut latest_heap: BTreeMap<&str, &PerformanceMetric> = BTreeMap::new();
        for metric in metrics.iter().filter(|m| is_heap_metric(&m.name)) {
            let newer = latest_heap
                .get(metric.name.as_str())
                .map_or(true, |existing| metric.timestamp >= existing.timestamp);
            if newer {
                latest_heap.insert(&metric.name, metric);
            }
        }
        for (name, metric) in latest_heap {
            if let Some(value) = metric.numeric_value() {
                if value > self.config.memory_threshold {
                    alerts.push(Alert {
                        category: AlertCategory::HighMemory,
                        message: format!(
                            "{name} at {value} exceeds memory threshold {}",
                            self.config.memory_threshold
                        ),
                    });
                }
            }
        }

        if alerts.is_empty() {
            alerts.push(Alert {
                category: AlertCategory::NoIssues,
                message: "no issues detected".to_string(),
            });
        }

        alerts
    }
}

/// JS heap usage metrics as the performance domain names them.
fn is_heap_metric(name: &str) -> bool {
    name.contains("JSHeap")
}

/// Metric names worth placing on the timeline: durations and load marks.
fn is_timing_metric(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    lower.contains("time") || lower.contains("load") || lower.contains("duration")
}

fn network_summary(requests: &[NetworkRequest]) -> NetworkSummary {
    let total = requests.len();
    let succeeded = requests.iter().filter(|r| r.status.is_success()).count();
    let failed = requests.iter().filter(|r| r.status.is_failure()).count();
    let pending = total - succeeded - failed;

    // Group by resource type; completed requests contribute latency.
    let mut groups: BTreeMap<&str, (usize, Vec<i64>)> = BTreeMap::new();
    for request in requests {
        let key = if request.resource_type.is_empty() {
            "(unknown)"
        } else {
            request.resource_type.as_str()
        };
        let group = groups.entry(key).or_default();
        group.0 += 1;
        if let Some(latency) = request.latency_ms() {
            group.1.push(latency);
        }
    }

    let resource_types = groups
        .into_iter()
        .map(|(resource_type, (count, latencies))| ResourceTypeStats {
            resource_type: resource_type.to_string(),
            requests: count,
            avg_latency_ms: if latencies.is_empty() {
                0.0
            } else {
                latencies.iter().sum::<i64>() as f64 / latencies.len() as f64
            },
        })
        .collect();

    let mut failures: Vec<FailedRequest> = requests
        .iter()
        .filter(|r| r.status.is_failure())
        .map(|r| FailedRequest {
            method: r.method.clone(),
            url: r.url.clone(),
            status: r.status.to_string(),
            status_text: r.status_text.clone(),
        })
        .collect();
    failures.sort_by(|a, b| a.url.cmp(&b.url));

    NetworkSummary {
        total,
        succeeded,
        failed,
        pending,
        resource_types,
        failures,
    }
}

fn console_summary(messages: &[ConsoleMessage]) -> ConsoleSummary {
    let errors = messages
        .iter()
        .filter(|m| m.level == ConsoleLevel::Error)
        .count();
    let warnings = messages
        .iter()
        .filter(|m| m.level == ConsoleLevel::Warning)
        .count();
    ConsoleSummary {
        total: messages.len(),
        errors,
        warnings,
        infos: messages.len() - errors - warnings,
    }
}

fn metric_summaries(metrics: &[PerformanceMetric]) -> Vec<MetricSummary> {
    // Group numeric samples per name, keeping arrival order so `last`
    // really is the latest sample.
    let mut series: BTreeMap<&str, Vec<f64>> = BTreeMap::new();
    for metric in metrics {
        if let Some(value) = metric.numeric_value() {
            series.entry(&metric.name).or_default().push(value);
        }
    }

    series
        .into_iter()
        .filter_map(|(name, values)| {
            let last = *values.last()?;
            let min = values.iter().copied().fold(f64::INFINITY, f64::min);
            let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            let avg = values.iter().sum::<f64>() / values.len() as f64;
            Some(MetricSummary {
                name: name.to_string(),
                last,
                min,
                max,
                avg,
                samples: values.len(),
            })
        })
        .collect()
}

fn build_timeline(
    requests: &[NetworkRequest],
    console: &[ConsoleMessage],
    metrics: &[PerformanceMetric],
) -> Vec<TimelineEntry> {
    let mut entries = Vec::new();

    for request in requests {
        entries.push(TimelineEntry {
            timestamp: request.sent_at,
            kind: TimelineKind::RequestSent,
            detail: format!("{} {}", request.method, request.url),
        });
        if let Some(received) = request.received_at {
            entries.push(TimelineEntry {
                timestamp: received,
                kind: TimelineKind::ResponseReceived,
                detail: format!("{} {} {}", request.status, request.method, request.url),
            });
        }
    }

    for message in console {
        entries.push(TimelineEntry {
            timestamp: message.timestamp,
            kind: TimelineKind::Console,
            detail: format!("[{}] {}", message.level, message.text),
        });
    }

    for metric in metrics.iter().filter(|m| is_timing_metric(&m.name)) {
        entries.push(TimelineEntry {
            timestamp: metric.timestamp,
            kind: TimelineKind::Metric,
            detail: format!("{} = {}", metric.name, metric.value),
        });
    }

    entries.sort_by_key(|e| e.timestamp);
    entries
}

/// One capture per distinct alert category (first-seen order), plus the
/// unconditional end-of-session capture.
fn screenshot_recommendations(alerts: &[Alert]) -> Vec<String> {
    let mut seen = Vec::new();
    for alert in alerts {
        if let Some(slug) = alert.category.screenshot_slug() {
            if !seen.iter().any(|s| s == slug) {
                seen.push(slug.to_string());
            }
        }
    }
    seen.push("final".to_string());
    seen
}
