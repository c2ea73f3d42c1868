//! Capability resolution and fallback behavior through the monitor.

use pagewatch_harness::MockSession;
use pagewatch_telemetry::PageMonitor;
use pagewatch_types::{ConsoleLevel, Domain, MonitorConfig, ProtocolVersion};

#[tokio::test]
async fn newest_fully_resolvable_generation_wins() {
    // V120 is advertised but misses the performance domain; V112 and V85
    // both resolve fully. V112 must win.
    let session = MockSession::builder()
        .with_version("V85")
        .with_version("V112")
        .with_version("V120")
        .with_all_domains(ProtocolVersion::V85)
        .with_all_domains(ProtocolVersion::V112)
        .with_domain(ProtocolVersion::V120, Domain::Network)
        .with_domain(ProtocolVersion::V120, Domain::Console)
        .with_domain(ProtocolVersion::V120, Domain::Runtime)
        .build();

    let monitor = PageMonitor::new(session.clone(), MonitorConfig::default());
    assert!(monitor.is_rich());
    assert_eq!(monitor.protocol_version(), Some(ProtocolVersion::V112));

    // The rejected V120 left no partial state: nothing was invoked during
    // resolution at all.
    assert!(session.invocations().is_empty());

    monitor.dispose().await;
}

#[tokio::test]
async fn no_resolvable_generation_means_fallback_mode() {
    let session = MockSession::builder()
        .with_version("V120")
        .with_domain(ProtocolVersion::V120, Domain::Network)
        .build();

    let monitor = PageMonitor::new(session.clone(), MonitorConfig::default());
    assert!(!monitor.is_rich());
    assert_eq!(monitor.protocol_version(), None);

    // Enables degrade to false rather than erroring.
    assert!(!monitor.enable_network().await);
    assert!(!monitor.enable_console().await);
    assert!(!monitor.enable_performance().await);

    monitor.dispose().await;
}

#[tokio::test]
async fn setup_enables_network_on_a_rich_session() {
    let session = MockSession::rich(ProtocolVersion::V120);
    let monitor = PageMonitor::setup(session.clone(), MonitorConfig::default()).await;

    assert!(monitor.is_enabled(Domain::Network));
    assert!(session.invocations().contains(&"Network.enable".to_string()));
    assert!(!session.fallback_installed());

    monitor.dispose().await;
}

#[tokio::test]
async fn setup_installs_fallback_when_interface_unavailable() {
    let session = MockSession::bare();
    let monitor = PageMonitor::setup(session.clone(), MonitorConfig::default()).await;

    assert!(!monitor.is_rich());
    assert!(session.fallback_installed());

    monitor.dispose().await;
}

#[tokio::test]
async fn setup_falls_back_when_connectivity_probe_fails() {
    let session = MockSession::builder()
        .with_version("V112")
        .with_all_domains(ProtocolVersion::V112)
        .with_connectivity(false)
        .build();
    let monitor = PageMonitor::setup(session.clone(), MonitorConfig::default()).await;

    // Capabilities resolved, but the probe said the endpoint is not
    // reachable, so the fallback path was taken instead of enabling.
    assert!(monitor.is_rich());
    assert!(!monitor.is_enabled(Domain::Network));
    assert!(session.fallback_installed());

    monitor.dispose().await;
}

#[tokio::test]
async fn fallback_collect_empty_buffer_returns_no_messages() {
    let session = MockSession::bare();
    let monitor = PageMonitor::new(session.clone(), MonitorConfig::default());

    assert!(monitor.use_fallback().await);
    let errors = monitor.collect_fallback_errors().await;
    assert!(errors.is_empty());

    monitor.dispose().await;
}

#[tokio::test]
async fn fallback_collect_maps_each_buffered_error() {
    let session = MockSession::bare();
    let monitor = PageMonitor::new(session.clone(), MonitorConfig::default());
    monitor.use_fallback().await;

    session.push_page_error("TypeError: x is undefined", "https://www.saucedemo.com/inventory.html", 42);
    session.push_page_error("ReferenceError: y is not defined", "https://www.saucedemo.com/cart.html", 7);
    session.push_page_error("SyntaxError: unexpected token", "https://www.saucedemo.com/app.js", 101);

    let errors = monitor.collect_fallback_errors().await;
    assert_eq!(errors.len(), 3);
    assert!(errors.iter().all(|e| e.level == ConsoleLevel::Error));
    assert_eq!(errors[0].text, "TypeError: x is undefined");
    assert_eq!(errors[0].line_number, 42);

    // The page buffer is not cleared by collect; a second collect
    // overlaps the first.
    let again = monitor.collect_fallback_errors().await;
    assert_eq!(again.len(), 3);

    monitor.dispose().await;
}

#[tokio::test]
async fn dispose_is_idempotent_and_releases_the_session() {
    let session = MockSession::rich(ProtocolVersion::V112);
    let monitor = PageMonitor::new(session.clone(), MonitorConfig::default());
    monitor.enable_all().await;

    monitor.dispose().await;
    // Let any tick already in flight at dispose time finish draining.
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    let invocations_after_first = session.invocations().len();
    monitor.dispose().await;

    // The second dispose issued no further commands.
    assert_eq!(session.invocations().len(), invocations_after_first);

    // With the session released, fallback collection degrades quietly.
    assert!(monitor.collect_fallback_errors().await.is_empty());
    assert!(!monitor.test_connectivity().await);
}
