//! Domain enable/disable lifecycle.
//!
//! [`DomainBinder`] drives the per-domain state machine over a resolved
//! adapter set. Both operations are idempotent and non-throwing: failures
//! are logged warnings and reported as `false`, never errors, because a
//! domain that will not enable only costs telemetry records, not the test
//! run.
//!
//! State machine per domain:
//! `Disabled -> Enabling -> Enabled` when the enable command succeeds;
//! `Enabling -> Disabled` with a logged warning on any failure;
//! `Enabled -> Disabling -> Disabled` on explicit disable. Disabling a
//! domain that is already disabled is a no-op returning `true`.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use pagewatch_types::Domain;

use crate::capability::{
    ConsoleCapability as _, NetworkCapability as _, PerformanceCapability as _,
    ResolvedCapabilities,
};
use crate::error::BrowserError;

/// Lifecycle state of one debugging domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DomainState {
    Disabled,
    Enabling,
    Enabled,
    Disabling,
}

/// Drives enable/disable for the monitoring domains of one session.
///
/// The binder itself has no knowledge of any generation's wire shape; the
/// version-specific command invocation lives behind the capability traits.
pub struct DomainBinder {
    caps: Arc<ResolvedCapabilities>,
    states: Mutex<HashMap<Domain, DomainState>>,
}

impl DomainBinder {
    pub fn new(caps: Arc<ResolvedCapabilities>) -> Self {
        let states = Domain::MONITORING
            .iter()
            .map(|d| (*d, DomainState::Disabled))
            .collect();
        Self {
            caps,
            states: Mutex::new(states),
        }
    }

    /// Current state of a domain. Domains without a lifecycle report
    /// `Disabled`.
    pub fn state(&self, domain: Domain) -> DomainState {
        *self
            .states
            .lock()
            .expect("binder state lock poisoned")
            .get(&domain)
            .unwrap_or(&DomainState::Disabled)
    }

    pub fn is_enabled(&self, domain: Domain) -> bool {
        self.state(domain) == DomainState::Enabled
    }

    /// Enable a domain. Returns `true` once the domain is enabled,
    /// including when it already was.
    pub async fn enable(&self, domain: Domain) -> bool {
        if !Self::has_lifecycle(domain) {
            tracing::debug!(domain = %domain, "domain has no enable command");
            return true;
        }

        // Claim the transition under one lock so concurrent enables
        // cannot double-invoke the command.
        {
            let mut states = self.states.lock().expect("binder state lock poisoned");
            match states.get(&domain).copied().unwrap_or(DomainState::Disabled) {
                DomainState::Enabled => return true,
                DomainState::Enabling | DomainState::Disabling => {
                    tracing::warn!(domain = %domain, "enable requested during a transition");
                    return false;
                }
                DomainState::Disabled => {
                    states.insert(domain, DomainState::Enabling);
                }
            }
        }

        match self.invoke_enable(domain).await {
            Ok(()) => {
                self.set_state(domain, DomainState::Enabled);
                tracing::info!(domain = %domain, version = %self.caps.version, "domain enabled");
                true
            }
            Err(e) => {
                self.set_state(domain, DomainState::Disabled);
                tracing::warn!(domain = %domain, error = %e, "failed to enable domain");
                false
            }
        }
    }

    /// Disable a domain. Best-effort: the domain always ends `Disabled`;
    /// the return value reports whether the disable command succeeded.
    /// Disabling an already-disabled domain is a no-op returning `true`.
    pub async fn disable(&self, domain: Domain) -> bool {
        if !Self::has_lifecycle(domain) {
            return true;
        }

        {
            let mut states = self.states.lock().expect("binder state lock poisoned");
            match states.get(&domain).copied().unwrap_or(DomainState::Disabled) {
                DomainState::Disabled => return true,
                DomainState::Enabling | DomainState::Disabling => {
                    tracing::warn!(domain = %domain, "disable requested during a transition");
                    return false;
                }
                DomainState::Enabled => {
                    states.insert(domain, DomainState::Disabling);
                }
            }
        }

        let result = self.invoke_disable(domain).await;
        self.set_state(domain, DomainState::Disabled);

        match result {
            Ok(()) => {
                tracing::info!(domain = %domain, "domain disabled");
                true
            }
            Err(e) => {
                tracing::warn!(domain = %domain, error = %e, "disable command failed");
                false
            }
        }
    }

    /// Disable every monitoring domain, best-effort.
    pub async fn disable_all(&self) {
        for domain in Domain::MONITORING {
            self.disable(domain).await;
        }
    }

    fn has_lifecycle(domain: Domain) -> bool {
        Domain::MONITORING.contains(&domain)
    }

    fn set_state(&self, domain: Domain, state: DomainState) {
        self.states
            .lock()
            .expect("binder state lock poisoned")
            .insert(domain, state);
    }

    async fn invoke_enable(&self, domain: Domain) -> Result<(), BrowserError> {
        match domain {
            Domain::Network => self.caps.network.enable().await,
            Domain::Console => self.caps.console.enable().await,
            Domain::Performance => self.caps.performance.enable().await,
            Domain::Runtime => Ok(()),
        }
    }

    async fn invoke_disable(&self, domain: Domain) -> Result<(), BrowserError> {
        match domain {
            Domain::Network => self.caps.network.disable().await,
            Domain::Console => self.caps.console.disable().await,
            Domain::Performance => self.caps.performance.disable().await,
            Domain::Runtime => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::{ConsoleCapability, NetworkCapability, PerformanceCapability};
    use async_trait::async_trait;
    use pagewatch_types::ProtocolVersion;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    /// Capability stub whose enable can be scripted to fail.
    struct FlakyDomain {
        fail_enable: AtomicBool,
        enables: AtomicUsize,
        disables: AtomicUsize,
    }

    impl FlakyDomain {
        fn new(fail_enable: bool) -> Arc<Self> {
            Arc::new(Self {
                fail_enable: AtomicBool::new(fail_enable),
                enables: AtomicUsize::new(0),
                disables: AtomicUsize::new(0),
            })
        }

        fn try_enable(&self) -> Result<(), BrowserError> {
            self.enables.fetch_add(1, Ordering::SeqCst);
            if self.fail_enable.load(Ordering::SeqCst) {
                Err(BrowserError::CdpError {
                    code: -32601,
                    message: "method not found".into(),
                    data: None,
                })
            } else {
                Ok(())
            }
        }

        fn try_disable(&self) -> Result<(), BrowserError> {
            self.disables.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[async_trait]
    impl NetworkCapability for FlakyDomain {
        async fn enable(&self) -> Result<(), BrowserError> {
            self.try_enable()
        }
        async fn disable(&self) -> Result<(), BrowserError> {
            self.try_disable()
        }
    }

    #[async_trait]
    impl ConsoleCapability for FlakyDomain {
        async fn enable(&self) -> Result<(), BrowserError> {
            self.try_enable()
        }
        async fn disable(&self) -> Result<(), BrowserError> {
            self.try_disable()
        }
    }

    #[async_trait]
    impl PerformanceCapability for FlakyDomain {
        async fn enable(&self) -> Result<(), BrowserError> {
            self.try_enable()
        }
        async fn disable(&self) -> Result<(), BrowserError> {
            self.try_disable()
        }
        async fn request_metrics(&self) -> Result<(), BrowserError> {
            Ok(())
        }
    }

    fn binder_with(
        network: Arc<FlakyDomain>,
        console: Arc<FlakyDomain>,
        performance: Arc<FlakyDomain>,
    ) -> DomainBinder {
        DomainBinder::new(Arc::new(ResolvedCapabilities {
            version: ProtocolVersion::V112,
            network,
            console,
            performance,
        }))
    }

    fn healthy_binder() -> DomainBinder {
        binder_with(
            FlakyDomain::new(false),
            FlakyDomain::new(false),
            FlakyDomain::new(false),
        )
    }

    #[tokio::test]
    async fn enable_transitions_to_enabled_on_success() {
        let binder = healthy_binder();
        assert_eq!(binder.state(Domain::Network), DomainState::Disabled);
        assert!(binder.enable(Domain::Network).await);
        assert_eq!(binder.state(Domain::Network), DomainState::Enabled);
    }

    #[tokio::test]
    async fn enable_failure_returns_to_disabled() {
        let network = FlakyDomain::new(true);
        let binder = binder_with(
            Arc::clone(&network),
            FlakyDomain::new(false),
            FlakyDomain::new(false),
        );

        assert!(!binder.enable(Domain::Network).await);
        assert_eq!(binder.state(Domain::Network), DomainState::Disabled);
        // Other domains are unaffected.
        assert!(binder.enable(Domain::Console).await);
        assert_eq!(binder.state(Domain::Console), DomainState::Enabled);
    }

    #[tokio::test]
    async fn enable_is_idempotent() {
        let network = FlakyDomain::new(false);
        let binder = binder_with(
            Arc::clone(&network),
            FlakyDomain::new(false),
            FlakyDomain::new(false),
        );

        assert!(binder.enable(Domain::Network).await);
        assert!(binder.enable(Domain::Network).await);
        // The enable command was only invoked once.
        assert_eq!(network.enables.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn disable_never_enabled_domain_is_noop_true() {
        let network = FlakyDomain::new(false);
        let binder = binder_with(
            Arc::clone(&network),
            FlakyDomain::new(false),
            FlakyDomain::new(false),
        );

        assert!(binder.disable(Domain::Network).await);
        assert_eq!(network.disables.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn disable_after_enable_invokes_command_once() {
        let network = FlakyDomain::new(false);
        let binder = binder_with(
            Arc::clone(&network),
            FlakyDomain::new(false),
            FlakyDomain::new(false),
        );

        binder.enable(Domain::Network).await;
        assert!(binder.disable(Domain::Network).await);
        assert!(binder.disable(Domain::Network).await);
        assert_eq!(network.disables.load(Ordering::SeqCst), 1);
        assert_eq!(binder.state(Domain::Network), DomainState::Disabled);
    }

    #[tokio::test]
    async fn disable_all_covers_every_monitoring_domain() {
        let binder = healthy_binder();
        for domain in Domain::MONITORING {
            binder.enable(domain).await;
        }
        binder.disable_all().await;
        for domain in Domain::MONITORING {
            assert_eq!(binder.state(domain), DomainState::Disabled);
        }
    }

    #[tokio::test]
    async fn runtime_domain_has_no_lifecycle() {
        let binder = healthy_binder();
        assert!(binder.enable(Domain::Runtime).await);
        assert!(binder.disable(Domain::Runtime).await);
        assert_eq!(binder.state(Domain::Runtime), DomainState::Disabled);
    }
}
