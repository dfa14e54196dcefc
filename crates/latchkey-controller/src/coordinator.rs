//! Request/decision arbitration across credential sources.
//!
//! The coordinator owns every credential source, the decision channel and
//! the door actuator, and drives one cycle at a time:
//!
//! ```text
//! Armed ──(first ready source, by priority)──> Dispatching
//!   ▲                                             │ disarm all sources
//!   │                                             │ publish {type, data}
//!   │                                             ▼
//!   └──(allow → unlock │ deny │ timeout)──── AwaitingDecision
//!        re-arm all sources                     poll decision slot
//! ```
//!
//! At most one request is ever outstanding. No source is re-armed until
//! the cycle has fully resolved, so a credential presented while a decision
//! is pending is never captured and silently dropped. Every failure inside a
//! cycle resolves to a deny, and the coordinator always returns to `Armed`.

use std::future::Future;
use std::time::Duration;

use chrono::Utc;
use latchkey_core::config::TimingConfig;
use latchkey_core::constants::{
    DEFAULT_DECISION_POLL_MS, DEFAULT_IDLE_TICK_MS, DEFAULT_RESPONSE_WINDOW_MS, DEFAULT_UNLOCK_MS,
};
use latchkey_core::{CredentialEvent, DecisionMessage, DecisionStatus, PendingRequest};
use latchkey_hardware::{AnyCredentialSource, CredentialSource, DoorActuator};
use latchkey_network::DecisionChannel;
use latchkey_protocol::{AccessRequest, parse_decision};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::error::{ControllerError, Result};
use crate::outcome::{CycleOutcome, CycleReport, DenyReason};
use crate::state_machine::{CoordinatorState, StateMachine, StateTransition};

/// Timing of the coordinator's cycles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoordinatorConfig {
    /// How long after publishing a decision is still accepted.
    pub response_window: Duration,
    /// How long the relay stays open on `allow`.
    pub unlock_duration: Duration,
    /// Cadence of decision slot checks while awaiting a decision.
    pub decision_poll: Duration,
    /// Cadence of source polling while armed.
    pub idle_tick: Duration,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            response_window: Duration::from_millis(DEFAULT_RESPONSE_WINDOW_MS),
            unlock_duration: Duration::from_millis(DEFAULT_UNLOCK_MS),
            decision_poll: Duration::from_millis(DEFAULT_DECISION_POLL_MS),
            idle_tick: Duration::from_millis(DEFAULT_IDLE_TICK_MS),
        }
    }
}

impl From<&TimingConfig> for CoordinatorConfig {
    fn from(timing: &TimingConfig) -> Self {
        Self {
            response_window: timing.response_window(),
            unlock_duration: timing.unlock_duration(),
            decision_poll: timing.decision_poll(),
            idle_tick: timing.idle_tick(),
        }
    }
}

/// Arbitrates credential sources into single request/decision cycles.
///
/// Sources are checked in the order given to [`new`](Self::new); when two
/// are ready on the same tick the earlier one wins.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
///
/// use latchkey_controller::{CoordinatorConfig, CycleOutcome, RequestCoordinator};
/// use latchkey_core::CredentialKind;
/// use latchkey_hardware::mock::{MockPin, MockSource};
/// use latchkey_hardware::{AnyCredentialSource, RelayActuator};
/// use latchkey_network::mock::MockDecisionChannel;
///
/// #[tokio::main(flavor = "current_thread", start_paused = true)]
/// async fn main() {
///     let (rfid, card) = MockSource::new(CredentialKind::Rfid);
///     let (channel, authority) = MockDecisionChannel::new();
///     let (pin, _relay_line) = MockPin::new("relay");
///     let relay = RelayActuator::new(Box::new(pin)).unwrap();
///
///     let mut coordinator = RequestCoordinator::new(
///         vec![AnyCredentialSource::from(rfid)],
///         channel,
///         relay,
///         CoordinatorConfig::default(),
///     );
///     coordinator.arm_all().await;
///
///     card.present(b"04A1B2C3".to_vec());
///     authority.respond_with(r#"{"status":"allow"}"#, Duration::from_secs(1));
///
///     let event = coordinator.poll_sources().await.unwrap();
///     let report = coordinator.run_cycle(event).await;
///     assert_eq!(report.outcome, CycleOutcome::Allowed);
/// }
/// ```
#[derive(Debug)]
pub struct RequestCoordinator<C, A> {
    sources: Vec<AnyCredentialSource>,
    channel: C,
    actuator: A,
    config: CoordinatorConfig,
    machine: StateMachine,
}

impl<C, A> RequestCoordinator<C, A>
where
    C: DecisionChannel,
    A: DoorActuator,
{
    /// Create a coordinator over `sources`, highest priority first.
    pub fn new(
        sources: Vec<AnyCredentialSource>,
        channel: C,
        actuator: A,
        config: CoordinatorConfig,
    ) -> Self {
        Self {
            sources,
            channel,
            actuator,
            config,
            machine: StateMachine::new(),
        }
    }

    pub fn state(&self) -> CoordinatorState {
        self.machine.current_state()
    }

    pub fn history(&self) -> Vec<StateTransition> {
        self.machine.history().iter().copied().collect()
    }

    pub fn sources(&self) -> &[AnyCredentialSource] {
        &self.sources
    }

    pub fn channel(&self) -> &C {
        &self.channel
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    /// Give back the channel and actuator, e.g. to close the broker session.
    pub fn into_parts(self) -> (Vec<AnyCredentialSource>, C, A) {
        (self.sources, self.channel, self.actuator)
    }

    /// Arm every source that is not armed. Failures are logged; the source
    /// is retried on the next poll.
    pub async fn arm_all(&mut self) {
        for source in &mut self.sources {
            if source.is_armed() {
                continue;
            }
            match source.arm().await {
                Ok(()) => debug!(kind = %source.kind(), "source armed"),
                Err(e) => warn!(kind = %source.kind(), error = %e, "failed to arm source"),
            }
        }
    }

    /// Check every source once, in priority order, and return the first
    /// credential found.
    ///
    /// Sources found disarmed are re-armed before they are checked. A source
    /// error is logged and does not stop the remaining sources from being
    /// checked.
    pub async fn poll_sources(&mut self) -> Option<CredentialEvent> {
        for source in &mut self.sources {
            if !source.is_armed() {
                if let Err(e) = source.arm().await {
                    warn!(kind = %source.kind(), error = %e, "failed to re-arm source");
                    continue;
                }
            }
            match source.try_take().await {
                Ok(Some(event)) => {
                    info!(kind = %event.kind(), "credential captured");
                    return Some(event);
                }
                Ok(None) => {}
                Err(e) if e.is_recoverable() => {
                    debug!(kind = %source.kind(), error = %e, "credential source timed out");
                }
                Err(e) => {
                    warn!(kind = %source.kind(), error = %e, "credential source failed, restarting");
                    if let Err(e) = source.disarm().await {
                        warn!(kind = %source.kind(), error = %e, "failed to disarm source");
                    }
                }
            }
        }
        None
    }

    /// Resolve one credential into an outcome and re-arm all sources.
    ///
    /// The relay is only driven on a timely, well-formed `allow`. Every other
    /// path is a deny.
    pub async fn run_cycle(&mut self, event: CredentialEvent) -> CycleReport {
        let cycle_id = Uuid::new_v4();
        let kind = event.kind();
        let started_at = Utc::now();
        let started = Instant::now();

        if self.machine.current_state().is_busy() {
            warn!(state = %self.machine.current_state(), "cycle started while busy, resetting");
            self.machine.reset();
        }

        let outcome = self.dispatch(event).await;
        self.enter(CoordinatorState::Armed);
        self.arm_all().await;

        let report = CycleReport {
            cycle_id,
            kind,
            started_at,
            outcome,
            elapsed: started.elapsed(),
        };
        info!(
            cycle_id = %report.cycle_id,
            kind = %report.kind,
            outcome = %report.outcome,
            elapsed_ms = report.elapsed.as_millis() as u64,
            "access cycle finished"
        );
        report
    }

    /// Poll sources on the idle tick and run a cycle for each credential
    /// until `shutdown` completes, then disarm every source.
    ///
    /// A cycle in progress is always allowed to finish; `shutdown` is only
    /// observed between cycles.
    ///
    /// # Errors
    ///
    /// Returns the first error met while disarming sources on the way out.
    pub async fn run(&mut self, shutdown: impl Future<Output = ()>) -> Result<()> {
        tokio::pin!(shutdown);
        info!(sources = self.sources.len(), "coordinator running");
        self.arm_all().await;

        loop {
            if let Some(event) = self.poll_sources().await {
                self.run_cycle(event).await;
                continue;
            }

            tokio::select! {
                () = &mut shutdown => break,
                () = tokio::time::sleep(self.config.idle_tick) => {}
            }
        }

        info!("coordinator stopping");
        self.shutdown().await
    }

    /// Disarm every source.
    ///
    /// All sources are attempted even if one fails.
    ///
    /// # Errors
    ///
    /// Returns the first disarm failure.
    pub async fn shutdown(&mut self) -> Result<()> {
        let mut first_error = None;
        for source in &mut self.sources {
            if let Err(e) = source.disarm().await {
                error!(kind = %source.kind(), error = %e, "failed to disarm source");
                first_error.get_or_insert(ControllerError::from(e));
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    async fn dispatch(&mut self, event: CredentialEvent) -> CycleOutcome {
        self.enter(CoordinatorState::Dispatching);

        if !self.disarm_all().await {
            return CycleOutcome::Denied(DenyReason::Internal);
        }

        let payload = match AccessRequest::from_event(&event).to_json() {
            Ok(payload) => payload,
            Err(e) => {
                error!(error = %e, "failed to serialize access request");
                return CycleOutcome::Denied(DenyReason::Internal);
            }
        };

        let sent_at = Instant::now();
        if let Err(e) = self.channel.publish_request(&payload).await {
            warn!(error = %e, "access request not published, denying");
            return CycleOutcome::Denied(DenyReason::PublishFailed);
        }
        debug!(kind = %event.kind(), "access request published");

        self.enter(CoordinatorState::AwaitingDecision);
        let pending = PendingRequest::new(event, sent_at, self.config.response_window);

        match self.await_decision(&pending).await {
            Some(DecisionStatus::Allow) => self.unlock().await,
            Some(DecisionStatus::Deny) => CycleOutcome::Denied(DenyReason::Decision),
            None => {
                info!(
                    window_ms = self.config.response_window.as_millis() as u64,
                    "no decision within response window"
                );
                CycleOutcome::Denied(DenyReason::Timeout)
            }
        }
    }

    /// Stop every source before a request leaves. Returns `false` if any
    /// source could not be stopped.
    async fn disarm_all(&mut self) -> bool {
        let mut stopped = true;
        for source in &mut self.sources {
            if let Err(e) = source.disarm().await {
                error!(kind = %source.kind(), error = %e, "failed to disarm source");
                stopped = false;
            }
        }
        stopped
    }

    async fn await_decision(&self, pending: &PendingRequest) -> Option<DecisionStatus> {
        let mut rejected_at = None;

        loop {
            if let Some(inbound) = self.channel.latest_decision() {
                let fresh = inbound.received_at >= pending.sent_at();
                if fresh && rejected_at != Some(inbound.received_at) {
                    match parse_decision(&inbound.payload) {
                        Ok(status) => {
                            let decision = DecisionMessage {
                                status,
                                received_at: inbound.received_at,
                            };
                            if pending.accepts(&decision) {
                                info!(%status, "decision received");
                                return Some(status);
                            }
                        }
                        Err(e) => {
                            warn!(error = %e, "ignoring malformed decision");
                        }
                    }
                    rejected_at = Some(inbound.received_at);
                }
            }

            if pending.is_expired(Instant::now()) {
                return None;
            }
            tokio::time::sleep(self.config.decision_poll).await;
        }
    }

    async fn unlock(&mut self) -> CycleOutcome {
        match self.actuator.unlock_for(self.config.unlock_duration).await {
            Ok(()) => CycleOutcome::Allowed,
            Err(e) => {
                error!(error = %e, "relay failed on allow");
                CycleOutcome::Denied(DenyReason::Internal)
            }
        }
    }

    fn enter(&mut self, state: CoordinatorState) {
        if let Err(e) = self.machine.transition_to(state) {
            error!(error = %e, "coordinator state out of sync, resetting");
            self.machine.reset();
            if state != CoordinatorState::Armed {
                let _ = self.machine.transition_to(state);
            }
        }
    }
}
