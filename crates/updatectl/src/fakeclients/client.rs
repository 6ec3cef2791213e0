//! Simulated update-engine instance.
//!
//! Each [`SimulatedClient`] owns one synthetic identity and walks the update
//! lifecycle on every poll:
//!
//! ```text
//! Idle --ok--> Downloading --> Downloaded --> Installed --> HeartbeatLoop --> Idle
//!   ^              |               |              |
//!   +--------------+---------------+--------------+  (simulated failure or transport error)
//! ```
//!
//! A poll that fails anywhere returns the instance to `Idle` with its
//! version and session untouched; the next poll starts again from a fresh
//! update check.

use rand::prelude::*;
use rand::rngs::StdRng;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::time::sleep;
use tracing::{debug, info, trace, warn};

use updatectl_common::{MachineId, SessionId};
use updatectl_omaha::{
    AppRequest, Event, InstallSource, ProtocolError, Request, Response, Transport, UpdateStatus,
};

use super::jitter::{wait_between, STEP_PAUSE};
use crate::config::FakeClientsConfig;

/// Lifecycle steps reported after an update is offered, in order
const LIFECYCLE_STEPS: [(LifecycleState, Event); 3] = [
    (LifecycleState::Downloading, Event::DOWNLOADING),
    (LifecycleState::Downloaded, Event::DOWNLOADED),
    (LifecycleState::Installed, Event::INSTALLED),
];

/// Position of an instance in the update lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    Idle,
    Downloading,
    Downloaded,
    Installed,
    /// Simulated reboot lock: heartbeats only
    HeartbeatLoop,
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LifecycleState::Idle => write!(f, "idle"),
            LifecycleState::Downloading => write!(f, "downloading"),
            LifecycleState::Downloaded => write!(f, "downloaded"),
            LifecycleState::Installed => write!(f, "installed"),
            LifecycleState::HeartbeatLoop => write!(f, "heartbeat"),
        }
    }
}

/// Why a cycle was abandoned
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AbortReason {
    /// Randomly injected failure; the step was resent once
    SimulatedFailure,
    /// Network or decode error while reporting a step
    Transport(String),
    /// `ok` status without a usable manifest
    MissingManifest,
}

impl fmt::Display for AbortReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AbortReason::SimulatedFailure => write!(f, "simulated failure"),
            AbortReason::Transport(e) => write!(f, "transport error: {}", e),
            AbortReason::MissingManifest => write!(f, "update offered without a manifest"),
        }
    }
}

/// Result of one lifecycle evaluation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// The update check itself could not be sent or decoded
    CheckFailed { reason: String },
    /// The server offered nothing (`noupdate` or an error status)
    NoUpdate { status: UpdateStatus },
    /// The cycle was abandoned in `state`
    Aborted {
        state: LifecycleState,
        reason: AbortReason,
    },
    /// All steps succeeded and the new version was adopted
    Updated { from: String, to: String },
}

/// What a single request reports
#[derive(Debug, Clone, Copy)]
enum Report {
    /// Update check bundled with a "completed/success" event
    UpdateCheck,
    Event(Event),
    Heartbeat,
}

/// Per-instance counters, owned by the instance's task
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ClientStats {
    pub polls: u64,
    pub failed_checks: u64,
    pub no_updates: u64,
    pub aborted_cycles: u64,
    pub updates: u64,
    pub heartbeats_sent: u64,
}

/// Snapshot of an instance returned when its task ends
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClientReport {
    pub id: MachineId,
    pub session_id: SessionId,
    pub version: String,
    pub pings_remaining: u32,
    pub stats: ClientStats,
}

/// Draw whether the next lifecycle step fails (`error_rate` in percent)
pub fn simulated_failure(rng: &mut StdRng, error_rate: u8) -> bool {
    rng.random_range(0..100u8) < error_rate
}

/// One synthetic instance and its mutable protocol state
pub struct SimulatedClient {
    /// Machine id, fixed for the instance's lifetime
    id: MachineId,
    /// Boot id, rotated after every completed update
    session_id: SessionId,
    app_id: String,
    track: String,
    /// Currently "installed" version
    version: String,
    error_rate: u8,
    /// Heartbeats left; consumed only by successful cycles and never reset
    pings_remaining: u32,
    force_update: bool,
    state: LifecycleState,
    config: Arc<FakeClientsConfig>,
    transport: Arc<dyn Transport>,
    rng: StdRng,
    stats: ClientStats,
}

impl SimulatedClient {
    /// Create an instance seeded from the shared configuration
    pub fn new(
        id: MachineId,
        config: Arc<FakeClientsConfig>,
        transport: Arc<dyn Transport>,
        seed: u64,
    ) -> Self {
        Self {
            id,
            session_id: SessionId::new(),
            app_id: config.app_id.clone(),
            track: config.group_id.clone(),
            version: config.version.clone(),
            error_rate: config.error_rate.min(100),
            pings_remaining: config.ping_only,
            force_update: config.force_update,
            state: LifecycleState::Idle,
            config,
            transport,
            rng: StdRng::seed_from_u64(seed),
            stats: ClientStats::default(),
        }
    }

    pub fn id(&self) -> &MachineId {
        &self.id
    }

    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn pings_remaining(&self) -> u32 {
        self.pings_remaining
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    pub fn stats(&self) -> &ClientStats {
        &self.stats
    }

    pub fn report(&self) -> ClientReport {
        ClientReport {
            id: self.id.clone(),
            session_id: self.session_id,
            version: self.version.clone(),
            pings_remaining: self.pings_remaining,
            stats: self.stats.clone(),
        }
    }

    /// Poll until `shutdown` flips to `true` or its sender goes away.
    ///
    /// Shutdown is only observed between cycles, so a cycle in progress
    /// always runs to completion or abort.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) -> ClientReport {
        debug!(
            client_id = %self.id,
            version = %self.version,
            session_id = %self.session_id,
            "Starting poll loop"
        );

        loop {
            if *shutdown.borrow() {
                break;
            }

            let delay = wait_between(
                &mut self.rng,
                self.config.min_sleep_secs,
                self.config.max_sleep_secs,
            );

            tokio::select! {
                _ = delay => {}
                _ = shutdown.changed() => break,
            }

            self.poll_once().await;
        }

        debug!(
            client_id = %self.id,
            polls = self.stats.polls,
            updates = self.stats.updates,
            "Poll loop stopped"
        );

        self.report()
    }

    /// Run one full lifecycle evaluation, starting and ending in `Idle`.
    pub async fn poll_once(&mut self) -> CycleOutcome {
        self.stats.polls += 1;
        self.state = LifecycleState::Idle;

        let response = match self.send(Report::UpdateCheck).await {
            Ok(response) => response,
            Err(e) => return self.check_failed(e),
        };

        let update_check = match response.update_check() {
            Ok(uc) => uc,
            Err(e) => return self.check_failed(e),
        };

        match update_check.status() {
            UpdateStatus::Ok => {}
            status => {
                debug!(client_id = %self.id, status = %status, "No update offered");
                self.stats.no_updates += 1;
                return CycleOutcome::NoUpdate { status };
            }
        }

        let Some(target) = update_check.manifest_version().map(str::to_string) else {
            return self.abort(LifecycleState::Idle, AbortReason::MissingManifest);
        };

        let outcome = self.apply_update(target).await;
        self.state = LifecycleState::Idle;
        outcome
    }

    async fn apply_update(&mut self, target: String) -> CycleOutcome {
        for (i, (state, event)) in LIFECYCLE_STEPS.iter().copied().enumerate() {
            if i > 0 {
                sleep(STEP_PAUSE).await;
            }
            self.state = state;

            if simulated_failure(&mut self.rng, self.error_rate) {
                // The failure report replaces this step's report
                if let Err(e) = self.send(Report::Event(Event::FAILED)).await {
                    debug!(client_id = %self.id, error = %e, "Failure report not delivered");
                }

                warn!(
                    client_id = %self.id,
                    state = %state,
                    event = %event,
                    "Failed to update, retrying step once"
                );
                sleep(self.config.min_sleep()).await;

                // Outcome deliberately ignored; the cycle is abandoned either way
                let _ = self.send(Report::Event(event)).await;
                return self.abort(state, AbortReason::SimulatedFailure);
            }

            if let Err(e) = self.send(Report::Event(event)).await {
                return self.abort(state, AbortReason::Transport(e.to_string()));
            }
        }

        // Simulated reboot lock
        self.state = LifecycleState::HeartbeatLoop;
        while self.pings_remaining > 0 {
            if let Err(e) = self.send(Report::Heartbeat).await {
                warn!(client_id = %self.id, error = %e, "Heartbeat failed");
            }
            self.pings_remaining -= 1;
            self.stats.heartbeats_sent += 1;
            sleep(STEP_PAUSE).await;
        }

        info!(
            client_id = %self.id,
            from = %self.version,
            to = %target,
            "Updated"
        );
        let from = std::mem::replace(&mut self.version, target.clone());

        // Completion is reported with the new version and the old session
        if let Err(e) = self.send(Report::Event(Event::COMPLETED)).await {
            warn!(client_id = %self.id, error = %e, "Completion report failed");
        }

        self.session_id = SessionId::new();
        self.stats.updates += 1;

        CycleOutcome::Updated { from, to: target }
    }

    fn check_failed(&mut self, error: ProtocolError) -> CycleOutcome {
        warn!(client_id = %self.id, error = %error, "Update check failed");
        self.stats.failed_checks += 1;
        CycleOutcome::CheckFailed {
            reason: error.to_string(),
        }
    }

    fn abort(&mut self, state: LifecycleState, reason: AbortReason) -> CycleOutcome {
        warn!(
            client_id = %self.id,
            state = %state,
            reason = %reason,
            "Update cycle aborted"
        );
        self.stats.aborted_cycles += 1;
        self.state = LifecycleState::Idle;
        CycleOutcome::Aborted { state, reason }
    }

    fn request(&self, report: Report) -> Request {
        let app = AppRequest::new(
            self.app_id.as_str(),
            self.version.as_str(),
            self.track.as_str(),
            self.config.oem.as_str(),
            &self.id,
            &self.session_id,
        );

        let app = match report {
            Report::UpdateCheck => app.with_update_check().with_event(Event::COMPLETED),
            Report::Event(event) => app.with_event(event),
            Report::Heartbeat => app.with_ping(),
        };

        Request::new(InstallSource::for_force_update(self.force_update), app)
    }

    async fn send(&self, report: Report) -> Result<Response, ProtocolError> {
        let request = self.request(report);
        trace!(client_id = %self.id, report = ?report, "Sending report");
        self.transport.send(&request).await
    }
}

impl fmt::Debug for SimulatedClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SimulatedClient")
            .field("id", &self.id)
            .field("session_id", &self.session_id)
            .field("app_id", &self.app_id)
            .field("track", &self.track)
            .field("version", &self.version)
            .field("error_rate", &self.error_rate)
            .field("pings_remaining", &self.pings_remaining)
            .field("force_update", &self.force_update)
            .field("state", &self.state)
            .finish()
    }
}
