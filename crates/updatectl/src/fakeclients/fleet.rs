//! Launcher for a pool of simulated instances.

use chrono::{DateTime, Utc};
use rand::prelude::*;
use rand::rngs::StdRng;
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use updatectl_common::MachineId;
use updatectl_omaha::Transport;

use super::client::{ClientReport, ClientStats, SimulatedClient};
use super::identity::IdentityGenerator;
use crate::config::FakeClientsConfig;

/// Running pool of simulated instances.
///
/// Every instance runs in its own task and owns its state exclusively; the
/// only shared values are the configuration, the transport and the
/// shutdown signal.
pub struct Fleet {
    /// Task handle per instance, in launch order
    handles: Vec<(MachineId, JoinHandle<ClientReport>)>,
    /// Flipped to `true` to stop every instance after its current cycle
    shutdown: watch::Sender<bool>,
    started_at: DateTime<Utc>,
}

impl Fleet {
    /// Create `config.clients` instances and start one poll loop for each.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn launch(config: FakeClientsConfig, transport: Arc<dyn Transport>) -> Self {
        let config = Arc::new(config);
        let base_seed = config.seed.unwrap_or_else(rand::random);
        let (shutdown, _) = watch::channel(false);

        let mut id_rng = StdRng::seed_from_u64(base_seed.rotate_left(32));
        let mut ids = IdentityGenerator::new(config.id_scheme, &mut id_rng);

        info!(
            clients = config.clients,
            server = %config.server,
            app_id = %config.app_id,
            group_id = %config.group_id,
            version = %config.version,
            error_rate = config.error_rate,
            install_source = config.install_source().as_str(),
            id_scheme = %config.id_scheme,
            "Launching fake instances"
        );

        if let Some(prefix) = ids.prefix() {
            info!(id_prefix = %prefix, "Machine ids share a recognizable prefix");
        }

        let mut handles = Vec::with_capacity(config.clients);
        for index in 0..config.clients {
            let id = ids.next_id();
            let seed = base_seed.wrapping_add(index as u64);
            let client =
                SimulatedClient::new(id.clone(), Arc::clone(&config), Arc::clone(&transport), seed);

            debug!(client_id = %id, seed, "Spawning instance");
            let handle = tokio::spawn(client.run(shutdown.subscribe()));
            handles.push((id, handle));
        }

        Self {
            handles,
            shutdown,
            started_at: Utc::now(),
        }
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    pub fn client_ids(&self) -> impl Iterator<Item = &MachineId> {
        self.handles.iter().map(|(id, _)| id)
    }

    /// Wait for `signal`, then shut the fleet down.
    pub async fn run_until<F>(self, signal: F) -> FleetReport
    where
        F: Future<Output = ()>,
    {
        signal.await;
        self.shutdown().await
    }

    /// Signal every instance to stop and collect their reports.
    pub async fn shutdown(self) -> FleetReport {
        info!(clients = self.handles.len(), "Stopping fake instances");

        // Fails only if every task already ended
        let _ = self.shutdown.send(true);

        let mut clients = Vec::with_capacity(self.handles.len());
        let mut lost_clients = 0;

        for (id, handle) in self.handles {
            match handle.await {
                Ok(report) => clients.push(report),
                Err(e) => {
                    warn!(client_id = %id, error = %e, "Instance task ended abnormally");
                    lost_clients += 1;
                }
            }
        }

        let report = FleetReport {
            started_at: self.started_at,
            stopped_at: Utc::now(),
            clients,
            lost_clients,
        };

        info!(
            clients = report.clients.len(),
            lost_clients = report.lost_clients,
            polls = report.total(|s| s.polls),
            updates = report.total(|s| s.updates),
            aborted_cycles = report.total(|s| s.aborted_cycles),
            failed_checks = report.total(|s| s.failed_checks),
            "Fake instances stopped"
        );

        report
    }
}

/// Aggregated outcome of a fleet run
#[derive(Debug, Clone, Serialize)]
pub struct FleetReport {
    pub started_at: DateTime<Utc>,
    pub stopped_at: DateTime<Utc>,
    pub clients: Vec<ClientReport>,
    /// Instances whose task panicked or was cancelled
    pub lost_clients: usize,
}

impl FleetReport {
    /// Sum one counter over all instances
    pub fn total(&self, counter: impl Fn(&ClientStats) -> u64) -> u64 {
        self.clients.iter().map(|c| counter(&c.stats)).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use updatectl_omaha::{ProtocolError, Request, Response};

    use crate::fakeclients::IdentityScheme;

    #[derive(Default)]
    struct NoUpdate {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Transport for NoUpdate {
        async fn send(&self, request: &Request) -> Result<Response, ProtocolError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(Response::no_update(request.app.app_id.clone()))
        }
    }

    fn config(clients: usize) -> FakeClientsConfig {
        FakeClientsConfig {
            clients,
            app_id: "app".to_string(),
            group_id: "beta".to_string(),
            min_sleep_secs: 1,
            max_sleep_secs: 1,
            seed: Some(7),
            id_scheme: IdentityScheme::Sequential,
            ..FakeClientsConfig::default()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_launch_creates_every_client() {
        let fleet = Fleet::launch(config(4), Arc::new(NoUpdate::default()));
        assert_eq!(fleet.len(), 4);
        assert!(!fleet.is_empty());

        let ids: Vec<&str> = fleet.client_ids().map(MachineId::as_str).collect();
        assert_eq!(
            ids,
            vec![
                "{fake-client-000}",
                "{fake-client-001}",
                "{fake-client-002}",
                "{fake-client-003}"
            ]
        );

        let report = fleet.shutdown().await;
        assert_eq!(report.clients.len(), 4);
        assert_eq!(report.lost_clients, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_until_collects_polls() {
        let transport = Arc::new(NoUpdate::default());
        let fleet = Fleet::launch(config(3), transport.clone());

        let report = fleet
            .run_until(tokio::time::sleep(Duration::from_millis(3_500)))
            .await;

        // One poll per second for each instance
        assert_eq!(report.total(|s| s.polls), 9);
        assert_eq!(report.total(|s| s.no_updates), 9);
        assert_eq!(report.total(|s| s.updates), 0);
        assert_eq!(transport.calls.load(Ordering::SeqCst), 9);
        assert!(report.stopped_at >= report.started_at);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_before_first_poll() {
        let transport = Arc::new(NoUpdate::default());
        let fleet = Fleet::launch(config(2), transport.clone());

        let report = fleet.shutdown().await;
        assert_eq!(report.total(|s| s.polls), 0);
        assert_eq!(transport.calls.load(Ordering::SeqCst), 0);
    }
}
