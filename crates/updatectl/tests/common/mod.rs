//! Shared helpers for updatectl integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use std::sync::{Arc, Mutex};

use updatectl::config::FakeClientsConfig;
use updatectl::fakeclients::{IdentityScheme, SimulatedClient};
use updatectl_common::MachineId;
use updatectl_omaha::{ProtocolError, Request, Response, Transport};

pub const APP_ID: &str = "e96281a6-d1af-4bde-9a0a-97b76e56dc57";

type Responder = dyn Fn(&Request, usize) -> Result<Response, ProtocolError> + Send + Sync;

/// Transport that records every request and answers from a script.
///
/// The responder receives the request and its zero-based position.
pub struct ScriptedTransport {
    responder: Box<Responder>,
    sent: Mutex<Vec<Request>>,
}

impl ScriptedTransport {
    pub fn new<F>(responder: F) -> Arc<Self>
    where
        F: Fn(&Request, usize) -> Result<Response, ProtocolError> + Send + Sync + 'static,
    {
        Arc::new(Self {
            responder: Box::new(responder),
            sent: Mutex::new(Vec::new()),
        })
    }

    /// Answer every request with the same response
    pub fn always(response: Response) -> Arc<Self> {
        Self::new(move |_, _| Ok(response.clone()))
    }

    /// Offer `version` to update checks and acknowledge everything else
    pub fn offering(version: &'static str) -> Arc<Self> {
        Self::new(move |request, _| {
            if request.is_update_check() {
                Ok(Response::update_available(APP_ID, version, "update.gz"))
            } else {
                Ok(Response::default())
            }
        })
    }

    pub fn sent(&self) -> Vec<Request> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, request: &Request) -> Result<Response, ProtocolError> {
        let index = {
            let mut sent = self.sent.lock().unwrap();
            sent.push(request.clone());
            sent.len() - 1
        };
        (self.responder)(request, index)
    }
}

pub fn config() -> FakeClientsConfig {
    FakeClientsConfig {
        clients: 1,
        app_id: APP_ID.to_string(),
        group_id: "alpha".to_string(),
        version: "1.0.0".to_string(),
        error_rate: 0,
        min_sleep_secs: 1,
        max_sleep_secs: 1,
        seed: Some(1),
        id_scheme: IdentityScheme::Sequential,
        ..FakeClientsConfig::default()
    }
}

pub fn client(config: FakeClientsConfig, transport: Arc<ScriptedTransport>) -> SimulatedClient {
    seeded_client(config, transport, 42)
}

pub fn seeded_client(
    config: FakeClientsConfig,
    transport: Arc<ScriptedTransport>,
    seed: u64,
) -> SimulatedClient {
    SimulatedClient::new(
        MachineId::new("{fake-client-000}"),
        Arc::new(config),
        transport,
        seed,
    )
}
