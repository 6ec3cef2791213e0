//! Simulated update-engine fleet
//!
//! Launches many synthetic instances that speak the Omaha protocol against
//! an update server: each one polls for updates, reports download and
//! install progress with randomly injected failures, optionally holds a
//! reboot lock with heartbeats, and reports completion.
//!
//! # Usage
//!
//! ```bash
//! updatectl instance fake --app-id <APP> --group-id <GROUP>
//! updatectl instance fake --app-id <APP> --group-id <GROUP> --errorrate 20 --ping-only 5
//! updatectl instance fake --app-id <APP> --group-id <GROUP> --run-for 60 --seed 7
//! ```

mod client;
mod fleet;
mod identity;
mod jitter;

pub use client::{
    simulated_failure, AbortReason, ClientReport, ClientStats, CycleOutcome, LifecycleState,
    SimulatedClient,
};
pub use fleet::{Fleet, FleetReport};
pub use identity::{IdentityGenerator, IdentityScheme, RECOGNIZABLE_PREFIX};
pub use jitter::{jitter_between, wait_between, STEP_PAUSE};
