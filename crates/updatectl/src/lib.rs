//! updatectl: command line client for the update service
//!
//! The library half of the `updatectl` binary. It exposes the fake instance
//! fleet so it can be driven from tests or embedded in other tools.

pub mod commands;
pub mod config;
pub mod fakeclients;

pub use config::{ConfigError, FakeClientsConfig, DEFAULT_SERVER};
pub use fakeclients::{Fleet, FleetReport, SimulatedClient};
