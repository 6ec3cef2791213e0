//! Command line surface of `updatectl`.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use updatectl_common::{LogFormat, UpdatectlResult};
use updatectl_omaha::HttpTransport;

use crate::config::{FakeClientsConfig, DEFAULT_SERVER};
use crate::fakeclients::{Fleet, IdentityScheme};

#[derive(Debug, Parser)]
#[command(name = "updatectl", about = "Command line client for the update service")]
pub struct Cli {
    /// Update server URL
    #[arg(long, global = true, env = "UPDATECTL_SERVER", default_value = DEFAULT_SERVER)]
    pub server: String,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    /// Log output format (pretty or json)
    #[arg(long, global = true, default_value_t = LogFormat::Pretty)]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Operations on instances
    #[command(subcommand)]
    Instance(InstanceCommand),
}

#[derive(Debug, Subcommand)]
pub enum InstanceCommand {
    /// Simulate a fleet of update-engine instances
    Fake(FakeArgs),
}

#[derive(Debug, Clone, Args)]
pub struct FakeArgs {
    /// Application id to report
    #[arg(long)]
    pub app_id: String,

    /// Group (track) id to report
    #[arg(long)]
    pub group_id: String,

    /// Number of instances to simulate
    #[arg(long, default_value_t = 20)]
    pub clients_per_app: usize,

    /// Minimum seconds between polls
    #[arg(long, default_value_t = 1)]
    pub min_sleep: u64,

    /// Maximum seconds between polls
    #[arg(long, default_value_t = 10)]
    pub max_sleep: u64,

    /// Percent chance that a lifecycle step fails
    #[arg(long = "errorrate", default_value_t = 1, value_parser = clap::value_parser!(u8).range(0..=100))]
    pub error_rate: u8,

    /// OEM tag to report
    #[arg(long, default_value = "fakeclient")]
    pub oem: String,

    /// Heartbeats to send after installing an update
    #[arg(long, default_value_t = 0)]
    pub ping_only: u32,

    /// Starting version of every instance
    #[arg(long, default_value = "0.0.0")]
    pub version: String,

    /// Report updates as requested on demand
    #[arg(long)]
    pub force_update: bool,

    /// Print every request and response
    #[arg(long)]
    pub verbose: bool,

    /// Seed for reproducible jitter and failures
    #[arg(long)]
    pub seed: Option<u64>,

    /// Machine id scheme (recognizable or sequential)
    #[arg(long, default_value_t = IdentityScheme::Recognizable)]
    pub id_scheme: IdentityScheme,

    /// Stop after this many seconds instead of waiting for Ctrl-C
    #[arg(long)]
    pub run_for: Option<u64>,

    /// Timeout in seconds for a single request
    #[arg(long, default_value_t = 30)]
    pub request_timeout: u64,
}

impl FakeArgs {
    /// Build and validate the fleet configuration
    pub fn into_config(self, server: String) -> UpdatectlResult<FakeClientsConfig> {
        let config = FakeClientsConfig {
            server,
            clients: self.clients_per_app,
            min_sleep_secs: self.min_sleep,
            max_sleep_secs: self.max_sleep,
            error_rate: self.error_rate,
            oem: self.oem,
            ping_only: self.ping_only,
            app_id: self.app_id,
            group_id: self.group_id,
            version: self.version,
            force_update: self.force_update,
            verbose: self.verbose,
            seed: self.seed,
            id_scheme: self.id_scheme,
            request_timeout: Duration::from_secs(self.request_timeout),
        };

        config.validate()?;
        Ok(config)
    }
}

/// Execute a parsed command line
pub async fn run(cli: Cli) -> Result<()> {
    let Cli { server, command, .. } = cli;

    match command {
        Command::Instance(InstanceCommand::Fake(args)) => run_fake(server, args).await,
    }
}

async fn run_fake(server: String, args: FakeArgs) -> Result<()> {
    let run_for = args.run_for.map(Duration::from_secs);
    let config = args
        .into_config(server)
        .context("invalid fake instance configuration")?;

    let transport = HttpTransport::new(&config.server, config.request_timeout, config.verbose)
        .context("failed to create HTTP client")?;
    info!(endpoint = %transport.endpoint(), "Using update endpoint");

    let fleet = Fleet::launch(config, Arc::new(transport));
    let report = fleet.run_until(stop_signal(run_for)).await;

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

/// Resolves on Ctrl-C, or once `run_for` has elapsed
async fn stop_signal(run_for: Option<Duration>) {
    let deadline = async {
        match run_for {
            Some(duration) => tokio::time::sleep(duration).await,
            None => std::future::pending::<()>().await,
        }
    };

    tokio::select! {
        _ = interrupt() => info!("Interrupt received, shutting down"),
        _ = deadline => info!("Run time elapsed, shutting down"),
    }
}

async fn interrupt() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
}
