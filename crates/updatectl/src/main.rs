//! updatectl binary entry point

use anyhow::Result;
use clap::Parser;

use updatectl::commands::{self, Cli};
use updatectl_common::init_tracing;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.debug { "debug" } else { "info" };
    init_tracing(level, cli.log_format)?;

    commands::run(cli).await
}
