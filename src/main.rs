//! TURN relay balancer.
//!
//! # Architecture Overview
//!
//! ```text
//!                  ┌──────────────────────────────────────────────────┐
//!                  │                  TURN BALANCER                   │
//!                  │                                                  │
//!   coturn relays  │  ┌──────────────┐        ┌───────────────────┐   │
//!   ◀──── TCP ─────┼──│    health    │───────▶│  selection state  │   │
//!                  │  │   monitor    │ fast   │  (arc-swap table) │   │
//!                  │  └──────────────┘ path   └─────────┬─────────┘   │
//!                  │                                ▲   │             │
//!   Prometheus     │  ┌──────────────┐              │   ▼             │
//!   ◀─ query_range─┼──│  selection   │──────────────┘ ┌──────────┐    │
//!                  │  │   engine     │                │status API│◀───┼── GET /coturn
//!                  │  └──────────────┘                └──────────┘    │
//!                  └──────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;

use turn_balancer::config::load_config;
use turn_balancer::lifecycle::startup;
use turn_balancer::observability::logging::init_logging;

#[derive(Parser)]
#[command(name = "turn-balancer")]
#[command(about = "Health-checking selector for coturn relays", long_about = None)]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "./turn-balancer.toml")]
    config_file: PathBuf,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = load_config(&cli.config_file)?;

    init_logging(&config.observability.log_level);
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config_file = %cli.config_file.display(),
        "turn-balancer starting"
    );

    startup::run(config).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
