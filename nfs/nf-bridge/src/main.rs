//! Thin runtime glue around [`nf_bridge::Bridge`]. See `nf-firewall`'s
//! `main.rs` for why this stops at initialization.

use clap::Parser;
use nf_common::config::Config;

/// Transparent learning bridge.
#[derive(Parser, Debug)]
#[command(name = "nf-bridge", version, about)]
struct Args {
    /// Path to a JSON configuration file.
    #[arg(long, env = "NF_CONFIG")]
    config: String,

    /// Number of devices this instance was started with.
    #[arg(long, env = "NF_DEVICES", default_value_t = 2)]
    devices: u16,

    /// Maximum number of MAC addresses to keep learned at once.
    #[arg(long, env = "NF_BRIDGE_TABLE_CAPACITY", default_value_t = 1024)]
    table_capacity: usize,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();

    let args = Args::parse();
    let config = Config::load(&args.config)?;

    match nf_bridge::Bridge::init(&config, args.devices, args.table_capacity) {
        Ok(_bridge) => {
            tracing::info!(devices = args.devices, "bridge initialized");
            Ok(())
        }
        Err(e) => {
            tracing::error!(error = %e, "bridge init failed");
            Err(Box::new(e))
        }
    }
}
