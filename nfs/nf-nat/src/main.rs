//! Thin runtime glue around [`nf_nat::Nat`]. See `nf-firewall`'s `main.rs`
//! for why this stops at initialization.

use clap::Parser;
use nf_common::config::Config;

/// Stateful source NAT between a LAN and a WAN device.
#[derive(Parser, Debug)]
#[command(name = "nf-nat", version, about)]
struct Args {
    /// Path to a JSON configuration file.
    #[arg(long, env = "NF_CONFIG")]
    config: String,

    /// Number of devices this instance was started with.
    #[arg(long, env = "NF_DEVICES", default_value_t = 2)]
    devices: u16,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();

    let args = Args::parse();
    let config = Config::load(&args.config)?;

    match nf_nat::Nat::init(&config, args.devices) {
        Ok(_nat) => {
            tracing::info!(devices = args.devices, "NAT initialized");
            Ok(())
        }
        Err(e) => {
            tracing::error!(error = %e, "NAT init failed");
            Err(Box::new(e))
        }
    }
}
