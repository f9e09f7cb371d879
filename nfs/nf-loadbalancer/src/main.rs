//! Thin runtime glue around [`nf_loadbalancer::Balancer`]. See
//! `nf-firewall`'s `main.rs` for why this stops at initialization.

use clap::Parser;
use nf_common::config::Config;

/// Consistent-hash stateful load balancer.
#[derive(Parser, Debug)]
#[command(name = "nf-loadbalancer", version, about)]
struct Args {
    /// Path to a JSON configuration file.
    #[arg(long, env = "NF_CONFIG")]
    config: String,

    /// Number of devices this instance was started with.
    #[arg(long, env = "NF_DEVICES")]
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

    match nf_loadbalancer::Balancer::init(&config, args.devices) {
        Ok(_balancer) => {
            tracing::info!(devices = args.devices, "load balancer initialized");
            Ok(())
        }
        Err(e) => {
            tracing::error!(error = %e, "load balancer init failed");
            Err(Box::new(e))
        }
    }
}
