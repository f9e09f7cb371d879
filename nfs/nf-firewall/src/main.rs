//! Thin runtime glue around [`nf_firewall::Firewall`]: parse `--config` and
//! `--devices`, initialize logging, build the firewall, and report
//! readiness. Wiring a concrete [`nf_net::PacketIo`] to a real NIC pair is
//! deployment-specific and out of scope here.

use clap::Parser;
use nf_common::config::Config;

/// Stateful reflection firewall between a LAN and a WAN device.
#[derive(Parser, Debug)]
#[command(name = "nf-firewall", version, about)]
struct Args {
    /// Path to a JSON configuration file (see `nf_firewall::FirewallConfig`).
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

    match nf_firewall::Firewall::init(&config, args.devices) {
        Ok(_firewall) => {
            tracing::info!(devices = args.devices, "firewall initialized");
            Ok(())
        }
        Err(e) => {
            tracing::error!(error = %e, "firewall init failed");
            Err(Box::new(e))
        }
    }
}
