//! Consistent-hash stateful load balancer: the configured wan device carries
//! client traffic to balance across backends, every other device is a
//! backend announcing liveness via heartbeat packets, following the same
//! "one device is distinguished, the rest aren't" dispatch convention used
//! by the firewall and NAT.

use nf_common::clock::Time;
use nf_common::config::Config;
use nf_common::error::ConfigError;
use nf_common::metrics::Counters;
use nf_core::LoadBalancer;
use nf_net::{Headers, Packet};

/// Load balancer configuration read from `--config`.
pub struct LoadBalancerConfig {
    /// Index of the client-facing device; every other device is a backend.
    pub wan_device: u16,
    /// Maximum number of concurrently-tracked flows.
    pub flow_capacity: usize,
    /// Maximum number of live backends.
    pub backend_capacity: usize,
    /// Number of buckets in the consistent-hash table.
    pub cht_height: usize,
    /// Backend liveness timeout, in nanoseconds.
    pub backend_expiration_time: Time,
    /// Flow stickiness timeout, in nanoseconds.
    pub flow_expiration_time: Time,
}

impl LoadBalancerConfig {
    /// Load and validate settings from `config`.
    pub fn from_config(config: &Config, devices_count: u16) -> Result<Self, ConfigError> {
        Ok(Self {
            wan_device: config.get_device("wan device", devices_count)?,
            flow_capacity: config.get_size("flow capacity")?,
            backend_capacity: config.get_size("backend capacity")?,
            cht_height: config.get_size("cht height")?,
            backend_expiration_time: config.get_time("backend expiration time")?,
            flow_expiration_time: config.get_time("flow expiration time")?,
        })
    }
}

/// What `Balancer::handle` decided for a packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Forward the client packet to this backend's NIC.
    Forward(u16),
    /// Drop: either no backend was available, or the packet was a
    /// heartbeat (consumed, never forwarded onward).
    Drop,
}

/// The load balancer's running state.
pub struct Balancer {
    wan_device: u16,
    lb: LoadBalancer,
    /// Packet counters, exposed for the runtime to export.
    pub metrics: Counters,
}

impl Balancer {
    /// Validate `devices_count >= 2` and build the balancer.
    pub fn init(config: &Config, devices_count: u16) -> Result<Self, ConfigError> {
        if devices_count < 2 {
            return Err(ConfigError::Invalid {
                key: "devices_count".into(),
                reason: "the load balancer needs at least one WAN device and one backend".into(),
            });
        }
        let config = LoadBalancerConfig::from_config(config, devices_count)?;
        let lb = LoadBalancer::new(
            config.flow_capacity,
            config.backend_capacity,
            config.cht_height,
            config.backend_expiration_time,
            config.flow_expiration_time,
        )
        .map_err(|e| ConfigError::Invalid { key: "backend capacity".into(), reason: e.to_string() })?;
        Ok(Self { wan_device: config.wan_device, lb, metrics: Counters::default() })
    }

    /// Classify one packet: client traffic on the WAN device is forwarded
    /// to a backend; traffic from any other device is treated as a
    /// heartbeat and consumed.
    pub fn handle(&mut self, now: Time, packet: &Packet<'_>, headers: Headers) -> Verdict {
        self.metrics.rx_packets.inc();
        let verdict = if packet.device == self.wan_device {
            let flow = packet.flow_key(headers);
            match self.lb.get_backend(now, flow) {
                Some(backend) => {
                    self.metrics.flow_hits.inc();
                    Verdict::Forward(backend.nic)
                }
                None => {
                    self.metrics.flow_misses.inc();
                    tracing::debug!("dropping client flow, no backend available");
                    Verdict::Drop
                }
            }
        } else {
            let src_ip = packet.ipv4_src(headers);
            let mac = packet.ether_src();
            self.lb.process_heartbeat(now, src_ip, mac, packet.device);
            Verdict::Drop
        };
        match verdict {
            Verdict::Forward(_) => self.metrics.tx_packets.inc(),
            Verdict::Drop => self.metrics.dropped.inc(),
        }
        verdict
    }

    /// Drain expired flow bindings, to be called on a schedule independent
    /// of packet arrival.
    pub fn expire_flows(&mut self, now: Time) {
        self.lb.expire_flows(now);
    }

    /// Drain expired backends.
    pub fn expire_backends(&mut self, now: Time) {
        self.lb.expire_backends(now);
    }
}
