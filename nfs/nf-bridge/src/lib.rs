//! Transparent learning bridge: built the same way `nf-nat`/`nf-loadbalancer`
//! build their forwarding tables, over `nf-core::Map<MacAddr -> device>`
//! instead of a flow table, since there's no per-flow state to track, only
//! a MAC-to-port binding.

use nf_common::config::Config;
use nf_common::error::ConfigError;
use nf_common::metrics::Counters;
use nf_core::Map;
use nf_net::ethernet::MacAddr;
use nf_net::Packet;

/// Bridge configuration.
pub struct BridgeConfig {
    /// Number of ports the bridge was started with.
    pub devices_count: u16,
}

impl BridgeConfig {
    /// Load and validate settings from `config`.
    pub fn from_config(_config: &Config, devices_count: u16) -> Result<Self, ConfigError> {
        if devices_count < 2 {
            return Err(ConfigError::Invalid {
                key: "devices_count".into(),
                reason: "a bridge needs at least two ports".into(),
            });
        }
        Ok(Self { devices_count })
    }
}

/// What `Bridge::handle` decided for a packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Forward to exactly this device (the learned port for the
    /// destination MAC).
    Forward(u16),
    /// Flood to every device except the one the packet arrived on (the
    /// destination MAC hasn't been learned yet).
    Flood,
}

/// The bridge's running state: one MAC-address table shared by every port.
pub struct Bridge {
    devices_count: u16,
    learned: Map<MacAddr, 6>,
    /// Packet counters, exposed for the runtime to export.
    pub metrics: Counters,
}

impl Bridge {
    /// Build a bridge for `devices_count` ports, with room to learn
    /// `table_capacity` MAC addresses (rounded up to a power of two).
    pub fn init(config: &Config, devices_count: u16, table_capacity: usize) -> Result<Self, ConfigError> {
        let config = BridgeConfig::from_config(config, devices_count)?;
        let learned = Map::new(table_capacity.next_power_of_two())
            .map_err(|e| ConfigError::Invalid { key: "table capacity".into(), reason: e.to_string() })?;
        Ok(Self { devices_count: config.devices_count, learned, metrics: Counters::default() })
    }

    /// Learn the packet's source MAC as reachable via the device it arrived
    /// on, then decide where the destination MAC should go.
    pub fn handle(&mut self, packet: &Packet<'_>) -> Verdict {
        self.metrics.rx_packets.inc();
        let src = packet.ether_src();
        if let Some(existing) = self.learned.get(&src) {
            if existing != packet.device as u64 {
                self.learned.remove(&src);
                self.learned.set(src, packet.device as u64);
            }
        } else if self.learned.len() < self.learned.capacity() {
            self.learned.set(src, packet.device as u64);
        }

        let dst = packet.ether_dst();
        let verdict = match self.learned.get(&dst) {
            Some(device) if device != packet.device as u64 => {
                self.metrics.flow_hits.inc();
                Verdict::Forward(device as u16)
            }
            Some(_) => Verdict::Flood, // learned binding is the arrival device itself; drop by flooding to nobody
            None => {
                self.metrics.flow_misses.inc();
                Verdict::Flood
            }
        };
        self.metrics.tx_packets.inc();
        verdict
    }

    /// Number of ports this bridge was configured with.
    pub fn devices_count(&self) -> u16 {
        self.devices_count
    }
}
