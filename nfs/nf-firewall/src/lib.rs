//! Stateful reflection firewall: every LAN-to-WAN packet is learned into a
//! flow table; a WAN-to-LAN packet is let through only if the *reversed*
//! 5-tuple was learned recently enough. [`ReflectionTable`] is built
//! directly from `nf-core`'s `Map` + `IndexPool`, the same pair
//! `nf-core::FlowTable` composes for NAT.

use nf_common::clock::Time;
use nf_common::config::Config;
use nf_common::error::ConfigError;
use nf_common::flow::{FlowKey, FLOW_KEY_SIZE};
use nf_common::metrics::Counters;
use nf_core::error::CoreError;
use nf_core::{IndexPool, Map};

/// Tracks which flows have recently crossed LAN-to-WAN, for WAN-to-LAN
/// reflection checks. Unlike `nf_core::FlowTable`, this never hands out a
/// translated port — presence is the only thing that matters.
#[derive(Debug)]
pub struct ReflectionTable {
    flows: Vec<FlowKey>,
    index_of: Map<FlowKey, FLOW_KEY_SIZE>,
    pool: IndexPool,
}

impl ReflectionTable {
    /// Build a table for `max_flows` concurrent flows, forgetting a flow
    /// `expiration` nanoseconds after its last LAN-to-WAN packet.
    pub fn new(expiration: Time, max_flows: usize) -> Result<Self, CoreError> {
        Ok(Self {
            flows: vec![FlowKey::new(0, 0, 0, 0, 0); max_flows],
            index_of: Map::new(max_flows.next_power_of_two())?,
            pool: IndexPool::new(max_flows, expiration)?,
        })
    }

    /// Record (or refresh) a LAN-to-WAN flow.
    pub fn learn_internal(&mut self, now: Time, flow: FlowKey) {
        if let Some(index) = self.index_of.get(&flow) {
            self.pool.refresh(now, index as usize);
            return;
        }

        let Some((index, reused)) = self.pool.borrow(now) else {
            return; // full of young flows, silently drop the reservation
        };
        if reused {
            self.index_of.remove(&self.flows[index]);
        }
        self.flows[index] = flow;
        self.index_of.set(self.flows[index], index as u64);
    }

    /// Whether `flow` (already reversed by the caller to LAN-to-WAN
    /// perspective) was learned and hasn't expired.
    pub fn has_external(&self, now: Time, flow: FlowKey) -> bool {
        match self.index_of.get(&flow) {
            Some(index) => self.pool.used(now, index as usize),
            None => false,
        }
    }
}

/// Firewall configuration read from `--config`.
pub struct FirewallConfig {
    /// Index (0 or 1) of the WAN-facing device.
    pub wan_device: u16,
    /// Maximum number of concurrently-tracked flows.
    pub max_flows: usize,
    /// Flow idle timeout, in nanoseconds.
    pub expiration_time: Time,
}

impl FirewallConfig {
    /// Load and validate firewall settings: `wan_device < devices_count`,
    /// `max_flows > 0`, `expiration_time > 0`.
    pub fn from_config(config: &Config, devices_count: u16) -> Result<Self, ConfigError> {
        let wan_device = config.get_device("wan device", devices_count)?;
        let max_flows = config.get_size("max flows")?;
        let expiration_time = config.get_time("expiration time")?;
        if max_flows == 0 {
            return Err(ConfigError::Invalid {
                key: "max flows".into(),
                reason: "must be greater than zero".into(),
            });
        }
        if expiration_time <= 0 {
            return Err(ConfigError::Invalid {
                key: "expiration time".into(),
                reason: "must be greater than zero".into(),
            });
        }
        Ok(Self { wan_device, max_flows, expiration_time })
    }
}

/// The firewall's running state: config plus the reflection table.
pub struct Firewall {
    config: FirewallConfig,
    table: ReflectionTable,
    /// Packet counters (`rx_packets`, `tx_packets`, `dropped`, `flow_hits`,
    /// `flow_misses`), exposed for the runtime to export.
    pub metrics: Counters,
}

/// What to do with a packet `Firewall::handle` just inspected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Forward to the given device.
    Forward(u16),
    /// Drop silently (the caller logs why at `debug` level).
    Drop,
}

impl Firewall {
    /// Validate `devices_count == 2` and build the firewall.
    pub fn init(config: &Config, devices_count: u16) -> Result<Self, ConfigError> {
        if devices_count != 2 {
            return Err(ConfigError::Invalid {
                key: "devices_count".into(),
                reason: "the firewall needs exactly two devices (LAN, WAN)".into(),
            });
        }
        let config = FirewallConfig::from_config(config, devices_count)?;
        let table = ReflectionTable::new(config.expiration_time, config.max_flows)
            .map_err(|e| ConfigError::Invalid {
                key: "max flows".into(),
                reason: e.to_string(),
            })?;
        Ok(Self { config, table, metrics: Counters::default() })
    }

    /// Classify one packet, returning the device to forward it to on
    /// [`Verdict::Forward`].
    pub fn handle(&mut self, now: Time, packet: &nf_net::Packet<'_>, headers: nf_net::Headers) -> Verdict {
        self.metrics.rx_packets.inc();
        let flow = packet.flow_key(headers);
        let verdict = if packet.device == self.config.wan_device {
            if self.table.has_external(now, flow.reverse()) {
                self.metrics.flow_hits.inc();
                Verdict::Forward(1 - packet.device)
            } else {
                self.metrics.flow_misses.inc();
                Verdict::Drop
            }
        } else {
            self.table.learn_internal(now, flow);
            Verdict::Forward(1 - packet.device)
        };
        match verdict {
            Verdict::Forward(_) => self.metrics.tx_packets.inc(),
            Verdict::Drop => {
                self.metrics.dropped.inc();
                tracing::debug!(device = packet.device, "dropping unsolicited inbound flow");
            }
        }
        verdict
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flow(n: u32) -> FlowKey {
        FlowKey::new(n, n + 100, 1000 + n as u16, 80, 6)
    }

    fn packet_bytes(flow: FlowKey) -> Vec<u8> {
        let mut data = vec![0u8; nf_net::ethernet::HEADER_LEN + 20 + 4];
        data[12] = 0x08;
        data[13] = 0x00;
        data[14] = 0x45;
        data[23] = flow.protocol;
        data[26..30].copy_from_slice(&flow.src_ip.to_be_bytes());
        data[30..34].copy_from_slice(&flow.dst_ip.to_be_bytes());
        data[34..36].copy_from_slice(&flow.src_port.to_be_bytes());
        data[36..38].copy_from_slice(&flow.dst_port.to_be_bytes());
        data
    }

    #[test]
    fn lan_to_wan_always_forwards_and_learns() {
        let mut table = ReflectionTable::new(10_000, 4).unwrap();
        table.learn_internal(0, flow(1));
        assert!(table.has_external(0, flow(1).reverse()));
    }

    #[test]
    fn wan_to_lan_unknown_flow_is_blocked() {
        let table = ReflectionTable::new(10_000, 4).unwrap();
        assert!(!table.has_external(0, flow(1).reverse()));
    }

    #[test]
    fn learned_flow_expires() {
        let mut table = ReflectionTable::new(100, 4).unwrap();
        table.learn_internal(0, flow(1));
        assert!(table.has_external(50, flow(1).reverse()));
        assert!(!table.has_external(200, flow(1).reverse()));
    }

    #[test]
    fn full_table_of_young_flows_drops_new_learns() {
        let mut table = ReflectionTable::new(10_000, 1).unwrap();
        table.learn_internal(0, flow(1));
        table.learn_internal(0, flow(2)); // dropped, table full of flow(1)
        assert!(table.has_external(0, flow(1).reverse()));
        assert!(!table.has_external(0, flow(2).reverse()));
    }

    #[test]
    fn end_to_end_reflection_through_firewall_handle() {
        let config = Config::from_value(serde_json::json!({
            "wan device": 1,
            "max flows": 16,
            "expiration time": 10_000_000_000i64,
        }))
        .unwrap();
        let mut fw = Firewall::init(&config, 2).unwrap();

        // LAN (device 0) sends out; must forward and learn.
        let mut out = packet_bytes(flow(1));
        let out_packet = nf_net::Packet::new(&mut out, 0);
        let out_headers = out_packet.parse().unwrap();
        assert_eq!(fw.handle(0, &out_packet, out_headers), Verdict::Forward(1));

        // WAN (device 1) reply with the reversed tuple; must forward.
        let mut reply = packet_bytes(flow(1).reverse());
        let reply_packet = nf_net::Packet::new(&mut reply, 1);
        let reply_headers = reply_packet.parse().unwrap();
        assert_eq!(fw.handle(1, &reply_packet, reply_headers), Verdict::Forward(0));

        // Unsolicited WAN traffic is blocked.
        let mut unsolicited = packet_bytes(flow(99).reverse());
        let unsolicited_packet = nf_net::Packet::new(&mut unsolicited, 1);
        let unsolicited_headers = unsolicited_packet.parse().unwrap();
        assert_eq!(fw.handle(1, &unsolicited_packet, unsolicited_headers), Verdict::Drop);
    }

    #[test]
    fn init_rejects_wrong_device_count() {
        let config = Config::from_value(serde_json::json!({})).unwrap();
        assert!(Firewall::init(&config, 3).is_err());
    }
}
