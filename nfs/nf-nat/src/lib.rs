//! Stateful source NAT: LAN-to-WAN packets get their source address/port
//! rewritten to a shared external address and an allocated port; WAN-to-LAN
//! replies are translated back, with a spoofing check against the original
//! flow.

use nf_common::clock::Time;
use nf_common::config::Config;
use nf_common::error::ConfigError;
use nf_common::metrics::Counters;
use nf_core::FlowTable;
use nf_net::{Headers, Packet};

/// NAT configuration read from `--config`.
pub struct NatConfig {
    /// Shared external IPv4 address every outbound flow is translated to.
    pub external_addr: u32,
    /// Index of the WAN-facing device.
    pub wan_device: u16,
    /// Maximum number of concurrently-tracked flows (and allocated ports).
    pub max_flows: usize,
    /// Flow idle timeout, in nanoseconds.
    pub expiration_time: Time,
    /// First external port the allocator hands out.
    pub start_port: u16,
}

impl NatConfig {
    /// Load and validate NAT settings from `config`.
    pub fn from_config(config: &Config, devices_count: u16) -> Result<Self, ConfigError> {
        Ok(Self {
            external_addr: config.get_u32("external addr")?,
            wan_device: config.get_device("wan device", devices_count)?,
            max_flows: config.get_size("max flows")?,
            expiration_time: config.get_time("expiration time")?,
            start_port: config.get_u16("start port")?,
        })
    }
}

/// What `Nat::handle` decided for a packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Forward (now rewritten in place) to the given device.
    Forward(u16),
    /// Drop silently (caller logs the reason at `debug` level).
    Drop,
}

/// The NAT's running state.
pub struct Nat {
    config: NatConfig,
    table: FlowTable,
    /// Packet counters, exposed for the runtime to export.
    pub metrics: Counters,
}

impl Nat {
    /// Validate `devices_count == 2` and build the NAT.
    pub fn init(config: &Config, devices_count: u16) -> Result<Self, ConfigError> {
        if devices_count != 2 {
            return Err(ConfigError::Invalid {
                key: "devices_count".into(),
                reason: "NAT needs exactly two devices (LAN, WAN)".into(),
            });
        }
        let config = NatConfig::from_config(config, devices_count)?;
        let table = FlowTable::new(config.start_port, config.expiration_time, config.max_flows)
            .map_err(|e| ConfigError::Invalid { key: "max flows".into(), reason: e.to_string() })?;
        Ok(Self { config, table, metrics: Counters::default() })
    }

    /// Translate one packet in place.
    pub fn handle(&mut self, now: Time, packet: &mut Packet<'_>, headers: Headers) -> Verdict {
        self.metrics.rx_packets.inc();
        let verdict = self.handle_inner(now, packet, headers);
        match verdict {
            Verdict::Forward(_) => self.metrics.tx_packets.inc(),
            Verdict::Drop => {
                self.metrics.dropped.inc();
                tracing::debug!(device = packet.device, "dropping untranslatable packet");
            }
        }
        verdict
    }

    fn handle_inner(&mut self, now: Time, packet: &mut Packet<'_>, headers: Headers) -> Verdict {
        if packet.device == self.config.wan_device {
            let dst_port = packet.l4_dst_port(headers);
            let Some(internal_flow) = self.table.get_external(now, dst_port) else {
                self.metrics.flow_misses.inc();
                return Verdict::Drop; // unknown flow
            };
            self.metrics.flow_hits.inc();

            let spoofed = internal_flow.dst_ip != packet.ipv4_src(headers)
                || internal_flow.dst_port != packet.l4_src_port(headers)
                || internal_flow.protocol != packet.protocol(headers);
            if spoofed {
                return Verdict::Drop;
            }

            packet.rewrite_ipv4_dst(headers, internal_flow.src_ip);
            packet.rewrite_l4_dst_port(headers, true, internal_flow.src_port);
        } else {
            let flow = packet.flow_key(headers);
            let Some(external_port) = self.table.get_internal(now, flow) else {
                return Verdict::Drop; // no space for the flow
            };

            packet.rewrite_ipv4_src(headers, self.config.external_addr);
            packet.rewrite_l4_src_port(headers, true, external_port);
        }

        Verdict::Forward(1 - packet.device)
    }
}
