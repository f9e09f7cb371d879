//! NAT port/flow allocation.

use crate::error::CoreError;
use crate::index_pool::IndexPool;
use crate::map::{Map, MapKey};
use nf_common::clock::Time;
use nf_common::flow::{FlowKey, FLOW_KEY_SIZE};

impl MapKey<FLOW_KEY_SIZE> for FlowKey {
    fn to_bytes(&self) -> [u8; FLOW_KEY_SIZE] {
        FlowKey::to_bytes(self)
    }
}

/// Couples one [`IndexPool`] with one `Map<FlowKey -> index>` over a flat
/// array of flow records, to allocate and recycle NAT ports.
#[derive(Debug)]
pub struct FlowTable {
    flows: Vec<FlowKey>,
    index_of: Map<FlowKey, FLOW_KEY_SIZE>,
    ports: IndexPool,
    start_port: u16,
    max_flows: usize,
}

impl FlowTable {
    /// Build a flow table for `max_flows` concurrent flows, allocating
    /// external ports starting at `start_port`, expiring idle flows after
    /// `expiration` nanoseconds.
    pub fn new(start_port: u16, expiration: Time, max_flows: usize) -> Result<Self, CoreError> {
        let capacity = max_flows.next_power_of_two();
        Ok(Self {
            flows: vec![FlowKey::new(0, 0, 0, 0, 0); max_flows],
            index_of: Map::new(capacity)?,
            ports: IndexPool::new(max_flows, expiration)?,
            start_port,
            max_flows,
        })
    }

    /// Look up or allocate the external port for an internal flow, refreshing
    /// its expiration on every call.
    pub fn get_internal(&mut self, now: Time, flow: FlowKey) -> Option<u16> {
        if let Some(index) = self.index_of.get(&flow) {
            let index = index as usize;
            self.ports.refresh(now, index);
            return Some(self.start_port.wrapping_add(index as u16));
        }

        let (index, reused) = self.ports.borrow(now)?;
        if reused {
            self.index_of.remove(&self.flows[index]);
        }
        self.flows[index] = flow;
        self.index_of.set(self.flows[index], index as u64);
        Some(self.start_port.wrapping_add(index as u16))
    }

    /// Reverse-map an external port back to its internal flow, refreshing
    /// its expiration.
    pub fn get_external(&mut self, now: Time, port: u16) -> Option<FlowKey> {
        let index = port.wrapping_sub(self.start_port) as usize;
        if index >= self.max_flows {
            return None;
        }
        if !self.ports.used(now, index) {
            return None;
        }
        self.ports.refresh(now, index);
        Some(self.flows[index])
    }
}
