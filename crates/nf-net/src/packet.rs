//! The packet view NF binaries receive from their runtime, and the
//! transmit contract they call back into it with.

use crate::checksum;
use crate::error::ParseError;
use crate::{ethernet, ipv4, tcpudp};
use nf_common::flow::FlowKey;

/// Offsets of the three headers `parse` found, relative to the start of the
/// packet. All three headers alias the same underlying buffer — collapsing
/// them into offsets on one [`Packet`] avoids needing three live `&mut`
/// borrows into the same slice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Headers {
    ipv4_offset: usize,
    l4_offset: usize,
}

/// One packet: a device it arrived on and a mutable view of its bytes.
pub struct Packet<'a> {
    data: &'a mut [u8],
    /// Device (NIC) the packet arrived on.
    pub device: u16,
}

impl<'a> Packet<'a> {
    /// Wrap a raw frame received on `device`.
    pub fn new(data: &'a mut [u8], device: u16) -> Self {
        Self { data, device }
    }

    /// Raw frame bytes.
    pub fn bytes(&self) -> &[u8] {
        self.data
    }

    /// Parse Ethernet + IPv4 + TCP/UDP headers, chaining each stage so the
    /// first failure wins.
    pub fn parse(&self) -> Result<Headers, ParseError> {
        if self.data.len() < ethernet::HEADER_LEN {
            return Err(ParseError::Truncated(self.data.len()));
        }
        let ethertype = ethernet::ethertype(self.data);
        if ethertype != ethernet::ETHERTYPE_IPV4 {
            return Err(ParseError::NotIpv4(ethertype));
        }

        let ipv4_offset = ethernet::HEADER_LEN;
        if self.data.len() < ipv4_offset + 20 {
            return Err(ParseError::TruncatedIpv4);
        }
        let ihl = ipv4::ihl_bytes(&self.data[ipv4_offset..]);
        let l4_offset = ipv4_offset + ihl;
        if ihl < 20 || self.data.len() < l4_offset {
            return Err(ParseError::TruncatedIpv4);
        }

        let protocol = ipv4::protocol(&self.data[ipv4_offset..]);
        if protocol != ipv4::PROTO_TCP && protocol != ipv4::PROTO_UDP {
            return Err(ParseError::NotTcpOrUdp(protocol));
        }
        if self.data.len() < l4_offset + 4 {
            return Err(ParseError::TruncatedL4);
        }

        Ok(Headers { ipv4_offset, l4_offset })
    }

    fn ipv4(&self, h: Headers) -> &[u8] {
        &self.data[h.ipv4_offset..]
    }

    fn ipv4_mut(&mut self, h: Headers) -> &mut [u8] {
        &mut self.data[h.ipv4_offset..]
    }

    fn l4(&self, h: Headers) -> &[u8] {
        &self.data[h.l4_offset..]
    }

    fn l4_mut(&mut self, h: Headers) -> &mut [u8] {
        &mut self.data[h.l4_offset..]
    }

    /// The flow 5-tuple this packet belongs to (source-perspective).
    pub fn flow_key(&self, h: Headers) -> FlowKey {
        FlowKey::new(
            ipv4::src_addr(self.ipv4(h)),
            ipv4::dst_addr(self.ipv4(h)),
            tcpudp::src_port(self.l4(h)),
            tcpudp::dst_port(self.l4(h)),
            ipv4::protocol(self.ipv4(h)),
        )
    }

    /// IP protocol number (6 = TCP, 17 = UDP).
    pub fn protocol(&self, h: Headers) -> u8 {
        ipv4::protocol(self.ipv4(h))
    }

    /// Source IPv4 address.
    pub fn ipv4_src(&self, h: Headers) -> u32 {
        ipv4::src_addr(self.ipv4(h))
    }

    /// Destination IPv4 address.
    pub fn ipv4_dst(&self, h: Headers) -> u32 {
        ipv4::dst_addr(self.ipv4(h))
    }

    /// Source TCP/UDP port.
    pub fn l4_src_port(&self, h: Headers) -> u16 {
        tcpudp::src_port(self.l4(h))
    }

    /// Destination TCP/UDP port.
    pub fn l4_dst_port(&self, h: Headers) -> u16 {
        tcpudp::dst_port(self.l4(h))
    }

    /// Rewrite the source address, updating the IPv4 checksum incrementally
    /// first.
    pub fn rewrite_ipv4_src(&mut self, h: Headers, new: u32) {
        let old = self.ipv4_src(h);
        let checksum = ipv4::checksum(self.ipv4(h));
        let updated = checksum::update_for_u32_field(checksum, old, new);
        let header = self.ipv4_mut(h);
        ipv4::set_checksum(header, updated);
        ipv4::set_src_addr(header, new);
    }

    /// Rewrite the destination address, updating the IPv4 checksum first.
    pub fn rewrite_ipv4_dst(&mut self, h: Headers, new: u32) {
        let old = self.ipv4_dst(h);
        let checksum = ipv4::checksum(self.ipv4(h));
        let updated = checksum::update_for_u32_field(checksum, old, new);
        let header = self.ipv4_mut(h);
        ipv4::set_checksum(header, updated);
        ipv4::set_dst_addr(header, new);
    }

    /// Rewrite the source port. Only the IPv4 header checksum is updated
    /// here — TCP/UDP checksums aren't recomputed, matching how NAT and the
    /// load balancer use this call.
    pub fn rewrite_l4_src_port(&mut self, h: Headers, ipv4_checksum_update: bool, new: u16) {
        let old = self.l4_src_port(h);
        if ipv4_checksum_update {
            let checksum = ipv4::checksum(self.ipv4(h));
            let updated = checksum::update_for_u16_field(checksum, old, new);
            ipv4::set_checksum(self.ipv4_mut(h), updated);
        }
        tcpudp::set_src_port(self.l4_mut(h), new);
    }

    /// Rewrite the destination port, see [`Packet::rewrite_l4_src_port`].
    pub fn rewrite_l4_dst_port(&mut self, h: Headers, ipv4_checksum_update: bool, new: u16) {
        let old = self.l4_dst_port(h);
        if ipv4_checksum_update {
            let checksum = ipv4::checksum(self.ipv4(h));
            let updated = checksum::update_for_u16_field(checksum, old, new);
            ipv4::set_checksum(self.ipv4_mut(h), updated);
        }
        tcpudp::set_dst_port(self.l4_mut(h), new);
    }

    /// Destination MAC address (for bridge MAC learning).
    pub fn ether_dst(&self) -> ethernet::MacAddr {
        ethernet::dst_addr(self.data)
    }

    /// Source MAC address (for bridge MAC learning).
    pub fn ether_src(&self) -> ethernet::MacAddr {
        ethernet::src_addr(self.data)
    }

    fn set_ether_addrs(&mut self, dst: ethernet::MacAddr, src: ethernet::MacAddr) {
        ethernet::set_dst_addr(self.data, dst);
        ethernet::set_src_addr(self.data, src);
    }
}

/// Flags accepted by [`PacketIo::transmit`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TransmitFlags {
    /// Rewrite the Ethernet addresses to the outbound device's configured
    /// pair before sending (`UPDATE_ETHER_ADDRS`).
    pub update_ether_addrs: bool,
}

/// The runtime surface an NF binary drives its packets through: receive one
/// frame, transmit one, or flood to every other device.
pub trait PacketIo {
    /// Configured (dst, src) Ethernet address pair for `device`, used when
    /// `TransmitFlags::update_ether_addrs` is set.
    fn ether_addrs(&self, device: u16) -> (ethernet::MacAddr, ethernet::MacAddr);

    /// Hand a packet to `device` for transmission, honoring `flags`.
    fn transmit(&mut self, packet: Packet<'_>, device: u16, flags: TransmitFlags) {
        let mut packet = packet;
        if flags.update_ether_addrs {
            let (dst, src) = self.ether_addrs(device);
            packet.set_ether_addrs(dst, src);
        }
        self.send(packet, device);
    }

    /// Transmit `packet` unmodified to every device except the one it
    /// arrived on.
    fn flood(&mut self, packet: Packet<'_>, device_count: u16) {
        for device in 0..device_count {
            if device != packet.device {
                self.send_clone(&packet, device);
            }
        }
    }

    /// Low-level send of one already-prepared packet to `device`.
    fn send(&mut self, packet: Packet<'_>, device: u16);

    /// Low-level send of a copy of `packet` to `device` (for flooding).
    fn send_clone(&mut self, packet: &Packet<'_>, device: u16);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_udp_packet() -> Vec<u8> {
        let mut data = vec![0u8; 14 + 20 + 8];
        data[12] = 0x08;
        data[13] = 0x00; // ethertype IPv4
        data[14] = 0x45; // version 4, IHL 5
        data[23] = 17; // UDP
        data[26..30].copy_from_slice(&10u32.to_be_bytes());
        data[30..34].copy_from_slice(&20u32.to_be_bytes());
        data[34..36].copy_from_slice(&1234u16.to_be_bytes());
        data[36..38].copy_from_slice(&80u16.to_be_bytes());
        data
    }

    #[test]
    fn parses_udp_over_ipv4_over_ethernet() {
        let mut data = sample_udp_packet();
        let packet = Packet::new(&mut data, 0);
        let headers = packet.parse().unwrap();
        assert_eq!(packet.ipv4_src(headers), 10);
        assert_eq!(packet.ipv4_dst(headers), 20);
        assert_eq!(packet.l4_src_port(headers), 1234);
        assert_eq!(packet.l4_dst_port(headers), 80);
        assert_eq!(packet.protocol(headers), 17);
    }

    #[test]
    fn rejects_non_ipv4_ethertype() {
        let mut data = sample_udp_packet();
        data[12] = 0x86;
        data[13] = 0xdd; // IPv6
        let packet = Packet::new(&mut data, 0);
        assert_eq!(packet.parse(), Err(ParseError::NotIpv4(0x86dd)));
    }

    #[test]
    fn rejects_truncated_frame() {
        let mut data = vec![0u8; 10];
        let packet = Packet::new(&mut data, 0);
        assert_eq!(packet.parse(), Err(ParseError::Truncated(10)));
    }

    #[test]
    fn rewrite_src_address_updates_checksum_and_field() {
        let mut data = sample_udp_packet();
        // Seed a checksum consistent with the unmodified header.
        let checksum = crate::checksum::compute(&data[14..34]);
        data[24..26].copy_from_slice(&checksum.to_be_bytes());

        let mut packet = Packet::new(&mut data, 0);
        let headers = packet.parse().unwrap();
        packet.rewrite_ipv4_src(headers, 0xc0a80001);
        assert_eq!(packet.ipv4_src(headers), 0xc0a80001);

        let mut verify = data.clone();
        verify[24..26].copy_from_slice(&0u16.to_be_bytes());
        let recomputed = crate::checksum::compute(&verify[14..34]);
        assert_eq!(u16::from_be_bytes([data[24], data[25]]), recomputed);
    }
}
