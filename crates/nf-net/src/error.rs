use thiserror::Error;

/// A packet that couldn't be classified as TCP/UDP-over-IPv4-over-Ethernet,
/// surfaced only where a caller wants the reason rather than a plain drop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ParseError {
    /// Shorter than a full Ethernet header.
    #[error("packet of {0} bytes is shorter than an Ethernet header")]
    Truncated(usize),
    /// Not an IPv4 payload.
    #[error("ethertype 0x{0:04x} is not IPv4")]
    NotIpv4(u16),
    /// IPv4 header length (IHL) claims a span the packet doesn't have.
    #[error("IPv4 header length extends past the captured packet")]
    TruncatedIpv4,
    /// Not TCP or UDP.
    #[error("IP protocol {0} is neither TCP nor UDP")]
    NotTcpOrUdp(u8),
    /// TCP/UDP header claims a span the packet doesn't have.
    #[error("TCP/UDP header extends past the captured packet")]
    TruncatedL4,
}
