use serde::{Deserialize, Serialize};
use std::fmt::{Debug, Display};
use std::net::Ipv4Addr;
use std::time::Duration;

// Packet source structures

#[allow(clippy::upper_case_acronyms)]
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum L4Proto {
    TCP,
    UDP,
}

impl Display for L4Proto {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            L4Proto::TCP => write!(f, "TCP"),
            L4Proto::UDP => write!(f, "UDP"),
        }
    }
}

/// The addresses of the IPv4 layer of a packet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ipv4Layer {
    pub src_ip: Ipv4Addr,
    pub dst_ip: Ipv4Addr,
}

/// The ports of the TCP or UDP layer of a packet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransportLayer {
    pub protocol: L4Proto,
    pub src_port: u16,
    pub dst_port: u16,
}

/// A packet as handed over by a packet source. Layers that could not be
/// decoded are `None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodedPacket {
    pub timestamp: Duration,
    pub network: Option<Ipv4Layer>,
    pub transport: Option<TransportLayer>,
    /// Number of bytes actually captured for this packet
    pub captured_len: u32,
}

impl DecodedPacket {
    /// Build a TCP or UDP over IPv4 packet
    pub fn new(
        timestamp: Duration,
        protocol: L4Proto,
        src: (Ipv4Addr, u16),
        dst: (Ipv4Addr, u16),
        captured_len: u32,
    ) -> Self {
        DecodedPacket {
            timestamp,
            network: Some(Ipv4Layer {
                src_ip: src.0,
                dst_ip: dst.0,
            }),
            transport: Some(TransportLayer {
                protocol,
                src_port: src.1,
                dst_port: dst.1,
            }),
            captured_len,
        }
    }
}

/// Network address of an IPv4 address under its default class mask.
///
/// Class A (first octet below 128) keeps 8 bits, class B (below 192) keeps 16
/// bits, everything else keeps 24 bits.
pub fn subnet_of(ip: Ipv4Addr) -> Ipv4Addr {
    let bits = ip.to_bits();
    let mask: u32 = match ip.octets()[0] {
        0..=127 => 0xff00_0000,
        128..=191 => 0xffff_0000,
        _ => 0xffff_ff00,
    };
    Ipv4Addr::from_bits(bits & mask)
}

// Synthesis structures

/// Outcome of a port draw. `NoData` marks a record built from fallback data:
/// the host had no port history for the chosen protocol.
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortSample {
    Port(u16),
    NoData,
}

impl PortSample {
    pub fn port(&self) -> Option<u16> {
        match self {
            PortSample::Port(p) => Some(*p),
            PortSample::NoData => None,
        }
    }

    /// `NoData` is never below a threshold
    pub fn is_at_most(&self, threshold: u16) -> bool {
        matches!(self, PortSample::Port(p) if *p <= threshold)
    }
}

impl Display for PortSample {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PortSample::Port(p) => write!(f, "{p}"),
            PortSample::NoData => write!(f, "-"),
        }
    }
}

/// A synthetic flow record. The addresses are `None` when the profile had no
/// host to draw from.
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyntheticRecord {
    pub src_ip: Option<Ipv4Addr>,
    pub dst_ip: Option<Ipv4Addr>,
    pub src_port: PortSample,
    pub dst_port: PortSample,
    pub protocol: L4Proto,
    pub bytes: u64,
}

impl SyntheticRecord {
    /// Whether at least one of the two ports is at most `threshold`
    pub fn passes_port_filter(&self, threshold: u16) -> bool {
        self.src_port.is_at_most(threshold) || self.dst_port.is_at_most(threshold)
    }

    /// The six fields in output order
    pub fn fields(&self) -> [String; 6] {
        let ip = |ip: Option<Ipv4Addr>| ip.map(|ip| ip.to_string()).unwrap_or_default();
        [
            ip(self.src_ip),
            ip(self.dst_ip),
            self.src_port.to_string(),
            self.dst_port.to_string(),
            self.protocol.to_string(),
            self.bytes.to_string(),
        ]
    }
}

impl Display for SyntheticRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.fields().join(", "))
    }
}
