use crate::structs::*;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt::Display;
use std::net::Ipv4Addr;
use std::time::Duration;

/// Running mean of the captured length of packets seen on a port
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct AverageByteTracker {
    count: u64,
    sum: u64,
}

impl AverageByteTracker {
    fn new(len: u64) -> Self {
        AverageByteTracker { count: 1, sum: len }
    }

    fn record(&mut self, len: u64) {
        self.count += 1;
        self.sum += len;
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    /// Integer mean, rounded down
    pub fn average(&self) -> u64 {
        self.sum / self.count
    }
}

/// Traffic fingerprint of an entity in one direction (as source or as destination)
#[derive(Serialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct ConversationStats {
    pub tcp_port_usage: BTreeMap<u16, u64>,
    pub udp_port_usage: BTreeMap<u16, u64>,
    pub tcp_port_bytes: BTreeMap<u16, AverageByteTracker>,
    pub udp_port_bytes: BTreeMap<u16, AverageByteTracker>,
    pub total_packet_count: u64,
    pub total_bytes: u64,
    pub total_conversations: u64,
    pub total_internal: u64,
    pub total_external: u64,
}

impl ConversationStats {
    /// Account for a packet. Packets without an IPv4 and a TCP/UDP layer are ignored.
    pub fn update(&mut self, packet: &DecodedPacket) {
        let (Some(network), Some(transport)) = (packet.network, packet.transport) else {
            return;
        };
        let len = packet.captured_len as u64;
        let (usage, bytes) = match transport.protocol {
            L4Proto::TCP => (&mut self.tcp_port_usage, &mut self.tcp_port_bytes),
            L4Proto::UDP => (&mut self.udp_port_usage, &mut self.udp_port_bytes),
        };
        // both ports are counted, even when they are equal
        for port in [transport.src_port, transport.dst_port] {
            *usage.entry(port).or_default() += 1;
            bytes
                .entry(port)
                .and_modify(|t| t.record(len))
                .or_insert_with(|| AverageByteTracker::new(len));
        }

        self.total_packet_count += 1;
        self.total_bytes += len;
        self.total_conversations += 1;
        if subnet_of(network.src_ip) == subnet_of(network.dst_ip) {
            self.total_internal += 1;
        } else {
            self.total_external += 1;
        }
    }

    pub fn port_usage(&self, proto: L4Proto) -> &BTreeMap<u16, u64> {
        match proto {
            L4Proto::TCP => &self.tcp_port_usage,
            L4Proto::UDP => &self.udp_port_usage,
        }
    }

    pub fn port_bytes(&self, proto: L4Proto) -> &BTreeMap<u16, AverageByteTracker> {
        match proto {
            L4Proto::TCP => &self.tcp_port_bytes,
            L4Proto::UDP => &self.udp_port_bytes,
        }
    }

    /// Sum of the port usage counters of a protocol
    pub fn port_totals(&self, proto: L4Proto) -> u64 {
        self.port_usage(proto).values().sum()
    }

    /// Estimated size of a packet on that port. Without history for the port,
    /// fall back on the overall mean, with a denominator biased by one so it
    /// cannot be zero.
    pub fn estimate_bytes(&self, proto: L4Proto, port: Option<u16>) -> u64 {
        port.and_then(|p| self.port_bytes(proto).get(&p))
            .map(AverageByteTracker::average)
            .unwrap_or(self.total_bytes / (self.total_packet_count + 1))
    }

    /// Share of the conversations that stayed inside the subnet
    pub fn internal_ratio(&self) -> Option<f64> {
        if self.total_conversations == 0 {
            None
        } else {
            Some(self.total_internal as f64 / self.total_conversations as f64)
        }
    }
}

/// Statistics of a subnet or a host
#[derive(Serialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct EntityStats {
    /// Packets where the entity is the source
    pub src_conversation: ConversationStats,
    /// Packets where the entity is the destination
    pub dst_conversation: ConversationStats,
}

pub type SubnetStats = EntityStats;
pub type HostStats = EntityStats;

impl EntityStats {
    /// Selection weight of the entity
    pub fn weight(&self) -> u64 {
        self.src_conversation.total_conversations + self.dst_conversation.total_conversations
    }
}

/// Per-subnet and per-host statistics built from a capture.
///
/// Entries are created on first reference and never removed. Maps are ordered
/// by address so that everything derived from the registry is reproducible.
#[derive(Serialize, Debug, Clone, Default)]
pub struct ProfileRegistry {
    pub subnet_stats: BTreeMap<Ipv4Addr, SubnetStats>,
    pub host_stats: BTreeMap<Ipv4Addr, HostStats>,
    first_ts: Option<Duration>,
    last_ts: Option<Duration>,
    ingested: u64,
    skipped: u64,
}

impl ProfileRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from a finite sequence of packets
    pub fn from_packets(packets: impl IntoIterator<Item = DecodedPacket>) -> Self {
        let mut registry = ProfileRegistry::new();
        for p in packets {
            registry.ingest(&p);
        }
        log::info!(
            "{} packets profiled ({} without IPv4 layer), {} subnets, {} hosts",
            registry.ingested,
            registry.skipped,
            registry.subnet_stats.len(),
            registry.host_stats.len()
        );
        registry
    }

    /// Add a packet to the source and destination statistics of its subnets and hosts
    pub fn ingest(&mut self, packet: &DecodedPacket) {
        self.first_ts = Some(self.first_ts.map_or(packet.timestamp, |t| t.min(packet.timestamp)));
        self.last_ts = Some(self.last_ts.map_or(packet.timestamp, |t| t.max(packet.timestamp)));

        let Some(network) = packet.network else {
            log::trace!("Packet without IPv4 layer skipped");
            self.skipped += 1;
            return;
        };
        self.ingested += 1;
        let (src_host, dst_host) = (network.src_ip, network.dst_ip);
        let (src_subnet, dst_subnet) = (subnet_of(src_host), subnet_of(dst_host));

        self.subnet_stats
            .entry(src_subnet)
            .or_default()
            .src_conversation
            .update(packet);
        self.subnet_stats
            .entry(dst_subnet)
            .or_default()
            .dst_conversation
            .update(packet);
        self.host_stats
            .entry(src_host)
            .or_default()
            .src_conversation
            .update(packet);
        self.host_stats
            .entry(dst_host)
            .or_default()
            .dst_conversation
            .update(packet);
    }

    pub fn is_empty(&self) -> bool {
        self.host_stats.is_empty()
    }

    /// Timestamps of the earliest and latest packets
    pub fn time_span(&self) -> Option<(Duration, Duration)> {
        self.first_ts.zip(self.last_ts)
    }

    /// Number of packets without an IPv4 layer
    pub fn skipped(&self) -> u64 {
        self.skipped
    }

    pub fn summary(&self) -> Vec<EntitySummary> {
        self.subnet_stats
            .iter()
            .map(|(subnet, stats)| EntitySummary {
                entity: *subnet,
                sent_packets: stats.src_conversation.total_packet_count,
                sent_bytes: stats.src_conversation.total_bytes,
                received_packets: stats.dst_conversation.total_packet_count,
                received_bytes: stats.dst_conversation.total_bytes,
                internal_ratio: stats.src_conversation.internal_ratio(),
            })
            .collect()
    }
}

/// One line of the subnet overview
#[derive(Debug, Clone, PartialEq)]
pub struct EntitySummary {
    pub entity: Ipv4Addr,
    pub sent_packets: u64,
    pub sent_bytes: u64,
    pub received_packets: u64,
    pub received_bytes: u64,
    pub internal_ratio: Option<f64>,
}

impl Display for EntitySummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}: sent {} packets ({} B), received {} packets ({} B), internal ",
            self.entity,
            self.sent_packets,
            self.sent_bytes,
            self.received_packets,
            self.received_bytes
        )?;
        match self.internal_ratio {
            Some(r) => write!(f, "{:.1}%", r * 100.),
            None => write!(f, "n/a"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tcp(src: [u8; 4], sport: u16, dst: [u8; 4], dport: u16, len: u32) -> DecodedPacket {
        DecodedPacket::new(
            Duration::ZERO,
            L4Proto::TCP,
            (src.into(), sport),
            (dst.into(), dport),
            len,
        )
    }

    fn udp(src: [u8; 4], sport: u16, dst: [u8; 4], dport: u16, len: u32) -> DecodedPacket {
        DecodedPacket::new(
            Duration::ZERO,
            L4Proto::UDP,
            (src.into(), sport),
            (dst.into(), dport),
            len,
        )
    }

    #[test]
    fn test_average_tracker() {
        let mut t = AverageByteTracker::new(100);
        assert_eq!(t.average(), 100);
        t.record(51);
        assert_eq!(t.count(), 2);
        assert_eq!(t.average(), 75);
    }

    #[test]
    fn test_update_counts_both_ports() {
        let mut cs = ConversationStats::default();
        cs.update(&tcp([10, 0, 0, 1], 50000, [10, 0, 0, 2], 80, 100));
        cs.update(&tcp([10, 0, 0, 1], 50001, [10, 0, 0, 2], 80, 200));
        assert_eq!(cs.tcp_port_usage.get(&80), Some(&2));
        assert_eq!(cs.tcp_port_usage.get(&50000), Some(&1));
        assert_eq!(cs.tcp_port_bytes[&80].average(), 150);
        assert!(cs.udp_port_usage.is_empty());
        assert_eq!(cs.total_packet_count, 2);
        assert_eq!(cs.total_bytes, 300);
        assert_eq!(cs.total_conversations, 2);
        assert_eq!(cs.total_internal, 2);
        assert_eq!(cs.port_totals(L4Proto::TCP), 4);
    }

    #[test]
    fn test_update_same_ports() {
        let mut cs = ConversationStats::default();
        cs.update(&udp([10, 0, 0, 1], 53, [8, 8, 8, 8], 53, 70));
        assert_eq!(cs.udp_port_usage.get(&53), Some(&2));
        assert_eq!(cs.udp_port_bytes[&53].count(), 2);
        assert_eq!(cs.udp_port_bytes[&53].average(), 70);
        assert_eq!(cs.total_external, 1);
    }

    #[test]
    fn test_update_ignores_non_transport() {
        let mut cs = ConversationStats::default();
        let mut p = tcp([10, 0, 0, 1], 1, [10, 0, 0, 2], 2, 60);
        p.transport = None;
        cs.update(&p);
        assert_eq!(cs, ConversationStats::default());
    }

    #[test]
    fn test_estimate_bytes() {
        let mut cs = ConversationStats::default();
        assert_eq!(cs.estimate_bytes(L4Proto::TCP, Some(80)), 0);
        cs.update(&tcp([10, 0, 0, 1], 1234, [10, 0, 0, 2], 80, 90));
        assert_eq!(cs.estimate_bytes(L4Proto::TCP, Some(80)), 90);
        // no history for that port: 90 / (1 + 1)
        assert_eq!(cs.estimate_bytes(L4Proto::TCP, Some(443)), 45);
        assert_eq!(cs.estimate_bytes(L4Proto::UDP, None), 45);
    }

    #[test]
    fn test_internal_ratio() {
        let mut cs = ConversationStats::default();
        assert_eq!(cs.internal_ratio(), None);
        cs.update(&tcp([10, 0, 0, 1], 1, [10, 9, 9, 9], 2, 60));
        cs.update(&tcp([10, 0, 0, 1], 1, [11, 0, 0, 1], 2, 60));
        assert_eq!(cs.internal_ratio(), Some(0.5));
    }

    #[test]
    fn test_ingest_two_hosts() {
        let registry =
            ProfileRegistry::from_packets([tcp([10, 0, 0, 1], 50000, [10, 0, 0, 2], 80, 100)]);
        let src = &registry.host_stats[&Ipv4Addr::new(10, 0, 0, 1)];
        let dst = &registry.host_stats[&Ipv4Addr::new(10, 0, 0, 2)];
        assert_eq!(src.src_conversation.tcp_port_usage.get(&50000), Some(&1));
        assert_eq!(dst.dst_conversation.tcp_port_usage.get(&80), Some(&1));
        assert_eq!(src.dst_conversation, ConversationStats::default());
        assert_eq!(registry.subnet_stats.len(), 1);
        let subnet = &registry.subnet_stats[&Ipv4Addr::new(10, 0, 0, 0)];
        assert_eq!(subnet.weight(), 2);
    }

    #[test]
    fn test_ingest_without_network_layer() {
        let mut registry = ProfileRegistry::new();
        let mut p = tcp([10, 0, 0, 1], 1, [10, 0, 0, 2], 2, 60);
        p.network = None;
        registry.ingest(&p);
        assert!(registry.is_empty());
        assert!(registry.subnet_stats.is_empty());
        assert_eq!(registry.skipped(), 1);
    }

    #[test]
    fn test_ingest_without_transport_creates_entries() {
        let mut registry = ProfileRegistry::new();
        let mut p = tcp([10, 0, 0, 1], 1, [192, 168, 0, 2], 2, 60);
        p.transport = None;
        registry.ingest(&p);
        assert_eq!(registry.host_stats.len(), 2);
        assert_eq!(registry.subnet_stats.len(), 2);
        assert!(registry.host_stats.values().all(|s| s.weight() == 0));
    }

    #[test]
    fn test_internal_external_invariant() {
        let packets = vec![
            tcp([10, 0, 0, 1], 1000, [10, 0, 0, 2], 80, 100),
            tcp([10, 0, 0, 2], 80, [10, 0, 0, 1], 1000, 1500),
            udp([192, 168, 1, 4], 5353, [224, 0, 0, 251], 5353, 80),
            udp([172, 16, 0, 9], 4000, [10, 1, 1, 1], 53, 72),
            tcp([172, 16, 0, 9], 4001, [172, 16, 200, 1], 443, 600),
        ];
        let registry = ProfileRegistry::from_packets(packets);
        for stats in registry.subnet_stats.values().chain(registry.host_stats.values()) {
            for cs in [&stats.src_conversation, &stats.dst_conversation] {
                assert_eq!(cs.total_internal + cs.total_external, cs.total_conversations);
            }
        }
        let subnet = &registry.subnet_stats[&Ipv4Addr::new(172, 16, 0, 0)];
        assert_eq!(subnet.src_conversation.total_conversations, 2);
        assert_eq!(subnet.src_conversation.total_internal, 1);
    }

    #[test]
    fn test_time_span() {
        let mut registry = ProfileRegistry::new();
        assert_eq!(registry.time_span(), None);
        for secs in [5, 2, 9] {
            let mut p = tcp([10, 0, 0, 1], 1, [10, 0, 0, 2], 2, 60);
            p.timestamp = Duration::from_secs(secs);
            registry.ingest(&p);
        }
        assert_eq!(
            registry.time_span(),
            Some((Duration::from_secs(2), Duration::from_secs(9)))
        );
    }

    #[test]
    fn test_summary() {
        let registry = ProfileRegistry::from_packets([
            tcp([10, 0, 0, 1], 1000, [10, 0, 0, 2], 80, 100),
            tcp([10, 0, 0, 1], 1000, [192, 168, 0, 2], 80, 50),
        ]);
        let summary = registry.summary();
        assert_eq!(summary.len(), 2);
        assert_eq!(summary[0].entity, Ipv4Addr::new(10, 0, 0, 0));
        assert_eq!(summary[0].sent_packets, 2);
        assert_eq!(summary[0].sent_bytes, 150);
        assert_eq!(summary[0].internal_ratio, Some(0.5));
        assert_eq!(summary[1].received_packets, 1);
        assert_eq!(summary[1].internal_ratio, None);
        assert!(summary[1].to_string().ends_with("internal n/a"));
    }
}
