use crate::profile::{EntityStats, ProfileRegistry};
use crate::sampler::SelectionTable;
use crate::structs::*;
use rand_core::RngCore;
use rand_distr::{Distribution, Uniform};
use std::collections::BTreeMap;
use std::net::Ipv4Addr;

/// Records whose ports are both above this value are not emitted
pub const DEFAULT_PORT_THRESHOLD: u16 = 10000;

/// Draws synthetic flow records from a finalized profile.
///
/// Each draw picks a source and a destination subnet, then a host inside each
/// subnet, then a protocol, the ports and a size estimate. Draws are
/// independent: the only state is the read-only profile and the tables derived
/// from it.
pub struct Synthesizer<'a> {
    registry: &'a ProfileRegistry,
    subnets: SelectionTable<Ipv4Addr>,
    /// Host tables restricted to one subnet. The weights are the global host
    /// weights, normalized against the total of the subnet's hosts only.
    hosts_by_subnet: BTreeMap<Ipv4Addr, SelectionTable<Ipv4Addr>>,
    port_threshold: u16,
}

impl<'a> Synthesizer<'a> {
    pub fn new(registry: &'a ProfileRegistry) -> Self {
        let subnets = SelectionTable::from_weights(
            registry
                .subnet_stats
                .iter()
                .map(|(subnet, stats)| (*subnet, stats.weight())),
        );

        let mut grouped: BTreeMap<Ipv4Addr, Vec<(Ipv4Addr, u64)>> = BTreeMap::new();
        for (host, stats) in registry.host_stats.iter() {
            grouped
                .entry(subnet_of(*host))
                .or_default()
                .push((*host, stats.weight()));
        }
        let hosts_by_subnet: BTreeMap<_, _> = grouped
            .into_iter()
            .map(|(subnet, hosts)| (subnet, SelectionTable::from_weights(hosts)))
            .collect();
        log::debug!(
            "Selection tables: {} subnets, {} host groups",
            subnets.len(),
            hosts_by_subnet.len()
        );

        Synthesizer {
            registry,
            subnets,
            hosts_by_subnet,
            port_threshold: DEFAULT_PORT_THRESHOLD,
        }
    }

    pub fn with_port_threshold(mut self, port_threshold: u16) -> Self {
        self.port_threshold = port_threshold;
        self
    }

    /// Perform `count` draws and keep the records that pass the port filter.
    /// The result is usually shorter than `count`.
    pub fn generate(&self, count: u64, rng: &mut impl RngCore) -> Vec<SyntheticRecord> {
        let mut records = vec![];
        for _ in 0..count {
            let record = self.draw(rng);
            if record.passes_port_filter(self.port_threshold) {
                log::trace!("{record} (kept)");
                records.push(record);
            } else {
                log::trace!("{record} (dropped)");
            }
        }
        log::info!(
            "{} records kept out of {count} draws (port threshold {})",
            records.len(),
            self.port_threshold
        );
        records
    }

    /// A single draw, before the port filter
    pub fn draw(&self, rng: &mut impl RngCore) -> SyntheticRecord {
        let src_subnet = self.subnets.draw(rng).copied();
        let dst_subnet = self.subnets.draw(rng).copied();
        let src_ip = src_subnet.and_then(|s| self.draw_host(s, rng));
        let dst_ip = dst_subnet.and_then(|s| self.draw_host(s, rng));
        self.record_between(src_ip, dst_ip, rng)
    }

    fn draw_host(&self, subnet: Ipv4Addr, rng: &mut impl RngCore) -> Option<Ipv4Addr> {
        self.hosts_by_subnet
            .get(&subnet)
            .and_then(|table| table.draw(rng).copied())
    }

    /// Build a record between two hosts. If any of them has no statistics, the
    /// record is made of random ports over TCP with a null size.
    pub fn record_between(
        &self,
        src_ip: Option<Ipv4Addr>,
        dst_ip: Option<Ipv4Addr>,
        rng: &mut impl RngCore,
    ) -> SyntheticRecord {
        let src_stats = src_ip.and_then(|ip| self.registry.host_stats.get(&ip));
        let dst_stats = dst_ip.and_then(|ip| self.registry.host_stats.get(&ip));
        let (Some(src_stats), Some(dst_stats)) = (src_stats, dst_stats) else {
            log::trace!("Unknown host, random record");
            let ports = Uniform::new_inclusive(0, u16::MAX);
            return SyntheticRecord {
                src_ip,
                dst_ip,
                src_port: PortSample::Port(ports.sample(rng)),
                dst_port: PortSample::Port(ports.sample(rng)),
                protocol: L4Proto::TCP,
                bytes: 0,
            };
        };

        let protocol = choose_protocol(src_stats, dst_stats);
        let src_conv = &src_stats.src_conversation;
        let dst_conv = &dst_stats.dst_conversation;
        let src_port = sample_port(src_conv.port_usage(protocol), rng);
        let dst_port = sample_port(dst_conv.port_usage(protocol), rng);

        let src_bytes = src_conv.estimate_bytes(protocol, src_port.port());
        let dst_bytes = dst_conv.estimate_bytes(protocol, dst_port.port());

        SyntheticRecord {
            src_ip,
            dst_ip,
            src_port,
            dst_port,
            protocol,
            bytes: (src_bytes + dst_bytes) / 2,
        }
    }
}

/// TCP unless the two hosts used UDP ports more often. Both hosts are weighted
/// by the ports they used as a source.
fn choose_protocol(src: &EntityStats, dst: &EntityStats) -> L4Proto {
    let weight = |proto| {
        src.src_conversation.port_totals(proto) + dst.src_conversation.port_totals(proto)
    };
    if weight(L4Proto::TCP) >= weight(L4Proto::UDP) {
        L4Proto::TCP
    } else {
        L4Proto::UDP
    }
}

fn sample_port(usage: &BTreeMap<u16, u64>, rng: &mut impl RngCore) -> PortSample {
    let table = SelectionTable::from_weights(usage.iter().map(|(port, count)| (*port, *count)));
    match table.draw(rng) {
        Some(port) => PortSample::Port(*port),
        None => PortSample::NoData,
    }
}
