#![allow(dead_code)]

use pcap_file::pcap::{PcapPacket, PcapWriter};
use pcap_file::pcapng::blocks::enhanced_packet::EnhancedPacketBlock;
use pcap_file::pcapng::blocks::interface_description::InterfaceDescriptionBlock;
use pcap_file::pcapng::{Block, PcapNgWriter};
use pcap_file::DataLink;
use std::borrow::Cow;
use pnet_packet::ethernet::{EtherTypes, MutableEthernetPacket};
use pnet_packet::ip::{IpNextHeaderProtocol, IpNextHeaderProtocols};
use pnet_packet::ipv4::{self, MutableIpv4Packet};
use pnet_packet::tcp::MutableTcpPacket;
use pnet_packet::udp::MutableUdpPacket;
use std::fs::File;
use std::io::BufWriter;
use std::net::Ipv4Addr;
use std::path::Path;
use std::time::Duration;

const ETH_LEN: usize = 14;
const IP_LEN: usize = 20;

pub enum Frame {
    Tcp(Ipv4Addr, u16, Ipv4Addr, u16),
    Udp(Ipv4Addr, u16, Ipv4Addr, u16),
    Icmp(Ipv4Addr, Ipv4Addr),
    Arp,
}

/// Build an Ethernet frame of exactly `len` bytes
pub fn build_frame(frame: &Frame, len: usize) -> Vec<u8> {
    let mut data = vec![0u8; len];
    let (proto, src, dst, l4_len) = match frame {
        Frame::Tcp(src, _, dst, _) => (IpNextHeaderProtocols::Tcp, *src, *dst, 20),
        Frame::Udp(src, _, dst, _) => (IpNextHeaderProtocols::Udp, *src, *dst, 8),
        Frame::Icmp(src, dst) => (IpNextHeaderProtocols::Icmp, *src, *dst, 8),
        Frame::Arp => {
            let mut eth = MutableEthernetPacket::new(&mut data).unwrap();
            eth.set_ethertype(EtherTypes::Arp);
            return data;
        }
    };
    assert!(len >= ETH_LEN + IP_LEN + l4_len, "frame too short");
    {
        let mut eth = MutableEthernetPacket::new(&mut data).unwrap();
        eth.set_ethertype(EtherTypes::Ipv4);
    }
    setup_ipv4(&mut data[ETH_LEN..], proto, src, dst);
    let l4 = &mut data[ETH_LEN + IP_LEN..];
    match frame {
        Frame::Tcp(_, sport, _, dport) => {
            let mut tcp = MutableTcpPacket::new(l4).unwrap();
            tcp.set_source(*sport);
            tcp.set_destination(*dport);
            tcp.set_data_offset(5);
        }
        Frame::Udp(_, sport, _, dport) => {
            let mut udp = MutableUdpPacket::new(l4).unwrap();
            udp.set_source(*sport);
            udp.set_destination(*dport);
            udp.set_length((len - ETH_LEN - IP_LEN) as u16);
        }
        _ => (),
    }
    data
}

fn setup_ipv4(packet: &mut [u8], proto: IpNextHeaderProtocol, src: Ipv4Addr, dst: Ipv4Addr) {
    let len = packet.len();
    let mut ip = MutableIpv4Packet::new(packet).unwrap();
    ip.set_version(4);
    ip.set_header_length(5);
    ip.set_total_length(len as u16);
    ip.set_ttl(64);
    ip.set_next_level_protocol(proto);
    ip.set_source(src);
    ip.set_destination(dst);
    ip.set_checksum(ipv4::checksum(&ip.to_immutable()));
}

/// Write an Ethernet pcap file with one packet per (frame, length) pair,
/// one second apart
pub fn write_capture(path: &Path, frames: &[(Frame, usize)]) {
    let file = BufWriter::new(File::create(path).unwrap());
    let mut writer = PcapWriter::new(file).unwrap();
    for (i, (frame, len)) in frames.iter().enumerate() {
        let data = build_frame(frame, *len);
        writer
            .write_packet(&PcapPacket::new(
                Duration::from_secs(1_700_000_000 + i as u64),
                data.len() as u32,
                &data,
            ))
            .unwrap();
    }
}

/// Same as `write_capture`, in a pcapng file with a single Ethernet interface
pub fn write_capture_ng(path: &Path, frames: &[(Frame, usize)]) {
    let file = BufWriter::new(File::create(path).unwrap());
    let mut writer = PcapNgWriter::new(file).unwrap();
    let interface = InterfaceDescriptionBlock {
        linktype: DataLink::ETHERNET,
        snaplen: 0xFFFF,
        options: vec![],
    };
    writer.write_block(&Block::InterfaceDescription(interface)).unwrap();
    for (i, (frame, len)) in frames.iter().enumerate() {
        let data = build_frame(frame, *len);
        let packet = EnhancedPacketBlock {
            interface_id: 0,
            timestamp: Duration::from_secs(1_700_000_000 + i as u64),
            original_len: data.len() as u32,
            data: Cow::Borrowed(&data),
            options: vec![],
        };
        writer.write_block(&Block::EnhancedPacket(packet)).unwrap();
    }
}
