use crate::error::{Error, Result};
use crate::structs::*;
use pcap_file::pcap::PcapReader;
use pcap_file::pcapng::{Block, PcapNgReader};
use pcap_file::{DataLink, PcapError};
use pnet_packet::ethernet::{EtherType, EtherTypes, EthernetPacket};
use pnet_packet::ip::IpNextHeaderProtocols;
use pnet_packet::ipv4::Ipv4Packet;
use pnet_packet::tcp::TcpPacket;
use pnet_packet::udp::UdpPacket;
use pnet_packet::vlan::VlanPacket;
use pnet_packet::Packet;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::time::Duration;

const SLL_HEADER_LEN: usize = 16;
/// Block type of a pcapng section header, identical in both byte orders
const PCAPNG_MAGIC: [u8; 4] = [0x0A, 0x0D, 0x0D, 0x0A];

fn is_supported(datalink: DataLink) -> bool {
    matches!(
        datalink,
        DataLink::ETHERNET | DataLink::RAW | DataLink::IPV4 | DataLink::LINUX_SLL
    )
}

enum CaptureReader<R: BufRead> {
    Pcap(PcapReader<R>, DataLink),
    /// Link types of the interfaces of the current section, by interface id
    PcapNg(PcapNgReader<R>, Vec<DataLink>),
}

/// Reads a pcap or pcapng container and yields decoded packets, one at a time.
///
/// Frames whose network or transport layer cannot be decoded are still
/// yielded, with the missing layers set to `None`. A read error inside the
/// container ends the iteration.
pub struct PcapSource<R: BufRead> {
    reader: CaptureReader<R>,
    packets_read: u64,
    done: bool,
}

impl PcapSource<BufReader<File>> {
    /// Open a capture file. Fails if the file is missing, is neither a pcap nor
    /// a pcapng file or uses an unsupported link type.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| Error::InputUnreadable {
            path: path.to_path_buf(),
            source,
        })?;
        let source = PcapSource::new(BufReader::new(file)).map_err(|e| match e {
            Error::InvalidCapture { source, .. } => Error::InvalidCapture {
                path: path.to_path_buf(),
                source,
            },
            e => e,
        })?;
        log::info!("Capture {} opened", path.display());
        Ok(source)
    }
}

impl<R: BufRead> PcapSource<R> {
    pub fn new(mut reader: R) -> Result<Self> {
        let invalid = |source| Error::InvalidCapture {
            path: Default::default(),
            source,
        };
        let is_pcapng = reader
            .fill_buf()
            .map(|buf| buf.starts_with(&PCAPNG_MAGIC))
            .unwrap_or(false);

        let reader = if is_pcapng {
            let reader = PcapNgReader::new(reader).map_err(invalid)?;
            log::debug!("pcapng capture");
            CaptureReader::PcapNg(reader, vec![])
        } else {
            let reader = PcapReader::new(reader).map_err(invalid)?;
            let datalink = reader.header().datalink;
            if !is_supported(datalink) {
                return Err(Error::UnsupportedDataLink(datalink));
            }
            log::debug!("pcap capture ({datalink:?})");
            CaptureReader::Pcap(reader, datalink)
        };
        Ok(PcapSource {
            reader,
            packets_read: 0,
            done: false,
        })
    }

    /// Number of frames read so far
    pub fn packets_read(&self) -> u64 {
        self.packets_read
    }

    fn next_frame(&mut self) -> Option<std::result::Result<DecodedPacket, PcapError>> {
        match &mut self.reader {
            CaptureReader::Pcap(reader, datalink) => {
                let datalink = *datalink;
                reader
                    .next_packet()
                    .map(|r| r.map(|p| decoded(datalink, p.timestamp, &p.data)))
            }
            CaptureReader::PcapNg(reader, interfaces) => loop {
                let block = match reader.next_block()? {
                    Ok(block) => block,
                    Err(e) => return Some(Err(e)),
                };
                match block {
                    Block::SectionHeader(_) => interfaces.clear(),
                    Block::InterfaceDescription(idb) => {
                        if !is_supported(idb.linktype) {
                            log::warn!(
                                "Unsupported link type {:?} on interface {}, packets skipped",
                                idb.linktype,
                                interfaces.len()
                            );
                        }
                        interfaces.push(idb.linktype);
                    }
                    Block::EnhancedPacket(epb) => {
                        let datalink = interface_link(interfaces, epb.interface_id as usize);
                        return Some(Ok(decoded(datalink, epb.timestamp, &epb.data)));
                    }
                    // simple packets always belong to the first interface
                    Block::SimplePacket(spb) => {
                        let datalink = interface_link(interfaces, 0);
                        return Some(Ok(decoded(datalink, Duration::ZERO, &spb.data)));
                    }
                    _ => (),
                }
            },
        }
    }
}

fn interface_link(interfaces: &[DataLink], id: usize) -> DataLink {
    interfaces.get(id).copied().unwrap_or(DataLink::NULL)
}

fn decoded(datalink: DataLink, timestamp: Duration, data: &[u8]) -> DecodedPacket {
    let (network, transport) = decode_frame(datalink, data);
    DecodedPacket {
        timestamp,
        network,
        transport,
        captured_len: data.len() as u32,
    }
}

impl<R: BufRead> Iterator for PcapSource<R> {
    type Item = DecodedPacket;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.next_frame() {
            Some(Ok(packet)) => {
                self.packets_read += 1;
                Some(packet)
            }
            Some(Err(e)) => {
                log::warn!(
                    "Capture read error after {} packets, ignoring the rest: {e}",
                    self.packets_read
                );
                self.done = true;
                None
            }
            None => {
                self.done = true;
                None
            }
        }
    }
}


/// Demultiplex a captured frame down to its IPv4 and TCP/UDP layers
pub fn decode_frame(
    datalink: DataLink,
    data: &[u8],
) -> (Option<Ipv4Layer>, Option<TransportLayer>) {
    match datalink {
        DataLink::ETHERNET => match EthernetPacket::new(data) {
            Some(eth) => decode_ethertype(eth.get_ethertype(), eth.payload()),
            None => (None, None),
        },
        DataLink::RAW | DataLink::IPV4 => decode_ipv4(data),
        DataLink::LINUX_SLL if data.len() >= SLL_HEADER_LEN => {
            let ethertype = EtherType::new(u16::from_be_bytes([data[14], data[15]]));
            decode_ethertype(ethertype, &data[SLL_HEADER_LEN..])
        }
        _ => (None, None),
    }
}

fn decode_ethertype(
    ethertype: EtherType,
    payload: &[u8],
) -> (Option<Ipv4Layer>, Option<TransportLayer>) {
    match ethertype {
        EtherTypes::Ipv4 => decode_ipv4(payload),
        // a single 802.1Q tag
        EtherTypes::Vlan => match VlanPacket::new(payload) {
            Some(vlan) if vlan.get_ethertype() == EtherTypes::Ipv4 => decode_ipv4(vlan.payload()),
            _ => (None, None),
        },
        _ => (None, None),
    }
}

fn decode_ipv4(data: &[u8]) -> (Option<Ipv4Layer>, Option<TransportLayer>) {
    let Some(ip_packet) = Ipv4Packet::new(data) else {
        return (None, None);
    };
    if ip_packet.get_version() != 4 || ip_packet.get_header_length() < 5 {
        return (None, None);
    }
    let network = Some(Ipv4Layer {
        src_ip: ip_packet.get_source(),
        dst_ip: ip_packet.get_destination(),
    });
    // only the first fragment carries the transport header
    if ip_packet.get_fragment_offset() != 0 {
        return (network, None);
    }

    let transport = match ip_packet.get_next_level_protocol() {
        IpNextHeaderProtocols::Tcp => TcpPacket::new(ip_packet.payload()).map(|tcp| TransportLayer {
            protocol: L4Proto::TCP,
            src_port: tcp.get_source(),
            dst_port: tcp.get_destination(),
        }),
        IpNextHeaderProtocols::Udp => UdpPacket::new(ip_packet.payload()).map(|udp| TransportLayer {
            protocol: L4Proto::UDP,
            src_port: udp.get_source(),
            dst_port: udp.get_destination(),
        }),
        _ => None,
    };
    (network, transport)
}
