//! Link/IP/transport header dissection (spec.md §4.B): decodes one raw
//! frame into a typed result the matchers consume directly, rather than a
//! nested dynamic map.

pub mod arp;
pub mod ethernet;
pub mod icmp;
pub mod ip;
pub mod tcp;
pub mod udp;

pub use arp::ArpPacket;
pub use icmp::IcmpPacket;
pub use ip::Ipv4Header;
pub use tcp::TcpSegment;
pub use udp::UdpDatagram;

use ethernet::{parse_ethernet, ETHERTYPE_ARP, ETHERTYPE_IPV4};
use ip::{parse_ipv4, PROTO_ICMP, PROTO_TCP, PROTO_UDP};

/// The outcome of dissecting one frame: which branch of §4.B it took.
pub enum Dissected<'a> {
    Arp(ArpPacket),
    Tcp {
        ip: Ipv4Header,
        tcp: TcpSegment<'a>,
    },
    Udp {
        ip: Ipv4Header,
        udp: UdpDatagram<'a>,
    },
    Icmp {
        ip: Ipv4Header,
        icmp: IcmpPacket<'a>,
    },
}

/// Dissect one link-layer frame. Returns `None` for anything outside
/// spec.md's scope (non-ARP/IPv4 ethertypes, non-TCP/UDP/ICMP protocols,
/// or a header too short to parse) — the caller counts these in stats.
pub fn dissect(data: &[u8]) -> Option<Dissected<'_>> {
    let eth = parse_ethernet(data)?;

    match eth.ethertype {
        ETHERTYPE_ARP => parse_arp_branch(eth.payload),
        ETHERTYPE_IPV4 => parse_ipv4_branch(eth.payload),
        _ => None,
    }
}

fn parse_arp_branch(payload: &[u8]) -> Option<Dissected<'_>> {
    arp::parse_arp(payload).map(Dissected::Arp)
}

fn parse_ipv4_branch(payload: &[u8]) -> Option<Dissected<'_>> {
    let (ip, rest) = parse_ipv4(payload)?;
    match ip.proto {
        PROTO_TCP => tcp::parse_tcp(rest).map(|tcp| Dissected::Tcp { ip, tcp }),
        PROTO_UDP => udp::parse_udp(rest).map(|udp| Dissected::Udp { ip, udp }),
        PROTO_ICMP => icmp::parse_icmp(rest).map(|icmp| Dissected::Icmp { ip, icmp }),
        _ => None,
    }
}
