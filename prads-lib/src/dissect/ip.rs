use std::net::Ipv4Addr;

use crate::fp::normalize_ttl;

pub const PROTO_ICMP: u8 = 1;
pub const PROTO_TCP: u8 = 6;
pub const PROTO_UDP: u8 = 17;

/// Parsed IPv4 header plus the derived fields the matchers need
/// (spec.md §4.B step 3).
#[derive(Debug, Clone)]
pub struct Ipv4Header {
    pub ttl: u8,
    pub gttl: u8,
    pub distance: u8,
    pub has_options: bool,
    pub total_len: u16,
    pub id: u16,
    pub df: bool,
    pub frag_offset: u16,
    pub tos: u8,
    pub src: Ipv4Addr,
    pub dst: Ipv4Addr,
    pub proto: u8,
}

/// Parse an IPv4 header. Returns `(header, payload)` where `payload` is
/// everything after the (possibly-optioned) IP header.
pub fn parse_ipv4(data: &[u8]) -> Option<(Ipv4Header, &[u8])> {
    if data.len() < 20 {
        return None;
    }
    let version = data[0] >> 4;
    if version != 4 {
        return None;
    }
    let ihl = (data[0] & 0x0f) as usize * 4;
    if ihl < 20 || data.len() < ihl {
        return None;
    }

    let tos = data[1];
    let total_len = u16::from_be_bytes([data[2], data[3]]);
    let id = u16::from_be_bytes([data[4], data[5]]);
    let flags_frag = u16::from_be_bytes([data[6], data[7]]);
    let flags = flags_frag >> 13;
    let frag_offset = flags_frag & 0x1fff;
    let ttl = data[8];
    let proto = data[9];
    let src = Ipv4Addr::new(data[12], data[13], data[14], data[15]);
    let dst = Ipv4Addr::new(data[16], data[17], data[18], data[19]);

    let gttl = normalize_ttl(ttl);
    let distance = gttl.saturating_sub(ttl);

    let header = Ipv4Header {
        ttl,
        gttl,
        distance,
        has_options: ihl > 20,
        total_len,
        id,
        df: flags == 2,
        frag_offset,
        tos,
        src,
        dst,
        proto,
    };

    Some((header, &data[ihl..]))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_ip_packet(proto: u8, total_len: u16) -> Vec<u8> {
        let mut d = vec![0u8; 20];
        d[0] = 0x45; // version 4, ihl 5
        d[2..4].copy_from_slice(&total_len.to_be_bytes());
        d[6] = 0x40; // DF bit
        d[8] = 64; // ttl
        d[9] = proto;
        d[12..16].copy_from_slice(&[10, 0, 0, 1]);
        d[16..20].copy_from_slice(&[10, 0, 0, 2]);
        d
    }

    #[test]
    fn parses_df_and_ttl() {
        let data = base_ip_packet(PROTO_TCP, 60);
        let (hdr, payload) = parse_ipv4(&data).unwrap();
        assert!(hdr.df);
        assert_eq!(hdr.gttl, 64);
        assert_eq!(hdr.distance, 0);
        assert!(payload.is_empty());
    }

    #[test]
    fn detects_options() {
        let mut data = vec![0u8; 24];
        data[0] = 0x46; // ihl 6 -> 24 bytes
        data[9] = PROTO_UDP;
        let (hdr, _) = parse_ipv4(&data).unwrap();
        assert!(hdr.has_options);
    }
}
