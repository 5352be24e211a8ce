use bytes::Buf;

pub const ETHERTYPE_ARP: u16 = 0x0806;
pub const ETHERTYPE_IPV4: u16 = 0x0800;
const ETHERTYPE_VLAN: u16 = 0x8100;
const ETHERTYPE_QINQ: u16 = 0x9100;

/// Parsed Ethernet header: the resolved inner ethertype (after stripping
/// any 802.1Q/Q-in-Q tags) and the payload that follows it.
pub struct EthernetFrame<'a> {
    pub src_mac: [u8; 6],
    pub dst_mac: [u8; 6],
    pub ethertype: u16,
    pub payload: &'a [u8],
}

/// Parse an Ethernet header, stripping up to two VLAN tags (spec.md §4.B
/// step 1). Returns `None` if the frame is too short to contain a header.
pub fn parse_ethernet(data: &[u8]) -> Option<EthernetFrame<'_>> {
    if data.len() < 14 {
        return None;
    }
    let dst_mac: [u8; 6] = data[0..6].try_into().ok()?;
    let src_mac: [u8; 6] = data[6..12].try_into().ok()?;
    let mut buf = &data[12..];
    let mut ethertype = buf.try_get_u16().ok()?;

    for _ in 0..2 {
        if ethertype == ETHERTYPE_VLAN || ethertype == ETHERTYPE_QINQ {
            if buf.remaining() < 4 {
                return None;
            }
            buf.advance(2); // VLAN tag control info
            ethertype = buf.try_get_u16().ok()?;
        } else {
            break;
        }
    }

    Some(EthernetFrame {
        src_mac,
        dst_mac,
        ethertype,
        payload: buf,
    })
}
