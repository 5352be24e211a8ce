#[derive(Debug)]
pub struct IcmpPacket<'a> {
    pub itype: u8,
    pub icode: u8,
    pub payload: &'a [u8],
}

pub fn parse_icmp(data: &[u8]) -> Option<IcmpPacket<'_>> {
    if data.len() < 4 {
        return None;
    }
    Some(IcmpPacket {
        itype: data[0],
        icode: data[1],
        payload: &data[4..],
    })
}
