//! # Packet Decoding
//!
//! Reduces a captured link-layer frame to a TCP [`Frame`]: strips the link
//! header, the IPv4 or IPv6 header and the TCP header, and keeps the two
//! endpoints and the payload. Everything else (non-TCP traffic, fragments,
//! headers that do not fit the captured bytes, empty segments) is dropped.
//!
//! Header slicing is done by `etherparse`; this module only maps pcap link
//! types onto its entry points and the sliced packet onto a [`Frame`].

use etherparse::{NetSlice, SlicedPacket, TransportSlice};
use tracing::trace;

use crate::flow::{Endpoint, Frame};

// ---------------------------------------------------------------------------
// Link types
// ---------------------------------------------------------------------------

/// Link-layer encapsulations understood by [`parse_frame`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkType {
    /// BSD loopback: 4-byte address family in host byte order.
    Null,
    Ethernet,
    /// Linux cooked capture (v1), 16-byte header.
    LinuxSll,
    /// No link header; the packet starts at the IP header.
    Raw,
}

impl LinkType {
    /// Map a pcap `LINKTYPE_*` value.
    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            0 => Some(LinkType::Null),
            1 => Some(LinkType::Ethernet),
            113 => Some(LinkType::LinuxSll),
            101 | 228 | 229 => Some(LinkType::Raw),
            _ => None,
        }
    }
}

const NULL_HEADER_LEN: usize = 4;

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

/// Extract the TCP segment carried by `data`, if any.
pub fn parse_frame(link: LinkType, data: &[u8]) -> Option<Frame> {
    let sliced = match link {
        LinkType::Ethernet => SlicedPacket::from_ethernet(data),
        LinkType::LinuxSll => SlicedPacket::from_linux_sll(data),
        // The family is host-endian; the IP version nibble is not.
        LinkType::Null => SlicedPacket::from_ip(data.get(NULL_HEADER_LEN..)?),
        LinkType::Raw => SlicedPacket::from_ip(data),
    };
    match sliced {
        Ok(packet) => tcp_frame(&packet),
        Err(e) => {
            trace!(?link, error = ?e, len = data.len(), "undecodable packet");
            None
        }
    }
}

/// The TCP payload and endpoints of a sliced packet. Fragmented IPv4
/// payloads are never sliced into a transport layer, so they end here too.
fn tcp_frame(packet: &SlicedPacket<'_>) -> Option<Frame> {
    let (src_ip, dst_ip) = match packet.net.as_ref()? {
        NetSlice::Ipv4(ip) => (
            ip.header().source_addr().to_string(),
            ip.header().destination_addr().to_string(),
        ),
        NetSlice::Ipv6(ip) => (
            ip.header().source_addr().to_string(),
            ip.header().destination_addr().to_string(),
        ),
        #[allow(unreachable_patterns)]
        _ => return None,
    };
    let tcp = match packet.transport.as_ref()? {
        TransportSlice::Tcp(tcp) => tcp,
        _ => return None,
    };

    let payload = tcp.payload();
    if payload.is_empty() {
        return None;
    }

    Some(Frame::new(
        Endpoint::new(src_ip, tcp.source_port()),
        Endpoint::new(dst_ip, tcp.destination_port()),
        payload.to_vec(),
    ))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const ETHERTYPE_IPV4: u16 = 0x0800;
    const ETHERTYPE_VLAN: u16 = 0x8100;
    const IPPROTO_TCP: u8 = 6;

    fn tcp(src_port: u16, dst_port: u16, payload: &[u8]) -> Vec<u8> {
        let mut seg = Vec::with_capacity(20 + payload.len());
        seg.extend_from_slice(&src_port.to_be_bytes());
        seg.extend_from_slice(&dst_port.to_be_bytes());
        seg.extend_from_slice(&[0, 0, 0, 1]); // seq
        seg.extend_from_slice(&[0, 0, 0, 0]); // ack
        seg.push(5 << 4); // data offset
        seg.push(0x18); // PSH|ACK
        seg.extend_from_slice(&[0xff, 0xff, 0, 0, 0, 0]);
        seg.extend_from_slice(payload);
        seg
    }

    fn ipv4(src: [u8; 4], dst: [u8; 4], segment: &[u8]) -> Vec<u8> {
        let total = (20 + segment.len()) as u16;
        let mut ip = vec![0x45, 0];
        ip.extend_from_slice(&total.to_be_bytes());
        ip.extend_from_slice(&[0, 0, 0x40, 0, 64, IPPROTO_TCP, 0, 0]);
        ip.extend_from_slice(&src);
        ip.extend_from_slice(&dst);
        ip.extend_from_slice(segment);
        ip
    }

    fn ethernet(ethertype: u16, packet: &[u8]) -> Vec<u8> {
        let mut frame = vec![0u8; 12];
        frame.extend_from_slice(&ethertype.to_be_bytes());
        frame.extend_from_slice(packet);
        frame
    }

    #[test]
    fn test_ethernet_ipv4_tcp() {
        let packet = ipv4([10, 0, 0, 1], [10, 0, 0, 2], &tcp(50312, 2181, b"zk"));
        let frame = parse_frame(LinkType::Ethernet, &ethernet(ETHERTYPE_IPV4, &packet)).unwrap();
        assert_eq!(frame.src, Endpoint::new("10.0.0.1", 50312));
        assert_eq!(frame.dst, Endpoint::new("10.0.0.2", 2181));
        assert_eq!(frame.payload, b"zk");
    }

    #[test]
    fn test_vlan_tagged() {
        let packet = ipv4([10, 0, 0, 1], [10, 0, 0, 2], &tcp(2181, 40000, b"reply"));
        let mut data = vec![0u8; 12];
        data.extend_from_slice(&ETHERTYPE_VLAN.to_be_bytes());
        data.extend_from_slice(&[0x00, 0x64]);
        data.extend_from_slice(&ETHERTYPE_IPV4.to_be_bytes());
        data.extend_from_slice(&packet);
        let frame = parse_frame(LinkType::Ethernet, &data).unwrap();
        assert_eq!(frame.src.port, 2181);
        assert_eq!(frame.payload, b"reply");
    }

    #[test]
    fn test_ethernet_trailer_is_not_payload() {
        // Short frames are padded to 60 bytes; the IP length bounds the data.
        let packet = ipv4([10, 0, 0, 1], [10, 0, 0, 2], &tcp(1, 2181, b"x"));
        let mut data = ethernet(ETHERTYPE_IPV4, &packet);
        data.resize(60, 0);
        let frame = parse_frame(LinkType::Ethernet, &data).unwrap();
        assert_eq!(frame.payload, b"x");
    }

    #[test]
    fn test_linux_sll() {
        let packet = ipv4([127, 0, 0, 1], [127, 0, 0, 1], &tcp(33000, 2181, b"abc"));
        // Packet type "to us", ARPHRD_LOOPBACK, zero-length address.
        let mut data = vec![0, 0, 0x03, 0x04, 0, 0];
        data.extend_from_slice(&[0u8; 8]);
        data.extend_from_slice(&ETHERTYPE_IPV4.to_be_bytes());
        data.extend_from_slice(&packet);
        let frame = parse_frame(LinkType::LinuxSll, &data).unwrap();
        assert_eq!(frame.src.ip, "127.0.0.1");
        assert_eq!(frame.payload, b"abc");
    }

    #[test]
    fn test_null_loopback() {
        let packet = ipv4([127, 0, 0, 1], [127, 0, 0, 1], &tcp(33000, 2181, b"abc"));
        let mut data = 2u32.to_le_bytes().to_vec();
        data.extend_from_slice(&packet);
        assert!(parse_frame(LinkType::Null, &data).is_some());
    }

    #[test]
    fn test_raw_ipv6() {
        let segment = tcp(40000, 2181, b"v6");
        let mut packet = vec![0x60, 0, 0, 0];
        packet.extend_from_slice(&(segment.len() as u16).to_be_bytes());
        packet.push(IPPROTO_TCP);
        packet.push(64);
        let mut src = [0u8; 16];
        src[15] = 1;
        let mut dst = [0u8; 16];
        dst[0] = 0xfe;
        dst[1] = 0x80;
        dst[15] = 2;
        packet.extend_from_slice(&src);
        packet.extend_from_slice(&dst);
        packet.extend_from_slice(&segment);

        let frame = parse_frame(LinkType::Raw, &packet).unwrap();
        assert_eq!(frame.src.ip, "::1");
        assert_eq!(frame.dst.ip, "fe80::2");
        assert_eq!(frame.dst.port, 2181);
        assert_eq!(frame.payload, b"v6");
    }

    #[test]
    fn test_drops_non_tcp_and_empty() {
        let mut udp = ipv4([10, 0, 0, 1], [10, 0, 0, 2], &tcp(1, 2, b"x"));
        udp[9] = 17;
        assert!(parse_frame(LinkType::Raw, &udp).is_none());

        let bare_ack = ipv4([10, 0, 0, 1], [10, 0, 0, 2], &tcp(1, 2181, b""));
        assert!(parse_frame(LinkType::Raw, &bare_ack).is_none());

        let arp = ethernet(0x0806, &[0u8; 28]);
        assert!(parse_frame(LinkType::Ethernet, &arp).is_none());
    }

    #[test]
    fn test_drops_bad_header_lengths() {
        let mut packet = ipv4([10, 0, 0, 1], [10, 0, 0, 2], &tcp(1, 2181, b"x"));
        packet[0] = 0x44; // IHL 16
        assert!(parse_frame(LinkType::Raw, &packet).is_none());

        let mut packet = ipv4([10, 0, 0, 1], [10, 0, 0, 2], &tcp(1, 2181, b"x"));
        packet[20 + 12] = 0xf0; // TCP data offset 60 > segment
        assert!(parse_frame(LinkType::Raw, &packet).is_none());
    }

    #[test]
    fn test_drops_non_first_fragment() {
        let mut packet = ipv4([10, 0, 0, 1], [10, 0, 0, 2], &tcp(1, 2181, b"frag"));
        packet[6] = 0x20; // MF
        packet[7] = 0x10; // offset 16 * 8
        assert!(parse_frame(LinkType::Raw, &packet).is_none());
    }

    #[test]
    fn test_truncated_captures_never_panic() {
        let packet = ipv4([10, 0, 0, 1], [10, 0, 0, 2], &tcp(1, 2181, b"payload"));
        let data = ethernet(ETHERTYPE_IPV4, &packet);
        for cut in 0..data.len() {
            let _ = parse_frame(LinkType::Ethernet, &data[..cut]);
            let _ = parse_frame(LinkType::LinuxSll, &data[..cut]);
            let _ = parse_frame(LinkType::Raw, &data[..cut]);
        }
    }

    #[test]
    fn test_link_type_codes() {
        assert_eq!(LinkType::from_code(1), Some(LinkType::Ethernet));
        assert_eq!(LinkType::from_code(113), Some(LinkType::LinuxSll));
        assert_eq!(LinkType::from_code(228), Some(LinkType::Raw));
        assert_eq!(LinkType::from_code(105), None);
    }
}
