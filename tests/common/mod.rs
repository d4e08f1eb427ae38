//! Shared helpers for integration tests: jute payload construction and
//! synthetic pcap files.

#![allow(dead_code)]

use std::io::Write;

use zktraffic::{Endpoint, Frame, ZnodeStat};

pub const CLIENT_IP: [u8; 4] = [10, 0, 0, 1];
pub const SERVER_IP: [u8; 4] = [10, 0, 0, 2];
pub const CLIENT_PORT: u16 = 50312;
pub const SERVER_PORT: u16 = 2181;

/// Builds jute-encoded records field by field. Mirrors the crate's internal
/// unit-test builder of the same name.
#[derive(Debug, Default)]
pub struct PayloadBuilder {
    buf: Vec<u8>,
}

impl PayloadBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request(xid: i32, opcode: i32) -> Self {
        Self::default().i32(xid).i32(opcode)
    }

    pub fn reply(xid: i32, zxid: i64, err: i32) -> Self {
        Self::default().i32(xid).i64(zxid).i32(err)
    }

    pub fn connect(timeout: i32) -> Self {
        Self::new()
            .i32(0)
            .i64(0)
            .i32(timeout)
            .i64(0)
            .bytes(&[0; 16])
            .bool(false)
    }

    pub fn i32(mut self, v: i32) -> Self {
        self.buf.extend_from_slice(&v.to_be_bytes());
        self
    }

    pub fn i64(mut self, v: i64) -> Self {
        self.buf.extend_from_slice(&v.to_be_bytes());
        self
    }

    pub fn bool(mut self, v: bool) -> Self {
        self.buf.push(u8::from(v));
        self
    }

    pub fn bytes(self, b: &[u8]) -> Self {
        let mut this = self.i32(b.len() as i32);
        this.buf.extend_from_slice(b);
        this
    }

    pub fn string(self, s: &str) -> Self {
        self.bytes(s.as_bytes())
    }

    pub fn string_list(self, items: &[&str]) -> Self {
        items
            .iter()
            .fold(self.i32(items.len() as i32), |b, s| b.string(s))
    }

    pub fn stat(self, s: &ZnodeStat) -> Self {
        self.i64(s.czxid)
            .i64(s.mzxid)
            .i64(s.ctime)
            .i64(s.mtime)
            .i32(s.version)
            .i32(s.cversion)
            .i32(s.aversion)
            .i64(s.ephemeral_owner)
            .i32(s.data_length)
            .i32(s.num_children)
            .i64(s.pzxid)
    }

    /// The record with its length prefix.
    pub fn into_frame(self) -> Vec<u8> {
        let mut out = (self.buf.len() as i32).to_be_bytes().to_vec();
        out.extend_from_slice(&self.buf);
        out
    }
}

pub fn stat(data_length: i32) -> ZnodeStat {
    ZnodeStat {
        czxid: 3,
        mzxid: 7,
        ctime: 1_436_921_446_000,
        mtime: 1_436_921_500_000,
        version: 2,
        cversion: 0,
        aversion: 0,
        ephemeral_owner: 0,
        data_length,
        num_children: 0,
        pzxid: 3,
    }
}

pub fn client() -> Endpoint {
    Endpoint::new("10.0.0.1", CLIENT_PORT)
}

pub fn server() -> Endpoint {
    Endpoint::new("10.0.0.2", SERVER_PORT)
}

pub fn to_server(payload: Vec<u8>) -> Frame {
    Frame::new(client(), server(), payload)
}

pub fn to_client(payload: Vec<u8>) -> Frame {
    Frame::new(server(), client(), payload)
}

// ---------------------------------------------------------------------------
// Packets and pcap files
// ---------------------------------------------------------------------------

/// Ethernet + IPv4 + TCP carrying `payload`.
pub fn ethernet_packet(
    src: ([u8; 4], u16),
    dst: ([u8; 4], u16),
    payload: &[u8],
) -> Vec<u8> {
    let mut pkt = vec![0x02, 0, 0, 0, 0, 0x02, 0x02, 0, 0, 0, 0, 0x01, 0x08, 0x00];

    let total = (20 + 20 + payload.len()) as u16;
    pkt.extend_from_slice(&[0x45, 0]);
    pkt.extend_from_slice(&total.to_be_bytes());
    pkt.extend_from_slice(&[0, 0, 0x40, 0, 64, 6, 0, 0]);
    pkt.extend_from_slice(&src.0);
    pkt.extend_from_slice(&dst.0);

    pkt.extend_from_slice(&src.1.to_be_bytes());
    pkt.extend_from_slice(&dst.1.to_be_bytes());
    pkt.extend_from_slice(&[0, 0, 0, 1, 0, 0, 0, 1, 0x50, 0x18, 0xff, 0xff, 0, 0, 0, 0]);
    pkt.extend_from_slice(payload);
    pkt
}

pub fn client_packet(payload: &[u8]) -> Vec<u8> {
    ethernet_packet((CLIENT_IP, CLIENT_PORT), (SERVER_IP, SERVER_PORT), payload)
}

pub fn server_packet(payload: &[u8]) -> Vec<u8> {
    ethernet_packet((SERVER_IP, SERVER_PORT), (CLIENT_IP, CLIENT_PORT), payload)
}

/// Write a little-endian, microsecond pcap file with the given link type.
pub fn write_pcap(out: &mut impl Write, linktype: u32, packets: &[Vec<u8>]) -> std::io::Result<()> {
    out.write_all(&0xa1b2_c3d4u32.to_le_bytes())?;
    out.write_all(&2u16.to_le_bytes())?;
    out.write_all(&4u16.to_le_bytes())?;
    out.write_all(&0i32.to_le_bytes())?;
    out.write_all(&0u32.to_le_bytes())?;
    out.write_all(&65_535u32.to_le_bytes())?;
    out.write_all(&linktype.to_le_bytes())?;

    for (i, pkt) in packets.iter().enumerate() {
        out.write_all(&1_436_921_446u32.to_le_bytes())?;
        out.write_all(&(i as u32 * 1000).to_le_bytes())?;
        out.write_all(&(pkt.len() as u32).to_le_bytes())?;
        out.write_all(&(pkt.len() as u32).to_le_bytes())?;
        out.write_all(pkt)?;
    }
    out.flush()
}
