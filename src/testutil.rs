//! Payload construction helpers for unit tests.

use crate::protocol::message::ZnodeStat;

/// Builds jute-encoded payloads field by field.
#[derive(Debug, Default)]
pub(crate) struct PayloadBuilder {
    buf: Vec<u8>,
}

impl PayloadBuilder {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Start a client request record.
    pub(crate) fn request(xid: i32, opcode: i32) -> Self {
        Self::new().i32(xid).i32(opcode)
    }

    /// Start a server reply record.
    pub(crate) fn reply(xid: i32, zxid: i64, err: i32) -> Self {
        Self::new().i32(xid).i64(zxid).i32(err)
    }

    pub(crate) fn i32(mut self, v: i32) -> Self {
        self.buf.extend_from_slice(&v.to_be_bytes());
        self
    }

    pub(crate) fn i64(mut self, v: i64) -> Self {
        self.buf.extend_from_slice(&v.to_be_bytes());
        self
    }

    pub(crate) fn bool(mut self, v: bool) -> Self {
        self.buf.push(u8::from(v));
        self
    }

    pub(crate) fn raw(mut self, bytes: &[u8]) -> Self {
        self.buf.extend_from_slice(bytes);
        self
    }

    pub(crate) fn bytes(self, bytes: &[u8]) -> Self {
        self.i32(bytes.len() as i32).raw(bytes)
    }

    pub(crate) fn null_buffer(self) -> Self {
        self.i32(-1)
    }

    pub(crate) fn string(self, s: &str) -> Self {
        self.bytes(s.as_bytes())
    }

    pub(crate) fn acl(self, perms: i32, scheme: &str, credential: &str) -> Self {
        self.i32(perms).string(scheme).string(credential)
    }

    pub(crate) fn string_list(self, items: &[&str]) -> Self {
        items
            .iter()
            .fold(self.i32(items.len() as i32), |b, s| b.string(s))
    }

    pub(crate) fn stat(self, stat: &ZnodeStat) -> Self {
        self.i64(stat.czxid)
            .i64(stat.mzxid)
            .i64(stat.ctime)
            .i64(stat.mtime)
            .i32(stat.version)
            .i32(stat.cversion)
            .i32(stat.aversion)
            .i64(stat.ephemeral_owner)
            .i32(stat.data_length)
            .i32(stat.num_children)
            .i64(stat.pzxid)
    }

    /// The bytes written so far, without a length prefix.
    pub(crate) fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    /// The record with its length prefix, as it appears in a TCP payload.
    pub(crate) fn into_frame(self) -> Vec<u8> {
        let mut out = (self.buf.len() as i32).to_be_bytes().to_vec();
        out.extend_from_slice(&self.buf);
        out
    }
}

pub(crate) fn sample_stat() -> ZnodeStat {
    ZnodeStat {
        czxid: 2,
        mzxid: 6,
        ctime: 1_436_921_446_000,
        mtime: 1_436_921_499_000,
        version: 1,
        cversion: 0,
        aversion: 0,
        ephemeral_owner: 0,
        data_length: 12,
        num_children: 0,
        pzxid: 2,
    }
}
