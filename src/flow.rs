//! # Flow Endpoints
//!
//! Addressing types shared by the capture sources and the decoders. A captured
//! TCP segment is reduced to a [`Frame`]: the two [`Endpoint`]s it travelled
//! between and its non-empty payload. Nothing else about the packet survives
//! past the capture boundary.

use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Endpoint
// ---------------------------------------------------------------------------

/// One side of a TCP conversation.
#[derive(Debug, Clone, Hash, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    /// Textual IP address (IPv4 dotted quad or IPv6).
    pub ip: String,
    pub port: u16,
}

impl Endpoint {
    /// Create a new endpoint.
    pub fn new(ip: impl Into<String>, port: u16) -> Self {
        Self {
            ip: ip.into(),
            port,
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.ip.contains(':') {
            write!(f, "[{}]:{}", self.ip, self.port)
        } else {
            write!(f, "{}:{}", self.ip, self.port)
        }
    }
}

// ---------------------------------------------------------------------------
// Frame
// ---------------------------------------------------------------------------

/// A captured TCP segment with a non-empty payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub src: Endpoint,
    pub dst: Endpoint,
    /// TCP payload bytes, starting at the ZooKeeper length prefix.
    pub payload: Vec<u8>,
}

impl Frame {
    /// Create a new frame.
    pub fn new(src: Endpoint, dst: Endpoint, payload: Vec<u8>) -> Self {
        Self { src, dst, payload }
    }

    /// True if either side of the segment uses `port`.
    pub fn touches_port(&self, port: u16) -> bool {
        self.src.port == port || self.dst.port == port
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} -> {} ({} bytes)",
            self.src,
            self.dst,
            self.payload.len()
        )
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
