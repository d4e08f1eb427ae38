//! # Frame Decoder
//!
//! Per-session decoding state: the ZooKeeper port that marks the server side
//! of a segment, and the outstanding-request table shared between the request
//! and reply decoders. One [`FrameDecoder`] serves one capture session and is
//! driven from a single thread.

use tracing::trace;

use crate::flow::Frame;
use crate::protocol::message::Message;
use crate::protocol::reply::decode_reply;
use crate::protocol::request::decode_request;
use crate::protocol::{is_reserved_xid, OutstandingRequests, RecordOutcome};

/// Default ZooKeeper client port.
pub const DEFAULT_PORT: u16 = 2181;

/// Decodes captured frames in capture order.
#[derive(Debug)]
pub struct FrameDecoder {
    port: u16,
    outstanding: OutstandingRequests,
    rejected: u64,
}

impl FrameDecoder {
    /// Create a decoder for traffic to and from `port`.
    pub fn new(port: u16) -> Self {
        Self::with_table(port, OutstandingRequests::new())
    }

    /// Create a decoder using an existing (possibly size-capped) table.
    pub fn with_table(port: u16, outstanding: OutstandingRequests) -> Self {
        Self {
            port,
            outstanding,
            rejected: 0,
        }
    }

    /// Decode one frame.
    ///
    /// A frame addressed to the ZooKeeper port is a request; a decoded
    /// request with an ordinary xid is recorded so its reply can be decoded
    /// later. Anything else is a reply from the source endpoint.
    pub fn decode_frame(&mut self, frame: Frame) -> Option<Message> {
        let Frame { src, dst, payload } = frame;

        if dst.port == self.port {
            let msg = decode_request(src, dst, &payload)?;
            if !is_reserved_xid(msg.xid)
                && self.outstanding.record(msg.xid, msg.opcode()) == RecordOutcome::Rejected
            {
                self.rejected += 1;
            }
            trace!(xid = msg.xid, op = %msg.opcode(), "request");
            Some(Message::Client(msg))
        } else {
            let msg = decode_reply(dst, src, &payload, &mut self.outstanding)?;
            trace!(xid = msg.xid, reply = msg.reply.name(), "reply");
            Some(Message::Server(msg))
        }
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn outstanding(&self) -> &OutstandingRequests {
        &self.outstanding
    }

    /// Requests that could not be recorded because the table was full.
    pub fn rejected_records(&self) -> u64 {
        self.rejected
    }
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new(DEFAULT_PORT)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
