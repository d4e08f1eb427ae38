//! # Outstanding Requests
//!
//! Replies carry an xid but no opcode, so the reply decoder needs to know what
//! the client asked for. Every decoded request with a non-reserved xid is
//! recorded here and removed again when its reply is decoded.
//!
//! The table belongs to a single capture session and is only touched by the
//! thread that decodes that session's frames, so it holds a plain `HashMap`.

use std::collections::HashMap;

use tracing::{debug, warn};

use crate::protocol::OpCode;

/// Result of [`OutstandingRequests::record`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordOutcome {
    /// New entry.
    Inserted,
    /// The xid was already outstanding; its previous opcode is returned.
    Replaced(OpCode),
    /// The table is at capacity and the xid is new.
    Rejected,
}

/// Mapping from xid to the opcode of the request awaiting a reply.
#[derive(Debug, Default)]
pub struct OutstandingRequests {
    entries: HashMap<i32, OpCode>,
    limit: Option<usize>,
}

impl OutstandingRequests {
    /// Create an unbounded table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a table holding at most `limit` entries. `None` is unbounded.
    pub fn with_limit(limit: Option<usize>) -> Self {
        Self {
            entries: HashMap::new(),
            limit,
        }
    }

    /// Remember that `xid` is waiting for a reply to `op`.
    ///
    /// A duplicate xid overwrites the earlier entry. When the table is full,
    /// new xids are rejected but overwrites still succeed.
    pub fn record(&mut self, xid: i32, op: OpCode) -> RecordOutcome {
        if let Some(previous) = self.entries.get_mut(&xid) {
            let previous = std::mem::replace(previous, op);
            debug!(xid, %previous, current = %op, "xid reused while outstanding");
            return RecordOutcome::Replaced(previous);
        }

        if self.limit.is_some_and(|limit| self.entries.len() >= limit) {
            warn!(xid, %op, size = self.entries.len(), "outstanding request table full");
            return RecordOutcome::Rejected;
        }

        self.entries.insert(xid, op);
        RecordOutcome::Inserted
    }

    /// Look up and remove the entry for `xid`.
    pub fn resolve_and_remove(&mut self, xid: i32) -> Option<OpCode> {
        self.entries.remove(&xid)
    }

    /// Opcode recorded for `xid`, without removing it.
    pub fn peek(&self, xid: i32) -> Option<OpCode> {
        self.entries.get(&xid).copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn limit(&self) -> Option<usize> {
        self.limit
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
