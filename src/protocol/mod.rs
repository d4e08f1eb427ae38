//! # ZooKeeper Wire Protocol
//!
//! Decoders for the ZooKeeper client protocol as seen on the wire. Every frame
//! is a big-endian record prefixed by its length (exclusive of the prefix):
//!
//! ```text
//! request:  | len:i32 | xid:i32 | opcode:i32 | body ...
//! reply:    | len:i32 | xid:i32 | zxid:i64 | err:i32 | body ...
//! connect:  | len:i32 | protocol:i32 | zxid:i64 | timeout:i32 | session:i64 | passwd | ro
//! ```
//!
//! Replies carry no opcode. The reply shape is recovered from the request that
//! used the same xid, which is remembered in an [`OutstandingRequests`] table.
//!
//! ## Modules
//!
//! | Module        | Role                                              |
//! |---------------|---------------------------------------------------|
//! | `wire`        | Bounds-checked primitive readers                  |
//! | `message`     | Typed client and server messages                  |
//! | `request`     | Client payload decoder                            |
//! | `reply`       | Server payload decoder                            |
//! | `outstanding` | xid to opcode correlation table                   |

pub mod message;
pub mod outstanding;
pub mod reply;
pub mod request;
pub mod wire;

use std::fmt;

use serde::{Deserialize, Serialize};

pub use outstanding::{OutstandingRequests, RecordOutcome};

// ---------------------------------------------------------------------------
// Reserved transaction ids
// ---------------------------------------------------------------------------

/// Connection handshake. The protocol version field occupies the xid slot.
pub const CONNECT_XID: i32 = 0;
/// Server-initiated watch notification.
pub const WATCH_XID: i32 = -1;
/// Client heartbeat and its reply.
pub const PING_XID: i32 = -2;
/// Authentication packet.
pub const AUTH_XID: i32 = -4;
/// Watch re-registration after reconnect.
pub const SET_WATCHES_XID: i32 = -8;

/// True if `xid` is one of the fixed-meaning values that normal request
/// numbering never produces.
pub fn is_reserved_xid(xid: i32) -> bool {
    matches!(
        xid,
        CONNECT_XID | WATCH_XID | PING_XID | AUTH_XID | SET_WATCHES_XID
    )
}

// ---------------------------------------------------------------------------
// Operation codes
// ---------------------------------------------------------------------------

/// ZooKeeper operation kinds.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OpCode {
    Connect,
    Create,
    Delete,
    Exists,
    GetData,
    SetData,
    GetAcl,
    SetAcl,
    GetChildren,
    Sync,
    Ping,
    GetChildren2,
    Check,
    Multi,
    Create2,
    Reconfig,
    CreateSession,
    Close,
    SetAuth,
    SetWatches,
}

impl OpCode {
    /// Map a wire opcode to its operation. Unknown codes yield `None`.
    pub fn from_code(code: i32) -> Option<Self> {
        let op = match code {
            0 => OpCode::Connect,
            1 => OpCode::Create,
            2 => OpCode::Delete,
            3 => OpCode::Exists,
            4 => OpCode::GetData,
            5 => OpCode::SetData,
            6 => OpCode::GetAcl,
            7 => OpCode::SetAcl,
            8 => OpCode::GetChildren,
            9 => OpCode::Sync,
            11 => OpCode::Ping,
            12 => OpCode::GetChildren2,
            13 => OpCode::Check,
            14 => OpCode::Multi,
            15 => OpCode::Create2,
            16 => OpCode::Reconfig,
            -10 => OpCode::CreateSession,
            -11 => OpCode::Close,
            100 => OpCode::SetAuth,
            101 => OpCode::SetWatches,
            _ => return None,
        };
        Some(op)
    }

    /// The wire value of this opcode.
    pub fn code(self) -> i32 {
        match self {
            OpCode::Connect => 0,
            OpCode::Create => 1,
            OpCode::Delete => 2,
            OpCode::Exists => 3,
            OpCode::GetData => 4,
            OpCode::SetData => 5,
            OpCode::GetAcl => 6,
            OpCode::SetAcl => 7,
            OpCode::GetChildren => 8,
            OpCode::Sync => 9,
            OpCode::Ping => 11,
            OpCode::GetChildren2 => 12,
            OpCode::Check => 13,
            OpCode::Multi => 14,
            OpCode::Create2 => 15,
            OpCode::Reconfig => 16,
            OpCode::CreateSession => -10,
            OpCode::Close => -11,
            OpCode::SetAuth => 100,
            OpCode::SetWatches => 101,
        }
    }

    /// Upper-case mnemonic, as used in ZooKeeper's own tooling.
    pub fn as_str(self) -> &'static str {
        match self {
            OpCode::Connect => "CONNECT",
            OpCode::Create => "CREATE",
            OpCode::Delete => "DELETE",
            OpCode::Exists => "EXISTS",
            OpCode::GetData => "GETDATA",
            OpCode::SetData => "SETDATA",
            OpCode::GetAcl => "GETACL",
            OpCode::SetAcl => "SETACL",
            OpCode::GetChildren => "GETCHILDREN",
            OpCode::Sync => "SYNC",
            OpCode::Ping => "PING",
            OpCode::GetChildren2 => "GETCHILDREN2",
            OpCode::Check => "CHECK",
            OpCode::Multi => "MULTI",
            OpCode::Create2 => "CREATE2",
            OpCode::Reconfig => "RECONFIG",
            OpCode::CreateSession => "CREATESESSION",
            OpCode::Close => "CLOSE",
            OpCode::SetAuth => "SETAUTH",
            OpCode::SetWatches => "SETWATCHES",
        }
    }
}

impl fmt::Display for OpCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Watch event names
// ---------------------------------------------------------------------------

/// Map a watch event type to its name.
pub fn event_type_to_name(event_type: i32) -> &'static str {
    match event_type {
        1 => "CREATED",
        2 => "DELETED",
        3 => "CHANGED",
        4 => "CHILD",
        _ => "unknown",
    }
}

/// Map a watch connection state to its name.
pub fn state_to_name(state: i32) -> &'static str {
    match state {
        0 => "DISCONNECTED",
        1 => "NO_SYNC_CONNECTED",
        3 => "SYNC_CONNECTED",
        4 => "AUTH_FAILED",
        5 => "CONNECTED_READ_ONLY",
        6 => "SASL_AUTHENTICATED",
        -112 => "EXPIRED",
        _ => "unknown",
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [OpCode; 20] = [
        OpCode::Connect,
        OpCode::Create,
        OpCode::Delete,
        OpCode::Exists,
        OpCode::GetData,
        OpCode::SetData,
        OpCode::GetAcl,
        OpCode::SetAcl,
        OpCode::GetChildren,
        OpCode::Sync,
        OpCode::Ping,
        OpCode::GetChildren2,
        OpCode::Check,
        OpCode::Multi,
        OpCode::Create2,
        OpCode::Reconfig,
        OpCode::CreateSession,
        OpCode::Close,
        OpCode::SetAuth,
        OpCode::SetWatches,
    ];

    #[test]
    fn test_opcode_codes_are_consistent() {
        for op in ALL {
            assert_eq!(OpCode::from_code(op.code()), Some(op));
        }
    }

    #[test]
    fn test_opcode_unknown() {
        assert_eq!(OpCode::from_code(10), None);
        assert_eq!(OpCode::from_code(17), None);
        assert_eq!(OpCode::from_code(-1), None);
    }

    #[test]
    fn test_opcode_names() {
        assert_eq!(OpCode::Exists.as_str(), "EXISTS");
        assert_eq!(OpCode::GetChildren2.to_string(), "GETCHILDREN2");
        assert_eq!(OpCode::Close.code(), -11);
    }

    #[test]
    fn test_reserved_xids() {
        for xid in [0, -1, -2, -4, -8] {
            assert!(is_reserved_xid(xid));
        }
        for xid in [1, 5, -3, -5, i32::MAX] {
            assert!(!is_reserved_xid(xid));
        }
    }

    #[test]
    fn test_event_and_state_names() {
        assert_eq!(event_type_to_name(1), "CREATED");
        assert_eq!(event_type_to_name(4), "CHILD");
        assert_eq!(event_type_to_name(99), "unknown");
        assert_eq!(state_to_name(3), "SYNC_CONNECTED");
        assert_eq!(state_to_name(-112), "EXPIRED");
        assert_eq!(state_to_name(2), "unknown");
    }
}
