//! # Reply Decoder
//!
//! Turns a server-to-client payload into a [`ServerMessage`]. Replies carry
//! only the xid, so for ordinary xids the shape comes from the
//! [`OutstandingRequests`] table, which loses the entry in the process.
//!
//! Reserved xids are decoded without the table:
//!
//! | xid | Reply           | Body                       |
//! |-----|-----------------|----------------------------|
//! | -2  | PingReply       | none                       |
//! | -1  | WatchEvent      | type, state, path (min 29) |
//! | -4  | AuthReply       | none                       |
//! | -8  | SetWatchesReply | none                       |
//!
//! A non-zero error means the server sent the header alone; the body fields
//! are `None` and any trailing bytes are ignored. Minimum declared lengths
//! for successful replies:
//!
//! | Opcode               | Min | Body                 |
//! |----------------------|-----|----------------------|
//! | GETDATA              | 88  | data, stat           |
//! | EXISTS, SETDATA      | 84  | stat                 |
//! | CREATE               | 21  | path                 |
//! | CREATE2              | 89  | path, stat           |
//! | GETCHILDREN          | 20  | children             |
//! | GETCHILDREN2         | 88  | children, stat       |
//! | SYNC                 | 21  | path                 |
//! | GETACL               | 88  | acl list, stat       |
//! | SETACL               | 84  | stat                 |
//! | DELETE, CLOSE        | 16  | none                 |

use tracing::{debug, trace};

use crate::flow::Endpoint;
use crate::protocol::message::{Reply, ServerMessage};
use crate::protocol::outstanding::OutstandingRequests;
use crate::protocol::wire::{read_i32, read_i64, DecodeError, WireReader, STAT_LEN};
use crate::protocol::{OpCode, AUTH_XID, PING_XID, SET_WATCHES_XID, WATCH_XID};

/// Length prefix plus xid, zxid and error.
const HEADER_END: usize = 20;
/// Declared length of a header-only reply.
const HEADER_MIN: i32 = 16;

const STAT: i32 = STAT_LEN as i32;
const WATCH_MIN: i32 = 29;
const GET_DATA_MIN: i32 = HEADER_MIN + 4 + STAT;
const STAT_ONLY_MIN: i32 = HEADER_MIN + STAT;
const CREATE_MIN: i32 = 21;
const CREATE2_MIN: i32 = CREATE_MIN + STAT;
const GET_CHILDREN_MIN: i32 = 20;
const GET_CHILDREN2_MIN: i32 = GET_CHILDREN_MIN + STAT;
const SYNC_MIN: i32 = 21;
const GET_ACL_MIN: i32 = HEADER_MIN + 4 + STAT;

/// Fixed reply header.
#[derive(Debug, Clone, Copy)]
struct Header {
    declared: i32,
    xid: i32,
    zxid: i64,
    error: i32,
}

impl Header {
    fn parse(payload: &[u8]) -> Result<Self, DecodeError> {
        Ok(Self {
            declared: read_i32(payload, 0)?,
            xid: read_i32(payload, 4)?,
            zxid: read_i64(payload, 8)?,
            error: read_i32(payload, 16)?,
        })
    }

    fn ok(&self) -> bool {
        self.error == 0
    }
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

type Decoded = Option<Result<Reply, DecodeError>>;

/// Decode a payload sent by `server` to `client`.
///
/// For xids other than the reserved ones the matching entry is removed from
/// `outstanding` before the body is decoded, whether or not decoding then
/// succeeds.
pub fn decode_reply(
    client: Endpoint,
    server: Endpoint,
    payload: &[u8],
    outstanding: &mut OutstandingRequests,
) -> Option<ServerMessage> {
    if payload.len() < HEADER_END {
        return None;
    }
    let header = Header::parse(payload).ok()?;
    if header.declared < HEADER_MIN {
        return None;
    }

    let decoded: Decoded = match header.xid {
        PING_XID => Some(Ok(Reply::Ping)),
        AUTH_XID => Some(Ok(Reply::Auth)),
        SET_WATCHES_XID => Some(Ok(Reply::SetWatches)),
        WATCH_XID => guarded(&header, WATCH_MIN, || decode_watch(payload)),
        xid => match outstanding.resolve_and_remove(xid) {
            Some(op) => decode_for(op, &header, payload),
            None => {
                debug!(%client, %server, xid, zxid = header.zxid, "orphan reply");
                None
            }
        },
    };

    match decoded? {
        Ok(reply) => Some(ServerMessage {
            client,
            server,
            xid: header.xid,
            zxid: header.zxid,
            error: header.error,
            reply,
        }),
        Err(e) => {
            trace!(%client, %server, xid = header.xid, error = %e, "undecodable reply");
            None
        }
    }
}

/// Run `decode` only if the declared length reaches `min`.
fn guarded<F>(header: &Header, min: i32, decode: F) -> Decoded
where
    F: FnOnce() -> Result<Reply, DecodeError>,
{
    (header.declared >= min).then(decode)
}

/// Header-only `failed` on error, otherwise the guarded body.
fn with_body<F>(header: &Header, min: i32, failed: Reply, decode: F) -> Decoded
where
    F: FnOnce() -> Result<Reply, DecodeError>,
{
    if !header.ok() {
        return Some(Ok(failed));
    }
    guarded(header, min, decode)
}

// ---------------------------------------------------------------------------
// Shapes
// ---------------------------------------------------------------------------

fn decode_watch(payload: &[u8]) -> Result<Reply, DecodeError> {
    let mut r = WireReader::at(payload, HEADER_END);
    Ok(Reply::WatchEvent {
        event_type: r.i32()?,
        state: r.i32()?,
        path: r.path()?,
    })
}

fn decode_for(op: OpCode, header: &Header, payload: &[u8]) -> Decoded {
    let body = || WireReader::at(payload, HEADER_END);

    match op {
        OpCode::GetData => with_body(
            header,
            GET_DATA_MIN,
            Reply::Get {
                data: None,
                stat: None,
            },
            || {
                let mut r = body();
                let data = r.buffer()?.map(<[u8]>::to_vec);
                Ok(Reply::Get {
                    data,
                    stat: Some(r.stat()?),
                })
            },
        ),
        OpCode::Exists => with_body(header, STAT_ONLY_MIN, Reply::Exists { stat: None }, || {
            Ok(Reply::Exists {
                stat: Some(body().stat()?),
            })
        }),
        OpCode::SetData => with_body(header, STAT_ONLY_MIN, Reply::Set { stat: None }, || {
            Ok(Reply::Set {
                stat: Some(body().stat()?),
            })
        }),
        OpCode::Create | OpCode::Create2 => {
            let with_stat = op == OpCode::Create2;
            let min = if with_stat { CREATE2_MIN } else { CREATE_MIN };
            let failed = Reply::Create {
                opcode: op,
                path: None,
                stat: None,
            };
            with_body(header, min, failed, || {
                let mut r = body();
                let path = r.string()?;
                let stat = if with_stat { Some(r.stat()?) } else { None };
                Ok(Reply::Create {
                    opcode: op,
                    path,
                    stat,
                })
            })
        }
        OpCode::GetChildren | OpCode::GetChildren2 => {
            let with_stat = op == OpCode::GetChildren2;
            let min = if with_stat {
                GET_CHILDREN2_MIN
            } else {
                GET_CHILDREN_MIN
            };
            let failed = Reply::GetChildren {
                opcode: op,
                children: None,
                stat: None,
            };
            with_body(header, min, failed, || {
                let mut r = body();
                let children = r.string_list()?;
                let stat = if with_stat { Some(r.stat()?) } else { None };
                Ok(Reply::GetChildren {
                    opcode: op,
                    children: Some(children),
                    stat,
                })
            })
        }
        OpCode::Sync => with_body(header, SYNC_MIN, Reply::Sync { path: None }, || {
            Ok(Reply::Sync {
                path: body().string()?,
            })
        }),
        OpCode::GetAcl => with_body(
            header,
            GET_ACL_MIN,
            Reply::GetAcl {
                acl: None,
                stat: None,
            },
            || {
                let mut r = body();
                let acl = r.acl_list()?;
                Ok(Reply::GetAcl {
                    acl: Some(acl),
                    stat: Some(r.stat()?),
                })
            },
        ),
        OpCode::SetAcl => with_body(header, STAT_ONLY_MIN, Reply::SetAcl { stat: None }, || {
            Ok(Reply::SetAcl {
                stat: Some(body().stat()?),
            })
        }),
        OpCode::Delete => Some(Ok(Reply::Delete)),
        OpCode::Close => Some(Ok(Reply::Close)),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
