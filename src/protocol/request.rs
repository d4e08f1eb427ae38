//! # Request Decoder
//!
//! Turns a client-to-server payload into a [`ClientMessage`]. Dispatch happens
//! first on the xid (reserved values have fixed shapes and no opcode lookup),
//! then on the opcode at offset 8.
//!
//! Every shape has a minimum declared length, compared against the record
//! length in the first four bytes. Payloads below it are not ZooKeeper
//! requests as far as this decoder is concerned and yield `None`.
//!
//! | Shape                                   | Min | Body                              |
//! |-----------------------------------------|-----|-----------------------------------|
//! | Connect (xid 0)                         | 29  | zxid, timeout, session, passwd, ro |
//! | Ping (xid -2)                           | 8   | none                              |
//! | Auth (xid -4)                           | 20  | type, scheme, credential          |
//! | SetWatches (xid -8)                     | 28  | relative zxid, three path lists   |
//! | GETDATA, GETCHILDREN(2), EXISTS         | 14  | path, watch                       |
//! | CREATE, CREATE2                         | 25  | path, data, acl list, flags       |
//! | SETDATA                                 | 22  | path, data, version               |
//! | DELETE                                  | 17  | path, version                     |
//! | SYNC                                    | 17  | path                              |
//! | GETACL                                  | 13  | path                              |
//! | SETACL                                  | 21  | path, acl list, version           |
//! | CLOSE                                   | 8   | none                              |

use tracing::trace;

use crate::flow::Endpoint;
use crate::protocol::message::{ClientMessage, Request};
use crate::protocol::wire::{read_i32, DecodeError, WireReader};
use crate::protocol::{OpCode, AUTH_XID, CONNECT_XID, PING_XID, SET_WATCHES_XID};

/// Bytes before any request can be classified: length and xid.
const HEADER_LEN: usize = 8;
/// Offset of the first body field after xid and opcode.
const BODY_OFFSET: usize = 12;

const CONNECT_MIN: i32 = 29;
const PING_MIN: i32 = 8;
const AUTH_MIN: i32 = 20;
const SET_WATCHES_MIN: i32 = 28;
const PATH_WATCH_MIN: i32 = 14;
const CREATE_MIN: i32 = 25;
const SET_DATA_MIN: i32 = 22;
const DELETE_MIN: i32 = 17;
const SYNC_MIN: i32 = 17;
const GET_ACL_MIN: i32 = 13;
const SET_ACL_MIN: i32 = 21;
const CLOSE_MIN: i32 = 8;

const FLAG_EPHEMERAL: i32 = 0x1;
const FLAG_SEQUENTIAL: i32 = 0x2;

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

/// Decode a payload sent by `client` to `server`.
///
/// Returns `None` for payloads that are too short for their shape, carry an
/// opcode with no decoder, or whose length prefixes overrun the buffer.
pub fn decode_request(
    client: Endpoint,
    server: Endpoint,
    payload: &[u8],
) -> Option<ClientMessage> {
    if payload.len() < HEADER_LEN {
        return None;
    }
    let declared = read_i32(payload, 0).ok()?;
    let xid = read_i32(payload, 4).ok()?;

    match decode_body(payload, declared, xid) {
        Ok(Some(request)) => Some(ClientMessage {
            client,
            server,
            xid,
            request,
        }),
        Ok(None) => None,
        Err(e) => {
            trace!(%client, %server, xid, error = %e, "undecodable request");
            None
        }
    }
}

fn decode_body(payload: &[u8], declared: i32, xid: i32) -> Result<Option<Request>, DecodeError> {
    if declared < 0 {
        return Ok(None);
    }
    match xid {
        CONNECT_XID => {
            if declared < CONNECT_MIN {
                return Ok(None);
            }
            decode_connect(payload).map(Some)
        }
        PING_XID => {
            if declared < PING_MIN {
                return Ok(None);
            }
            Ok(Some(Request::Ping))
        }
        AUTH_XID => {
            if declared < AUTH_MIN {
                return Ok(None);
            }
            let mut r = WireReader::at(payload, BODY_OFFSET);
            Ok(Some(Request::Auth {
                auth_type: r.i32()?,
                scheme: r.path()?,
                credential: r.buffer()?.map(<[u8]>::to_vec).unwrap_or_default(),
            }))
        }
        SET_WATCHES_XID => {
            if declared < SET_WATCHES_MIN {
                return Ok(None);
            }
            let mut r = WireReader::at(payload, BODY_OFFSET);
            Ok(Some(Request::SetWatches {
                relative_zxid: r.i64()?,
                data_watches: r.string_list()?,
                exist_watches: r.string_list()?,
                child_watches: r.string_list()?,
            }))
        }
        _ => {
            let code = read_i32(payload, HEADER_LEN)?;
            match OpCode::from_code(code) {
                Some(op) => decode_operation(payload, declared, op),
                None => Ok(None),
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Shapes
// ---------------------------------------------------------------------------

fn decode_connect(payload: &[u8]) -> Result<Request, DecodeError> {
    // No opcode: the protocol version sits where the xid would be.
    let mut r = WireReader::at(payload, 4);
    Ok(Request::Connect {
        protocol_version: r.i32()?,
        last_zxid_seen: r.i64()?,
        timeout: r.i32()?,
        session_id: r.i64()?,
        password: r.buffer()?.map(<[u8]>::to_vec).unwrap_or_default(),
        read_only: r.bool(),
    })
}

fn decode_operation(
    payload: &[u8],
    declared: i32,
    op: OpCode,
) -> Result<Option<Request>, DecodeError> {
    let min = match op {
        OpCode::GetData | OpCode::GetChildren | OpCode::GetChildren2 | OpCode::Exists => {
            PATH_WATCH_MIN
        }
        OpCode::Create | OpCode::Create2 => CREATE_MIN,
        OpCode::SetData => SET_DATA_MIN,
        OpCode::Delete => DELETE_MIN,
        OpCode::Sync => SYNC_MIN,
        OpCode::GetAcl => GET_ACL_MIN,
        OpCode::SetAcl => SET_ACL_MIN,
        OpCode::Close => CLOSE_MIN,
        _ => return Ok(None),
    };
    if declared < min {
        return Ok(None);
    }

    let mut r = WireReader::at(payload, BODY_OFFSET);
    let request = match op {
        OpCode::GetData => Request::Get {
            path: r.path()?,
            watch: r.bool(),
        },
        OpCode::Exists => Request::Exists {
            path: r.path()?,
            watch: r.bool(),
        },
        OpCode::GetChildren | OpCode::GetChildren2 => Request::GetChildren {
            opcode: op,
            path: r.path()?,
            watch: r.bool(),
        },
        OpCode::Create | OpCode::Create2 => {
            let path = r.path()?;
            r.skip_buffer()?;
            let acl = r.acl_list()?;
            let flags = r.i32()?;
            Request::Create {
                opcode: op,
                path,
                ephemeral: flags & FLAG_EPHEMERAL != 0,
                sequential: flags & FLAG_SEQUENTIAL != 0,
                acl,
                flags,
            }
        }
        OpCode::SetData => {
            let path = r.path()?;
            r.skip_buffer()?;
            Request::Set {
                path,
                version: r.i32()?,
            }
        }
        OpCode::Delete => Request::Delete {
            path: r.path()?,
            version: r.i32()?,
        },
        OpCode::Sync => Request::Sync { path: r.path()? },
        OpCode::GetAcl => Request::GetAcl { path: r.path()? },
        OpCode::SetAcl => Request::SetAcl {
            path: r.path()?,
            acl: r.acl_list()?,
            version: r.i32()?,
        },
        OpCode::Close => Request::Close,
        _ => return Ok(None),
    };
    Ok(Some(request))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
