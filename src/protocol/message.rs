//! # Decoded Messages
//!
//! Typed representation of one ZooKeeper conversation step. Each direction is
//! a closed sum type: [`Request`] for client-to-server records and [`Reply`]
//! for server-to-client records, wrapped with the endpoints and transaction
//! ids in [`ClientMessage`] and [`ServerMessage`].
//!
//! Reply bodies are only present when the server reported success
//! (`error == 0`); on failure the server sends the header alone.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::flow::Endpoint;
use crate::protocol::{event_type_to_name, state_to_name, OpCode};

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// Znode metadata as carried in replies. 68 bytes on the wire.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZnodeStat {
    /// zxid of the change that created the node.
    pub czxid: i64,
    /// zxid of the last data change.
    pub mzxid: i64,
    /// Creation time, epoch milliseconds.
    pub ctime: i64,
    /// Last modification time, epoch milliseconds.
    pub mtime: i64,
    pub version: i32,
    pub cversion: i32,
    pub aversion: i32,
    /// Session id of the owner if ephemeral, 0 otherwise.
    pub ephemeral_owner: i64,
    pub data_length: i32,
    pub num_children: i32,
    /// zxid of the last child change.
    pub pzxid: i64,
}

impl fmt::Display for ZnodeStat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Stat(czxid={},mzxid={},ctime={},mtime={},version={},cversion={},aversion={},\
             ephemeralOwner={},dataLength={},numChildren={},pzxid={})",
            self.czxid,
            self.mzxid,
            self.ctime,
            self.mtime,
            self.version,
            self.cversion,
            self.aversion,
            self.ephemeral_owner,
            self.data_length,
            self.num_children,
            self.pzxid
        )
    }
}

/// Access-control entry attached to a znode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Acl {
    /// Permission bits (READ=1, WRITE=2, CREATE=4, DELETE=8, ADMIN=16).
    pub perms: i32,
    pub scheme: String,
    pub credential: String,
}

impl fmt::Display for Acl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Acl(perms={},scheme={},credential={})",
            self.perms, self.scheme, self.credential
        )
    }
}

// ---------------------------------------------------------------------------
// Client side
// ---------------------------------------------------------------------------

/// Body of a client request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Request {
    Connect {
        protocol_version: i32,
        last_zxid_seen: i64,
        timeout: i32,
        session_id: i64,
        password: Vec<u8>,
        read_only: bool,
    },
    Ping,
    Auth {
        auth_type: i32,
        scheme: String,
        credential: Vec<u8>,
    },
    SetWatches {
        relative_zxid: i64,
        data_watches: Vec<String>,
        exist_watches: Vec<String>,
        child_watches: Vec<String>,
    },
    Get {
        path: String,
        watch: bool,
    },
    /// `opcode` is CREATE or CREATE2; the reply shape depends on it.
    Create {
        opcode: OpCode,
        path: String,
        ephemeral: bool,
        sequential: bool,
        acl: Vec<Acl>,
        flags: i32,
    },
    Set {
        path: String,
        version: i32,
    },
    Delete {
        path: String,
        version: i32,
    },
    /// `opcode` is GETCHILDREN or GETCHILDREN2.
    GetChildren {
        opcode: OpCode,
        path: String,
        watch: bool,
    },
    Exists {
        path: String,
        watch: bool,
    },
    Sync {
        path: String,
    },
    GetAcl {
        path: String,
    },
    SetAcl {
        path: String,
        acl: Vec<Acl>,
        version: i32,
    },
    Close,
}

impl Request {
    /// The operation this request performs.
    pub fn opcode(&self) -> OpCode {
        match self {
            Request::Connect { .. } => OpCode::Connect,
            Request::Ping => OpCode::Ping,
            Request::Auth { .. } => OpCode::SetAuth,
            Request::SetWatches { .. } => OpCode::SetWatches,
            Request::Get { .. } => OpCode::GetData,
            Request::Create { opcode, .. } => *opcode,
            Request::Set { .. } => OpCode::SetData,
            Request::Delete { .. } => OpCode::Delete,
            Request::GetChildren { opcode, .. } => *opcode,
            Request::Exists { .. } => OpCode::Exists,
            Request::Sync { .. } => OpCode::Sync,
            Request::GetAcl { .. } => OpCode::GetAcl,
            Request::SetAcl { .. } => OpCode::SetAcl,
            Request::Close => OpCode::Close,
        }
    }

    /// Display name of the request kind.
    pub fn name(&self) -> &'static str {
        match self {
            Request::Connect { .. } => "ConnectRequest",
            Request::Ping => "PingRequest",
            Request::Auth { .. } => "AuthRequest",
            Request::SetWatches { .. } => "SetWatchesRequest",
            Request::Get { .. } => "GetRequest",
            Request::Create {
                opcode: OpCode::Create2,
                ..
            } => "Create2Request",
            Request::Create { .. } => "CreateRequest",
            Request::Set { .. } => "SetRequest",
            Request::Delete { .. } => "DeleteRequest",
            Request::GetChildren {
                opcode: OpCode::GetChildren2,
                ..
            } => "GetChildren2Request",
            Request::GetChildren { .. } => "GetChildrenRequest",
            Request::Exists { .. } => "ExistsRequest",
            Request::Sync { .. } => "SyncRequest",
            Request::GetAcl { .. } => "GetAclRequest",
            Request::SetAcl { .. } => "SetAclRequest",
            Request::Close => "CloseRequest",
        }
    }
}

/// A decoded client-to-server record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientMessage {
    pub client: Endpoint,
    pub server: Endpoint,
    pub xid: i32,
    pub request: Request,
}

impl ClientMessage {
    pub fn opcode(&self) -> OpCode {
        self.request.opcode()
    }
}

// ---------------------------------------------------------------------------
// Server side
// ---------------------------------------------------------------------------

/// Body of a server reply. Optional fields are `None` when the reply carried
/// a non-zero error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Reply {
    Ping,
    Auth,
    SetWatches,
    /// `data` is also `None` for a znode holding a null buffer.
    Get {
        data: Option<Vec<u8>>,
        stat: Option<ZnodeStat>,
    },
    /// `stat` is only sent for CREATE2.
    Create {
        opcode: OpCode,
        path: Option<String>,
        stat: Option<ZnodeStat>,
    },
    /// `stat` is only sent for GETCHILDREN2.
    GetChildren {
        opcode: OpCode,
        children: Option<Vec<String>>,
        stat: Option<ZnodeStat>,
    },
    Set {
        stat: Option<ZnodeStat>,
    },
    Delete,
    Sync {
        path: Option<String>,
    },
    Exists {
        stat: Option<ZnodeStat>,
    },
    GetAcl {
        acl: Option<Vec<Acl>>,
        stat: Option<ZnodeStat>,
    },
    SetAcl {
        stat: Option<ZnodeStat>,
    },
    Close,
    WatchEvent {
        event_type: i32,
        state: i32,
        path: String,
    },
}

impl Reply {
    /// Display name of the reply kind.
    pub fn name(&self) -> &'static str {
        match self {
            Reply::Ping => "PingReply",
            Reply::Auth => "AuthReply",
            Reply::SetWatches => "SetWatchesReply",
            Reply::Get { .. } => "GetReply",
            Reply::Create {
                opcode: OpCode::Create2,
                ..
            } => "Create2Reply",
            Reply::Create { .. } => "CreateReply",
            Reply::GetChildren {
                opcode: OpCode::GetChildren2,
                ..
            } => "GetChildren2Reply",
            Reply::GetChildren { .. } => "GetChildrenReply",
            Reply::Set { .. } => "SetReply",
            Reply::Delete => "DeleteReply",
            Reply::Sync { .. } => "SyncReply",
            Reply::Exists { .. } => "ExistsReply",
            Reply::GetAcl { .. } => "GetAclReply",
            Reply::SetAcl { .. } => "SetAclReply",
            Reply::Close => "CloseReply",
            Reply::WatchEvent { .. } => "WatchEvent",
        }
    }
}

/// A decoded server-to-client record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerMessage {
    pub client: Endpoint,
    pub server: Endpoint,
    pub xid: i32,
    pub zxid: i64,
    pub error: i32,
    pub reply: Reply,
}

// ---------------------------------------------------------------------------
// Message
// ---------------------------------------------------------------------------

/// Either direction of the conversation, as delivered to consumers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "direction", rename_all = "snake_case")]
pub enum Message {
    Client(ClientMessage),
    Server(ServerMessage),
}

impl Message {
    pub fn xid(&self) -> i32 {
        match self {
            Message::Client(m) => m.xid,
            Message::Server(m) => m.xid,
        }
    }

    pub fn client(&self) -> &Endpoint {
        match self {
            Message::Client(m) => &m.client,
            Message::Server(m) => &m.client,
        }
    }

    pub fn server(&self) -> &Endpoint {
        match self {
            Message::Client(m) => &m.server,
            Message::Server(m) => &m.server,
        }
    }

    /// Serialize this message to a single-line JSON string.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

impl From<ClientMessage> for Message {
    fn from(m: ClientMessage) -> Self {
        Message::Client(m)
    }
}

impl From<ServerMessage> for Message {
    fn from(m: ServerMessage) -> Self {
        Message::Server(m)
    }
}

// ---------------------------------------------------------------------------
// Display
// ---------------------------------------------------------------------------

fn lossy(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

fn join<T: fmt::Display>(items: &[T]) -> String {
    items
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(",")
}

fn opt<T: fmt::Display>(value: &Option<T>) -> String {
    value.as_ref().map(ToString::to_string).unwrap_or_default()
}

impl fmt::Display for ClientMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}(", self.request.name())?;
        writeln!(f, "  client={}", self.client)?;
        writeln!(f, "  server={}", self.server)?;
        writeln!(f, "  xid={}", self.xid)?;
        match &self.request {
            Request::Connect {
                protocol_version,
                last_zxid_seen,
                timeout,
                session_id,
                password,
                read_only,
            } => {
                writeln!(f, "  protocol={protocol_version}")?;
                writeln!(f, "  zxid={last_zxid_seen}")?;
                writeln!(f, "  timeout={timeout}")?;
                writeln!(f, "  session={session_id:#x}")?;
                writeln!(f, "  passwd={}", hex(password))?;
                writeln!(f, "  readonly={read_only}")?;
            }
            Request::Ping | Request::Close => {}
            Request::Auth {
                auth_type,
                scheme,
                credential,
            } => {
                writeln!(f, "  type={auth_type}")?;
                writeln!(f, "  scheme={scheme}")?;
                writeln!(f, "  credential={}", lossy(credential))?;
            }
            Request::SetWatches {
                relative_zxid,
                data_watches,
                exist_watches,
                child_watches,
            } => {
                writeln!(f, "  relative_zxid={relative_zxid}")?;
                writeln!(f, "  data_watches={}", data_watches.join(","))?;
                writeln!(f, "  exist_watches={}", exist_watches.join(","))?;
                writeln!(f, "  child_watches={}", child_watches.join(","))?;
            }
            Request::Get { path, watch }
            | Request::GetChildren { path, watch, .. }
            | Request::Exists { path, watch } => {
                writeln!(f, "  path={path}")?;
                writeln!(f, "  watch={watch}")?;
            }
            Request::Create {
                path,
                ephemeral,
                sequential,
                acl,
                ..
            } => {
                writeln!(f, "  path={path}")?;
                writeln!(f, "  ephemeral={ephemeral}")?;
                writeln!(f, "  sequence={sequential}")?;
                writeln!(f, "  acls={}", join(acl))?;
            }
            Request::Set { path, version } | Request::Delete { path, version } => {
                writeln!(f, "  path={path}")?;
                writeln!(f, "  version={version}")?;
            }
            Request::Sync { path } | Request::GetAcl { path } => {
                writeln!(f, "  path={path}")?;
            }
            Request::SetAcl { path, acl, version } => {
                writeln!(f, "  path={path}")?;
                writeln!(f, "  acls={}", join(acl))?;
                writeln!(f, "  version={version}")?;
            }
        }
        write!(f, ")")
    }
}

impl fmt::Display for ServerMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}(", self.reply.name())?;
        writeln!(f, "  client={}", self.client)?;
        writeln!(f, "  server={}", self.server)?;
        writeln!(f, "  xid={}", self.xid)?;
        writeln!(f, "  zxid={}", self.zxid)?;
        writeln!(f, "  error={}", self.error)?;
        match &self.reply {
            Reply::Ping | Reply::Auth | Reply::SetWatches | Reply::Delete | Reply::Close => {}
            Reply::Get { data, stat } => {
                writeln!(f, "  data={}", data.as_deref().map(lossy).unwrap_or_default())?;
                writeln!(f, "  stat={}", opt(stat))?;
            }
            Reply::Create { path, stat, .. } => {
                writeln!(f, "  path={}", opt(path))?;
                if stat.is_some() {
                    writeln!(f, "  stat={}", opt(stat))?;
                }
            }
            Reply::GetChildren { children, stat, .. } => {
                let children = children.as_deref().map(|c| c.join(","));
                writeln!(f, "  children={}", children.unwrap_or_default())?;
                if stat.is_some() {
                    writeln!(f, "  stat={}", opt(stat))?;
                }
            }
            Reply::Set { stat } | Reply::Exists { stat } | Reply::SetAcl { stat } => {
                writeln!(f, "  stat={}", opt(stat))?;
            }
            Reply::Sync { path } => {
                writeln!(f, "  path={}", opt(path))?;
            }
            Reply::GetAcl { acl, stat } => {
                writeln!(f, "  acls={}", acl.as_deref().map(join).unwrap_or_default())?;
                writeln!(f, "  stat={}", opt(stat))?;
            }
            Reply::WatchEvent {
                event_type,
                state,
                path,
            } => {
                writeln!(f, "  event_type={}", event_type_to_name(*event_type))?;
                writeln!(f, "  state={}", state_to_name(*state))?;
                writeln!(f, "  path={path}")?;
            }
        }
        write!(f, ")")
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Message::Client(m) => fmt::Display::fmt(m, f),
            Message::Server(m) => fmt::Display::fmt(m, f),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
