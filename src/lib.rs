//! # zktraffic - Passive ZooKeeper Traffic Decoder
//!
//! Reconstructs the request/reply conversation between ZooKeeper clients and
//! servers from captured TCP payloads, without taking part in it.
//!
//! ## Architecture
//!
//! - **protocol**: jute primitives, typed messages, the request and reply
//!   decoders, and the xid correlation table
//! - **decoder**: per-session frame dispatch (request or reply by port)
//! - **capture**: frame sources (pcap files, live interfaces behind the
//!   `live` feature, in-memory replay, channels) and link/IP/TCP header
//!   stripping
//! - **pipeline**: the capture thread and the consumer-facing message queue
//! - **config**: session settings
//!
//! ## Example
//!
//! ```no_run
//! use zktraffic::{Sniffer, SnifferConfig};
//!
//! let config = SnifferConfig {
//!     capture_file: Some("zk.pcap".into()),
//!     ..SnifferConfig::default()
//! };
//! let sniffer = Sniffer::new(config);
//! sniffer.run()?;
//! while let Some(msg) = sniffer.get_next_message() {
//!     println!("{msg}");
//! }
//! # Ok::<(), zktraffic::CaptureError>(())
//! ```

pub mod capture;
pub mod config;
pub mod decoder;
pub mod flow;
pub mod pipeline;
pub mod protocol;

#[cfg(test)]
mod testutil;

#[cfg(feature = "live")]
pub use capture::LiveSource;
pub use capture::{CaptureError, FrameSource, PcapFileSource, ReplaySource};
pub use config::{ConfigError, SnifferConfig};
pub use decoder::{FrameDecoder, DEFAULT_PORT};
pub use flow::{Endpoint, Frame};
pub use pipeline::{SessionState, Sniffer, SnifferStats};
pub use protocol::message::{
    Acl, ClientMessage, Message, Reply, Request, ServerMessage, ZnodeStat,
};
pub use protocol::{OpCode, OutstandingRequests, RecordOutcome};
