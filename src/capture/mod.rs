//! # Capture Sources
//!
//! Everything upstream of the decoders. A [`FrameSource`] yields one TCP
//! [`Frame`] per call and `None` once its input is exhausted; a live source
//! may block inside `next_frame` while it waits for traffic.
//!
//! | Source                       | Input                                 |
//! |------------------------------|---------------------------------------|
//! | [`PcapFileSource`]           | Legacy pcap file on disk              |
//! | `LiveSource` (feature `live`)| Network interface through libpcap     |
//! | [`ReplaySource`]             | Frames already in memory              |
//! | `crossbeam` `Receiver<Frame>`| Frames pushed by another thread       |

#[cfg(feature = "live")]
pub mod live;
pub mod packet;
pub mod pcap;

use std::collections::VecDeque;
use std::path::PathBuf;

use crossbeam::channel::Receiver;

use crate::flow::Frame;

#[cfg(feature = "live")]
pub use live::LiveSource;
pub use pcap::PcapFileSource;

// ---------------------------------------------------------------------------
// FrameSource
// ---------------------------------------------------------------------------

/// Producer side of a capture session.
pub trait FrameSource: Send {
    /// Next captured frame, or `None` at end of input.
    fn next_frame(&mut self) -> Option<Frame>;
}

impl<S: FrameSource + ?Sized> FrameSource for Box<S> {
    fn next_frame(&mut self) -> Option<Frame> {
        (**self).next_frame()
    }
}

/// Blocks until a frame arrives. Input ends when every sender is dropped.
impl FrameSource for Receiver<Frame> {
    fn next_frame(&mut self) -> Option<Frame> {
        self.recv().ok()
    }
}

// ---------------------------------------------------------------------------
// ReplaySource
// ---------------------------------------------------------------------------

/// Finite in-memory frame sequence, yielded in order.
#[derive(Debug, Default, Clone)]
pub struct ReplaySource {
    frames: VecDeque<Frame>,
}

impl ReplaySource {
    pub fn new(frames: impl IntoIterator<Item = Frame>) -> Self {
        Self {
            frames: frames.into_iter().collect(),
        }
    }

    /// Frames not yet yielded.
    pub fn remaining(&self) -> usize {
        self.frames.len()
    }
}

impl FrameSource for ReplaySource {
    fn next_frame(&mut self) -> Option<Frame> {
        self.frames.pop_front()
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Capture session failures.
#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    #[error("failed to open capture {}: {source}", .path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid capture file {}: {reason}", .path.display())]
    Format { path: PathBuf, reason: String },

    #[error("unsupported link type {0}")]
    UnsupportedLinkType(i32),

    #[error("cannot capture on {iface}: {reason}")]
    Device { iface: String, reason: String },

    #[error("invalid capture filter {filter:?}: {reason}")]
    Filter { filter: String, reason: String },

    #[error("live capture support not compiled in (enable the `live` feature)")]
    LiveUnavailable,

    #[error("no capture file or interface configured")]
    NoSource,

    #[error("capture session already started")]
    AlreadyStarted,

    #[error("failed to spawn capture thread: {0}")]
    Spawn(#[source] std::io::Error),
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
