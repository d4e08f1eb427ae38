//! # Capture Pipeline
//!
//! A [`Sniffer`] owns one capture session. A dedicated producer thread pulls
//! frames from a [`FrameSource`], decodes them in capture order with its own
//! [`FrameDecoder`] (and therefore its own outstanding-request table), and
//! pushes every decoded message onto an unbounded channel. Consumers drain
//! the channel from any thread.
//!
//! ```text
//!  FrameSource ──► zk-capture thread ──► channel ──► get_next_message()
//!                  (FrameDecoder)                  ──► receiver() clones
//! ```
//!
//! The session moves through `Idle → Running → Stopped` exactly once. It
//! stops when the source is exhausted, when [`Sniffer::stop`] is called, or
//! straight from `Idle` when the source cannot be opened (including a live
//! filter that does not compile). The producer checks the stop flag between
//! frames. A libpcap interface also checks it on every read timeout; a
//! channel source delays the stop until its next frame arrives.
//!
//! The stop flag is one-way: once requested it is never cleared, so a stop
//! that races with [`Sniffer::run`] is never lost.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam::channel::{self, Receiver, Sender};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

#[cfg(feature = "live")]
use crate::capture::LiveSource;
use crate::capture::{CaptureError, FrameSource, PcapFileSource};
use crate::config::SnifferConfig;
use crate::decoder::FrameDecoder;
use crate::protocol::message::Message;
use crate::protocol::OutstandingRequests;

// ---------------------------------------------------------------------------
// Session state
// ---------------------------------------------------------------------------

/// Lifecycle of a capture session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Idle,
    Running,
    Stopped,
}

impl SessionState {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => SessionState::Idle,
            1 => SessionState::Running,
            _ => SessionState::Stopped,
        }
    }

    fn as_u8(self) -> u8 {
        match self {
            SessionState::Idle => 0,
            SessionState::Running => 1,
            SessionState::Stopped => 2,
        }
    }
}

// ---------------------------------------------------------------------------
// Statistics
// ---------------------------------------------------------------------------

/// Cumulative counters, written by the producer thread only.
#[derive(Debug, Default)]
struct PipelineStats {
    frames: AtomicU64,
    payload_bytes: AtomicU64,
    client_messages: AtomicU64,
    server_messages: AtomicU64,
    undecoded_frames: AtomicU64,
    rejected_records: AtomicU64,
}

/// Point-in-time view of a session's counters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnifferStats {
    pub state: SessionState,
    pub frames: u64,
    pub payload_bytes: u64,
    pub client_messages: u64,
    pub server_messages: u64,
    /// Frames that produced no message.
    pub undecoded_frames: u64,
    /// Requests not recorded because the outstanding table was full.
    pub rejected_records: u64,
    /// Messages decoded but not yet consumed.
    pub queued: usize,
}

/// State shared between the handle and the producer thread.
#[derive(Debug)]
struct Shared {
    state: AtomicU8,
    /// Set once by the first stop request, never cleared.
    stop_requested: Arc<AtomicBool>,
    stats: PipelineStats,
}

impl Shared {
    fn state(&self) -> SessionState {
        SessionState::from_u8(self.state.load(Ordering::Acquire))
    }

    fn set_state(&self, state: SessionState) {
        self.state.store(state.as_u8(), Ordering::Release);
    }

    fn stopping(&self) -> bool {
        self.stop_requested.load(Ordering::Acquire)
    }
}

// ---------------------------------------------------------------------------
// Sniffer
// ---------------------------------------------------------------------------

/// One passive capture session and its message queue.
pub struct Sniffer {
    config: SnifferConfig,
    shared: Arc<Shared>,
    /// Handed to the producer on start; dropping it ends the queue.
    sender: Mutex<Option<Sender<Message>>>,
    receiver: Receiver<Message>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl Sniffer {
    /// Create an idle session.
    pub fn new(config: SnifferConfig) -> Self {
        let (sender, receiver) = channel::unbounded();
        Self {
            config,
            shared: Arc::new(Shared {
                state: AtomicU8::new(SessionState::Idle.as_u8()),
                stop_requested: Arc::new(AtomicBool::new(false)),
                stats: PipelineStats::default(),
            }),
            sender: Mutex::new(Some(sender)),
            receiver,
            handle: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &SnifferConfig {
        &self.config
    }

    /// Start capturing from the configured interface or pcap file.
    ///
    /// If the source cannot be opened, or its filter cannot be compiled and
    /// applied, the session goes straight to `Stopped` and the error is
    /// returned.
    pub fn run(&self) -> Result<(), CaptureError> {
        if self.shared.state() != SessionState::Idle {
            return Err(CaptureError::AlreadyStarted);
        }

        match self.open_source() {
            Ok(source) => self.run_with_source(source),
            Err(e) => {
                warn!(error = %e, "capture source failed to open");
                self.abandon();
                Err(e)
            }
        }
    }

    fn open_source(&self) -> Result<Box<dyn FrameSource>, CaptureError> {
        if let Some(iface) = &self.config.interface {
            return self.open_live(iface);
        }
        match &self.config.capture_file {
            Some(path) => Ok(Box::new(PcapFileSource::open(path, self.config.port)?)),
            None => Err(CaptureError::NoSource),
        }
    }

    #[cfg(feature = "live")]
    fn open_live(&self, iface: &str) -> Result<Box<dyn FrameSource>, CaptureError> {
        let source = LiveSource::open(iface, &self.config.effective_filter(), self.config.port)?
            .with_stop_flag(Arc::clone(&self.shared.stop_requested));
        Ok(Box::new(source))
    }

    #[cfg(not(feature = "live"))]
    fn open_live(&self, _iface: &str) -> Result<Box<dyn FrameSource>, CaptureError> {
        Err(CaptureError::LiveUnavailable)
    }

    /// Start capturing from `source` on a new producer thread.
    pub fn run_with_source<S>(&self, source: S) -> Result<(), CaptureError>
    where
        S: FrameSource + 'static,
    {
        let started = self.shared.state.compare_exchange(
            SessionState::Idle.as_u8(),
            SessionState::Running.as_u8(),
            Ordering::AcqRel,
            Ordering::Acquire,
        );
        if started.is_err() {
            return Err(CaptureError::AlreadyStarted);
        }
        let sender = match lock(&self.sender).take() {
            Some(sender) => sender,
            None => {
                // A concurrent stop abandoned the idle session first.
                self.shared.set_state(SessionState::Stopped);
                return Err(CaptureError::AlreadyStarted);
            }
        };

        let table = OutstandingRequests::with_limit(self.config.max_outstanding_requests);
        let decoder = FrameDecoder::with_table(self.config.port, table);
        let shared = Arc::clone(&self.shared);

        info!(
            port = self.config.port,
            max_outstanding = ?self.config.max_outstanding_requests,
            "capture session started"
        );

        let spawned = thread::Builder::new()
            .name("zk-capture".into())
            .spawn(move || capture_loop(source, decoder, sender, shared));
        match spawned {
            Ok(handle) => {
                *lock(&self.handle) = Some(handle);
                Ok(())
            }
            Err(e) => {
                self.shared.set_state(SessionState::Stopped);
                Err(CaptureError::Spawn(e))
            }
        }
    }

    /// Ask the producer to exit after the frame it is working on. Does not
    /// wait.
    pub fn request_stop(&self) {
        self.shared.stop_requested.store(true, Ordering::Release);
        if self.shared.state() == SessionState::Idle {
            self.abandon();
        }
    }

    /// Stop the session and wait for the producer thread to exit. Messages
    /// already queued remain available.
    pub fn stop(&self) {
        self.request_stop();
        let handle = lock(&self.handle).take();
        if let Some(handle) = handle {
            if handle.join().is_err() {
                warn!("capture thread panicked");
                self.shared.set_state(SessionState::Stopped);
            }
        }
    }

    /// Idle to stopped without ever running; ends the queue.
    fn abandon(&self) {
        let _ = self.shared.state.compare_exchange(
            SessionState::Idle.as_u8(),
            SessionState::Stopped.as_u8(),
            Ordering::AcqRel,
            Ordering::Acquire,
        );
        lock(&self.sender).take();
    }

    // -----------------------------------------------------------------------
    // Consumer side
    // -----------------------------------------------------------------------

    /// Block until a message is available. Returns `None` once the session
    /// has stopped and every queued message has been consumed.
    pub fn get_next_message(&self) -> Option<Message> {
        self.receiver.recv().ok()
    }

    /// Next message if one is already queued.
    pub fn try_next_message(&self) -> Option<Message> {
        self.receiver.try_recv().ok()
    }

    /// Wait at most `timeout` for a message.
    pub fn next_message_timeout(&self, timeout: Duration) -> Option<Message> {
        self.receiver.recv_timeout(timeout).ok()
    }

    /// True if no message is queued right now.
    pub fn try_is_empty(&self) -> bool {
        self.receiver.is_empty()
    }

    pub fn is_stopped(&self) -> bool {
        self.state() == SessionState::Stopped
    }

    pub fn state(&self) -> SessionState {
        self.shared.state()
    }

    /// An additional consumer handle on the same queue. Each message is
    /// delivered to exactly one consumer.
    pub fn receiver(&self) -> Receiver<Message> {
        self.receiver.clone()
    }

    /// Snapshot of the session counters.
    pub fn stats(&self) -> SnifferStats {
        let s = &self.shared.stats;
        SnifferStats {
            state: self.state(),
            frames: s.frames.load(Ordering::Relaxed),
            payload_bytes: s.payload_bytes.load(Ordering::Relaxed),
            client_messages: s.client_messages.load(Ordering::Relaxed),
            server_messages: s.server_messages.load(Ordering::Relaxed),
            undecoded_frames: s.undecoded_frames.load(Ordering::Relaxed),
            rejected_records: s.rejected_records.load(Ordering::Relaxed),
            queued: self.receiver.len(),
        }
    }
}

impl Drop for Sniffer {
    fn drop(&mut self) {
        // Signal only: a channel source may block the producer indefinitely.
        self.shared.stop_requested.store(true, Ordering::Release);
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

// ---------------------------------------------------------------------------
// Producer
// ---------------------------------------------------------------------------

fn capture_loop<S: FrameSource>(
    mut source: S,
    mut decoder: FrameDecoder,
    sender: Sender<Message>,
    shared: Arc<Shared>,
) {
    let stats = &shared.stats;

    while !shared.stopping() {
        let Some(frame) = source.next_frame() else {
            break;
        };
        stats.frames.fetch_add(1, Ordering::Relaxed);
        stats
            .payload_bytes
            .fetch_add(frame.payload.len() as u64, Ordering::Relaxed);

        match decoder.decode_frame(frame) {
            Some(msg) => {
                let counter = match msg {
                    Message::Client(_) => &stats.client_messages,
                    Message::Server(_) => &stats.server_messages,
                };
                counter.fetch_add(1, Ordering::Relaxed);
                if sender.send(msg).is_err() {
                    // Every receiver is gone, including the session's own.
                    break;
                }
            }
            None => {
                stats.undecoded_frames.fetch_add(1, Ordering::Relaxed);
            }
        }
        stats
            .rejected_records
            .store(decoder.rejected_records(), Ordering::Relaxed);
    }

    shared.set_state(SessionState::Stopped);
    info!(
        frames = stats.frames.load(Ordering::Relaxed),
        client_messages = stats.client_messages.load(Ordering::Relaxed),
        server_messages = stats.server_messages.load(Ordering::Relaxed),
        undecoded = stats.undecoded_frames.load(Ordering::Relaxed),
        outstanding = decoder.outstanding().len(),
        "capture session stopped"
    );
    // Dropping the sender here wakes consumers blocked on an empty queue.
    drop(sender);
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
