//! Live interface capture through libpcap.
//!
//! The interface is opened in promiscuous mode with a one-second read
//! timeout and a BPF filter (by default `port <zk port>`). The filter is
//! compiled against a dead handle before the device is touched, so a bad
//! expression is reported the same way whether or not the process may open
//! the interface.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use pcap::{Active, Capture, Linktype};
use tracing::{debug, warn};

use crate::capture::packet::{parse_frame, LinkType};
use crate::capture::{CaptureError, FrameSource};
use crate::flow::Frame;

const SNAPLEN: i32 = 65_535;
/// Upper bound on how long a stop request waits for an idle interface.
const READ_TIMEOUT_MS: i32 = 1_000;

/// Frames read from a network interface, filtered to one TCP port.
pub struct LiveSource {
    capture: Capture<Active>,
    iface: String,
    link: LinkType,
    port: u16,
    packets: u64,
    stop: Option<Arc<AtomicBool>>,
}

impl LiveSource {
    /// Open `iface` and install `filter` on it.
    pub fn open(iface: &str, filter: &str, port: u16) -> Result<Self, CaptureError> {
        check_filter(filter)?;

        let device_error = |e: pcap::Error| CaptureError::Device {
            iface: iface.to_string(),
            reason: e.to_string(),
        };
        let mut capture = Capture::from_device(iface)
            .map_err(device_error)?
            .snaplen(SNAPLEN)
            .promisc(true)
            .timeout(READ_TIMEOUT_MS)
            .open()
            .map_err(device_error)?;
        capture
            .filter(filter, true)
            .map_err(|e| filter_error(filter, e))?;

        let code = capture.get_datalink().0;
        let link = LinkType::from_code(code).ok_or(CaptureError::UnsupportedLinkType(code))?;

        debug!(iface, filter, ?link, port, "opened capture interface");
        Ok(Self {
            capture,
            iface: iface.to_string(),
            link,
            port,
            packets: 0,
            stop: None,
        })
    }

    /// End input as soon as `flag` is set, checked after every read timeout.
    pub fn with_stop_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.stop = Some(flag);
        self
    }

    pub fn link_type(&self) -> LinkType {
        self.link
    }

    /// Packets received so far, including those filtered out.
    pub fn packets_read(&self) -> u64 {
        self.packets
    }

    fn stop_requested(&self) -> bool {
        self.stop
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::Acquire))
    }
}

impl FrameSource for LiveSource {
    fn next_frame(&mut self) -> Option<Frame> {
        loop {
            if self.stop_requested() {
                return None;
            }
            match self.capture.next_packet() {
                Ok(packet) => {
                    self.packets += 1;
                    let frame = parse_frame(self.link, packet.data);
                    if let Some(frame) = frame.filter(|f| f.touches_port(self.port)) {
                        return Some(frame);
                    }
                }
                Err(pcap::Error::TimeoutExpired) => {}
                Err(e) => {
                    warn!(iface = %self.iface, error = %e, packets = self.packets, "live capture failed");
                    return None;
                }
            }
        }
    }
}

/// Compile `filter` without opening a device.
pub fn check_filter(filter: &str) -> Result<(), CaptureError> {
    let dead = Capture::dead(Linktype::ETHERNET).map_err(|e| filter_error(filter, e))?;
    dead.compile(filter, true)
        .map(drop)
        .map_err(|e| filter_error(filter, e))
}

fn filter_error(filter: &str, e: pcap::Error) -> CaptureError {
    CaptureError::Filter {
        filter: filter.to_string(),
        reason: e.to_string(),
    }
}
