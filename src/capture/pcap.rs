//! Legacy pcap file reader.
//!
//! Reads a capture written by tcpdump or Wireshark in the classic pcap
//! format (not pcapng) and yields the TCP segments to or from one port.

use std::fs::File;
use std::path::Path;

use pcap_parser::traits::PcapReaderIterator;
use pcap_parser::{LegacyPcapReader, PcapBlockOwned, PcapError};
use tracing::{debug, warn};

use crate::capture::packet::{parse_frame, LinkType};
use crate::capture::{CaptureError, FrameSource};
use crate::flow::Frame;

/// Reader buffer size. Must exceed the largest captured record.
const BUFFER_SIZE: usize = 256 * 1024;

/// Frames from a pcap file, filtered to one TCP port.
pub struct PcapFileSource {
    reader: LegacyPcapReader<File>,
    link: LinkType,
    port: u16,
    packets: u64,
    stalled: bool,
}

impl PcapFileSource {
    /// Open `path` and read its file header.
    pub fn open(path: impl AsRef<Path>, port: u16) -> Result<Self, CaptureError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| CaptureError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        let format_error = |reason: String| CaptureError::Format {
            path: path.to_path_buf(),
            reason,
        };

        let mut reader =
            LegacyPcapReader::new(BUFFER_SIZE, file).map_err(|e| format_error(format!("{e:?}")))?;

        let code = match reader.next() {
            Ok((offset, PcapBlockOwned::LegacyHeader(header))) => {
                let code = header.network.0;
                reader.consume(offset);
                code
            }
            Ok(_) => return Err(format_error("missing file header".into())),
            Err(e) => return Err(format_error(format!("{e:?}"))),
        };
        let link = LinkType::from_code(code).ok_or(CaptureError::UnsupportedLinkType(code))?;

        debug!(path = %path.display(), ?link, port, "opened capture file");
        Ok(Self {
            reader,
            link,
            port,
            packets: 0,
            stalled: false,
        })
    }

    pub fn link_type(&self) -> LinkType {
        self.link
    }

    /// Records read so far, including those filtered out.
    pub fn packets_read(&self) -> u64 {
        self.packets
    }
}

impl FrameSource for PcapFileSource {
    fn next_frame(&mut self) -> Option<Frame> {
        loop {
            match self.reader.next() {
                Ok((offset, block)) => {
                    self.stalled = false;
                    let frame = match block {
                        PcapBlockOwned::Legacy(record) => {
                            self.packets += 1;
                            parse_frame(self.link, record.data)
                        }
                        _ => None,
                    };
                    self.reader.consume(offset);

                    if let Some(frame) = frame.filter(|f| f.touches_port(self.port)) {
                        return Some(frame);
                    }
                }
                Err(PcapError::Eof) => return None,
                Err(PcapError::Incomplete(_)) => {
                    // A second refill with no progress means the file ends
                    // inside a record.
                    if self.stalled {
                        warn!(packets = self.packets, "capture file truncated");
                        return None;
                    }
                    self.stalled = true;
                    if let Err(e) = self.reader.refill() {
                        warn!(error = ?e, "failed to read capture file");
                        return None;
                    }
                }
                Err(e) => {
                    warn!(error = ?e, packets = self.packets, "stopping on malformed capture");
                    return None;
                }
            }
        }
    }
}
