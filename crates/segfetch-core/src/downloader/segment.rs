//! Single-segment fetch: one connection, one request, one buffer.

use std::io::{self, Read};
use std::net::{SocketAddr, TcpStream};
use std::time::Duration;

use crate::config::ClientConfig;
use crate::protocol::SegmentRequest;
use crate::segmenter::Segment;

use super::error::SegmentError;

/// Socket deadlines for segment connections.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchOptions {
    pub connect_timeout: Duration,
    /// Longest a single read may block without receiving bytes.
    pub recv_timeout: Duration,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self::from_config(&ClientConfig::default())
    }
}

impl FetchOptions {
    pub fn from_config(cfg: &ClientConfig) -> Self {
        Self {
            connect_timeout: Duration::from_secs(cfg.connect_timeout_secs),
            recv_timeout: Duration::from_secs(cfg.recv_timeout_secs),
        }
    }

    // Zero durations are rejected by the socket setters.
    fn clamped(self) -> Self {
        let min = Duration::from_millis(1);
        Self {
            connect_timeout: self.connect_timeout.max(min),
            recv_timeout: self.recv_timeout.max(min),
        }
    }
}

/// Connects to `addr`, sends the request for `segment`, and reads exactly
/// `segment.length` bytes. Anything less (peer close, reset, read deadline) is an error.
pub(super) fn fetch_segment(
    addr: SocketAddr,
    segment: &Segment,
    opts: FetchOptions,
) -> Result<Vec<u8>, SegmentError> {
    let opts = opts.clamped();
    let expected = segment.len();

    let mut stream =
        TcpStream::connect_timeout(&addr, opts.connect_timeout).map_err(SegmentError::Connect)?;
    stream
        .set_read_timeout(Some(opts.recv_timeout))
        .map_err(SegmentError::Connect)?;

    SegmentRequest::for_segment(segment)
        .write_to(&mut stream)
        .map_err(|source| SegmentError::Connection {
            received: 0,
            expected,
            source,
        })?;

    let mut buffer = vec![0u8; expected];
    let mut received = 0usize;
    while received < expected {
        match stream.read(&mut buffer[received..]) {
            Ok(0) => return Err(SegmentError::ShortRead { received, expected }),
            Ok(n) => received += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(SegmentError::from_read(e, received, expected)),
        }
    }
    Ok(buffer)
}
