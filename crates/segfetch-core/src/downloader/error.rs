//! Per-segment failure type and its classification.

use std::io;

/// Coarse failure class of a segment, used for log fields and the final report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Could not connect, or the socket failed mid-transfer.
    Connection,
    /// No bytes arrived within the receive deadline.
    Timeout,
    /// The server closed the connection before `length` bytes arrived.
    ShortRead,
    Other,
}

/// Error returned by a single segment fetch. Contained to its worker: never
/// retried and never cancels sibling segments.
#[derive(Debug, thiserror::Error)]
pub enum SegmentError {
    #[error("connect failed: {0}")]
    Connect(#[source] io::Error),
    #[error("connection error after {received} of {expected} bytes: {source}")]
    Connection {
        received: usize,
        expected: usize,
        #[source]
        source: io::Error,
    },
    #[error("timed out after {received} of {expected} bytes")]
    Timeout { received: usize, expected: usize },
    /// Peer closed early. A zero-byte read is a failure, not a successful EOF.
    #[error("connection closed after {received} of {expected} bytes")]
    ShortRead { received: usize, expected: usize },
    #[error("could not start worker: {0}")]
    Spawn(#[source] io::Error),
    #[error("worker thread panicked")]
    WorkerPanicked,
}

impl SegmentError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SegmentError::Connect(_) | SegmentError::Connection { .. } => ErrorKind::Connection,
            SegmentError::Timeout { .. } => ErrorKind::Timeout,
            SegmentError::ShortRead { .. } => ErrorKind::ShortRead,
            SegmentError::Spawn(_) | SegmentError::WorkerPanicked => ErrorKind::Other,
        }
    }

    /// Bytes received before the failure (0 when the connection never opened).
    pub fn bytes_received(&self) -> usize {
        match self {
            SegmentError::Connection { received, .. }
            | SegmentError::Timeout { received, .. }
            | SegmentError::ShortRead { received, .. } => *received,
            SegmentError::Connect(_) | SegmentError::Spawn(_) | SegmentError::WorkerPanicked => 0,
        }
    }

    /// Classifies an I/O error hit while reading segment data.
    /// `set_read_timeout` expiry surfaces as `WouldBlock` on Unix and `TimedOut` on Windows.
    pub(crate) fn from_read(e: io::Error, received: usize, expected: usize) -> Self {
        match e.kind() {
            io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut => {
                SegmentError::Timeout { received, expected }
            }
            io::ErrorKind::UnexpectedEof => SegmentError::ShortRead { received, expected },
            _ => SegmentError::Connection {
                received,
                expected,
                source: e,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_timeouts_classify_as_timeout() {
        for kind in [io::ErrorKind::WouldBlock, io::ErrorKind::TimedOut] {
            let e = SegmentError::from_read(io::Error::from(kind), 10, 100);
            assert_eq!(e.kind(), ErrorKind::Timeout);
            assert_eq!(e.bytes_received(), 10);
        }
    }

    #[test]
    fn reset_classifies_as_connection() {
        let e = SegmentError::from_read(io::Error::from(io::ErrorKind::ConnectionReset), 0, 5);
        assert_eq!(e.kind(), ErrorKind::Connection);
        assert!(e.to_string().contains("0 of 5"));
    }

    #[test]
    fn connect_and_panic_kinds() {
        let e = SegmentError::Connect(io::Error::from(io::ErrorKind::ConnectionRefused));
        assert_eq!(e.kind(), ErrorKind::Connection);
        assert_eq!(e.bytes_received(), 0);
        assert_eq!(SegmentError::WorkerPanicked.kind(), ErrorKind::Other);
    }

    #[test]
    fn short_read_display() {
        let e = SegmentError::ShortRead {
            received: 3,
            expected: 400,
        };
        assert_eq!(e.to_string(), "connection closed after 3 of 400 bytes");
        assert_eq!(e.kind(), ErrorKind::ShortRead);
    }
}
