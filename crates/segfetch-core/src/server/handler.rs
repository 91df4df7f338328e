//! Per-connection request handling.
//!
//! `AwaitRequest -> Validate -> Stream -> Done`; any failure ends in `Error`
//! and the connection is dropped without a response (or with a truncated
//! one, if streaming had started). The handler owns exactly one socket and at
//! most one open file, and both are closed on every return path.

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::net::TcpStream;
use std::path::PathBuf;

use crate::protocol::{SegmentRequest, WireError};

use super::ServerOptions;

/// Phase a handler was in when it failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerPhase {
    AwaitRequest,
    Validate,
    Stream,
}

/// Why one connection was dropped. Never affects other connections.
#[derive(Debug, thiserror::Error)]
pub enum HandlerError {
    #[error("bad request: {0}")]
    Request(#[from] WireError),
    #[error("rejected request for segment {}: {reason}", .request.segment_id)]
    InvalidRequest {
        request: SegmentRequest,
        reason: &'static str,
    },
    #[error("served file {}: {source}", .path.display())]
    FileAccess {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("reading served file after {sent} bytes: {source}")]
    ReadFile {
        sent: u64,
        #[source]
        source: io::Error,
    },
    #[error("served file ended after {sent} of {length} bytes")]
    UnexpectedEof { sent: u64, length: u64 },
    #[error("sending to client after {sent} bytes: {source}")]
    Send {
        sent: u64,
        #[source]
        source: io::Error,
    },
}

impl HandlerError {
    pub fn phase(&self) -> HandlerPhase {
        match self {
            HandlerError::Request(_) => HandlerPhase::AwaitRequest,
            HandlerError::InvalidRequest { .. } | HandlerError::FileAccess { .. } => {
                HandlerPhase::Validate
            }
            HandlerError::ReadFile { .. }
            | HandlerError::UnexpectedEof { .. }
            | HandlerError::Send { .. } => HandlerPhase::Stream,
        }
    }
}

/// What a successfully handled connection sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandlerSummary {
    pub segment_id: i32,
    pub offset: u64,
    pub sent: u64,
}

/// Serves one connection: read the request, validate it against the served
/// file, stream the range through the throttle.
pub fn handle_connection(
    mut stream: TcpStream,
    opts: &ServerOptions,
) -> Result<HandlerSummary, HandlerError> {
    let deadline = Some(opts.socket_timeout());
    stream.set_read_timeout(deadline).map_err(WireError::Io)?;
    stream.set_write_timeout(deadline).map_err(WireError::Io)?;

    let request = SegmentRequest::read_from(&mut stream)?;
    tracing::info!(
        segment_id = request.segment_id,
        offset = request.offset,
        length = request.length,
        "segment request"
    );

    let (mut file, offset, length) = validate(&request, opts)?;
    let sent = stream_range(&mut file, &mut stream, length, opts)?;

    Ok(HandlerSummary {
        segment_id: request.segment_id,
        offset,
        sent,
    })
}

fn validate(
    request: &SegmentRequest,
    opts: &ServerOptions,
) -> Result<(File, u64, u64), HandlerError> {
    let invalid = |reason: &'static str| HandlerError::InvalidRequest {
        request: *request,
        reason,
    };
    if request.offset < 0 {
        return Err(invalid("negative offset"));
    }
    if request.length < 0 {
        return Err(invalid("negative length"));
    }
    let offset = request.offset as u64;
    let length = request.length as u64;

    let file_err = |source: io::Error| HandlerError::FileAccess {
        path: opts.file.clone(),
        source,
    };
    let mut file = File::open(&opts.file).map_err(file_err)?;
    let size = file.metadata().map_err(file_err)?.len();
    if offset > size {
        return Err(invalid("offset past end of file"));
    }
    file.seek(SeekFrom::Start(offset)).map_err(file_err)?;
    Ok((file, offset, length))
}

/// Copies `length` bytes from `file` to `out` in `chunk_size` pieces, pacing
/// after each chunk. Running out of file before `length` is an error.
fn stream_range<R: Read, W: Write>(
    file: &mut R,
    out: &mut W,
    length: u64,
    opts: &ServerOptions,
) -> Result<u64, HandlerError> {
    let mut buf = vec![0u8; opts.chunk_size.max(1)];
    let mut sent = 0u64;
    while sent < length {
        let want = (length - sent).min(buf.len() as u64) as usize;
        let n = match file.read(&mut buf[..want]) {
            Ok(0) => return Err(HandlerError::UnexpectedEof { sent, length }),
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(source) => return Err(HandlerError::ReadFile { sent, source }),
        };
        out.write_all(&buf[..n])
            .map_err(|source| HandlerError::Send { sent, source })?;
        sent += n as u64;
        opts.throttle.pace(n);
    }
    out.flush().map_err(|source| HandlerError::Send { sent, source })?;
    Ok(sent)
}
