//! Fixed-layout segment request.

use std::io::{self, Read, Write};

use crate::segmenter::Segment;

/// Size of an encoded request on the wire.
pub const REQUEST_LEN: usize = 16;

const ID_LEN: usize = 4;
const OFFSET_LEN: usize = 8;
const LENGTH_LEN: usize = 4;

/// Error reading or decoding a request.
#[derive(Debug, thiserror::Error)]
pub enum WireError {
    /// Peer closed (or sent too little) before all 16 request bytes arrived.
    #[error("short request: got {received} of 16 bytes")]
    ShortRequest { received: usize },
    #[error("request i/o: {0}")]
    Io(#[from] io::Error),
}

/// Client-to-server request for one byte range of the served file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentRequest {
    pub segment_id: i32,
    pub offset: i64,
    pub length: i32,
}

impl SegmentRequest {
    /// Request covering `segment`. The planner keeps every field within the
    /// signed wire ranges, so the conversions saturate only on hand-built segments.
    pub fn for_segment(segment: &Segment) -> Self {
        Self {
            segment_id: i32::try_from(segment.id).unwrap_or(i32::MAX),
            offset: i64::try_from(segment.offset).unwrap_or(i64::MAX),
            length: i32::try_from(segment.length).unwrap_or(i32::MAX),
        }
    }

    pub fn encode(&self) -> [u8; REQUEST_LEN] {
        let mut buf = [0u8; REQUEST_LEN];
        buf[..ID_LEN].copy_from_slice(&self.segment_id.to_be_bytes());
        buf[ID_LEN..ID_LEN + OFFSET_LEN].copy_from_slice(&self.offset.to_be_bytes());
        buf[ID_LEN + OFFSET_LEN..].copy_from_slice(&self.length.to_be_bytes());
        buf
    }

    pub fn decode(buf: &[u8]) -> Result<Self, WireError> {
        if buf.len() < REQUEST_LEN {
            return Err(WireError::ShortRequest {
                received: buf.len(),
            });
        }
        let mut id = [0u8; ID_LEN];
        let mut offset = [0u8; OFFSET_LEN];
        let mut length = [0u8; LENGTH_LEN];
        id.copy_from_slice(&buf[..ID_LEN]);
        offset.copy_from_slice(&buf[ID_LEN..ID_LEN + OFFSET_LEN]);
        length.copy_from_slice(&buf[ID_LEN + OFFSET_LEN..REQUEST_LEN]);
        Ok(Self {
            segment_id: i32::from_be_bytes(id),
            offset: i64::from_be_bytes(offset),
            length: i32::from_be_bytes(length),
        })
    }

    /// Writes the three fields as three separate writes, in order.
    pub fn write_to<W: Write>(&self, w: &mut W) -> io::Result<()> {
        w.write_all(&self.segment_id.to_be_bytes())?;
        w.write_all(&self.offset.to_be_bytes())?;
        w.write_all(&self.length.to_be_bytes())?;
        w.flush()
    }

    /// Reads exactly 16 bytes. EOF before that is `ShortRequest`, not success.
    pub fn read_from<R: Read>(r: &mut R) -> Result<Self, WireError> {
        let mut buf = [0u8; REQUEST_LEN];
        let mut filled = 0;
        while filled < REQUEST_LEN {
            match r.read(&mut buf[filled..]) {
                Ok(0) => return Err(WireError::ShortRequest { received: filled }),
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(WireError::Io(e)),
            }
        }
        Self::decode(&buf)
    }
}
