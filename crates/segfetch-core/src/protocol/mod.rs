//! Wire protocol between segment clients and the segment server.
//!
//! One request per connection: `segment_id` (4 bytes), `offset` (8 bytes),
//! `length` (4 bytes), all signed big-endian, written as three separate
//! field writes with no framing. The response is exactly `length` raw bytes
//! of file content with no header or trailer; the server closes the
//! connection afterwards.

mod request;

pub use request::{SegmentRequest, WireError, REQUEST_LEN};
