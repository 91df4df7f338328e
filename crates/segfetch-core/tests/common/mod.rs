//! Shared helpers for integration tests.

#![allow(dead_code)]

pub mod fault_server;

use segfetch_core::server::{SegmentServer, ServerHandle, ServerOptions};
use segfetch_core::throttle::Throttle;
use std::io::Write;
use std::time::Duration;

/// Deterministic test body of `len` bytes.
pub fn body(len: usize) -> Vec<u8> {
    (0u32..)
        .map(|i| (i.wrapping_mul(31) % 251) as u8)
        .take(len)
        .collect()
}

/// Writes `data` to a temp file and serves it on an ephemeral port.
/// Keep the returned temp file alive for as long as the server is used.
pub fn serve(data: &[u8], rate: Option<u64>) -> (tempfile::NamedTempFile, ServerHandle) {
    serve_with_backlog(data, rate, 128)
}

pub fn serve_with_backlog(
    data: &[u8],
    rate: Option<u64>,
    backlog: i32,
) -> (tempfile::NamedTempFile, ServerHandle) {
    let mut f = tempfile::NamedTempFile::new().expect("temp file");
    f.write_all(data).expect("write served file");
    f.flush().expect("flush served file");
    let opts = ServerOptions {
        file: f.path().to_path_buf(),
        chunk_size: 1024,
        throttle: Throttle::new(rate),
        io_timeout: Duration::from_secs(5),
    };
    let server = SegmentServer::bind("127.0.0.1:0".parse().unwrap(), backlog, opts).expect("bind");
    let handle = server.spawn().expect("spawn server");
    (f, handle)
}
