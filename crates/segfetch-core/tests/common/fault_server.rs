//! Misbehaving segment server: answers most requests correctly but cuts one
//! segment's connection partway through.

use segfetch_core::protocol::SegmentRequest;
use std::io::Write;
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::thread;

/// Serves `body`; the connection asking for `broken_segment` gets half its
/// bytes and is then closed. Runs until the process exits.
pub fn start(body: Vec<u8>, broken_segment: i32) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let addr = listener.local_addr().unwrap();
    let body = std::sync::Arc::new(body);
    thread::spawn(move || {
        for stream in listener.incoming().flatten() {
            let body = std::sync::Arc::clone(&body);
            thread::spawn(move || handle(stream, &body, broken_segment));
        }
    });
    addr
}

fn handle(mut stream: TcpStream, body: &[u8], broken_segment: i32) {
    let req = match SegmentRequest::read_from(&mut stream) {
        Ok(r) => r,
        Err(_) => return,
    };
    let start = req.offset as usize;
    let end = (start + req.length as usize).min(body.len());
    let slice = &body[start..end];
    if req.segment_id == broken_segment {
        let _ = stream.write_all(&slice[..slice.len() / 2]);
        let _ = stream.shutdown(std::net::Shutdown::Both);
        return;
    }
    let _ = stream.write_all(slice);
}
