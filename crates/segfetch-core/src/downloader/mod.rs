//! Segment worker pool.
//!
//! One OS thread per segment, all launched after the plan is fixed. Each
//! worker owns its connection and its buffer; the only shared state is the
//! progress counter. The caller sees results only after every worker has
//! been joined, and a failed worker never cancels its siblings.

mod error;
mod progress;
mod segment;

pub use error::{ErrorKind, SegmentError};
pub use progress::{ProgressCounter, ProgressEvent};
pub use segment::FetchOptions;

use std::net::SocketAddr;
use std::sync::Arc;
use std::thread;

use crate::segmenter::{Segment, TransferPlan};

/// What one worker produced: its segment's bytes, or why it failed.
#[derive(Debug)]
pub struct SegmentOutcome {
    pub segment: Segment,
    pub result: Result<Vec<u8>, SegmentError>,
}

impl SegmentOutcome {
    pub fn succeeded(&self) -> bool {
        self.result.is_ok()
    }
}

fn run_worker(
    addr: SocketAddr,
    segment: Segment,
    opts: FetchOptions,
    progress: &ProgressCounter,
) -> Result<Vec<u8>, SegmentError> {
    let result = segment::fetch_segment(addr, &segment, opts);
    match &result {
        Ok(buf) => {
            tracing::debug!(
                segment_id = segment.id,
                offset = segment.offset,
                bytes = buf.len(),
                "segment downloaded"
            );
            progress.record(segment.id, buf.len(), true);
        }
        Err(e) => {
            tracing::warn!(
                segment_id = segment.id,
                offset = segment.offset,
                kind = ?e.kind(),
                "segment failed: {}",
                e
            );
            progress.record(segment.id, e.bytes_received(), false);
        }
    }
    result
}

/// Downloads every segment of `plan` from `addr`, one thread per segment.
///
/// Blocks until all workers have finished (the barrier), then returns the
/// outcomes in ascending segment id order regardless of finishing order.
pub fn download_segments(
    addr: SocketAddr,
    plan: &TransferPlan,
    opts: FetchOptions,
    progress: &Arc<ProgressCounter>,
) -> Vec<SegmentOutcome> {
    let mut handles = Vec::with_capacity(plan.len());
    let mut outcomes: Vec<SegmentOutcome> = Vec::with_capacity(plan.len());

    for &segment in plan.segments() {
        let progress_w = Arc::clone(progress);
        let spawned = thread::Builder::new()
            .name(format!("segment-{}", segment.id))
            .spawn(move || run_worker(addr, segment, opts, &progress_w));
        match spawned {
            Ok(handle) => handles.push((segment, handle)),
            Err(e) => {
                tracing::error!(segment_id = segment.id, "could not spawn worker: {}", e);
                progress.record(segment.id, 0, false);
                outcomes.push(SegmentOutcome {
                    segment,
                    result: Err(SegmentError::Spawn(e)),
                });
            }
        }
    }

    for (segment, handle) in handles {
        let result = match handle.join() {
            Ok(res) => res,
            Err(_) => {
                tracing::error!(segment_id = segment.id, "segment worker panicked");
                progress.record(segment.id, 0, false);
                Err(SegmentError::WorkerPanicked)
            }
        };
        outcomes.push(SegmentOutcome { segment, result });
    }

    outcomes.sort_by_key(|o| o.segment.id);
    outcomes
}
