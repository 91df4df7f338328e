//! Central observation of handler threads.
//!
//! Handlers are detached from the dispatcher, but each one reports how it
//! ended (including a caught panic) to a single supervisor thread, which logs
//! it and keeps counters. A failing handler affects nothing but its own connection.

use std::any::Any;
use std::io;
use std::net::SocketAddr;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc;
use std::thread;

use super::handler::{HandlerError, HandlerSummary};

/// Counters updated by the supervisor; shared with the server handle.
#[derive(Debug, Default)]
pub struct ServerStats {
    accepted: AtomicU64,
    served: AtomicU64,
    failed: AtomicU64,
    panicked: AtomicU64,
}

/// Point-in-time copy of `ServerStats`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub accepted: u64,
    pub served: u64,
    pub failed: u64,
    pub panicked: u64,
}

impl StatsSnapshot {
    /// Connections whose handler has ended, however it ended.
    pub fn finished(&self) -> u64 {
        self.served + self.failed + self.panicked
    }
}

impl ServerStats {
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            accepted: self.accepted.load(Ordering::Relaxed),
            served: self.served.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            panicked: self.panicked.load(Ordering::Relaxed),
        }
    }

    pub(super) fn record_accept(&self) {
        self.accepted.fetch_add(1, Ordering::Relaxed);
    }
}

/// How a handler ended.
#[derive(Debug)]
pub(super) enum HandlerOutcome {
    Served(HandlerSummary),
    Failed(HandlerError),
    Panicked(String),
    NotStarted(io::Error),
}

#[derive(Debug)]
pub(super) struct HandlerReport {
    pub peer: SocketAddr,
    pub outcome: HandlerOutcome,
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// Runs `f` on the current thread, catching a panic, and reports the result.
pub(super) fn run_supervised<F>(peer: SocketAddr, reports: &mpsc::Sender<HandlerReport>, f: F)
where
    F: FnOnce() -> Result<HandlerSummary, HandlerError>,
{
    let outcome = match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(Ok(summary)) => HandlerOutcome::Served(summary),
        Ok(Err(e)) => HandlerOutcome::Failed(e),
        Err(payload) => HandlerOutcome::Panicked(panic_message(payload.as_ref())),
    };
    // A closed channel only means the supervisor is gone; the connection is already done.
    let _ = reports.send(HandlerReport { peer, outcome });
}

fn observe(stats: &ServerStats, report: HandlerReport) {
    let peer = report.peer;
    match report.outcome {
        HandlerOutcome::Served(s) => {
            stats.served.fetch_add(1, Ordering::Relaxed);
            tracing::info!(
                %peer,
                segment_id = s.segment_id,
                offset = s.offset,
                bytes = s.sent,
                "segment served"
            );
        }
        HandlerOutcome::Failed(e) => {
            stats.failed.fetch_add(1, Ordering::Relaxed);
            tracing::warn!(%peer, phase = ?e.phase(), "connection dropped: {}", e);
        }
        HandlerOutcome::Panicked(msg) => {
            stats.panicked.fetch_add(1, Ordering::Relaxed);
            tracing::error!(%peer, "handler panicked: {}", msg);
        }
        HandlerOutcome::NotStarted(e) => {
            stats.failed.fetch_add(1, Ordering::Relaxed);
            tracing::error!(%peer, "could not start handler: {}", e);
        }
    }
}

/// Starts the supervisor thread. It exits once every report sender is dropped.
pub(super) fn spawn_supervisor(
    stats: std::sync::Arc<ServerStats>,
) -> io::Result<(mpsc::Sender<HandlerReport>, thread::JoinHandle<()>)> {
    let (tx, rx) = mpsc::channel::<HandlerReport>();
    let handle = thread::Builder::new()
        .name("handler-supervisor".to_string())
        .spawn(move || {
            for report in rx {
                observe(&stats, report);
            }
        })?;
    Ok((tx, handle))
}
