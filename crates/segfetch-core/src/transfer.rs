//! Client-side transfer: plan -> worker pool -> barrier -> assembly.

use anyhow::{Context, Result};
use std::net::{SocketAddr, ToSocketAddrs};
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::assembler::{self, Assembly};
use crate::config::ClientConfig;
use crate::downloader::{self, ErrorKind, FetchOptions, ProgressCounter, ProgressEvent};
use crate::segmenter::{Segment, TransferPlan};

/// Where to fetch from and how long to wait.
#[derive(Debug, Clone)]
pub struct TransferConfig {
    pub host: String,
    pub port: u16,
    pub fetch: FetchOptions,
}

impl TransferConfig {
    pub fn from_config(cfg: &ClientConfig) -> Self {
        Self {
            host: cfg.host.clone(),
            port: cfg.port,
            fetch: FetchOptions::from_config(cfg),
        }
    }

    /// Config pointing at an already-resolved address (tests, embedded servers).
    pub fn for_addr(addr: SocketAddr, fetch: FetchOptions) -> Self {
        Self {
            host: addr.ip().to_string(),
            port: addr.port(),
            fetch,
        }
    }

    pub fn resolve(&self) -> Result<SocketAddr> {
        (self.host.as_str(), self.port)
            .to_socket_addrs()
            .with_context(|| format!("cannot resolve {}:{}", self.host, self.port))?
            .next()
            .with_context(|| format!("no address for {}:{}", self.host, self.port))
    }
}

/// Aggregate result of a transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Every segment arrived and the output file was written.
    Success,
    /// At least one segment failed; no output file was written.
    PartialFailure,
}

/// Per-segment line of the final report.
#[derive(Debug, Clone)]
pub struct SegmentReport {
    pub segment: Segment,
    pub bytes_received: usize,
    pub kind: Option<ErrorKind>,
    pub error: Option<String>,
}

impl SegmentReport {
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

#[derive(Debug, Clone)]
pub struct TransferReport {
    pub verdict: Verdict,
    pub segments: Vec<SegmentReport>,
    /// Bytes written to the output (0 on partial failure).
    pub bytes_written: u64,
    /// SHA-256 of the written output; `None` on partial failure.
    pub sha256: Option<String>,
    /// Progress counter value after the barrier.
    pub completed: usize,
    /// Segments in the plan; `completed == total` once the barrier has passed.
    pub total: usize,
    pub elapsed: Duration,
}

impl TransferReport {
    pub fn is_success(&self) -> bool {
        self.verdict == Verdict::Success
    }

    pub fn failed(&self) -> impl Iterator<Item = &SegmentReport> {
        self.segments.iter().filter(|s| !s.succeeded())
    }
}

/// Fetches every segment of `plan` concurrently and writes `output` only if all succeed.
///
/// Segment failures do not make this return `Err`: they produce a
/// `PartialFailure` report. `Err` means the transfer could not run at all
/// (invalid plan, unresolvable server) or the output could not be written.
/// An empty plan writes an empty file without touching the network.
pub fn run_transfer(
    cfg: &TransferConfig,
    plan: &TransferPlan,
    output: &Path,
    progress_tx: Option<tokio::sync::mpsc::Sender<ProgressEvent>>,
) -> Result<TransferReport> {
    plan.validate().context("invalid transfer plan")?;
    let started = Instant::now();
    let progress = Arc::new(ProgressCounter::new(plan.len(), progress_tx));

    let outcomes = if plan.is_empty() {
        Vec::new()
    } else {
        let addr = cfg.resolve()?;
        tracing::info!(
            %addr,
            segments = plan.len(),
            total = plan.total_size(),
            "starting segmented transfer"
        );
        downloader::download_segments(addr, plan, cfg.fetch, &progress)
    };

    let segments: Vec<SegmentReport> = outcomes
        .iter()
        .map(|o| match &o.result {
            Ok(buf) => SegmentReport {
                segment: o.segment,
                bytes_received: buf.len(),
                kind: None,
                error: None,
            },
            Err(e) => SegmentReport {
                segment: o.segment,
                bytes_received: e.bytes_received(),
                kind: Some(e.kind()),
                error: Some(e.to_string()),
            },
        })
        .collect();

    let assembly = assembler::assemble(outcomes, output)
        .with_context(|| format!("assembling {}", output.display()))?;
    let (verdict, bytes_written, sha256) = match assembly {
        Assembly::Written { bytes, sha256 } => (Verdict::Success, bytes, Some(sha256)),
        Assembly::Incomplete { .. } => (Verdict::PartialFailure, 0, None),
    };

    let report = TransferReport {
        verdict,
        segments,
        bytes_written,
        sha256,
        completed: progress.completed(),
        total: progress.total(),
        elapsed: started.elapsed(),
    };
    for s in report.failed() {
        tracing::warn!(
            segment_id = s.segment.id,
            kind = ?s.kind,
            "segment failed: {}",
            s.error.as_deref().unwrap_or("unknown")
        );
    }
    tracing::info!(
        verdict = ?report.verdict,
        completed = report.completed,
        total = report.total,
        bytes = report.bytes_written,
        elapsed_ms = report.elapsed.as_millis() as u64,
        "transfer finished"
    );
    Ok(report)
}
