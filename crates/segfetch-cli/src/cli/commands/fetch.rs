//! `segfetch fetch`: download a file over parallel segment connections.

use anyhow::{bail, Context, Result};
use segfetch_core::checksum;
use segfetch_core::config::ClientConfig;
use segfetch_core::downloader::ProgressEvent;
use segfetch_core::transfer::{self, TransferConfig, TransferReport, Verdict};
use std::path::Path;

use super::plan::{build_plan, resolve_size};
use crate::cli::{SizeArgs, SplitArgs};

/// One progress line per finished segment.
pub(crate) fn progress_line(ev: &ProgressEvent) -> String {
    let status = if ev.succeeded { "done" } else { "FAILED" };
    format!(
        "  segment {:>4} {:<6} {:>10} bytes   {}/{} ({}%)",
        ev.segment_id,
        status,
        ev.bytes_so_far,
        ev.completed,
        ev.total,
        ev.percent()
    )
}

/// Final summary printed after the barrier.
pub(crate) fn summary_line(report: &TransferReport, output: &Path) -> String {
    match report.verdict {
        Verdict::Success => format!(
            "Fetched {} bytes in {} segment(s) to {} ({:.2}s)",
            report.bytes_written,
            report.segments.len(),
            output.display(),
            report.elapsed.as_secs_f64()
        ),
        Verdict::PartialFailure => format!(
            "{} of {} segment(s) failed; {} was not written",
            report.failed().count(),
            report.total,
            output.display()
        ),
    }
}

/// Checks the assembled output's digest against `--sha256`, when given.
pub(crate) fn verify_digest(report: &TransferReport, expected: Option<&str>) -> Result<()> {
    let (Some(expected), Some(actual)) = (expected, report.sha256.as_deref()) else {
        return Ok(());
    };
    if !checksum::digest_matches(actual, expected) {
        bail!("checksum mismatch: expected {}, got {}", expected.trim(), actual);
    }
    Ok(())
}

pub async fn run_fetch(
    cfg: &ClientConfig,
    size: &SizeArgs,
    split: &SplitArgs,
    output: &Path,
    expected_sha256: Option<&str>,
) -> Result<()> {
    let total = resolve_size(size)?;
    let plan = build_plan(total, split, cfg)?;
    let transfer_cfg = TransferConfig::from_config(cfg);
    tracing::debug!(
        host = %transfer_cfg.host,
        port = transfer_cfg.port,
        segments = plan.len(),
        "fetch planned"
    );
    println!(
        "Fetching {} bytes from {}:{} in {} segment(s)",
        plan.total_size(),
        transfer_cfg.host,
        transfer_cfg.port,
        plan.len()
    );

    let (progress_tx, mut progress_rx) =
        tokio::sync::mpsc::channel::<ProgressEvent>(plan.len().max(1));
    let progress_handle = tokio::spawn(async move {
        while let Some(ev) = progress_rx.recv().await {
            println!("{}", progress_line(&ev));
        }
    });

    let out = output.to_path_buf();
    let report = tokio::task::spawn_blocking(move || {
        transfer::run_transfer(&transfer_cfg, &plan, &out, Some(progress_tx))
    })
    .await
    .context("transfer task failed")??;
    let _ = progress_handle.await;

    for s in report.failed() {
        eprintln!(
            "  segment {} (offset {}, {} bytes): {}",
            s.segment.id,
            s.segment.offset,
            s.segment.length,
            s.error.as_deref().unwrap_or("unknown error")
        );
    }
    let summary = summary_line(&report, output);
    if !report.is_success() {
        bail!(summary);
    }
    println!("{}", summary);
    if let Some(digest) = &report.sha256 {
        println!("{}  {}", digest, output.display());
    }
    verify_digest(&report, expected_sha256)
}
