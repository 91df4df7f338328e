//! `segfetch plan`: print the segment layout for a size. Also holds the
//! size/plan resolution shared with `fetch`.

use anyhow::{bail, Context, Result};
use segfetch_core::config::ClientConfig;
use segfetch_core::segmenter::{self, TransferPlan};

use crate::cli::{SizeArgs, SplitArgs};

/// Total size from `--size` or the length of `--size-of`.
pub(crate) fn resolve_size(args: &SizeArgs) -> Result<u64> {
    match (&args.size, &args.size_of) {
        (Some(size), _) => Ok(*size),
        (None, Some(path)) => Ok(std::fs::metadata(path)
            .with_context(|| format!("cannot stat {}", path.display()))?
            .len()),
        (None, None) => bail!("either --size or --size-of is required"),
    }
}

/// Builds the plan from `--count` or `--segments`, bounded by the segment cap.
pub(crate) fn build_plan(size: u64, split: &SplitArgs, cfg: &ClientConfig) -> Result<TransferPlan> {
    let max_segments = split.max_segments.unwrap_or(cfg.max_segments);
    let plan = match split.count {
        Some(count) => {
            if count > max_segments {
                bail!("--count {} exceeds the segment limit of {}", count, max_segments);
            }
            segmenter::plan_even(size, count)?
        }
        None => segmenter::plan_segments(size, &split.segments, max_segments)?,
    };
    Ok(plan)
}

pub fn run_plan(cfg: &ClientConfig, size: &SizeArgs, split: &SplitArgs) -> Result<()> {
    let total = resolve_size(size)?;
    let plan = build_plan(total, split, cfg)?;
    if plan.is_empty() {
        println!("Empty file: nothing to fetch.");
        return Ok(());
    }
    println!("{:>6}  {:>14}  {:>12}", "ID", "OFFSET", "LENGTH");
    for seg in plan.segments() {
        println!("{:>6}  {:>14}  {:>12}", seg.id, seg.offset, seg.length);
    }
    println!("{} segment(s), {} bytes", plan.len(), plan.total_size());
    Ok(())
}
