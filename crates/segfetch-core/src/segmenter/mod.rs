//! Segment planning.
//!
//! Splits a known file size into contiguous, non-overlapping segments that
//! together cover `[0, size)` exactly once. Each segment is fetched over its
//! own connection.

mod plan;

pub use plan::{plan_even, plan_segments, PlanError, Segment, TransferPlan, MAX_SEGMENT_LEN};
