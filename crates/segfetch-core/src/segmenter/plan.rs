//! Segment type and plan construction.

/// Largest segment length the wire format can carry (`length` is a signed 32-bit field).
pub const MAX_SEGMENT_LEN: u32 = i32::MAX as u32;

/// A single segment: bytes `[offset, offset + length)` of the served file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Segment {
    /// Position in the plan; output is assembled in ascending id order.
    pub id: u32,
    pub offset: u64,
    pub length: u32,
}

impl Segment {
    /// End offset (exclusive).
    pub fn end(&self) -> u64 {
        self.offset + u64::from(self.length)
    }

    pub fn len(&self) -> usize {
        self.length as usize
    }

    pub fn is_empty(&self) -> bool {
        self.length == 0
    }
}

/// Error building or validating a plan.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PlanError {
    #[error("file of {size} bytes needs more than {max} segments")]
    TooManySegments { max: usize, size: u64 },
    #[error("segment {id} is {length} bytes, wire limit is 2147483647")]
    SegmentTooLarge { id: usize, length: u64 },
    #[error("file size {size} exceeds the wire offset range")]
    FileTooLarge { size: u64 },
    #[error("segment {id} starts at {offset}, expected {expected}")]
    NonContiguous {
        id: usize,
        offset: u64,
        expected: u64,
    },
    #[error("segment {id} has zero length")]
    EmptySegment { id: usize },
    #[error("segments cover {covered} bytes, file is {size}")]
    SizeMismatch { covered: u64, size: u64 },
}

/// Ordered segments plus the declared total size. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferPlan {
    total_size: u64,
    segments: Vec<Segment>,
}

impl TransferPlan {
    /// Plan with no segments for an empty file.
    pub fn empty() -> Self {
        Self {
            total_size: 0,
            segments: Vec::new(),
        }
    }

    /// Builds a plan from explicit segments, rejecting anything that breaks contiguity.
    pub fn from_segments(total_size: u64, segments: Vec<Segment>) -> Result<Self, PlanError> {
        let plan = Self {
            total_size,
            segments,
        };
        plan.validate()?;
        Ok(plan)
    }

    pub fn total_size(&self) -> u64 {
        self.total_size
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Checks that ids run 0..n, segments are non-empty and back to back,
    /// and together cover exactly `[0, total_size)`.
    pub fn validate(&self) -> Result<(), PlanError> {
        if self.total_size > i64::MAX as u64 {
            return Err(PlanError::FileTooLarge {
                size: self.total_size,
            });
        }
        let mut expected = 0u64;
        for (i, seg) in self.segments.iter().enumerate() {
            if seg.id as usize != i || seg.offset != expected {
                return Err(PlanError::NonContiguous {
                    id: i,
                    offset: seg.offset,
                    expected,
                });
            }
            if seg.length == 0 {
                return Err(PlanError::EmptySegment { id: i });
            }
            if seg.length > MAX_SEGMENT_LEN {
                return Err(PlanError::SegmentTooLarge {
                    id: i,
                    length: u64::from(seg.length),
                });
            }
            expected = seg.end();
        }
        if expected != self.total_size {
            return Err(PlanError::SizeMismatch {
                covered: expected,
                size: self.total_size,
            });
        }
        Ok(())
    }
}

/// Builds a plan for `total_size` bytes from caller-supplied segment lengths.
///
/// Positive lengths are clamped to what is left of the file. A non-positive
/// length, or running out of lengths while bytes remain, switches to auto mode:
/// the whole remainder is split as evenly as possible over the free slots
/// (ceiling division, so the extra bytes land on the earliest segments) and
/// any lengths supplied after the non-positive one are ignored. Lengths past
/// the end of the file are ignored too. Fails with `TooManySegments` when more
/// than `max_segments` would be needed.
pub fn plan_segments(
    total_size: u64,
    lengths: &[i64],
    max_segments: usize,
) -> Result<TransferPlan, PlanError> {
    if total_size > i64::MAX as u64 {
        return Err(PlanError::FileTooLarge { size: total_size });
    }
    let max_segments = max_segments.min(i32::MAX as usize);

    let mut segments: Vec<Segment> = Vec::new();
    let mut requested = lengths.iter().copied();
    let mut auto = false;
    let mut offset = 0u64;

    while offset < total_size {
        let slots_left = max_segments.saturating_sub(segments.len());
        if slots_left == 0 {
            return Err(PlanError::TooManySegments {
                max: max_segments,
                size: total_size,
            });
        }
        let remaining = total_size - offset;
        let explicit = if auto {
            None
        } else {
            requested.next().filter(|&l| l > 0)
        };
        let len = match explicit {
            Some(l) => (l as u64).min(remaining),
            None => {
                auto = true;
                remaining.div_ceil(slots_left as u64)
            }
        };
        if len > u64::from(MAX_SEGMENT_LEN) {
            return Err(PlanError::SegmentTooLarge {
                id: segments.len(),
                length: len,
            });
        }
        segments.push(Segment {
            id: segments.len() as u32,
            offset,
            length: len as u32,
        });
        offset += len;
    }

    Ok(TransferPlan {
        total_size,
        segments,
    })
}

/// Splits `total_size` into `count` near-equal segments; the first
/// `total_size % count` segments get one extra byte. Files smaller than
/// `count` bytes get one segment per byte.
pub fn plan_even(total_size: u64, count: usize) -> Result<TransferPlan, PlanError> {
    if total_size == 0 {
        return Ok(TransferPlan::empty());
    }
    if count == 0 {
        return Err(PlanError::TooManySegments {
            max: 0,
            size: total_size,
        });
    }
    plan_segments(total_size, &[], count)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seg(id: u32, offset: u64, length: u32) -> Segment {
        Segment { id, offset, length }
    }

    fn lens(plan: &TransferPlan) -> Vec<u32> {
        plan.segments().iter().map(|s| s.length).collect()
    }

    fn assert_covers(plan: &TransferPlan, size: u64) {
        plan.validate().unwrap();
        let sum: u64 = plan.segments().iter().map(|s| u64::from(s.length)).sum();
        assert_eq!(sum, size);
    }

    #[test]
    fn explicit_lengths_600_400() {
        let plan = plan_segments(1000, &[600, 400], 100).unwrap();
        assert_eq!(plan.len(), 2);
        assert_eq!(plan.segments()[0], seg(0, 0, 600));
        assert_eq!(plan.segments()[1], seg(1, 600, 400));
        assert_covers(&plan, 1000);
    }

    #[test]
    fn oversized_length_is_clamped_to_remaining() {
        let plan = plan_segments(1000, &[600, 5000], 100).unwrap();
        assert_eq!(plan.len(), 2);
        assert_eq!(plan.segments()[1].length, 400);
    }

    #[test]
    fn lengths_past_end_are_ignored() {
        let plan = plan_segments(100, &[100, 50, 50], 100).unwrap();
        assert_eq!(plan.len(), 1);
        assert_covers(&plan, 100);
    }

    #[test]
    fn non_positive_length_auto_splits_remaining_slots() {
        // 10 bytes, 4 slots: ceil(10/4)=3, ceil(7/3)=3, ceil(4/2)=2, 2
        let plan = plan_segments(10, &[0], 4).unwrap();
        assert_eq!(lens(&plan), vec![3, 3, 2, 2]);
        assert_covers(&plan, 10);
    }

    #[test]
    fn negative_length_after_explicit_prefix() {
        let plan = plan_segments(100, &[40, -1], 4).unwrap();
        // 60 left over 3 slots
        assert_eq!(lens(&plan), vec![40, 20, 20, 20]);
        assert_covers(&plan, 100);
    }

    #[test]
    fn non_positive_length_splits_whole_remainder() {
        // Lengths after the non-positive one are ignored.
        let plan = plan_segments(100, &[0, 50], 4).unwrap();
        assert_eq!(lens(&plan), vec![25, 25, 25, 25]);
        assert_covers(&plan, 100);

        let plan = plan_segments(1000, &[333, 0, 17], 4).unwrap();
        assert_eq!(lens(&plan), vec![333, 223, 222, 222]);
        assert_covers(&plan, 1000);
    }

    #[test]
    fn running_out_of_lengths_auto_splits() {
        let plan = plan_segments(100, &[10], 3).unwrap();
        assert_eq!(lens(&plan), vec![10, 45, 45]);
    }

    #[test]
    fn too_many_segments() {
        let err = plan_segments(100, &[10, 10, 10], 3).unwrap_err();
        assert_eq!(err, PlanError::TooManySegments { max: 3, size: 100 });
    }

    #[test]
    fn zero_size_is_empty_plan() {
        let plan = plan_segments(0, &[10, 20], 4).unwrap();
        assert!(plan.is_empty());
        assert_eq!(plan.total_size(), 0);
        assert!(plan_even(0, 4).unwrap().is_empty());
    }

    #[test]
    fn zero_max_segments_with_data_fails() {
        assert!(matches!(
            plan_segments(5, &[], 0),
            Err(PlanError::TooManySegments { max: 0, .. })
        ));
        assert!(plan_even(5, 0).is_err());
    }

    #[test]
    fn plan_even_remainder_goes_first() {
        let plan = plan_even(10, 4).unwrap();
        assert_eq!(lens(&plan), vec![3, 3, 2, 2]);
        let plan = plan_even(1000, 4).unwrap();
        assert!(plan.segments().iter().all(|s| s.length == 250));
    }

    #[test]
    fn plan_even_small_file_one_byte_segments() {
        let plan = plan_even(3, 8).unwrap();
        assert_eq!(plan.len(), 3);
        assert!(plan.segments().iter().all(|s| s.length == 1));
    }

    #[test]
    fn contiguity_holds_for_many_sizes() {
        for size in [1u64, 2, 7, 99, 100, 101, 4096, 65_537, 1_000_003] {
            for max in [1usize, 2, 3, 8, 100] {
                for lengths in [&[][..], &[0][..], &[1, -1][..], &[333, 0, 17][..]] {
                    match plan_segments(size, lengths, max) {
                        Ok(plan) => {
                            assert!(plan.len() <= max);
                            assert_covers(&plan, size);
                        }
                        Err(PlanError::TooManySegments { .. }) => {}
                        Err(e) => panic!("size {} max {}: {}", size, max, e),
                    }
                }
            }
        }
    }

    #[test]
    fn segment_over_wire_limit_rejected() {
        let size = u64::from(MAX_SEGMENT_LEN) + 10;
        assert!(matches!(
            plan_segments(size, &[], 1),
            Err(PlanError::SegmentTooLarge { id: 0, .. })
        ));
        let plan = plan_segments(size, &[], 2).unwrap();
        assert_covers(&plan, size);
    }

    #[test]
    fn file_too_large() {
        assert!(matches!(
            plan_segments(u64::MAX, &[], 100),
            Err(PlanError::FileTooLarge { .. })
        ));
    }

    #[test]
    fn from_segments_rejects_gaps_and_overlaps() {
        let gap = vec![
            seg(0, 0, 10),
            seg(1, 11, 9),
        ];
        assert!(matches!(
            TransferPlan::from_segments(20, gap),
            Err(PlanError::NonContiguous {
                id: 1,
                offset: 11,
                expected: 10
            })
        ));
        let short = vec![seg(0, 0, 10)];
        assert_eq!(
            TransferPlan::from_segments(20, short).unwrap_err(),
            PlanError::SizeMismatch {
                covered: 10,
                size: 20
            }
        );
        let empty = vec![
            seg(0, 0, 10),
            seg(1, 10, 0),
        ];
        assert_eq!(
            TransferPlan::from_segments(10, empty).unwrap_err(),
            PlanError::EmptySegment { id: 1 }
        );
    }

    #[test]
    fn segment_end_and_len() {
        let s = seg(0, 600, 400);
        assert_eq!(s.end(), 1000);
        assert_eq!(s.len(), 400);
        assert!(!s.is_empty());
    }
}
