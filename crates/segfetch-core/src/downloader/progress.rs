//! Progress aggregation across segment workers.
//!
//! The counter is the only state mutated by more than one worker. The lock is
//! held for increment-and-report only, never across socket I/O.

use std::sync::Mutex;

/// One observation, emitted when a segment finishes (success or failure).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressEvent {
    pub segment_id: u32,
    /// Bytes this segment received before finishing.
    pub bytes_so_far: usize,
    /// Segments finished so far, including this one.
    pub completed: usize,
    /// Total segments in the plan.
    pub total: usize,
    pub succeeded: bool,
}

impl ProgressEvent {
    /// Fraction of segments finished, in [0.0, 1.0].
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            return 1.0;
        }
        (self.completed as f64 / self.total as f64).min(1.0)
    }

    /// Integer percentage `100 * completed / total`.
    pub fn percent(&self) -> usize {
        if self.total == 0 {
            return 100;
        }
        100 * self.completed / self.total
    }
}

/// Lock-guarded completion counter shared by handle with every worker.
#[derive(Debug)]
pub struct ProgressCounter {
    completed: Mutex<usize>,
    total: usize,
    events: Option<tokio::sync::mpsc::Sender<ProgressEvent>>,
}

impl ProgressCounter {
    pub fn new(total: usize, events: Option<tokio::sync::mpsc::Sender<ProgressEvent>>) -> Self {
        Self {
            completed: Mutex::new(0),
            total,
            events,
        }
    }

    /// Records one finished segment and emits an observation. Returns the event.
    /// The channel send is `try_send`: a slow or closed consumer drops
    /// observations but never loses a count.
    pub fn record(&self, segment_id: u32, bytes_so_far: usize, succeeded: bool) -> ProgressEvent {
        let mut completed = self
            .completed
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *completed += 1;
        let event = ProgressEvent {
            segment_id,
            bytes_so_far,
            completed: *completed,
            total: self.total,
            succeeded,
        };
        tracing::debug!(
            segment_id,
            completed = event.completed,
            total = event.total,
            percent = event.percent(),
            succeeded,
            "segment finished"
        );
        if let Some(tx) = &self.events {
            let _ = tx.try_send(event.clone());
        }
        event
    }

    pub fn completed(&self) -> usize {
        *self
            .completed
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn total(&self) -> usize {
        self.total
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn record_increments_and_reports_percent() {
        let counter = ProgressCounter::new(2, None);
        let first = counter.record(1, 400, true);
        assert_eq!(first.completed, 1);
        assert_eq!(first.percent(), 50);
        let second = counter.record(0, 600, true);
        assert_eq!(second.completed, 2);
        assert_eq!(second.percent(), 100);
        assert!((second.fraction() - 1.0).abs() < 1e-9);
        assert_eq!(counter.completed(), 2);
    }

    #[test]
    fn failures_count_as_completions() {
        let counter = ProgressCounter::new(3, None);
        counter.record(0, 10, true);
        let ev = counter.record(1, 0, false);
        assert!(!ev.succeeded);
        assert_eq!(ev.completed, 2);
        assert_eq!(ev.percent(), 66);
    }

    #[test]
    fn concurrent_records_never_lose_updates() {
        const N: usize = 256;
        let counter = Arc::new(ProgressCounter::new(N, None));
        let handles: Vec<_> = (0..N)
            .map(|i| {
                let c = Arc::clone(&counter);
                std::thread::spawn(move || {
                    c.record(i as u32, i, i % 7 != 0);
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(counter.completed(), N);
    }

    #[test]
    fn events_are_sent_to_channel() {
        let (tx, mut rx) = tokio::sync::mpsc::channel(4);
        let counter = ProgressCounter::new(2, Some(tx));
        counter.record(0, 5, true);
        counter.record(1, 7, false);
        let a = rx.try_recv().unwrap();
        let b = rx.try_recv().unwrap();
        assert_eq!((a.segment_id, a.completed), (0, 1));
        assert_eq!((b.segment_id, b.completed, b.succeeded), (1, 2, false));
    }

    #[test]
    fn full_channel_does_not_block_or_lose_count() {
        let (tx, _rx) = tokio::sync::mpsc::channel(1);
        let counter = ProgressCounter::new(3, Some(tx));
        for i in 0..3 {
            counter.record(i, 1, true);
        }
        assert_eq!(counter.completed(), 3);
    }

    #[test]
    fn empty_plan_is_complete() {
        let ev = ProgressEvent {
            segment_id: 0,
            bytes_so_far: 0,
            completed: 0,
            total: 0,
            succeeded: true,
        };
        assert_eq!(ev.percent(), 100);
        assert!((ev.fraction() - 1.0).abs() < 1e-9);
    }
}
