//! Per-connection bandwidth pacing.
//!
//! After each chunk is written the handler sleeps `n / rate` seconds. This only
//! looks at bytes already sent; it does not react to congestion, and separate
//! connections do not coordinate, so aggregate bandwidth grows with the number
//! of concurrent clients.

use std::time::Duration;

/// Sleep-after-write governor for one connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Throttle {
    bytes_per_sec: Option<u64>,
}

impl Throttle {
    /// `None` or `Some(0)` disables pacing.
    pub fn new(bytes_per_sec: Option<u64>) -> Self {
        Self {
            bytes_per_sec: bytes_per_sec.filter(|&r| r > 0),
        }
    }

    pub fn unlimited() -> Self {
        Self::default()
    }

    pub fn is_enabled(&self) -> bool {
        self.bytes_per_sec.is_some()
    }

    pub fn bytes_per_sec(&self) -> Option<u64> {
        self.bytes_per_sec
    }

    /// Delay owed after transmitting `n` bytes (None when pacing is off or n is 0).
    pub fn delay_for(&self, n: usize) -> Option<Duration> {
        let rate = self.bytes_per_sec?;
        if n == 0 {
            return None;
        }
        let micros = (n as u128 * 1_000_000) / rate as u128;
        Some(Duration::from_micros(micros.min(u64::MAX as u128) as u64))
    }

    /// Blocks the calling thread for the delay owed after `n` bytes.
    pub fn pace(&self, n: usize) {
        if let Some(d) = self.delay_for(n) {
            if !d.is_zero() {
                std::thread::sleep(d);
            }
        }
    }
}
