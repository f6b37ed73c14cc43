//! Simulated session clock.

use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicI64, Ordering};

/// Millisecond clock decoupled from wall time.
///
/// Moves only through [`SimClock::advance_to`], and never backwards.
#[derive(Debug)]
pub struct SimClock {
    now_ms: AtomicI64,
}

impl SimClock {
    pub fn new(start_ms: i64) -> Self {
        Self {
            now_ms: AtomicI64::new(start_ms),
        }
    }

    pub fn now_ms(&self) -> i64 {
        self.now_ms.load(Ordering::SeqCst)
    }

    pub fn now(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(self.now_ms())
            .unwrap_or_else(|| DateTime::from_timestamp(0, 0).unwrap())
    }

    /// Advance to `ms` if it is ahead of the current time.
    pub fn advance_to(&self, ms: i64) {
        self.now_ms.fetch_max(ms, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clock_never_rewinds() {
        let clock = SimClock::new(1000);
        clock.advance_to(5000);
        assert_eq!(clock.now_ms(), 5000);
        clock.advance_to(2000);
        assert_eq!(clock.now_ms(), 5000);
    }
}
