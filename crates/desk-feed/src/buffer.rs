//! Append-only raw sample buffer.

use desk_core::PriceSample;
use std::collections::VecDeque;

/// Samples received for one feed since its subscription started.
///
/// Indices are absolute over the lifetime of the feed: trimming a consumed
/// prefix never invalidates an index held by a cursor. Samples are assumed
/// to arrive with non-decreasing timestamps.
#[derive(Debug, Default)]
pub struct RawFeedBuffer {
    /// Absolute index of `samples[0]`
    base: u64,
    samples: VecDeque<PriceSample>,
}

impl RawFeedBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one sample.
    pub fn push(&mut self, sample: PriceSample) {
        self.samples.push_back(sample);
    }

    /// Absolute index of the first retained sample.
    pub fn base(&self) -> u64 {
        self.base
    }

    /// Absolute index one past the last sample.
    pub fn end(&self) -> u64 {
        self.base + self.samples.len() as u64
    }

    /// Number of samples currently retained.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Timestamp of the most recent sample.
    pub fn latest_ts(&self) -> Option<i64> {
        self.samples.back().map(|s| s.timestamp_ms)
    }

    /// Iterate samples starting at absolute index `from`.
    pub fn iter_from(&self, from: u64) -> impl Iterator<Item = (u64, &PriceSample)> {
        let skip = from.saturating_sub(self.base) as usize;
        self.samples
            .iter()
            .enumerate()
            .skip(skip)
            .map(move |(i, s)| (self.base + i as u64, s))
    }

    /// Absolute index of the first sample with `timestamp_ms >= ts`.
    pub fn index_at_or_after(&self, ts: i64) -> u64 {
        let offset = self
            .samples
            .iter()
            .position(|s| s.timestamp_ms >= ts)
            .unwrap_or(self.samples.len());
        self.base + offset as u64
    }

    /// Drop every sample below absolute index `upto`.
    pub fn trim_to(&mut self, upto: u64) {
        while self.base < upto && !self.samples.is_empty() {
            self.samples.pop_front();
            self.base += 1;
        }
    }
}
