//! In-memory historical dataset.

use desk_core::{Candle, FeedKey};
use std::collections::HashMap;

/// Historical bars per instrument at one base bar width.
///
/// How bars get here (CSV, database) is a collaborator's concern; the
/// simulator only replays what it is given.
#[derive(Debug, Clone)]
pub struct HistoricalData {
    bar_width_ms: i64,
    series: HashMap<FeedKey, Vec<Candle>>,
}

impl HistoricalData {
    pub fn new(bar_width_ms: i64) -> Self {
        Self {
            bar_width_ms,
            series: HashMap::new(),
        }
    }

    /// Width of every bar in the dataset, in milliseconds.
    pub fn bar_width_ms(&self) -> i64 {
        self.bar_width_ms
    }

    /// Add (or replace) the series for one instrument. Bars are kept in
    /// chronological order.
    pub fn add_series(mut self, key: FeedKey, mut bars: Vec<Candle>) -> Self {
        bars.sort_by_key(|b| b.start_ms);
        self.series.insert(key, bars);
        self
    }

    pub fn series(&self, key: &FeedKey) -> Option<&[Candle]> {
        self.series.get(key).map(|v| v.as_slice())
    }

    pub fn contains(&self, key: &FeedKey) -> bool {
        self.series.contains_key(key)
    }

    /// Start of the earliest bar across all series.
    pub fn earliest_start_ms(&self) -> Option<i64> {
        self.series
            .values()
            .filter_map(|bars| bars.first())
            .map(|b| b.start_ms)
            .min()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_series_are_sorted_on_insert() {
        let key = FeedKey::stock("AAPL");
        let data = HistoricalData::new(60_000).add_series(
            key.clone(),
            vec![
                Candle::new(120_000, 2.0, 2.0, 2.0, 2.0, 1.0),
                Candle::new(0, 1.0, 1.0, 1.0, 1.0, 1.0),
            ],
        );
        let bars = data.series(&key).unwrap();
        assert_eq!(bars[0].start_ms, 0);
        assert_eq!(data.earliest_start_ms(), Some(0));
    }
}
