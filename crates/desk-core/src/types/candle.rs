//! Candlestick and aggregation interval types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::PriceSample;

/// Aggregated open/high/low/close/volume for one time bucket.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    /// Bucket start, Unix milliseconds
    pub start_ms: i64,
    /// First price in the bucket
    pub open: f64,
    /// Highest price
    pub high: f64,
    /// Lowest price
    pub low: f64,
    /// Last price in the bucket
    pub close: f64,
    /// Total size traded
    pub volume: f64,
}

impl Candle {
    pub fn new(start_ms: i64, open: f64, high: f64, low: f64, close: f64, volume: f64) -> Self {
        Self {
            start_ms,
            open,
            high,
            low,
            close,
            volume,
        }
    }

    /// Seed a candle from the first sample of its bucket.
    pub fn from_sample(start_ms: i64, sample: &PriceSample) -> Self {
        Self {
            start_ms,
            open: sample.price,
            high: sample.price,
            low: sample.price,
            close: sample.price,
            volume: sample.size,
        }
    }

    /// Fold a later sample of the same bucket into the candle.
    pub fn absorb(&mut self, sample: &PriceSample) {
        self.high = self.high.max(sample.price);
        self.low = self.low.min(sample.price);
        self.close = sample.price;
        self.volume += sample.size;
    }

    /// High-low range.
    #[inline]
    pub fn range(&self) -> f64 {
        self.high - self.low
    }

    /// Check if the candle closed above its open.
    #[inline]
    pub fn is_bullish(&self) -> bool {
        self.close > self.open
    }

    /// Bucket start as a DateTime.
    pub fn datetime(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(self.start_ms)
            .unwrap_or_else(|| DateTime::from_timestamp(0, 0).unwrap())
    }
}

/// Unit of an aggregation interval.
///
/// `Tick` is special: raw samples pass through one-for-one without any
/// bucketing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IntervalUnit {
    Tick,
    Second,
    Minute,
    Hour,
    Day,
}

impl IntervalUnit {
    /// Seconds per unit. Zero for `Tick`.
    pub fn as_secs(&self) -> u64 {
        match self {
            IntervalUnit::Tick => 0,
            IntervalUnit::Second => 1,
            IntervalUnit::Minute => 60,
            IntervalUnit::Hour => 3600,
            IntervalUnit::Day => 86400,
        }
    }
}

impl fmt::Display for IntervalUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            IntervalUnit::Tick => "tick",
            IntervalUnit::Second => "s",
            IntervalUnit::Minute => "m",
            IntervalUnit::Hour => "h",
            IntervalUnit::Day => "d",
        };
        write!(f, "{}", s)
    }
}

/// A consumer-chosen aggregation interval: `length` x `unit`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BarInterval {
    pub length: u32,
    pub unit: IntervalUnit,
}

impl BarInterval {
    pub fn of(length: u32, unit: IntervalUnit) -> Self {
        Self { length, unit }
    }

    /// Raw passthrough interval.
    pub fn tick() -> Self {
        Self {
            length: 1,
            unit: IntervalUnit::Tick,
        }
    }

    pub fn is_tick(&self) -> bool {
        self.unit == IntervalUnit::Tick
    }

    /// Bucket width in milliseconds. Zero for tick intervals.
    pub fn width_ms(&self) -> i64 {
        self.unit.as_secs() as i64 * self.length as i64 * 1000
    }
}

impl fmt::Display for BarInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_tick() {
            write!(f, "tick")
        } else {
            write!(f, "{}{}", self.length, self.unit)
        }
    }
}

impl FromStr for BarInterval {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_lowercase();
        if s == "tick" {
            return Ok(BarInterval::tick());
        }
        let split = s
            .find(|c: char| !c.is_ascii_digit())
            .ok_or_else(|| format!("Invalid interval: {}", s))?;
        let (num, unit) = s.split_at(split);
        let length: u32 = num.parse().map_err(|_| format!("Invalid interval: {}", s))?;
        if length == 0 {
            return Err(format!("Invalid interval: {}", s));
        }
        let unit = match unit {
            "s" | "sec" => IntervalUnit::Second,
            "m" | "min" => IntervalUnit::Minute,
            "h" | "hour" => IntervalUnit::Hour,
            "d" | "day" => IntervalUnit::Day,
            _ => return Err(format!("Invalid interval unit: {}", unit)),
        };
        Ok(BarInterval::of(length, unit))
    }
}
