use chrono::{DateTime, Utc};
use serde::Serialize;

use super::tick::ms_to_utc;

/// OHLCV bar aligned to a wall-clock multiple of its timeframe.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Bar {
    pub symbol: String,
    pub timeframe_secs: u64,
    pub start_ms: u64,
    pub end_ms: u64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    pub trade_count: u64,
}

/// Longest supported timeframe (one day).
pub const MAX_TIMEFRAME_SECS: u64 = 86_400;

/// Floor `timestamp_ms` to the start of its `timeframe_secs` bucket.
pub fn period_start_ms(timestamp_ms: u64, timeframe_secs: u64) -> u64 {
    assert!(timeframe_secs > 0, "timeframe_secs must be > 0");
    let interval_ms = timeframe_secs * 1_000;
    timestamp_ms - (timestamp_ms % interval_ms)
}

impl Bar {
    /// Start a new bar from its first trade. The bucket is aligned to the timeframe.
    pub fn open_at(
        symbol: &str,
        timeframe_secs: u64,
        timestamp_ms: u64,
        price: f64,
        qty: f64,
    ) -> Self {
        let start_ms = period_start_ms(timestamp_ms, timeframe_secs);
        Self {
            symbol: symbol.to_string(),
            timeframe_secs,
            start_ms,
            end_ms: start_ms + timeframe_secs * 1_000,
            open: price,
            high: price,
            low: price,
            close: price,
            volume: qty,
            trade_count: 1,
        }
    }

    /// Fold another trade of the same period into the bar.
    pub fn update(&mut self, price: f64, qty: f64) {
        self.high = self.high.max(price);
        self.low = self.low.min(price);
        self.close = price;
        self.volume += qty;
        self.trade_count += 1;
    }

    pub fn contains(&self, timestamp_ms: u64) -> bool {
        timestamp_ms >= self.start_ms && timestamp_ms < self.end_ms
    }

    /// Empty or corrupt bars are dropped instead of emitted.
    pub fn is_emittable(&self) -> bool {
        self.volume > 0.0 && self.close > 0.0
    }

    pub fn start_time(&self) -> DateTime<Utc> {
        ms_to_utc(self.start_ms)
    }

    pub fn end_time(&self) -> DateTime<Utc> {
        ms_to_utc(self.end_ms)
    }

    pub fn is_bullish(&self) -> bool {
        self.close >= self.open
    }
}

/// Short label used in logs, e.g. `1S`, `1M`, `5M`.
pub fn timeframe_label(timeframe_secs: u64) -> String {
    if timeframe_secs >= 60 && timeframe_secs % 60 == 0 {
        format!("{}M", timeframe_secs / 60)
    } else {
        format!("{}S", timeframe_secs)
    }
}
