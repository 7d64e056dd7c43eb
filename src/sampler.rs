use std::collections::HashMap;

use crate::model::bar::{period_start_ms, timeframe_label, Bar, MAX_TIMEFRAME_SECS};
use crate::model::tick::Tick;

/// Aggregates ticks into wall-clock aligned OHLCV bars for every (symbol, timeframe).
///
/// At most one bar is active per key. Bars close when the wall clock passes
/// their end, checked on every tick and on explicit [`BarSampler::sweep`] calls.
#[derive(Debug)]
pub struct BarSampler {
    timeframes: Vec<u64>,
    active: HashMap<(String, u64), Bar>,
    late_drops: u64,
}

impl BarSampler {
    pub fn new(timeframes: &[u64]) -> Self {
        assert!(!timeframes.is_empty(), "at least one timeframe is required");
        assert!(
            timeframes.iter().all(|tf| *tf > 0 && *tf <= MAX_TIMEFRAME_SECS),
            "timeframes must be between 1 and {} seconds",
            MAX_TIMEFRAME_SECS
        );
        let mut timeframes = timeframes.to_vec();
        timeframes.sort_unstable();
        timeframes.dedup();
        Self {
            timeframes,
            active: HashMap::new(),
            late_drops: 0,
        }
    }

    pub fn timeframes(&self) -> &[u64] {
        &self.timeframes
    }

    pub fn active_bar(&self, symbol: &str, timeframe_secs: u64) -> Option<&Bar> {
        self.active.get(&(symbol.to_string(), timeframe_secs))
    }

    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    /// Number of (tick, timeframe) pairs rejected because the period had already ended.
    pub fn late_drops(&self) -> u64 {
        self.late_drops
    }

    /// Finalize every active bar whose end is strictly before `now_ms`.
    pub fn sweep(&mut self, now_ms: u64) -> Vec<Bar> {
        let expired: Vec<(String, u64)> = self
            .active
            .iter()
            .filter(|(_, bar)| bar.end_ms < now_ms)
            .map(|(key, _)| key.clone())
            .collect();

        let mut closed: Vec<Bar> = expired
            .into_iter()
            .filter_map(|key| self.active.remove(&key))
            .filter_map(finalize)
            .collect();
        closed.sort_by(|a, b| {
            a.start_ms
                .cmp(&b.start_ms)
                .then(a.timeframe_secs.cmp(&b.timeframe_secs))
                .then_with(|| a.symbol.cmp(&b.symbol))
        });
        closed
    }

    /// Sweep, then fold `tick` into each timeframe. Returns bars finalized on the way.
    pub fn on_tick(&mut self, tick: &Tick, now_ms: u64) -> Vec<Bar> {
        let mut closed = self.sweep(now_ms);
        if !tick.is_valid() {
            tracing::debug!(symbol = %tick.symbol, price = tick.price, "Sampler ignoring invalid tick");
            return closed;
        }

        for &tf in &self.timeframes {
            let start_ms = period_start_ms(tick.timestamp_ms, tf);
            let end_ms = start_ms + tf * 1_000;

            if end_ms < now_ms {
                self.late_drops += 1;
                tracing::debug!(
                    symbol = %tick.symbol,
                    timeframe = %timeframe_label(tf),
                    tick_ms = tick.timestamp_ms,
                    now_ms,
                    "Dropping late tick"
                );
                continue;
            }

            let key = (tick.symbol.clone(), tf);
            match self.active.get_mut(&key) {
                Some(bar) if bar.start_ms == start_ms => bar.update(tick.price, tick.qty),
                Some(bar) => {
                    let fresh = Bar::open_at(&tick.symbol, tf, tick.timestamp_ms, tick.price, tick.qty);
                    let stale = std::mem::replace(bar, fresh);
                    closed.extend(finalize(stale));
                }
                None => {
                    self.active.insert(
                        key,
                        Bar::open_at(&tick.symbol, tf, tick.timestamp_ms, tick.price, tick.qty),
                    );
                }
            }
        }
        closed
    }
}

fn finalize(bar: Bar) -> Option<Bar> {
    if !bar.is_emittable() {
        tracing::debug!(
            symbol = %bar.symbol,
            timeframe = %timeframe_label(bar.timeframe_secs),
            "Discarding empty bar"
        );
        return None;
    }
    tracing::info!(
        timeframe = %timeframe_label(bar.timeframe_secs),
        symbol = %bar.symbol,
        start = %bar.start_time().to_rfc3339(),
        open = bar.open,
        high = bar.high,
        low = bar.low,
        close = bar.close,
        volume = bar.volume,
        trades = bar.trade_count,
        "Bar closed"
    );
    Some(bar)
}
