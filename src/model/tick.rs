use chrono::{DateTime, TimeZone, Utc};

#[derive(Debug, Clone, PartialEq)]
pub struct Tick {
    pub symbol: String,
    pub price: f64,
    pub qty: f64,
    /// Trade time in UTC epoch milliseconds.
    pub timestamp_ms: u64,
}

impl Tick {
    pub fn new(symbol: impl Into<String>, price: f64, qty: f64, timestamp_ms: u64) -> Self {
        Self {
            symbol: symbol.into(),
            price,
            qty,
            timestamp_ms,
        }
    }

    /// A tick is admissible when its price is positive and both numbers are finite.
    pub fn is_valid(&self) -> bool {
        self.price.is_finite() && self.price > 0.0 && self.qty.is_finite() && self.qty >= 0.0
    }

    pub fn time(&self) -> DateTime<Utc> {
        ms_to_utc(self.timestamp_ms)
    }
}

/// Current wall clock in UTC epoch milliseconds.
pub fn now_ms() -> u64 {
    Utc::now().timestamp_millis().max(0) as u64
}

pub fn ms_to_utc(ms: u64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(ms as i64)
        .single()
        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
}
