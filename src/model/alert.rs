use std::fmt;

use serde::Serialize;

use super::signal::AlertSignal;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertReason {
    /// Spread stretched above its mean; short the spread.
    Overbought,
    /// Spread stretched below its mean; long the spread.
    Oversold,
}

impl fmt::Display for AlertReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AlertReason::Overbought => f.write_str("overbought"),
            AlertReason::Oversold => f.write_str("oversold"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Alert {
    pub timestamp_ms: u64,
    pub signal: AlertSignal,
    pub z_score: f64,
    pub correlation: f64,
    pub reason: AlertReason,
    /// Human readable summary, e.g. `z-score 2.50 >= 2.00 [overbought]`.
    pub message: String,
}
