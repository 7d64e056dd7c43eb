use serde::Deserialize;

use crate::model::tick::Tick;

/// Deserialize Binance string-encoded numbers to f64.
pub fn string_to_f64<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    s.parse::<f64>().map_err(serde::de::Error::custom)
}

/// Binance trade stream event (symbol@trade).
#[derive(Debug, Deserialize)]
pub struct BinanceTradeEvent {
    #[serde(rename = "e")]
    pub event_type: String,
    #[serde(rename = "E")]
    pub event_time: u64,
    #[serde(rename = "T")]
    pub trade_time: u64,
    #[serde(rename = "s")]
    pub symbol: String,
    #[serde(rename = "p", deserialize_with = "string_to_f64")]
    pub price: f64,
    #[serde(rename = "q", deserialize_with = "string_to_f64")]
    pub qty: f64,
}

/// Envelope used by the combined `/stream?streams=...` endpoint.
#[derive(Debug, Deserialize)]
pub struct CombinedStreamMessage {
    pub stream: String,
    pub data: BinanceTradeEvent,
}

impl BinanceTradeEvent {
    /// Tick stamped with the local receipt time.
    ///
    /// Bars close on the local clock, so the exchange `trade_time` would make
    /// every trade in the last few network milliseconds of a period late.
    pub fn into_tick(self, received_ms: u64) -> Tick {
        Tick {
            symbol: self.symbol.to_ascii_uppercase(),
            price: self.price,
            qty: self.qty,
            timestamp_ms: received_ms,
        }
    }
}

/// Parse either a combined-stream envelope or a bare trade event.
pub fn parse_trade_message(text: &str) -> Result<BinanceTradeEvent, serde_json::Error> {
    match serde_json::from_str::<CombinedStreamMessage>(text) {
        Ok(msg) => Ok(msg.data),
        Err(_) => serde_json::from_str::<BinanceTradeEvent>(text),
    }
}
