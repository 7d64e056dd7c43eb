/// Trade stream connection state, as seen by the feed client.
#[derive(Debug, Clone, PartialEq)]
pub enum WsConnectionStatus {
    Connected,
    Disconnected,
    Reconnecting { attempt: u32, delay_ms: u64 },
}

/// Transport-side notifications consumed by the main loop.
#[derive(Debug, Clone)]
pub enum AppEvent {
    WsStatus(WsConnectionStatus),
    TickDropped,
    LogMessage(String),
}
