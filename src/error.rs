use thiserror::Error;

/// Transport failures that trigger a reconnect.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("WebSocket error: {0}")]
    WebSocket(String),

    #[error("WebSocket stream ended")]
    StreamEnded,
}

/// Reasons a statistic cannot be computed. Callers on the tick path map these to "undefined".
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AnalyticsError {
    #[error("series length mismatch: {left} vs {right}")]
    LengthMismatch { left: usize, right: usize },

    #[error("insufficient data: need {required}, got {actual}")]
    InsufficientData { required: usize, actual: usize },

    #[error("series contains non-finite values")]
    NonFinite,

    #[error("degenerate variance")]
    Degenerate,

    #[error("window must be greater than 1, got {0}")]
    InvalidWindow(usize),

    #[error("singular regression matrix")]
    Singular,
}
