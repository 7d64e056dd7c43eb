use serde::Serialize;

/// Outcome of a stationarity test. Undefined statistics mean the test could not run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct StationarityResult {
    pub statistic: Option<f64>,
    pub p_value: Option<f64>,
    pub used_lag: Option<usize>,
    pub is_stationary: bool,
}

impl StationarityResult {
    /// Result used when the test cannot be trusted: never tradeable.
    pub fn neutral() -> Self {
        Self {
            statistic: None,
            p_value: None,
            used_lag: None,
            is_stationary: false,
        }
    }
}

impl Default for StationarityResult {
    fn default() -> Self {
        Self::neutral()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatisticsSnapshot {
    pub timestamp_ms: u64,
    pub z_score: Option<f64>,
    pub spread: f64,
    pub correlation: Option<f64>,
    pub hedge_ratio: f64,
    pub stationarity: StationarityResult,
    pub points_collected: usize,
}
