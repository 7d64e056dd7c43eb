use crate::config::AlertConfig;
use crate::model::alert::{Alert, AlertReason};
use crate::model::signal::AlertSignal;
use crate::model::snapshot::StationarityResult;

/// Hysteresis-gated signal state for one pair.
///
/// Entries fire an [`Alert`] once; the state then holds until `|z|` falls
/// back inside the reset band, which clears it silently. Thresholds are
/// passed on every call so a config swap takes effect on the next tick.
#[derive(Debug, Default)]
pub struct AlertEngine {
    state: AlertSignal,
}

impl AlertEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> AlertSignal {
        self.state
    }

    pub fn evaluate(
        &mut self,
        z_score: Option<f64>,
        correlation: Option<f64>,
        stationarity: Option<&StationarityResult>,
        timestamp_ms: u64,
        config: &AlertConfig,
    ) -> Option<Alert> {
        let z = z_score.filter(|v| v.is_finite())?;
        let corr = correlation.filter(|v| v.is_finite())?;
        let stationarity = stationarity?;

        if self.state.is_active() {
            if z.abs() < config.reset_threshold {
                tracing::debug!(previous = %self.state, z_score = z, "Signal reset");
                self.state = AlertSignal::None;
            }
            return None;
        }

        if corr < config.min_correlation || !stationarity.is_stationary {
            return None;
        }

        let (signal, reason, message) = if z >= config.entry_threshold {
            (
                AlertSignal::Short,
                AlertReason::Overbought,
                format!("z-score {:.2} >= {:.2} [overbought]", z, config.entry_threshold),
            )
        } else if z <= -config.entry_threshold {
            (
                AlertSignal::Long,
                AlertReason::Oversold,
                format!("z-score {:.2} <= -{:.2} [oversold]", z, config.entry_threshold),
            )
        } else {
            return None;
        };

        self.state = signal;
        Some(Alert {
            timestamp_ms,
            signal,
            z_score: z,
            correlation: corr,
            reason,
            message,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stationary() -> StationarityResult {
        StationarityResult {
            statistic: Some(-4.0),
            p_value: Some(0.01),
            used_lag: Some(0),
            is_stationary: true,
        }
    }

    #[test]
    fn undefined_inputs_do_not_reset_state() {
        let cfg = AlertConfig::default();
        let st = stationary();
        let mut engine = AlertEngine::new();
        assert!(engine.evaluate(Some(2.5), Some(0.9), Some(&st), 1, &cfg).is_some());

        assert!(engine.evaluate(Some(0.0), None, Some(&st), 2, &cfg).is_none());
        assert_eq!(engine.state(), AlertSignal::Short);
        assert!(engine.evaluate(Some(f64::NAN), Some(0.9), Some(&st), 3, &cfg).is_none());
        assert_eq!(engine.state(), AlertSignal::Short);
    }

    #[test]
    fn threshold_is_inclusive() {
        let cfg = AlertConfig::default();
        let st = stationary();
        let mut engine = AlertEngine::new();
        let alert = engine
            .evaluate(Some(-2.0), Some(0.7), Some(&st), 1, &cfg)
            .expect("boundary should trigger");
        assert_eq!(alert.signal, AlertSignal::Long);
        assert_eq!(alert.reason, AlertReason::Oversold);
    }
}
