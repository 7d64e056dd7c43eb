use serde::Serialize;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, watch};

use crate::alert_engine::AlertEngine;
use crate::analytics::{adf_test, hedge_ratio, latest_correlation, latest_zscore, spread_point};
use crate::config::{AlertConfig, AnalyticsConfig, HedgeRatioMode};
use crate::indicator::FixedWindow;
use crate::model::alert::Alert;
use crate::model::bar::Bar;
use crate::model::signal::AlertSignal;
use crate::model::snapshot::{StationarityResult, StatisticsSnapshot};
use crate::model::tick::Tick;
use crate::sampler::BarSampler;

/// Static settings for one monitored pair.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub symbol_x: String,
    pub symbol_y: String,
    pub timeframes: Vec<u64>,
    pub analytics: AnalyticsConfig,
}

/// Read model published after every evaluated tick. Readers only ever see whole values.
#[derive(Debug, Clone, Default, Serialize)]
pub struct AnalyticsView {
    pub latest: Option<StatisticsSnapshot>,
    pub history: Vec<StatisticsSnapshot>,
    pub latest_alert: Option<Alert>,
    pub signal: AlertSignal,
    pub points_collected: usize,
    pub window_size: usize,
}

/// Receiving side of the pipeline's side channels.
pub struct PipelineOutputs {
    pub bars: mpsc::Receiver<Bar>,
    pub alerts: mpsc::Receiver<Alert>,
    pub view: watch::Receiver<AnalyticsView>,
}

/// Everything produced while handling one tick.
#[derive(Debug, Default)]
pub struct TickOutcome {
    pub bars: Vec<Bar>,
    pub snapshot: Option<StatisticsSnapshot>,
    pub alert: Option<Alert>,
}

/// Mutable analytical context of one pair, touched only by the ingestion path.
#[derive(Debug)]
struct PairState {
    prices_x: FixedWindow<f64>,
    prices_y: FixedWindow<f64>,
    spreads: FixedWindow<f64>,
    history: FixedWindow<StatisticsSnapshot>,
    alert_engine: AlertEngine,
    hedge_ratio: Option<f64>,
    ticks_since_calibration: u64,
    spreads_since_stationarity: usize,
    stationarity: Option<StationarityResult>,
    latest_alert: Option<Alert>,
}

impl PairState {
    fn new(analytics: &AnalyticsConfig) -> Self {
        Self {
            prices_x: FixedWindow::new(analytics.price_window),
            prices_y: FixedWindow::new(analytics.price_window),
            spreads: FixedWindow::new(analytics.spread_window),
            history: FixedWindow::new(analytics.price_window),
            alert_engine: AlertEngine::new(),
            hedge_ratio: None,
            ticks_since_calibration: 0,
            spreads_since_stationarity: 0,
            stationarity: None,
            latest_alert: None,
        }
    }
}

struct Publisher {
    bars: mpsc::Sender<Bar>,
    alerts: mpsc::Sender<Alert>,
    view: watch::Sender<AnalyticsView>,
}

fn forward<T>(tx: &mpsc::Sender<T>, value: T, what: &'static str) {
    match tx.try_send(value) {
        Ok(()) => {}
        Err(TrySendError::Full(_)) => {
            tracing::warn!(channel = what, "Output channel full, dropping value");
        }
        Err(TrySendError::Closed(_)) => {
            tracing::trace!(channel = what, "Output channel closed");
        }
    }
}

/// Drives sampler, statistics and alert state for one pair, one event at a time.
pub struct Pipeline {
    settings: PipelineSettings,
    alert_config: watch::Receiver<AlertConfig>,
    sampler: BarSampler,
    state: PairState,
    publisher: Publisher,
}

impl Pipeline {
    pub fn new(
        settings: PipelineSettings,
        alert_config: watch::Receiver<AlertConfig>,
        channel_capacity: usize,
    ) -> (Self, PipelineOutputs) {
        let (bars_tx, bars_rx) = mpsc::channel(channel_capacity.max(1));
        let (alerts_tx, alerts_rx) = mpsc::channel(channel_capacity.max(1));
        let (view_tx, view_rx) = watch::channel(AnalyticsView {
            window_size: settings.analytics.spread_window,
            ..AnalyticsView::default()
        });

        let pipeline = Self {
            sampler: BarSampler::new(&settings.timeframes),
            state: PairState::new(&settings.analytics),
            alert_config,
            settings,
            publisher: Publisher {
                bars: bars_tx,
                alerts: alerts_tx,
                view: view_tx,
            },
        };
        let outputs = PipelineOutputs {
            bars: bars_rx,
            alerts: alerts_rx,
            view: view_rx,
        };
        (pipeline, outputs)
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    pub fn sampler(&self) -> &BarSampler {
        &self.sampler
    }

    pub fn signal(&self) -> AlertSignal {
        self.state.alert_engine.state()
    }

    pub fn hedge_ratio(&self) -> Option<f64> {
        self.state.hedge_ratio
    }

    pub fn stationarity(&self) -> Option<StationarityResult> {
        self.state.stationarity
    }

    pub fn spread_count(&self) -> usize {
        self.state.spreads.size()
    }

    /// Timer-driven bar closure for idle periods.
    pub fn on_timer(&mut self, now_ms: u64) -> Vec<Bar> {
        let bars = self.sampler.sweep(now_ms);
        self.publish_bars(&bars);
        bars
    }

    /// Re-run the stationarity test over the current spread window.
    pub fn refresh_stationarity(&mut self) -> StationarityResult {
        let result = adf_test(
            &self.state.spreads.values(),
            self.settings.analytics.significance,
        );
        tracing::debug!(
            statistic = ?result.statistic,
            p_value = ?result.p_value,
            stationary = result.is_stationary,
            points = self.state.spreads.size(),
            "Stationarity refreshed"
        );
        self.state.stationarity = Some(result);
        self.state.spreads_since_stationarity = 0;
        result
    }

    pub fn on_tick(&mut self, tick: &Tick, now_ms: u64) -> TickOutcome {
        let bars = self.sampler.on_tick(tick, now_ms);
        self.publish_bars(&bars);
        let mut outcome = TickOutcome {
            bars,
            ..TickOutcome::default()
        };

        if !tick.is_valid() {
            return outcome;
        }
        if tick.symbol == self.settings.symbol_x {
            self.state.prices_x.push(tick.price);
        } else if tick.symbol == self.settings.symbol_y {
            self.state.prices_y.push(tick.price);
        } else {
            tracing::trace!(symbol = %tick.symbol, "Tick for symbol outside the pair");
            return outcome;
        }
        self.state.ticks_since_calibration += 1;

        if self.state.prices_x.size() < 2 || self.state.prices_y.size() < 2 {
            return outcome;
        }
        let Some(beta) = self.hedge_ratio_for_tick() else {
            tracing::debug!("Hedge ratio undefined, skipping spread update");
            return outcome;
        };

        let (Some(&x), Some(&y)) = (self.state.prices_x.latest(), self.state.prices_y.latest())
        else {
            return outcome;
        };
        let spread = spread_point(x, y, beta);
        if !spread.is_finite() {
            return outcome;
        }
        self.state.spreads.push(spread);
        self.state.spreads_since_stationarity += 1;

        let analytics = &self.settings.analytics;
        let z_score = latest_zscore(&self.state.spreads.values(), analytics.zscore_window);
        let correlation = latest_correlation(
            &self.state.prices_x.values(),
            &self.state.prices_y.values(),
            analytics.correlation_window,
            analytics.min_correlation_samples,
        );

        if self.state.spreads.size() < analytics.min_spread_points {
            return outcome;
        }
        if self.state.stationarity.is_none()
            || self.state.spreads_since_stationarity >= analytics.stationarity_every
        {
            self.refresh_stationarity();
        }

        let alert_config = *self.alert_config.borrow();
        let alert = self.state.alert_engine.evaluate(
            z_score,
            correlation,
            self.state.stationarity.as_ref(),
            tick.timestamp_ms,
            &alert_config,
        );

        let snapshot = StatisticsSnapshot {
            timestamp_ms: tick.timestamp_ms,
            z_score,
            spread,
            correlation,
            hedge_ratio: beta,
            stationarity: self.state.stationarity.unwrap_or_default(),
            points_collected: self.state.spreads.size(),
        };
        self.state.history.push(snapshot.clone());

        if let Some(alert) = &alert {
            tracing::debug!(
                signal = %alert.signal,
                z_score = alert.z_score,
                correlation = alert.correlation,
                reason = %alert.reason,
                "Alert triggered"
            );
            self.state.latest_alert = Some(alert.clone());
            forward(&self.publisher.alerts, alert.clone(), "alerts");
        }
        self.publish_view(&snapshot);

        outcome.snapshot = Some(snapshot);
        outcome.alert = alert;
        outcome
    }

    fn hedge_ratio_for_tick(&mut self) -> Option<f64> {
        match self.settings.analytics.hedge_ratio {
            HedgeRatioMode::Fixed { ratio } => {
                self.state.hedge_ratio = Some(ratio);
                Some(ratio)
            }
            HedgeRatioMode::Rolling => self.recalibrate(),
            HedgeRatioMode::Recalibrate { every_ticks } => {
                if self.state.hedge_ratio.is_none()
                    || self.state.ticks_since_calibration >= every_ticks
                {
                    self.recalibrate()
                } else {
                    self.state.hedge_ratio
                }
            }
        }
    }

    /// Refit beta on the aligned tail of both price windows. Keeps the previous beta on failure.
    fn recalibrate(&mut self) -> Option<f64> {
        let n = self.state.prices_x.size().min(self.state.prices_y.size());
        let x = self.state.prices_x.tail(n);
        let y = self.state.prices_y.tail(n);
        match hedge_ratio(&x, &y) {
            Ok(beta) => {
                self.state.hedge_ratio = Some(beta);
                self.state.ticks_since_calibration = 0;
            }
            Err(e) => {
                tracing::debug!(error = %e, points = n, "Hedge ratio fit failed");
            }
        }
        self.state.hedge_ratio
    }

    fn publish_bars(&self, bars: &[Bar]) {
        for bar in bars {
            forward(&self.publisher.bars, bar.clone(), "bars");
        }
    }

    fn publish_view(&self, snapshot: &StatisticsSnapshot) {
        let view = AnalyticsView {
            latest: Some(snapshot.clone()),
            history: self.state.history.values(),
            latest_alert: self.state.latest_alert.clone(),
            signal: self.state.alert_engine.state(),
            points_collected: self.state.spreads.size(),
            window_size: self.settings.analytics.spread_window,
        };
        self.publisher.view.send_replace(view);
    }
}
