use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use tokio::sync::watch;

use axum::http::header;
use sandbox_pairs::api::{
    alerts_latest, analytics_history, analytics_latest, analytics_stats, analytics_stats_csv,
    get_config, health, update_config, ApiState,
};
use sandbox_pairs::config::AlertConfig;
use sandbox_pairs::model::alert::{Alert, AlertReason};
use sandbox_pairs::model::signal::AlertSignal;
use sandbox_pairs::model::snapshot::{StationarityResult, StatisticsSnapshot};
use sandbox_pairs::pipeline::AnalyticsView;

fn snapshot(ts: u64, z: f64) -> StatisticsSnapshot {
    StatisticsSnapshot {
        timestamp_ms: ts,
        z_score: Some(z),
        spread: 12.5,
        correlation: Some(0.93),
        hedge_ratio: 24.8,
        stationarity: StationarityResult {
            statistic: Some(-3.7),
            p_value: Some(0.004),
            used_lag: Some(2),
            is_stationary: true,
        },
        points_collected: 50,
    }
}

fn state(
    view: AnalyticsView,
) -> (
    ApiState,
    watch::Sender<AnalyticsView>,
    watch::Receiver<AlertConfig>,
) {
    let (view_tx, view_rx) = watch::channel(view);
    let (cfg_tx, cfg_rx) = watch::channel(AlertConfig::default());
    let state = ApiState {
        symbol_x: "ETHUSDT".to_string(),
        symbol_y: "BTCUSDT".to_string(),
        view: view_rx,
        alert_config: Arc::new(cfg_tx),
    };
    (state, view_tx, cfg_rx)
}

#[test]
fn health_reports_pair() {
    let (state, _view_tx, _cfg_rx) = state(AnalyticsView::default());
    let Json(body) = tokio_test::block_on(health(State(state)));
    assert_eq!(body.status, "ok");
    assert_eq!(body.symbol_x, "ETHUSDT");
    assert_eq!(body.symbol_y, "BTCUSDT");
}

#[test]
fn latest_is_not_found_before_first_snapshot() {
    let (state, _view_tx, _cfg_rx) = state(AnalyticsView::default());
    let err = tokio_test::block_on(analytics_latest(State(state))).unwrap_err();
    assert_eq!(err.status, StatusCode::NOT_FOUND);
}

#[test]
fn latest_reflects_published_view() {
    let (state, view_tx, _cfg_rx) = state(AnalyticsView::default());
    let snap = snapshot(1_000, 2.4);
    view_tx.send_replace(AnalyticsView {
        latest: Some(snap.clone()),
        history: vec![snapshot(900, 1.1), snap.clone()],
        signal: AlertSignal::Short,
        points_collected: 50,
        window_size: 50,
        ..AnalyticsView::default()
    });

    let Json(body) = tokio_test::block_on(analytics_latest(State(state.clone()))).unwrap();
    assert_eq!(body.snapshot, snap);
    assert_eq!(body.signal, AlertSignal::Short);
    assert!(!body.warmup);

    let json = serde_json::to_value(&body).unwrap();
    assert_eq!(json["signal"], "SHORT");
    assert_eq!(json["z_score"], 2.4);
    assert_eq!(json["stationarity"]["is_stationary"], true);
    assert_eq!(json["warmup"], false);

    let Json(history) = tokio_test::block_on(analytics_history(State(state)));
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].timestamp_ms, 900);
}

#[test]
fn alerts_latest_returns_last_alert() {
    let alert = Alert {
        timestamp_ms: 5_000,
        signal: AlertSignal::Long,
        z_score: -2.3,
        correlation: 0.91,
        reason: AlertReason::Oversold,
        message: "z-score -2.30 <= -2.00 [oversold]".to_string(),
    };
    let (state, _view_tx, _cfg_rx) = state(AnalyticsView {
        latest_alert: Some(alert.clone()),
        signal: AlertSignal::Long,
        ..AnalyticsView::default()
    });
    let Json(body) = tokio_test::block_on(alerts_latest(State(state)));
    assert_eq!(body.signal, AlertSignal::Long);
    assert_eq!(body.alert, Some(alert));

    let json = serde_json::to_value(&body).unwrap();
    assert_eq!(json["alert"]["reason"], "oversold");
}

#[test]
fn config_update_is_visible_to_receivers() {
    let (state, _view_tx, cfg_rx) = state(AnalyticsView::default());
    let next = AlertConfig {
        entry_threshold: 3.0,
        reset_threshold: 1.0,
        min_correlation: 0.5,
    };
    let Json(applied) =
        tokio_test::block_on(update_config(State(state.clone()), Json(next))).unwrap();
    assert_eq!(applied, next);
    assert_eq!(*cfg_rx.borrow(), next);

    let Json(current) = tokio_test::block_on(get_config(State(state)));
    assert_eq!(current, next);
}

#[test]
fn invalid_config_update_is_rejected() {
    let (state, _view_tx, cfg_rx) = state(AnalyticsView::default());
    let bad = AlertConfig {
        entry_threshold: 1.0,
        reset_threshold: 1.0,
        min_correlation: 0.7,
    };
    let err = tokio_test::block_on(update_config(State(state), Json(bad))).unwrap_err();
    assert_eq!(err.status, StatusCode::BAD_REQUEST);
    assert!(err.message.contains("reset_threshold"));
    assert_eq!(*cfg_rx.borrow(), AlertConfig::default());
}

#[test]
fn latest_flags_warmup_until_window_is_full() {
    let mut snap = snapshot(1_000, 0.3);
    snap.points_collected = 12;
    let (state, _view_tx, _cfg_rx) = state(AnalyticsView {
        latest: Some(snap),
        points_collected: 12,
        window_size: 50,
        ..AnalyticsView::default()
    });
    let Json(body) = tokio_test::block_on(analytics_latest(State(state))).unwrap();
    assert!(body.warmup);
    assert_eq!(body.window_size, 50);
}

fn stats_view() -> AnalyticsView {
    let mut flat = snapshot(2_000, -2.6);
    flat.stationarity = StationarityResult::neutral();
    AnalyticsView {
        history: vec![snapshot(1_000, 2.4), flat, snapshot(3_000, 0.4)],
        ..AnalyticsView::default()
    }
}

#[test]
fn stats_rows_are_newest_first_with_status() {
    let (state, _view_tx, _cfg_rx) = state(stats_view());
    let Json(body) = tokio_test::block_on(analytics_stats(State(state)));

    let z: Vec<Option<f64>> = body.rows.iter().map(|r| r.z_score).collect();
    assert_eq!(z, vec![Some(0.4), Some(-2.6), Some(2.4)]);
    let stationary: Vec<bool> = body.rows.iter().map(|r| r.is_stationary).collect();
    assert_eq!(stationary, vec![true, false, true]);
    let alerts: Vec<AlertSignal> = body.rows.iter().map(|r| r.alert).collect();
    assert_eq!(
        alerts,
        vec![AlertSignal::None, AlertSignal::Long, AlertSignal::Short]
    );
    assert!(body.rows[2].timestamp.starts_with("1970-01-01T00:00:01"));

    let json = serde_json::to_value(&body).unwrap();
    assert_eq!(json["rows"][1]["alert"], "LONG");
    assert!(json["rows"][1]["p_value"].is_null());
}

#[test]
fn stats_status_follows_current_entry_threshold() {
    let (state, _view_tx, _cfg_rx) = state(stats_view());
    state.alert_config.send_replace(AlertConfig {
        entry_threshold: 3.0,
        reset_threshold: 0.5,
        min_correlation: 0.7,
    });
    let Json(body) = tokio_test::block_on(analytics_stats(State(state)));
    assert!(body.rows.iter().all(|r| r.alert == AlertSignal::None));
}

#[test]
fn stats_csv_is_an_attachment() {
    let (state, _view_tx, _cfg_rx) = state(stats_view());
    let response = tokio_test::block_on(analytics_stats_csv(State(state))).unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let headers = response.headers();
    assert!(headers[header::CONTENT_TYPE]
        .to_str()
        .unwrap()
        .starts_with("text/csv"));
    assert_eq!(
        headers[header::CONTENT_DISPOSITION],
        "attachment; filename=\"analytics_stats.csv\""
    );

    let bytes = tokio_test::block_on(axum::body::to_bytes(response.into_body(), usize::MAX)).unwrap();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 4);
    assert_eq!(
        lines[0],
        "timestamp,z_score,spread,correlation,hedge_ratio,is_stationary,p_value,alert"
    );
    assert!(lines[1].ends_with(",0.4,12.5,0.93,24.8,true,0.004,NONE"));
    assert!(lines[2].ends_with(",-2.6,12.5,0.93,24.8,false,,LONG"));
    assert!(lines[3].ends_with(",SHORT"));
}

#[test]
fn stats_csv_has_header_without_history() {
    let (state, _view_tx, _cfg_rx) = state(AnalyticsView::default());
    let response = tokio_test::block_on(analytics_stats_csv(State(state))).unwrap();
    let bytes = tokio_test::block_on(axum::body::to_bytes(response.into_body(), usize::MAX)).unwrap();
    assert_eq!(
        String::from_utf8(bytes.to_vec()).unwrap().trim_end(),
        "timestamp,z_score,spread,correlation,hedge_ratio,is_stationary,p_value,alert"
    );
}
