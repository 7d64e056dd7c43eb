use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use tokio::sync::{mpsc, watch};

use sandbox_pairs::api::{self, ApiState};
use sandbox_pairs::binance::ws::BinanceWsClient;
use sandbox_pairs::config::{Config, LoggingConfig};
use sandbox_pairs::event::{AppEvent, WsConnectionStatus};
use sandbox_pairs::model::tick::{now_ms, Tick};
use sandbox_pairs::pipeline::{Pipeline, PipelineSettings};

const SWEEP_INTERVAL: Duration = Duration::from_secs(1);

fn init_tracing(logging: &LoggingConfig) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&logging.level));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    match &logging.file {
        Some(path) => {
            let log_file = std::fs::File::create(path)
                .with_context(|| format!("failed to create log file {}", path))?;
            let writer = Arc::new(log_file);
            if logging.json {
                builder.with_writer(writer).with_ansi(false).json().init();
            } else {
                builder.with_writer(writer).with_ansi(false).init();
            }
        }
        None if logging.json => builder.json().init(),
        None => builder.init(),
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // rustls 0.23+ needs an explicit process-wide provider
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow!("failed to install rustls crypto provider"))?;

    let config = match Config::load() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config: {:#}", e);
            eprintln!("Set SANDBOX_PAIRS_CONFIG or provide config/default.toml");
            std::process::exit(1);
        }
    };
    init_tracing(&config.logging)?;

    let (symbol_x, symbol_y) = config.feed.pair();
    let timeframes = config
        .sampler
        .timeframe_secs()
        .context("validated sampler.timeframes became invalid at runtime")?;
    let stream_url = config.feed.stream_url()?;
    tracing::info!(
        symbol_x = %symbol_x,
        symbol_y = %symbol_y,
        timeframes = ?config.sampler.timeframes,
        ws_url = %stream_url,
        "Starting sandbox-pairs"
    );

    // Channels
    let capacity = config.feed.channel_capacity;
    let (tick_tx, mut tick_rx) = mpsc::channel::<Tick>(capacity);
    let (status_tx, mut status_rx) = mpsc::channel::<AppEvent>(64);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let (alert_config_tx, alert_config_rx) = watch::channel(config.alerts);
    let alert_config_tx = Arc::new(alert_config_tx);

    let (mut pipeline, outputs) = Pipeline::new(
        PipelineSettings {
            symbol_x: symbol_x.clone(),
            symbol_y: symbol_y.clone(),
            timeframes,
            analytics: config.analytics.clone(),
        },
        alert_config_rx,
        capacity,
    );

    // Market data
    let ws_client = BinanceWsClient::new(&stream_url);
    let ws_shutdown = shutdown_rx.clone();
    let ws_task = tokio::spawn(async move {
        if let Err(e) = ws_client
            .connect_and_run(tick_tx, status_tx, ws_shutdown)
            .await
        {
            tracing::error!(error = %e, "WebSocket task failed");
        }
    });

    // Reporting API
    let api_task = if config.api.enabled {
        let state = ApiState {
            symbol_x: symbol_x.clone(),
            symbol_y: symbol_y.clone(),
            view: outputs.view.clone(),
            alert_config: alert_config_tx.clone(),
        };
        let bind = config.api.bind.clone();
        let api_shutdown = shutdown_rx.clone();
        Some(tokio::spawn(async move {
            if let Err(e) = api::serve(&bind, state, api_shutdown).await {
                tracing::error!(error = %format!("{:#}", e), "API task failed");
            }
        }))
    } else {
        tracing::info!("API disabled");
        None
    };

    // Side-channel consumers
    let mut bars_rx = outputs.bars;
    let bars_task = tokio::spawn(async move {
        let mut count = 0u64;
        while let Some(bar) = bars_rx.recv().await {
            count += 1;
            tracing::debug!(symbol = %bar.symbol, tf = bar.timeframe_secs, count, "Bar consumed");
        }
    });
    let mut alerts_rx = outputs.alerts;
    let alerts_task = tokio::spawn(async move {
        while let Some(alert) = alerts_rx.recv().await {
            tracing::info!(
                signal = %alert.signal,
                reason = %alert.reason,
                z_score = alert.z_score,
                correlation = alert.correlation,
                "ALERT: {}",
                alert.message
            );
        }
    });

    // Ingestion loop: the only writer of pair state
    let mut sweep = tokio::time::interval(SWEEP_INTERVAL);
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut dropped_ticks = 0u64;
    loop {
        tokio::select! {
            maybe_tick = tick_rx.recv() => {
                let Some(tick) = maybe_tick else {
                    tracing::warn!("Tick channel closed");
                    break;
                };
                pipeline.on_tick(&tick, now_ms());
            }
            _ = sweep.tick() => {
                pipeline.on_timer(now_ms());
            }
            Some(event) = status_rx.recv() => match event {
                AppEvent::WsStatus(WsConnectionStatus::Connected) => {
                    tracing::info!("Feed connected");
                }
                AppEvent::WsStatus(WsConnectionStatus::Disconnected) => {
                    tracing::warn!("Feed disconnected");
                }
                AppEvent::WsStatus(WsConnectionStatus::Reconnecting { attempt, delay_ms }) => {
                    tracing::info!(attempt, delay_ms, "Feed reconnecting");
                }
                AppEvent::TickDropped => {
                    dropped_ticks += 1;
                    if dropped_ticks % 100 == 1 {
                        tracing::warn!(dropped_ticks, "Ingestion is falling behind");
                    }
                }
                AppEvent::LogMessage(msg) => tracing::info!("{}", msg),
            },
            _ = &mut ctrl_c => {
                tracing::info!("Ctrl+C received");
                break;
            }
        }
    }

    let _ = shutdown_tx.send(true);
    // Closing the pipeline's senders lets the consumers drain and exit.
    drop(pipeline);
    // Nobody drains these any more; closing them unblocks the feed task.
    drop(status_rx);
    drop(tick_rx);
    let _ = ws_task.await;
    if let Some(task) = api_task {
        let _ = task.await;
    }
    let _ = bars_task.await;
    let _ = alerts_task.await;

    tracing::info!(ticks_dropped = dropped_ticks, "sandbox-pairs stopped");
    Ok(())
}
