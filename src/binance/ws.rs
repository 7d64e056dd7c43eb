use std::time::Duration;

use anyhow::{Context, Result};
use futures_util::StreamExt;
use tokio::sync::mpsc::error::TrySendError;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use super::types::parse_trade_message;
use crate::error::AppError;
use crate::event::{AppEvent, WsConnectionStatus};
use crate::model::tick::{now_ms, Tick};

type TradeStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

const RECONNECT_INITIAL: Duration = Duration::from_secs(1);
const RECONNECT_MAX: Duration = Duration::from_secs(60);

/// Reconnect delay that doubles on every failure up to `max`.
#[derive(Debug)]
pub struct ExponentialBackoff {
    next: Duration,
    initial: Duration,
    max: Duration,
    factor: f64,
}

impl ExponentialBackoff {
    pub fn new(initial: Duration, max: Duration, factor: f64) -> Self {
        Self {
            next: initial,
            initial,
            max,
            factor,
        }
    }

    pub fn next_delay(&mut self) -> Duration {
        let delay = self.next;
        let grown = (delay.as_secs_f64() * self.factor).min(self.max.as_secs_f64());
        self.next = Duration::from_secs_f64(grown);
        delay
    }

    pub fn reset(&mut self) {
        self.next = self.initial;
    }
}

/// What a single inbound frame means for the session.
#[derive(Debug)]
pub enum Frame {
    Trade(Tick),
    Ignored,
    Malformed(String),
    Closed,
}

/// Classify one frame from the combined trade stream, stamping trades with
/// `received_ms`.
pub fn classify_frame(msg: Message, received_ms: u64) -> Frame {
    match msg {
        Message::Text(text) => match parse_trade_message(&text) {
            Ok(event) => Frame::Trade(event.into_tick(received_ms)),
            Err(e) => Frame::Malformed(e.to_string()),
        },
        Message::Close(_) => Frame::Closed,
        // pings are answered by tungstenite
        _ => Frame::Ignored,
    }
}

/// Report a status change without waiting on the consumer.
///
/// Returns false when the event was dropped because the channel is full or closed.
pub fn notify(status_tx: &mpsc::Sender<AppEvent>, event: AppEvent) -> bool {
    match status_tx.try_send(event) {
        Ok(()) => true,
        Err(TrySendError::Full(event)) => {
            tracing::debug!(event = ?event, "Status channel full, dropping notice");
            false
        }
        Err(TrySendError::Closed(_)) => false,
    }
}

/// Why a connected session stopped.
#[derive(Debug)]
enum SessionEnd {
    Shutdown,
    ConsumerGone,
    Lost(anyhow::Error),
}

#[derive(Debug, Default)]
struct SessionStats {
    forwarded: u64,
    dropped: u64,
    malformed: u64,
}

/// Trade stream reader for both legs of the pair, with reconnects.
pub struct BinanceWsClient {
    url: String,
}

impl BinanceWsClient {
    pub fn new(url: &url::Url) -> Self {
        Self {
            url: url.to_string(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Stream ticks into `tick_tx` until `shutdown` flips or the consumer goes away.
    ///
    /// Connection changes are reported on `status_tx`. Ticks are never awaited on:
    /// when the consumer lags, the newest tick is dropped and counted.
    pub async fn connect_and_run(
        &self,
        tick_tx: mpsc::Sender<Tick>,
        status_tx: mpsc::Sender<AppEvent>,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<()> {
        let mut backoff = ExponentialBackoff::new(RECONNECT_INITIAL, RECONNECT_MAX, 2.0);
        let mut attempt: u32 = 0;

        while !*shutdown.borrow() {
            let end = match self.open().await {
                Ok(stream) => {
                    attempt = 0;
                    backoff.reset();
                    notify(&status_tx, AppEvent::WsStatus(WsConnectionStatus::Connected));
                    self.pump(stream, &tick_tx, &status_tx, &mut shutdown).await
                }
                Err(e) => SessionEnd::Lost(e),
            };
            notify(&status_tx, AppEvent::WsStatus(WsConnectionStatus::Disconnected));

            match end {
                SessionEnd::Shutdown => break,
                SessionEnd::ConsumerGone => {
                    tracing::info!("Tick consumer closed, stopping feed");
                    break;
                }
                SessionEnd::Lost(e) => {
                    attempt += 1;
                    let delay = backoff.next_delay();
                    tracing::warn!(
                        error = %format!("{:#}", e),
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        "Trade stream lost"
                    );
                    notify(
                        &status_tx,
                        AppEvent::WsStatus(WsConnectionStatus::Reconnecting {
                            attempt,
                            delay_ms: delay.as_millis() as u64,
                        }),
                    );
                    tokio::select! {
                        _ = tokio::time::sleep(delay) => {}
                        _ = shutdown.changed() => {
                            notify(
                                &status_tx,
                                AppEvent::LogMessage("Shutdown during reconnect".to_string()),
                            );
                            break;
                        }
                    }
                }
            }
        }
        Ok(())
    }

    async fn open(&self) -> Result<TradeStream> {
        tracing::info!(url = %self.url, "Connecting to trade stream");
        let (stream, _resp) = tokio_tungstenite::connect_async(self.url.as_str())
            .await
            .context("WebSocket connect failed")?;
        Ok(stream)
    }

    async fn pump(
        &self,
        stream: TradeStream,
        tick_tx: &mpsc::Sender<Tick>,
        status_tx: &mpsc::Sender<AppEvent>,
        shutdown: &mut watch::Receiver<bool>,
    ) -> SessionEnd {
        let (_write, mut read) = stream.split();
        let mut stats = SessionStats::default();

        let end = loop {
            let msg = tokio::select! {
                msg = read.next() => msg,
                _ = shutdown.changed() => break SessionEnd::Shutdown,
            };
            let msg = match msg {
                Some(Ok(msg)) => msg,
                Some(Err(e)) => break SessionEnd::Lost(AppError::WebSocket(e.to_string()).into()),
                None => break SessionEnd::Lost(AppError::StreamEnded.into()),
            };

            match classify_frame(msg, now_ms()) {
                Frame::Trade(tick) => match tick_tx.try_send(tick) {
                    Ok(()) => stats.forwarded += 1,
                    Err(TrySendError::Full(_)) => {
                        stats.dropped += 1;
                        notify(status_tx, AppEvent::TickDropped);
                    }
                    Err(TrySendError::Closed(_)) => break SessionEnd::ConsumerGone,
                },
                Frame::Malformed(reason) => {
                    stats.malformed += 1;
                    tracing::debug!(error = %reason, "Skipping unparseable frame");
                }
                Frame::Closed => break SessionEnd::Lost(AppError::StreamEnded.into()),
                Frame::Ignored => {}
            }
        };

        tracing::info!(
            forwarded = stats.forwarded,
            dropped = stats.dropped,
            malformed = stats.malformed,
            "Trade stream session ended"
        );
        end
    }
}
