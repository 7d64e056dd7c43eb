use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::model::bar::MAX_TIMEFRAME_SECS;

pub const CONFIG_PATH_ENV: &str = "SANDBOX_PAIRS_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub feed: FeedConfig,
    pub sampler: SamplerConfig,
    #[serde(default)]
    pub analytics: AnalyticsConfig,
    #[serde(default)]
    pub alerts: AlertConfig,
    #[serde(default)]
    pub api: ApiConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FeedConfig {
    pub ws_base_url: String,
    /// Independent leg (`x` in `spread = y - beta * x`).
    pub symbol_x: String,
    /// Dependent leg.
    pub symbol_y: String,
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

fn default_channel_capacity() -> usize {
    1024
}

#[derive(Debug, Clone, Deserialize)]
pub struct SamplerConfig {
    /// Interval strings such as "1s", "1m", "5m".
    pub timeframes: Vec<String>,
}

/// How the orchestrator obtains the hedge ratio used for each spread point.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum HedgeRatioMode {
    /// Constant ratio, never re-estimated.
    Fixed { ratio: f64 },
    /// OLS over the price windows on every tick.
    #[default]
    Rolling,
    /// OLS every `every_ticks` admitted ticks, held constant in between.
    Recalibrate { every_ticks: u64 },
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AnalyticsConfig {
    pub price_window: usize,
    pub spread_window: usize,
    pub zscore_window: usize,
    pub correlation_window: usize,
    pub min_correlation_samples: usize,
    pub min_spread_points: usize,
    /// Re-run the stationarity test after this many new spread points.
    pub stationarity_every: usize,
    pub significance: f64,
    pub hedge_ratio: HedgeRatioMode,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            price_window: 50,
            spread_window: 50,
            zscore_window: 20,
            correlation_window: 50,
            min_correlation_samples: 20,
            min_spread_points: 5,
            stationarity_every: 10,
            significance: 0.05,
            hedge_ratio: HedgeRatioMode::Rolling,
        }
    }
}

impl AnalyticsConfig {
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("price_window", self.price_window),
            ("spread_window", self.spread_window),
            ("zscore_window", self.zscore_window),
            ("correlation_window", self.correlation_window),
        ] {
            if value < 2 {
                bail!("analytics.{} must be >= 2, got {}", name, value);
            }
        }
        if self.zscore_window > self.spread_window {
            bail!(
                "analytics.zscore_window ({}) cannot exceed spread_window ({})",
                self.zscore_window,
                self.spread_window
            );
        }
        if self.stationarity_every == 0 {
            bail!("analytics.stationarity_every must be > 0");
        }
        if !(self.significance > 0.0 && self.significance < 1.0) {
            bail!(
                "analytics.significance must be in (0, 1), got {}",
                self.significance
            );
        }
        match self.hedge_ratio {
            HedgeRatioMode::Fixed { ratio } if !ratio.is_finite() => {
                bail!("analytics.hedge_ratio.ratio must be finite")
            }
            HedgeRatioMode::Recalibrate { every_ticks: 0 } => {
                bail!("analytics.hedge_ratio.every_ticks must be > 0")
            }
            _ => Ok(()),
        }
    }
}

/// Alert thresholds. Read fresh on each evaluation; may be swapped at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertConfig {
    pub entry_threshold: f64,
    pub reset_threshold: f64,
    pub min_correlation: f64,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            entry_threshold: 2.0,
            reset_threshold: 0.5,
            min_correlation: 0.7,
        }
    }
}

impl AlertConfig {
    pub fn validate(&self) -> Result<()> {
        if !self.entry_threshold.is_finite() || !self.reset_threshold.is_finite() {
            bail!("alert thresholds must be finite");
        }
        if self.reset_threshold < 0.0 {
            bail!("reset_threshold must be >= 0, got {}", self.reset_threshold);
        }
        if self.reset_threshold >= self.entry_threshold {
            bail!(
                "reset_threshold ({}) must be below entry_threshold ({})",
                self.reset_threshold,
                self.entry_threshold
            );
        }
        if !(-1.0..=1.0).contains(&self.min_correlation) {
            bail!(
                "min_correlation must be within [-1, 1], got {}",
                self.min_correlation
            );
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub enabled: bool,
    pub bind: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            bind: "127.0.0.1:8000".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    #[serde(default)]
    pub json: bool,
    #[serde(default)]
    pub file: Option<String>,
}

/// Parse an interval string (e.g. "1s", "1m", "5m", "1h", "1d") into seconds.
pub fn parse_interval_secs(s: &str) -> Result<u64> {
    if s.len() < 2 {
        bail!("invalid interval '{}': expected format like '1m'", s);
    }

    let (num_str, suffix) = s.split_at(s.len() - 1);
    let n: u64 = num_str.parse().with_context(|| {
        format!(
            "invalid interval '{}': quantity must be a positive integer",
            s
        )
    })?;
    if n == 0 {
        bail!("invalid interval '{}': quantity must be > 0", s);
    }

    let unit_secs = match suffix {
        "s" => 1,
        "m" => 60,
        "h" => 3_600,
        "d" => 86_400,
        _ => bail!(
            "invalid interval '{}': unsupported suffix '{}', expected one of s/m/h/d",
            s,
            suffix
        ),
    };

    let secs = n
        .checked_mul(unit_secs)
        .with_context(|| format!("invalid interval '{}': value is too large", s))?;
    // bars work in milliseconds
    secs.checked_mul(1_000)
        .with_context(|| format!("invalid interval '{}': value is too large", s))?;
    Ok(secs)
}

impl SamplerConfig {
    pub fn timeframe_secs(&self) -> Result<Vec<u64>> {
        if self.timeframes.is_empty() {
            bail!("sampler.timeframes must list at least one interval");
        }
        self.timeframes
            .iter()
            .map(|tf| {
                let secs = parse_interval_secs(tf.trim())?;
                if secs > MAX_TIMEFRAME_SECS {
                    bail!(
                        "sampler.timeframes entry '{}' exceeds the 1d maximum",
                        tf
                    );
                }
                Ok(secs)
            })
            .collect()
    }
}

impl FeedConfig {
    /// Upper-cased `(x, y)` symbols.
    pub fn pair(&self) -> (String, String) {
        (
            self.symbol_x.trim().to_ascii_uppercase(),
            self.symbol_y.trim().to_ascii_uppercase(),
        )
    }

    /// Combined trade stream URL for both legs.
    pub fn stream_url(&self) -> Result<url::Url> {
        let (x, y) = self.pair();
        let raw = format!(
            "{}/stream?streams={}@trade/{}@trade",
            self.ws_base_url.trim_end_matches('/'),
            x.to_ascii_lowercase(),
            y.to_ascii_lowercase()
        );
        url::Url::parse(&raw).with_context(|| format!("invalid feed url '{}'", raw))
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config_path = std::env::var(CONFIG_PATH_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH));
        Self::load_from(&config_path)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let config_str = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        Self::from_toml_str(&config_str)
            .with_context(|| format!("failed to load {}", path.display()))
    }

    pub fn from_toml_str(s: &str) -> Result<Self> {
        let config: Config = toml::from_str(s).context("failed to parse config")?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let (x, y) = self.feed.pair();
        if x.is_empty() || y.is_empty() {
            bail!("feed.symbol_x and feed.symbol_y must be set");
        }
        if x == y {
            bail!("feed.symbol_x and feed.symbol_y must differ, both are {}", x);
        }
        if self.feed.channel_capacity == 0 {
            bail!("feed.channel_capacity must be > 0");
        }
        self.feed.stream_url()?;
        self.sampler
            .timeframe_secs()
            .context("sampler.timeframes is invalid")?;
        self.analytics.validate()?;
        self.alerts.validate().context("alerts section is invalid")?;
        Ok(())
    }
}
