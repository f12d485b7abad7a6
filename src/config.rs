// =============================================================================
// Engine configuration — TOML file loaded once at startup
// =============================================================================
//
// Every tunable lives here: session windows, per-symbol gates, global risk
// limits and the run-mode flags. All optional fields carry `#[serde(default)]`
// so that older config files keep loading as new fields are added.
// =============================================================================

use std::path::Path;

use anyhow::{Context, Result};
use chrono::NaiveTime;
use serde::{Deserialize, Deserializer};
use thiserror::Error;

// =============================================================================
// Default-value helpers (required by serde `default = "..."` attribute)
// =============================================================================

fn default_true() -> bool {
    true
}

fn default_timezone() -> String {
    "Europe/Dublin".to_string()
}

fn default_min_spread_checks() -> u32 {
    3
}

fn default_spread_spike_cooldown_minutes() -> i64 {
    15
}

fn default_min_stop_atr() -> f64 {
    0.5
}

fn default_min_regime_confidence() -> f64 {
    0.5
}

fn default_news_sensitivity() -> String {
    "high".to_string()
}

fn default_max_positions_per_symbol() -> usize {
    1
}

fn default_max_daily_trades() -> u32 {
    3
}

fn default_max_daily_loss() -> f64 {
    0.02
}

fn default_max_consecutive_losses() -> u32 {
    2
}

fn default_slippage_points() -> f64 {
    2.0
}

fn default_spread_filter_multiplier() -> f64 {
    1.0
}

fn default_news_window_minutes() -> i64 {
    15
}

fn default_trade_cooldown_minutes() -> i64 {
    20
}

fn default_drawdown_kill_switch() -> f64 {
    0.05
}

fn default_good_profit_rr() -> f64 {
    1.0
}

fn de_hhmm<'de, D>(deserializer: D) -> std::result::Result<NaiveTime, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    NaiveTime::parse_from_str(&raw, "%H:%M").map_err(serde::de::Error::custom)
}

// =============================================================================
// Session windows
// =============================================================================

/// One tradable session window in the configured local timezone. Windows that
/// cross midnight (start > end) are supported.
#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    pub name: String,
    #[serde(deserialize_with = "de_hhmm")]
    pub start: NaiveTime,
    #[serde(deserialize_with = "de_hhmm")]
    pub end: NaiveTime,
}

// =============================================================================
// Per-symbol configuration
// =============================================================================

/// Unit used for the spread gate threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SpreadMode {
    #[default]
    Pips,
    Points,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SymbolConfig {
    pub symbol: String,
    #[serde(default)]
    pub spread_mode: SpreadMode,
    pub max_spread: f64,
    #[serde(default = "default_min_spread_checks")]
    pub min_spread_checks: u32,
    #[serde(default = "default_spread_spike_cooldown_minutes")]
    pub spread_spike_cooldown_minutes: i64,
    pub min_atr: f64,
    pub max_atr: f64,
    #[serde(default = "default_min_stop_atr")]
    pub min_stop_atr: f64,
    #[serde(default = "default_min_regime_confidence")]
    pub min_regime_confidence: f64,
    pub risk_per_trade: f64,
    pub max_daily_loss: f64,
    pub max_trades_per_day: u32,
    pub max_consecutive_losses: u32,
    pub min_rr: f64,
    #[serde(default = "default_news_sensitivity")]
    pub news_sensitivity: String,
    #[serde(default)]
    pub lot_step_override: Option<f64>,
    #[serde(default)]
    pub min_lot_override: Option<f64>,
    #[serde(default)]
    pub trade_cooldown_minutes: Option<i64>,
}

// =============================================================================
// BotConfig
// =============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct BotConfig {
    #[serde(default)]
    pub symbols: Vec<SymbolConfig>,
    #[serde(default)]
    pub sessions: Vec<SessionConfig>,
    #[serde(default = "default_timezone")]
    pub default_timezone: String,
    #[serde(default = "default_true")]
    pub paper_trading: bool,
    #[serde(default)]
    pub dry_run: bool,
    #[serde(default)]
    pub live_enabled: bool,
    #[serde(default)]
    pub live_acknowledgement: String,
    #[serde(default)]
    pub enable_supply_demand: bool,
    #[serde(default)]
    pub supply_demand_config_path: Option<String>,
    /// Accepted for compatibility with upstream config files; the momentum
    /// scalper is not part of this engine.
    #[serde(default)]
    pub enable_scalper: bool,
    #[serde(default)]
    pub scalper_only: bool,
    #[serde(default = "default_max_positions_per_symbol")]
    pub max_positions_per_symbol: usize,
    #[serde(default = "default_max_daily_trades")]
    pub max_daily_trades: u32,
    #[serde(default = "default_max_daily_loss")]
    pub max_daily_loss: f64,
    #[serde(default = "default_max_consecutive_losses")]
    pub max_consecutive_losses: u32,
    #[serde(default = "default_slippage_points")]
    pub slippage_points: f64,
    #[serde(default = "default_spread_filter_multiplier")]
    pub spread_filter_multiplier: f64,
    #[serde(default = "default_news_window_minutes")]
    pub news_window_pre_minutes: i64,
    #[serde(default = "default_news_window_minutes")]
    pub news_window_post_minutes: i64,
    #[serde(default)]
    pub news_schedule_path: Option<String>,
    #[serde(default = "default_trade_cooldown_minutes")]
    pub trade_cooldown_minutes: i64,
    #[serde(default = "default_drawdown_kill_switch")]
    pub drawdown_kill_switch: f64,
    #[serde(default)]
    pub close_on_good_profit: bool,
    #[serde(default = "default_good_profit_rr")]
    pub good_profit_rr: f64,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            symbols: Vec::new(),
            sessions: Vec::new(),
            default_timezone: default_timezone(),
            paper_trading: true,
            dry_run: false,
            live_enabled: false,
            live_acknowledgement: String::new(),
            enable_supply_demand: false,
            supply_demand_config_path: None,
            enable_scalper: false,
            scalper_only: false,
            max_positions_per_symbol: default_max_positions_per_symbol(),
            max_daily_trades: default_max_daily_trades(),
            max_daily_loss: default_max_daily_loss(),
            max_consecutive_losses: default_max_consecutive_losses(),
            slippage_points: default_slippage_points(),
            spread_filter_multiplier: default_spread_filter_multiplier(),
            news_window_pre_minutes: default_news_window_minutes(),
            news_window_post_minutes: default_news_window_minutes(),
            news_schedule_path: None,
            trade_cooldown_minutes: default_trade_cooldown_minutes(),
            drawdown_kill_switch: default_drawdown_kill_switch(),
            close_on_good_profit: false,
            good_profit_rr: default_good_profit_rr(),
        }
    }
}

impl BotConfig {
    /// Load and parse the TOML config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        let config: BotConfig = toml::from_str(&raw)
            .with_context(|| format!("failed to parse config file {}", path.display()))?;
        Ok(config)
    }

    /// Per-symbol configuration block, if the symbol is configured.
    pub fn symbol(&self, symbol: &str) -> Option<&SymbolConfig> {
        self.symbols.iter().find(|cfg| cfg.symbol == symbol)
    }
}

// =============================================================================
// Startup preconditions
// =============================================================================

/// Fatal startup errors. These propagate out of `main` — there is no implicit
/// fallback from a misconfigured live session.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("live trading disabled in config; set live_enabled = true to proceed")]
    LiveDisabled,
    #[error("missing live_acknowledgement in config for live trading")]
    MissingAcknowledgement,
    #[error("risk limits missing for live trading")]
    RiskLimitsMissing,
    #[error("risk per trade out of bounds for {symbol} (allowed 0.0025..=0.01)")]
    RiskPerTradeOutOfBounds { symbol: String },
    #[error("no live venue adapter is available in this build")]
    LiveAdapterUnavailable,
    #[error("failed to connect to broker: {0}")]
    ConnectFailed(String),
}

/// Validate the preconditions for live mode. Called before any broker I/O.
pub fn validate_live(config: &BotConfig) -> std::result::Result<(), StartupError> {
    if !config.live_enabled {
        return Err(StartupError::LiveDisabled);
    }
    if config.live_acknowledgement.is_empty() {
        return Err(StartupError::MissingAcknowledgement);
    }
    if config.max_daily_trades == 0 || config.max_daily_loss <= 0.0 {
        return Err(StartupError::RiskLimitsMissing);
    }
    for symbol_cfg in &config.symbols {
        if !(0.0025..=0.01).contains(&symbol_cfg.risk_per_trade) {
            return Err(StartupError::RiskPerTradeOutOfBounds {
                symbol: symbol_cfg.symbol.clone(),
            });
        }
    }
    Ok(())
}
