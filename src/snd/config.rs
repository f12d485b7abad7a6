// =============================================================================
// Supply-and-demand strategy configuration
// =============================================================================
//
// Loaded from its own JSON file (referenced by `supply_demand_config_path` in
// the main config) so zone parameters can be tuned without touching the
// engine-wide TOML.

use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::snd::confirmation::ConfirmationConfig;
use crate::snd::zone_models::ZoneConfig;

fn default_htf_timeframes() -> Vec<String> {
    vec!["H4".to_string()]
}

fn default_ltf_timeframe() -> String {
    "M15".to_string()
}

fn default_true() -> bool {
    true
}

fn default_top_k_zones() -> usize {
    3
}

fn default_sl_buffer_atr() -> f64 {
    0.3
}

fn default_sl_buffer_pips() -> f64 {
    5.0
}

fn default_sl_buffer_spread_mult() -> f64 {
    1.5
}

fn default_min_rr() -> f64 {
    2.0
}

fn default_partial_tp_rr() -> f64 {
    1.0
}

fn default_partial_tp_pct() -> f64 {
    0.5
}

#[derive(Debug, Clone, Deserialize)]
pub struct SupplyDemandConfig {
    #[serde(default)]
    pub enable: bool,
    #[serde(default = "default_htf_timeframes")]
    pub htf_timeframes: Vec<String>,
    #[serde(default = "default_ltf_timeframe")]
    pub ltf_timeframe: String,
    #[serde(default = "default_true")]
    pub scan_on_close: bool,
    #[serde(default = "default_top_k_zones")]
    pub top_k_zones: usize,
    #[serde(default)]
    pub allow_neutral_trend: bool,
    #[serde(default)]
    pub allow_blind_entries: bool,
    #[serde(default = "default_sl_buffer_atr")]
    pub sl_buffer_atr: f64,
    #[serde(default = "default_sl_buffer_pips")]
    pub sl_buffer_pips: f64,
    #[serde(default = "default_sl_buffer_spread_mult")]
    pub sl_buffer_spread_mult: f64,
    #[serde(default = "default_min_rr")]
    pub min_rr: f64,
    #[serde(default = "default_true")]
    pub partial_tp: bool,
    #[serde(default = "default_partial_tp_rr")]
    pub partial_tp_rr: f64,
    #[serde(default = "default_partial_tp_pct")]
    pub partial_tp_pct: f64,
    #[serde(default)]
    pub confirmation: ConfirmationConfig,
    #[serde(default)]
    pub zone: ZoneConfig,
}

impl Default for SupplyDemandConfig {
    fn default() -> Self {
        Self {
            enable: false,
            htf_timeframes: default_htf_timeframes(),
            ltf_timeframe: default_ltf_timeframe(),
            scan_on_close: true,
            top_k_zones: default_top_k_zones(),
            allow_neutral_trend: false,
            allow_blind_entries: false,
            sl_buffer_atr: default_sl_buffer_atr(),
            sl_buffer_pips: default_sl_buffer_pips(),
            sl_buffer_spread_mult: default_sl_buffer_spread_mult(),
            min_rr: default_min_rr(),
            partial_tp: true,
            partial_tp_rr: default_partial_tp_rr(),
            partial_tp_pct: default_partial_tp_pct(),
            confirmation: ConfirmationConfig::default(),
            zone: ZoneConfig::default(),
        }
    }
}

/// Load the strategy config; a missing path or file yields the defaults.
pub fn load_supply_demand_config(path: Option<&str>) -> Result<SupplyDemandConfig> {
    let Some(path) = path else {
        return Ok(SupplyDemandConfig::default());
    };
    if !Path::new(path).exists() {
        return Ok(SupplyDemandConfig::default());
    }
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read supply-demand config {path}"))?;
    let config: SupplyDemandConfig = serde_json::from_str(&raw)
        .with_context(|| format!("failed to parse supply-demand config {path}"))?;
    Ok(config)
}
