// =============================================================================
// Supply-and-demand zone models
// =============================================================================

use chrono::{DateTime, Utc};
use serde::Deserialize;

/// Which side of the book the zone represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZoneKind {
    Demand,
    Supply,
}

impl std::fmt::Display for ZoneKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Demand => write!(f, "DEMAND"),
            Self::Supply => write!(f, "SUPPLY"),
        }
    }
}

/// A detected zone. Cycle-local: zones are re-detected from HTF bars on every
/// evaluation pass and never cached by the engine.
#[derive(Debug, Clone)]
pub struct Zone {
    pub id: String,
    pub symbol: String,
    pub kind: ZoneKind,
    pub timeframe: String,
    pub created_at: DateTime<Utc>,
    pub lower: f64,
    pub upper: f64,
    pub base_start: DateTime<Utc>,
    pub base_end: DateTime<Utc>,
    pub impulse_size: f64,
    /// ATR at detection time, used for scoring and stop buffers.
    pub atr: f64,
    pub score: f64,
    pub touches: u32,
    pub active: bool,
    pub notes: Vec<String>,
}

impl Zone {
    pub fn width(&self) -> f64 {
        (self.upper - self.lower).max(0.0)
    }

    pub fn contains(&self, price: f64) -> bool {
        self.lower <= price && price <= self.upper
    }
}

/// Whether the proximal zone edge is drawn from candle bodies or full wicks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ZoneBodyRule {
    #[default]
    Body,
    Wick,
}

fn default_base_min() -> usize {
    1
}

fn default_base_max() -> usize {
    4
}

fn default_impulsive_min_candles() -> usize {
    2
}

fn default_impulse_atr_mult() -> f64 {
    1.5
}

fn default_impulse_min_pips() -> f64 {
    8.0
}

fn default_max_base_atr_mult() -> f64 {
    1.0
}

fn default_max_touches() -> u32 {
    2
}

fn default_overlap_threshold() -> f64 {
    0.4
}

/// Pattern-recognition parameters for the zone detector.
#[derive(Debug, Clone, Deserialize)]
pub struct ZoneConfig {
    #[serde(default = "default_base_min")]
    pub base_min: usize,
    #[serde(default = "default_base_max")]
    pub base_max: usize,
    #[serde(default = "default_impulsive_min_candles")]
    pub impulsive_min_candles: usize,
    #[serde(default = "default_impulse_atr_mult")]
    pub impulse_atr_mult: f64,
    #[serde(default = "default_impulse_min_pips")]
    pub impulse_min_pips: f64,
    #[serde(default = "default_max_base_atr_mult")]
    pub max_base_atr_mult: f64,
    #[serde(default = "default_max_touches")]
    pub max_touches: u32,
    #[serde(default = "default_overlap_threshold")]
    pub overlap_threshold: f64,
    #[serde(default)]
    pub zone_body_rule: ZoneBodyRule,
}

impl Default for ZoneConfig {
    fn default() -> Self {
        Self {
            base_min: default_base_min(),
            base_max: default_base_max(),
            impulsive_min_candles: default_impulsive_min_candles(),
            impulse_atr_mult: default_impulse_atr_mult(),
            impulse_min_pips: default_impulse_min_pips(),
            max_base_atr_mult: default_max_base_atr_mult(),
            max_touches: default_max_touches(),
            overlap_threshold: default_overlap_threshold(),
            zone_body_rule: ZoneBodyRule::Body,
        }
    }
}
