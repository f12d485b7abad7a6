// =============================================================================
// Entry confirmation on the lower timeframe
// =============================================================================
//
// A zone only becomes an entry once the LTF agrees. Checks are independently
// configurable; `confirmation_passed` is the logical AND of every enabled
// check and passes trivially when none are enabled.
//
//   BOS       — break of structure: last close beyond the prior swing
//               high (demand) or low (supply).
//   Rejection — wick/body asymmetry in the zone's favour on the last candle.
//   Nested    — reserved hook for LTF zone-in-zone detection; passes.

use serde::Deserialize;

use crate::models::Bar;
use crate::snd::zone_models::{Zone, ZoneKind};

fn default_true() -> bool {
    true
}

fn default_wick_body_ratio() -> f64 {
    2.0
}

fn default_swing_lookback() -> usize {
    5
}

#[derive(Debug, Clone, Deserialize)]
pub struct ConfirmationConfig {
    #[serde(default = "default_true")]
    pub require_bos: bool,
    #[serde(default)]
    pub require_rejection: bool,
    #[serde(default)]
    pub require_nested_zone: bool,
    #[serde(default = "default_wick_body_ratio")]
    pub wick_body_ratio: f64,
    #[serde(default = "default_swing_lookback")]
    pub swing_lookback: usize,
}

impl Default for ConfirmationConfig {
    fn default() -> Self {
        Self {
            require_bos: true,
            require_rejection: false,
            require_nested_zone: false,
            wick_body_ratio: default_wick_body_ratio(),
            swing_lookback: default_swing_lookback(),
        }
    }
}

fn swing_high(bars: &[Bar], lookback: usize) -> Option<f64> {
    if bars.len() < lookback + 2 {
        return None;
    }
    bars[bars.len() - lookback..]
        .iter()
        .map(|b| b.high)
        .fold(None, |acc, h| Some(acc.map_or(h, |a: f64| a.max(h))))
}

fn swing_low(bars: &[Bar], lookback: usize) -> Option<f64> {
    if bars.len() < lookback + 2 {
        return None;
    }
    bars[bars.len() - lookback..]
        .iter()
        .map(|b| b.low)
        .fold(None, |acc, l| Some(acc.map_or(l, |a: f64| a.min(l))))
}

/// Break of structure against the swing formed before the last candle.
pub fn bos_confirmed(bars: &[Bar], zone: &Zone, cfg: &ConfirmationConfig) -> bool {
    if bars.len() < cfg.swing_lookback + 2 {
        return false;
    }
    let last = &bars[bars.len() - 1];
    let prior = &bars[..bars.len() - 1];
    match zone.kind {
        ZoneKind::Demand => match swing_high(prior, cfg.swing_lookback) {
            Some(high) => last.close > high,
            None => false,
        },
        ZoneKind::Supply => match swing_low(prior, cfg.swing_lookback) {
            Some(low) => last.close < low,
            None => false,
        },
    }
}

/// Wick rejection: long lower wick with a bullish close for demand, long
/// upper wick with a bearish close for supply.
pub fn rejection_confirmed(bars: &[Bar], zone: &Zone, cfg: &ConfirmationConfig) -> bool {
    let Some(last) = bars.last() else {
        return false;
    };
    let body = (last.close - last.open).abs();
    let upper_wick = last.high - last.open.max(last.close);
    let lower_wick = last.open.min(last.close) - last.low;
    match zone.kind {
        ZoneKind::Demand => lower_wick > body * cfg.wick_body_ratio && last.close > last.open,
        ZoneKind::Supply => upper_wick > body * cfg.wick_body_ratio && last.close < last.open,
    }
}

/// AND of every enabled check; true when none are enabled.
pub fn confirmation_passed(bars: &[Bar], zone: &Zone, cfg: &ConfirmationConfig) -> bool {
    if cfg.require_bos && !bos_confirmed(bars, zone, cfg) {
        return false;
    }
    if cfg.require_rejection && !rejection_confirmed(bars, zone, cfg) {
        return false;
    }
    // require_nested_zone is a reserved hook: nested LTF zone detection is not
    // implemented yet and the check passes.
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration, TimeZone, Utc};

    fn zone(kind: ZoneKind, t: DateTime<Utc>) -> Zone {
        Zone {
            id: "z1".to_string(),
            symbol: "EURUSD".to_string(),
            kind,
            timeframe: "H4".to_string(),
            created_at: t,
            lower: 1.095,
            upper: 1.097,
            base_start: t,
            base_end: t,
            impulse_size: 0.01,
            atr: 0.001,
            score: 0.8,
            touches: 0,
            active: true,
            notes: vec![],
        }
    }

    /// Gentle climb, then a final candle closing above the prior swing high.
    fn bars_bos() -> Vec<Bar> {
        let mut bars = Vec::new();
        let mut t = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let mut price = 1.1000;
        for _ in 0..8 {
            price += 0.0002;
            bars.push(Bar {
                time: t,
                open: price - 0.0001,
                high: price + 0.0002,
                low: price - 0.0002,
                close: price,
                volume: 100.0,
            });
            t += Duration::minutes(15);
        }
        price += 0.0005;
        bars.push(Bar {
            time: t,
            open: price - 0.0001,
            high: price + 0.0003,
            low: price - 0.0002,
            close: price,
            volume: 100.0,
        });
        bars
    }

    #[test]
    fn bos_on_break_of_swing_high() {
        let bars = bars_bos();
        let z = zone(ZoneKind::Demand, bars[0].time);
        let cfg = ConfirmationConfig::default();
        assert!(bos_confirmed(&bars, &z, &cfg));
    }

    #[test]
    fn bos_is_idempotent_on_closed_bars() {
        let bars = bars_bos();
        let z = zone(ZoneKind::Demand, bars[0].time);
        let cfg = ConfirmationConfig::default();
        assert_eq!(bos_confirmed(&bars, &z, &cfg), bos_confirmed(&bars, &z, &cfg));
    }

    #[test]
    fn bos_needs_enough_bars() {
        let bars = bars_bos()[..3].to_vec();
        let z = zone(ZoneKind::Demand, bars[0].time);
        let cfg = ConfirmationConfig::default();
        assert!(!bos_confirmed(&bars, &z, &cfg));
    }

    #[test]
    fn rejection_long_lower_wick_bullish() {
        let t = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let bar = Bar {
            time: t,
            open: 1.1000,
            high: 1.1010,
            low: 1.0970,
            close: 1.1005,
            volume: 100.0,
        };
        let z = zone(ZoneKind::Demand, t);
        let cfg = ConfirmationConfig {
            require_rejection: true,
            wick_body_ratio: 2.0,
            ..ConfirmationConfig::default()
        };
        assert!(rejection_confirmed(&[bar], &z, &cfg));
    }

    #[test]
    fn no_checks_enabled_passes() {
        let bars = bars_bos();
        let z = zone(ZoneKind::Supply, bars[0].time);
        let cfg = ConfirmationConfig {
            require_bos: false,
            ..ConfirmationConfig::default()
        };
        assert!(confirmation_passed(&bars, &z, &cfg));
    }
}
