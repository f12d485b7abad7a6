// =============================================================================
// Zone detector — impulse / base / impulse pattern recognition
// =============================================================================
//
// Scans HTF bars for the two classic supply-and-demand patterns:
//
//   DBR (demand) — a bearish drop candle, a short base, then at least
//                  `impulsive_min_candles` bullish candles rallying away.
//   RBD (supply) — the mirrored rally / base / drop.
//
// The move away from the base must clear both the ATR-scaled and the
// pip-floor impulse thresholds. Candidates are scored and then greedily
// de-overlapped, best score first.
// =============================================================================

use crate::indicators::atr::atr as atr_calc;
use crate::models::Bar;
use crate::snd::zone_models::{Zone, ZoneBodyRule, ZoneConfig, ZoneKind};

const EPSILON: f64 = 1e-6;

#[derive(Debug, Clone)]
pub struct ZoneDetectionResult {
    pub zones: Vec<Zone>,
    pub atr: f64,
}

fn body_high(bar: &Bar) -> f64 {
    bar.open.max(bar.close)
}

fn body_low(bar: &Bar) -> f64 {
    bar.open.min(bar.close)
}

/// Count candles closing in `direction` (+1 bullish, -1 bearish).
fn impulsive_candles(bars: &[Bar], direction: i32) -> usize {
    bars.iter()
        .filter(|b| {
            if direction > 0 {
                b.close > b.open
            } else {
                b.close < b.open
            }
        })
        .count()
}

fn overlap_ratio(a: &Zone, b: &Zone) -> f64 {
    if a.upper <= b.lower || b.upper <= a.lower {
        return 0.0;
    }
    let overlap = a.upper.min(b.upper) - a.lower.max(b.lower);
    overlap / a.width().max(b.width()).max(1e-9)
}

/// Deterministic zone quality score in [0, 1]:
///   0.6 * impulse strength + 0.3 * freshness + 0.1 * narrowness.
pub fn score_zone(zone: &Zone) -> f64 {
    let reference = (zone.atr * 2.0).max(EPSILON);
    let impulse_score = (zone.impulse_size / reference).min(1.0);
    let freshness_score = (1.0 - zone.touches as f64 * 0.4).max(0.0);
    let width_penalty = (zone.width() / reference).min(1.0);
    let score = 0.6 * impulse_score + 0.3 * freshness_score + 0.1 * (1.0 - width_penalty);
    score.clamp(0.0, 1.0)
}

/// Detect zones on a HTF bar series.
pub fn detect_zones(
    symbol: &str,
    timeframe: &str,
    bars: &[Bar],
    cfg: &ZoneConfig,
    atr_period: usize,
    pip_size: f64,
) -> ZoneDetectionResult {
    let mut zones: Vec<Zone> = Vec::new();
    if bars.len() < cfg.base_max + cfg.impulsive_min_candles + 2 {
        return ZoneDetectionResult { zones, atr: 0.0 };
    }

    let atr_val = atr_calc(bars, atr_period);
    let impulse_floor = (cfg.impulse_atr_mult * atr_val).max(cfg.impulse_min_pips * pip_size);

    for i in cfg.base_min..bars.len() - cfg.impulsive_min_candles - 1 {
        for base_len in cfg.base_min..=cfg.base_max {
            let Some(start) = (i + 1).checked_sub(base_len) else {
                continue;
            };
            if start < 1 {
                continue;
            }
            let base = &bars[start..=i];
            let base_high = base.iter().map(|b| b.high).fold(f64::MIN, f64::max);
            let base_low = base.iter().map(|b| b.low).fold(f64::MAX, f64::min);
            let base_range = base_high - base_low;
            if atr_val > 0.0 && base_range > cfg.max_base_atr_mult * atr_val {
                continue;
            }

            let before = &bars[start - 1];
            let after = &bars[i + 1..i + 1 + cfg.impulsive_min_candles];

            // Demand: drop -> base -> rally (DBR)
            let drop = before.close < before.open;
            let rally = impulsive_candles(after, 1) >= cfg.impulsive_min_candles;
            let move_away = after[after.len() - 1].close - base_high;
            if drop && rally && move_away >= impulse_floor {
                let (lower, upper) = match cfg.zone_body_rule {
                    ZoneBodyRule::Wick => (base_low, base_high),
                    ZoneBodyRule::Body => (
                        base_low,
                        base.iter().map(body_high).fold(f64::MIN, f64::max),
                    ),
                };
                let mut zone = Zone {
                    id: format!("{symbol}-{timeframe}-D-{}", bars[i].time.timestamp()),
                    symbol: symbol.to_string(),
                    kind: ZoneKind::Demand,
                    timeframe: timeframe.to_string(),
                    created_at: bars[i].time,
                    lower,
                    upper,
                    base_start: base[0].time,
                    base_end: base[base.len() - 1].time,
                    impulse_size: move_away,
                    atr: atr_val,
                    score: 0.0,
                    touches: 0,
                    active: true,
                    notes: vec!["DBR".to_string()],
                };
                zone.score = score_zone(&zone);
                zones.push(zone);
            }

            // Supply: rally -> base -> drop (RBD)
            let rally_before = before.close > before.open;
            let drop_after = impulsive_candles(after, -1) >= cfg.impulsive_min_candles;
            let move_away_supply = base_low - after[after.len() - 1].close;
            if rally_before && drop_after && move_away_supply >= impulse_floor {
                let (lower, upper) = match cfg.zone_body_rule {
                    ZoneBodyRule::Wick => (base_low, base_high),
                    ZoneBodyRule::Body => (
                        base.iter().map(body_low).fold(f64::MAX, f64::min),
                        base_high,
                    ),
                };
                let mut zone = Zone {
                    id: format!("{symbol}-{timeframe}-S-{}", bars[i].time.timestamp()),
                    symbol: symbol.to_string(),
                    kind: ZoneKind::Supply,
                    timeframe: timeframe.to_string(),
                    created_at: bars[i].time,
                    lower,
                    upper,
                    base_start: base[0].time,
                    base_end: base[base.len() - 1].time,
                    impulse_size: move_away_supply,
                    atr: atr_val,
                    score: 0.0,
                    touches: 0,
                    active: true,
                    notes: vec!["RBD".to_string()],
                };
                zone.score = score_zone(&zone);
                zones.push(zone);
            }
        }
    }

    // Greedy non-overlapping selection, best score first.
    zones.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    let mut filtered: Vec<Zone> = Vec::new();
    for zone in zones {
        let overlaps = filtered
            .iter()
            .any(|kept| overlap_ratio(&zone, kept) >= cfg.overlap_threshold);
        if !overlaps {
            filtered.push(zone);
        }
    }

    ZoneDetectionResult {
        zones: filtered,
        atr: atr_val,
    }
}

/// Count a touch when `price` sits inside an active zone; deactivate the zone
/// once the touch count exceeds `max_touches`.
pub fn update_zone_touches(zone: &mut Zone, price: f64, cfg: &ZoneConfig) {
    if !zone.active {
        return;
    }
    if zone.contains(price) {
        zone.touches += 1;
        if zone.touches > cfg.max_touches {
            zone.active = false;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    /// Drop, small base, strong rally — the canonical DBR shape.
    fn bars_db_rally() -> Vec<Bar> {
        let mut bars = Vec::new();
        let mut t = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let mut price = 1.1000;
        for _ in 0..2 {
            price -= 0.0010;
            bars.push(Bar {
                time: t,
                open: price + 0.0005,
                high: price + 0.0006,
                low: price - 0.0002,
                close: price,
                volume: 100.0,
            });
            t += Duration::hours(1);
        }
        for _ in 0..2 {
            bars.push(Bar {
                time: t,
                open: price,
                high: price + 0.0002,
                low: price - 0.0002,
                close: price + 0.00005,
                volume: 100.0,
            });
            t += Duration::hours(1);
        }
        for _ in 0..4 {
            price += 0.0010;
            bars.push(Bar {
                time: t,
                open: price - 0.0005,
                high: price + 0.0007,
                low: price - 0.0002,
                close: price,
                volume: 100.0,
            });
            t += Duration::hours(1);
        }
        bars
    }

    fn test_cfg() -> ZoneConfig {
        ZoneConfig {
            base_min: 1,
            base_max: 3,
            impulsive_min_candles: 2,
            impulse_atr_mult: 0.5,
            impulse_min_pips: 5.0,
            ..ZoneConfig::default()
        }
    }

    #[test]
    fn detects_demand_zone_from_dbr() {
        let bars = bars_db_rally();
        let result = detect_zones("EURUSD", "H4", &bars, &test_cfg(), 14, 0.0001);
        assert!(result.zones.iter().any(|z| z.kind == ZoneKind::Demand));
    }

    #[test]
    fn zone_invariants_hold() {
        let bars = bars_db_rally();
        let cfg = test_cfg();
        let result = detect_zones("EURUSD", "H4", &bars, &cfg, 14, 0.0001);
        for zone in &result.zones {
            assert!(zone.lower <= zone.upper);
            assert!(zone.score >= 0.0 && zone.score <= 1.0);
        }
        for (i, a) in result.zones.iter().enumerate() {
            for b in &result.zones[i + 1..] {
                assert!(overlap_ratio(a, b) < cfg.overlap_threshold);
            }
        }
    }

    #[test]
    fn touch_count_deactivates_zone() {
        let bars = bars_db_rally();
        let cfg = ZoneConfig {
            max_touches: 1,
            ..ZoneConfig::default()
        };
        let result = detect_zones("EURUSD", "H4", &bars, &cfg, 14, 0.0001);
        let mut zone = result.zones[0].clone();
        let mid = (zone.lower + zone.upper) / 2.0;
        update_zone_touches(&mut zone, mid, &cfg);
        assert!(zone.active);
        update_zone_touches(&mut zone, mid, &cfg);
        assert!(!zone.active);
    }

    #[test]
    fn touches_outside_zone_are_ignored() {
        let bars = bars_db_rally();
        let cfg = ZoneConfig {
            max_touches: 1,
            ..ZoneConfig::default()
        };
        let result = detect_zones("EURUSD", "H4", &bars, &cfg, 14, 0.0001);
        let mut zone = result.zones[0].clone();
        let price = zone.upper + 1.0;
        update_zone_touches(&mut zone, price, &cfg);
        assert_eq!(zone.touches, 0);
        assert!(zone.active);
    }

    #[test]
    fn short_series_yields_nothing() {
        let bars = bars_db_rally()[..4].to_vec();
        let result = detect_zones("EURUSD", "H4", &bars, &test_cfg(), 14, 0.0001);
        assert!(result.zones.is_empty());
    }
}
