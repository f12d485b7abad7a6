// =============================================================================
// Market Observer — two-timeframe regime classification
// =============================================================================
//
// Produces a cycle-local `MarketState` for one symbol:
//
//   primary    — TREND when |trend_strength| >= 0.0006 on H1, else RANGE
//   secondary  — volatility bucket from ATR(M15) / last close:
//                  > 0.004  => HIGH_VOL
//                  < 0.0015 => LOW_VOL
//                  else     => MIXED
//   confidence — min(1, |trend| * 1000 + 0.2 when inside a session)
// =============================================================================

use chrono::{DateTime, Utc};

use crate::config::BotConfig;
use crate::indicators::atr::atr;
use crate::indicators::ema::trend_strength;
use crate::indicators::range::range_compression;
use crate::models::{Bar, MarketState, Regime};
use crate::sessions::{in_sessions, SESSION_OFF};

/// Trend threshold on the H1 fast/slow EMA spread.
pub const TREND_THRESHOLD: f64 = 0.0006;

pub struct MarketObserver {
    config: BotConfig,
}

impl MarketObserver {
    pub fn new(config: BotConfig) -> Self {
        Self { config }
    }

    pub fn evaluate(
        &self,
        symbol: &str,
        bars_m15: &[Bar],
        bars_h1: &[Bar],
        now: DateTime<Utc>,
    ) -> MarketState {
        let trend = trend_strength(bars_h1, 20, 50);
        let volatility = atr(bars_m15, 14);
        let compression = range_compression(bars_m15, 20);
        let session = in_sessions(now, &self.config.sessions, &self.config.default_timezone);

        let mut return_1 = 0.0;
        if bars_m15.len() >= 2 {
            let prev = bars_m15[bars_m15.len() - 2].close;
            let last = bars_m15[bars_m15.len() - 1].close;
            return_1 = (last - prev) / if prev != 0.0 { prev } else { 1.0 };
        }

        let mut primary = Regime::Range;
        let mut secondary = Regime::LowVol;
        let mut notes = Vec::new();

        if trend.abs() >= TREND_THRESHOLD {
            primary = Regime::Trend;
            notes.push("trend_strength".to_string());
        }
        if volatility > 0.0 {
            let last_close = bars_m15.last().map(|b| b.close).unwrap_or(1.0);
            let vol_ratio = volatility / if last_close != 0.0 { last_close } else { 1.0 };
            secondary = if vol_ratio > 0.004 {
                Regime::HighVol
            } else if vol_ratio < 0.0015 {
                Regime::LowVol
            } else {
                Regime::Mixed
            };
        }

        if primary == Regime::Trend && compression < 0.001 {
            notes.push("clean_trend".to_string());
        }
        if primary == Regime::Range && compression < 0.001 {
            notes.push("tight_range".to_string());
        }

        let session_bonus = if session != SESSION_OFF { 0.2 } else { 0.0 };
        let confidence = (trend.abs() * 1000.0 + session_bonus).min(1.0);

        MarketState {
            symbol: symbol.to_string(),
            time: now,
            regime_primary: primary,
            regime_secondary: secondary,
            trend_strength: trend,
            volatility,
            range_compression: compression,
            return_1,
            session,
            confidence,
            notes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveTime, TimeZone};

    use crate::config::SessionConfig;

    fn bars(closes: &[f64], span: f64) -> Vec<Bar> {
        closes
            .iter()
            .enumerate()
            .map(|(i, &c)| Bar {
                time: Utc
                    .with_ymd_and_hms(2026, 1, 28, 0, 0, 0)
                    .unwrap()
                    + chrono::Duration::minutes(15 * i as i64),
                open: c,
                high: c + span,
                low: c - span,
                close: c,
                volume: 100.0,
            })
            .collect()
    }

    fn observer() -> MarketObserver {
        let mut config = BotConfig::default();
        config.default_timezone = "UTC".to_string();
        config.sessions = vec![SessionConfig {
            name: "LONDON".to_string(),
            start: NaiveTime::from_hms_opt(7, 0, 0).unwrap(),
            end: NaiveTime::from_hms_opt(17, 0, 0).unwrap(),
        }];
        MarketObserver::new(config)
    }

    #[test]
    fn trending_series_classifies_as_trend() {
        let h1: Vec<f64> = (0..80).map(|i| 1.1 + i as f64 * 0.0008).collect();
        let m15: Vec<f64> = (0..80).map(|i| 1.1 + i as f64 * 0.0001).collect();
        let now = Utc.with_ymd_and_hms(2026, 1, 28, 9, 0, 0).unwrap();
        let state = observer().evaluate("EURUSD", &bars(&m15, 0.0005), &bars(&h1, 0.0005), now);
        assert_eq!(state.regime_primary, Regime::Trend);
        assert!(state.trend_strength > 0.0);
        assert_eq!(state.session, "LONDON");
        assert!(state.confidence > 0.2);
    }

    #[test]
    fn flat_series_classifies_as_range() {
        let closes = vec![1.1; 80];
        let now = Utc.with_ymd_and_hms(2026, 1, 28, 9, 0, 0).unwrap();
        let state = observer().evaluate("EURUSD", &bars(&closes, 0.0005), &bars(&closes, 0.0005), now);
        assert_eq!(state.regime_primary, Regime::Range);
        assert_eq!(state.trend_strength, 0.0);
    }

    #[test]
    fn secondary_buckets_follow_vol_ratio() {
        // span 0.005 on a 1.1 price => ATR/close ~ 0.009 => HIGH_VOL
        let closes = vec![1.1; 80];
        let now = Utc.with_ymd_and_hms(2026, 1, 28, 9, 0, 0).unwrap();
        let state = observer().evaluate("EURUSD", &bars(&closes, 0.005), &bars(&closes, 0.005), now);
        assert_eq!(state.regime_secondary, Regime::HighVol);

        // span 0.0005 => ATR/close ~ 0.0009 => LOW_VOL
        let state = observer().evaluate("EURUSD", &bars(&closes, 0.0005), &bars(&closes, 0.0005), now);
        assert_eq!(state.regime_secondary, Regime::LowVol);
    }

    #[test]
    fn off_session_reduces_confidence() {
        let closes = vec![1.1; 80];
        let now = Utc.with_ymd_and_hms(2026, 1, 28, 3, 0, 0).unwrap();
        let state = observer().evaluate("EURUSD", &bars(&closes, 0.0005), &bars(&closes, 0.0005), now);
        assert_eq!(state.session, SESSION_OFF);
        assert_eq!(state.confidence, 0.0);
    }
}
