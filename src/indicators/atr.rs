// =============================================================================
// Average True Range (ATR)
// =============================================================================
//
// ATR measures volatility by decomposing the entire range of a bar.
//
// True Range (TR) for each bar:
//   TR = max(H - L, |H - prevClose|, |L - prevClose|)
// The very first bar has no previous close; its TR is H - L.
//
// The value returned is the arithmetic mean of the last `period` TR values.
// Callers treat 0.0 as "not enough data" — the risk gates reject on it via
// the volatility bounds, so the sentinel never reaches sizing.
// =============================================================================

use crate::models::Bar;

/// Compute ATR over the last `period` bars. Returns 0.0 when fewer than
/// `period + 1` bars are available.
pub fn atr(bars: &[Bar], period: usize) -> f64 {
    if bars.len() < period + 1 {
        return 0.0;
    }

    let mut trs = Vec::with_capacity(bars.len());
    trs.push(bars[0].high - bars[0].low);
    for i in 1..bars.len() {
        let high = bars[i].high;
        let low = bars[i].low;
        let prev_close = bars[i - 1].close;
        let tr = (high - low)
            .max((high - prev_close).abs())
            .max((low - prev_close).abs());
        trs.push(tr);
    }

    let tail = &trs[trs.len() - period..];
    tail.iter().sum::<f64>() / period as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn bar(open: f64, high: f64, low: f64, close: f64) -> Bar {
        Bar {
            time: Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap(),
            open,
            high,
            low,
            close,
            volume: 100.0,
        }
    }

    #[test]
    fn atr_insufficient_data_is_zero() {
        let bars = vec![bar(100.0, 105.0, 95.0, 102.0); 10];
        assert_eq!(atr(&bars, 14), 0.0);
    }

    #[test]
    fn atr_constant_range() {
        // Every bar spans exactly 10 with closes at the midpoint.
        let bars: Vec<Bar> = (0..30)
            .map(|i| {
                let base = 100.0 + i as f64 * 0.1;
                bar(base, base + 5.0, base - 5.0, base)
            })
            .collect();
        let v = atr(&bars, 14);
        assert!((v - 10.0).abs() < 1.0, "expected ATR near 10.0, got {v}");
    }

    #[test]
    fn atr_true_range_uses_prev_close() {
        // Gap up: |H - prevClose| dominates H - L.
        let bars = vec![
            bar(100.0, 105.0, 95.0, 95.0),
            bar(110.0, 115.0, 108.0, 112.0),
            bar(112.0, 118.0, 110.0, 115.0),
            bar(115.0, 120.0, 113.0, 118.0),
        ];
        let v = atr(&bars, 3);
        assert!(v > 7.0, "ATR should reflect the gap, got {v}");
    }

    #[test]
    fn atr_is_positive_on_noisy_series() {
        let bars: Vec<Bar> = (0..50)
            .map(|i| {
                let base = 100.0 + (i as f64 * 0.5).sin() * 10.0;
                bar(base - 0.5, base + 2.0, base - 2.0, base + 0.5)
            })
            .collect();
        assert!(atr(&bars, 14) > 0.0);
    }
}
