// =============================================================================
// Rolling range helpers
// =============================================================================

use crate::models::Bar;

/// Highest high and lowest low over the last `lookback` bars.
/// Returns (0.0, 0.0) on an empty series.
pub fn rolling_high_low(bars: &[Bar], lookback: usize) -> (f64, f64) {
    if bars.is_empty() {
        return (0.0, 0.0);
    }
    let start = bars.len().saturating_sub(lookback);
    let window = &bars[start..];
    let high = window.iter().map(|b| b.high).fold(f64::MIN, f64::max);
    let low = window.iter().map(|b| b.low).fold(f64::MAX, f64::min);
    (high, low)
}

/// Coefficient of variation of the last `lookback` closes: std(close)/mean.
/// Low values indicate a compressed range. Returns 0.0 when fewer than
/// `lookback` bars are available.
pub fn range_compression(bars: &[Bar], lookback: usize) -> f64 {
    if bars.len() < lookback {
        return 0.0;
    }
    let closes: Vec<f64> = bars[bars.len() - lookback..]
        .iter()
        .map(|b| b.close)
        .collect();
    let mean = closes.iter().sum::<f64>() / closes.len() as f64;
    if mean == 0.0 {
        return 0.0;
    }
    let variance =
        closes.iter().map(|c| (c - mean) * (c - mean)).sum::<f64>() / closes.len() as f64;
    variance.sqrt() / mean
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn bar(high: f64, low: f64, close: f64) -> Bar {
        Bar {
            time: Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap(),
            open: close,
            high,
            low,
            close,
            volume: 100.0,
        }
    }

    #[test]
    fn high_low_over_window() {
        let bars = vec![
            bar(1.10, 1.08, 1.09),
            bar(1.12, 1.09, 1.11),
            bar(1.11, 1.07, 1.08),
        ];
        let (h, l) = rolling_high_low(&bars, 3);
        assert_eq!(h, 1.12);
        assert_eq!(l, 1.07);
    }

    #[test]
    fn high_low_empty() {
        assert_eq!(rolling_high_low(&[], 20), (0.0, 0.0));
    }

    #[test]
    fn compression_flat_series_is_zero() {
        let bars = vec![bar(1.1, 1.1, 1.1); 20];
        assert!(range_compression(&bars, 20) < 1e-12);
    }

    #[test]
    fn compression_insufficient_is_zero() {
        let bars = vec![bar(1.1, 1.0, 1.05); 5];
        assert_eq!(range_compression(&bars, 20), 0.0);
    }
}
