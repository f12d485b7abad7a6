// =============================================================================
// Exponentially-weighted moving average and trend strength
// =============================================================================
//
// The EMA here is a weighted backward average over the last `period` values
// with weights exp(x) for x evenly spaced on [-1, 0], normalised to sum to 1.
// Recent values therefore carry roughly e times the weight of the oldest value
// in the window.
//
// `trend_strength` is the classic fast/slow EMA spread on H1 closes:
//   (EMA_fast - EMA_slow) / EMA_slow, with fast=20 and slow=50.
// =============================================================================

use crate::models::Bar;

/// Weighted EMA of the last `period` values. Falls back to the most recent
/// value when the series is shorter than `period`, and 0.0 on an empty series.
pub fn ema(values: &[f64], period: usize) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    if values.len() < period || period <= 1 {
        return values[values.len() - 1];
    }

    let window = &values[values.len() - period..];
    let step = 1.0 / (period - 1) as f64;
    let mut weights = Vec::with_capacity(period);
    for i in 0..period {
        weights.push((-1.0 + i as f64 * step).exp());
    }
    let total: f64 = weights.iter().sum();

    window
        .iter()
        .zip(weights.iter())
        .map(|(v, w)| v * w / total)
        .sum()
}

/// Fast/slow EMA spread on closes, normalised by the slow EMA.
/// Returns 0.0 when fewer than `slow` bars are available.
pub fn trend_strength(bars: &[Bar], fast: usize, slow: usize) -> f64 {
    if bars.len() < slow {
        return 0.0;
    }
    let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
    let fast_ema = ema(&closes, fast);
    let slow_ema = ema(&closes, slow);
    if slow_ema == 0.0 {
        return fast_ema - slow_ema;
    }
    (fast_ema - slow_ema) / slow_ema
}
