// =============================================================================
// Relative Strength Index (RSI)
// =============================================================================
//
// Momentum oscillator on [0, 100]. Computed from the mean gain and mean loss
// over the last `period` close-to-close changes:
//   RS  = avg_gain / avg_loss
//   RSI = 100 - 100 / (1 + RS)
//
// Thresholds used by the strategies: > 70 overbought, < 30 oversold.
// =============================================================================

/// RSI of the last `period` deltas. Returns the neutral value 50.0 when fewer
/// than `period + 1` closes are available, and 100.0 when there are no losses
/// in the window.
pub fn rsi(values: &[f64], period: usize) -> f64 {
    if values.len() < period + 1 {
        return 50.0;
    }

    let window = &values[values.len() - (period + 1)..];
    let mut gain_sum = 0.0;
    let mut loss_sum = 0.0;
    for pair in window.windows(2) {
        let delta = pair[1] - pair[0];
        if delta > 0.0 {
            gain_sum += delta;
        } else {
            loss_sum += -delta;
        }
    }

    let avg_gain = gain_sum / period as f64;
    let avg_loss = loss_sum / period as f64;
    if avg_loss == 0.0 {
        return 100.0;
    }
    let rs = avg_gain / avg_loss;
    100.0 - (100.0 / (1.0 + rs))
}
