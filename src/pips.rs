// =============================================================================
// Pip and point arithmetic
// =============================================================================
//
// A pip is the minimum meaningful quote change for an instrument (0.0001 for
// most FX pairs, 0.01 for yen pairs); a point is the raw tick unit reported by
// the broker. Spread gates can be configured in either unit per symbol.

/// Strip broker suffixes/decorations and upper-case the ticker. Six-letter
/// alphabetic cores ("EURUSDm" -> "EURUSD") are truncated to the core; metals
/// tickers (XAUUSD/XAGUSD) are already six letters and pass through unchanged.
pub fn normalize_symbol(symbol: &str) -> String {
    let letters: String = symbol
        .chars()
        .filter(|c| c.is_ascii_alphabetic())
        .collect::<String>()
        .to_uppercase();
    if letters.len() >= 6 {
        return letters[..6].to_string();
    }
    letters
}

/// Pip size for the instrument given broker digits/point.
pub fn pip_size(symbol: &str, digits: u32, point: f64) -> f64 {
    let base = normalize_symbol(symbol);
    if base.ends_with("JPY") {
        return 0.01;
    }
    // Metals use point-based thresholds; pip size falls back to the point.
    if base == "XAUUSD" || base == "XAGUSD" {
        return point;
    }
    if digits >= 4 {
        0.0001
    } else {
        point
    }
}

pub fn spread_in_pips(bid: f64, ask: f64, symbol: &str, digits: u32, point: f64) -> f64 {
    let pip = pip_size(symbol, digits, point);
    if pip == 0.0 {
        return 0.0;
    }
    (ask - bid) / pip
}

pub fn spread_in_points(bid: f64, ask: f64, point: f64) -> f64 {
    if point == 0.0 {
        return 0.0;
    }
    (ask - bid) / point
}
