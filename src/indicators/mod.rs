// =============================================================================
// Technical Indicators Module
// =============================================================================
//
// Pure, side-effect-free building blocks for the market observer and the
// strategies. Each function degrades to a documented neutral value on
// insufficient data so callers never have to special-case short histories.

pub mod atr;
pub mod ema;
pub mod range;
pub mod rsi;
