// =============================================================================
// Strategy Module
// =============================================================================
//
// Every strategy exposes one operation: given the observed market state and
// bar history, optionally produce a `Signal`. Multiple strategies can be
// enabled at once; the evaluation loop picks the best candidate per symbol by
// confidence and arbitrates across symbols afterwards.

pub mod range;
pub mod supply_demand;
pub mod trend;

use std::collections::HashMap;

use crate::broker::SymbolInfo;
use crate::models::{Bar, MarketState, Signal};

/// Read-only bundle of extra inputs a strategy may need beyond the two core
/// timeframes: bars at additional timeframes keyed by name, and the broker's
/// symbol parameters.
#[derive(Default)]
pub struct StrategyContext<'a> {
    pub bars_by_timeframe: HashMap<&'a str, &'a [Bar]>,
    pub symbol_info: Option<&'a SymbolInfo>,
}

pub trait Strategy {
    fn name(&self) -> &'static str;

    fn generate(
        &self,
        state: &MarketState,
        bars_m15: &[Bar],
        bars_h1: &[Bar],
        context: &StrategyContext<'_>,
    ) -> Option<Signal>;
}
