// =============================================================================
// ML filter — pluggable candidate scorer
// =============================================================================
//
// The evaluation loop multiplies strategy confidence by the filter score when
// arbitrating across symbols. The default implementation is a pass-through;
// a thresholded rule proxy is available for configurations that want the gate
// active without a trained model.

use crate::models::{MarketState, Signal};

#[derive(Debug, Clone)]
pub struct MlDecision {
    pub approved: bool,
    pub score: f64,
    pub reason: &'static str,
}

pub trait MlFilter {
    fn score(&self, signal: &Signal, state: &MarketState) -> MlDecision;
}

/// Approves everything with a neutral score.
#[derive(Debug, Default)]
pub struct PassthroughFilter;

impl MlFilter for PassthroughFilter {
    fn score(&self, _signal: &Signal, _state: &MarketState) -> MlDecision {
        MlDecision {
            approved: true,
            score: 0.5,
            reason: "ml_disabled",
        }
    }
}

/// Gates on the signal's own confidence until a real model is plugged in.
#[derive(Debug)]
pub struct ThresholdFilter {
    pub min_score: f64,
}

impl ThresholdFilter {
    pub fn new(min_score: f64) -> Self {
        Self { min_score }
    }
}

impl MlFilter for ThresholdFilter {
    fn score(&self, signal: &Signal, _state: &MarketState) -> MlDecision {
        let score = signal.confidence.clamp(0.0, 1.0);
        MlDecision {
            approved: score >= self.min_score,
            score,
            reason: "rule_proxy",
        }
    }
}
