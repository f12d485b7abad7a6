// =============================================================================
// Supply-and-Demand Module
// =============================================================================
//
// Zone detection, scoring, confirmation and configuration for the
// supply-and-demand strategy. Zones are cycle-local values produced from HTF
// bars; nothing here is persisted across evaluation cycles.

pub mod config;
pub mod confirmation;
pub mod zone_detector;
pub mod zone_models;
