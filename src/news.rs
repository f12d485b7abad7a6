// =============================================================================
// News risk filter
// =============================================================================
//
// Blocks entries inside a [pre, post] window around scheduled macro events.
// The schedule is a JSON file, either `{"events": [...]}` or a bare list:
//
//   { "events": [ { "time": "2026-01-28T13:30:00Z",
//                   "impact": "high",
//                   "symbols": ["EURUSD", "XAUUSD"],
//                   "title": "FOMC" } ] }
//
// Events without a symbol list apply to the whole universe. Symbols are
// normalized to their six-letter core before matching.

use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use tracing::info;

use crate::pips::normalize_symbol;

#[derive(Debug, Clone, Deserialize)]
struct RawEvent {
    time: Option<String>,
    #[serde(default)]
    impact: Option<String>,
    #[serde(default)]
    symbols: Vec<String>,
    #[serde(default)]
    title: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum RawSchedule {
    Wrapped { events: Vec<RawEvent> },
    Bare(Vec<RawEvent>),
}

#[derive(Debug, Clone)]
pub struct NewsEvent {
    pub time: DateTime<Utc>,
    pub impact: String,
    pub symbols: Vec<String>,
    pub title: String,
}

pub struct NewsRiskFilter {
    pre_minutes: i64,
    post_minutes: i64,
    events: Vec<NewsEvent>,
}

impl NewsRiskFilter {
    pub fn new(pre_minutes: i64, post_minutes: i64) -> Self {
        Self {
            pre_minutes,
            post_minutes,
            events: Vec::new(),
        }
    }

    /// Add a high-impact, universe-wide event. Used by tests and backtests.
    pub fn add_event(&mut self, time: DateTime<Utc>) {
        self.events.push(NewsEvent {
            time,
            impact: "high".to_string(),
            symbols: Vec::new(),
            title: String::new(),
        });
    }

    /// Load the schedule file. A missing path or file leaves the filter empty.
    pub fn load_schedule(&mut self, path: Option<&str>) -> Result<()> {
        let Some(path) = path else { return Ok(()) };
        if !Path::new(path).exists() {
            return Ok(());
        }
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read news schedule {path}"))?;
        let schedule: RawSchedule = serde_json::from_str(&raw)
            .with_context(|| format!("failed to parse news schedule {path}"))?;
        let raw_events = match schedule {
            RawSchedule::Wrapped { events } => events,
            RawSchedule::Bare(events) => events,
        };

        self.events = raw_events
            .into_iter()
            .filter_map(|event| {
                let time_raw = event.time?;
                let time = DateTime::parse_from_rfc3339(&time_raw)
                    .ok()?
                    .with_timezone(&Utc);
                Some(NewsEvent {
                    time,
                    impact: event.impact.unwrap_or_else(|| "high".to_string()),
                    symbols: event.symbols.iter().map(|s| normalize_symbol(s)).collect(),
                    title: event.title.unwrap_or_default(),
                })
            })
            .collect();
        info!(events = self.events.len(), path, "news schedule loaded");
        Ok(())
    }

    /// True when `now` falls inside the risk window of any matching event.
    /// With "high" sensitivity only high-impact events are considered.
    pub fn in_risk_window(
        &self,
        now: DateTime<Utc>,
        symbol: Option<&str>,
        sensitivity: &str,
    ) -> bool {
        let base_symbol = symbol.map(normalize_symbol).unwrap_or_default();
        for event in &self.events {
            if event.impact != "high" && sensitivity == "high" {
                continue;
            }
            let start = event.time - Duration::minutes(self.pre_minutes);
            let end = event.time + Duration::minutes(self.post_minutes);
            if start <= now && now <= end {
                if event.symbols.is_empty() || event.symbols.iter().any(|s| *s == base_symbol) {
                    return true;
                }
            }
        }
        false
    }
}
