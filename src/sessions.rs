// =============================================================================
// Session classification
// =============================================================================
//
// Converts a UTC timestamp into the configured timezone and matches it against
// the session windows. Windows that cross midnight (start > end) wrap around.

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use tracing::warn;

use crate::config::SessionConfig;

/// Label outside every configured window.
pub const SESSION_OFF: &str = "OFF";

/// Name of the session containing `now`, or `"OFF"`.
pub fn in_sessions(now: DateTime<Utc>, sessions: &[SessionConfig], timezone: &str) -> String {
    let tz: Tz = match timezone.parse() {
        Ok(tz) => tz,
        Err(_) => {
            warn!(timezone, "unknown timezone, falling back to UTC");
            chrono_tz::UTC
        }
    };
    let current = now.with_timezone(&tz).time();

    for session in sessions {
        let inside = if session.start <= session.end {
            session.start <= current && current <= session.end
        } else {
            current >= session.start || current <= session.end
        };
        if inside {
            return session.name.clone();
        }
    }
    SESSION_OFF.to_string()
}
