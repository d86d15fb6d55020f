//! Time cursors.
//!
//! Every read of the fact base happens at a [`TimeThreshold`]: either the
//! latest state or the state as it was at a specific instant. Facts carry
//! an activation time; a fact is current at a cursor when it is the most
//! recently activated fact for its key not after the cursor.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A point-in-time cursor for reading layered facts.
///
/// # Examples
///
/// ```
/// use stratum::TimeThreshold;
/// use chrono::Utc;
///
/// let latest = TimeThreshold::latest();
/// assert!(latest.is_latest());
///
/// let pinned = TimeThreshold::at_time(Utc::now());
/// assert!(!pinned.is_latest());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "time", rename_all = "snake_case")]
pub enum TimeThreshold {
    /// The most recent state of the fact base.
    Latest,
    /// The state as of a specific instant (inclusive).
    AtTime(DateTime<Utc>),
}

impl TimeThreshold {
    /// Cursor for the most recent state.
    #[must_use]
    pub const fn latest() -> Self {
        Self::Latest
    }

    /// Cursor pinned to a specific instant.
    #[must_use]
    pub const fn at_time(time: DateTime<Utc>) -> Self {
        Self::AtTime(time)
    }

    #[must_use]
    pub const fn is_latest(&self) -> bool {
        matches!(self, Self::Latest)
    }

    /// Returns the pinned instant, if any.
    #[must_use]
    pub const fn time(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Latest => None,
            Self::AtTime(t) => Some(*t),
        }
    }

    /// Whether a fact activated at `activation` is visible at this cursor.
    #[must_use]
    pub fn includes(&self, activation: DateTime<Utc>) -> bool {
        match self {
            Self::Latest => true,
            Self::AtTime(t) => activation <= *t,
        }
    }
}

impl Default for TimeThreshold {
    fn default() -> Self {
        Self::Latest
    }
}

impl fmt::Display for TimeThreshold {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Latest => write!(f, "latest"),
            Self::AtTime(t) => write!(f, "at {t}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_latest_includes_everything() {
        let cursor = TimeThreshold::latest();
        assert!(cursor.includes(Utc::now() + Duration::days(365)));
        assert!(cursor.includes(DateTime::UNIX_EPOCH));
    }

    #[test]
    fn test_at_time_is_inclusive() {
        let t = Utc::now();
        let cursor = TimeThreshold::at_time(t);
        assert!(cursor.includes(t));
        assert!(cursor.includes(t - Duration::seconds(1)));
        assert!(!cursor.includes(t + Duration::seconds(1)));
    }

    #[test]
    fn test_time_accessor() {
        let t = Utc::now();
        assert_eq!(TimeThreshold::at_time(t).time(), Some(t));
        assert_eq!(TimeThreshold::latest().time(), None);
    }

    #[test]
    fn test_display() {
        assert_eq!(format!("{}", TimeThreshold::latest()), "latest");
        let t = Utc::now();
        assert!(format!("{}", TimeThreshold::at_time(t)).starts_with("at "));
    }

    #[test]
    fn test_serialization_roundtrip() {
        let cursor = TimeThreshold::at_time(Utc::now());
        let json = serde_json::to_string(&cursor).unwrap();
        let deserialized: TimeThreshold = serde_json::from_str(&json).unwrap();
        assert_eq!(cursor, deserialized);
    }
}
