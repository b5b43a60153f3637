//! Urgency tiers for spawned work.
//!
//! A [`Priority`] is advisory: spawners may map it to thread names, queue
//! lanes, or OS priorities.
//!
//! The tiers are distinct and strictly ordered. [`Priority::level`] spreads
//! them evenly over this crate's own 0 (lowest) to 255 (highest) scale; the
//! numbers are not any platform's raw priority values, and no two tiers
//! share a level.

use core::fmt;
use core::str::FromStr;

/// Urgency tier for a unit of asynchronous work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub enum Priority {
    /// Work the user is not waiting for (prefetch, cleanup).
    Background,
    /// Long-running work with user-visible progress.
    Utility,
    /// Below-default urgency.
    Low,
    /// Default urgency for ordinary work.
    Medium,
    /// Above-default urgency.
    High,
    /// Work the user explicitly started and is waiting on.
    #[default]
    UserInitiated,
}

impl Priority {
    /// All tiers from least to most urgent.
    pub const ALL: [Self; 6] = [
        Self::Background,
        Self::Utility,
        Self::Low,
        Self::Medium,
        Self::High,
        Self::UserInitiated,
    ];

    /// Returns the numeric scheduling level (0 = lowest, 255 = highest).
    ///
    /// Levels step by 51, so `Background` is 0 and `UserInitiated` is 255.
    /// Map them to OS or platform priorities explicitly; they are not
    /// interchangeable with any platform's numbers.
    #[must_use]
    pub const fn level(self) -> u8 {
        match self {
            Self::Background => 0,
            Self::Utility => 51,
            Self::Low => 102,
            Self::Medium => 153,
            Self::High => 204,
            Self::UserInitiated => 255,
        }
    }

    /// Returns the lowercase name used in config files and thread names.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Background => "background",
            Self::Utility => "utility",
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::UserInitiated => "user-initiated",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown priority name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown priority {0:?} (expected background, utility, low, medium, high, user-initiated)")]
pub struct ParsePriorityError(pub String);

impl FromStr for Priority {
    type Err = ParsePriorityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('_', "-");
        Self::ALL
            .into_iter()
            .find(|p| p.as_str() == normalized || (normalized == "userinitiated" && *p == Self::UserInitiated))
            .ok_or_else(|| ParsePriorityError(s.to_string()))
    }
}
