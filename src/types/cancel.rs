//! Cancellation reason and kind types.
//!
//! Cancellation is a request, not a silent drop. These types record why a
//! bridged job, subscription, or lifecycle task was told to stop, so the
//! resulting [`Error::Cancelled`](crate::Error::Cancelled) can say so.

use core::fmt;

/// The kind of cancellation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CancelKind {
    /// Explicit cancellation requested by user code.
    User,
    /// The awaiting future or stream was dropped before it finished.
    Abandoned,
    /// Cancellation due to timeout/deadline.
    Timeout,
    /// The owning component was unmounted.
    Unmounted,
    /// Cancellation due to shutdown of the hosting process or runtime.
    Shutdown,
}

impl CancelKind {
    /// Returns the severity of this cancellation kind.
    ///
    /// Higher severity cancellations take precedence when strengthening.
    #[must_use]
    pub const fn severity(self) -> u8 {
        match self {
            Self::User => 0,
            Self::Abandoned => 1,
            Self::Timeout => 2,
            Self::Unmounted => 3,
            Self::Shutdown => 4,
        }
    }
}

impl fmt::Display for CancelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::User => write!(f, "user"),
            Self::Abandoned => write!(f, "abandoned"),
            Self::Timeout => write!(f, "timeout"),
            Self::Unmounted => write!(f, "unmounted"),
            Self::Shutdown => write!(f, "shutdown"),
        }
    }
}

/// The reason for a cancellation, including kind and optional context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CancelReason {
    /// The kind of cancellation.
    pub kind: CancelKind,
    /// Optional human-readable message.
    pub message: Option<&'static str>,
}

impl CancelReason {
    /// Creates a new cancellation reason with the given kind.
    #[must_use]
    pub const fn new(kind: CancelKind) -> Self {
        Self {
            kind,
            message: None,
        }
    }

    /// Creates a user cancellation reason with a message.
    #[must_use]
    pub const fn user(message: &'static str) -> Self {
        Self {
            kind: CancelKind::User,
            message: Some(message),
        }
    }

    /// Creates an abandonment reason (the consumer went away).
    #[must_use]
    pub const fn abandoned() -> Self {
        Self::new(CancelKind::Abandoned)
    }

    /// Creates a timeout cancellation reason.
    #[must_use]
    pub const fn timeout() -> Self {
        Self::new(CancelKind::Timeout)
    }

    /// Creates an unmount cancellation reason.
    #[must_use]
    pub const fn unmounted() -> Self {
        Self::new(CancelKind::Unmounted)
    }

    /// Creates a shutdown cancellation reason.
    #[must_use]
    pub const fn shutdown() -> Self {
        Self::new(CancelKind::Shutdown)
    }

    /// Attaches a static message to this reason.
    #[must_use]
    pub const fn with_message(mut self, message: &'static str) -> Self {
        self.message = Some(message);
        self
    }

    /// Strengthens this reason with another, keeping the more severe one.
    ///
    /// Returns `true` if the reason was changed.
    pub fn strengthen(&mut self, other: &Self) -> bool {
        if other.kind > self.kind {
            self.kind = other.kind;
            self.message = other.message;
            return true;
        }

        if other.kind == self.kind && self.message.is_none() && other.message.is_some() {
            self.message = other.message;
            return true;
        }

        false
    }

    /// Returns the kind of this cancellation reason.
    #[must_use]
    pub const fn kind(&self) -> CancelKind {
        self.kind
    }
}

impl Default for CancelReason {
    fn default() -> Self {
        Self::new(CancelKind::User)
    }
}

impl fmt::Display for CancelReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)?;
        if let Some(msg) = self.message {
            write!(f, ": {msg}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::init_test_logging;

    fn init_test(test_name: &str) {
        init_test_logging();
        crate::test_phase!(test_name);
    }

    #[test]
    fn severity_ordering() {
        init_test("severity_ordering");
        let ordered = [
            CancelKind::User,
            CancelKind::Abandoned,
            CancelKind::Timeout,
            CancelKind::Unmounted,
            CancelKind::Shutdown,
        ];
        for pair in ordered.windows(2) {
            crate::assert_with_log!(
                pair[0].severity() < pair[1].severity(),
                "severity must increase",
                pair[1],
                pair[0]
            );
        }
        crate::test_complete!("severity_ordering");
    }

    #[test]
    fn strengthen_takes_more_severe() {
        init_test("strengthen_takes_more_severe");
        let mut reason = CancelReason::user("button");
        let changed = reason.strengthen(&CancelReason::unmounted());
        crate::assert_with_log!(changed, "should strengthen", true, changed);
        crate::assert_with_log!(
            reason.kind == CancelKind::Unmounted,
            "kind after strengthen",
            CancelKind::Unmounted,
            reason.kind
        );
        crate::assert_with_log!(
            reason.message.is_none(),
            "message follows the stronger reason",
            None::<&str>,
            reason.message
        );

        let changed = reason.strengthen(&CancelReason::user("late"));
        crate::assert_with_log!(!changed, "weaker reason ignored", false, changed);
        crate::test_complete!("strengthen_takes_more_severe");
    }

    #[test]
    fn strengthen_fills_missing_message() {
        init_test("strengthen_fills_missing_message");
        let mut reason = CancelReason::timeout();
        let changed = reason.strengthen(&CancelReason::timeout().with_message("5s"));
        crate::assert_with_log!(changed, "message filled", true, changed);
        crate::assert_with_log!(
            reason.to_string() == "timeout: 5s",
            "display",
            "timeout: 5s",
            reason.to_string()
        );
        crate::test_complete!("strengthen_fills_missing_message");
    }

    #[test]
    fn default_is_user() {
        init_test("default_is_user");
        let reason = CancelReason::default();
        crate::assert_with_log!(
            reason.kind() == CancelKind::User,
            "default kind",
            CancelKind::User,
            reason.kind()
        );
        crate::test_complete!("default_is_user");
    }
}
