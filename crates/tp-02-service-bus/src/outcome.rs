//! Request outcomes.

/// How a service request ended.
///
/// `executed()` is false when no responder ever ran, so callers can tell
/// "never reached a responder" from "responder ran and failed".
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceOutcome<Rep> {
    /// A responder ran. `result` is the success flag it reported.
    Replied { reply: Rep, result: bool },
    /// No reply arrived before the timeout.
    TimedOut,
    /// No matching responder existed, or it could not be reached.
    NoResponder,
}

impl<Rep> ServiceOutcome<Rep> {
    pub fn executed(&self) -> bool {
        matches!(self, ServiceOutcome::Replied { .. })
    }

    /// The responder's success flag; false unless executed.
    pub fn result(&self) -> bool {
        matches!(self, ServiceOutcome::Replied { result: true, .. })
    }

    pub fn reply(&self) -> Option<&Rep> {
        match self {
            ServiceOutcome::Replied { reply, .. } => Some(reply),
            _ => None,
        }
    }

    pub fn into_reply(self) -> Option<Rep> {
        match self {
            ServiceOutcome::Replied { reply, .. } => Some(reply),
            _ => None,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(Rep) -> U) -> ServiceOutcome<U> {
        match self {
            ServiceOutcome::Replied { reply, result } => ServiceOutcome::Replied {
                reply: f(reply),
                result,
            },
            ServiceOutcome::TimedOut => ServiceOutcome::TimedOut,
            ServiceOutcome::NoResponder => ServiceOutcome::NoResponder,
        }
    }

    /// Metric label.
    pub fn label(&self) -> &'static str {
        match self {
            ServiceOutcome::Replied { .. } => "replied",
            ServiceOutcome::TimedOut => "timed_out",
            ServiceOutcome::NoResponder => "no_responder",
        }
    }
}
