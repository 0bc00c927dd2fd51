//! Circuit breaker states

use std::fmt;

/// The five states a circuit breaker can be in.
///
/// `Closed`, `Open`, and `HalfOpen` are driven by the transition rules;
/// `Disabled` and `ForcedOpen` are administrative holds that can only be
/// entered or left through a force call or a reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CircuitState {
    /// Breaker is switched off: every call is permitted, nothing is recorded.
    Disabled,
    /// Normal operation: calls are permitted and outcomes fill the window.
    Closed,
    /// Tripped: calls are denied until the wait duration elapses.
    Open,
    /// Probing: calls are permitted and a short window decides recovery.
    HalfOpen,
    /// Administrative open: every call is denied, nothing is recorded.
    ForcedOpen,
}

impl CircuitState {
    /// States in which reported outcomes are written into the active window.
    pub(crate) fn records_outcomes(self) -> bool {
        matches!(self, Self::Closed | Self::HalfOpen)
    }

    /// States in which outcome reports are dropped entirely, events included.
    pub(crate) fn ignores_outcomes(self) -> bool {
        matches!(self, Self::Disabled | Self::ForcedOpen)
    }
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Disabled => "Disabled",
            Self::Closed => "Closed",
            Self::Open => "Open",
            Self::HalfOpen => "HalfOpen",
            Self::ForcedOpen => "ForcedOpen",
        };
        f.write_str(name)
    }
}
