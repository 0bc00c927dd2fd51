//! Error types for circuit breaker operations

use crate::state::CircuitState;
use std::fmt;
use thiserror::Error;

/// Construction-time configuration violations
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    /// Threshold is a percentage and must be within (0, 100].
    #[error("failure rate threshold must be within (0, 100], got {0}")]
    FailureRateThreshold(f32),
    /// The closed-state window needs at least one slot.
    #[error("closed-state ring buffer size must be at least 1")]
    ClosedRingBufferSize,
    /// The half-open window needs at least one slot.
    #[error("half-open ring buffer size must be at least 1")]
    HalfOpenRingBufferSize,
}

/// Errors returned by [`CircuitBreaker::call`]
///
/// Generic over the wrapped operation's error type, so the original error
/// survives intact in the `Execution` variant.
///
/// [`CircuitBreaker::call`]: crate::CircuitBreaker::call
#[derive(Debug)]
pub enum CircuitError<E = Box<dyn std::error::Error + Send + Sync>> {
    /// The circuit denied the call; the operation never ran.
    NotPermitted {
        circuit: String,
        state: CircuitState,
    },
    /// The wrapped operation failed.
    Execution(E),
}

impl<E: fmt::Display> fmt::Display for CircuitError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CircuitError::NotPermitted { circuit, state } => {
                write!(f, "Circuit '{}' is {} and not permitting calls", circuit, state)
            }
            CircuitError::Execution(e) => write!(f, "Circuit execution failed: {}", e),
        }
    }
}

impl<E: std::error::Error + 'static> std::error::Error for CircuitError<E> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CircuitError::Execution(e) => Some(e),
            _ => None,
        }
    }
}
