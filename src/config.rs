//! Circuit breaker configuration

use crate::classifier::{ErrorTypes, FailureClassifier};
use crate::errors::ConfigError;
use std::sync::Arc;
use std::time::Duration;

/// Circuit breaker configuration
///
/// Plain data, set once and handed to [`CircuitBreaker::new`]; the breaker
/// validates it and never changes it afterwards.
///
/// [`CircuitBreaker::new`]: crate::CircuitBreaker::new
#[derive(Debug, Clone)]
pub struct Config {
    /// Failure percentage at or above which the circuit opens.
    /// Must be within (0, 100]. Default: 50.
    pub failure_rate_threshold: f32,

    /// How long an open circuit denies calls before a probe is allowed.
    /// Default: 60 seconds.
    pub wait_duration_in_open: Duration,

    /// Outcome window capacity while closed. Must be at least 1.
    /// Default: 100.
    pub ring_buffer_size_in_closed_state: usize,

    /// Outcome window capacity while half-open. Must be at least 1.
    /// Default: 10.
    pub ring_buffer_size_in_half_open_state: usize,

    /// Optional classifier deciding whether a reported error counts as a
    /// failure. When present, its verdict overrides `record_errors`.
    pub failure_classifier: Option<Arc<dyn FailureClassifier>>,

    /// Error types always recorded as failures. Only consulted when no
    /// classifier is configured; other error types then count as successes.
    pub record_errors: ErrorTypes,

    /// Error types never recorded at all. Takes priority over everything.
    pub ignore_errors: ErrorTypes,

    /// When set, entering the open state arms a timer that moves the
    /// circuit to half-open after `wait_duration_in_open`, without waiting
    /// for the next call. Default: off (the transition happens lazily on
    /// the next permission request).
    pub automatic_transition_from_open_to_half_open: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            failure_rate_threshold: 50.0,
            wait_duration_in_open: Duration::from_secs(60),
            ring_buffer_size_in_closed_state: 100,
            ring_buffer_size_in_half_open_state: 10,
            failure_classifier: None,
            record_errors: ErrorTypes::new(),
            ignore_errors: ErrorTypes::new(),
            automatic_transition_from_open_to_half_open: false,
        }
    }
}

impl Config {
    /// Check the construction invariants.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.failure_rate_threshold > 0.0 && self.failure_rate_threshold <= 100.0) {
            return Err(ConfigError::FailureRateThreshold(
                self.failure_rate_threshold,
            ));
        }
        if self.ring_buffer_size_in_closed_state == 0 {
            return Err(ConfigError::ClosedRingBufferSize);
        }
        if self.ring_buffer_size_in_half_open_state == 0 {
            return Err(ConfigError::HalfOpenRingBufferSize);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::default();

        assert!(config.validate().is_ok());
        assert_eq!(config.failure_rate_threshold, 50.0);
        assert_eq!(config.wait_duration_in_open, Duration::from_secs(60));
        assert_eq!(config.ring_buffer_size_in_closed_state, 100);
        assert_eq!(config.ring_buffer_size_in_half_open_state, 10);
        assert!(!config.automatic_transition_from_open_to_half_open);
    }

    #[test]
    fn test_threshold_must_be_in_range() {
        let zero = Config {
            failure_rate_threshold: 0.0,
            ..Default::default()
        };
        assert_eq!(
            zero.validate(),
            Err(ConfigError::FailureRateThreshold(0.0))
        );

        let above = Config {
            failure_rate_threshold: 100.5,
            ..Default::default()
        };
        assert!(above.validate().is_err());

        let nan = Config {
            failure_rate_threshold: f32::NAN,
            ..Default::default()
        };
        assert!(nan.validate().is_err());

        let full = Config {
            failure_rate_threshold: 100.0,
            ..Default::default()
        };
        assert!(full.validate().is_ok());
    }

    #[test]
    fn test_ring_buffers_must_hold_something() {
        let closed = Config {
            ring_buffer_size_in_closed_state: 0,
            ..Default::default()
        };
        assert_eq!(closed.validate(), Err(ConfigError::ClosedRingBufferSize));

        let half_open = Config {
            ring_buffer_size_in_half_open_state: 0,
            ..Default::default()
        };
        assert_eq!(
            half_open.validate(),
            Err(ConfigError::HalfOpenRingBufferSize)
        );

        let minimal = Config {
            ring_buffer_size_in_closed_state: 1,
            ring_buffer_size_in_half_open_state: 1,
            ..Default::default()
        };
        assert!(minimal.validate().is_ok());
    }
}
