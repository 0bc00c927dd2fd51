//! Error classification
//!
//! This module decides what a reported error means to the breaker: ignored
//! outright, counted as a failure, or counted as a success. The decision
//! chain is: ignore set, then an explicit classifier if one is configured,
//! then the record set, then "every error is a failure".

use crate::config::Config;
use std::any::{Any, TypeId};
use std::collections::HashSet;

/// Trait for classifying errors - determines if an error counts as a failure
///
/// Implementors can downcast the error value to concrete types to decide
/// whether this particular error should count toward opening the circuit.
///
/// # Examples
///
/// ```rust
/// use breakwater::FailureClassifier;
/// use std::any::Any;
///
/// #[derive(Debug)]
/// struct ServerErrorsOnly;
///
/// impl FailureClassifier for ServerErrorsOnly {
///     fn is_failure(&self, error: &dyn Any) -> bool {
///         error
///             .downcast_ref::<u16>()
///             .map(|status| *status >= 500)
///             .unwrap_or(true)
///     }
/// }
///
/// assert!(ServerErrorsOnly.is_failure(&503u16));
/// assert!(!ServerErrorsOnly.is_failure(&404u16));
/// ```
pub trait FailureClassifier: Send + Sync + std::fmt::Debug {
    /// Returns `true` if the error should count as a failure, `false` to
    /// count it as a success.
    fn is_failure(&self, error: &dyn Any) -> bool;
}

/// Predicate-based classifier using a closure
///
/// Allows using simple closures for common filtering patterns.
///
/// # Examples
///
/// ```rust
/// use breakwater::PredicateClassifier;
///
/// let classifier = PredicateClassifier::new(|error| {
///     error
///         .downcast_ref::<&str>()
///         .is_some_and(|e| e.contains("timeout"))
/// });
/// ```
pub struct PredicateClassifier<F>
where
    F: Fn(&dyn Any) -> bool + Send + Sync,
{
    predicate: F,
}

impl<F> PredicateClassifier<F>
where
    F: Fn(&dyn Any) -> bool + Send + Sync,
{
    /// Create a new predicate-based classifier
    pub fn new(predicate: F) -> Self {
        Self { predicate }
    }
}

impl<F> FailureClassifier for PredicateClassifier<F>
where
    F: Fn(&dyn Any) -> bool + Send + Sync,
{
    fn is_failure(&self, error: &dyn Any) -> bool {
        (self.predicate)(error)
    }
}

impl<F> std::fmt::Debug for PredicateClassifier<F>
where
    F: Fn(&dyn Any) -> bool + Send + Sync,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PredicateClassifier")
            .field("predicate", &"<closure>")
            .finish()
    }
}

/// A set of error types, matched by the concrete type of the reported value.
///
/// # Examples
///
/// ```rust
/// use breakwater::ErrorTypes;
///
/// struct Timeout;
/// struct BadRequest;
///
/// let ignored = ErrorTypes::new().with::<Timeout>();
/// assert!(ignored.contains(&Timeout));
/// assert!(!ignored.contains(&BadRequest));
/// ```
#[derive(Debug, Clone, Default)]
pub struct ErrorTypes {
    ids: HashSet<TypeId>,
}

impl ErrorTypes {
    /// Create an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an error type, consuming and returning the set.
    pub fn with<E: Any>(mut self) -> Self {
        self.ids.insert(TypeId::of::<E>());
        self
    }

    /// Add an error type in place.
    pub fn insert<E: Any>(&mut self) {
        self.ids.insert(TypeId::of::<E>());
    }

    /// Whether the concrete type of `error` is in the set.
    pub fn contains(&self, error: &dyn Any) -> bool {
        self.ids.contains(&error.type_id())
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

/// What the breaker should do with a reported error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Disposition {
    /// Dropped from the window entirely; only an ignored-error event fires.
    Ignored,
    /// Written to the window as a failure.
    Failure,
    /// Written to the window as a success.
    Success,
}

/// Apply the configured classification chain to one error value.
///
/// The ignore set always wins; a configured classifier preempts the record
/// set; an empty chain treats every error as a failure.
pub(crate) fn classify(config: &Config, error: &dyn Any) -> Disposition {
    if config.ignore_errors.contains(error) {
        return Disposition::Ignored;
    }
    if let Some(classifier) = &config.failure_classifier {
        return if classifier.is_failure(error) {
            Disposition::Failure
        } else {
            Disposition::Success
        };
    }
    if !config.record_errors.is_empty() {
        return if config.record_errors.contains(error) {
            Disposition::Failure
        } else {
            Disposition::Success
        };
    }
    Disposition::Failure
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[derive(Debug)]
    struct Timeout;

    #[derive(Debug)]
    struct BadRequest;

    #[test]
    fn test_default_chain_counts_every_error() {
        let config = Config::default();

        assert_eq!(classify(&config, &Timeout), Disposition::Failure);
        assert_eq!(classify(&config, &"anything"), Disposition::Failure);
    }

    #[test]
    fn test_ignore_set_drops_errors() {
        let config = Config {
            ignore_errors: ErrorTypes::new().with::<Timeout>(),
            ..Default::default()
        };

        assert_eq!(classify(&config, &Timeout), Disposition::Ignored);
        assert_eq!(classify(&config, &BadRequest), Disposition::Failure);
    }

    #[test]
    fn test_ignore_wins_over_record() {
        let config = Config {
            ignore_errors: ErrorTypes::new().with::<Timeout>(),
            record_errors: ErrorTypes::new().with::<Timeout>(),
            ..Default::default()
        };

        assert_eq!(classify(&config, &Timeout), Disposition::Ignored);
    }

    #[test]
    fn test_classifier_decides_when_present() {
        // Record set lists Timeout, but the classifier rejects it; the
        // classifier's verdict is final.
        let config = Config {
            failure_classifier: Some(Arc::new(PredicateClassifier::new(|error| {
                !error.is::<Timeout>()
            }))),
            record_errors: ErrorTypes::new().with::<Timeout>(),
            ..Default::default()
        };

        assert_eq!(classify(&config, &Timeout), Disposition::Success);
        assert_eq!(classify(&config, &BadRequest), Disposition::Failure);
    }

    #[test]
    fn test_record_set_membership_decides() {
        let config = Config {
            record_errors: ErrorTypes::new().with::<Timeout>(),
            ..Default::default()
        };

        assert_eq!(classify(&config, &Timeout), Disposition::Failure);
        assert_eq!(classify(&config, &BadRequest), Disposition::Success);
    }

    #[test]
    fn test_classifier_downcast() {
        #[derive(Debug)]
        enum ApiError {
            Client(u16),
            Server(u16),
        }

        let classifier = PredicateClassifier::new(|error| {
            error
                .downcast_ref::<ApiError>()
                .map(|e| matches!(e, ApiError::Server(_)))
                .unwrap_or(true)
        });

        assert!(classifier.is_failure(&ApiError::Server(503)));
        assert!(!classifier.is_failure(&ApiError::Client(404)));
        assert!(classifier.is_failure(&"unknown error"));
    }

    #[test]
    fn test_error_types_track_distinct_types() {
        let mut set = ErrorTypes::new();
        assert!(set.is_empty());

        set.insert::<Timeout>();
        set.insert::<&str>();

        assert!(set.contains(&Timeout));
        assert!(set.contains(&"boom"));
        assert!(!set.contains(&BadRequest));
        assert!(!set.contains(&42u32));
    }
}
