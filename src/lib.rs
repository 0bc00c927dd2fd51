//! Breakwater: a concurrent circuit breaker
//!
//! A [`CircuitBreaker`] guards calls to an unreliable collaborator. It
//! counts call outcomes in a fixed-size ring buffer and, once the buffer
//! has filled, compares the failure rate against a configured threshold:
//! crossing it opens the circuit and calls are denied outright instead of
//! being sent into a failing backend. After a wait period the breaker lets
//! a bounded set of probe calls through (half-open) and either closes or
//! re-opens on their verdict.
//!
//! Breakers are cheap to clone and every operation is safe to invoke from
//! any number of threads. State transitions, denials, and call outcomes
//! are observable through typed events.
//!
//! # Example
//!
//! ```rust
//! use breakwater::{CircuitBreaker, Config, EventDetail, EventKind};
//! use std::time::Duration;
//!
//! let breaker = CircuitBreaker::new("payments", Config {
//!     ring_buffer_size_in_closed_state: 4,
//!     ring_buffer_size_in_half_open_state: 2,
//!     wait_duration_in_open: Duration::from_millis(200),
//!     ..Default::default()
//! })?;
//!
//! breaker.subscribe(EventKind::StateTransition, |event| {
//!     if let EventDetail::StateTransition { from, to } = event.detail {
//!         println!("{}: {} -> {}", event.circuit, from, to);
//!     }
//! });
//!
//! // Four straight failures fill the window at a 100% failure rate.
//! for _ in 0..4 {
//!     assert!(breaker.acquire_permission());
//!     breaker.on_error(Duration::from_millis(3), &"connection refused");
//! }
//!
//! assert!(breaker.is_open());
//! assert!(!breaker.acquire_permission());
//! assert_eq!(breaker.metrics().failure_rate, Some(100.0));
//! # Ok::<(), breakwater::ConfigError>(())
//! ```

pub mod circuit;
pub mod classifier;
pub mod config;
pub mod errors;
pub mod events;
pub mod state;
pub mod window;

pub use circuit::{CircuitBreaker, Metrics};
pub use classifier::{ErrorTypes, FailureClassifier, PredicateClassifier};
pub use config::Config;
pub use errors::{CircuitError, ConfigError};
pub use events::{CircuitEvent, EventDetail, EventKind};
pub use state::CircuitState;
pub use window::{Outcome, OutcomeWindow};
