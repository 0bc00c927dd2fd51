//! Circuit breaker state machine and facade
//!
//! The current state, its outcome window, and the moment it was entered
//! live together in one immutable phase value behind an atomic pointer.
//! Hot-path reads (permission checks, outcome recording, metrics) load the
//! pointer lock-free; transitions build a fresh phase and swap it in under
//! a mutex, re-checking that the phase they decided on is still current so
//! racing rule evaluations collapse to a single transition.

use crate::classifier::{self, Disposition};
use crate::config::Config;
use crate::errors::{CircuitError, ConfigError};
use crate::events::{CircuitEvent, EventDetail, EventDispatcher, EventKind};
use crate::state::CircuitState;
use crate::window::{Outcome, OutcomeWindow};

use arc_swap::ArcSwap;
use parking_lot::Mutex;
use std::any::Any;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;
use std::time::{Duration, Instant, SystemTime};
use tracing::{debug, info, trace, warn};

/// One generation of the breaker: a state, the window that serves it, and
/// the moment the state was entered.
#[derive(Debug)]
struct Phase {
    state: CircuitState,
    window: Arc<OutcomeWindow>,
    entered_at: Instant,
}

impl Phase {
    /// A phase with an empty window sized for its state.
    fn fresh(state: CircuitState, config: &Config) -> Self {
        let capacity = match state {
            CircuitState::HalfOpen => config.ring_buffer_size_in_half_open_state,
            _ => config.ring_buffer_size_in_closed_state,
        };
        Self {
            state,
            window: Arc::new(OutcomeWindow::new(capacity)),
            entered_at: Instant::now(),
        }
    }

    /// An open phase that keeps the window whose rate tripped the circuit,
    /// frozen, so metrics keep reporting that rate while open.
    fn tripped(window: Arc<OutcomeWindow>) -> Self {
        Self {
            state: CircuitState::Open,
            window,
            entered_at: Instant::now(),
        }
    }
}

/// Everything the breaker owns, shared between clones and timer threads.
struct Shared {
    name: String,
    config: Config,
    phase: ArcSwap<Phase>,
    /// Serializes transitions; never held while handlers run.
    transition: Mutex<()>,
    not_permitted: AtomicU64,
    dispatcher: EventDispatcher,
}

/// Point-in-time view of the breaker's counters.
///
/// All counts except `not_permitted_calls` describe the active window and
/// start over whenever a transition replaces it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Metrics {
    /// Failure percentage, or `None` while the window has not filled once.
    pub failure_rate: Option<f32>,
    /// Outcomes currently buffered in the window.
    pub buffered_calls: usize,
    /// Buffered outcomes recorded as successes.
    pub successful_calls: usize,
    /// Buffered outcomes recorded as failures.
    pub failed_calls: usize,
    /// Calls denied since creation or the last reset.
    pub not_permitted_calls: u64,
    /// Capacity of the active window.
    pub max_buffered_calls: usize,
}

/// Circuit breaker public API
///
/// Cheap to clone; clones share the same underlying breaker and may be
/// handed to any number of threads.
#[derive(Clone)]
pub struct CircuitBreaker {
    shared: Arc<Shared>,
}

impl CircuitBreaker {
    /// Create a breaker in the closed state.
    ///
    /// Fails if `config` violates a construction invariant.
    pub fn new(name: impl Into<String>, config: Config) -> Result<Self, ConfigError> {
        config.validate()?;
        let name = name.into();
        debug!(circuit = %name, ?config, "circuit breaker created");

        let phase = Phase::fresh(CircuitState::Closed, &config);
        Ok(Self {
            shared: Arc::new(Shared {
                name,
                config,
                phase: ArcSwap::from_pointee(phase),
                transition: Mutex::new(()),
                not_permitted: AtomicU64::new(0),
                dispatcher: EventDispatcher::new(),
            }),
        })
    }

    /// The breaker's name, carried on every event it emits.
    pub fn name(&self) -> &str {
        &self.shared.name
    }

    /// The state at this instant. A pure read: never triggers the lazy
    /// open-to-half-open check.
    pub fn current_state(&self) -> CircuitState {
        self.shared.phase.load().state
    }

    /// Whether the breaker is in the closed state.
    pub fn is_closed(&self) -> bool {
        self.current_state() == CircuitState::Closed
    }

    /// Whether the breaker is in the open state.
    pub fn is_open(&self) -> bool {
        self.current_state() == CircuitState::Open
    }

    /// Ask whether a call may proceed.
    ///
    /// Denials increment the not-permitted counter and emit a
    /// [`EventKind::NotPermitted`] event. A request arriving after an open
    /// circuit's wait duration has elapsed performs the open-to-half-open
    /// transition itself and is then permitted.
    pub fn acquire_permission(&self) -> bool {
        loop {
            let phase = self.shared.phase.load_full();
            match phase.state {
                CircuitState::Disabled | CircuitState::Closed | CircuitState::HalfOpen => {
                    return true;
                }
                CircuitState::ForcedOpen => {
                    self.reject();
                    return false;
                }
                CircuitState::Open => {
                    if phase.entered_at.elapsed() < self.shared.config.wait_duration_in_open {
                        self.reject();
                        return false;
                    }
                    // Wait expired: move to half-open and re-evaluate. If a
                    // racing caller, timer, or force got there first, the
                    // next iteration sees whatever phase won.
                    self.try_transition(&phase, CircuitState::HalfOpen);
                }
            }
        }
    }

    /// Report a successful call.
    ///
    /// Ignored entirely while disabled or forced open. While open (a call
    /// permitted before the trip finishing late), the event still fires but
    /// the frozen window is left untouched.
    pub fn on_success(&self, elapsed: Duration) {
        let phase = self.shared.phase.load_full();
        if phase.state.ignores_outcomes() {
            return;
        }
        if phase.state.records_outcomes() {
            phase.window.record(Outcome::Success);
            self.emit(EventDetail::Success { elapsed });
            self.evaluate_rules(&phase);
        } else {
            self.emit(EventDetail::Success { elapsed });
        }
    }

    /// Report a failed call.
    ///
    /// The error is classified first: ignored error types emit
    /// [`EventKind::IgnoredError`] and never touch the window; otherwise the
    /// classification decides whether a failure or a success is recorded.
    /// Ignored entirely while disabled or forced open; while open, events
    /// fire but nothing is recorded.
    pub fn on_error(&self, elapsed: Duration, error: &dyn Any) {
        let phase = self.shared.phase.load_full();
        if phase.state.ignores_outcomes() {
            return;
        }
        let live = phase.state.records_outcomes();
        match classifier::classify(&self.shared.config, error) {
            Disposition::Ignored => {
                self.emit(EventDetail::IgnoredError { elapsed, error });
                return;
            }
            Disposition::Failure => {
                if live {
                    phase.window.record(Outcome::Failure);
                }
                self.emit(EventDetail::Error { elapsed, error });
            }
            Disposition::Success => {
                if live {
                    phase.window.record(Outcome::Success);
                }
                self.emit(EventDetail::Success { elapsed });
            }
        }
        if live {
            self.evaluate_rules(&phase);
        }
    }

    /// Run `operation` under the breaker: acquire permission, time the
    /// call, and report its outcome back.
    ///
    /// A denied permission becomes [`CircuitError::NotPermitted`] without
    /// running the operation; an operation error is reported to the breaker
    /// and handed back in [`CircuitError::Execution`].
    ///
    /// # Examples
    ///
    /// ```rust
    /// use breakwater::{CircuitBreaker, CircuitError, Config};
    ///
    /// let breaker = CircuitBreaker::new("api", Config::default())?;
    /// let reply: Result<&str, CircuitError<&str>> = breaker.call(|| Ok("pong"));
    /// assert_eq!(reply.unwrap(), "pong");
    /// # Ok::<(), breakwater::ConfigError>(())
    /// ```
    pub fn call<T, E, F>(&self, operation: F) -> Result<T, CircuitError<E>>
    where
        F: FnOnce() -> Result<T, E>,
        E: 'static,
    {
        if !self.acquire_permission() {
            return Err(CircuitError::NotPermitted {
                circuit: self.shared.name.clone(),
                state: self.current_state(),
            });
        }
        let start = Instant::now();
        match operation() {
            Ok(value) => {
                self.on_success(start.elapsed());
                Ok(value)
            }
            Err(error) => {
                self.on_error(start.elapsed(), &error);
                Err(CircuitError::Execution(error))
            }
        }
    }

    /// Counters for the active window plus the denial count.
    pub fn metrics(&self) -> Metrics {
        let phase = self.shared.phase.load();
        Metrics {
            failure_rate: phase.window.failure_rate(),
            buffered_calls: phase.window.recorded(),
            successful_calls: phase.window.successes(),
            failed_calls: phase.window.failures(),
            not_permitted_calls: self.shared.not_permitted.load(Ordering::Relaxed),
            max_buffered_calls: phase.window.capacity(),
        }
    }

    /// Force the breaker closed, with a fresh window.
    pub fn force_closed(&self) {
        self.force(CircuitState::Closed);
    }

    /// Force the breaker open. It leaves open by the usual wait-duration
    /// rules, unlike [`CircuitBreaker::force_forced_open`].
    pub fn force_open(&self) {
        self.force(CircuitState::Open);
    }

    /// Force the breaker into the half-open probe state.
    pub fn force_half_open(&self) {
        self.force(CircuitState::HalfOpen);
    }

    /// Switch the breaker off: every call permitted, nothing recorded,
    /// no events, until the next force or reset.
    pub fn force_disabled(&self) {
        self.force(CircuitState::Disabled);
    }

    /// Hold the breaker open: every call denied until the next force or
    /// reset. The wait duration does not apply.
    pub fn force_forced_open(&self) {
        self.force(CircuitState::ForcedOpen);
    }

    /// Return to closed and discard all accumulated metrics.
    ///
    /// Emits a single [`EventKind::Reset`] event; no state-transition event
    /// fires for the reset.
    pub fn reset(&self) {
        {
            let _guard = self.shared.transition.lock();
            let next = Arc::new(Phase::fresh(CircuitState::Closed, &self.shared.config));
            self.shared.phase.store(next);
            self.shared.not_permitted.store(0, Ordering::Relaxed);
        }
        info!(circuit = %self.shared.name, "circuit reset");
        self.emit(EventDetail::Reset);
    }

    /// Register a handler for one event kind.
    ///
    /// Handlers run inline on the thread that triggered the event, after
    /// the breaker has already committed the action the event describes; a
    /// panicking handler therefore unwinds into the caller without
    /// corrupting the breaker. Handlers may call back into the breaker.
    /// Events from concurrent callers may interleave.
    pub fn subscribe<F>(&self, kind: EventKind, handler: F)
    where
        F: Fn(&CircuitEvent<'_>) + Send + Sync + 'static,
    {
        self.shared.dispatcher.subscribe(kind, Arc::new(handler));
    }

    /// Apply the window-driven transition rules against `phase`.
    ///
    /// Called after every recorded outcome. Does nothing until the window
    /// is full; half-open verdicts in particular wait for a full window
    /// rather than tripping on the first failure.
    fn evaluate_rules(&self, phase: &Arc<Phase>) {
        let Some(rate) = phase.window.failure_rate() else {
            return;
        };
        let threshold = self.shared.config.failure_rate_threshold;
        match phase.state {
            CircuitState::Closed if rate >= threshold => {
                self.try_transition(phase, CircuitState::Open);
            }
            CircuitState::HalfOpen => {
                let verdict = if rate >= threshold {
                    CircuitState::Open
                } else {
                    CircuitState::Closed
                };
                self.try_transition(phase, verdict);
            }
            _ => {}
        }
    }

    /// Swap in a new phase, provided `expected` is still the current one.
    ///
    /// The expectation check makes rule-driven transitions idempotent:
    /// however many threads conclude "this phase must now move to `to`",
    /// exactly one swap happens and the rest are no-ops.
    fn try_transition(&self, expected: &Arc<Phase>, to: CircuitState) -> bool {
        let next = {
            let _guard = self.shared.transition.lock();
            let current = self.shared.phase.load_full();
            if !Arc::ptr_eq(&current, expected) {
                return false;
            }
            let next = Arc::new(match to {
                CircuitState::Open => Phase::tripped(Arc::clone(&current.window)),
                _ => Phase::fresh(to, &self.shared.config),
            });
            self.shared.phase.store(Arc::clone(&next));
            next
        };
        self.report_transition(expected.state, to);
        self.arm_timer_if_open(&next);
        true
    }

    /// Unconditionally swap in a fresh phase for `to`. Always permitted,
    /// from any state, including `to` itself.
    fn force(&self, to: CircuitState) {
        let (from, next) = {
            let _guard = self.shared.transition.lock();
            let current = self.shared.phase.load_full();
            let next = Arc::new(Phase::fresh(to, &self.shared.config));
            self.shared.phase.store(Arc::clone(&next));
            (current.state, next)
        };
        self.report_transition(from, to);
        self.arm_timer_if_open(&next);
    }

    fn report_transition(&self, from: CircuitState, to: CircuitState) {
        match to {
            CircuitState::Closed | CircuitState::HalfOpen => {
                info!(circuit = %self.shared.name, %from, %to, "circuit state changed");
            }
            CircuitState::Open | CircuitState::ForcedOpen | CircuitState::Disabled => {
                warn!(circuit = %self.shared.name, %from, %to, "circuit state changed");
            }
        }
        self.emit(EventDetail::StateTransition { from, to });
    }

    /// When configured, entering open arms a one-shot timer that performs
    /// the same expectation-checked transition the lazy path would; the
    /// first of the two to run wins and the other is a no-op.
    fn arm_timer_if_open(&self, phase: &Arc<Phase>) {
        if phase.state != CircuitState::Open
            || !self.shared.config.automatic_transition_from_open_to_half_open
        {
            return;
        }
        let weak = Arc::downgrade(&self.shared);
        let open_phase = Arc::clone(phase);
        let wait = self.shared.config.wait_duration_in_open;
        let spawned = thread::Builder::new()
            .name(format!("{}-half-open", self.shared.name))
            .spawn(move || {
                thread::sleep(wait);
                // A dropped breaker fails the upgrade and the timer just ends.
                if let Some(shared) = weak.upgrade() {
                    CircuitBreaker { shared }.try_transition(&open_phase, CircuitState::HalfOpen);
                }
            });
        if let Err(error) = spawned {
            warn!(
                circuit = %self.shared.name, %error,
                "half-open timer thread failed to spawn; relying on lazy transition"
            );
        }
    }

    fn reject(&self) {
        self.shared.not_permitted.fetch_add(1, Ordering::Relaxed);
        trace!(circuit = %self.shared.name, "permission denied");
        self.emit(EventDetail::NotPermitted);
    }

    fn emit(&self, detail: EventDetail<'_>) {
        let event = CircuitEvent {
            circuit: &self.shared.name,
            created_at: SystemTime::now(),
            detail,
        };
        self.shared.dispatcher.dispatch(&event);
    }
}

impl fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("name", &self.shared.name)
            .field("state", &self.current_state())
            .field("config", &self.shared.config)
            .finish()
    }
}


#[cfg(test)]
mod property_tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn fresh_breakers_start_closed_without_a_rate(
            capacity in 1usize..64,
            threshold in 1u32..=100,
        ) {
            let config = Config {
                failure_rate_threshold: threshold as f32,
                ring_buffer_size_in_closed_state: capacity,
                ..Default::default()
            };
            let breaker = CircuitBreaker::new("prop", config).unwrap();

            prop_assert!(breaker.is_closed());
            prop_assert_eq!(breaker.metrics().failure_rate, None);
            prop_assert_eq!(breaker.metrics().max_buffered_calls, capacity);
        }

        #[test]
        fn filling_the_window_trips_exactly_at_the_threshold(
            capacity in 1usize..=16,
            failure_seed in 0usize..=16,
            threshold in 1u32..=100,
        ) {
            let failures = failure_seed.min(capacity);
            let config = Config {
                failure_rate_threshold: threshold as f32,
                ring_buffer_size_in_closed_state: capacity,
                ..Default::default()
            };
            let breaker = CircuitBreaker::new("prop", config).unwrap();

            for i in 0..capacity {
                prop_assert!(breaker.acquire_permission());
                if i < failures {
                    breaker.on_error(Duration::ZERO, &"boom");
                } else {
                    breaker.on_success(Duration::ZERO);
                }
            }

            let rate = failures as f32 * 100.0 / capacity as f32;
            if rate >= threshold as f32 {
                prop_assert!(breaker.is_open());
            } else {
                prop_assert!(breaker.is_closed());
            }
        }

        #[test]
        fn disabled_breakers_never_move(errors in 1usize..32) {
            let breaker = CircuitBreaker::new("prop", Config {
                ring_buffer_size_in_closed_state: 2,
                ..Default::default()
            })
            .unwrap();

            breaker.force_disabled();
            for _ in 0..errors {
                prop_assert!(breaker.acquire_permission());
                breaker.on_error(Duration::ZERO, &"boom");
            }
            prop_assert_eq!(breaker.current_state(), CircuitState::Disabled);

            breaker.reset();
            prop_assert!(breaker.is_closed());
            prop_assert_eq!(breaker.metrics().buffered_calls, 0);
        }
    }
}
