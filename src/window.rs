//! Fixed-capacity outcome window
//!
//! This module provides the ring buffer behind the failure-rate computation:
//! every recorded outcome takes the next slot (wrapping), displaced outcomes
//! age out of the running counts, and the rate stays undefined until the
//! buffer has been filled once.

use std::iter;
use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};

/// The result of one protected call, as classified by the breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Failure,
}

const SLOT_EMPTY: u8 = 0;
const SLOT_SUCCESS: u8 = 1;
const SLOT_FAILURE: u8 = 2;

impl Outcome {
    fn encode(self) -> u8 {
        match self {
            Outcome::Success => SLOT_SUCCESS,
            Outcome::Failure => SLOT_FAILURE,
        }
    }
}

/// Lock-free ring buffer of call outcomes.
///
/// Writers claim a slot with an atomic ticket and exchange the slot value,
/// so concurrent recordings never lose or double-count an outcome. The
/// failure rate is reported as `None` until `capacity` outcomes have been
/// written at least once; from then on it is `failures / capacity * 100`,
/// recomputed as old slots are overwritten.
#[derive(Debug)]
pub struct OutcomeWindow {
    slots: Box<[AtomicU8]>,
    /// Total writes ever requested; slot index is `next % capacity`.
    next: AtomicUsize,
    successes: AtomicUsize,
    failures: AtomicUsize,
}

impl OutcomeWindow {
    /// Create a window holding the most recent `capacity` outcomes.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is 0.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "window capacity must be greater than 0");
        Self {
            slots: iter::repeat_with(|| AtomicU8::new(SLOT_EMPTY))
                .take(capacity)
                .collect(),
            next: AtomicUsize::new(0),
            successes: AtomicUsize::new(0),
            failures: AtomicUsize::new(0),
        }
    }

    /// Write one outcome into the next slot, aging out whatever it displaces.
    ///
    /// O(1) and lock-free; safe to call from any number of threads.
    pub fn record(&self, outcome: Outcome) {
        let ticket = self.next.fetch_add(1, Ordering::Relaxed);
        let slot = &self.slots[ticket % self.slots.len()];

        // The new outcome is counted before it becomes visible in its slot,
        // so the displacement decrement below can never underflow: a value
        // can only be displaced after the swap that published it, which the
        // AcqRel exchange orders after its increment.
        match outcome {
            Outcome::Success => {
                self.successes.fetch_add(1, Ordering::Relaxed);
            }
            Outcome::Failure => {
                self.failures.fetch_add(1, Ordering::Relaxed);
            }
        }
        let displaced = slot.swap(outcome.encode(), Ordering::AcqRel);
        match displaced {
            SLOT_SUCCESS => {
                self.successes.fetch_sub(1, Ordering::Relaxed);
            }
            SLOT_FAILURE => {
                self.failures.fetch_sub(1, Ordering::Relaxed);
            }
            _ => {}
        }
    }

    /// Whether at least `capacity` outcomes have ever been written.
    pub fn is_full(&self) -> bool {
        self.next.load(Ordering::Acquire) >= self.slots.len()
    }

    /// Failure percentage over the window, or `None` until the window
    /// has been filled once.
    pub fn failure_rate(&self) -> Option<f32> {
        if !self.is_full() {
            return None;
        }
        let failures = self.failures.load(Ordering::Acquire);
        let rate = failures as f32 * 100.0 / self.slots.len() as f32;
        Some(rate.min(100.0))
    }

    /// Number of outcomes currently buffered, capped at capacity.
    pub fn recorded(&self) -> usize {
        self.next.load(Ordering::Acquire).min(self.slots.len())
    }

    /// Successes currently buffered.
    pub fn successes(&self) -> usize {
        self.successes.load(Ordering::Acquire)
    }

    /// Failures currently buffered.
    pub fn failures(&self) -> usize {
        self.failures.load(Ordering::Acquire)
    }

    /// Maximum number of buffered outcomes.
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::thread;

    #[test]
    fn test_empty_window_has_no_rate() {
        let window = OutcomeWindow::new(4);

        assert!(!window.is_full());
        assert_eq!(window.failure_rate(), None);
        assert_eq!(window.recorded(), 0);
        assert_eq!(window.capacity(), 4);
    }

    #[test]
    fn test_rate_undefined_until_full() {
        let window = OutcomeWindow::new(4);

        window.record(Outcome::Failure);
        window.record(Outcome::Failure);
        window.record(Outcome::Failure);
        assert_eq!(window.failure_rate(), None, "3 of 4 slots is not enough");
        assert_eq!(window.failures(), 3);

        window.record(Outcome::Failure);
        assert!(window.is_full());
        assert_eq!(window.failure_rate(), Some(100.0));
    }

    #[test]
    fn test_rate_tracks_overwrites() {
        let window = OutcomeWindow::new(4);

        for _ in 0..4 {
            window.record(Outcome::Failure);
        }
        assert_eq!(window.failure_rate(), Some(100.0));

        // Two successes displace two failures
        window.record(Outcome::Success);
        window.record(Outcome::Success);
        assert_eq!(window.failure_rate(), Some(50.0));
        assert_eq!(window.successes(), 2);
        assert_eq!(window.failures(), 2);

        window.record(Outcome::Success);
        window.record(Outcome::Success);
        assert_eq!(window.failure_rate(), Some(0.0));
    }

    #[test]
    fn test_recorded_caps_at_capacity() {
        let window = OutcomeWindow::new(3);

        for _ in 0..10 {
            window.record(Outcome::Success);
        }

        assert_eq!(window.recorded(), 3);
        assert_eq!(window.successes(), 3);
    }

    #[test]
    #[should_panic(expected = "window capacity must be greater than 0")]
    fn test_zero_capacity_panics() {
        OutcomeWindow::new(0);
    }

    #[test]
    fn test_concurrent_records_stay_exact() {
        let window = std::sync::Arc::new(OutcomeWindow::new(64));
        let mut handles = vec![];

        // 8 threads, each writing 4 successes and 4 failures; 64 writes in
        // total, so nothing is displaced and the counts must be exact.
        for _ in 0..8 {
            let window = std::sync::Arc::clone(&window);
            handles.push(thread::spawn(move || {
                for i in 0..8 {
                    if i % 2 == 0 {
                        window.record(Outcome::Failure);
                    } else {
                        window.record(Outcome::Success);
                    }
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(window.successes(), 32);
        assert_eq!(window.failures(), 32);
        assert_eq!(window.failure_rate(), Some(50.0));
    }

    proptest! {
        #[test]
        fn rate_is_failure_share_once_full(flags in proptest::collection::vec(any::<bool>(), 1..64)) {
            let window = OutcomeWindow::new(flags.len());
            for &failed in &flags {
                window.record(if failed { Outcome::Failure } else { Outcome::Success });
            }

            let failures = flags.iter().filter(|&&failed| failed).count();
            let expected = failures as f32 * 100.0 / flags.len() as f32;
            prop_assert_eq!(window.failure_rate(), Some(expected));
        }
    }
}
