//! Basic circuit breaker usage example

use breakwater::{CircuitBreaker, CircuitState, Config, ConfigError, EventDetail, EventKind};
use std::thread;
use std::time::Duration;

fn main() -> Result<(), ConfigError> {
    println!("=== Circuit Breaker Basic Example ===\n");

    // 4-slot window, 50% threshold, quick recovery for the demo
    let breaker = CircuitBreaker::new("payment_api", Config {
        ring_buffer_size_in_closed_state: 4,
        ring_buffer_size_in_half_open_state: 2,
        wait_duration_in_open: Duration::from_millis(500),
        ..Default::default()
    })?;

    breaker.subscribe(EventKind::StateTransition, |event| {
        if let EventDetail::StateTransition { from, to } = event.detail {
            let badge = match to {
                CircuitState::Open | CircuitState::ForcedOpen => "🔴",
                CircuitState::HalfOpen => "🟡",
                _ => "🟢",
            };
            println!("{} Circuit '{}' moved {} -> {}", badge, event.circuit, from, to);
        }
    });

    println!("Initial state: {}\n", breaker.current_state());

    // Simulate successful calls
    println!("--- Successful calls ---");
    for i in 1..=2 {
        match breaker.call(move || Ok::<_, String>(format!("Payment {}", i))) {
            Ok(result) => println!("✓ {}", result),
            Err(e) => println!("✗ {}", e),
        }
    }
    println!("State: {}\n", breaker.current_state());

    // Two failures out of four calls hits the 50% threshold
    println!("--- Triggering failures ---");
    for i in 1..=2 {
        match breaker.call(move || Err::<String, _>(format!("Payment failed {}", i))) {
            Ok(_) => println!("✓ Success"),
            Err(e) => println!("✗ {}", e),
        }
    }
    println!("State: {}\n", breaker.current_state());

    // Try calling while open
    println!("--- Attempting call while open ---");
    match breaker.call(|| Ok::<_, String>("Should be rejected")) {
        Ok(_) => println!("✓ Success"),
        Err(e) => println!("✗ {}", e),
    }
    let metrics = breaker.metrics();
    println!(
        "Failure rate: {:?}, denied calls: {}\n",
        metrics.failure_rate, metrics.not_permitted_calls
    );

    // Wait out the open period, then probe
    println!("--- Waiting for the half-open window ---");
    thread::sleep(Duration::from_millis(600));
    for i in 1..=2 {
        match breaker.call(move || Ok::<_, String>(format!("Probe {}", i))) {
            Ok(result) => println!("✓ {}", result),
            Err(e) => println!("✗ {}", e),
        }
    }
    println!("State: {}\n", breaker.current_state());

    // Reset discards every counter
    println!("--- Resetting circuit ---");
    breaker.reset();
    println!("State after reset: {}", breaker.current_state());
    println!("Metrics after reset: {:?}", breaker.metrics());

    Ok(())
}
