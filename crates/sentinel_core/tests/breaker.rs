use std::time::{Duration, Instant};

use sentinel_core::{BreakerSettings, CircuitBreaker};

fn breaker(max_failures: u32, cooldown_secs: u64) -> CircuitBreaker {
    CircuitBreaker::new(BreakerSettings {
        max_failures,
        cooldown: Duration::from_secs(cooldown_secs),
    })
}

#[test]
fn stays_closed_below_threshold() {
    let now = Instant::now();
    let mut breaker = breaker(3, 60);
    breaker.record_failure(now);
    breaker.record_failure(now);
    assert!(!breaker.is_open(now));
    assert_eq!(breaker.consecutive_failures(), 2);
}

#[test]
fn opens_immediately_at_threshold() {
    let now = Instant::now();
    let mut breaker = breaker(3, 60);
    for _ in 0..3 {
        breaker.record_failure(now);
    }
    assert!(breaker.is_open(now));
    assert!(breaker.is_open(now + Duration::from_secs(59)));
}

#[test]
fn cooldown_boundary_resets_to_closed() {
    let now = Instant::now();
    let mut breaker = breaker(3, 60);
    for _ in 0..3 {
        breaker.record_failure(now);
    }
    assert!(breaker.is_open(now + Duration::from_secs(1)));

    // Reaching the cooldown self-heals: closed again, counters wiped.
    assert!(!breaker.is_open(now + Duration::from_secs(60)));
    assert_eq!(breaker.consecutive_failures(), 0);

    // A single new failure does not reopen the breaker.
    breaker.record_failure(now + Duration::from_secs(61));
    assert!(!breaker.is_open(now + Duration::from_secs(61)));
}

#[test]
fn success_resets_failure_count() {
    let now = Instant::now();
    let mut breaker = breaker(3, 60);
    breaker.record_failure(now);
    breaker.record_failure(now);
    breaker.record_success();
    assert_eq!(breaker.consecutive_failures(), 0);

    breaker.record_failure(now);
    breaker.record_failure(now);
    breaker.record_failure(now);
    assert!(breaker.is_open(now));
}

#[test]
fn default_settings_match_documented_constants() {
    let settings = BreakerSettings::default();
    assert_eq!(settings.max_failures, 5);
    assert_eq!(settings.cooldown, Duration::from_secs(60));
}
