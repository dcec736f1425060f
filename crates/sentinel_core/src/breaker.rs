use std::time::{Duration, Instant};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BreakerSettings {
    /// Consecutive failures before the breaker opens.
    pub max_failures: u32,
    /// How long the breaker stays open after the last failure.
    pub cooldown: Duration,
}

impl Default for BreakerSettings {
    fn default() -> Self {
        Self {
            max_failures: 5,
            cooldown: Duration::from_secs(60),
        }
    }
}

/// Consecutive-failure circuit breaker for the analysis endpoint.
///
/// Pure state: the caller supplies `now`, so behaviour is fully
/// deterministic under test. Once the cooldown has elapsed the breaker
/// resets to closed and the very next call probes the backend; there is
/// no separate half-open request and no exponential backoff.
///
/// State is owned by exactly one client per logical endpoint so the
/// failure count accumulates across calls.
#[derive(Debug, Clone)]
pub struct CircuitBreaker {
    settings: BreakerSettings,
    consecutive_failures: u32,
    last_failure_at: Option<Instant>,
}

impl CircuitBreaker {
    pub fn new(settings: BreakerSettings) -> Self {
        Self {
            settings,
            consecutive_failures: 0,
            last_failure_at: None,
        }
    }

    /// Whether calls should fail fast at `now`.
    ///
    /// Reaching the cooldown boundary resets the counters, so a `true`
    /// result is always within `cooldown` of the last recorded failure.
    pub fn is_open(&mut self, now: Instant) -> bool {
        if self.consecutive_failures < self.settings.max_failures {
            return false;
        }
        match self.last_failure_at {
            Some(at) if now.duration_since(at) >= self.settings.cooldown => {
                self.consecutive_failures = 0;
                self.last_failure_at = None;
                false
            }
            Some(_) => true,
            None => false,
        }
    }

    pub fn record_failure(&mut self, now: Instant) {
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        self.last_failure_at = Some(now);
    }

    pub fn record_success(&mut self) {
        self.consecutive_failures = 0;
        self.last_failure_at = None;
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }
}
