//! Reconnection Backoff
//!
//! Exponential backoff for feed reconnection: the delay starts at
//! `min_delay`, is multiplied on every consecutive failure, never exceeds
//! `max_delay`, and snaps back to `min_delay` as soon as a connection
//! succeeds.

use std::time::Duration;

use rand::Rng;

/// Configuration for reconnection behavior.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconnectConfig {
    /// Delay before the first retry and after every successful connect.
    pub min_delay: Duration,
    /// Upper bound for any delay.
    pub max_delay: Duration,
    /// Growth factor per consecutive failure.
    pub multiplier: u32,
    /// Jitter as a fraction of the delay (0.1 = ±10%). Zero disables it.
    pub jitter_factor: f64,
    /// Consecutive failures tolerated before giving up (0 = unlimited).
    pub max_attempts: u32,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            min_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            multiplier: 2,
            jitter_factor: 0.0,
            max_attempts: 0, // Unlimited
        }
    }
}

impl ReconnectConfig {
    /// Doubling backoff between `min_delay` and `max_delay`, no jitter,
    /// unlimited attempts.
    #[must_use]
    pub fn doubling(min_delay: Duration, max_delay: Duration) -> Self {
        Self {
            min_delay,
            max_delay,
            ..Self::default()
        }
    }
}

/// Backoff state owned by a single connection supervisor.
///
/// # Example
///
/// ```rust
/// use tick_ingest::infrastructure::feed::reconnect::{ReconnectConfig, ReconnectPolicy};
/// use std::time::Duration;
///
/// let mut policy = ReconnectPolicy::new(ReconnectConfig::doubling(
///     Duration::from_millis(100),
///     Duration::from_secs(1),
/// ));
///
/// assert_eq!(policy.next_delay(), Some(Duration::from_millis(100)));
/// assert_eq!(policy.next_delay(), Some(Duration::from_millis(200)));
///
/// // Connected again
/// policy.reset();
/// assert_eq!(policy.next_delay(), Some(Duration::from_millis(100)));
/// ```
#[derive(Debug)]
pub struct ReconnectPolicy {
    config: ReconnectConfig,
    current_delay: Duration,
    attempt_count: u32,
}

impl ReconnectPolicy {
    /// Create a new reconnection policy.
    #[must_use]
    pub fn new(config: ReconnectConfig) -> Self {
        let current_delay = config.min_delay.min(config.max_delay);
        Self {
            config,
            current_delay,
            attempt_count: 0,
        }
    }

    /// Delay to wait before the next attempt, advancing the backoff.
    ///
    /// Returns `None` once `max_attempts` consecutive failures have been
    /// recorded.
    #[must_use]
    pub fn next_delay(&mut self) -> Option<Duration> {
        if !self.should_retry() {
            return None;
        }

        self.attempt_count += 1;
        let delay = self.apply_jitter(self.current_delay);

        self.current_delay = self
            .current_delay
            .checked_mul(self.config.multiplier.max(1))
            .map_or(self.config.max_delay, |next| next.min(self.config.max_delay));

        Some(delay)
    }

    /// Reset after a successful connection.
    pub fn reset(&mut self) {
        self.current_delay = self.config.min_delay.min(self.config.max_delay);
        self.attempt_count = 0;
    }

    /// Consecutive failures since the last reset.
    #[must_use]
    pub const fn attempt_count(&self) -> u32 {
        self.attempt_count
    }

    /// Delay the next call to [`Self::next_delay`] will return (before jitter).
    #[must_use]
    pub const fn current_delay(&self) -> Duration {
        self.current_delay
    }

    /// Check if reconnection should continue.
    #[must_use]
    pub const fn should_retry(&self) -> bool {
        self.config.max_attempts == 0 || self.attempt_count < self.config.max_attempts
    }

    fn apply_jitter(&self, duration: Duration) -> Duration {
        if self.config.jitter_factor <= 0.0 {
            return duration;
        }

        let base = duration.as_secs_f64();
        let range = base * self.config.jitter_factor;
        let jitter: f64 = rand::rng().random_range(-range..=range);
        let jittered = Duration::from_secs_f64((base + jitter).max(0.001));

        jittered.min(self.config.max_delay)
    }
}
