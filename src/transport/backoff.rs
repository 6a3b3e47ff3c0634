//! Exponential back-off for the bridged reconnect loop.

use std::time::Duration;

/// Configuration for exponential back-off between bridge connection attempts.
///
/// The delay starts at `initial_delay`, doubles after every consecutive
/// failure, and is capped at `max_delay`. A successful connection resets it.
///
/// # Default Values
/// - `initial_delay`: 1 second
/// - `max_delay`: 30 seconds
///
/// # Invariants
/// - `initial_delay` must not exceed `max_delay`
/// - `initial_delay` must be at least 1 millisecond
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BackoffConfig {
    /// Delay used after the first failed attempt.
    pub initial_delay: Duration,
    /// Ceiling reached after repeated failures.
    pub max_delay: Duration,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl BackoffConfig {
    /// Clamp delays to sane bounds and ensure `initial_delay <= max_delay`.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::time::Duration;
    ///
    /// use rns_meshtastic::transport::BackoffConfig;
    ///
    /// let cfg = BackoffConfig {
    ///     initial_delay: Duration::from_millis(5),
    ///     max_delay: Duration::from_millis(1),
    /// };
    ///
    /// let normalized = cfg.normalized();
    /// assert_eq!(normalized.initial_delay, Duration::from_millis(1));
    /// assert_eq!(normalized.max_delay, Duration::from_millis(5));
    /// ```
    #[must_use]
    pub fn normalized(mut self) -> Self {
        self.initial_delay = self.initial_delay.max(Duration::from_millis(1));
        self.max_delay = self.max_delay.max(Duration::from_millis(1));
        if self.initial_delay > self.max_delay {
            std::mem::swap(&mut self.initial_delay, &mut self.max_delay);
        }
        self
    }
}

/// Running back-off state for one reconnect loop.
#[derive(Clone, Debug)]
pub struct Backoff {
    config: BackoffConfig,
    current: Duration,
}

impl Backoff {
    /// Start from the configured initial delay.
    #[must_use]
    pub fn new(config: BackoffConfig) -> Self {
        let config = config.normalized();
        Self {
            config,
            current: config.initial_delay,
        }
    }

    /// Return the delay to wait now and double the next one, up to the ceiling.
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        self.current = (self.current * 2).min(self.config.max_delay);
        delay
    }

    /// Return to the initial delay after a successful connection.
    pub fn reset(&mut self) { self.current = self.config.initial_delay; }
}
