/// Reconnect policy with exponential backoff and jitter
use rand::Rng;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Delay before the first reconnect attempt
    pub initial_backoff: Duration,
    /// Ceiling for the delay
    pub max_backoff: Duration,
    /// Backoff multiplier for exponential backoff
    pub backoff_multiplier: f64,
    /// Add random jitter to backoff (±30%)
    pub jitter: bool,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(30),
            backoff_multiplier: 2.0,
            jitter: true,
        }
    }
}

/// Backoff state for one connection supervisor. Attempts are unbounded;
/// only the delay is capped.
#[derive(Debug)]
pub struct Backoff {
    config: ReconnectConfig,
    current: Duration,
    attempt: u32,
}

impl Backoff {
    pub fn new(config: ReconnectConfig) -> Self {
        let current = config.initial_backoff;
        Self {
            config,
            current,
            attempt: 0,
        }
    }

    /// Delay before the next attempt, advancing the exponential schedule
    pub fn next_delay(&mut self) -> Duration {
        let delay = calculate_backoff(self.current, self.config.jitter).min(self.config.max_backoff);
        self.attempt = self.attempt.saturating_add(1);
        self.current = Duration::from_millis(
            ((self.current.as_millis() as f64 * self.config.backoff_multiplier)
                .min(self.config.max_backoff.as_millis() as f64)) as u64,
        );
        delay
    }

    /// Back to the initial delay, after a successful connection
    pub fn reset(&mut self) {
        self.current = self.config.initial_backoff;
        self.attempt = 0;
    }

    /// Reconnect attempts scheduled since the last reset
    pub fn attempt(&self) -> u32 {
        self.attempt
    }
}

fn calculate_backoff(base: Duration, jitter: bool) -> Duration {
    if jitter {
        let mut rng = rand::thread_rng();
        let jitter_factor = 1.0 + rng.gen_range(-0.3..0.3); // ±30%
        Duration::from_millis((base.as_millis() as f64 * jitter_factor) as u64)
    } else {
        base
    }
}
