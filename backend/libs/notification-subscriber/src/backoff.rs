/// Reconnect delays with exponential backoff and jitter
use rand::Rng;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct ReconnectPolicy {
    /// Delay before the first reconnect attempt
    pub initial_backoff: Duration,
    /// Upper bound for any single delay
    pub max_backoff: Duration,
    pub backoff_multiplier: f64,
    /// Add random jitter to backoff (±30%)
    pub jitter: bool,
    /// `None` retries forever
    pub max_attempts: Option<u32>,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(30),
            backoff_multiplier: 2.0,
            jitter: true,
            max_attempts: None,
        }
    }
}

/// Attempt counter for one run of consecutive failures
#[derive(Debug, Clone)]
pub struct Backoff {
    policy: ReconnectPolicy,
    attempt: u32,
    current: Duration,
}

impl Backoff {
    pub fn new(policy: ReconnectPolicy) -> Self {
        let current = policy.initial_backoff;
        Self {
            policy,
            attempt: 0,
            current,
        }
    }

    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Next delay, or `None` once `max_attempts` is used up
    pub fn next_delay(&mut self) -> Option<Duration> {
        if let Some(max) = self.policy.max_attempts {
            if self.attempt >= max {
                return None;
            }
        }
        self.attempt += 1;

        let delay = calculate_backoff(self.current, self.policy.jitter);
        self.current = Duration::from_millis(
            ((self.current.as_millis() as f64 * self.policy.backoff_multiplier)
                .min(self.policy.max_backoff.as_millis() as f64)) as u64,
        );
        Some(delay.min(self.policy.max_backoff))
    }

    /// Call after a connection was established
    pub fn reset(&mut self) {
        self.attempt = 0;
        self.current = self.policy.initial_backoff;
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
