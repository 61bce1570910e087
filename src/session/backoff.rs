use std::time::Duration;

use crate::config::SessionConfig;
use crate::utils::jitter::with_jitter;

/// Delay schedule between streaming connection attempts
///
/// A connection that delivered frames and then closed is retried
/// immediately. A refused connection, or one closed before its first frame,
/// is a failed attempt. Each consecutive failed attempt doubles the delay,
/// starting at the initial delay and capped at the maximum, with jitter
/// added on top.
/// There is no attempt limit.
#[derive(Debug, Clone)]
pub struct ReconnectPolicy {
    initial_delay: Duration,
    max_delay: Duration,
    jitter_percent: u8,
    consecutive_failures: u32,
}

impl ReconnectPolicy {
    pub fn new(initial_delay: Duration, max_delay: Duration, jitter_percent: u8) -> Self {
        Self {
            initial_delay,
            max_delay: max_delay.max(initial_delay),
            jitter_percent,
            consecutive_failures: 0,
        }
    }

    pub fn from_config(config: &SessionConfig) -> Self {
        Self::new(
            config.reconnect_initial_delay,
            config.reconnect_max_delay,
            config.reconnect_jitter_percent,
        )
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    /// Delay before the next attempt, without jitter
    pub fn base_delay(&self) -> Duration {
        if self.consecutive_failures == 0 {
            return Duration::ZERO;
        }

        let exponent = (self.consecutive_failures - 1).min(31);
        self.initial_delay
            .checked_mul(2_u32.pow(exponent))
            .map_or(self.max_delay, |delay| delay.min(self.max_delay))
    }

    /// Delay before the next attempt
    pub fn next_delay(&self) -> Duration {
        with_jitter(self.base_delay(), self.jitter_percent)
    }

    pub fn record_failure(&mut self) {
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
    }

    /// Called once a connection reached Open
    pub fn reset(&mut self) {
        self.consecutive_failures = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_reconnect_is_immediate() {
        let policy = ReconnectPolicy::new(Duration::from_secs(1), Duration::from_secs(60), 25);
        assert_eq!(policy.next_delay(), Duration::ZERO);
    }

    #[test]
    fn test_failures_double_until_cap() {
        let mut policy = ReconnectPolicy::new(Duration::from_secs(1), Duration::from_secs(10), 0);
        let mut delays = Vec::new();
        for _ in 0..6 {
            policy.record_failure();
            delays.push(policy.base_delay().as_secs());
        }
        assert_eq!(delays, vec![1, 2, 4, 8, 10, 10]);
    }

    #[test]
    fn test_reset_after_open() {
        let mut policy = ReconnectPolicy::new(Duration::from_secs(1), Duration::from_secs(60), 0);
        policy.record_failure();
        policy.record_failure();
        policy.reset();
        assert_eq!(policy.consecutive_failures(), 0);
        assert_eq!(policy.next_delay(), Duration::ZERO);
    }

    #[test]
    fn test_jitter_stays_within_percent() {
        let mut policy = ReconnectPolicy::new(Duration::from_secs(4), Duration::from_secs(60), 25);
        policy.record_failure();
        for _ in 0..50 {
            let delay = policy.next_delay();
            assert!(delay >= Duration::from_secs(4));
            assert!(delay <= Duration::from_secs(5));
        }
    }

    #[test]
    fn test_many_failures_do_not_overflow() {
        let mut policy = ReconnectPolicy::new(Duration::from_secs(1), Duration::from_secs(60), 0);
        for _ in 0..200 {
            policy.record_failure();
        }
        assert_eq!(policy.base_delay(), Duration::from_secs(60));
    }
}
