use rand::Rng;
use std::time::Duration;

/// How the conflict loop paces and bounds its retries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Read-modify-write cycles before giving up.
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    /// Full jitter: sleep a uniform amount in `0..=backoff`.
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 16,
            base_delay: Duration::from_millis(5),
            max_delay: Duration::from_secs(1),
            jitter: true,
        }
    }
}

impl RetryPolicy {
    /// Retries straight away, up to `max_attempts` cycles.
    #[must_use]
    pub const fn immediate(max_attempts: u32) -> Self {
        Self { max_attempts, base_delay: Duration::ZERO, max_delay: Duration::ZERO, jitter: false }
    }

    /// Upper bound of the pause after the `retry`-th conflict (1-based).
    #[must_use]
    pub fn backoff(&self, retry: u32) -> Duration {
        let shift = retry.saturating_sub(1).min(20);
        self.base_delay.saturating_mul(1u32 << shift).min(self.max_delay)
    }

    /// Pause to take after the `retry`-th conflict.
    #[must_use]
    pub fn delay_for(&self, retry: u32) -> Duration {
        let ceiling = self.backoff(retry);
        if !self.jitter || ceiling.is_zero() {
            return ceiling;
        }
        let cap = u64::try_from(ceiling.as_micros()).unwrap_or(u64::MAX);
        Duration::from_micros(rand::rng().random_range(0..=cap))
    }

    pub(crate) async fn pause(&self, retry: u32) {
        let delay = self.delay_for(retry);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_up_to_the_cap() {
        let p = RetryPolicy {
            max_attempts: 10,
            base_delay: Duration::from_millis(10),
            max_delay: Duration::from_millis(70),
            jitter: false,
        };
        let got: Vec<u128> = (1..=5).map(|n| p.delay_for(n).as_millis()).collect();
        assert_eq!(got, vec![10, 20, 40, 70, 70]);
    }

    #[test]
    fn jitter_stays_under_the_ceiling() {
        let p = RetryPolicy::default();
        for n in 1..12 {
            assert!(p.delay_for(n) <= p.backoff(n));
        }
    }

    #[test]
    fn huge_retry_counts_do_not_overflow() {
        let p = RetryPolicy { jitter: false, ..RetryPolicy::default() };
        assert_eq!(p.delay_for(u32::MAX), p.max_delay);
    }

    #[test]
    fn immediate_never_waits() {
        let p = RetryPolicy::immediate(3);
        assert!(p.delay_for(1).is_zero());
        assert!(p.delay_for(30).is_zero());
    }
}
