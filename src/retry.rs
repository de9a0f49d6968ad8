use std::{fmt::Display, future::Future, time::Duration};

use tokio::time::sleep;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// `None` retries forever.
    pub max_attempts: Option<u32>,

    pub initial_delay: Duration,

    pub multiplier: u32,

    pub max_delay: Duration,
}

impl RetryPolicy {
    /// Five attempts, one second apart.
    pub const fn publish() -> Self {
        Self {
            max_attempts: Some(5),
            initial_delay: Duration::from_secs(1),
            multiplier: 1,
            max_delay: Duration::from_secs(1),
        }
    }

    /// Unbounded, doubling from one second up to five minutes.
    pub const fn reconnect() -> Self {
        Self {
            max_attempts: None,
            initial_delay: Duration::from_secs(1),
            multiplier: 2,
            max_delay: Duration::from_secs(300),
        }
    }

    /// Delay to wait after failed attempt number `attempt` (1-based), or
    /// `None` once the attempts are used up.
    pub fn delay_after(&self, attempt: u32) -> Option<Duration> {
        if self.max_attempts.is_some_and(|max| attempt >= max) {
            return None;
        }

        let factor = self
            .multiplier
            .checked_pow(attempt.saturating_sub(1))
            .unwrap_or(u32::MAX);

        Some(self.initial_delay.saturating_mul(factor).min(self.max_delay))
    }

    pub fn backoff(&self) -> Backoff {
        Backoff {
            policy: *self,
            failures: 0,
        }
    }
}

/// Stateful view of a policy for loops that are not a single call.
#[derive(Debug, Clone)]
pub struct Backoff {
    policy: RetryPolicy,
    failures: u32,
}

impl Backoff {
    pub fn next_delay(&mut self) -> Option<Duration> {
        self.failures = self.failures.saturating_add(1);
        self.policy.delay_after(self.failures)
    }

    pub fn reset(&mut self) {
        self.failures = 0;
    }

    pub fn failures(&self) -> u32 {
        self.failures
    }
}

#[derive(Debug)]
pub struct Exhausted<E> {
    pub attempts: u32,
    pub last: E,
}

/// Runs `op` until it succeeds or `policy` gives up. `op` receives the
/// 1-based attempt number.
pub async fn retry<T, E, F, Fut>(policy: &RetryPolicy, mut op: F) -> Result<T, Exhausted<E>>
where
    E: Display,
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut attempt = 1;
    loop {
        match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(e) => match policy.delay_after(attempt) {
                Some(delay) => {
                    tracing::warn!(attempt, ?delay, "attempt failed, retrying: {e}");
                    sleep(delay).await;
                    attempt += 1;
                }
                None => return Err(Exhausted { attempts: attempt, last: e }),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use tokio::time::Instant;

    use super::*;

    #[test]
    fn publish_policy_delays() {
        let policy = RetryPolicy::publish();

        for attempt in 1..5 {
            assert_eq!(policy.delay_after(attempt), Some(Duration::from_secs(1)));
        }
        assert_eq!(policy.delay_after(5), None);
    }

    #[test]
    fn reconnect_backoff_doubles_and_caps() {
        let mut backoff = RetryPolicy::reconnect().backoff();
        let delays: Vec<u64> = (0..12)
            .map(|_| backoff.next_delay().unwrap().as_secs())
            .collect();

        assert_eq!(delays, [1, 2, 4, 8, 16, 32, 64, 128, 256, 300, 300, 300]);

        backoff.reset();
        assert_eq!(backoff.next_delay(), Some(Duration::from_secs(1)));
        assert_eq!(backoff.failures(), 1);
    }

    #[test]
    fn huge_attempt_counts_saturate() {
        let policy = RetryPolicy::reconnect();
        assert_eq!(policy.delay_after(u32::MAX), Some(Duration::from_secs(300)));
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_after_max_attempts() {
        let calls = Cell::new(0);
        let started = Instant::now();

        let result: Result<(), _> = retry(&RetryPolicy::publish(), |_| {
            calls.set(calls.get() + 1);
            async { Err("broker unavailable") }
        })
        .await;

        let err = result.unwrap_err();
        assert_eq!(err.attempts, 5);
        assert_eq!(err.last, "broker unavailable");
        assert_eq!(calls.get(), 5);
        assert!(started.elapsed() >= Duration::from_secs(4));
    }

    #[tokio::test(start_paused = true)]
    async fn stops_on_first_success() {
        let result = retry(&RetryPolicy::publish(), |attempt| async move {
            if attempt < 3 { Err("busy") } else { Ok(attempt) }
        })
        .await;

        assert_eq!(result.unwrap(), 3);
    }
}
