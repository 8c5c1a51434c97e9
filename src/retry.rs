use std::thread;
use std::time::Duration;

use tracing::warn;

use crate::error::ValidatorError;

/// Injectable sleep so tests can count backoffs instead of waiting them out.
pub trait Delay: Send + Sync {
    fn sleep(&self, duration: Duration);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadDelay;

impl Delay for ThreadDelay {
    fn sleep(&self, duration: Duration) {
        thread::sleep(duration);
    }
}

/// Bounded retry with a fixed backoff interval. The interval is deliberately
/// flat: NCBI and ENA throttle aggressively, and the goal is to stay under
/// their abuse thresholds, not to minimise latency.
#[derive(Clone)]
pub struct RetryExecutor<D: Delay = ThreadDelay> {
    attempts: usize,
    backoff: Duration,
    delay: D,
}

pub const DEFAULT_ATTEMPTS: usize = 3;
pub const DEFAULT_BACKOFF: Duration = Duration::from_secs(60);

impl RetryExecutor<ThreadDelay> {
    pub fn new() -> Self {
        Self::with_delay(DEFAULT_ATTEMPTS, DEFAULT_BACKOFF, ThreadDelay)
    }
}

impl Default for RetryExecutor<ThreadDelay> {
    fn default() -> Self {
        Self::new()
    }
}

impl<D: Delay> RetryExecutor<D> {
    pub fn with_delay(attempts: usize, backoff: Duration, delay: D) -> Self {
        Self {
            attempts,
            backoff,
            delay,
        }
    }

    /// Run `op` up to the attempt bound. `op` reports a failure reason as a
    /// string, covering both transport errors and non-success responses with
    /// their body text. Backoff sleeps happen between attempts only.
    pub fn execute<T, F>(&self, description: &str, mut op: F) -> Result<T, ValidatorError>
    where
        F: FnMut() -> Result<T, String>,
    {
        for attempt in 1..=self.attempts {
            match op() {
                Ok(value) => return Ok(value),
                Err(reason) => {
                    warn!("failure when {description}: {reason}");
                    if attempt < self.attempts {
                        warn!(
                            "sleeping {}s before retry ({attempt} of {})",
                            self.backoff.as_secs(),
                            self.attempts - 1
                        );
                        self.delay.sleep(self.backoff);
                    }
                }
            }
        }
        Err(ValidatorError::RemoteUnavailable {
            description: description.to_string(),
            attempts: self.attempts,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use assert_matches::assert_matches;

    use super::*;

    #[derive(Default)]
    struct CountingDelay {
        sleeps: Mutex<usize>,
    }

    impl Delay for &CountingDelay {
        fn sleep(&self, _duration: Duration) {
            *self.sleeps.lock().unwrap() += 1;
        }
    }

    #[test]
    fn succeeds_after_two_failures_with_two_sleeps() {
        let delay = CountingDelay::default();
        let executor = RetryExecutor::with_delay(3, Duration::from_secs(60), &delay);
        let mut calls = 0usize;
        let result = executor.execute("fetching", || {
            calls += 1;
            if calls < 3 {
                Err("boom".to_string())
            } else {
                Ok(42)
            }
        });
        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls, 3);
        assert_eq!(*delay.sleeps.lock().unwrap(), 2);
    }

    #[test]
    fn exhausts_after_three_attempts() {
        let delay = CountingDelay::default();
        let executor = RetryExecutor::with_delay(3, Duration::from_secs(60), &delay);
        let mut calls = 0usize;
        let result: Result<(), _> = executor.execute("searching", || {
            calls += 1;
            Err("always down".to_string())
        });
        assert_eq!(calls, 3);
        assert_matches!(
            result.unwrap_err(),
            ValidatorError::RemoteUnavailable { attempts: 3, .. }
        );
    }

    #[test]
    fn first_try_success_never_sleeps() {
        let delay = CountingDelay::default();
        let executor = RetryExecutor::with_delay(3, Duration::from_secs(60), &delay);
        let result = executor.execute("fetching", || Ok::<_, String>("ok"));
        assert_eq!(result.unwrap(), "ok");
        assert_eq!(*delay.sleeps.lock().unwrap(), 0);
    }
}
