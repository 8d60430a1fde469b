use tokio::time::{Duration, sleep};
use tracing::{debug, info, warn};

use crate::models::retry::RetryConfig;

/// Splits `devices` into consecutive chunks of `size`; only the last chunk may
/// be shorter. A `size` of zero is treated as one.
pub fn slice_devices<T>(devices: &[T], size: usize) -> Vec<&[T]> {
    devices.chunks(size.max(1)).collect()
}

/// Exponential delay schedule with a ceiling. One instance can be shared by
/// several retry loops so their waits follow a single schedule.
#[derive(Debug, Clone)]
pub struct Backoff {
    delay_ms: u64,
    max_delay_ms: u64,
    multiplier: u64,
}

impl Backoff {
    pub fn new(config: &RetryConfig) -> Self {
        Self {
            delay_ms: config.initial_delay_ms.min(config.max_delay_ms),
            max_delay_ms: config.max_delay_ms,
            multiplier: config.backoff_multiplier,
        }
    }

    /// Returns the delay for the next wait and advances the schedule.
    pub fn next_delay_ms(&mut self) -> u64 {
        let current = self.delay_ms;
        self.delay_ms = std::cmp::min(
            self.delay_ms.saturating_mul(self.multiplier),
            self.max_delay_ms,
        );
        current
    }

    pub async fn wait(&mut self) {
        let delay_ms = self.next_delay_ms();
        sleep(Duration::from_millis(jittered(delay_ms))).await;
    }
}

/// Runs `operation` up to `max_attempts` times, waiting on `backoff` between
/// attempts. Errors `should_retry` rejects end the loop at once.
pub async fn retry_with_backoff_when<F, Fut, T, E, P>(
    max_attempts: u32,
    backoff: &mut Backoff,
    should_retry: P,
    operation: F,
) -> Result<T, E>
where
    F: Fn() -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
    E: std::fmt::Display,
    P: Fn(&E) -> bool,
{
    let mut attempt = 0;

    loop {
        attempt += 1;

        match operation().await {
            Ok(result) => {
                if attempt > 1 {
                    info!(attempt, max_attempts, "Retry succeeded");
                }
                return Ok(result);
            }
            Err(e) => {
                if !should_retry(&e) {
                    warn!(attempt, error = %e, "Non-retryable failure, giving up");
                    return Err(e);
                }

                if attempt >= max_attempts {
                    warn!(
                        max_attempts,
                        error = %e,
                        "Retry failed after exhausting all attempts"
                    );
                    return Err(e);
                }

                debug!(attempt, max_attempts, "Retry attempt failed, backing off");

                backoff.wait().await;
            }
        }
    }
}

/// `delay_ms` spread by up to ten percent either way.
pub fn jittered(delay_ms: u64) -> u64 {
    let jitter = rand::random_range(-0.1..=0.1);
    (delay_ms as f64 * (1.0 + jitter)) as u64
}
