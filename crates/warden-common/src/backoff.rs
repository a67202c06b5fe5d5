//! Retry schedule for remote calls

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;

/// Exponential backoff parameters for webhook retries.
///
/// Each wait is the previous wait multiplied by `factor`, perturbed by
/// ± `jitter` fraction, for at most `max_steps` attempts in total.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Backoff {
    /// Wait before the second attempt, in milliseconds
    pub initial_delay_ms: u64,
    /// Multiplier applied to the wait after each attempt
    pub factor: f64,
    /// Fraction by which each wait is randomly perturbed
    pub jitter: f64,
    /// Maximum number of attempts
    pub max_steps: u32,
}

impl Default for Backoff {
    fn default() -> Self {
        Self::default_webhook()
    }
}

impl Backoff {
    /// The default webhook retry schedule: 500ms, x1.5, ±0.2, 5 attempts
    pub fn default_webhook() -> Self {
        Self {
            initial_delay_ms: 500,
            factor: 1.5,
            jitter: 0.2,
            max_steps: 5,
        }
    }

    /// The initial wait as a `Duration`
    pub fn initial_delay(&self) -> Duration {
        Duration::from_millis(self.initial_delay_ms)
    }
}

fn jittered(delay: Duration, jitter: f64) -> Duration {
    if jitter <= 0.0 {
        return delay;
    }
    let factor = 1.0 + jitter * rand::thread_rng().gen_range(-1.0..1.0);
    delay.mul_f64(factor.max(0.0))
}

/// Retry `op` per the backoff schedule.
///
/// Errors for which `should_retry` returns false fail immediately; the last
/// error is returned once the schedule is exhausted. Dropping the returned
/// future aborts the in-flight attempt and any pending sleep.
pub async fn retry<T, E, F, Fut>(
    backoff: &Backoff,
    should_retry: impl Fn(&E) -> bool,
    mut op: F,
) -> Result<T, E>
where
    E: std::fmt::Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let steps = backoff.max_steps.max(1);
    let mut delay = backoff.initial_delay();
    let mut attempt = 0u32;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                attempt += 1;
                if attempt >= steps || !should_retry(&err) {
                    return Err(err);
                }
                tracing::debug!("attempt {attempt} failed, retrying: {err}");
            }
        }
        tokio::time::sleep(jittered(delay, backoff.jitter)).await;
        delay = delay.mul_f64(backoff.factor);
    }
}
