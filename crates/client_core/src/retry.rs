use std::{future::Future, time::Duration};

use tracing::{info, warn};

use crate::{
    error::{DspError, Result},
    Connection,
};

pub const DEFAULT_RETRY_ATTEMPTS: u32 = 7;
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_secs(1);
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(64);

/// Exponential backoff: the delay after failed attempt `i` is
/// `base_delay * 2^i`, capped at `max_delay`. No sleep follows the last
/// attempt, so the defaults wait 1, 2, 4, 8, 16 and 32 seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_RETRY_ATTEMPTS,
            base_delay: DEFAULT_BASE_DELAY,
            max_delay: DEFAULT_MAX_DELAY,
        }
    }
}

impl RetryPolicy {
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.checked_pow(attempt).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}

/// Runs `operation` until it succeeds, fails with a non-transient error or
/// the attempts are used up.
pub async fn with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    failure_msg: &str,
    mut operation: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) if !err.is_transient() => {
                return Err(DspError::Operation {
                    context: failure_msg.to_string(),
                    source: Box::new(err),
                });
            }
            Err(err) => {
                attempt += 1;
                if attempt >= max_attempts {
                    return Err(DspError::RetryExhausted {
                        context: failure_msg.to_string(),
                        attempts: attempt,
                        source: Box::new(err),
                    });
                }
                let delay = policy.delay_for(attempt - 1);
                warn!(
                    attempt,
                    max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "{failure_msg}; retrying"
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
}

/// Connects to `server` and logs in, retrying transient failures.
pub async fn login_with_retry(
    server: &str,
    email: &str,
    password: &str,
    policy: &RetryPolicy,
) -> Result<Connection> {
    let connection = with_retry(policy, "cannot login to DSP server", move || async move {
        let mut connection = Connection::new(server)?;
        connection.login(email, password).await?;
        Ok(connection)
    })
    .await?;
    info!(server, "connected to DSP server");
    Ok(connection)
}

#[cfg(test)]
#[path = "tests/retry_tests.rs"]
mod tests;
