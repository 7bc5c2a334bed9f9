use std::thread;
use std::time::Duration;

use tracing::warn;

use crate::cli::{RetryArgs, RetryMode};
use crate::error::{ExtractError, RetryDecision};

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: Duration,
    pub mode: RetryMode,
}

impl RetryPolicy {
    pub fn from_args(args: &RetryArgs) -> Self {
        Self {
            max_attempts: args.max_attempts.max(1),
            backoff: Duration::from_millis(args.backoff_ms),
            mode: args.retry_mode,
        }
    }

    fn decide(&self, err: &ExtractError) -> RetryDecision {
        match self.mode {
            RetryMode::Uniform => RetryDecision::Retry,
            RetryMode::Classified => err.retry_decision(),
        }
    }
}

#[derive(Debug)]
pub enum RetryOutcome<T> {
    Succeeded { value: T, retries: u32 },
    Exhausted { attempts: u32, last_error: ExtractError },
}

/// Runs `op` until it succeeds, hits an error the policy aborts on, or uses
/// up `max_attempts`. Waits a fixed `backoff` between attempts.
pub fn run_with_retry<T, F>(
    policy: &RetryPolicy,
    mut op: F,
) -> Result<RetryOutcome<T>, ExtractError>
where
    F: FnMut(u32) -> Result<T, ExtractError>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        let err = match op(attempt) {
            Ok(value) => {
                return Ok(RetryOutcome::Succeeded {
                    value,
                    retries: attempt - 1,
                });
            }
            Err(err) => err,
        };

        if policy.decide(&err) == RetryDecision::Abort {
            return Err(err);
        }

        warn!(
            attempt,
            max_attempts,
            kind = err.kind(),
            error = %err,
            "extraction attempt failed"
        );

        if attempt >= max_attempts {
            warn!(attempts = attempt, "giving up after exhausting retries");
            return Ok(RetryOutcome::Exhausted {
                attempts: attempt,
                last_error: err,
            });
        }

        if !policy.backoff.is_zero() {
            thread::sleep(policy.backoff);
        }
        attempt += 1;
    }
}
