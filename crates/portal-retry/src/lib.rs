//! Bounded retry execution with cancellation.
//!
//! [`run`] executes an async action up to [`RetryPolicy::max_attempts`]
//! times, waiting [`RetryPolicy::interval`] between attempts. The wait is
//! interruptible through a [`ShutdownToken`]. Failures are aggregated in
//! attempt order so callers can log or inspect every one of them.
//!
//! ```ignore
//! let policy = RetryPolicy::new(3, Duration::from_secs(1));
//! let info = portal_retry::run(&policy, &token, || async {
//!     session.lock().await.query_user_info().await
//! })
//! .await?;
//! ```

use portal_lifecycle::ShutdownToken;
use std::fmt;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// How many times to try an action and how long to wait in between.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    interval: Duration,
}

impl RetryPolicy {
    /// Create a policy. `max_attempts` below 1 is raised to 1.
    pub fn new(max_attempts: u32, interval: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            interval,
        }
    }

    /// Run the action exactly once.
    pub fn once() -> Self {
        Self::new(1, Duration::ZERO)
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }
}

/// One failed attempt.
#[derive(Debug)]
pub struct AttemptFailure<E> {
    /// Zero-based attempt index.
    pub attempt: u32,
    pub error: E,
}

impl<E: fmt::Display> fmt::Display for AttemptFailure<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "attempt {}: {}", self.attempt, self.error)
    }
}

/// Why [`run`] gave up.
#[derive(Error, Debug)]
pub enum RetryError<E> {
    /// Every attempt failed.
    #[error("all {} attempts failed", .errors.len())]
    Exhausted { errors: Vec<AttemptFailure<E>> },

    /// The token was cancelled before the attempts ran out.
    #[error("cancelled after {} failed attempts", .errors.len())]
    Cancelled { errors: Vec<AttemptFailure<E>> },

    /// An attempt failed with an error the caller marked as not retryable.
    #[error("gave up after a non-retryable failure ({} attempts)", .errors.len())]
    Aborted { errors: Vec<AttemptFailure<E>> },
}

impl<E> RetryError<E> {
    /// Failed attempts in order.
    pub fn errors(&self) -> &[AttemptFailure<E>] {
        match self {
            Self::Exhausted { errors } | Self::Cancelled { errors } | Self::Aborted { errors } => {
                errors
            }
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }

    /// The most recent failure, if any attempt ran.
    pub fn into_last_error(self) -> Option<E> {
        match self {
            Self::Exhausted { errors } | Self::Cancelled { errors } | Self::Aborted { errors } => {
                errors.into_iter().last().map(|failure| failure.error)
            }
        }
    }
}

impl<E: fmt::Display> RetryError<E> {
    /// All attempt errors on one line, for logging.
    pub fn summary(&self) -> String {
        let errors = self.errors();
        if errors.is_empty() {
            return "no attempts made".to_string();
        }
        errors
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("; ")
    }
}

/// Run `action` under `policy`, retrying every failure.
pub async fn run<T, E, F, Fut>(
    policy: &RetryPolicy,
    token: &ShutdownToken,
    action: F,
) -> Result<T, RetryError<E>>
where
    E: fmt::Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    run_while(policy, token, action, |_| true).await
}

/// Run `action` under `policy`, retrying only failures accepted by
/// `should_retry`.
///
/// A rejected failure ends the run at once with [`RetryError::Aborted`].
pub async fn run_while<T, E, F, Fut, P>(
    policy: &RetryPolicy,
    token: &ShutdownToken,
    mut action: F,
    should_retry: P,
) -> Result<T, RetryError<E>>
where
    E: fmt::Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    P: Fn(&E) -> bool,
{
    let mut errors = Vec::new();

    for attempt in 0..policy.max_attempts {
        if token.is_cancelled() {
            return Err(RetryError::Cancelled { errors });
        }

        let error = match action().await {
            Ok(value) => return Ok(value),
            Err(error) => error,
        };

        let retryable = should_retry(&error);
        debug!(
            attempt,
            max_attempts = policy.max_attempts,
            retryable,
            error = %error,
            "attempt failed"
        );
        errors.push(AttemptFailure { attempt, error });

        if token.is_cancelled() {
            return Err(RetryError::Cancelled { errors });
        }
        if !retryable {
            return Err(RetryError::Aborted { errors });
        }
        if attempt + 1 == policy.max_attempts {
            break;
        }
        if !token.sleep(policy.interval).await {
            return Err(RetryError::Cancelled { errors });
        }
    }

    Err(RetryError::Exhausted { errors })
}
