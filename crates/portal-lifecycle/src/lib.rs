//! Shutdown coordination for portald.
//!
//! A [`ShutdownToken`] is threaded through every wait in the daemon. The
//! [`SignalListener`] thread is the only thing that cancels the process-wide
//! token; the shutdown work itself runs on the async side once the control
//! loop has returned.

mod signals;

pub use signals::{SignalListener, TERMINATION_SIGNALS};

use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Errors from lifecycle management.
#[derive(Error, Debug)]
pub enum LifecycleError {
    #[error("Failed to register signal handlers: {0}")]
    SignalRegistration(#[source] std::io::Error),
    #[error("Failed to spawn signal listener thread: {0}")]
    ListenerThread(#[source] std::io::Error),
}

/// Cloneable cancellation token.
///
/// Cancellation is one-way and idempotent. Waiters registered through
/// [`ShutdownToken::cancelled`] wake as soon as [`ShutdownToken::cancel`] is
/// called from any thread.
#[derive(Clone, Debug)]
pub struct ShutdownToken {
    state: Arc<watch::Sender<bool>>,
}

impl Default for ShutdownToken {
    fn default() -> Self {
        Self::new()
    }
}

impl ShutdownToken {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self {
            state: Arc::new(tx),
        }
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.state.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.state.borrow()
    }

    /// Resolve once the token is cancelled.
    pub async fn cancelled(&self) {
        let mut rx = self.state.subscribe();
        // `self` keeps the sender alive, so this cannot fail.
        let _ = rx.wait_for(|cancelled| *cancelled).await;
    }

    /// Cancel this token once `deadline` elapses.
    ///
    /// Must be called inside a tokio runtime. Aborting the returned handle
    /// disarms the deadline.
    pub fn cancel_after(&self, deadline: Duration) -> JoinHandle<()> {
        let token = self.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(deadline) => {
                    tracing::debug!(?deadline, "deadline elapsed, cancelling token");
                    token.cancel();
                }
                _ = token.cancelled() => {}
            }
        })
    }

    /// Sleep for `duration` unless the token is cancelled first.
    ///
    /// Returns `true` when the full duration elapsed and `false` when the
    /// sleep was interrupted by cancellation.
    pub async fn sleep(&self, duration: Duration) -> bool {
        if self.is_cancelled() {
            return false;
        }
        tokio::select! {
            _ = tokio::time::sleep(duration) => true,
            _ = self.cancelled() => false,
        }
    }
}
