use crate::{LifecycleError, ShutdownToken};
use signal_hook::consts::{SIGHUP, SIGINT, SIGQUIT, SIGTERM};
use signal_hook::iterator::{Handle, Signals};
use std::thread::JoinHandle;

/// Signals that request a graceful shutdown.
pub const TERMINATION_SIGNALS: [i32; 4] = [SIGHUP, SIGINT, SIGTERM, SIGQUIT];

/// Dedicated thread translating termination signals into token cancellation.
///
/// The first signal cancels the token. Any further signal arriving while the
/// daemon is already shutting down exits the process immediately with
/// `128 + signal`.
pub struct SignalListener {
    handle: Handle,
    thread: Option<JoinHandle<()>>,
}

impl SignalListener {
    pub fn spawn(token: ShutdownToken) -> Result<Self, LifecycleError> {
        let mut signals =
            Signals::new(TERMINATION_SIGNALS).map_err(LifecycleError::SignalRegistration)?;
        let handle = signals.handle();

        let thread = std::thread::Builder::new()
            .name("portald-signals".into())
            .spawn(move || {
                for signal in signals.forever() {
                    if token.is_cancelled() {
                        tracing::warn!(signal, "second signal during shutdown, exiting now");
                        std::process::exit(128 + signal);
                    }
                    tracing::info!(signal, "termination signal received, shutting down");
                    token.cancel();
                }
            })
            .map_err(LifecycleError::ListenerThread)?;

        Ok(Self {
            handle,
            thread: Some(thread),
        })
    }
}

impl Drop for SignalListener {
    fn drop(&mut self) {
        self.handle.close();
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}
