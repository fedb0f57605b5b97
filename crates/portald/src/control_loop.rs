//! The resident detection/login cycle and the exit sequence.

use crate::detector::{Offline, OnlineDetector};
use portal_client::{PortalError, PortalSession, UserInfo};
use portal_lifecycle::ShutdownToken;
use portal_retry::{RetryError, RetryPolicy};
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tracing::{debug, info, warn};

/// Where the loop currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Idle,
    Checking,
    Online,
    LoggingIn,
    ShuttingDown,
}

/// Result of one detection/login cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    AlreadyOnline,
    LoggedIn,
    /// Every login attempt failed.
    LoginFailed { attempts: usize },
    /// The shutdown token fired during the cycle.
    Cancelled,
}

/// Result of the exit sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownOutcome {
    /// Logout on exit is disabled.
    Skipped,
    LoggedOut,
    LogoutFailed,
}

/// Timing and exit behavior of the loop.
#[derive(Debug, Clone)]
pub struct LoopConfig {
    /// Applies to detection, login and the exit logout.
    pub control_retry: RetryPolicy,
    pub loop_interval: Duration,
    /// Delay before re-checking connectivity after a successful login.
    pub settle_delay: Duration,
    pub logout_on_exit: bool,
    /// Upper bound on the whole exit logout sequence.
    pub logout_deadline: Duration,
}

/// Owns the portal session and drives it.
pub struct ControlLoop {
    session: Mutex<PortalSession>,
    password: String,
    detector: OnlineDetector,
    config: LoopConfig,
    state: watch::Sender<LoopState>,
}

impl ControlLoop {
    pub fn new(
        session: PortalSession,
        password: impl Into<String>,
        detector: OnlineDetector,
        config: LoopConfig,
    ) -> Self {
        let (state, _) = watch::channel(LoopState::Idle);
        Self {
            session: Mutex::new(session),
            password: password.into(),
            detector,
            config,
            state,
        }
    }

    /// Watch state transitions.
    pub fn subscribe(&self) -> watch::Receiver<LoopState> {
        self.state.subscribe()
    }

    pub fn state(&self) -> LoopState {
        *self.state.borrow()
    }

    fn transition(&self, next: LoopState) {
        let previous = self.state.send_replace(next);
        if previous != next {
            debug!(from = ?previous, to = ?next, "control loop state");
        }
    }

    async fn detect(&self, token: &ShutdownToken) -> Result<(), RetryError<Offline>> {
        let session = &self.session;
        let detector = &self.detector;
        portal_retry::run(&self.config.control_retry, token, || async move {
            detector.check(session).await
        })
        .await
    }

    async fn login(&self, token: &ShutdownToken) -> Result<(), RetryError<PortalError>> {
        let session = &self.session;
        let password = self.password.as_str();
        portal_retry::run(&self.config.control_retry, token, || async move {
            session.lock().await.login(password).await
        })
        .await
    }

    /// One detection pass, followed by a login if the host is offline.
    pub async fn run_cycle(&self, token: &ShutdownToken) -> CycleOutcome {
        self.transition(LoopState::Checking);

        match self.detect(token).await {
            Ok(()) => {
                self.transition(LoopState::Online);
                info!(detector = self.detector.name(), "network is up, nothing to do");
                return CycleOutcome::AlreadyOnline;
            }
            Err(err) if err.is_cancelled() => {
                debug!(failures = err.errors().len(), "detection interrupted by shutdown");
                return CycleOutcome::Cancelled;
            }
            Err(err) => {
                info!(reason = %err.summary(), "network is down, logging in via web portal");
            }
        }

        self.transition(LoopState::LoggingIn);
        match self.login(token).await {
            Ok(()) => {
                info!("logged in");
                self.verify_after_login(token).await;
                CycleOutcome::LoggedIn
            }
            Err(err) if err.is_cancelled() => {
                info!(failures = err.errors().len(), "login interrupted by shutdown");
                CycleOutcome::Cancelled
            }
            Err(err) => {
                warn!(
                    attempts = err.errors().len(),
                    errors = %err.summary(),
                    "login failed, retrying next cycle"
                );
                CycleOutcome::LoginFailed {
                    attempts: err.errors().len(),
                }
            }
        }
    }

    async fn verify_after_login(&self, token: &ShutdownToken) {
        if !token.sleep(self.config.settle_delay).await {
            return;
        }
        match self.detector.check(&self.session).await {
            Ok(()) => info!("network is up"),
            Err(reason) => warn!(
                %reason,
                retry_in_secs = self.config.loop_interval.as_secs(),
                "network is still down after login"
            ),
        }
    }

    /// Run cycles until `token` is cancelled.
    ///
    /// The first cycle starts immediately; cycles never overlap.
    pub async fn run(&self, token: &ShutdownToken) {
        self.session.lock().await.bind_shutdown(token.clone());
        info!(
            interval_secs = self.config.loop_interval.as_secs(),
            detector = self.detector.name(),
            "control loop started"
        );

        while !token.is_cancelled() {
            let outcome = self.run_cycle(token).await;
            debug!(?outcome, "cycle finished");
            if token.is_cancelled() {
                break;
            }
            self.transition(LoopState::Idle);
            if !token.sleep(self.config.loop_interval).await {
                break;
            }
        }

        info!("control loop stopped");
    }

    /// Exit sequence: one bounded logout if configured.
    ///
    /// The logout runs under its own token so that the already-cancelled
    /// daemon token does not cut it short; `logout_deadline` bounds it.
    pub async fn shutdown(&self) -> ShutdownOutcome {
        self.transition(LoopState::ShuttingDown);
        if !self.config.logout_on_exit {
            return ShutdownOutcome::Skipped;
        }

        let exit_token = ShutdownToken::new();
        let deadline = exit_token.cancel_after(self.config.logout_deadline);
        self.session.lock().await.bind_shutdown(exit_token.clone());

        info!("logging out before exit");
        let result = self.logout(&exit_token).await;
        deadline.abort();

        match result {
            Ok(()) => ShutdownOutcome::LoggedOut,
            Err(err) => {
                warn!(
                    cancelled = err.is_cancelled(),
                    errors = %err.summary(),
                    "logout before exit failed"
                );
                ShutdownOutcome::LogoutFailed
            }
        }
    }

    /// [`ControlLoop::run`] followed by [`ControlLoop::shutdown`].
    pub async fn run_until_shutdown(&self, token: &ShutdownToken) -> ShutdownOutcome {
        self.run(token).await;
        self.shutdown().await
    }

    async fn logout(&self, token: &ShutdownToken) -> Result<(), RetryError<PortalError>> {
        let session = &self.session;
        portal_retry::run(&self.config.control_retry, token, || async move {
            session.lock().await.logout().await
        })
        .await
    }

    /// Log in once, whatever the current connectivity.
    pub async fn login_once(&self, token: &ShutdownToken) -> Result<(), RetryError<PortalError>> {
        self.session.lock().await.bind_shutdown(token.clone());
        self.transition(LoopState::LoggingIn);
        let result = self.login(token).await;
        self.transition(LoopState::Idle);
        result
    }

    /// One cycle: log in only if the host is offline.
    pub async fn try_login_once(&self, token: &ShutdownToken) -> CycleOutcome {
        self.session.lock().await.bind_shutdown(token.clone());
        self.run_cycle(token).await
    }

    /// Log out once.
    pub async fn logout_once(&self, token: &ShutdownToken) -> Result<(), RetryError<PortalError>> {
        self.session.lock().await.bind_shutdown(token.clone());
        self.logout(token).await
    }

    /// Ask the portal for this host's address.
    pub async fn whoami(&self, token: &ShutdownToken) -> Result<UserInfo, RetryError<PortalError>> {
        self.session.lock().await.bind_shutdown(token.clone());
        let session = &self.session;
        portal_retry::run(&self.config.control_retry, token, || async move {
            session.lock().await.query_user_info().await
        })
        .await
    }
}
