//! Build the runtime pieces from validated settings.

use crate::{ControlLoop, LoopConfig, OnlineDetector};
use portal_client::{
    ConnectivityProbe, PortalResult, PortalSession, SessionConfig, TransportOptions,
};
use portal_config::{DetectionMethod, Settings};
use portal_retry::RetryPolicy;
use std::time::Duration;

pub fn transport_options(settings: &Settings) -> TransportOptions {
    TransportOptions {
        timeout: settings.request_timeout(),
        interface: settings.forced_interface().map(str::to_string),
        local_address: settings.bind_address(),
    }
}

/// Per-request policy: the first attempt plus `network.max_retry_count` retries.
pub fn network_policy(settings: &Settings) -> RetryPolicy {
    RetryPolicy::new(
        settings.network.max_retry_count.saturating_add(1),
        settings.network_retry_interval(),
    )
}

pub fn control_policy(settings: &Settings) -> RetryPolicy {
    RetryPolicy::new(
        settings.control.max_retry_count,
        settings.control_retry_interval(),
    )
}

pub fn session_config(settings: &Settings) -> SessionConfig {
    SessionConfig {
        scheme: settings.account.scheme.clone(),
        server: settings.account.server.clone(),
        username: settings.account.username.clone(),
        transport: transport_options(settings),
        network_retry: network_policy(settings),
    }
}

/// Worst-case duration of one full logout sequence.
pub fn logout_deadline(settings: &Settings) -> Duration {
    let network = network_policy(settings);
    let control = control_policy(settings);

    let per_request = settings
        .request_timeout()
        .saturating_mul(network.max_attempts())
        .saturating_add(network.interval().saturating_mul(network.max_attempts() - 1));
    per_request
        .saturating_add(control.interval())
        .saturating_mul(control.max_attempts())
}

pub fn loop_config(settings: &Settings) -> LoopConfig {
    LoopConfig {
        control_retry: control_policy(settings),
        loop_interval: settings.loop_interval(),
        settle_delay: settings.control_retry_interval(),
        logout_on_exit: settings.control.logout_when_exit,
        logout_deadline: logout_deadline(settings),
    }
}

pub fn detector(settings: &Settings) -> PortalResult<OnlineDetector> {
    Ok(match settings.control.online_detection_method {
        DetectionMethod::AuthServer => OnlineDetector::AuthServer,
        DetectionMethod::Probe => OnlineDetector::Probe(ConnectivityProbe::new(
            settings.control.probe_url.as_str(),
            settings.control.probe_body.as_str(),
            &transport_options(settings),
        )?),
    })
}

/// Everything the daemon needs, wired from settings.
pub fn build_control_loop(settings: &Settings) -> PortalResult<ControlLoop> {
    let session = PortalSession::new(session_config(settings));
    Ok(ControlLoop::new(
        session,
        settings.account.password.clone(),
        detector(settings)?,
        loop_config(settings),
    ))
}
