//! HTTP client construction.

use crate::{PortalError, PortalResult};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};
use std::net::IpAddr;
use std::time::Duration;

/// How outbound requests are made.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportOptions {
    /// Per-request timeout.
    pub timeout: Duration,
    /// Bind to this network interface (Linux-family only).
    pub interface: Option<String>,
    /// Bind to this local address.
    pub local_address: Option<IpAddr>,
}

impl Default for TransportOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(3),
            interface: None,
            local_address: None,
        }
    }
}

/// Build a client for `options`.
///
/// Fails with [`PortalError::UnsupportedBinding`] when an interface is
/// requested on a platform without `SO_BINDTODEVICE`.
pub fn build_client(options: &TransportOptions) -> PortalResult<reqwest::Client> {
    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

    let mut builder = reqwest::Client::builder()
        .timeout(options.timeout)
        .default_headers(headers);

    if let Some(address) = options.local_address {
        builder = builder.local_address(address);
    }
    if let Some(interface) = options.interface.as_deref() {
        builder = bind_interface(builder, interface)?;
    }

    tracing::debug!(
        timeout_ms = options.timeout.as_millis() as u64,
        interface = options.interface.as_deref().unwrap_or(""),
        local_address = ?options.local_address,
        "building HTTP client"
    );
    builder.build().map_err(PortalError::Transport)
}

#[cfg(any(target_os = "android", target_os = "fuchsia", target_os = "linux"))]
fn bind_interface(
    builder: reqwest::ClientBuilder,
    interface: &str,
) -> PortalResult<reqwest::ClientBuilder> {
    Ok(builder.interface(interface))
}

#[cfg(not(any(target_os = "android", target_os = "fuchsia", target_os = "linux")))]
fn bind_interface(
    _builder: reqwest::ClientBuilder,
    interface: &str,
) -> PortalResult<reqwest::ClientBuilder> {
    Err(PortalError::UnsupportedBinding {
        interface: interface.to_string(),
    })
}
