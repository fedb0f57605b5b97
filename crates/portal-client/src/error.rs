//! Error types for the portal client.

use thiserror::Error;

/// Errors from talking to the authentication server.
#[derive(Error, Debug)]
pub enum PortalError {
    /// DNS, connect, TLS or timeout failure.
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The server answered with something other than 200.
    #[error("unexpected HTTP status {status}")]
    Status { status: u16 },

    /// The body is not the JSON (or JSONP) document we expected.
    #[error("malformed portal response: {0}")]
    Decode(#[source] serde_json::Error),

    /// The body parsed but a required field is missing or empty.
    #[error("portal response is missing `{field}`")]
    MissingField { field: &'static str },

    /// The server refused the request. `reason` is its `error` string verbatim,
    /// `message` the localized `error_msg` when the server sent one.
    #[error("portal rejected request: {reason}{}", message_suffix(.message))]
    Rejected {
        reason: String,
        message: Option<String>,
    },

    #[error("challenge signing failed: {0}")]
    Signer(#[from] SignerError),

    /// Interface binding requested on a platform that cannot do it.
    #[error("binding to interface {interface:?} is not supported on this platform")]
    UnsupportedBinding { interface: String },

    /// The shutdown token fired before the request could complete.
    #[error("request cancelled")]
    Cancelled,

    #[error("invalid portal URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

impl PortalError {
    /// Whether a network-level retry can help.
    ///
    /// Transport failures and 5xx responses are retried; everything else is
    /// a definitive answer from the server or a local problem.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport(_) => true,
            Self::Status { status } => *status >= 500,
            _ => false,
        }
    }
}

fn message_suffix(message: &Option<String>) -> String {
    match message {
        Some(message) => format!(" ({message})"),
        None => String::new(),
    }
}

/// Result type alias using PortalError.
pub type PortalResult<T> = Result<T, PortalError>;

/// Errors from a [`crate::ChallengeSigner`].
#[derive(Error, Debug)]
pub enum SignerError {
    #[error("challenge is empty")]
    EmptyChallenge,

    #[error("failed to encode login info: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("invalid HMAC key: {0}")]
    Key(String),
}
