//! Settings file for the daemon.
//!
//! The file is JSON with four sections (`account`, `network`, `control`,
//! `log`). Every field has a default, so a file containing only the account
//! credentials is valid:
//!
//! ```json
//! { "account": { "username": "alice", "password": "secret" } }
//! ```

use crate::{ConfigError, ConfigResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Authentication server used when the settings leave `account.server` blank.
pub const DEFAULT_AUTH_SERVER: &str = "101.76.193.1";

/// Scheme used when the settings leave `account.scheme` blank.
pub const DEFAULT_AUTH_SCHEME: &str = "http";

/// Default log level.
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Connectivity-check URL for the generic probe.
pub const DEFAULT_PROBE_URL: &str = "http://www.msftconnecttest.com/connecttest.txt";

/// Exact body the connectivity-check URL serves when the Internet is reachable.
pub const DEFAULT_PROBE_BODY: &str = "Microsoft Connect Test";

const ENV_LOG_LEVEL: &str = "PORTALD_LOG_LEVEL";
const ENV_PASSWORD: &str = "PORTALD_PASSWORD";

/// Complete daemon settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub account: AccountSettings,
    pub network: NetworkSettings,
    pub control: ControlSettings,
    pub log: LogSettings,
}

/// Portal account and authentication server.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AccountSettings {
    pub username: String,
    pub password: String,
    /// Host[:port] of the authentication server, never a URL.
    pub server: String,
    /// `http` or `https`.
    pub scheme: String,
}

impl Default for AccountSettings {
    fn default() -> Self {
        Self {
            username: String::new(),
            password: String::new(),
            server: DEFAULT_AUTH_SERVER.to_string(),
            scheme: DEFAULT_AUTH_SCHEME.to_string(),
        }
    }
}

impl fmt::Debug for AccountSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccountSettings")
            .field("username", &self.username)
            .field("password", &"[redacted]")
            .field("server", &self.server)
            .field("scheme", &self.scheme)
            .finish()
    }
}

/// Per-request transport settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkSettings {
    /// Interface name used in strict mode (Linux only).
    pub interface: String,
    /// Bind outbound connections instead of following the default route.
    pub strict: bool,
    /// Local address used in strict mode.
    pub custom_ip: String,
    /// Request timeout in seconds.
    pub timeout: u64,
    /// Extra attempts per HTTP request after the first one.
    pub max_retry_count: u32,
    pub retry_interval_sec: u64,
}

impl Default for NetworkSettings {
    fn default() -> Self {
        Self {
            interface: String::new(),
            strict: false,
            custom_ip: String::new(),
            timeout: 3,
            max_retry_count: 3,
            retry_interval_sec: 1,
        }
    }
}

/// Control loop settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlSettings {
    /// Attempts per detection or login step.
    pub max_retry_count: u32,
    pub retry_interval_sec: u64,
    pub loop_interval_sec: u64,
    pub logout_when_exit: bool,
    pub online_detection_method: DetectionMethod,
    pub probe_url: String,
    pub probe_body: String,
}

impl Default for ControlSettings {
    fn default() -> Self {
        Self {
            max_retry_count: 3,
            retry_interval_sec: 1,
            loop_interval_sec: 60,
            logout_when_exit: false,
            online_detection_method: DetectionMethod::AuthServer,
            probe_url: DEFAULT_PROBE_URL.to_string(),
            probe_body: DEFAULT_PROBE_BODY.to_string(),
        }
    }
}

/// Log sink settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogSettings {
    /// JSONL log file; empty logs to stderr only.
    pub filename: String,
    pub level: String,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            filename: String::new(),
            level: DEFAULT_LOG_LEVEL.to_string(),
        }
    }
}

impl LogSettings {
    pub fn file_path(&self) -> Option<PathBuf> {
        let trimmed = self.filename.trim();
        (!trimmed.is_empty()).then(|| PathBuf::from(trimmed))
    }
}

/// How the control loop decides whether the host is online.
///
/// Unknown values fall back to [`DetectionMethod::AuthServer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum DetectionMethod {
    /// Ask the authentication server whether this client is logged in.
    #[default]
    AuthServer,
    /// Fetch a well-known connectivity-check page.
    Probe,
}

impl From<String> for DetectionMethod {
    fn from(value: String) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "microsoft" | "probe" => Self::Probe,
            _ => Self::AuthServer,
        }
    }
}

impl From<DetectionMethod> for String {
    fn from(value: DetectionMethod) -> Self {
        match value {
            DetectionMethod::AuthServer => "auth".to_string(),
            DetectionMethod::Probe => "microsoft".to_string(),
        }
    }
}

impl Settings {
    /// Load, apply environment overrides and validate a settings file.
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let mut settings = Self::from_json(&content)?;
        settings.apply_env_from(|key| std::env::var(key).ok());
        settings.validate()?;
        tracing::debug!(
            path = %path.display(),
            server = %settings.account.server,
            username = %settings.account.username,
            "settings loaded"
        );
        Ok(settings)
    }

    /// Parse settings without validating them.
    pub fn from_json(content: &str) -> ConfigResult<Self> {
        Ok(serde_json::from_str(content)?)
    }

    /// Override fields from environment lookups.
    ///
    /// `PORTALD_LOG_LEVEL` replaces the log level and `PORTALD_PASSWORD` the
    /// account password, so credentials can stay out of the file.
    pub fn apply_env_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(level) = lookup(ENV_LOG_LEVEL).filter(|v| !v.trim().is_empty()) {
            self.log.level = level;
        }
        if let Some(password) = lookup(ENV_PASSWORD).filter(|v| !v.trim().is_empty()) {
            self.account.password = password;
        }
    }

    /// Normalize and validate every field.
    pub fn validate(&mut self) -> ConfigResult<()> {
        let account = &mut self.account;

        account.username = account.username.trim().to_string();
        if account.username.is_empty() {
            return Err(invalid("account.username must not be empty"));
        }

        account.password = account.password.trim().to_string();
        if account.password.is_empty() {
            return Err(invalid("account.password must not be empty"));
        }

        account.server = account.server.trim().to_string();
        if account.server.is_empty() {
            account.server = DEFAULT_AUTH_SERVER.to_string();
        }
        let lower_server = account.server.to_ascii_lowercase();
        if lower_server.starts_with("http:") || lower_server.starts_with("https:") {
            return Err(invalid(format!(
                "account.server expects a host name or address, not a URI: remove the scheme from {:?}",
                account.server
            )));
        }

        account.scheme = account.scheme.trim().to_ascii_lowercase();
        if account.scheme.is_empty() {
            account.scheme = DEFAULT_AUTH_SCHEME.to_string();
        }
        if account.scheme != "http" && account.scheme != "https" {
            return Err(invalid(format!(
                "account.scheme must be http or https, got {:?}",
                account.scheme
            )));
        }

        let network = &mut self.network;
        network.interface = network.interface.trim().to_string();
        network.custom_ip = network.custom_ip.trim().to_string();
        if network.timeout == 0 {
            return Err(invalid("network.timeout must be at least 1 second"));
        }
        if !network.custom_ip.is_empty() && network.custom_ip.parse::<IpAddr>().is_err() {
            return Err(invalid(format!(
                "network.custom_ip is not an IP address: {:?}",
                network.custom_ip
            )));
        }
        if network.strict && network.interface.is_empty() && network.custom_ip.is_empty() {
            return Err(invalid(
                "network.strict requires network.interface or network.custom_ip",
            ));
        }

        let control = &self.control;
        if control.loop_interval_sec == 0 {
            return Err(invalid("control.loop_interval_sec must be more than 0 seconds"));
        }
        if control.max_retry_count == 0 {
            return Err(invalid("control.max_retry_count must be at least 1"));
        }
        if control.online_detection_method == DetectionMethod::Probe
            && control.probe_url.trim().is_empty()
        {
            return Err(invalid("control.probe_url must not be empty"));
        }

        Ok(())
    }

    /// Interface to bind to, only when strict mode is on.
    pub fn forced_interface(&self) -> Option<&str> {
        (self.network.strict && !self.network.interface.is_empty())
            .then_some(self.network.interface.as_str())
    }

    /// Local address to bind to, only when strict mode is on.
    pub fn bind_address(&self) -> Option<IpAddr> {
        if !self.network.strict {
            return None;
        }
        self.network.custom_ip.parse().ok()
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.network.timeout)
    }

    pub fn network_retry_interval(&self) -> Duration {
        Duration::from_secs(self.network.retry_interval_sec)
    }

    pub fn control_retry_interval(&self) -> Duration {
        Duration::from_secs(self.control.retry_interval_sec)
    }

    pub fn loop_interval(&self) -> Duration {
        Duration::from_secs(self.control.loop_interval_sec)
    }
}

fn invalid(message: impl Into<String>) -> ConfigError {
    ConfigError::Invalid(message.into())
}
