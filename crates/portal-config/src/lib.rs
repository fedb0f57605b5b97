//! Settings, validation and logging setup for portald.

mod error;
mod logging;
mod settings;

pub use error::{ConfigError, ConfigResult};
pub use logging::init_logging;
pub use settings::{
    AccountSettings, ControlSettings, DetectionMethod, LogSettings, NetworkSettings, Settings,
    DEFAULT_AUTH_SCHEME, DEFAULT_AUTH_SERVER, DEFAULT_LOG_LEVEL, DEFAULT_PROBE_BODY,
    DEFAULT_PROBE_URL,
};
