//! Logging initialization for the daemon.

use crate::Settings;

/// Initialize logging from the `log` section of the settings.
///
/// `level_override` wins over the settings file (it comes from the command
/// line). `plain` strips timestamps and targets for journald.
pub fn init_logging(
    settings: &Settings,
    level_override: Option<&str>,
    plain: bool,
) -> std::io::Result<()> {
    let level = level_override.unwrap_or(&settings.log.level);
    let log_path = settings.log.file_path();

    observability::init_with_config(observability::LogConfig {
        service_name: "portald".into(),
        default_level: level.to_string(),
        log_path,
        plain,
    })
}
