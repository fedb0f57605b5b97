//! portald - keeps this host logged in to the campus captive portal.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::{Parser, Subcommand};
use portal_config::{init_logging, Settings};
use portal_lifecycle::{ShutdownToken, SignalListener};
use portald::{setup, CycleOutcome, ShutdownOutcome};
use tracing::{error, info};

/// portald command-line interface.
#[derive(Parser, Debug)]
#[command(name = "portald")]
#[command(about = "Captive portal login daemon")]
#[command(version)]
struct Cli {
    /// Path to the JSON settings file
    #[arg(short, long, env = "PORTALD_CONFIG", default_value = "portald.json")]
    config: PathBuf,

    #[command(subcommand)]
    command: Option<Commands>,

    /// Log level (trace, debug, info, warn, error); overrides the settings file
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Plain log lines without timestamps or targets, for journald
    #[arg(long, global = true)]
    plain_log: bool,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
enum Commands {
    /// Keep the host logged in until a termination signal arrives
    Run,
    /// Log in once, whatever the current connectivity
    Login,
    /// Log in once, only if the host is offline
    TryLogin,
    /// Log out once
    Logout,
    /// Print this host's address as seen by the portal
    Whoami,
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    let settings = Settings::load(&cli.config)
        .with_context(|| format!("failed to load settings from {}", cli.config.display()))?;
    init_logging(&settings, cli.log_level.as_deref(), cli.plain_log)
        .context("failed to initialize logging")?;

    let control = setup::build_control_loop(&settings).context("failed to set up portal client")?;

    let token = ShutdownToken::new();
    let _signals =
        SignalListener::spawn(token.clone()).context("failed to install signal handlers")?;

    let succeeded = match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => {
            info!(
                version = env!("CARGO_PKG_VERSION"),
                server = %settings.account.server,
                username = %settings.account.username,
                "portald starting"
            );
            let outcome = control.run_until_shutdown(&token).await;
            info!(?outcome, "portald stopped");
            outcome != ShutdownOutcome::LogoutFailed
        }
        Commands::Login => match control.login_once(&token).await {
            Ok(()) => true,
            Err(err) => {
                error!(errors = %err.summary(), "login failed");
                false
            }
        },
        Commands::TryLogin => match control.try_login_once(&token).await {
            CycleOutcome::AlreadyOnline | CycleOutcome::LoggedIn => true,
            CycleOutcome::LoginFailed { .. } | CycleOutcome::Cancelled => false,
        },
        Commands::Logout => match control.logout_once(&token).await {
            Ok(()) => true,
            Err(err) => {
                error!(errors = %err.summary(), "logout failed");
                false
            }
        },
        Commands::Whoami => match control.whoami(&token).await {
            Ok(info) => match info.client_ip {
                Some(ip) => {
                    println!("{ip}");
                    true
                }
                None => {
                    error!("portal did not report a client address");
                    false
                }
            },
            Err(err) => {
                error!(errors = %err.summary(), "user info query failed");
                false
            }
        },
    };

    Ok(if succeeded {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
