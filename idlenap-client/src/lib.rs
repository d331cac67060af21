use std::path::Path;

use idlenap_shared::api::rest::PushPlusNotifier;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

pub mod app;
pub mod cli;
pub mod config;
pub mod hibernate;
pub mod net;
pub mod notify;
pub mod platform;
pub mod process;

pub use cli::{Cli, Command};
pub use config::{ConfigFile, resolve_config_path};

pub const LOG_FILE_NAME: &str = "idlenap.log";

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("config error: {0}")]
    Config(String),
    #[error("http error: {0}")]
    Http(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("platform error: {0}")]
    Platform(String),
    #[error("unsupported platform: {0}")]
    Unsupported(&'static str),
}

/// Compact stderr output plus a daily rolling file under `log_dir`. The guard
/// must stay alive for buffered file lines to be flushed.
fn init_tracing(log_dir: Option<&Path>) -> Option<WorkerGuard> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let stderr = fmt::layer()
        .with_target(false)
        .compact()
        .with_writer(std::io::stderr);

    let (file, guard) = match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_NAME);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer()
                .with_ansi(false)
                .with_target(false)
                .with_writer(writer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(stderr)
        .with(file)
        .init();
    guard
}

pub async fn run(cli: Cli) -> Result<(), AppError> {
    if cli.command.is_some() {
        platform::attach_parent_console();
    }
    let log_dir = config::data_dir().map(|d| d.join("logs"));
    let _log_guard = init_tracing(log_dir.as_deref());

    let explicit = cli.config.is_some() || std::env::var_os(config::ENV_CONFIG).is_some();
    let cfg_path = resolve_config_path(cli.config)?;
    if !explicit {
        if let Err(e) = config::migrate_legacy_if_needed(&cfg_path) {
            warn!(error=%e, "legacy config migration failed; continuing");
        }
    }

    let Some(cmd) = cli.command else {
        return app::agent::run(cfg_path).await;
    };

    match cmd {
        Command::ConfigPath => {
            println!("{}", cfg_path.display());
        }
        Command::CheckHibernate => {
            let data_dir = config::data_dir()
                .ok_or_else(|| AppError::Config("could not determine data dir".into()))?;
            let report = hibernate::check_hibernate(&data_dir).await?;
            println!("{}", report.summary());
        }
        Command::EnableHibernate => {
            hibernate::enable_hibernate().await?;
            println!("Hibernate enabled.");
        }
        Command::TestNotify => {
            let cfg = ConfigFile::new(cfg_path).load();
            match app::send_test_notification(&PushPlusNotifier, &cfg).await {
                Ok(msg) => println!("{msg}"),
                Err(msg) => return Err(AppError::Http(msg)),
            }
        }
        Command::Install => {
            let plat = platform::detect()?;
            plat.install_autostart().await?;
            info!("autostart installed");
        }
        Command::Uninstall => {
            let plat = platform::detect()?;
            plat.uninstall_autostart().await?;
            info!("autostart removed");
        }
    }
    Ok(())
}
