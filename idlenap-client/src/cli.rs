use std::path::PathBuf;

use clap::{Parser, Subcommand};

const HELP_EPILOG: &str = r#"Config resolution order:
  1) --config/-c PATH
  2) $IDLENAP_CONFIG
  3) per-user default: %APPDATA%\idlenap\idlenap\config\config.json
"#;

#[derive(Debug, Parser)]
#[command(
    name = "idlenap",
    version,
    about = "Tray agent that reminds you, then hibernates, when the computer is left running idle",
    long_about = None,
    after_long_help = HELP_EPILOG,
)]
pub struct Cli {
    /// Path to JSON config file
    #[arg(short, long)]
    pub config: Option<PathBuf>,
    /// Optional subcommand. Without one, runs the tray agent.
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run `powercfg /a` and report whether hibernate is available
    CheckHibernate,
    /// Enable hibernate (`powercfg /h on`), elevating if needed
    EnableHibernate,
    /// Push a test reminder with the configured token and topic
    TestNotify,
    /// Register the logon Scheduled Task for the current user
    Install,
    /// Remove the logon Scheduled Task
    Uninstall,
    /// Print the resolved config path
    ConfigPath,
}
