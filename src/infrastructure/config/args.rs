use std::path::PathBuf;

use clap::Parser;

use super::app_config::LogLevel;

/// Command-line arguments.
#[derive(Debug, Parser)]
#[command(
    name = "rivulet",
    version,
    about = "A headless chat state synchronization client",
    long_about = None
)]
pub struct CliArgs {
    /// Configuration file path.
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Log file path.
    #[arg(long, value_name = "PATH")]
    pub log_path: Option<PathBuf>,

    /// Log verbosity level.
    #[arg(long, value_enum)]
    pub log_level: Option<LogLevel>,

    /// Session token. Overrides any stored session.
    #[arg(long, env = "RIVULET_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Id of the user the session token belongs to.
    #[arg(long, env = "RIVULET_USER_ID")]
    pub user_id: Option<String>,

    /// REST API base URL.
    #[arg(long, value_name = "URL")]
    pub api_url: Option<String>,

    /// Realtime gateway URL.
    #[arg(long, value_name = "URL")]
    pub gateway_url: Option<String>,
}
