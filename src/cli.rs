use crate::config::Settings;
use anyhow::{Result, anyhow};
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tracing::Level;

/// Options shared by all tools.
#[derive(Args, Debug)]
pub struct GlobalArgs {
    /// TOML settings file overriding the built-in paths
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
    /// Debug output
    #[arg(short, long, global = true)]
    pub verbose: bool,
    /// Errors only
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,
    /// Do not run the nginx syntax check after writing
    #[arg(long, global = true)]
    pub no_validate: bool,
}

impl GlobalArgs {
    /// Diagnostics go to stderr so stdout carries only status output.
    pub fn init_logging(&self) -> Result<()> {
        let level = if self.verbose {
            Level::DEBUG
        } else if self.quiet {
            Level::ERROR
        } else {
            Level::INFO
        };
        tracing_subscriber::fmt()
            .with_max_level(level)
            .with_target(false)
            .without_time()
            .with_writer(std::io::stderr)
            .try_init()
            .map_err(|e| anyhow!("failed to set up logging: {e}"))
    }

    pub fn settings(&self) -> Result<Settings> {
        Settings::load(self.config.as_deref())
    }
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum Action {
    Add,
    Remove,
    Status,
    Validate,
}

#[derive(Parser, Debug)]
#[command(name = "hotlink-manager", version, about = "Add or remove hotlink protection in an nginx vhost")]
pub struct HotlinkCli {
    /// vhost configuration file
    pub conf_file: PathBuf,
    #[arg(value_enum)]
    pub action: Action,
    /// Referers for `add`, copied verbatim into valid_referers
    pub referers: Option<String>,
    /// Print `status` as JSON
    #[arg(long)]
    pub json: bool,
    #[command(flatten)]
    pub global: GlobalArgs,
}

#[derive(Parser, Debug)]
#[command(name = "rate-limit-manager", version, about = "Add or remove rate limiting in an nginx vhost")]
pub struct RateLimitCli {
    /// vhost configuration file
    pub conf_file: PathBuf,
    #[arg(value_enum)]
    pub action: Action,
    /// Requests per second per client, for `add`
    pub req_limit: Option<u32>,
    /// Concurrent connections per client, for `add`
    pub conn_limit: Option<u32>,
    /// client_max_body_size in KiB, for `add`
    pub body_size_kb: Option<u32>,
    /// Print `status` as JSON
    #[arg(long)]
    pub json: bool,
    #[command(flatten)]
    pub global: GlobalArgs,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum FixCommand {
    /// Remove duplicate server blocks from every vhost file
    Fix,
    /// Run the nginx syntax check
    Check,
}

#[derive(Parser, Debug)]
#[command(name = "config-fix", version, about = "Clean up duplicate nginx server blocks")]
pub struct ConfigFixCli {
    #[command(subcommand)]
    pub command: FixCommand,
    /// vhost directory, overriding the settings
    #[arg(long, global = true)]
    pub vhost_dir: Option<PathBuf>,
    #[command(flatten)]
    pub global: GlobalArgs,
}

/// Like `Parser::parse`, but usage errors exit with 1.
pub fn parse_or_exit<P: Parser>() -> P {
    P::try_parse().unwrap_or_else(|e| {
        let code = if e.use_stderr() { 1 } else { 0 };
        let _ = e.print();
        std::process::exit(code);
    })
}
