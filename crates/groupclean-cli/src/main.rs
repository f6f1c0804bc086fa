//! px-ldap-group-cleanup
//!
//! Finds group memberships that point to deleted, disabled or expired
//! directory entries and removes them.

mod commands;
mod config;
mod progress;
mod utils;

use clap::{Args, Parser, Subcommand, ValueEnum};
use colored::Colorize;
use commands::CommandContext;
use groupclean_core::config::{LogFormat, ServerType};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "px-ldap-group-cleanup")]
#[command(version = groupclean_core::VERSION)]
#[command(about = "Remove stale members from LDAP groups", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[command(flatten)]
    global: GlobalArgs,
}

/// Options shared by all subcommands
#[derive(Args, Debug, Default)]
pub struct GlobalArgs {
    /// Configuration file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// LDAP server URL (ldap:// or ldaps://)
    #[arg(long, global = true)]
    pub url: Option<String>,

    /// DN to bind as
    #[arg(long, global = true)]
    pub bind_dn: Option<String>,

    /// Bind password
    #[arg(long, global = true, env = "GROUPCLEAN_BIND_PASSWORD", hide_env_values = true)]
    pub bind_password: Option<String>,

    /// Base DN to search for groups
    #[arg(long, global = true)]
    pub group_base_dn: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Log format
    #[arg(long, global = true, value_enum)]
    pub log_format: Option<LogFormatArg>,

    /// Output format
    #[arg(short, long, global = true, value_enum, default_value = "text")]
    pub output: OutputFormat,

    /// Suppress progress and informational output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum LogFormatArg {
    Text,
    Json,
}

impl From<LogFormatArg> for LogFormat {
    fn from(arg: LogFormatArg) -> Self {
        match arg {
            LogFormatArg::Text => LogFormat::Text,
            LogFormatArg::Json => LogFormat::Json,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum ServerTypeArg {
    Ldap,
    ActiveDirectory,
    Openldap,
    #[value(name = "389ds")]
    Directory389,
}

impl From<ServerTypeArg> for ServerType {
    fn from(arg: ServerTypeArg) -> Self {
        match arg {
            ServerTypeArg::Ldap => ServerType::Ldap,
            ServerTypeArg::ActiveDirectory => ServerType::ActiveDirectory,
            ServerTypeArg::Openldap => ServerType::OpenLdap,
            ServerTypeArg::Directory389 => ServerType::Directory389,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Connect, bind and show server information
    TestConnection,

    /// List groups and their members
    Scan,

    /// Report stale members without modifying anything
    Check,

    /// Remove stale members from groups
    Cleanup {
        /// Plan only, do not modify the directory
        #[arg(long)]
        dry_run: bool,

        /// Do not ask for confirmation
        #[arg(short, long)]
        yes: bool,

        /// Ignore the removal limit
        #[arg(long)]
        force: bool,

        /// Refuse to run when more removals are planned
        #[arg(long)]
        max_removals: Option<usize>,

        /// Write the JSON report to this file
        #[arg(long)]
        report: Option<PathBuf>,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Print the effective configuration
    Show,

    /// Print the configuration file path
    Path,

    /// Write a starter configuration file
    Init {
        /// Directory server flavour
        #[arg(long, value_enum, default_value = "ldap")]
        server_type: ServerTypeArg,

        /// LDAP server URL
        #[arg(long, default_value = "ldap://localhost:389")]
        server_url: String,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            match e.downcast_ref::<groupclean_core::Error>() {
                Some(err) => {
                    eprintln!("{} [{}] {:#}", "Error:".red().bold(), err.code(), e);
                    if err.is_transient() {
                        eprintln!("{}", "The directory may be temporarily unavailable, retry later".dimmed());
                    }
                }
                None => eprintln!("{} {:#}", "Error:".red().bold(), e),
            }
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    let config = config::load(&cli.global)?;
    init_logging(&config.logging.level, config.logging.format, &cli.global);

    let ctx = CommandContext {
        config,
        config_path: config::resolve_path(&cli.global)?,
        output_format: cli.global.output,
        verbose: cli.global.verbose,
        quiet: cli.global.quiet,
    };

    match cli.command {
        Commands::TestConnection => commands::test_connection::execute(&ctx).await?,
        Commands::Scan => commands::scan::execute(&ctx).await?,
        Commands::Check => commands::check::execute(&ctx).await?,
        Commands::Cleanup {
            dry_run,
            yes,
            force,
            max_removals,
            report,
        } => {
            let options = commands::cleanup::CleanupOptions {
                dry_run,
                yes,
                force,
                max_removals,
                report,
            };
            return commands::cleanup::execute(&ctx, options).await;
        }
        Commands::Config { action } => commands::config::execute(&ctx, action)?,
    }

    Ok(ExitCode::SUCCESS)
}

/// Install the tracing subscriber, writing to stderr
///
/// `RUST_LOG` takes precedence over the configured level.
fn init_logging(level: &str, format: LogFormat, args: &GlobalArgs) {
    let level = if args.log_level.is_some() {
        level
    } else if args.verbose {
        "debug"
    } else if args.quiet {
        "error"
    } else {
        level
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let registry = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Json => registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init(),
        LogFormat::Text => registry
            .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
            .init(),
    }
}
