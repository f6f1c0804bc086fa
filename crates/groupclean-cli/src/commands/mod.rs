//! CLI command implementations

pub mod check;
pub mod cleanup;
pub mod config;
pub mod scan;
pub mod test_connection;

use crate::OutputFormat;
use anyhow::{Context, Result};
use groupclean_core::config::CleanupConfig;
use groupclean_ldap::LdapDirectory;
use serde::Serialize;
use std::path::PathBuf;
use tracing::warn;

/// Context passed to all commands
pub struct CommandContext {
    pub config: CleanupConfig,
    pub config_path: PathBuf,
    pub output_format: OutputFormat,
    pub verbose: bool,
    pub quiet: bool,
}

impl CommandContext {
    /// Check if output should be JSON
    pub fn is_json(&self) -> bool {
        matches!(self.output_format, OutputFormat::Json)
    }

    /// Print info message unless quiet or JSON
    pub fn info(&self, msg: &str) {
        if !self.quiet && !self.is_json() {
            println!("{}", msg);
        }
    }

    /// Print a value as pretty JSON
    pub fn print_json<T: Serialize>(&self, value: &T) -> Result<()> {
        println!("{}", serde_json::to_string_pretty(value)?);
        Ok(())
    }

    /// Validate the configuration and open a bound connection
    pub async fn connect(&self) -> Result<LdapDirectory> {
        self.config.validate().context("Invalid configuration")?;
        LdapDirectory::connect(&self.config.connection)
            .await
            .with_context(|| format!("Could not connect to {}", self.config.connection.url))
    }
}

/// Unbind after a command body, whether it succeeded or not
pub async fn close_after<T>(directory: LdapDirectory, result: Result<T>) -> Result<T> {
    let closed = directory.close().await;
    settle(result, closed)
}

/// Combine a command result with the unbind result; the command's error wins
fn settle<T>(result: Result<T>, closed: groupclean_core::Result<()>) -> Result<T> {
    match (result, closed) {
        (Ok(value), Ok(())) => Ok(value),
        (Ok(_), Err(e)) => Err(e).context("Failed to close the connection"),
        (Err(e), Ok(())) => Err(e),
        (Err(e), Err(close_err)) => {
            warn!("Failed to close the connection: {}", close_err);
            Err(e)
        }
    }
}
