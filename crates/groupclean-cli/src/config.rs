//! Configuration loading for the CLI
//!
//! Config file location: ~/.px-ldap-group-cleanup/config.toml
//!
//! Settings are layered: file (or defaults), then `GROUPCLEAN_*`
//! environment variables, then command-line flags.

use crate::GlobalArgs;
use anyhow::{Context, Result};
use groupclean_core::config::CleanupConfig;
use std::path::PathBuf;

/// Get config directory path
pub fn config_dir() -> Result<PathBuf> {
    let home = directories::BaseDirs::new()
        .context("Could not determine home directory")?
        .home_dir()
        .to_path_buf();

    Ok(home.join(format!(".{}", groupclean_core::BINARY_NAME)))
}

/// Get default config file path
pub fn config_path() -> Result<PathBuf> {
    Ok(config_dir()?.join("config.toml"))
}

/// Config file used by this invocation: `--config` or the default path
pub fn resolve_path(args: &GlobalArgs) -> Result<PathBuf> {
    match &args.config {
        Some(path) => Ok(path.clone()),
        None => config_path(),
    }
}

/// Load the effective configuration
///
/// An explicit `--config` must exist; the default file is optional.
pub fn load(args: &GlobalArgs) -> Result<CleanupConfig> {
    let mut config = match &args.config {
        Some(path) => CleanupConfig::from_file(path)
            .with_context(|| format!("Failed to load {}", path.display()))?,
        None => match config_path() {
            Ok(path) if path.exists() => CleanupConfig::from_file(&path)
                .with_context(|| format!("Failed to load {}", path.display()))?,
            _ => CleanupConfig::default(),
        },
    };

    config.apply_env();
    apply_args(&mut config, args);
    config.resolve_secrets()?;

    Ok(config)
}

/// Override with CLI args
fn apply_args(config: &mut CleanupConfig, args: &GlobalArgs) {
    if let Some(url) = &args.url {
        config.connection.url = url.clone();
    }
    if let Some(bind_dn) = &args.bind_dn {
        config.connection.bind_dn = bind_dn.clone();
    }
    if let Some(password) = &args.bind_password {
        config.connection.bind_password = password.clone();
    }
    if let Some(base) = &args.group_base_dn {
        config.groups.base_dn = base.clone();
    }
    if let Some(level) = &args.log_level {
        config.logging.level = level.clone();
    }
    if let Some(format) = args.log_format {
        config.logging.format = format.into();
    }
}
