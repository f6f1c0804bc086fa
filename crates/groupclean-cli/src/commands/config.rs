//! config command - inspect and create configuration

use super::CommandContext;
use crate::ConfigAction;
use anyhow::{bail, Context, Result};
use colored::Colorize;
use groupclean_core::config::CleanupConfig;
use std::path::Path;

pub fn execute(ctx: &CommandContext, action: ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Show => show_config(ctx),
        ConfigAction::Path => {
            println!("{}", ctx.config_path.display());
            Ok(())
        }
        ConfigAction::Init {
            server_type,
            server_url,
            force,
        } => {
            let config = CleanupConfig::from_server_type(server_type.into(), &server_url);
            init_config(&ctx.config_path, &config, force)?;
            println!(
                "{} Configuration written to {}",
                "✓".green(),
                ctx.config_path.display()
            );
            Ok(())
        }
    }
}

fn show_config(ctx: &CommandContext) -> Result<()> {
    let config = ctx.config.redacted();

    if ctx.is_json() {
        return ctx.print_json(&config);
    }

    print!("{}", config.to_toml()?);

    if let Err(e) = ctx.config.validate() {
        eprintln!();
        eprintln!("{} {}", "Warning:".yellow().bold(), e);
    }

    Ok(())
}

/// Write `config` as TOML, creating parent directories
fn init_config(path: &Path, config: &CleanupConfig, force: bool) -> Result<()> {
    if path.exists() && !force {
        bail!(
            "{} already exists, use --force to overwrite",
            path.display()
        );
    }

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }

    std::fs::write(path, config.to_toml()?)
        .with_context(|| format!("Failed to write {}", path.display()))?;

    Ok(())
}
