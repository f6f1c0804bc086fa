//! test-connection command - bind and show root DSE information

use super::{close_after, CommandContext};
use anyhow::{Context, Result};
use colored::Colorize;
use groupclean_core::utils::normalize_dn;
use groupclean_ldap::LdapDirectory;

pub async fn execute(ctx: &CommandContext) -> Result<()> {
    let connection = &ctx.config.connection;

    // Only the connection settings matter here, group settings may be unset
    let directory = LdapDirectory::connect(connection)
        .await
        .with_context(|| format!("Could not connect to {}", connection.url))?;
    let info = directory.server_info().await.map_err(anyhow::Error::from);
    let info = close_after(directory, info).await?;

    let base = &ctx.config.groups.base_dn;
    let base_served = if base.is_empty() {
        None
    } else {
        Some(info.serves(&normalize_dn(base)?))
    };

    if ctx.is_json() {
        return ctx.print_json(&info);
    }

    println!("{} {}", "✓".green(), format!("Connected to {}", info.url).bold());
    println!();
    println!(
        "  {}: {}",
        "Bound as".cyan(),
        info.bound_as.as_deref().unwrap_or("(anonymous)")
    );
    if let Some(vendor) = &info.vendor {
        println!("  {}: {}", "Vendor".cyan(), vendor);
    }
    if let Some(version) = &info.version {
        println!("  {}: {}", "Version".cyan(), version);
    }
    println!(
        "  {}: {}",
        "LDAP versions".cyan(),
        info.supported_ldap_version.join(", ")
    );
    println!("  {}:", "Naming contexts".cyan());
    if info.naming_contexts.is_empty() {
        println!("    (none advertised)");
    }
    for context in &info.naming_contexts {
        println!("    - {}", context);
    }

    if base_served == Some(false) {
        println!();
        println!(
            "{} group base DN '{}' is not below any advertised naming context",
            "Warning:".yellow().bold(),
            base
        );
    }

    Ok(())
}
