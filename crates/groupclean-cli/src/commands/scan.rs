//! scan command - list groups and their members

use super::{close_after, CommandContext};
use crate::progress::create_spinner;
use anyhow::Result;
use colored::Colorize;

pub async fn execute(ctx: &CommandContext) -> Result<()> {
    let directory = ctx.connect().await?;

    let spinner = create_spinner("Scanning groups...", ctx.quiet || ctx.is_json());
    let groups = groupclean_engine::scan(&directory, &ctx.config)
        .await
        .map_err(anyhow::Error::from);
    spinner.finish_and_clear();
    let groups = close_after(directory, groups).await?;

    if ctx.is_json() {
        return ctx.print_json(&groups);
    }

    for group in &groups {
        println!(
            "{} {} ({} member{})",
            group.display_name().bold(),
            group.dn.dimmed(),
            group.members.len(),
            if group.members.len() == 1 { "" } else { "s" }
        );
        for member in &group.members {
            if ctx.verbose {
                println!("    {} {}", format!("{}:", member.attribute).dimmed(), member.value);
            } else {
                println!("    {}", member.value);
            }
        }
    }

    ctx.info(&format!(
        "\n{} group(s), {} member value(s)",
        groups.len(),
        groups.iter().map(|g| g.members.len()).sum::<usize>()
    ));

    Ok(())
}
