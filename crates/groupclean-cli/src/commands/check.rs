//! check command - report stale members without modifying anything

use super::{close_after, CommandContext};
use crate::progress::create_spinner;
use crate::utils::format_status;
use anyhow::Result;
use colored::Colorize;
use groupclean_core::types::EvaluatedMember;
use serde::Serialize;

#[derive(Serialize)]
struct CheckResult {
    groups_scanned: usize,
    members_checked: usize,
    stale_found: usize,
    groups: Vec<GroupCheck>,
}

#[derive(Serialize)]
struct GroupCheck {
    group_dn: String,
    group_name: Option<String>,
    member_count: usize,
    stale: Vec<EvaluatedMember>,
}

pub async fn execute(ctx: &CommandContext) -> Result<()> {
    let directory = ctx.connect().await?;

    let spinner = create_spinner("Checking group members...", ctx.quiet || ctx.is_json());
    let assessment = groupclean_engine::assess(&directory, &ctx.config)
        .await
        .map_err(anyhow::Error::from);
    spinner.finish_and_clear();
    let assessment = close_after(directory, assessment).await?;

    let groups: Vec<GroupCheck> = assessment
        .stale_by_group(&ctx.config.members)
        .map(|(group, stale)| GroupCheck {
            group_dn: group.dn.clone(),
            group_name: group.name.clone(),
            member_count: group.members.len(),
            stale,
        })
        .collect();

    let result = CheckResult {
        groups_scanned: assessment.groups.len(),
        members_checked: assessment.statuses.len(),
        stale_found: groups.iter().map(|g| g.stale.len()).sum(),
        groups,
    };

    if ctx.is_json() {
        return ctx.print_json(&result);
    }

    for group in &result.groups {
        println!(
            "{} {} ({}/{} stale)",
            group.group_name.as_deref().unwrap_or(&group.group_dn).bold(),
            group.group_dn.dimmed(),
            group.stale.len(),
            group.member_count
        );
        for stale in &group.stale {
            println!("    {}  {}", stale.member.value, format_status(&stale.status));
        }
    }

    if result.stale_found == 0 {
        ctx.info(&format!("{} No stale members found", "✓".green()));
    } else {
        ctx.info(&format!(
            "\n{} stale member(s) in {} of {} group(s), {} unique member(s) checked",
            result.stale_found,
            result.groups.len(),
            result.groups_scanned,
            result.members_checked
        ));
    }

    Ok(())
}
