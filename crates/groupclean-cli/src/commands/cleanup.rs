//! cleanup command - remove stale members from groups

use super::{close_after, CommandContext};
use crate::progress::create_spinner;
use crate::utils::{confirm, format_datetime, format_result, format_status, summarize_plans};
use anyhow::{Context, Result};
use colored::Colorize;
use groupclean_core::config::CleanupConfig;
use groupclean_core::types::{CleanupReport, GroupPlan, GroupResult};
use groupclean_engine::Reconciler;
use groupclean_ldap::LdapDirectory;
use std::path::PathBuf;
use std::process::ExitCode;

/// Exit status when the run finished but some removals failed
const EXIT_PARTIAL_FAILURE: u8 = 2;

pub struct CleanupOptions {
    pub dry_run: bool,
    pub yes: bool,
    pub force: bool,
    pub max_removals: Option<usize>,
    pub report: Option<PathBuf>,
}

pub async fn execute(ctx: &CommandContext, options: CleanupOptions) -> Result<ExitCode> {
    let mut config = ctx.config.clone();
    if options.max_removals.is_some() {
        config.cleanup.max_removals = options.max_removals;
    }

    let directory = ctx.connect().await?;
    let result = run(ctx, &directory, &config, &options).await;
    let report = match close_after(directory, result).await? {
        Some(report) => report,
        None => return Ok(ExitCode::SUCCESS),
    };

    if let Some(path) = &options.report {
        let json = serde_json::to_string_pretty(&report)?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write report to {}", path.display()))?;
        ctx.info(&format!("Report written to {}", path.display()));
    }

    if ctx.is_json() {
        ctx.print_json(&report)?;
    } else {
        print_report(ctx, &report);
    }

    if report.has_failures() {
        Ok(ExitCode::from(EXIT_PARTIAL_FAILURE))
    } else {
        Ok(ExitCode::SUCCESS)
    }
}

/// Plan, confirm and apply; `None` when the user declined
async fn run(
    ctx: &CommandContext,
    directory: &LdapDirectory,
    config: &CleanupConfig,
    options: &CleanupOptions,
) -> Result<Option<CleanupReport>> {
    let dry_run = options.dry_run || config.cleanup.dry_run;

    let spinner = create_spinner("Checking group members...", ctx.quiet || ctx.is_json());
    let assessment = groupclean_engine::assess(directory, config).await;
    spinner.finish_and_clear();
    let assessment = assessment?;

    let reconciler = Reconciler::new(directory, config)
        .dry_run(dry_run)
        .force(options.force);
    let plans = reconciler.plan(&assessment);
    reconciler.check_limit(&plans)?;

    let (groups, removals) = summarize_plans(&plans);
    if !ctx.is_json() {
        print_plan(ctx, &plans);
    }

    if removals > 0 && !dry_run && !options.yes {
        let prompt = format!("Remove {} stale member(s) from {} group(s)?", removals, groups);
        if !confirm(&prompt)? {
            ctx.info("Aborted, nothing was changed");
            return Ok(None);
        }
    }

    Ok(Some(reconciler.execute(&assessment, &plans).await?))
}

fn print_plan(ctx: &CommandContext, plans: &[GroupPlan]) {
    for plan in plans {
        if !plan.has_changes() && plan.skipped.is_none() && plan.retained.is_empty() {
            continue;
        }

        println!(
            "{} {}",
            plan.group_name.as_deref().unwrap_or(&plan.group_dn).bold(),
            plan.group_dn.dimmed()
        );
        for removal in &plan.removals {
            println!("  {} {}  {}", "-".red(), removal.value, format_status(&removal.status));
        }
        for kept in &plan.retained {
            println!(
                "  {} {}  {} (kept)",
                "=".yellow(),
                kept.value,
                format_status(&kept.status)
            );
        }
        if let Some(reason) = &plan.skipped {
            println!("  {} {}", "skipped:".yellow(), reason);
        }
    }

    let (groups, removals) = summarize_plans(plans);
    ctx.info(&format!(
        "\n{} removal(s) planned in {} group(s)",
        removals, groups
    ));
}

fn print_report(ctx: &CommandContext, report: &CleanupReport) {
    if ctx.verbose {
        for outcome in &report.groups {
            println!(
                "  {:<14} {}",
                format_result(&outcome.result),
                outcome.group_name.as_deref().unwrap_or(&outcome.group_dn)
            );
        }
    }

    for outcome in &report.groups {
        if let GroupResult::Failed { errors } = &outcome.result {
            for error in errors {
                eprintln!("{} {}: {}", "Failed:".red().bold(), outcome.group_dn, error);
            }
        }
    }

    if ctx.quiet {
        return;
    }

    println!();
    if report.dry_run {
        println!("{}", "Dry run, no changes were made".yellow().bold());
    }
    println!("  {}: {}", "Started".cyan(), format_datetime(&report.started_at));
    println!("  {}: {}", "Groups scanned".cyan(), report.groups_scanned);
    println!("  {}: {}", "Members checked".cyan(), report.members_checked);
    println!("  {}: {}", "Stale found".cyan(), report.stale_found);
    if report.dry_run {
        println!(
            "  {}: {}",
            "Would remove".cyan(),
            report.changed_groups().map(|g| g.removed.len()).sum::<usize>()
        );
    } else {
        println!("  {}: {}", "Removed".cyan(), report.removed);
    }
    if report.has_failures() {
        println!("  {}: {}", "Failed".red(), report.failed);
    }
}
