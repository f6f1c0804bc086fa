//! Utility functions for the CLI

use chrono::{DateTime, Utc};
use colored::{ColoredString, Colorize};
use groupclean_core::types::{GroupPlan, GroupResult, MemberStatus};
use std::io::{self, BufRead, Write};

/// Format a datetime for display
pub fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.format("%Y-%m-%d %H:%M:%S").to_string()
}

/// Colored status label
pub fn format_status(status: &MemberStatus) -> ColoredString {
    let text = status.to_string();
    match status {
        MemberStatus::Valid => text.green(),
        MemberStatus::Protected | MemberStatus::OutOfScope => text.dimmed(),
        MemberStatus::Missing => text.red(),
        MemberStatus::Disabled { .. } | MemberStatus::Expired { .. } => text.yellow(),
    }
}

/// Colored group result label
pub fn format_result(result: &GroupResult) -> ColoredString {
    match result {
        GroupResult::Unchanged => "unchanged".dimmed(),
        GroupResult::WouldRemove => "would remove".yellow(),
        GroupResult::Removed => "cleaned".green(),
        GroupResult::Skipped { .. } => "skipped".yellow(),
        GroupResult::Failed { .. } => "failed".red().bold(),
    }
}

/// Number of groups with removals and total removals
pub fn summarize_plans(plans: &[GroupPlan]) -> (usize, usize) {
    plans.iter().fold((0, 0), |(groups, removals), plan| {
        if plan.has_changes() {
            (groups + 1, removals + plan.removals.len())
        } else {
            (groups, removals)
        }
    })
}

/// Confirm an action with the user
///
/// The prompt goes to stderr so stdout only carries results.
pub fn confirm(message: &str) -> io::Result<bool> {
    eprint!("{} [y/N]: ", message);
    io::stderr().flush()?;

    let mut input = String::new();
    io::stdin().lock().read_line(&mut input)?;

    Ok(is_yes(&input))
}

fn is_yes(input: &str) -> bool {
    matches!(input.trim().to_lowercase().as_str(), "y" | "yes")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use groupclean_core::types::Removal;

    #[test]
    fn test_format_datetime() {
        let dt = Utc.with_ymd_and_hms(2024, 6, 1, 8, 30, 0).unwrap();
        assert_eq!(format_datetime(&dt), "2024-06-01 08:30:00");
    }

    #[test]
    fn test_is_yes() {
        assert!(is_yes("y\n"));
        assert!(is_yes(" YES "));
        assert!(!is_yes("\n"));
        assert!(!is_yes("no"));
    }

    #[test]
    fn test_summarize_plans() {
        let removal = Removal {
            attribute: "member".into(),
            value: "uid=a,dc=example".into(),
            status: MemberStatus::Missing,
        };
        let plans = vec![
            GroupPlan {
                group_dn: "cn=a,dc=example".into(),
                removals: vec![removal.clone(), removal.clone()],
                ..Default::default()
            },
            GroupPlan {
                group_dn: "cn=b,dc=example".into(),
                ..Default::default()
            },
            GroupPlan {
                group_dn: "cn=c,dc=example".into(),
                removals: vec![removal],
                ..Default::default()
            },
        ];
        assert_eq!(summarize_plans(&plans), (2, 3));
    }
}
