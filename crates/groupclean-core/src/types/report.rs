//! Cleanup report

use super::{GroupPlan, Removal};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What happened to a group during apply
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum GroupResult {
    /// Nothing to remove
    Unchanged,
    /// Dry run, removals were only planned
    WouldRemove,
    /// All removals applied
    Removed,
    /// Group left untouched
    Skipped { reason: String },
    /// At least one modify failed
    Failed { errors: Vec<String> },
}

/// Outcome for one group
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupOutcome {
    pub group_dn: String,
    pub group_name: Option<String>,
    pub member_count: usize,
    #[serde(flatten)]
    pub result: GroupResult,
    pub removed: Vec<Removal>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub retained: Vec<Removal>,
}

impl GroupOutcome {
    pub fn from_plan(plan: &GroupPlan, result: GroupResult, removed: Vec<Removal>) -> Self {
        Self {
            group_dn: plan.group_dn.clone(),
            group_name: plan.group_name.clone(),
            member_count: plan.member_count,
            result,
            removed,
            retained: plan.retained.clone(),
        }
    }
}

/// Summary of a cleanup run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CleanupReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub dry_run: bool,
    pub groups_scanned: usize,
    pub members_checked: usize,
    pub stale_found: usize,
    pub removed: usize,
    pub failed: usize,
    pub groups: Vec<GroupOutcome>,
}

impl CleanupReport {
    pub fn new(dry_run: bool) -> Self {
        Self {
            started_at: Utc::now(),
            finished_at: None,
            dry_run,
            groups_scanned: 0,
            members_checked: 0,
            stale_found: 0,
            removed: 0,
            failed: 0,
            groups: Vec::new(),
        }
    }

    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    pub fn has_failures(&self) -> bool {
        self.failed > 0
    }

    /// Groups that were or would be modified
    pub fn changed_groups(&self) -> impl Iterator<Item = &GroupOutcome> {
        self.groups
            .iter()
            .filter(|g| matches!(g.result, GroupResult::Removed | GroupResult::WouldRemove))
    }
}
