//! Reconciler
//!
//! Turns evaluated memberships into per-group removal plans and applies
//! them. Plans respect the empty-group policy; applying respects dry-run
//! and the removal safety limit.

use crate::Assessment;
use groupclean_core::config::{CleanupConfig, EmptyGroupPolicy};
use groupclean_core::types::{
    CleanupReport, Group, GroupOutcome, GroupPlan, GroupResult, MemberStatus, Removal,
};
use groupclean_core::{Directory, Error, Result};
use std::collections::HashMap;
use tracing::{error, info, warn};

pub struct Reconciler<'a, D: Directory + ?Sized> {
    directory: &'a D,
    config: &'a CleanupConfig,
    dry_run: bool,
    force: bool,
}

impl<'a, D: Directory + ?Sized> Reconciler<'a, D> {
    pub fn new(directory: &'a D, config: &'a CleanupConfig) -> Self {
        Self {
            directory,
            config,
            dry_run: config.cleanup.dry_run,
            force: false,
        }
    }

    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Ignore `max_removals`
    pub fn force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    /// Plan removals for every group
    pub fn plan(&self, assessment: &Assessment) -> Vec<GroupPlan> {
        assessment
            .groups
            .iter()
            .map(|group| self.plan_group(group, &assessment.statuses))
            .collect()
    }

    fn plan_group(&self, group: &Group, statuses: &HashMap<String, MemberStatus>) -> GroupPlan {
        let mut plan = GroupPlan {
            group_dn: group.dn.clone(),
            group_name: group.name.clone(),
            member_count: group.members.len(),
            ..Default::default()
        };

        for member in &group.members {
            let status = match statuses.get(&member.key) {
                Some(status) => status,
                None => continue,
            };
            if self.config.members.is_stale(status) {
                plan.removals.push(Removal {
                    attribute: member.attribute.clone(),
                    value: member.value.clone(),
                    status: status.clone(),
                });
            }
        }

        for attribute in group.required_member_attributes() {
            let present = group.count_values(attribute);
            let removing = plan
                .removals
                .iter()
                .filter(|r| r.attribute.eq_ignore_ascii_case(attribute))
                .count();

            if present == 0 || removing < present {
                continue;
            }

            match self.config.cleanup.empty_group {
                EmptyGroupPolicy::Allow => {}
                EmptyGroupPolicy::KeepOne => {
                    if let Some(pos) = plan
                        .removals
                        .iter()
                        .position(|r| r.attribute.eq_ignore_ascii_case(attribute))
                    {
                        let kept = plan.removals.remove(pos);
                        warn!(
                            group = %group.dn,
                            member = %kept.value,
                            "Keeping stale member, {} must not be empty",
                            attribute
                        );
                        plan.retained.push(kept);
                    }
                }
                EmptyGroupPolicy::Skip => {
                    warn!(group = %group.dn, "Skipping group, cleanup would empty {}", attribute);
                    plan.skipped = Some(format!(
                        "removing all {} value(s) of {} would leave the group empty",
                        present, attribute
                    ));
                    plan.retained.append(&mut plan.removals);
                    break;
                }
            }
        }

        plan
    }

    /// Fail when the plans exceed the removal limit and the run is not forced
    pub fn check_limit(&self, plans: &[GroupPlan]) -> Result<()> {
        let planned: usize = plans.iter().map(|p| p.removals.len()).sum();
        match self.config.cleanup.max_removals {
            Some(limit) if planned > limit && !self.force => {
                Err(Error::SafetyLimit { planned, limit })
            }
            Some(limit) if planned > limit => {
                warn!(planned, limit, "Removal limit exceeded, continuing because forced");
                Ok(())
            }
            _ => Ok(()),
        }
    }

    /// Apply the plans and build the report
    pub async fn execute(
        &self,
        assessment: &Assessment,
        plans: &[GroupPlan],
    ) -> Result<CleanupReport> {
        self.check_limit(plans)?;

        let mut report = CleanupReport::new(self.dry_run);
        report.groups_scanned = assessment.groups.len();
        report.members_checked = assessment.statuses.len();
        report.stale_found = plans
            .iter()
            .map(|p| p.removals.len() + p.retained.len())
            .sum();

        for plan in plans {
            let outcome = self.apply_plan(plan).await;
            report.removed += match outcome.result {
                GroupResult::Removed | GroupResult::Failed { .. } => outcome.removed.len(),
                _ => 0,
            };
            if matches!(outcome.result, GroupResult::Failed { .. }) {
                report.failed += plan.removals.len() - outcome.removed.len();
            }
            report.groups.push(outcome);
        }

        report.finish();
        info!(
            dry_run = report.dry_run,
            groups = report.groups_scanned,
            stale = report.stale_found,
            removed = report.removed,
            failed = report.failed,
            "Cleanup finished"
        );

        Ok(report)
    }

    async fn apply_plan(&self, plan: &GroupPlan) -> GroupOutcome {
        if let Some(reason) = &plan.skipped {
            return GroupOutcome::from_plan(
                plan,
                GroupResult::Skipped {
                    reason: reason.clone(),
                },
                Vec::new(),
            );
        }

        if !plan.has_changes() {
            return GroupOutcome::from_plan(plan, GroupResult::Unchanged, Vec::new());
        }

        if self.dry_run {
            info!(
                group = %plan.group_dn,
                count = plan.removals.len(),
                "Would remove stale members (dry run)"
            );
            return GroupOutcome::from_plan(plan, GroupResult::WouldRemove, plan.removals.clone());
        }

        let mut removed = Vec::new();
        let mut errors = Vec::new();

        for (attribute, values) in plan.removals_by_attribute() {
            match self
                .directory
                .remove_values(&plan.group_dn, attribute, &values)
                .await
            {
                Ok(()) => {
                    info!(
                        group = %plan.group_dn,
                        attribute,
                        count = values.len(),
                        "Removed stale members"
                    );
                    removed.extend(
                        plan.removals
                            .iter()
                            .filter(|r| r.attribute.eq_ignore_ascii_case(attribute))
                            .cloned(),
                    );
                }
                Err(e) => {
                    error!(group = %plan.group_dn, attribute, "Failed to remove members: {}", e);
                    errors.push(e.to_string());
                }
            }
        }

        let result = if errors.is_empty() {
            GroupResult::Removed
        } else {
            GroupResult::Failed { errors }
        };

        GroupOutcome::from_plan(plan, result, removed)
    }
}
