//! Group cleanup engine
//!
//! Scans groups, evaluates their members and reconciles stale memberships.
//! Works against any [`Directory`]: the LDAP client in production, or the
//! in-memory directory behind the `testing` feature.

pub mod evaluator;
#[cfg(any(test, feature = "testing"))]
pub mod memory;
pub mod reconciler;
pub mod scanner;

pub use evaluator::Evaluator;
pub use reconciler::Reconciler;
pub use scanner::Scanner;

use groupclean_core::types::{EvaluatedMember, Group, MemberStatus};
use groupclean_core::config::{CleanupConfig, MembersConfig};
use groupclean_core::{Directory, Result};
use serde::Serialize;
use std::collections::HashMap;
use tracing::info;

/// Scanned groups with the status of every member
#[derive(Debug, Clone, Default, Serialize)]
pub struct Assessment {
    pub groups: Vec<Group>,
    /// Status by member key
    pub statuses: HashMap<String, MemberStatus>,
}

impl Assessment {
    /// Members of one group with their statuses, in group order
    pub fn members_of<'g>(&'g self, group: &'g Group) -> impl Iterator<Item = EvaluatedMember> + 'g {
        group.members.iter().filter_map(move |member| {
            self.statuses.get(&member.key).map(|status| EvaluatedMember {
                member: member.clone(),
                status: status.clone(),
            })
        })
    }

    /// Stale members per group, skipping groups without any
    pub fn stale_by_group<'g>(
        &'g self,
        members: &'g MembersConfig,
    ) -> impl Iterator<Item = (&'g Group, Vec<EvaluatedMember>)> + 'g {
        self.groups.iter().filter_map(move |group| {
            let stale: Vec<_> = self
                .members_of(group)
                .filter(|m| members.is_stale(&m.status))
                .collect();
            (!stale.is_empty()).then_some((group, stale))
        })
    }

    pub fn member_value_count(&self) -> usize {
        self.groups.iter().map(|g| g.members.len()).sum()
    }
}

/// Scan the configured groups
pub async fn scan<D: Directory + ?Sized>(directory: &D, config: &CleanupConfig) -> Result<Vec<Group>> {
    Scanner::new(directory, &config.groups)?.scan().await
}

/// Scan the configured groups and evaluate all their members
pub async fn assess<D: Directory + ?Sized>(
    directory: &D,
    config: &CleanupConfig,
) -> Result<Assessment> {
    let groups = scan(directory, config).await?;
    let statuses = Evaluator::new(directory, config)?.evaluate(&groups).await?;

    let assessment = Assessment { groups, statuses };
    info!(
        groups = assessment.groups.len(),
        member_values = assessment.member_value_count(),
        unique_members = assessment.statuses.len(),
        "Assessment complete"
    );
    Ok(assessment)
}
