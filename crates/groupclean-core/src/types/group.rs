//! Group entries and cleanup plans

use super::{MemberRef, MemberStatus};
use serde::{Deserialize, Serialize};

/// Object classes whose schema requires at least one value of an attribute
pub const MEMBER_REQUIRED_CLASSES: &[(&str, &str)] = &[
    ("groupOfNames", "member"),
    ("groupOfUniqueNames", "uniqueMember"),
];

/// A group entry and its members
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Group {
    /// Group DN
    pub dn: String,

    /// Normalized DN, used for ordering
    #[serde(skip)]
    pub normalized_dn: String,

    /// Display name (cn)
    pub name: Option<String>,

    /// Object classes of the entry
    #[serde(default)]
    pub object_classes: Vec<String>,

    /// Member references in server order, without duplicates
    pub members: Vec<MemberRef>,
}

impl Group {
    pub fn new(dn: impl Into<String>, normalized_dn: impl Into<String>) -> Self {
        Self {
            dn: dn.into(),
            normalized_dn: normalized_dn.into(),
            ..Default::default()
        }
    }

    /// Append a member unless the same value is already present
    ///
    /// Values differing only in their unique id suffix are distinct.
    /// Returns false for duplicates.
    pub fn push_member(&mut self, member: MemberRef) -> bool {
        let duplicate = self.members.iter().any(|m| {
            m.attribute.eq_ignore_ascii_case(&member.attribute) && m.identity == member.identity
        });
        if duplicate {
            return false;
        }
        self.members.push(member);
        true
    }

    /// Member attributes whose last value the schema forbids removing
    pub fn required_member_attributes(&self) -> Vec<&'static str> {
        MEMBER_REQUIRED_CLASSES
            .iter()
            .filter(|(class, _)| {
                self.object_classes
                    .iter()
                    .any(|c| c.eq_ignore_ascii_case(class))
            })
            .map(|(_, attr)| *attr)
            .collect()
    }

    /// Number of member values held in `attribute`
    pub fn count_values(&self, attribute: &str) -> usize {
        self.members
            .iter()
            .filter(|m| m.attribute.eq_ignore_ascii_case(attribute))
            .count()
    }

    /// Label used in reports: the cn if known, the DN otherwise
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.dn)
    }
}

/// A single planned member removal
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Removal {
    pub attribute: String,
    pub value: String,
    pub status: MemberStatus,
}

/// Planned changes for one group
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GroupPlan {
    pub group_dn: String,

    pub group_name: Option<String>,

    /// Total member values before cleanup
    pub member_count: usize,

    /// Members to remove, in group order
    pub removals: Vec<Removal>,

    /// Stale members kept so the group does not become empty
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub retained: Vec<Removal>,

    /// Reason the whole group was left untouched
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skipped: Option<String>,
}

impl GroupPlan {
    pub fn has_changes(&self) -> bool {
        !self.removals.is_empty()
    }

    /// Removals grouped by attribute, preserving first-seen attribute order
    pub fn removals_by_attribute(&self) -> Vec<(&str, Vec<String>)> {
        let mut grouped: Vec<(&str, Vec<String>)> = Vec::new();
        for removal in &self.removals {
            match grouped
                .iter_mut()
                .find(|(attr, _)| attr.eq_ignore_ascii_case(&removal.attribute))
            {
                Some((_, values)) => values.push(removal.value.clone()),
                None => grouped.push((removal.attribute.as_str(), vec![removal.value.clone()])),
            }
        }
        grouped
    }
}
