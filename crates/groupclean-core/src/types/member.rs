//! Group member references and their evaluated status

use crate::utils::{normalize_dn, strip_unique_id};
use crate::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// How the values of a member attribute identify members
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemberSyntax {
    /// Value is a distinguished name (member, uniqueMember)
    Dn,
    /// Value is a user id resolved below the member base DNs (memberUid)
    Uid,
}

/// One value of a group's member attribute
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberRef {
    /// Attribute the value was read from
    pub attribute: String,

    /// Value exactly as stored on the group
    pub value: String,

    /// Value syntax
    pub syntax: MemberSyntax,

    /// Entry identity, shared by every value that refers to the same entry
    pub key: String,

    /// Value identity within a group: the key plus any unique id suffix
    #[serde(skip)]
    pub identity: String,
}

impl MemberRef {
    /// Create a reference from a DN-valued attribute
    pub fn dn(attribute: impl Into<String>, value: impl Into<String>) -> Result<Self> {
        let value = value.into();
        let dn = strip_unique_id(&value);
        let key = normalize_dn(dn)?;
        let identity = format!("{}{}", key, value[dn.len()..].to_ascii_lowercase());
        Ok(Self {
            attribute: attribute.into(),
            value,
            syntax: MemberSyntax::Dn,
            key,
            identity,
        })
    }

    /// Create a reference from a uid-valued attribute
    pub fn uid(attribute: impl Into<String>, value: impl Into<String>) -> Self {
        let value = value.into();
        let key = format!("uid:{}", value.trim());
        Self {
            attribute: attribute.into(),
            value,
            syntax: MemberSyntax::Uid,
            identity: key.clone(),
            key,
        }
    }

    pub fn new(
        attribute: impl Into<String>,
        value: impl Into<String>,
        syntax: MemberSyntax,
    ) -> Result<Self> {
        match syntax {
            MemberSyntax::Dn => Self::dn(attribute, value),
            MemberSyntax::Uid => Ok(Self::uid(attribute, value)),
        }
    }

    /// Value to look up in the directory (DN without unique id, or uid)
    pub fn lookup_value(&self) -> &str {
        match self.syntax {
            MemberSyntax::Dn => strip_unique_id(&self.value),
            MemberSyntax::Uid => self.value.trim(),
        }
    }
}

/// Outcome of evaluating a member reference
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum MemberStatus {
    /// Entry exists and is active
    Valid,
    /// Listed as protected, never removed
    Protected,
    /// Entry does not exist
    Missing,
    /// Entry exists but is disabled or locked
    Disabled { reason: String },
    /// Account expiry lies in the past
    Expired { at: DateTime<Utc> },
    /// Entry lies outside the managed subtrees
    OutOfScope,
}

impl MemberStatus {
    /// Short label for reports
    pub fn label(&self) -> &'static str {
        match self {
            MemberStatus::Valid => "valid",
            MemberStatus::Protected => "protected",
            MemberStatus::Missing => "missing",
            MemberStatus::Disabled { .. } => "disabled",
            MemberStatus::Expired { .. } => "expired",
            MemberStatus::OutOfScope => "out-of-scope",
        }
    }
}

impl fmt::Display for MemberStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MemberStatus::Disabled { reason } => write!(f, "disabled ({})", reason),
            MemberStatus::Expired { at } => write!(f, "expired ({})", at.format("%Y-%m-%d")),
            other => f.write_str(other.label()),
        }
    }
}

/// A member reference together with its evaluated status
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluatedMember {
    #[serde(flatten)]
    pub member: MemberRef,
    pub status: MemberStatus,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_dn_member_key() {
        let m = MemberRef::dn("uniqueMember", "UID=Alice, OU=People,DC=example#'01'B").unwrap();
        assert_eq!(m.key, "uid=alice,ou=people,dc=example");
        assert_eq!(m.lookup_value(), "UID=Alice, OU=People,DC=example");
        assert_eq!(m.value, "UID=Alice, OU=People,DC=example#'01'B");
    }

    #[test]
    fn test_unique_id_suffix_kept_in_identity() {
        let first = MemberRef::dn("uniqueMember", "uid=gone,dc=example#'01'B").unwrap();
        let second = MemberRef::dn("uniqueMember", "UID=Gone, dc=example#'10'B").unwrap();
        let plain = MemberRef::dn("uniqueMember", "uid=gone,dc=example").unwrap();

        assert_eq!(first.key, second.key);
        assert_eq!(first.key, plain.key);
        assert_eq!(first.identity, "uid=gone,dc=example#'01'b");
        assert_ne!(first.identity, second.identity);
        assert_eq!(plain.identity, plain.key);
    }

    #[test]
    fn test_uid_member_key() {
        let m = MemberRef::uid("memberUid", "alice");
        assert_eq!(m.key, "uid:alice");
        assert_eq!(m.syntax, MemberSyntax::Uid);
    }

    #[test]
    fn test_invalid_dn_member() {
        assert!(MemberRef::new("member", "alice", MemberSyntax::Dn).is_err());
        assert!(MemberRef::new("memberUid", "alice", MemberSyntax::Uid).is_ok());
    }

    #[test]
    fn test_status_display() {
        assert_eq!(MemberStatus::Missing.to_string(), "missing");
        assert_eq!(
            MemberStatus::Disabled { reason: "nsAccountLock".into() }.to_string(),
            "disabled (nsAccountLock)"
        );
        let at = Utc.with_ymd_and_hms(2021, 3, 4, 0, 0, 0).unwrap();
        assert_eq!(MemberStatus::Expired { at }.to_string(), "expired (2021-03-04)");
    }
}
