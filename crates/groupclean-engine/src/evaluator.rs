//! Staleness evaluator
//!
//! Decides for every unique member reference whether it still points to a
//! valid, active entry. Each reference is resolved once per run, however
//! many groups contain it, and lookups run with bounded concurrency.

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt, TryStreamExt};
use groupclean_core::config::{CleanupConfig, MembersConfig};
use groupclean_core::types::{DirectoryEntry, Group, MemberRef, MemberStatus, MemberSyntax};
use groupclean_core::utils::time::{filetime_to_datetime, shadow_expire_to_datetime};
use groupclean_core::utils::{
    escape_filter_value, is_within, normalize_dn, parenthesize_filter, split_rdns,
};
use groupclean_core::{Directory, Result, SearchScope};
use std::collections::{HashMap, HashSet};
use tracing::{debug, warn};

/// Attributes read from member entries
const STATUS_ATTRIBUTES: &[&str] = &[
    "objectClass",
    "userAccountControl",
    "accountExpires",
    "shadowExpire",
    "nsAccountLock",
    "pwdAccountLockedTime",
];

/// userAccountControl ACCOUNTDISABLE flag
const UAC_ACCOUNT_DISABLE: i64 = 0x2;

/// pwdAccountLockedTime value for an administratively locked account
const PPOLICY_PERMANENT_LOCK: &str = "000001010000Z";

pub struct Evaluator<'a, D: Directory + ?Sized> {
    directory: &'a D,
    config: &'a MembersConfig,
    /// Normalized subtrees members may live in, empty disables the check
    scope_bases: Vec<String>,
    /// Raw bases used to resolve uid members
    uid_bases: Vec<String>,
    protected: HashSet<String>,
    concurrency: usize,
    now: DateTime<Utc>,
}

impl<'a, D: Directory + ?Sized> Evaluator<'a, D> {
    pub fn new(directory: &'a D, config: &'a CleanupConfig) -> Result<Self> {
        let members = &config.members;

        let mut scope_bases = Vec::new();
        if !members.base_dns.is_empty() {
            for base in &members.base_dns {
                scope_bases.push(normalize_dn(base)?);
            }
            scope_bases.push(normalize_dn(&config.groups.base_dn)?);
        }

        let uid_bases = if members.base_dns.is_empty() {
            vec![directory_suffix(&config.groups.base_dn)]
        } else {
            members.base_dns.clone()
        };

        let protected = members
            .protected
            .iter()
            .map(|dn| normalize_dn(dn))
            .collect::<Result<HashSet<_>>>()?;

        Ok(Self {
            directory,
            config: members,
            scope_bases,
            uid_bases,
            protected,
            concurrency: config.cleanup.concurrency.max(1),
            now: Utc::now(),
        })
    }

    /// Evaluate against a fixed clock instead of the current time
    pub fn with_clock(mut self, now: DateTime<Utc>) -> Self {
        self.now = now;
        self
    }

    /// Evaluate every member of the given groups, keyed by member key
    ///
    /// A failed lookup fails the whole evaluation.
    pub async fn evaluate(&self, groups: &[Group]) -> Result<HashMap<String, MemberStatus>> {
        let mut unique: HashMap<&str, &MemberRef> = HashMap::new();
        for member in groups.iter().flat_map(|g| g.members.iter()) {
            unique.entry(member.key.as_str()).or_insert(member);
        }

        debug!(unique = unique.len(), "Evaluating members");

        stream::iter(unique.into_values())
            .map(|member| async move {
                let status = self.evaluate_member(member).await?;
                debug!(member = %member.key, %status, "Evaluated member");
                Ok::<_, groupclean_core::Error>((member.key.clone(), status))
            })
            .buffer_unordered(self.concurrency)
            .try_collect()
            .await
    }

    /// Evaluate a single member reference
    pub async fn evaluate_member(&self, member: &MemberRef) -> Result<MemberStatus> {
        match member.syntax {
            MemberSyntax::Dn => self.evaluate_dn(member).await,
            MemberSyntax::Uid => self.evaluate_uid(member).await,
        }
    }

    async fn evaluate_dn(&self, member: &MemberRef) -> Result<MemberStatus> {
        if self.protected.contains(&member.key) {
            return Ok(MemberStatus::Protected);
        }

        if !self.is_in_scope(&member.key) {
            debug!(member = %member.key, "Out of scope, not looked up");
            return Ok(MemberStatus::OutOfScope);
        }

        match self
            .directory
            .lookup(member.lookup_value(), STATUS_ATTRIBUTES)
            .await?
        {
            Some(entry) => Ok(self.classify(&entry)),
            None => Ok(MemberStatus::Missing),
        }
    }

    async fn evaluate_uid(&self, member: &MemberRef) -> Result<MemberStatus> {
        let filter = format!(
            "(&{}({}={}))",
            parenthesize_filter(&self.config.filter),
            self.config.uid_attribute,
            escape_filter_value(member.lookup_value())
        );

        // Overlapping bases return the same entry more than once
        let mut seen = HashSet::new();
        let mut found = Vec::new();
        for base in &self.uid_bases {
            for entry in self
                .directory
                .search(base, SearchScope::Subtree, &filter, STATUS_ATTRIBUTES)
                .await?
            {
                let dn = normalize_dn(&entry.dn).unwrap_or_else(|_| entry.dn.to_lowercase());
                if seen.insert(dn) {
                    found.push(entry);
                }
            }
        }

        match found.len() {
            0 => Ok(MemberStatus::Missing),
            1 => {
                let entry = &found[0];
                if normalize_dn(&entry.dn)
                    .map(|dn| self.protected.contains(&dn))
                    .unwrap_or(false)
                {
                    return Ok(MemberStatus::Protected);
                }
                Ok(self.classify(entry))
            }
            n => {
                warn!(uid = %member.value, matches = n, "Ambiguous uid, keeping member");
                Ok(MemberStatus::Valid)
            }
        }
    }

    fn is_in_scope(&self, normalized_dn: &str) -> bool {
        self.scope_bases.is_empty()
            || self
                .scope_bases
                .iter()
                .any(|base| is_within(normalized_dn, base))
    }

    /// Judge an existing entry by its lock and expiry attributes
    fn classify(&self, entry: &DirectoryEntry) -> MemberStatus {
        if self.config.check_disabled {
            if let Some(reason) = disabled_reason(entry) {
                return MemberStatus::Disabled { reason };
            }
        }

        if self.config.check_expired {
            if let Some(at) = expiry(entry) {
                if at <= self.now {
                    return MemberStatus::Expired { at };
                }
            }
        }

        MemberStatus::Valid
    }
}

fn disabled_reason(entry: &DirectoryEntry) -> Option<String> {
    if let Some(raw) = entry.first("userAccountControl") {
        match raw.trim().parse::<i64>() {
            Ok(flags) if flags & UAC_ACCOUNT_DISABLE != 0 => {
                return Some("userAccountControl ACCOUNTDISABLE".to_string());
            }
            Ok(_) => {}
            Err(_) => warn!(dn = %entry.dn, "Unparsable userAccountControl '{}'", raw),
        }
    }

    if entry
        .first("nsAccountLock")
        .map(|v| v.trim().eq_ignore_ascii_case("true"))
        .unwrap_or(false)
    {
        return Some("nsAccountLock".to_string());
    }

    if entry.first("pwdAccountLockedTime") == Some(PPOLICY_PERMANENT_LOCK) {
        return Some("pwdAccountLockedTime".to_string());
    }

    None
}

/// Earliest expiry advertised by the entry
fn expiry(entry: &DirectoryEntry) -> Option<DateTime<Utc>> {
    let shadow = entry
        .first("shadowExpire")
        .and_then(|raw| parse_number(entry, "shadowExpire", raw))
        .and_then(shadow_expire_to_datetime);

    let account = entry
        .first("accountExpires")
        .and_then(|raw| parse_number(entry, "accountExpires", raw))
        .and_then(filetime_to_datetime);

    match (shadow, account) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, b) => a.or(b),
    }
}

fn parse_number(entry: &DirectoryEntry, attribute: &str, raw: &str) -> Option<i64> {
    match raw.trim().parse() {
        Ok(n) => Some(n),
        Err(_) => {
            warn!(dn = %entry.dn, attribute, "Ignoring unparsable value '{}'", raw);
            None
        }
    }
}

/// Trailing `dc=` components of a DN, or the DN itself when it has none
fn directory_suffix(dn: &str) -> String {
    let rdns = split_rdns(dn);
    let start = rdns
        .iter()
        .rposition(|rdn| !rdn.trim().to_ascii_lowercase().starts_with("dc="))
        .map(|i| i + 1)
        .unwrap_or(0);

    if start >= rdns.len() {
        return dn.to_string();
    }

    rdns[start..]
        .iter()
        .map(|rdn| rdn.trim())
        .collect::<Vec<_>>()
        .join(",")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryDirectory;
    use chrono::TimeZone;

    const PEOPLE: &str = "ou=people,dc=example,dc=com";

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    fn person(uid: &str) -> DirectoryEntry {
        DirectoryEntry::new(format!("uid={},{}", uid, PEOPLE))
            .with_attr("objectClass", ["inetOrgPerson", "shadowAccount"])
            .with_attr("uid", [uid])
    }

    fn directory() -> MemoryDirectory {
        MemoryDirectory::with_entries([
            DirectoryEntry::new("dc=example,dc=com"),
            DirectoryEntry::new(PEOPLE),
            person("alice"),
            person("bob").with_attr("shadowExpire", ["19000"]), // 2022-01-08
            person("carol").with_attr("shadowExpire", ["-1"]),
            person("dave").with_attr("nsAccountLock", ["TRUE"]),
            person("erin").with_attr("userAccountControl", ["514"]),
            person("frank").with_attr("pwdAccountLockedTime", ["000001010000Z"]),
            person("grace").with_attr("accountExpires", ["9223372036854775807"]),
            person("heidi").with_attr("accountExpires", ["132223104000000000"]), // 2020-01-01
            person("ivan").with_attr("shadowExpire", ["30000"]),
        ])
        .unwrap()
    }

    fn config() -> CleanupConfig {
        let mut config = CleanupConfig::default();
        config.groups.base_dn = "ou=groups,dc=example,dc=com".to_string();
        config.members.base_dns = vec![PEOPLE.to_string()];
        config
    }

    fn dn_member(uid: &str) -> MemberRef {
        MemberRef::dn("member", format!("uid={},{}", uid, PEOPLE)).unwrap()
    }

    async fn status_of(config: &CleanupConfig, member: MemberRef) -> MemberStatus {
        let directory = directory();
        Evaluator::new(&directory, config)
            .unwrap()
            .with_clock(now())
            .evaluate_member(&member)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_member_statuses() {
        let config = config();

        assert_eq!(status_of(&config, dn_member("alice")).await, MemberStatus::Valid);
        assert_eq!(status_of(&config, dn_member("zoe")).await, MemberStatus::Missing);
        assert_eq!(status_of(&config, dn_member("carol")).await, MemberStatus::Valid);
        assert_eq!(status_of(&config, dn_member("grace")).await, MemberStatus::Valid);
        assert_eq!(status_of(&config, dn_member("ivan")).await, MemberStatus::Valid);

        assert!(matches!(
            status_of(&config, dn_member("bob")).await,
            MemberStatus::Expired { .. }
        ));
        assert_eq!(
            status_of(&config, dn_member("heidi")).await,
            MemberStatus::Expired {
                at: Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap()
            }
        );
        assert_eq!(
            status_of(&config, dn_member("dave")).await,
            MemberStatus::Disabled { reason: "nsAccountLock".into() }
        );
        assert!(matches!(
            status_of(&config, dn_member("erin")).await,
            MemberStatus::Disabled { .. }
        ));
        assert!(matches!(
            status_of(&config, dn_member("frank")).await,
            MemberStatus::Disabled { .. }
        ));
    }

    #[tokio::test]
    async fn test_checks_can_be_disabled() {
        let mut config = config();
        config.members.check_disabled = false;
        config.members.check_expired = false;

        assert_eq!(status_of(&config, dn_member("dave")).await, MemberStatus::Valid);
        assert_eq!(status_of(&config, dn_member("bob")).await, MemberStatus::Valid);
    }

    #[tokio::test]
    async fn test_protected_wins() {
        let mut config = config();
        config.members.protected = vec![format!("UID=Zoe,{}", PEOPLE)];
        assert_eq!(status_of(&config, dn_member("zoe")).await, MemberStatus::Protected);

        config.members.protected = vec![format!("uid=alice,{}", PEOPLE)];
        let alice = MemberRef::uid("memberUid", "alice");
        assert_eq!(status_of(&config, alice).await, MemberStatus::Protected);
    }

    #[tokio::test]
    async fn test_out_of_scope_is_not_looked_up() {
        let directory = directory();
        let config = config();
        let evaluator = Evaluator::new(&directory, &config).unwrap();

        let member = MemberRef::dn("member", "uid=x,ou=partners,dc=example,dc=com").unwrap();
        assert_eq!(
            evaluator.evaluate_member(&member).await.unwrap(),
            MemberStatus::OutOfScope
        );
        assert_eq!(directory.lookup_count(), 0);

        // nested groups below the group base are in scope
        let nested = MemberRef::dn("member", "cn=nested,ou=groups,dc=example,dc=com").unwrap();
        assert_eq!(
            evaluator.evaluate_member(&nested).await.unwrap(),
            MemberStatus::Missing
        );
    }

    #[tokio::test]
    async fn test_uid_members() {
        let config = config();
        assert_eq!(
            status_of(&config, MemberRef::uid("memberUid", "alice")).await,
            MemberStatus::Valid
        );
        assert_eq!(
            status_of(&config, MemberRef::uid("memberUid", "nobody")).await,
            MemberStatus::Missing
        );
        assert!(matches!(
            status_of(&config, MemberRef::uid("memberUid", "dave")).await,
            MemberStatus::Disabled { .. }
        ));
        // filter metacharacters are escaped
        assert_eq!(
            status_of(&config, MemberRef::uid("memberUid", "*")).await,
            MemberStatus::Missing
        );
    }

    #[tokio::test]
    async fn test_ambiguous_uid_is_kept() {
        let directory = directory();
        directory
            .insert(
                DirectoryEntry::new("uid=alice,ou=people2,dc=example,dc=com")
                    .with_attr("uid", ["alice"]),
            )
            .unwrap();

        let mut config = config();
        config.members.base_dns = vec![];
        let evaluator = Evaluator::new(&directory, &config).unwrap();

        let status = evaluator
            .evaluate_member(&MemberRef::uid("memberUid", "alice"))
            .await
            .unwrap();
        assert_eq!(status, MemberStatus::Valid);
    }

    #[tokio::test]
    async fn test_uid_found_under_overlapping_bases() {
        let mut config = config();
        config.members.base_dns = vec!["dc=example,dc=com".to_string(), PEOPLE.to_string()];

        assert_eq!(
            status_of(&config, MemberRef::uid("memberUid", "dave")).await,
            MemberStatus::Disabled { reason: "nsAccountLock".into() }
        );
        assert!(matches!(
            status_of(&config, MemberRef::uid("memberUid", "bob")).await,
            MemberStatus::Expired { .. }
        ));
    }

    #[tokio::test]
    async fn test_each_member_looked_up_once() {
        let directory = directory();
        let config = config();

        let mut first = Group::new("cn=a,ou=groups,dc=example,dc=com", "cn=a");
        first.push_member(dn_member("alice"));
        first.push_member(dn_member("zoe"));
        let mut second = Group::new("cn=b,ou=groups,dc=example,dc=com", "cn=b");
        second.push_member(MemberRef::dn("uniqueMember", format!("UID=Alice,{}", PEOPLE)).unwrap());
        second.push_member(dn_member("zoe"));

        let statuses = Evaluator::new(&directory, &config)
            .unwrap()
            .evaluate(&[first, second])
            .await
            .unwrap();

        assert_eq!(statuses.len(), 2);
        assert_eq!(directory.lookup_count(), 2);
        assert_eq!(
            statuses.get(&format!("uid=zoe,{}", PEOPLE)),
            Some(&MemberStatus::Missing)
        );
    }

    #[tokio::test]
    async fn test_lookup_failure_aborts() {
        let directory = directory();
        directory.fail_lookup(&format!("uid=alice,{}", PEOPLE)).unwrap();
        let config = config();

        let mut group = Group::new("cn=a,ou=groups,dc=example,dc=com", "cn=a");
        group.push_member(dn_member("alice"));

        let result = Evaluator::new(&directory, &config)
            .unwrap()
            .evaluate(&[group])
            .await;
        assert!(result.is_err());
    }

    #[test]
    fn test_directory_suffix() {
        assert_eq!(directory_suffix("ou=groups,dc=example,dc=com"), "dc=example,dc=com");
        assert_eq!(directory_suffix("ou=groups, DC=Example"), "DC=Example");
        assert_eq!(directory_suffix("ou=groups,o=corp"), "ou=groups,o=corp");
    }
}
