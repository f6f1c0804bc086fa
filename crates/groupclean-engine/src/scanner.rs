//! Membership scanner
//!
//! Reads group entries below the group base DN and turns their member
//! attributes into ordered, duplicate-free member references.

use glob::{MatchOptions, Pattern};
use groupclean_core::config::GroupsConfig;
use groupclean_core::types::{DirectoryEntry, Group, MemberRef};
use groupclean_core::utils::{first_rdn_value, normalize_dn};
use groupclean_core::{Directory, Error, Result, SearchScope};
use tracing::{debug, info, warn};

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: false,
    require_literal_separator: false,
    require_literal_leading_dot: false,
};

pub struct Scanner<'a, D: Directory + ?Sized> {
    directory: &'a D,
    config: &'a GroupsConfig,
    include: Vec<Pattern>,
    exclude: Vec<Pattern>,
}

impl<'a, D: Directory + ?Sized> Scanner<'a, D> {
    pub fn new(directory: &'a D, config: &'a GroupsConfig) -> Result<Self> {
        Ok(Self {
            directory,
            config,
            include: compile_patterns(&config.include)?,
            exclude: compile_patterns(&config.exclude)?,
        })
    }

    /// Search all selected groups, ordered by normalized DN
    pub async fn scan(&self) -> Result<Vec<Group>> {
        let mut attrs = vec!["objectClass", "cn"];
        attrs.extend(self.config.member_attributes.iter().map(|a| a.name.as_str()));

        let entries = self
            .directory
            .search(&self.config.base_dn, SearchScope::Subtree, &self.config.filter, &attrs)
            .await?;

        let total = entries.len();
        let mut groups = Vec::with_capacity(total);
        for entry in entries {
            let group = match self.build_group(entry) {
                Some(group) => group,
                None => continue,
            };
            if !self.is_selected(&group) {
                debug!(group = %group.dn, "Group not selected");
                continue;
            }
            groups.push(group);
        }

        groups.sort_by(|a, b| a.normalized_dn.cmp(&b.normalized_dn));

        info!(
            base = %self.config.base_dn,
            found = total,
            selected = groups.len(),
            "Scanned groups"
        );
        Ok(groups)
    }

    fn build_group(&self, entry: DirectoryEntry) -> Option<Group> {
        let normalized = match normalize_dn(&entry.dn) {
            Ok(dn) => dn,
            Err(e) => {
                warn!(dn = %entry.dn, "Skipping group with unparsable DN: {}", e);
                return None;
            }
        };

        let mut group = Group::new(entry.dn.clone(), normalized);
        group.name = entry
            .first("cn")
            .or_else(|| first_rdn_value(&entry.dn))
            .map(str::to_string);
        group.object_classes = entry.values("objectClass").to_vec();

        for attribute in &self.config.member_attributes {
            for value in entry.values(&attribute.name) {
                match MemberRef::new(attribute.name.as_str(), value.as_str(), attribute.syntax) {
                    Ok(member) => {
                        if !group.push_member(member) {
                            debug!(group = %group.dn, value = %value, "Duplicate member value");
                        }
                    }
                    Err(e) => {
                        warn!(
                            group = %group.dn,
                            attribute = %attribute.name,
                            "Ignoring member value '{}': {}",
                            value,
                            e
                        );
                    }
                }
            }
        }

        Some(group)
    }

    fn is_selected(&self, group: &Group) -> bool {
        let name = group.display_name();

        if self.exclude.iter().any(|p| p.matches_with(name, MATCH_OPTIONS)) {
            return false;
        }

        self.include.is_empty() || self.include.iter().any(|p| p.matches_with(name, MATCH_OPTIONS))
    }
}

fn compile_patterns(patterns: &[String]) -> Result<Vec<Pattern>> {
    patterns
        .iter()
        .map(|p| {
            Pattern::new(p).map_err(|e| Error::Config(format!("Invalid group pattern '{}': {}", p, e)))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryDirectory;
    use groupclean_core::config::MemberAttribute;
    use groupclean_core::types::MemberSyntax;

    fn directory() -> MemoryDirectory {
        MemoryDirectory::with_entries([
            DirectoryEntry::new("ou=groups,dc=example"),
            DirectoryEntry::new("cn=devs,ou=groups,dc=example")
                .with_attr("objectClass", ["groupOfNames"])
                .with_attr("cn", ["devs"])
                .with_attr(
                    "member",
                    [
                        "uid=bob,ou=people,dc=example",
                        "uid=alice,ou=people,dc=example",
                        "UID=Bob, ou=people,dc=example",
                    ],
                ),
            DirectoryEntry::new("cn=admins,ou=groups,dc=example")
                .with_attr("objectClass", ["posixGroup"])
                .with_attr("cn", ["admins"])
                .with_attr("memberUid", ["alice", "carol"]),
            DirectoryEntry::new("cn=broken,ou=groups,dc=example")
                .with_attr("objectClass", ["groupOfUniqueNames"])
                .with_attr("uniqueMember", ["not-a-dn", "uid=dave,ou=people,dc=example#'01'B"]),
            DirectoryEntry::new("uid=alice,ou=people,dc=example")
                .with_attr("objectClass", ["inetOrgPerson"]),
        ])
        .unwrap()
    }

    fn config() -> GroupsConfig {
        GroupsConfig {
            base_dn: "ou=groups,dc=example".to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_scan_builds_groups() {
        let directory = directory();
        let config = config();
        let groups = Scanner::new(&directory, &config).unwrap().scan().await.unwrap();

        let names: Vec<_> = groups.iter().map(|g| g.display_name()).collect();
        assert_eq!(names, vec!["admins", "broken", "devs"]);

        let devs = &groups[2];
        assert_eq!(devs.members.len(), 2);
        assert_eq!(devs.members[0].value, "uid=bob,ou=people,dc=example");
        assert_eq!(devs.members[1].value, "uid=alice,ou=people,dc=example");

        let admins = &groups[0];
        assert_eq!(admins.members.len(), 2);
        assert!(admins.members.iter().all(|m| m.syntax == MemberSyntax::Uid));
    }

    #[tokio::test]
    async fn test_scan_skips_invalid_member_values() {
        let directory = directory();
        let config = config();
        let groups = Scanner::new(&directory, &config).unwrap().scan().await.unwrap();

        let broken = groups.iter().find(|g| g.display_name() == "broken").unwrap();
        assert_eq!(broken.members.len(), 1);
        assert_eq!(broken.members[0].key, "uid=dave,ou=people,dc=example");
        // name falls back to the RDN value when cn is absent
        assert_eq!(broken.name.as_deref(), Some("broken"));
    }

    #[tokio::test]
    async fn test_unique_id_variants_are_separate_members() {
        let directory = MemoryDirectory::with_entries([
            DirectoryEntry::new("ou=groups,dc=example"),
            DirectoryEntry::new("cn=team,ou=groups,dc=example")
                .with_attr("objectClass", ["groupOfUniqueNames"])
                .with_attr(
                    "uniqueMember",
                    [
                        "uid=gone,ou=people,dc=example#'01'B",
                        "uid=gone,ou=people,dc=example#'10'B",
                    ],
                ),
        ])
        .unwrap();
        let config = config();

        let groups = Scanner::new(&directory, &config).unwrap().scan().await.unwrap();
        let team = &groups[0];
        assert_eq!(team.members.len(), 2);
        assert_eq!(team.members[0].key, team.members[1].key);
        assert_eq!(team.members[1].value, "uid=gone,ou=people,dc=example#'10'B");
    }

    #[tokio::test]
    async fn test_include_exclude_patterns() {
        let directory = directory();
        let mut config = config();
        config.include = vec!["*S".to_string()];
        config.exclude = vec!["adm*".to_string()];

        let groups = Scanner::new(&directory, &config).unwrap().scan().await.unwrap();
        let names: Vec<_> = groups.iter().map(|g| g.display_name()).collect();
        assert_eq!(names, vec!["devs"]);
    }

    #[tokio::test]
    async fn test_configured_member_attributes_only() {
        let directory = directory();
        let mut config = config();
        config.member_attributes = vec![MemberAttribute::dn("member")];

        let groups = Scanner::new(&directory, &config).unwrap().scan().await.unwrap();
        let admins = groups.iter().find(|g| g.display_name() == "admins").unwrap();
        assert!(admins.members.is_empty());
    }

    #[test]
    fn test_invalid_pattern() {
        let directory = MemoryDirectory::new();
        let mut config = config();
        config.exclude = vec!["[".to_string()];
        assert!(matches!(
            Scanner::new(&directory, &config),
            Err(Error::Config(_))
        ));
    }
}
