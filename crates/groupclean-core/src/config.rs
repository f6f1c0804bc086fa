//! Configuration for px-ldap-group-cleanup
//!
//! Example config:
//! ```toml
//! [connection]
//! url = "ldaps://ldap.example.com:636"
//! bind_dn = "cn=cleanup,ou=services,dc=example,dc=com"
//! bind_password_file = "/etc/px-ldap-group-cleanup/password"
//!
//! [groups]
//! base_dn = "ou=groups,dc=example,dc=com"
//! exclude = ["admins", "sudo-*"]
//!
//! [members]
//! base_dns = ["ou=people,dc=example,dc=com"]
//! protected = ["cn=placeholder,dc=example,dc=com"]
//!
//! [cleanup]
//! max_removals = 100
//! ```

use crate::types::{MemberStatus, MemberSyntax};
use crate::utils::{mask_secret, normalize_dn};
use crate::{Error, Result, ENV_PREFIX};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CleanupConfig {
    #[serde(default)]
    pub connection: ConnectionConfig,

    #[serde(default)]
    pub groups: GroupsConfig,

    #[serde(default)]
    pub members: MembersConfig,

    #[serde(default)]
    pub cleanup: CleanupSection,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl CleanupConfig {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Failed to read config {}: {}", path.display(), e))
        })?;

        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(format!("Failed to parse config: {}", e)))
    }

    /// Apply `GROUPCLEAN_*` environment overrides
    pub fn apply_env(&mut self) {
        if let Some(url) = env_var("URL") {
            self.connection.url = url;
        }
        if let Some(bind_dn) = env_var("BIND_DN") {
            self.connection.bind_dn = bind_dn;
        }
        if let Some(password) = env_var("BIND_PASSWORD") {
            self.connection.bind_password = password;
        }
        if let Some(base) = env_var("GROUP_BASE_DN") {
            self.groups.base_dn = base;
        }
        if let Some(level) = env_var("LOG_LEVEL") {
            self.logging.level = level;
        }
        if env_var("START_TLS").map(|v| v == "true").unwrap_or(false) {
            self.connection.start_tls = true;
        }
    }

    /// Resolve `bind_password_file` into `bind_password`
    pub fn resolve_secrets(&mut self) -> Result<()> {
        if let Some(path) = &self.connection.bind_password_file {
            if self.connection.bind_password.is_empty() {
                let secret = std::fs::read_to_string(path).map_err(|e| {
                    Error::Config(format!(
                        "Failed to read bind password file {}: {}",
                        path.display(),
                        e
                    ))
                })?;
                self.connection.bind_password = secret.trim_end_matches(['\r', '\n']).to_string();
            }
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        self.connection.validate()?;

        if self.groups.base_dn.trim().is_empty() {
            return Err(Error::Config("groups.base_dn is required".into()));
        }
        normalize_dn(&self.groups.base_dn)?;

        if self.groups.member_attributes.is_empty() {
            return Err(Error::Config(
                "groups.member_attributes must not be empty".into(),
            ));
        }

        for dn in self.members.base_dns.iter().chain(&self.members.protected) {
            normalize_dn(dn)?;
        }

        if self.members.uid_attribute.trim().is_empty() {
            return Err(Error::Config("members.uid_attribute is required".into()));
        }

        if self.cleanup.concurrency == 0 {
            return Err(Error::Config("cleanup.concurrency must be at least 1".into()));
        }

        Ok(())
    }

    /// Create configuration from server type with sensible defaults
    pub fn from_server_type(server_type: ServerType, url: &str) -> Self {
        let mut config = Self::default();
        config.connection.url = url.to_string();
        config.connection.server_type = server_type;
        config.groups.member_attributes = server_type.default_member_attributes();
        config.members.uid_attribute = server_type.default_uid_attribute().to_string();

        if server_type == ServerType::ActiveDirectory {
            config.groups.filter = "(objectClass=group)".to_string();
            config.members.filter = "(objectClass=user)".to_string();
        }

        config
    }

    /// Copy suitable for display, with the bind password masked
    pub fn redacted(&self) -> Self {
        let mut config = self.clone();
        config.connection.bind_password = mask_secret(&config.connection.bind_password);
        config
    }

    /// Serialize as TOML
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))
    }
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(format!("{}{}", ENV_PREFIX, name)).ok()
}

// ============================================================================
// Connection
// ============================================================================

/// LDAP server connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Server URL (ldap:// or ldaps://)
    pub url: String,

    /// Upgrade the connection with STARTTLS
    #[serde(default)]
    pub start_tls: bool,

    /// Skip TLS certificate verification (not recommended for production)
    #[serde(default)]
    pub skip_tls_verify: bool,

    /// Service account DN, anonymous bind when empty
    #[serde(default)]
    pub bind_dn: String,

    #[serde(default)]
    pub bind_password: String,

    /// File holding the bind password
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bind_password_file: Option<PathBuf>,

    /// Connect and operation timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,

    /// Page size for paged searches
    #[serde(default = "default_page_size")]
    pub page_size: i32,

    /// Server type hint
    #[serde(default)]
    pub server_type: ServerType,
}

fn default_timeout() -> u64 {
    10
}

fn default_page_size() -> i32 {
    500
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            url: "ldap://localhost:389".to_string(),
            start_tls: false,
            skip_tls_verify: false,
            bind_dn: String::new(),
            bind_password: String::new(),
            bind_password_file: None,
            timeout_seconds: default_timeout(),
            page_size: default_page_size(),
            server_type: ServerType::default(),
        }
    }
}

impl ConnectionConfig {
    pub fn validate(&self) -> Result<()> {
        if self.url.is_empty() {
            return Err(Error::Config("Server URL is required".into()));
        }

        if !self.url.starts_with("ldap://") && !self.url.starts_with("ldaps://") {
            return Err(Error::Config(
                "Server URL must start with ldap:// or ldaps://".into(),
            ));
        }

        if self.start_tls && self.url.starts_with("ldaps://") {
            return Err(Error::Config(
                "STARTTLS cannot be combined with an ldaps:// URL".into(),
            ));
        }

        if !self.bind_dn.is_empty() {
            normalize_dn(&self.bind_dn)?;
        }

        if self.page_size <= 0 {
            return Err(Error::Config("page_size must be positive".into()));
        }

        Ok(())
    }
}

/// LDAP server type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ServerType {
    /// Generic LDAP server
    #[default]
    Ldap,
    /// Microsoft Active Directory
    ActiveDirectory,
    /// OpenLDAP
    OpenLdap,
    /// 389 Directory Server
    Directory389,
}

impl ServerType {
    /// Default member attributes for this server type
    pub fn default_member_attributes(&self) -> Vec<MemberAttribute> {
        match self {
            ServerType::ActiveDirectory => vec![MemberAttribute::dn("member")],
            _ => default_member_attributes(),
        }
    }

    /// Default uid attribute for memberUid resolution
    pub fn default_uid_attribute(&self) -> &'static str {
        match self {
            ServerType::ActiveDirectory => "sAMAccountName",
            _ => "uid",
        }
    }
}

// ============================================================================
// Groups
// ============================================================================

/// Member attribute and its value syntax
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberAttribute {
    pub name: String,
    pub syntax: MemberSyntax,
}

impl MemberAttribute {
    pub fn dn(name: &str) -> Self {
        Self {
            name: name.to_string(),
            syntax: MemberSyntax::Dn,
        }
    }

    pub fn uid(name: &str) -> Self {
        Self {
            name: name.to_string(),
            syntax: MemberSyntax::Uid,
        }
    }
}

fn default_member_attributes() -> Vec<MemberAttribute> {
    vec![
        MemberAttribute::dn("member"),
        MemberAttribute::dn("uniqueMember"),
        MemberAttribute::uid("memberUid"),
    ]
}

fn default_group_filter() -> String {
    "(|(objectClass=groupOfNames)(objectClass=groupOfUniqueNames)(objectClass=posixGroup)(objectClass=group))"
        .to_string()
}

/// Which groups to scan
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupsConfig {
    /// Base DN for group searches
    /// Example: "ou=groups,dc=example,dc=com"
    #[serde(default)]
    pub base_dn: String,

    /// Group search filter
    #[serde(default = "default_group_filter")]
    pub filter: String,

    /// Glob patterns on the group name, all groups when empty
    #[serde(default)]
    pub include: Vec<String>,

    /// Glob patterns on the group name, checked before include
    #[serde(default)]
    pub exclude: Vec<String>,

    /// Attributes holding member references
    #[serde(default = "default_member_attributes")]
    pub member_attributes: Vec<MemberAttribute>,
}

impl Default for GroupsConfig {
    fn default() -> Self {
        Self {
            base_dn: String::new(),
            filter: default_group_filter(),
            include: Vec::new(),
            exclude: Vec::new(),
            member_attributes: default_member_attributes(),
        }
    }
}

// ============================================================================
// Members
// ============================================================================

/// What to do with members outside the managed subtrees
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OutOfScopePolicy {
    /// Leave them in place without looking them up
    #[default]
    Keep,
    /// Treat them as stale
    Remove,
}

fn default_uid_attribute() -> String {
    "uid".to_string()
}

fn default_member_filter() -> String {
    "(objectClass=*)".to_string()
}

fn default_true() -> bool {
    true
}

/// How members are resolved and judged
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MembersConfig {
    /// Subtrees that hold managed members, no scope check when empty
    #[serde(default)]
    pub base_dns: Vec<String>,

    /// Attribute matched against memberUid values
    #[serde(default = "default_uid_attribute")]
    pub uid_attribute: String,

    /// Extra filter for memberUid resolution
    #[serde(default = "default_member_filter")]
    pub filter: String,

    /// Member DNs that are never removed
    #[serde(default)]
    pub protected: Vec<String>,

    #[serde(default)]
    pub out_of_scope: OutOfScopePolicy,

    /// Treat disabled or locked accounts as stale
    #[serde(default = "default_true")]
    pub check_disabled: bool,

    /// Treat expired accounts as stale
    #[serde(default = "default_true")]
    pub check_expired: bool,
}

impl Default for MembersConfig {
    fn default() -> Self {
        Self {
            base_dns: Vec::new(),
            uid_attribute: default_uid_attribute(),
            filter: default_member_filter(),
            protected: Vec::new(),
            out_of_scope: OutOfScopePolicy::default(),
            check_disabled: true,
            check_expired: true,
        }
    }
}

impl MembersConfig {
    /// Decide whether an evaluated status makes a member removable
    pub fn is_stale(&self, status: &MemberStatus) -> bool {
        match status {
            MemberStatus::Valid | MemberStatus::Protected => false,
            MemberStatus::Missing => true,
            MemberStatus::Disabled { .. } => self.check_disabled,
            MemberStatus::Expired { .. } => self.check_expired,
            MemberStatus::OutOfScope => self.out_of_scope == OutOfScopePolicy::Remove,
        }
    }
}

// ============================================================================
// Cleanup
// ============================================================================

/// What to do when cleanup would leave a group without members
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum EmptyGroupPolicy {
    /// Keep the first stale member in groups that require one
    #[default]
    KeepOne,
    /// Leave such groups untouched
    Skip,
    /// Remove every stale member
    Allow,
}

fn default_concurrency() -> usize {
    8
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CleanupSection {
    /// Only report, never modify
    #[serde(default)]
    pub dry_run: bool,

    /// Abort when more removals are planned, unless forced
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_removals: Option<usize>,

    #[serde(default)]
    pub empty_group: EmptyGroupPolicy,

    /// Parallel member lookups
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

impl Default for CleanupSection {
    fn default() -> Self {
        Self {
            dry_run: false,
            max_removals: None,
            empty_group: EmptyGroupPolicy::default(),
            concurrency: default_concurrency(),
        }
    }
}

// ============================================================================
// Logging
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub format: LogFormat,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn valid_config() -> CleanupConfig {
        let mut config = CleanupConfig::default();
        config.groups.base_dn = "ou=groups,dc=example,dc=com".to_string();
        config
    }

    #[test]
    fn test_defaults() {
        let config = CleanupConfig::default();
        assert_eq!(config.connection.url, "ldap://localhost:389");
        assert_eq!(config.connection.page_size, 500);
        assert_eq!(config.groups.member_attributes.len(), 3);
        assert_eq!(config.members.uid_attribute, "uid");
        assert_eq!(config.cleanup.empty_group, EmptyGroupPolicy::KeepOne);
        assert_eq!(config.cleanup.concurrency, 8);
        assert!(!config.cleanup.dry_run);
    }

    #[test]
    fn test_parse_toml() {
        let config = CleanupConfig::from_toml(
            r#"
            [connection]
            url = "ldaps://ldap.example.com:636"
            bind_dn = "cn=cleanup,dc=example,dc=com"
            bind_password = "secret"

            [groups]
            base_dn = "ou=groups,dc=example,dc=com"
            exclude = ["admins"]
            member_attributes = [{ name = "member", syntax = "dn" }]

            [members]
            base_dns = ["ou=people,dc=example,dc=com"]
            out_of_scope = "remove"

            [cleanup]
            max_removals = 50
            empty_group = "skip"
            "#,
        )
        .unwrap();

        assert_eq!(config.connection.url, "ldaps://ldap.example.com:636");
        assert_eq!(config.connection.timeout_seconds, 10);
        assert_eq!(config.groups.exclude, vec!["admins"]);
        assert_eq!(config.groups.member_attributes, vec![MemberAttribute::dn("member")]);
        assert_eq!(config.members.out_of_scope, OutOfScopePolicy::Remove);
        assert_eq!(config.cleanup.max_removals, Some(50));
        assert_eq!(config.cleanup.empty_group, EmptyGroupPolicy::Skip);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[groups]\nbase_dn = \"ou=groups,dc=example\"").unwrap();

        let config = CleanupConfig::from_file(file.path()).unwrap();
        assert_eq!(config.groups.base_dn, "ou=groups,dc=example");

        let missing = CleanupConfig::from_file("/nonexistent/config.toml");
        assert!(matches!(missing, Err(Error::Config(_))));
    }

    #[test]
    fn test_bind_password_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "s3cret").unwrap();

        let mut config = valid_config();
        config.connection.bind_password_file = Some(file.path().to_path_buf());
        config.resolve_secrets().unwrap();
        assert_eq!(config.connection.bind_password, "s3cret");
    }

    #[test]
    fn test_validation() {
        let mut config = CleanupConfig::default();
        // Missing group base DN
        assert!(config.validate().is_err());

        config = valid_config();
        assert!(config.validate().is_ok());

        config.connection.url = "http://ldap.example.com".to_string();
        assert!(config.validate().is_err());

        config = valid_config();
        config.connection.url = "ldaps://ldap.example.com".to_string();
        config.connection.start_tls = true;
        assert!(config.validate().is_err());

        config = valid_config();
        config.members.protected = vec!["not-a-dn".to_string()];
        assert!(matches!(config.validate(), Err(Error::InvalidDn(_))));

        config = valid_config();
        config.cleanup.concurrency = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_redacted() {
        let mut config = valid_config();
        config.connection.bind_password = "secret".to_string();

        let shown = config.redacted().to_toml().unwrap();
        assert!(!shown.contains("secret"));
        assert!(shown.contains("***"));
    }

    #[test]
    fn test_is_stale() {
        let mut members = MembersConfig::default();
        let disabled = MemberStatus::Disabled { reason: "x".into() };

        assert!(members.is_stale(&MemberStatus::Missing));
        assert!(members.is_stale(&disabled));
        assert!(!members.is_stale(&MemberStatus::Valid));
        assert!(!members.is_stale(&MemberStatus::Protected));
        assert!(!members.is_stale(&MemberStatus::OutOfScope));

        members.check_disabled = false;
        members.out_of_scope = OutOfScopePolicy::Remove;
        assert!(!members.is_stale(&disabled));
        assert!(members.is_stale(&MemberStatus::OutOfScope));
    }

    #[test]
    fn test_from_server_type() {
        let config = CleanupConfig::from_server_type(
            ServerType::ActiveDirectory,
            "ldaps://dc.example.com:636",
        );
        assert_eq!(config.connection.url, "ldaps://dc.example.com:636");
        assert_eq!(config.groups.filter, "(objectClass=group)");
        assert_eq!(config.members.uid_attribute, "sAMAccountName");

        let config = CleanupConfig::from_server_type(ServerType::OpenLdap, "ldap://localhost");
        assert_eq!(config.groups.member_attributes.len(), 3);
    }

    #[test]
    fn test_active_directory_defaults() {
        assert_eq!(
            ServerType::ActiveDirectory.default_member_attributes(),
            vec![MemberAttribute::dn("member")]
        );
        assert_eq!(ServerType::ActiveDirectory.default_uid_attribute(), "sAMAccountName");
        assert_eq!(ServerType::OpenLdap.default_uid_attribute(), "uid");
    }
}
