//! Directory trait
//!
//! Defines the interface the cleanup engine needs from a directory server.
//! The LDAP implementation lives in `groupclean-ldap`.

use crate::types::DirectoryEntry;
use crate::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Search scope
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchScope {
    Base,
    OneLevel,
    Subtree,
}

/// Read and modify access to a directory
#[async_trait]
pub trait Directory: Send + Sync {
    /// Search below `base` and return all matching entries
    async fn search(
        &self,
        base: &str,
        scope: SearchScope,
        filter: &str,
        attrs: &[&str],
    ) -> Result<Vec<DirectoryEntry>>;

    /// Read a single entry by DN, `None` if it does not exist
    async fn lookup(&self, dn: &str, attrs: &[&str]) -> Result<Option<DirectoryEntry>>;

    /// Delete the given values of `attribute` from the entry at `dn`
    async fn remove_values(&self, dn: &str, attribute: &str, values: &[String]) -> Result<()>;
}
