//! LDAP directory access for px-ldap-group-cleanup
//!
//! Supports:
//! - LDAP, LDAPS and STARTTLS connections
//! - Service account or anonymous bind
//! - Paged subtree searches and base-scope lookups
//! - Member value removal
//! - Root DSE inspection

mod client;
mod types;

pub use client::LdapDirectory;
pub use types::ServerInfo;
