//! Core library for px-ldap-group-cleanup
//!
//! Types, errors, configuration and the directory abstraction shared by the
//! LDAP client, the cleanup engine and the command-line tool.

pub mod config;
pub mod error;
pub mod traits;
pub mod types;
pub mod utils;

pub use config::CleanupConfig;
pub use error::{Error, Result};
pub use traits::{Directory, SearchScope};

/// Tool version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Name of the installed command
pub const BINARY_NAME: &str = "px-ldap-group-cleanup";

/// Prefix for environment variable overrides
pub const ENV_PREFIX: &str = "GROUPCLEAN_";

/// LDAP result code: noSuchAttribute
pub const RC_NO_SUCH_ATTRIBUTE: u32 = 16;

/// LDAP result code: noSuchObject
pub const RC_NO_SUCH_OBJECT: u32 = 32;

/// LDAP result code: invalidCredentials
pub const RC_INVALID_CREDENTIALS: u32 = 49;
