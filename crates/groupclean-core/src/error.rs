//! Error types for px-ldap-group-cleanup

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    // Configuration Errors
    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Invalid distinguished name: {0}")]
    InvalidDn(String),

    // Connection Errors
    #[error("Failed to connect to LDAP server: {0}")]
    Connection(String),

    #[error("Bind failed: {0}")]
    Bind(String),

    #[error("Invalid credentials for bind DN: {0}")]
    InvalidCredentials(String),

    // Operation Errors
    #[error("Search under '{base}' failed: {message}")]
    Search { base: String, message: String },

    #[error("Modify of '{dn}' failed: {message}")]
    Modify { dn: String, message: String },

    // Safety Errors
    #[error("Refusing to remove {planned} member(s): limit is {limit}")]
    SafetyLimit { planned: usize, limit: usize },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl Error {
    pub fn code(&self) -> &'static str {
        match self {
            Error::Config(_) => "ConfigError",
            Error::InvalidDn(_) => "InvalidDn",
            Error::Connection(_) => "ConnectionError",
            Error::Bind(_) => "BindError",
            Error::InvalidCredentials(_) => "InvalidCredentials",
            Error::Search { .. } => "SearchError",
            Error::Modify { .. } => "ModifyError",
            Error::SafetyLimit { .. } => "SafetyLimit",
            Error::Io(_) => "IoError",
            Error::Other(_) => "InternalError",
        }
    }

    /// Whether retrying the same run could succeed without a config change
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Error::Connection(_) | Error::Search { .. } | Error::Modify { .. } | Error::Io(_)
        )
    }

    pub fn search(base: impl Into<String>, message: impl ToString) -> Self {
        Error::Search {
            base: base.into(),
            message: message.to_string(),
        }
    }

    pub fn modify(dn: impl Into<String>, message: impl ToString) -> Self {
        Error::Modify {
            dn: dn.into(),
            message: message.to_string(),
        }
    }
}
