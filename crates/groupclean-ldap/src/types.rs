//! Types returned by the LDAP client

use serde::{Deserialize, Serialize};

/// LDAP server information from the root DSE
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerInfo {
    pub url: String,
    pub vendor: Option<String>,
    pub version: Option<String>,
    pub naming_contexts: Vec<String>,
    pub supported_ldap_version: Vec<String>,
    /// Bound identity, None for anonymous
    pub bound_as: Option<String>,
}

impl ServerInfo {
    /// Whether the server advertises a naming context containing `dn`
    pub fn serves(&self, normalized_dn: &str) -> bool {
        self.naming_contexts.iter().any(|ctx| {
            groupclean_core::utils::normalize_dn(ctx)
                .map(|ctx| groupclean_core::utils::is_within(normalized_dn, &ctx))
                .unwrap_or(false)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serves() {
        let info = ServerInfo {
            naming_contexts: vec!["DC=Example,DC=com".to_string()],
            ..Default::default()
        };
        assert!(info.serves("ou=groups,dc=example,dc=com"));
        assert!(!info.serves("ou=groups,dc=other,dc=com"));
    }

    #[test]
    fn test_serialization() {
        let info = ServerInfo {
            url: "ldap://localhost:389".to_string(),
            vendor: Some("OpenLDAP".to_string()),
            supported_ldap_version: vec!["3".to_string()],
            ..Default::default()
        };
        let json = serde_json::to_string(&info).unwrap();
        assert!(json.contains("\"vendor\":\"OpenLDAP\""));
    }
}
