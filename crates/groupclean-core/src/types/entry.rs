//! Directory entry as returned by searches and lookups

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A directory entry with multi-valued attributes
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryEntry {
    /// Entry DN as returned by the server
    pub dn: String,

    /// Attribute values keyed by attribute name
    #[serde(default)]
    pub attrs: HashMap<String, Vec<String>>,
}

impl DirectoryEntry {
    pub fn new(dn: impl Into<String>) -> Self {
        Self {
            dn: dn.into(),
            attrs: HashMap::new(),
        }
    }

    /// Builder-style attribute setter
    pub fn with_attr<I, S>(mut self, name: &str, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.attrs
            .insert(name.to_string(), values.into_iter().map(Into::into).collect());
        self
    }

    /// All values of an attribute, matching the name case-insensitively
    pub fn values(&self, name: &str) -> &[String] {
        self.attrs
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, values)| values.as_slice())
            .unwrap_or(&[])
    }

    /// First value of an attribute
    pub fn first(&self, name: &str) -> Option<&str> {
        self.values(name).first().map(|s| s.as_str())
    }

    /// Check whether the entry carries an object class
    pub fn has_object_class(&self, class: &str) -> bool {
        self.values("objectClass")
            .iter()
            .any(|c| c.eq_ignore_ascii_case(class))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attribute_lookup_is_case_insensitive() {
        let entry = DirectoryEntry::new("cn=devs,ou=groups,dc=example")
            .with_attr("objectClass", ["top", "groupOfNames"])
            .with_attr("uniqueMember", ["uid=a,ou=people,dc=example"]);

        assert_eq!(entry.values("uniquemember").len(), 1);
        assert_eq!(entry.first("UNIQUEMEMBER"), Some("uid=a,ou=people,dc=example"));
        assert!(entry.has_object_class("groupofnames"));
        assert!(entry.values("member").is_empty());
    }
}
