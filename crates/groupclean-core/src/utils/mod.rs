//! Utility functions

pub mod time;

use crate::{Error, Result};

/// Split a DN into its RDN components on unescaped commas
pub fn split_rdns(dn: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut start = 0;
    let mut escaped = false;

    for (i, c) in dn.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' => escaped = true,
            ',' | ';' => {
                parts.push(&dn[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(&dn[start..]);
    parts
}

/// Normalize a DN for comparison
///
/// Attribute types and values are lowercased and the whitespace around
/// separators is removed. The empty DN normalizes to itself.
pub fn normalize_dn(dn: &str) -> Result<String> {
    let dn = dn.trim();
    if dn.is_empty() {
        return Ok(String::new());
    }

    let mut rdns = Vec::new();
    for rdn in split_rdns(dn) {
        let rdn = rdn.trim();
        let (attr, value) = rdn
            .split_once('=')
            .ok_or_else(|| Error::InvalidDn(dn.to_string()))?;
        let attr = attr.trim();
        let value = value.trim();
        if attr.is_empty() || value.is_empty() {
            return Err(Error::InvalidDn(dn.to_string()));
        }
        rdns.push(format!("{}={}", attr.to_lowercase(), value.to_lowercase()));
    }

    Ok(rdns.join(","))
}

/// Check whether a normalized DN equals or lies below a normalized base
pub fn is_within(dn: &str, base: &str) -> bool {
    if base.is_empty() {
        return true;
    }
    dn == base || (dn.len() > base.len() && dn.ends_with(base) && dn[..dn.len() - base.len()].ends_with(','))
}

/// Value of the first RDN, e.g. `devs` for `cn=devs,ou=groups,dc=example`
pub fn first_rdn_value(dn: &str) -> Option<&str> {
    split_rdns(dn)
        .into_iter()
        .next()
        .and_then(|rdn| rdn.split_once('='))
        .map(|(_, value)| value.trim())
        .filter(|value| !value.is_empty())
}

/// Strip the optional `#'0101'B` unique identifier from a uniqueMember value
pub fn strip_unique_id(value: &str) -> &str {
    if let Some(pos) = value.rfind('#') {
        let suffix = &value[pos + 1..];
        let is_bitstring = suffix.len() >= 3
            && suffix.starts_with('\'')
            && suffix.ends_with("'B")
            && suffix[1..suffix.len() - 2].chars().all(|c| c == '0' || c == '1');
        if is_bitstring {
            return &value[..pos];
        }
    }
    value
}

/// Escape a value for use inside an LDAP search filter (RFC 4515)
pub fn escape_filter_value(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '*' => out.push_str("\\2a"),
            '(' => out.push_str("\\28"),
            ')' => out.push_str("\\29"),
            '\\' => out.push_str("\\5c"),
            '\0' => out.push_str("\\00"),
            _ => out.push(c),
        }
    }
    out
}

/// Wrap a filter in parentheses if it isn't already
pub fn parenthesize_filter(filter: &str) -> String {
    let filter = filter.trim();
    if filter.starts_with('(') && filter.ends_with(')') {
        filter.to_string()
    } else {
        format!("({})", filter)
    }
}

/// Mask a secret for display
pub fn mask_secret(secret: &str) -> String {
    if secret.is_empty() {
        String::new()
    } else {
        "***".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_dn() {
        assert_eq!(
            normalize_dn("CN=John Smith, OU=People ,DC=Example,DC=com").unwrap(),
            "cn=john smith,ou=people,dc=example,dc=com"
        );
        assert_eq!(normalize_dn("  ").unwrap(), "");
        assert!(normalize_dn("not a dn").is_err());
        assert!(normalize_dn("cn=,dc=example").is_err());
    }

    #[test]
    fn test_split_rdns_respects_escapes() {
        let parts = split_rdns(r"cn=Smith\, John,ou=people,dc=example");
        assert_eq!(parts, vec![r"cn=Smith\, John", "ou=people", "dc=example"]);
        assert_eq!(
            normalize_dn(r"cn=Smith\, John,dc=example").unwrap(),
            r"cn=smith\, john,dc=example"
        );
    }

    #[test]
    fn test_is_within() {
        let base = "ou=people,dc=example,dc=com";
        assert!(is_within("uid=a,ou=people,dc=example,dc=com", base));
        assert!(is_within(base, base));
        assert!(!is_within("uid=a,ou=otherpeople,dc=example,dc=com", base));
        assert!(!is_within("dc=example,dc=com", base));
        assert!(is_within("dc=com", ""));
    }

    #[test]
    fn test_first_rdn_value() {
        assert_eq!(first_rdn_value("cn=devs,ou=groups,dc=example"), Some("devs"));
        assert_eq!(first_rdn_value(""), None);
    }

    #[test]
    fn test_strip_unique_id() {
        assert_eq!(
            strip_unique_id("uid=a,ou=people,dc=example#'0101'B"),
            "uid=a,ou=people,dc=example"
        );
        assert_eq!(strip_unique_id("uid=a#b,ou=people"), "uid=a#b,ou=people");
        assert_eq!(strip_unique_id("uid=a,ou=people"), "uid=a,ou=people");
    }

    #[test]
    fn test_escape_filter_value() {
        assert_eq!(escape_filter_value("jo*hn"), "jo\\2ahn");
        assert_eq!(escape_filter_value("a(b)c\\"), "a\\28b\\29c\\5c");
        assert_eq!(escape_filter_value("plain"), "plain");
    }

    #[test]
    fn test_parenthesize_filter() {
        assert_eq!(parenthesize_filter("objectClass=*"), "(objectClass=*)");
        assert_eq!(parenthesize_filter("(uid=a)"), "(uid=a)");
    }
}
