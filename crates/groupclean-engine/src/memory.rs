//! In-memory directory
//!
//! Holds entries in a map and understands the subset of the LDAP filter
//! syntax the cleanup engine issues. Used to exercise the engine without a
//! server; compiled only for tests or with the `testing` feature.

use async_trait::async_trait;
use groupclean_core::types::DirectoryEntry;
use groupclean_core::utils::{is_within, normalize_dn};
use groupclean_core::{Directory, Error, Result, SearchScope};
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};

/// A recorded modify request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Modification {
    pub dn: String,
    pub attribute: String,
    pub values: Vec<String>,
}

#[derive(Default)]
pub struct MemoryDirectory {
    entries: RwLock<BTreeMap<String, DirectoryEntry>>,
    failing_lookups: RwLock<HashSet<String>>,
    failing_modifies: RwLock<HashSet<String>>,
    modifications: RwLock<Vec<Modification>>,
    lookups: AtomicUsize,
}

impl MemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, entry: DirectoryEntry) -> Result<()> {
        let key = normalize_dn(&entry.dn)?;
        self.entries.write().insert(key, entry);
        Ok(())
    }

    pub fn with_entries(entries: impl IntoIterator<Item = DirectoryEntry>) -> Result<Self> {
        let directory = Self::new();
        for entry in entries {
            directory.insert(entry)?;
        }
        Ok(directory)
    }

    pub fn get(&self, dn: &str) -> Option<DirectoryEntry> {
        let key = normalize_dn(dn).ok()?;
        self.entries.read().get(&key).cloned()
    }

    /// Make lookups of `dn` fail
    pub fn fail_lookup(&self, dn: &str) -> Result<()> {
        self.failing_lookups.write().insert(normalize_dn(dn)?);
        Ok(())
    }

    /// Make modifies of `dn` fail
    pub fn fail_modify(&self, dn: &str) -> Result<()> {
        self.failing_modifies.write().insert(normalize_dn(dn)?);
        Ok(())
    }

    pub fn modifications(&self) -> Vec<Modification> {
        self.modifications.read().clone()
    }

    pub fn lookup_count(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Directory for MemoryDirectory {
    async fn search(
        &self,
        base: &str,
        scope: SearchScope,
        filter: &str,
        _attrs: &[&str],
    ) -> Result<Vec<DirectoryEntry>> {
        let base_key = normalize_dn(base)?;
        let filter = Filter::parse(filter).map_err(|e| Error::search(base, e))?;
        let entries = self.entries.read();

        if !base_key.is_empty() && !entries.contains_key(&base_key) {
            return Err(Error::search(base, "result code 32: no such object"));
        }

        Ok(entries
            .iter()
            .filter(|(key, _)| in_scope(key, &base_key, scope))
            .filter(|(_, entry)| filter.matches(entry))
            .map(|(_, entry)| entry.clone())
            .collect())
    }

    async fn lookup(&self, dn: &str, _attrs: &[&str]) -> Result<Option<DirectoryEntry>> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        let key = normalize_dn(dn)?;

        if self.failing_lookups.read().contains(&key) {
            return Err(Error::search(dn, "result code 51: busy"));
        }

        Ok(self.entries.read().get(&key).cloned())
    }

    async fn remove_values(&self, dn: &str, attribute: &str, values: &[String]) -> Result<()> {
        let key = normalize_dn(dn)?;

        if self.failing_modifies.read().contains(&key) {
            return Err(Error::modify(dn, "result code 50: insufficient access rights"));
        }

        let mut entries = self.entries.write();
        let entry = entries
            .get_mut(&key)
            .ok_or_else(|| Error::modify(dn, "result code 32: no such object"))?;

        if let Some((_, current)) = entry
            .attrs
            .iter_mut()
            .find(|(name, _)| name.eq_ignore_ascii_case(attribute))
        {
            current.retain(|v| !values.contains(v));
        }

        self.modifications.write().push(Modification {
            dn: dn.to_string(),
            attribute: attribute.to_string(),
            values: values.to_vec(),
        });

        Ok(())
    }
}

fn in_scope(key: &str, base: &str, scope: SearchScope) -> bool {
    match scope {
        SearchScope::Base => key == base,
        SearchScope::Subtree => is_within(key, base),
        SearchScope::OneLevel => key
            .split_once(',')
            .map(|(_, parent)| parent == base)
            .unwrap_or(base.is_empty()),
    }
}

// ============================================================================
// Filters
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
enum Filter {
    And(Vec<Filter>),
    Or(Vec<Filter>),
    Not(Box<Filter>),
    Present(String),
    Equal(String, String),
}

impl Filter {
    fn parse(input: &str) -> std::result::Result<Self, String> {
        let chars: Vec<char> = input.trim().chars().collect();
        let mut pos = 0;
        let filter = parse_filter(&chars, &mut pos)?;
        if pos != chars.len() {
            return Err(format!("trailing input in filter '{}'", input));
        }
        Ok(filter)
    }

    fn matches(&self, entry: &DirectoryEntry) -> bool {
        match self {
            Filter::And(filters) => filters.iter().all(|f| f.matches(entry)),
            Filter::Or(filters) => filters.iter().any(|f| f.matches(entry)),
            Filter::Not(filter) => !filter.matches(entry),
            Filter::Present(attr) => {
                attr.eq_ignore_ascii_case("objectClass") || !entry.values(attr).is_empty()
            }
            Filter::Equal(attr, value) => entry
                .values(attr)
                .iter()
                .any(|v| v.eq_ignore_ascii_case(value)),
        }
    }
}

fn parse_filter(chars: &[char], pos: &mut usize) -> std::result::Result<Filter, String> {
    expect(chars, pos, '(')?;
    let filter = match chars.get(*pos) {
        Some('&') => {
            *pos += 1;
            Filter::And(parse_list(chars, pos)?)
        }
        Some('|') => {
            *pos += 1;
            Filter::Or(parse_list(chars, pos)?)
        }
        Some('!') => {
            *pos += 1;
            Filter::Not(Box::new(parse_filter(chars, pos)?))
        }
        Some(_) => parse_item(chars, pos)?,
        None => return Err("unexpected end of filter".to_string()),
    };
    expect(chars, pos, ')')?;
    Ok(filter)
}

fn parse_list(chars: &[char], pos: &mut usize) -> std::result::Result<Vec<Filter>, String> {
    let mut filters = Vec::new();
    while chars.get(*pos) == Some(&'(') {
        filters.push(parse_filter(chars, pos)?);
    }
    Ok(filters)
}

fn parse_item(chars: &[char], pos: &mut usize) -> std::result::Result<Filter, String> {
    let start = *pos;
    while chars.get(*pos).is_some_and(|c| *c != '=') {
        *pos += 1;
    }
    let attr: String = chars[start..*pos].iter().collect();
    expect(chars, pos, '=')?;

    let mut raw = String::new();
    while let Some(c) = chars.get(*pos) {
        if *c == ')' {
            break;
        }
        raw.push(*c);
        *pos += 1;
    }

    if raw == "*" {
        return Ok(Filter::Present(attr));
    }
    Ok(Filter::Equal(attr, unescape(&raw)?))
}

fn unescape(raw: &str) -> std::result::Result<String, String> {
    let mut out = String::new();
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            let hex: String = chars.by_ref().take(2).collect();
            let byte = u8::from_str_radix(&hex, 16)
                .map_err(|_| format!("bad escape '\\{}' in filter", hex))?;
            out.push(byte as char);
        } else {
            out.push(c);
        }
    }
    Ok(out)
}

fn expect(chars: &[char], pos: &mut usize, want: char) -> std::result::Result<(), String> {
    match chars.get(*pos) {
        Some(c) if *c == want => {
            *pos += 1;
            Ok(())
        }
        other => Err(format!("expected '{}' at {}, found {:?}", want, pos, other)),
    }
}
