//! LDAP Client implementation
//!
//! Handles the connection, the service account bind, paged searches,
//! entry lookups and member removal. Supports LDAP, LDAPS (SSL) and
//! STARTTLS connections.

use crate::types::ServerInfo;
use async_trait::async_trait;
use groupclean_core::config::ConnectionConfig;
use groupclean_core::types::DirectoryEntry;
use groupclean_core::{
    Directory, Error, Result, SearchScope, RC_INVALID_CREDENTIALS, RC_NO_SUCH_ATTRIBUTE,
    RC_NO_SUCH_OBJECT,
};
use ldap3::adapters::{Adapter, EntriesOnly, PagedResults};
use ldap3::{Ldap, LdapConnAsync, LdapConnSettings, LdapResult, Mod, Scope, SearchEntry, SearchResult};
use std::collections::HashSet;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Bound LDAP connection implementing [`Directory`]
///
/// The `Ldap` handle is cloned per operation, so lookups issued
/// concurrently share one connection.
pub struct LdapDirectory {
    ldap: Ldap,
    url: String,
    bound_as: Option<String>,
    timeout: Duration,
    page_size: i32,
}

impl LdapDirectory {
    /// Connect to the server and bind with the configured service account
    pub async fn connect(config: &ConnectionConfig) -> Result<Self> {
        config.validate()?;

        let timeout = Duration::from_secs(config.timeout_seconds);
        let settings = LdapConnSettings::new()
            .set_conn_timeout(timeout)
            .set_starttls(config.start_tls)
            .set_no_tls_verify(config.skip_tls_verify);

        if config.skip_tls_verify {
            warn!("TLS certificate verification is disabled");
        }

        debug!("Connecting to LDAP server: {}", config.url);

        let (conn, mut ldap) = LdapConnAsync::with_settings(settings, &config.url)
            .await
            .map_err(|e| Error::Connection(format!("{}: {}", config.url, e)))?;

        ldap3::drive!(conn);

        let bound_as = if config.bind_dn.is_empty() {
            debug!("Using anonymous bind");
            None
        } else {
            let result = ldap
                .with_timeout(timeout)
                .simple_bind(&config.bind_dn, &config.bind_password)
                .await
                .map_err(|e| Error::Bind(format!("Service bind failed: {}", e)))?;

            match result.rc {
                0 => {}
                RC_INVALID_CREDENTIALS => {
                    return Err(Error::InvalidCredentials(config.bind_dn.clone()));
                }
                rc => {
                    return Err(Error::Bind(format!(
                        "Service account bind failed with code {}: {}",
                        rc, result.text
                    )));
                }
            }
            Some(config.bind_dn.clone())
        };

        info!(
            url = %config.url,
            bind_dn = bound_as.as_deref().unwrap_or("<anonymous>"),
            "Connected to LDAP server"
        );

        Ok(Self {
            ldap,
            url: config.url.clone(),
            bound_as,
            timeout,
            page_size: config.page_size,
        })
    }

    /// Query the root DSE for server information
    pub async fn server_info(&self) -> Result<ServerInfo> {
        let mut ldap = self.ldap.clone();
        let (rs, _res) = ldap
            .with_timeout(self.timeout)
            .search(
                "",
                Scope::Base,
                "(objectClass=*)",
                vec![
                    "vendorName",
                    "vendorVersion",
                    "namingContexts",
                    "supportedLDAPVersion",
                ],
            )
            .await
            .map_err(|e| Error::search("<root DSE>", e))?
            .success()
            .map_err(|e| Error::search("<root DSE>", e))?;

        let mut info = ServerInfo {
            url: self.url.clone(),
            bound_as: self.bound_as.clone(),
            supported_ldap_version: vec!["3".to_string()],
            ..Default::default()
        };

        if let Some(result) = rs.into_iter().next() {
            let entry = to_directory_entry(SearchEntry::construct(result));
            info.vendor = entry.first("vendorName").map(str::to_string);
            info.version = entry.first("vendorVersion").map(str::to_string);
            info.naming_contexts = entry.values("namingContexts").to_vec();
            let versions = entry.values("supportedLDAPVersion");
            if !versions.is_empty() {
                info.supported_ldap_version = versions.to_vec();
            }
        }

        Ok(info)
    }

    /// Unbind and close the connection
    pub async fn close(self) -> Result<()> {
        let mut ldap = self.ldap;
        ldap.unbind()
            .await
            .map_err(|e| Error::Connection(format!("Unbind failed: {}", e)))?;
        debug!("Unbound from {}", self.url);
        Ok(())
    }
}

#[async_trait]
impl Directory for LdapDirectory {
    async fn search(
        &self,
        base: &str,
        scope: SearchScope,
        filter: &str,
        attrs: &[&str],
    ) -> Result<Vec<DirectoryEntry>> {
        debug!(base, filter, "Paged search");

        let mut ldap = self.ldap.clone();
        let attrs: Vec<String> = attrs.iter().map(|a| a.to_string()).collect();
        let adapters: Vec<Box<dyn Adapter<_, _>>> = vec![
            Box::new(EntriesOnly::new()),
            Box::new(PagedResults::new(self.page_size)),
        ];

        let mut stream = ldap
            .with_timeout(self.timeout)
            .streaming_search_with(adapters, base, to_scope(scope), filter, attrs)
            .await
            .map_err(|e| Error::search(base, e))?;

        let mut entries = Vec::new();
        while let Some(result) = stream.next().await.map_err(|e| Error::search(base, e))? {
            entries.push(to_directory_entry(SearchEntry::construct(result)));
        }

        stream
            .finish()
            .await
            .success()
            .map_err(|e| Error::search(base, e))?;

        debug!(base, count = entries.len(), "Search complete");
        Ok(entries)
    }

    async fn lookup(&self, dn: &str, attrs: &[&str]) -> Result<Option<DirectoryEntry>> {
        let mut ldap = self.ldap.clone();
        let attrs: Vec<String> = attrs.iter().map(|a| a.to_string()).collect();

        let SearchResult(rs, res) = ldap
            .with_timeout(self.timeout)
            .search(dn, Scope::Base, "(objectClass=*)", attrs)
            .await
            .map_err(|e| Error::search(dn, e))?;

        match res.rc {
            0 => Ok(rs
                .into_iter()
                .next()
                .map(|r| to_directory_entry(SearchEntry::construct(r)))),
            RC_NO_SUCH_OBJECT => Ok(None),
            _ => Err(Error::search(dn, describe(&res))),
        }
    }

    async fn remove_values(&self, dn: &str, attribute: &str, values: &[String]) -> Result<()> {
        if values.is_empty() {
            return Ok(());
        }

        let mut ldap = self.ldap.clone();
        let values: HashSet<String> = values.iter().cloned().collect();
        let count = values.len();

        let res = ldap
            .with_timeout(self.timeout)
            .modify(dn, vec![Mod::Delete(attribute.to_string(), values)])
            .await
            .map_err(|e| Error::modify(dn, e))?;

        match res.rc {
            0 => {
                debug!(dn, attribute, count, "Removed member values");
                Ok(())
            }
            RC_NO_SUCH_ATTRIBUTE => {
                warn!(dn, attribute, "Member values already absent");
                Ok(())
            }
            _ => Err(Error::modify(dn, describe(&res))),
        }
    }
}

fn to_scope(scope: SearchScope) -> Scope {
    match scope {
        SearchScope::Base => Scope::Base,
        SearchScope::OneLevel => Scope::OneLevel,
        SearchScope::Subtree => Scope::Subtree,
    }
}

fn to_directory_entry(entry: SearchEntry) -> DirectoryEntry {
    DirectoryEntry {
        dn: entry.dn,
        attrs: entry.attrs,
    }
}

fn describe(res: &LdapResult) -> String {
    if res.text.is_empty() {
        format!("result code {}", res.rc)
    } else {
        format!("result code {}: {}", res.rc, res.text)
    }
}
