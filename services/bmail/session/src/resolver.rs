//! Mail-domain server discovery.

use async_trait::async_trait;
use bmail_crypto::Address;
use std::collections::HashMap;
use std::net::IpAddr;

use crate::error::SessionError;

/// Servers responsible for one mail domain
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ServerRecord {
    /// Reachable IPs, in preference order
    pub ips: Vec<IpAddr>,
    /// Addresses the domain's servers sign with
    pub identities: Vec<Address>,
}

/// Resolves a mail domain to its servers
#[async_trait]
pub trait ServerResolver: Send + Sync {
    /// Look up `domain`
    async fn resolve(&self, domain: &str) -> Result<ServerRecord, SessionError>;
}

/// Domain part of a mail name such as `bob@example.bm`
pub fn mail_domain(mail_addr: &str) -> Option<&str> {
    match mail_addr.rsplit_once('@') {
        Some((user, domain)) if !user.is_empty() && !domain.is_empty() => Some(domain),
        _ => None,
    }
}

/// Fixed domain table
#[derive(Debug, Clone, Default)]
pub struct StaticResolver {
    records: HashMap<String, ServerRecord>,
}

impl StaticResolver {
    /// Empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace the record for `domain`
    pub fn with_record(mut self, domain: impl Into<String>, record: ServerRecord) -> Self {
        self.records.insert(domain.into().to_ascii_lowercase(), record);
        self
    }
}

#[async_trait]
impl ServerResolver for StaticResolver {
    async fn resolve(&self, domain: &str) -> Result<ServerRecord, SessionError> {
        match self.records.get(&domain.to_ascii_lowercase()) {
            Some(record) if !record.ips.is_empty() => Ok(record.clone()),
            _ => Err(SessionError::Resolve(domain.to_string())),
        }
    }
}
