use std::collections::HashMap;

use crate::messenger::TenantStamp;

/// Read-only view of an inbound unit of work.
///
/// Transports (HTTP adapters, queue workers) build one of these and hand it
/// to the resolver chain. Header names are stored lower-cased so lookups are
/// case-insensitive.
#[derive(Debug, Clone, Default)]
pub struct RequestDescriptor {
    host: Option<String>,
    path: String,
    headers: HashMap<String, String>,
    query: HashMap<String, String>,
    stamp: Option<TenantStamp>,
}

impl RequestDescriptor {
    pub fn new() -> Self {
        Self {
            path: "/".to_string(),
            ..Default::default()
        }
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    pub fn with_header(mut self, name: impl AsRef<str>, value: impl Into<String>) -> Self {
        self.headers
            .insert(name.as_ref().to_ascii_lowercase(), value.into());
        self
    }

    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.insert(key.into(), value.into());
        self
    }

    pub fn with_queries(mut self, query: HashMap<String, String>) -> Self {
        self.query.extend(query);
        self
    }

    pub fn with_stamp(mut self, stamp: TenantStamp) -> Self {
        self.stamp = Some(stamp);
        self
    }

    /// Raw host as sent by the client, port included.
    pub fn host(&self) -> Option<&str> {
        self.host.as_deref()
    }

    /// Host lower-cased with any `:port` suffix removed.
    pub fn hostname(&self) -> Option<String> {
        let host = self.host.as_deref()?.trim();
        if host.is_empty() {
            return None;
        }
        let name = match host.rsplit_once(':') {
            Some((name, port)) if port.chars().all(|c| c.is_ascii_digit()) => name,
            _ => host,
        };
        Some(name.trim_end_matches('.').to_ascii_lowercase())
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(|s| s.as_str())
    }

    pub fn headers(&self) -> &HashMap<String, String> {
        &self.headers
    }

    pub fn query(&self, key: &str) -> Option<&str> {
        self.query.get(key).map(|s| s.as_str())
    }

    pub fn stamp(&self) -> Option<&TenantStamp> {
        self.stamp.as_ref()
    }
}
