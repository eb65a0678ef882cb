use std::collections::HashMap;
use std::sync::Arc;

use crate::events::EventSink;
use crate::registry::TenantRegistry;
use crate::request::RequestDescriptor;

use super::{AbstainReason, Attempt, TenantResolver};

/// Exact host → tenant slug mapping, for tenants on their own domains.
pub struct DomainResolver {
    registry: Arc<dyn TenantRegistry>,
    domains: HashMap<String, String>,
}

impl DomainResolver {
    pub fn new(registry: Arc<dyn TenantRegistry>) -> Self {
        Self {
            registry,
            domains: HashMap::new(),
        }
    }

    pub fn with_domain(mut self, host: impl AsRef<str>, slug: impl Into<String>) -> Self {
        self.domains
            .insert(normalize(host.as_ref()), slug.into());
        self
    }

    pub fn with_domains<I, H, S>(mut self, domains: I) -> Self
    where
        I: IntoIterator<Item = (H, S)>,
        H: AsRef<str>,
        S: Into<String>,
    {
        for (host, slug) in domains {
            self.domains.insert(normalize(host.as_ref()), slug.into());
        }
        self
    }
}

fn normalize(host: &str) -> String {
    host.trim().trim_end_matches('.').to_ascii_lowercase()
}

impl TenantResolver for DomainResolver {
    fn resolve(&self, request: &RequestDescriptor, _events: &dyn EventSink) -> Attempt {
        let Some(host) = request.hostname() else {
            return Attempt::abstain_with(AbstainReason::MissingSignal, "host");
        };

        let Some(slug) = self.domains.get(&host) else {
            return Attempt::abstain_with(AbstainReason::MissingSignal, host);
        };

        match self.registry.find_by_slug(slug) {
            Some(tenant) => Attempt::Resolved(tenant),
            None => Attempt::abstain_with(AbstainReason::UnknownTenant, slug.clone()),
        }
    }
}
