use std::sync::Arc;

use crate::events::EventSink;
use crate::registry::TenantRegistry;
use crate::request::RequestDescriptor;

use super::{lookup, AbstainReason, Attempt, TenantResolver};

pub const DEFAULT_TENANT_QUERY_PARAM: &str = "_tenant";

/// Reads the tenant from a query string parameter (`?_tenant=acme`).
pub struct QueryResolver {
    registry: Arc<dyn TenantRegistry>,
    param: String,
}

impl QueryResolver {
    pub fn new(registry: Arc<dyn TenantRegistry>) -> Self {
        Self {
            registry,
            param: DEFAULT_TENANT_QUERY_PARAM.to_string(),
        }
    }

    pub fn with_param(mut self, param: impl Into<String>) -> Self {
        self.param = param.into();
        self
    }
}

impl TenantResolver for QueryResolver {
    fn resolve(&self, request: &RequestDescriptor, _events: &dyn EventSink) -> Attempt {
        match request.query(&self.param) {
            Some(value) => lookup(self.registry.as_ref(), value),
            None => Attempt::abstain_with(AbstainReason::MissingSignal, self.param.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::NoopEventSink;
    use crate::registry::InMemoryTenantRegistry;
    use crate::tenant::Tenant;

    #[test]
    fn reads_configured_param() {
        let registry = Arc::new(InMemoryTenantRegistry::from_tenants([Tenant::new(1, "acme")]));
        let resolver = QueryResolver::new(registry).with_param("tenant");

        let req = RequestDescriptor::new().with_query("tenant", "acme");
        assert_eq!(
            resolver.resolve(&req, &NoopEventSink).tenant().unwrap().slug(),
            "acme"
        );

        let other = RequestDescriptor::new().with_query("_tenant", "acme");
        assert!(resolver.resolve(&other, &NoopEventSink).tenant().is_none());
    }
}
