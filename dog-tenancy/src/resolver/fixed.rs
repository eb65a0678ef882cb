use std::sync::Arc;

use crate::events::EventSink;
use crate::registry::TenantRegistry;
use crate::request::RequestDescriptor;

use super::{AbstainReason, Attempt, TenantResolver};

/// Always proposes the same tenant.
///
/// Meant for a default/fallback tenant; register it as exempt so it never
/// conflicts with the authoritative resolvers.
pub struct FixedResolver {
    registry: Arc<dyn TenantRegistry>,
    slug: String,
}

impl FixedResolver {
    pub fn new(registry: Arc<dyn TenantRegistry>, slug: impl Into<String>) -> Self {
        Self {
            registry,
            slug: slug.into(),
        }
    }
}

impl TenantResolver for FixedResolver {
    fn resolve(&self, _request: &RequestDescriptor, _events: &dyn EventSink) -> Attempt {
        match self.registry.find_by_slug(&self.slug) {
            Some(tenant) => Attempt::Resolved(tenant),
            None => Attempt::abstain_with(AbstainReason::UnknownTenant, self.slug.clone()),
        }
    }
}
