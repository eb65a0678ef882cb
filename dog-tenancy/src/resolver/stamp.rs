use std::sync::Arc;

use crate::events::EventSink;
use crate::registry::TenantRegistry;
use crate::request::RequestDescriptor;

use super::{AbstainReason, Attempt, TenantResolver};

/// Resolves the tenant recorded on a queued message at enqueue time.
pub struct StampResolver {
    registry: Arc<dyn TenantRegistry>,
}

impl StampResolver {
    pub fn new(registry: Arc<dyn TenantRegistry>) -> Self {
        Self { registry }
    }
}

impl TenantResolver for StampResolver {
    fn resolve(&self, request: &RequestDescriptor, _events: &dyn EventSink) -> Attempt {
        let Some(stamp) = request.stamp() else {
            return Attempt::abstain_with(AbstainReason::MissingSignal, "stamp");
        };

        match self.registry.find_by_id(&stamp.tenant_id) {
            Some(tenant) => Attempt::Resolved(tenant),
            None => Attempt::abstain_with(AbstainReason::UnknownTenant, stamp.tenant_id.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::NoopEventSink;
    use crate::messenger::TenantStamp;
    use crate::registry::InMemoryTenantRegistry;
    use crate::tenant::{Tenant, TenantId};

    #[test]
    fn resolves_stamped_id() {
        let registry = Arc::new(InMemoryTenantRegistry::from_tenants([Tenant::new(5, "acme")]));
        let resolver = StampResolver::new(registry);

        let req = RequestDescriptor::new().with_stamp(TenantStamp::new(TenantId::Int(5)));
        assert_eq!(
            resolver.resolve(&req, &NoopEventSink).tenant().unwrap().slug(),
            "acme"
        );
        assert!(resolver
            .resolve(&RequestDescriptor::new(), &NoopEventSink)
            .tenant()
            .is_none());
    }
}
