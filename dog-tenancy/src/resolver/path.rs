use std::sync::Arc;

use crate::events::EventSink;
use crate::registry::TenantRegistry;
use crate::request::RequestDescriptor;

use super::{is_valid_slug, lookup, AbstainReason, Attempt, TenantResolver};

/// Resolves `/acme/orders/1` to the tenant with slug `acme`.
pub struct PathResolver {
    registry: Arc<dyn TenantRegistry>,
    excluded: Vec<String>,
}

impl PathResolver {
    pub fn new(registry: Arc<dyn TenantRegistry>) -> Self {
        Self {
            registry,
            excluded: Vec::new(),
        }
    }

    /// First segments that are routes of their own, never tenants.
    pub fn with_excluded<I, S>(mut self, excluded: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.excluded = excluded.into_iter().map(Into::into).collect();
        self
    }
}

impl TenantResolver for PathResolver {
    fn resolve(&self, request: &RequestDescriptor, _events: &dyn EventSink) -> Attempt {
        let path = request.path().trim_start_matches('/');
        let segment = path.split('/').next().unwrap_or_default();

        if segment.is_empty() {
            return Attempt::abstain_with(AbstainReason::MissingSignal, "path");
        }
        if self.excluded.iter().any(|e| e == segment) {
            return Attempt::abstain_with(AbstainReason::Reserved, segment);
        }
        if !is_valid_slug(segment) {
            return Attempt::abstain_with(AbstainReason::InvalidFormat, segment);
        }

        lookup(self.registry.as_ref(), segment)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::NoopEventSink;
    use crate::registry::InMemoryTenantRegistry;
    use crate::resolver::Abstention;
    use crate::tenant::Tenant;

    fn resolver() -> PathResolver {
        let registry = Arc::new(InMemoryTenantRegistry::from_tenants([Tenant::new(1, "acme")]));
        PathResolver::new(registry).with_excluded(["api", "health"])
    }

    #[test]
    fn first_segment_is_the_slug() {
        let req = RequestDescriptor::new().with_path("/acme/orders/1");
        let attempt = resolver().resolve(&req, &NoopEventSink);
        assert_eq!(attempt.tenant().unwrap().slug(), "acme");
    }

    #[test]
    fn root_and_excluded_paths_abstain() {
        let r = resolver();

        let root = RequestDescriptor::new().with_path("/");
        assert!(matches!(
            r.resolve(&root, &NoopEventSink),
            Attempt::Abstained(Abstention { reason: AbstainReason::MissingSignal, .. })
        ));

        let health = RequestDescriptor::new().with_path("/health");
        assert!(matches!(
            r.resolve(&health, &NoopEventSink),
            Attempt::Abstained(Abstention { reason: AbstainReason::Reserved, .. })
        ));

        let unknown = RequestDescriptor::new().with_path("/globex/x");
        assert!(matches!(
            r.resolve(&unknown, &NoopEventSink),
            Attempt::Abstained(Abstention { reason: AbstainReason::UnknownTenant, .. })
        ));
    }
}
