use std::sync::Arc;

use crate::events::EventSink;
use crate::registry::TenantRegistry;
use crate::request::RequestDescriptor;

use super::{is_valid_slug, lookup, AbstainReason, Attempt, TenantResolver};

/// Resolves `acme.example.com` to the tenant with slug `acme`.
///
/// Exactly one label must sit in front of the base domain; the apex and
/// deeper hosts (`a.b.example.com`) abstain.
pub struct SubdomainResolver {
    registry: Arc<dyn TenantRegistry>,
    base_domain: String,
    reserved: Vec<String>,
}

impl SubdomainResolver {
    pub fn new(registry: Arc<dyn TenantRegistry>, base_domain: impl Into<String>) -> Self {
        let base_domain = base_domain
            .into()
            .trim()
            .trim_matches('.')
            .to_ascii_lowercase();
        Self {
            registry,
            base_domain,
            reserved: vec!["www".to_string()],
        }
    }

    pub fn with_reserved<I, S>(mut self, reserved: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.reserved = reserved
            .into_iter()
            .map(|s| s.as_ref().to_ascii_lowercase())
            .collect();
        self
    }

    fn label<'a>(&self, host: &'a str) -> Option<&'a str> {
        let prefix = host.strip_suffix(&self.base_domain)?;
        prefix.strip_suffix('.')
    }
}

impl TenantResolver for SubdomainResolver {
    fn resolve(&self, request: &RequestDescriptor, _events: &dyn EventSink) -> Attempt {
        let Some(host) = request.hostname() else {
            return Attempt::abstain_with(AbstainReason::MissingSignal, "host");
        };

        let Some(label) = self.label(&host) else {
            return Attempt::abstain_with(AbstainReason::MissingSignal, host);
        };

        if label.contains('.') || !is_valid_slug(label) {
            return Attempt::abstain_with(AbstainReason::InvalidFormat, label);
        }

        if self.reserved.iter().any(|r| r == label) {
            return Attempt::abstain_with(AbstainReason::Reserved, label);
        }

        lookup(self.registry.as_ref(), label)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::NoopEventSink;
    use crate::registry::InMemoryTenantRegistry;
    use crate::tenant::Tenant;

    fn resolver() -> SubdomainResolver {
        let registry = Arc::new(InMemoryTenantRegistry::from_tenants([Tenant::new(1, "acme")]));
        SubdomainResolver::new(registry, "example.com")
    }

    fn reason(attempt: Attempt) -> AbstainReason {
        match attempt {
            Attempt::Abstained(a) => a.reason,
            Attempt::Resolved(t) => panic!("unexpected tenant {t}"),
        }
    }

    #[test]
    fn resolves_single_label() {
        let req = RequestDescriptor::new().with_host("ACME.example.com:8080");
        let attempt = resolver().resolve(&req, &NoopEventSink);
        assert_eq!(attempt.tenant().unwrap().slug(), "acme");
    }

    #[test]
    fn apex_foreign_and_nested_hosts_abstain() {
        let r = resolver();
        let sink = NoopEventSink;

        let apex = RequestDescriptor::new().with_host("example.com");
        assert_eq!(reason(r.resolve(&apex, &sink)), AbstainReason::MissingSignal);

        let foreign = RequestDescriptor::new().with_host("acme.other.org");
        assert_eq!(reason(r.resolve(&foreign, &sink)), AbstainReason::MissingSignal);

        let lookalike = RequestDescriptor::new().with_host("acmeexample.com");
        assert_eq!(reason(r.resolve(&lookalike, &sink)), AbstainReason::MissingSignal);

        let nested = RequestDescriptor::new().with_host("a.acme.example.com");
        assert_eq!(reason(r.resolve(&nested, &sink)), AbstainReason::InvalidFormat);
    }

    #[test]
    fn reserved_labels_abstain() {
        let req = RequestDescriptor::new().with_host("www.example.com");
        assert_eq!(
            reason(resolver().resolve(&req, &NoopEventSink)),
            AbstainReason::Reserved
        );
    }
}
