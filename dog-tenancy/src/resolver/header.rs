use std::sync::Arc;

use crate::events::{EventSink, TenancyEvent};
use crate::registry::TenantRegistry;
use crate::request::RequestDescriptor;

use super::{lookup, AbstainReason, Attempt, TenantResolver};

pub const DEFAULT_TENANT_HEADER: &str = "x-tenant-id";

/// Reads the tenant from a request header.
///
/// The configured header name must also appear on the allow-list. When it
/// does not and the request carries the header anyway, the resolver reports
/// [`TenancyEvent::HeaderRejected`] and abstains; it never errors.
pub struct HeaderResolver {
    registry: Arc<dyn TenantRegistry>,
    header: String,
    allowed: Vec<String>,
}

impl HeaderResolver {
    /// Header resolver on `x-tenant-id`, allow-listed.
    pub fn new(registry: Arc<dyn TenantRegistry>) -> Self {
        Self {
            registry,
            header: DEFAULT_TENANT_HEADER.to_string(),
            allowed: vec![DEFAULT_TENANT_HEADER.to_string()],
        }
    }

    pub fn with_header(mut self, header: impl Into<String>) -> Self {
        self.header = header.into().to_ascii_lowercase();
        self
    }

    /// Replace the allow-list of header names.
    pub fn with_allowed<I, S>(mut self, allowed: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.allowed = allowed
            .into_iter()
            .map(|h| h.as_ref().trim().to_ascii_lowercase())
            .filter(|h| !h.is_empty())
            .collect();
        self
    }

    pub fn header(&self) -> &str {
        &self.header
    }

    fn is_allowed(&self) -> bool {
        self.allowed.iter().any(|h| h == &self.header)
    }
}

impl TenantResolver for HeaderResolver {
    fn resolve(&self, request: &RequestDescriptor, events: &dyn EventSink) -> Attempt {
        let Some(value) = request.header(&self.header) else {
            return Attempt::abstain_with(AbstainReason::MissingSignal, self.header.clone());
        };

        if !self.is_allowed() {
            events.emit(&TenancyEvent::HeaderRejected {
                header: self.header.clone(),
            });
            return Attempt::abstain_with(AbstainReason::HeaderRejected, self.header.clone());
        }

        lookup(self.registry.as_ref(), value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::RecordingEventSink;
    use crate::registry::InMemoryTenantRegistry;
    use crate::tenant::Tenant;

    fn registry() -> Arc<dyn TenantRegistry> {
        Arc::new(InMemoryTenantRegistry::from_tenants([Tenant::new(1, "acme")]))
    }

    #[test]
    fn resolves_allowed_header_case_insensitively() {
        let resolver = HeaderResolver::new(registry()).with_header("X-Tenant-ID");
        let req = RequestDescriptor::new().with_header("x-tenant-id", "acme");

        let attempt = resolver.resolve(&req, &RecordingEventSink::new());
        assert_eq!(attempt.tenant().unwrap().slug(), "acme");
    }

    #[test]
    fn missing_header_abstains_silently() {
        let events = RecordingEventSink::new();
        let resolver = HeaderResolver::new(registry());

        let attempt = resolver.resolve(&RequestDescriptor::new(), &events);
        assert!(matches!(
            attempt,
            Attempt::Abstained(ref a) if a.reason == AbstainReason::MissingSignal
        ));
        assert!(events.events().is_empty());
    }

    #[test]
    fn header_outside_allow_list_is_rejected() {
        let events = RecordingEventSink::new();
        let resolver = HeaderResolver::new(registry())
            .with_header("x-customer")
            .with_allowed(["x-tenant-id"]);
        let req = RequestDescriptor::new().with_header("X-Customer", "acme");

        let attempt = resolver.resolve(&req, &events);

        assert!(matches!(
            attempt,
            Attempt::Abstained(ref a) if a.reason == AbstainReason::HeaderRejected
        ));
        assert_eq!(
            events.events(),
            vec![TenancyEvent::HeaderRejected {
                header: "x-customer".into()
            }]
        );
    }
}
