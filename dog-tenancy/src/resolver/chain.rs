//! # Chain resolver
//!
//! Runs every registered strategy in precedence order and settles on a
//! single tenant.
//!
//! ```text
//! request ──► header ──► subdomain ──► path ──► ... (all of them, in order)
//!                 │            │         │
//!                 └────────────┴─────────┴──► {name: tenant} results
//!                                               │
//!            ┌──────────────────┬───────────────┼────────────────────┐
//!            ▼                  ▼               ▼                    ▼
//!     >1 distinct id       1 distinct id    none (strict)      none (lenient)
//!       Ambiguous          first producer   ResolutionFailed   exempt fallback
//!                                                               or no tenant
//! ```
//!
//! Precedence decides which resolver a result is *attributed* to. It never
//! arbitrates a disagreement: two authoritative resolvers naming different
//! tenants is always an error.
//!
//! Resolvers registered as *exempt* (typically a default-tenant fallback)
//! take no part in the ambiguity check and only supply a tenant when no
//! authoritative resolver did and strict mode is off.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::config::TenancyConfig;
use crate::errors::{ResolutionDiagnostics, ResolverDiagnostic, TenancyError, TenancyResult};
use crate::events::{noop_sink, EventSink, TenancyEvent};
use crate::registry::TenantRegistry;
use crate::request::RequestDescriptor;
use crate::tenant::Tenant;

use super::{
    Attempt, DomainResolver, FixedResolver, HeaderResolver, PathResolver, QueryResolver,
    StampResolver, SubdomainResolver, TenantResolver,
};

/// The tenant the chain settled on.
#[derive(Debug, Clone)]
pub struct ResolvedTenant {
    pub tenant: Tenant,
    /// First resolver in precedence order that produced the tenant.
    pub resolver: String,
    /// Every attempt made, in precedence order.
    pub attempts: Vec<(String, Attempt)>,
}

impl ResolvedTenant {
    pub fn is_fallback(&self, chain: &ChainResolver) -> bool {
        chain.is_exempt(&self.resolver)
    }
}

/// Builder for [`ChainResolver`]. Validation happens in [`build`](Self::build).
#[derive(Default)]
pub struct ChainResolverBuilder {
    resolvers: Vec<(String, Arc<dyn TenantResolver>)>,
    order: Option<Vec<String>>,
    exempt: Vec<String>,
    strict: bool,
    events: Option<Arc<dyn EventSink>>,
}

impl ChainResolverBuilder {
    /// Register a strategy under a unique name. Re-registering replaces it.
    pub fn register(mut self, name: impl Into<String>, resolver: Arc<dyn TenantResolver>) -> Self {
        let name = name.into();
        if let Some(slot) = self.resolvers.iter_mut().find(|(n, _)| *n == name) {
            slot.1 = resolver;
        } else {
            self.resolvers.push((name, resolver));
        }
        self
    }

    /// Precedence order. Defaults to registration order.
    pub fn order<I, S>(mut self, order: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.order = Some(order.into_iter().map(Into::into).collect());
        self
    }

    /// Exclude a resolver from the ambiguity check.
    pub fn exempt(mut self, name: impl Into<String>) -> Self {
        self.exempt.push(name.into());
        self
    }

    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    pub fn events(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn build(self) -> TenancyResult<ChainResolver> {
        let requested = self
            .order
            .unwrap_or_else(|| self.resolvers.iter().map(|(n, _)| n.clone()).collect());

        let mut seen = HashSet::new();
        let mut chain = Vec::with_capacity(requested.len());
        for name in requested {
            if !seen.insert(name.clone()) {
                continue;
            }
            let resolver = self
                .resolvers
                .iter()
                .find(|(n, _)| *n == name)
                .map(|(_, r)| Arc::clone(r))
                .ok_or_else(|| TenancyError::MissingRegistration { name: name.clone() })?;
            chain.push((name, resolver));
        }

        let mut exempt = HashSet::new();
        for name in self.exempt {
            if !self.resolvers.iter().any(|(n, _)| *n == name) {
                return Err(TenancyError::MissingRegistration { name });
            }
            exempt.insert(name);
        }

        Ok(ChainResolver {
            chain,
            exempt,
            strict: self.strict,
            events: self.events.unwrap_or_else(noop_sink),
        })
    }
}

/// Ordered set of named strategies combined into one decision.
pub struct ChainResolver {
    chain: Vec<(String, Arc<dyn TenantResolver>)>,
    exempt: HashSet<String>,
    strict: bool,
    events: Arc<dyn EventSink>,
}

impl std::fmt::Debug for ChainResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChainResolver")
            .field("order", &self.order())
            .field("exempt", &self.exempt)
            .field("strict", &self.strict)
            .finish()
    }
}

impl ChainResolver {
    pub fn builder() -> ChainResolverBuilder {
        ChainResolverBuilder::default()
    }

    /// Wire the standard strategies from configuration.
    ///
    /// Only the resolvers named in `config.resolvers` are built, so a
    /// subdomain resolver without a base domain is a configuration error
    /// only when it is actually requested.
    pub fn from_config(
        config: &TenancyConfig,
        registry: Arc<dyn TenantRegistry>,
        events: Arc<dyn EventSink>,
    ) -> TenancyResult<Self> {
        let mut builder = Self::builder()
            .strict(config.strict_mode)
            .events(events)
            .order(config.resolvers.clone());

        for name in &config.resolvers {
            let resolver: Arc<dyn TenantResolver> = match name.as_str() {
                "header" => Arc::new(
                    HeaderResolver::new(Arc::clone(&registry))
                        .with_header(&config.header.name)
                        .with_allowed(&config.header.allowed),
                ),
                "subdomain" => {
                    let base = config.subdomain.base_domain.as_deref().ok_or_else(|| {
                        TenancyError::invalid_config(
                            "tenancy.subdomain.base_domain",
                            "required by the subdomain resolver",
                        )
                    })?;
                    Arc::new(
                        SubdomainResolver::new(Arc::clone(&registry), base)
                            .with_reserved(&config.subdomain.reserved),
                    )
                }
                "path" => Arc::new(
                    PathResolver::new(Arc::clone(&registry))
                        .with_excluded(config.path.excluded.iter().cloned()),
                ),
                "domain" => Arc::new(
                    DomainResolver::new(Arc::clone(&registry))
                        .with_domains(config.domains.iter().map(|(h, s)| (h.as_str(), s.clone()))),
                ),
                "query" => Arc::new(
                    QueryResolver::new(Arc::clone(&registry)).with_param(&config.query.param),
                ),
                "stamp" => Arc::new(StampResolver::new(Arc::clone(&registry))),
                "default" => {
                    let slug = config.default_tenant.as_deref().ok_or_else(|| {
                        TenancyError::invalid_config(
                            "tenancy.default_tenant",
                            "required by the default resolver",
                        )
                    })?;
                    Arc::new(FixedResolver::new(Arc::clone(&registry), slug))
                }
                other => {
                    return Err(TenancyError::MissingRegistration {
                        name: other.to_string(),
                    })
                }
            };
            builder = builder.register(name.clone(), resolver);
        }

        for name in &config.exempt {
            builder = builder.exempt(name.clone());
        }

        builder.build()
    }

    /// Resolver names in precedence order.
    pub fn order(&self) -> Vec<&str> {
        self.chain.iter().map(|(n, _)| n.as_str()).collect()
    }

    pub fn is_strict(&self) -> bool {
        self.strict
    }

    pub fn is_exempt(&self, name: &str) -> bool {
        self.exempt.contains(name)
    }

    pub fn events(&self) -> &Arc<dyn EventSink> {
        &self.events
    }

    /// Decide the tenant for `request`.
    ///
    /// - `Ok(Some(_))`: a tenant, attributed to its first producer
    /// - `Ok(None)`: nobody proposed a tenant and strict mode is off
    /// - `Err(Ambiguous)`: authoritative resolvers disagree
    /// - `Err(ResolutionFailed)`: strict mode and no authoritative tenant
    pub fn resolve(&self, request: &RequestDescriptor) -> TenancyResult<Option<ResolvedTenant>> {
        let attempts: Vec<(String, Attempt)> = self
            .chain
            .iter()
            .map(|(name, resolver)| {
                let attempt = resolver.resolve(request, self.events.as_ref());
                if let Attempt::Abstained(a) = &attempt {
                    debug!(resolver = %name, reason = %a.reason, detail = ?a.detail, "resolver abstained");
                }
                (name.clone(), attempt)
            })
            .collect();

        let authoritative: Vec<(&String, &Tenant)> = attempts
            .iter()
            .filter(|(name, _)| !self.is_exempt(name))
            .filter_map(|(name, attempt)| attempt.tenant().map(|t| (name, t)))
            .collect();

        if let Some((first_name, first)) = authoritative.first() {
            if authoritative.iter().any(|(_, t)| !t.same_as(first)) {
                let conflicts: Vec<(String, Tenant)> = authoritative
                    .iter()
                    .map(|(n, t)| ((*n).clone(), (*t).clone()))
                    .collect();
                warn!(
                    conflicts = %conflicts
                        .iter()
                        .map(|(n, t)| format!("{n}={}", t.id()))
                        .collect::<Vec<_>>()
                        .join(","),
                    "ambiguous tenant resolution"
                );
                self.events.emit(&TenancyEvent::ResolutionFailed {
                    resolver: "chain".to_string(),
                    reason: "ambiguous".to_string(),
                    context: None,
                });
                return Err(TenancyError::Ambiguous { conflicts });
            }

            let resolver = (*first_name).clone();
            let tenant = (*first).clone();
            return Ok(Some(self.settle(resolver, tenant, attempts)));
        }

        let fallback = if self.strict {
            None
        } else {
            attempts
                .iter()
                .filter(|(name, _)| self.is_exempt(name))
                .find_map(|(name, attempt)| attempt.tenant().map(|t| (name.clone(), t.clone())))
        };

        if let Some((resolver, tenant)) = fallback {
            return Ok(Some(self.settle(resolver, tenant, attempts)));
        }

        for (name, attempt) in &attempts {
            if let Attempt::Abstained(a) = attempt {
                self.events.emit(&TenancyEvent::ResolutionFailed {
                    resolver: name.clone(),
                    reason: a.reason.as_str().to_string(),
                    context: a.detail.clone(),
                });
            }
        }

        if self.strict {
            return Err(TenancyError::ResolutionFailed {
                diagnostics: diagnostics(&attempts),
            });
        }

        debug!(tried = attempts.len(), "no tenant resolved");
        Ok(None)
    }

    fn settle(&self, resolver: String, tenant: Tenant, attempts: Vec<(String, Attempt)>) -> ResolvedTenant {
        self.events.emit(&TenancyEvent::TenantResolved {
            resolver: resolver.clone(),
            tenant_id: tenant.id().clone(),
        });
        ResolvedTenant {
            tenant,
            resolver,
            attempts,
        }
    }
}

fn diagnostics(attempts: &[(String, Attempt)]) -> ResolutionDiagnostics {
    ResolutionDiagnostics {
        resolvers_tried: attempts.iter().map(|(n, _)| n.clone()).collect(),
        failures: attempts
            .iter()
            .filter_map(|(name, attempt)| match attempt {
                Attempt::Abstained(a) => Some(ResolverDiagnostic {
                    resolver: name.clone(),
                    reason: a.reason,
                    detail: a.detail.clone(),
                }),
                Attempt::Resolved(_) => None,
            })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::RecordingEventSink;
    use crate::resolver::AbstainReason;

    struct Always(Option<Tenant>);

    impl TenantResolver for Always {
        fn resolve(&self, _request: &RequestDescriptor, _events: &dyn EventSink) -> Attempt {
            match &self.0 {
                Some(t) => Attempt::Resolved(t.clone()),
                None => Attempt::abstain(AbstainReason::MissingSignal),
            }
        }
    }

    fn yes(slug: &str) -> Arc<dyn TenantResolver> {
        Arc::new(Always(Some(Tenant::new(slug, slug))))
    }

    fn no() -> Arc<dyn TenantResolver> {
        Arc::new(Always(None))
    }

    #[test]
    fn unknown_order_entry_is_a_missing_registration() {
        let err = ChainResolver::builder()
            .register("header", no())
            .order(["header", "jwt"])
            .build()
            .unwrap_err();
        assert!(matches!(err, TenancyError::MissingRegistration { ref name } if name == "jwt"));
    }

    #[test]
    fn unknown_exempt_entry_is_a_missing_registration() {
        let err = ChainResolver::builder()
            .register("header", no())
            .exempt("default")
            .build()
            .unwrap_err();
        assert!(matches!(err, TenancyError::MissingRegistration { ref name } if name == "default"));
    }

    #[test]
    fn duplicate_order_entries_collapse() {
        let chain = ChainResolver::builder()
            .register("a", no())
            .register("b", no())
            .order(["b", "a", "b"])
            .build()
            .unwrap();
        assert_eq!(chain.order(), vec!["b", "a"]);
    }

    #[test]
    fn registration_order_is_default_precedence() {
        let chain = ChainResolver::builder()
            .register("path", yes("acme"))
            .register("header", yes("acme"))
            .build()
            .unwrap();

        let resolved = chain.resolve(&RequestDescriptor::new()).unwrap().unwrap();
        assert_eq!(resolved.resolver, "path");
        assert_eq!(resolved.attempts.len(), 2);
    }

    #[test]
    fn exempt_fallback_is_ignored_in_strict_mode() {
        let sink = Arc::new(RecordingEventSink::new());
        let chain = ChainResolver::builder()
            .register("header", no())
            .register("default", yes("main"))
            .exempt("default")
            .strict(true)
            .events(sink.clone())
            .build()
            .unwrap();

        let err = chain.resolve(&RequestDescriptor::new()).unwrap_err();
        let TenancyError::ResolutionFailed { diagnostics } = err else {
            panic!("expected ResolutionFailed");
        };
        assert_eq!(diagnostics.resolvers_tried, vec!["header", "default"]);
        assert_eq!(diagnostics.failures.len(), 1);
        assert_eq!(sink.kinds(), vec!["tenant.resolution_failed"]);
    }

    #[test]
    fn exempt_resolver_never_conflicts() {
        let chain = ChainResolver::builder()
            .register("header", yes("acme"))
            .register("default", yes("main"))
            .exempt("default")
            .build()
            .unwrap();

        let resolved = chain.resolve(&RequestDescriptor::new()).unwrap().unwrap();
        assert_eq!(resolved.tenant.slug(), "acme");
        assert!(!resolved.is_fallback(&chain));
    }
}
