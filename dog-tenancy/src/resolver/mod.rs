//! Tenant resolution strategies.
//!
//! A strategy looks at one signal of a [`RequestDescriptor`] (a header, the
//! host, the path...) and either proposes a tenant or abstains. Strategies
//! never fail: not finding a tenant is an [`Abstention`], not an error. The
//! [`ChainResolver`] combines them.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;

use crate::events::EventSink;
use crate::registry::TenantRegistry;
use crate::request::RequestDescriptor;
use crate::tenant::{Tenant, TenantId};

pub mod chain;
pub mod domain;
pub mod fixed;
pub mod header;
pub mod path;
pub mod query;
pub mod stamp;
pub mod subdomain;

pub use chain::{ChainResolver, ChainResolverBuilder, ResolvedTenant};
pub use domain::DomainResolver;
pub use fixed::FixedResolver;
pub use header::HeaderResolver;
pub use path::PathResolver;
pub use query::QueryResolver;
pub use stamp::StampResolver;
pub use subdomain::SubdomainResolver;

/// Low-cardinality reason code for an abstention. Used as a metrics label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AbstainReason {
    /// The request does not carry the signal this strategy reads.
    MissingSignal,
    /// The signal was present but no tenant matches it.
    UnknownTenant,
    /// The signal was present but malformed.
    InvalidFormat,
    /// The tenant header is not on the allow-list.
    HeaderRejected,
    /// The signal names a reserved value (`www`, `api`...).
    Reserved,
}

impl AbstainReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            AbstainReason::MissingSignal => "missing_signal",
            AbstainReason::UnknownTenant => "unknown_tenant",
            AbstainReason::InvalidFormat => "invalid_format",
            AbstainReason::HeaderRejected => "header_rejected",
            AbstainReason::Reserved => "reserved",
        }
    }
}

impl fmt::Display for AbstainReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Abstention {
    pub reason: AbstainReason,
    pub detail: Option<String>,
}

impl Abstention {
    pub fn new(reason: AbstainReason) -> Self {
        Self {
            reason,
            detail: None,
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

/// What a single strategy made of the request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Attempt {
    Resolved(Tenant),
    Abstained(Abstention),
}

impl Attempt {
    pub fn abstain(reason: AbstainReason) -> Self {
        Attempt::Abstained(Abstention::new(reason))
    }

    pub fn abstain_with(reason: AbstainReason, detail: impl Into<String>) -> Self {
        Attempt::Abstained(Abstention::new(reason).with_detail(detail))
    }

    pub fn tenant(&self) -> Option<&Tenant> {
        match self {
            Attempt::Resolved(t) => Some(t),
            Attempt::Abstained(_) => None,
        }
    }

    pub fn into_tenant(self) -> Option<Tenant> {
        match self {
            Attempt::Resolved(t) => Some(t),
            Attempt::Abstained(_) => None,
        }
    }
}

/// A single method of extracting a tenant from a request.
pub trait TenantResolver: Send + Sync {
    /// Inspect `request` and propose a tenant or abstain.
    ///
    /// The only side effect allowed is emitting observability events.
    fn resolve(&self, request: &RequestDescriptor, events: &dyn EventSink) -> Attempt;
}

impl<R: TenantResolver + ?Sized> TenantResolver for Arc<R> {
    fn resolve(&self, request: &RequestDescriptor, events: &dyn EventSink) -> Attempt {
        (**self).resolve(request, events)
    }
}

/// Look a raw signal value up by slug first, then by id.
pub(crate) fn lookup(registry: &dyn TenantRegistry, value: &str) -> Attempt {
    let value = value.trim();
    if value.is_empty() {
        return Attempt::abstain(AbstainReason::MissingSignal);
    }

    if let Some(tenant) = registry.find_by_slug(value) {
        return Attempt::Resolved(tenant);
    }
    if let Some(tenant) = registry.find_by_id(&TenantId::parse(value)) {
        return Attempt::Resolved(tenant);
    }

    Attempt::abstain_with(AbstainReason::UnknownTenant, value)
}

/// Slugs are restricted to DNS-label-ish characters.
pub(crate) fn is_valid_slug(value: &str) -> bool {
    !value.is_empty()
        && value.len() <= 63
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}
