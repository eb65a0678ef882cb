//! Request-scoped tenant context.
//!
//! A [`TenantContext`] belongs to exactly one unit of work: one HTTP request,
//! one queued message, one console invocation. It is a plain value owned by
//! that unit of work, never a process-wide global, so concurrent requests
//! cannot observe each other's tenant.

use std::sync::Arc;

use tracing::Span;

use crate::events::{noop_sink, EventSink, TenancyEvent};
use crate::tenant::{Tenant, TenantId};

/// Holds at most one current tenant and reports lifecycle transitions.
///
/// Invariant: `has_tenant() == tenant().is_some()`.
pub struct TenantContext {
    current: Option<Tenant>,
    events: Arc<dyn EventSink>,
}

impl Default for TenantContext {
    fn default() -> Self {
        Self::detached()
    }
}

impl std::fmt::Debug for TenantContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TenantContext")
            .field("current", &self.current)
            .finish_non_exhaustive()
    }
}

impl TenantContext {
    pub fn new(events: Arc<dyn EventSink>) -> Self {
        Self {
            current: None,
            events,
        }
    }

    /// A context with no event sink attached.
    pub fn detached() -> Self {
        Self::new(noop_sink())
    }

    /// Make `tenant` current.
    ///
    /// Switching to a different tenant emits `ContextEnded` for the previous
    /// one before `ContextStarted` for the new one. Setting the tenant that
    /// is already current is a no-op.
    pub fn set_tenant(&mut self, tenant: Tenant) {
        if let Some(previous) = &self.current {
            if previous.same_as(&tenant) {
                self.current = Some(tenant);
                return;
            }
            self.events.emit(&TenancyEvent::ContextEnded {
                tenant_id: previous.id().clone(),
            });
        }

        self.events.emit(&TenancyEvent::ContextStarted {
            tenant_id: tenant.id().clone(),
        });
        self.current = Some(tenant);
    }

    pub fn tenant(&self) -> Option<&Tenant> {
        self.current.as_ref()
    }

    pub fn tenant_id(&self) -> Option<&TenantId> {
        self.current.as_ref().map(|t| t.id())
    }

    pub fn has_tenant(&self) -> bool {
        self.current.is_some()
    }

    /// Drop the current tenant, emitting `ContextEnded` if there was one.
    pub fn clear(&mut self) {
        if let Some(previous) = self.current.take() {
            self.events.emit(&TenancyEvent::ContextEnded {
                tenant_id: previous.id().clone(),
            });
        }
    }

    /// Run `f` with `tenant` current, then clear the context.
    pub fn scope<T>(&mut self, tenant: Tenant, f: impl FnOnce(&TenantContext) -> T) -> T {
        self.set_tenant(tenant);
        let out = f(self);
        self.clear();
        out
    }

    pub fn events(&self) -> &Arc<dyn EventSink> {
        &self.events
    }

    /// A read-only copy for collaborators of the same unit of work.
    ///
    /// The copy holds the same tenant but reports nothing: the lifecycle
    /// events stay with the owning context.
    pub fn snapshot(&self) -> TenantContext {
        Self {
            current: self.current.clone(),
            events: noop_sink(),
        }
    }
}

/// Span tagging every log record inside it with the current tenant.
///
/// Without a tenant the fields stay empty, so central (tenant-less) work is
/// still distinguishable in the logs.
pub fn tenant_span(ctx: &TenantContext) -> Span {
    let span = tracing::info_span!(
        "tenant",
        tenant_id = tracing::field::Empty,
        tenant_slug = tracing::field::Empty
    );
    if let Some(tenant) = ctx.tenant() {
        span.record("tenant_id", tracing::field::display(tenant.id()));
        span.record("tenant_slug", tenant.slug());
    }
    span
}
