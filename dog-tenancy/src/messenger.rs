//! Tenant propagation across message queues.
//!
//! A message dispatched while a tenant is current is stamped with that
//! tenant's id. The consuming worker re-resolves the tenant from the stamp,
//! so the handler runs in the same tenant as the code that enqueued it.

use std::future::Future;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::context::TenantContext;
use crate::errors::{ResolutionDiagnostics, ResolverDiagnostic, TenancyError, TenancyResult};
use crate::events::TenancyEvent;
use crate::registry::TenantRegistry;
use crate::request::RequestDescriptor;
use crate::resolver::{Attempt, StampResolver, TenantResolver};
use crate::tenant::{Tenant, TenantId};

const STAMP_RESOLVER: &str = "stamp";

/// Tenant identity attached to a queued message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantStamp {
    pub tenant_id: TenantId,
}

impl TenantStamp {
    pub fn new(tenant_id: impl Into<TenantId>) -> Self {
        Self {
            tenant_id: tenant_id.into(),
        }
    }
}

/// A message plus the stamps travelling with it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope<M> {
    pub message: M,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant: Option<TenantStamp>,
}

impl<M> Envelope<M> {
    pub fn new(message: M) -> Self {
        Self {
            message,
            tenant: None,
        }
    }

    pub fn with_stamp(mut self, stamp: TenantStamp) -> Self {
        self.tenant = Some(stamp);
        self
    }

    pub fn stamp(&self) -> Option<&TenantStamp> {
        self.tenant.as_ref()
    }

    pub fn into_message(self) -> M {
        self.message
    }
}

/// Wrap `message`, stamping it with the current tenant if there is one.
///
/// Messages dispatched from central (tenant-less) code stay unstamped.
pub fn stamp_outbound<M>(ctx: &TenantContext, message: M) -> Envelope<M> {
    let envelope = Envelope::new(message);
    match ctx.tenant_id() {
        Some(id) => envelope.with_stamp(TenantStamp::new(id.clone())),
        None => envelope,
    }
}

/// Restores the stamped tenant around message handling.
pub struct TenantWorker {
    resolver: StampResolver,
}

impl TenantWorker {
    pub fn new(registry: Arc<dyn TenantRegistry>) -> Self {
        Self {
            resolver: StampResolver::new(registry),
        }
    }

    /// Tenant the envelope belongs to, `None` for unstamped messages.
    ///
    /// A stamp naming a tenant the registry no longer knows is an error: the
    /// message must not silently run as central work.
    pub fn tenant_for<M>(
        &self,
        envelope: &Envelope<M>,
        ctx: &TenantContext,
    ) -> TenancyResult<Option<Tenant>> {
        let Some(stamp) = envelope.stamp() else {
            return Ok(None);
        };

        let request = RequestDescriptor::new().with_stamp(stamp.clone());
        let events = ctx.events();
        match self.resolver.resolve(&request, events.as_ref()) {
            Attempt::Resolved(tenant) => {
                events.emit(&TenancyEvent::TenantResolved {
                    resolver: STAMP_RESOLVER.to_string(),
                    tenant_id: tenant.id().clone(),
                });
                Ok(Some(tenant))
            }
            Attempt::Abstained(abstention) => {
                events.emit(&TenancyEvent::ResolutionFailed {
                    resolver: STAMP_RESOLVER.to_string(),
                    reason: abstention.reason.as_str().to_string(),
                    context: abstention.detail.clone(),
                });
                tracing::warn!(
                    tenant_id = %stamp.tenant_id,
                    "stamped tenant is not registered"
                );
                Err(TenancyError::ResolutionFailed {
                    diagnostics: ResolutionDiagnostics {
                        resolvers_tried: vec![STAMP_RESOLVER.to_string()],
                        failures: vec![ResolverDiagnostic {
                            resolver: STAMP_RESOLVER.to_string(),
                            reason: abstention.reason,
                            detail: abstention.detail,
                        }],
                    },
                })
            }
        }
    }

    /// Run `handler` with the stamped tenant current.
    ///
    /// The context is cleared before the message is looked at, so a reused
    /// context never leaks the previous message's tenant into an unstamped
    /// one, and cleared again afterwards whatever the handler returned.
    pub fn handle<M, T>(
        &self,
        envelope: Envelope<M>,
        ctx: &mut TenantContext,
        handler: impl FnOnce(M, &TenantContext) -> T,
    ) -> TenancyResult<T> {
        ctx.clear();
        let tenant = self.tenant_for(&envelope, ctx)?;
        if let Some(tenant) = tenant {
            ctx.set_tenant(tenant);
        }
        let out = handler(envelope.into_message(), ctx);
        ctx.clear();
        Ok(out)
    }

    /// Async flavour of [`handle`](Self::handle); the handler receives the
    /// resolved tenant by value.
    pub async fn handle_async<M, T, F, Fut>(
        &self,
        envelope: Envelope<M>,
        ctx: &mut TenantContext,
        handler: F,
    ) -> TenancyResult<T>
    where
        F: FnOnce(M, Option<Tenant>) -> Fut,
        Fut: Future<Output = T>,
    {
        ctx.clear();
        let tenant = self.tenant_for(&envelope, ctx)?;
        if let Some(tenant) = &tenant {
            ctx.set_tenant(tenant.clone());
        }
        let out = handler(envelope.into_message(), tenant).await;
        ctx.clear();
        Ok(out)
    }
}
