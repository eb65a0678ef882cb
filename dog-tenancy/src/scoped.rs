//! Per-tenant service instances.
//!
//! Some services hold tenant-specific state (a connection pool pointed at the
//! tenant's database, a configured mailer). [`TenantScopedServices`] builds
//! one instance per tenant on first use and keeps it until it is invalidated.
//!
//! Attached as an [`EventSink`], it drops the previous tenant's instance when
//! a context starts for a different tenant. That suits workers handling one
//! tenant at a time (message consumers, the per-tenant runner). Servers
//! interleaving tenants should call [`invalidate`](TenantScopedServices::invalidate)
//! explicitly instead, for example when a tenant's settings change.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use crate::context::TenantContext;
use crate::errors::{TenancyError, TenancyResult};
use crate::events::{EventSink, TenancyEvent};
use crate::tenant::{Tenant, TenantId};

type Factory<T> = dyn Fn(&Tenant) -> T + Send + Sync;

pub struct TenantScopedServices<T> {
    factory: Box<Factory<T>>,
    instances: RwLock<HashMap<TenantId, Arc<T>>>,
    last_started: Mutex<Option<TenantId>>,
}

impl<T: Send + Sync> TenantScopedServices<T> {
    pub fn new(factory: impl Fn(&Tenant) -> T + Send + Sync + 'static) -> Self {
        Self {
            factory: Box::new(factory),
            instances: RwLock::new(HashMap::new()),
            last_started: Mutex::new(None),
        }
    }

    /// Instance for `tenant`, built on first access.
    ///
    /// The factory runs without any lock held. When two callers race, the
    /// first instance stored wins and the other is dropped.
    pub fn get_or_init(&self, tenant: &Tenant) -> Arc<T> {
        if let Some(existing) = self.instances.read().get(tenant.id()) {
            return Arc::clone(existing);
        }

        tracing::debug!(tenant_id = %tenant.id(), "building tenant-scoped service");
        let built = Arc::new((self.factory)(tenant));
        let mut instances = self.instances.write();
        Arc::clone(instances.entry(tenant.id().clone()).or_insert(built))
    }

    /// Instance for the context's current tenant.
    pub fn current(&self, ctx: &TenantContext) -> TenancyResult<Arc<T>> {
        let tenant = ctx.tenant().ok_or(TenancyError::TenantRequired {
            operation: "tenant-scoped service lookup",
        })?;
        Ok(self.get_or_init(tenant))
    }

    pub fn invalidate(&self, id: &TenantId) -> bool {
        self.instances.write().remove(id).is_some()
    }

    pub fn invalidate_all(&self) {
        self.instances.write().clear();
    }

    pub fn len(&self) -> usize {
        self.instances.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.read().is_empty()
    }
}

impl<T: Send + Sync> EventSink for TenantScopedServices<T> {
    fn emit(&self, event: &TenancyEvent) {
        if let TenancyEvent::ContextStarted { tenant_id } = event {
            let previous = self.last_started.lock().replace(tenant_id.clone());
            if let Some(previous) = previous.filter(|p| p != tenant_id) {
                self.invalidate(&previous);
            }
        }
    }
}
