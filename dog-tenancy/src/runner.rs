//! Run a unit of work once per registered tenant.
//!
//! Used by maintenance commands (migrations, reindexing, reports) that must
//! visit every tenant. A failing tenant does not stop the run; each outcome
//! is reported.

use std::future::Future;

use crate::context::TenantContext;
use crate::registry::TenantRegistry;
use crate::tenant::Tenant;

/// Result of the work for one tenant.
#[derive(Debug)]
pub struct TenantRun<T> {
    pub tenant: Tenant,
    pub result: anyhow::Result<T>,
}

impl<T> TenantRun<T> {
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

/// Set each tenant in `ctx`, call `f`, then clear the context.
pub fn for_each_tenant<T>(
    registry: &dyn TenantRegistry,
    ctx: &mut TenantContext,
    mut f: impl FnMut(&TenantContext) -> anyhow::Result<T>,
) -> Vec<TenantRun<T>> {
    let mut runs = Vec::new();
    for tenant in registry.all() {
        let result = ctx.scope(tenant.clone(), |ctx| f(ctx));
        log_outcome(&tenant, &result);
        runs.push(TenantRun { tenant, result });
    }
    runs
}

/// Async flavour of [`for_each_tenant`]. Tenants are visited one at a time.
pub async fn for_each_tenant_async<T, F, Fut>(
    registry: &dyn TenantRegistry,
    ctx: &mut TenantContext,
    mut f: F,
) -> Vec<TenantRun<T>>
where
    F: FnMut(Tenant) -> Fut,
    Fut: Future<Output = anyhow::Result<T>>,
{
    let mut runs = Vec::new();
    for tenant in registry.all() {
        ctx.set_tenant(tenant.clone());
        let result = f(tenant.clone()).await;
        ctx.clear();
        log_outcome(&tenant, &result);
        runs.push(TenantRun { tenant, result });
    }
    runs
}

fn log_outcome<T>(tenant: &Tenant, result: &anyhow::Result<T>) {
    match result {
        Ok(_) => tracing::info!(tenant_id = %tenant.id(), tenant_slug = tenant.slug(), "tenant run finished"),
        Err(err) => tracing::error!(
            tenant_id = %tenant.id(),
            tenant_slug = tenant.slug(),
            error = %err,
            "tenant run failed"
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::RecordingEventSink;
    use crate::registry::InMemoryTenantRegistry;
    use std::sync::Arc;

    fn registry() -> InMemoryTenantRegistry {
        InMemoryTenantRegistry::from_tenants([
            Tenant::new(1, "acme"),
            Tenant::new(2, "globex"),
            Tenant::new(3, "initech"),
        ])
    }

    #[test]
    fn visits_every_tenant_and_keeps_going_on_failure() {
        let sink = Arc::new(RecordingEventSink::new());
        let mut ctx = TenantContext::new(sink.clone());

        let runs = for_each_tenant(&registry(), &mut ctx, |ctx| {
            let slug = ctx.tenant().map(|t| t.slug().to_string()).unwrap_or_default();
            if slug == "globex" {
                anyhow::bail!("boom");
            }
            Ok(slug)
        });

        let slugs: Vec<_> = runs.iter().map(|r| r.tenant.slug()).collect();
        assert_eq!(slugs, vec!["acme", "globex", "initech"]);
        assert_eq!(runs.iter().filter(|r| r.is_ok()).count(), 2);
        assert!(!ctx.has_tenant());
        assert_eq!(sink.events().len(), 6);
    }

    #[tokio::test]
    async fn async_runner_sets_context_per_tenant() {
        let mut ctx = TenantContext::detached();
        let runs = for_each_tenant_async(&registry(), &mut ctx, |tenant| async move {
            Ok::<_, anyhow::Error>(tenant.id().to_string())
        })
        .await;

        let ids: Vec<_> = runs
            .into_iter()
            .map(|r| r.result.unwrap())
            .collect();
        assert_eq!(ids, vec!["1", "2", "3"]);
        assert!(!ctx.has_tenant());
    }
}
