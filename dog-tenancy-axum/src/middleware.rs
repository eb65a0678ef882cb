use std::sync::Arc;

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use dog_tenancy::{tenant_span, TenantContext};
use tracing::Instrument;

use crate::descriptor::descriptor_from_parts;
use crate::extract::{CurrentContext, CurrentTenant};
use crate::{TenancyRejection, TenancyState};

/// Resolve the tenant, run the handler with it current, then clear.
///
/// Handlers read the outcome through [`CurrentTenant`], [`RequiredTenant`](crate::RequiredTenant)
/// or [`CurrentContext`].
///
/// Install with `axum::middleware::from_fn_with_state(state, tenancy_middleware)`
/// or [`TenancyRouterExt::with_tenancy`](crate::TenancyRouterExt::with_tenancy).
pub async fn tenancy_middleware(
    State(state): State<TenancyState>,
    request: Request,
    next: Next,
) -> Response {
    let (mut parts, body) = request.into_parts();
    let descriptor = descriptor_from_parts(&parts);

    let resolved = match state.chain.resolve(&descriptor) {
        Ok(resolved) => resolved,
        Err(error) => {
            return TenancyRejection::new(error, state.expose_diagnostics).into_response();
        }
    };

    let mut ctx = TenantContext::new(state.events.clone());
    let tenant = resolved.map(|r| r.tenant);
    if let Some(tenant) = &tenant {
        ctx.set_tenant(tenant.clone());
    }
    parts.extensions.insert(CurrentTenant(tenant));
    parts
        .extensions
        .insert(CurrentContext(Arc::new(ctx.snapshot())));

    let span = tenant_span(&ctx);
    let response = next
        .run(Request::from_parts(parts, body))
        .instrument(span)
        .await;

    ctx.clear();
    response
}
