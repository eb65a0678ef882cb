use std::ops::Deref;
use std::sync::Arc;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use dog_tenancy::{TenancyError, Tenant, TenantContext};

use crate::TenancyRejection;

/// The tenant resolved for this request, if any.
///
/// Inserted into request extensions by the tenancy middleware. Extracting it
/// on a route without the middleware is a server misconfiguration (500).
#[derive(Debug, Clone)]
pub struct CurrentTenant(pub Option<Tenant>);

/// Like [`CurrentTenant`] but answers 400 when no tenant was resolved.
#[derive(Debug, Clone)]
pub struct RequiredTenant(pub Tenant);

/// The request's tenant context, for collaborators that take `&TenantContext`
/// (cache, row filter, storage paths, mailer, outbound messages).
///
/// It is a read-only view of the context the middleware owns; the middleware
/// still ends it once the handler returns.
#[derive(Debug, Clone)]
pub struct CurrentContext(pub Arc<TenantContext>);

impl Deref for CurrentContext {
    type Target = TenantContext;

    fn deref(&self) -> &TenantContext {
        &self.0
    }
}

fn missing_middleware() -> TenancyRejection {
    TenancyError::invalid_config(
        "tenancy.middleware",
        "tenancy middleware is not installed on this route",
    )
    .into()
}

fn current(parts: &Parts) -> Result<CurrentTenant, TenancyRejection> {
    parts
        .extensions
        .get::<CurrentTenant>()
        .cloned()
        .ok_or_else(missing_middleware)
}

impl<S> FromRequestParts<S> for CurrentTenant
where
    S: Send + Sync,
{
    type Rejection = TenancyRejection;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        current(parts)
    }
}

impl<S> FromRequestParts<S> for RequiredTenant
where
    S: Send + Sync,
{
    type Rejection = TenancyRejection;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let CurrentTenant(tenant) = current(parts)?;
        tenant.map(RequiredTenant).ok_or_else(|| {
            TenancyError::TenantRequired {
                operation: "this endpoint",
            }
            .into()
        })
    }
}

impl<S> FromRequestParts<S> for CurrentContext
where
    S: Send + Sync,
{
    type Rejection = TenancyRejection;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CurrentContext>()
            .cloned()
            .ok_or_else(missing_middleware)
    }
}
