use axum::http::{HeaderValue, Request};
use axum::Router;
use tokio::net::{TcpListener, ToSocketAddrs};
use tower::ServiceBuilder;
use tower_http::request_id::{MakeRequestId, PropagateRequestIdLayer, RequestId, SetRequestIdLayer};
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::middleware::tenancy_middleware;
use crate::TenancyState;

/// Generates `x-request-id` values for requests that arrive without one.
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidRequestId;

impl MakeRequestId for UuidRequestId {
    fn make_request_id<B>(&mut self, _request: &Request<B>) -> Option<RequestId> {
        HeaderValue::from_str(&Uuid::new_v4().to_string())
            .ok()
            .map(RequestId::new)
    }
}

pub trait TenancyRouterExt {
    /// Resolve tenants for every route of this router.
    ///
    /// Also installs request-id propagation and HTTP tracing around the
    /// tenancy middleware, so rejections carry an `x-request-id` too.
    fn with_tenancy(self, state: TenancyState) -> Self;
}

impl<S> TenancyRouterExt for Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    fn with_tenancy(self, state: TenancyState) -> Self {
        self.layer(axum::middleware::from_fn_with_state(state, tenancy_middleware))
            .layer(
                ServiceBuilder::new()
                    .layer(SetRequestIdLayer::x_request_id(UuidRequestId))
                    .layer(TraceLayer::new_for_http())
                    .layer(PropagateRequestIdLayer::x_request_id()),
            )
    }
}

/// Bind `addr` and serve `router` until the process stops.
pub async fn listen<A>(router: Router, addr: A) -> anyhow::Result<()>
where
    A: ToSocketAddrs,
{
    let listener = TcpListener::bind(addr).await?;
    let local = listener.local_addr()?;
    tracing::info!(addr = %local, "listening");
    axum::serve(listener, router).await?;
    Ok(())
}
