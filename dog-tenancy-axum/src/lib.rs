//! dog-tenancy-axum: Axum adapter for dog-tenancy.
//!
//! ```ignore
//! let state = TenancyState::from_config(&config, registry, events)?;
//! let app = Router::new()
//!     .route("/orders", get(list_orders))
//!     .with_tenancy(state);
//!
//! async fn list_orders(RequiredTenant(tenant): RequiredTenant) -> String {
//!     format!("orders for {}", tenant.slug())
//! }
//! ```

pub mod descriptor;
pub mod extract;
pub mod middleware;
pub mod router;
pub mod state;
mod error;

pub use descriptor::descriptor_from_parts;
pub use error::TenancyRejection;
pub use extract::{CurrentContext, CurrentTenant, RequiredTenant};
pub use middleware::tenancy_middleware;
pub use router::{listen, TenancyRouterExt, UuidRequestId};
pub use state::TenancyState;

pub use axum;
