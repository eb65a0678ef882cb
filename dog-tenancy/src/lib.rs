//! dog-tenancy: framework-agnostic multi-tenancy for DogRS.
//!
//! A request (or queued message, or console run) is turned into a
//! [`RequestDescriptor`], a [`ChainResolver`] asks its strategies which
//! tenant it belongs to, and the answer lives in a [`TenantContext`] for the
//! duration of that unit of work. Downstream integrations (cache, row
//! filters, RLS, mailer, storage, messenger) read the context.

pub mod cache;
pub mod config;
pub mod context;
pub mod errors;
pub mod events;
pub mod filter;
pub mod mailer;
pub mod messenger;
#[cfg(feature = "metrics")]
pub mod metrics;
pub mod registry;
pub mod request;
pub mod resolver;
pub mod rls;
pub mod runner;
pub mod scoped;
pub mod storage;
pub mod tenant;

pub use cache::{CachePool, InMemoryCachePool, TenantAwareCache};
pub use config::{ConfigSnapshot, ConfigStore, TenancyConfig};
pub use context::{tenant_span, TenantContext};
pub use errors::{ResolutionDiagnostics, ResolverDiagnostic, TenancyError, TenancyResult};
pub use events::{
    noop_sink, ApplyStatus, EventSink, FanoutEventSink, NoopEventSink, RecordingEventSink,
    TenancyEvent, TracingEventSink,
};
pub use filter::{TenantOwned, TenantRowFilter};
pub use mailer::{MailerConfigurator, MailerSettings};
pub use messenger::{stamp_outbound, Envelope, TenantStamp, TenantWorker};
#[cfg(feature = "metrics")]
pub use metrics::TenancyMetrics;
pub use registry::{InMemoryTenantRegistry, TenantRegistry};
pub use request::RequestDescriptor;
pub use resolver::{
    AbstainReason, Abstention, Attempt, ChainResolver, ChainResolverBuilder, DomainResolver,
    FixedResolver, HeaderResolver, PathResolver, QueryResolver, ResolvedTenant, StampResolver,
    SubdomainResolver, TenantResolver,
};
pub use rls::{RlsSessionConfigurator, SqlExecutor};
pub use runner::{for_each_tenant, for_each_tenant_async, TenantRun};
pub use scoped::TenantScopedServices;
pub use storage::TenantStoragePath;
pub use tenant::{DatabaseParams, Tenant, TenantId, TenantSettings};
