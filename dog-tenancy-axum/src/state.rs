use std::sync::Arc;

use dog_tenancy::{ChainResolver, EventSink, TenancyConfig, TenancyResult, TenantRegistry};

/// Shared state for the tenancy middleware.
#[derive(Clone)]
pub struct TenancyState {
    pub chain: Arc<ChainResolver>,
    pub events: Arc<dyn EventSink>,
    /// Attach resolver diagnostics to error bodies. Off in production.
    pub expose_diagnostics: bool,
}

impl TenancyState {
    /// State around an already built chain; uses the chain's event sink.
    pub fn new(chain: ChainResolver) -> Self {
        let events = Arc::clone(chain.events());
        Self {
            chain: Arc::new(chain),
            events,
            expose_diagnostics: false,
        }
    }

    pub fn from_config(
        config: &TenancyConfig,
        registry: Arc<dyn TenantRegistry>,
        events: Arc<dyn EventSink>,
    ) -> TenancyResult<Self> {
        let chain = ChainResolver::from_config(config, registry, Arc::clone(&events))?;
        Ok(Self {
            chain: Arc::new(chain),
            events,
            expose_diagnostics: config.expose_diagnostics(),
        })
    }

    pub fn with_expose_diagnostics(mut self, expose: bool) -> Self {
        self.expose_diagnostics = expose;
        self
    }
}
