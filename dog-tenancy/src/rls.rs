//! PostgreSQL row-level security session management.
//!
//! Policies read the current tenant from a session variable
//! (`current_setting('app.current_tenant')`). [`RlsSessionConfigurator`]
//! sets it when a tenant becomes current and resets it when the context is
//! cleared.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

use crate::config::{is_valid_session_variable, RlsConfig, DEFAULT_RLS_VARIABLE};
use crate::context::TenantContext;
use crate::errors::{TenancyError, TenancyResult};
use crate::events::{ApplyStatus, EventSink, TenancyEvent};
use crate::tenant::TenantId;

/// Executes raw SQL on the connection the request will use.
#[async_trait]
pub trait SqlExecutor: Send + Sync {
    async fn execute(&self, sql: &str) -> Result<()>;
}

pub struct RlsSessionConfigurator<E> {
    executor: Arc<E>,
    variable: String,
    events: Arc<dyn EventSink>,
}

impl<E: SqlExecutor> RlsSessionConfigurator<E> {
    pub fn new(executor: Arc<E>, events: Arc<dyn EventSink>) -> Self {
        Self {
            executor,
            variable: DEFAULT_RLS_VARIABLE.to_string(),
            events,
        }
    }

    /// `None` when `tenancy.rls.enabled` is off.
    pub fn from_config(
        config: &RlsConfig,
        executor: Arc<E>,
        events: Arc<dyn EventSink>,
    ) -> TenancyResult<Option<Self>> {
        if !config.enabled {
            tracing::debug!("RLS session variable disabled");
            return Ok(None);
        }
        Self::new(executor, events)
            .with_variable(config.variable.clone())
            .map(Some)
    }

    /// Use a different session variable.
    ///
    /// The name is interpolated into SQL, so only `schema.name` identifiers are accepted.
    pub fn with_variable(mut self, variable: impl Into<String>) -> TenancyResult<Self> {
        let variable = variable.into();
        if !is_valid_session_variable(&variable) {
            return Err(TenancyError::invalid_config(
                "tenancy.rls.variable",
                format!("'{variable}' is not a valid session variable name"),
            ));
        }
        self.variable = variable;
        Ok(self)
    }

    pub fn variable(&self) -> &str {
        &self.variable
    }

    pub fn set_statement(&self, id: &TenantId) -> String {
        let value = id.to_string().replace('\'', "''");
        format!("SELECT set_config('{}', '{value}', false)", self.variable)
    }

    pub fn reset_statement(&self) -> String {
        format!("RESET {}", self.variable)
    }

    /// Bind the session to `id`.
    pub async fn apply(&self, id: &TenantId) -> TenancyResult<()> {
        let result = self.executor.execute(&self.set_statement(id)).await;
        let status = if result.is_ok() {
            ApplyStatus::Success
        } else {
            ApplyStatus::Failure
        };
        self.events.emit(&TenancyEvent::RlsApplied {
            tenant_id: id.clone(),
            status,
        });

        result.map_err(|source| {
            tracing::error!(tenant_id = %id, error = %source, "failed to set RLS session variable");
            TenancyError::Rls { source }
        })
    }

    /// Unbind the session.
    pub async fn reset(&self) -> TenancyResult<()> {
        self.executor
            .execute(&self.reset_statement())
            .await
            .map_err(|source| TenancyError::Rls { source })
    }

    /// Follow the context: bind its tenant, or unbind when it has none.
    pub async fn sync(&self, ctx: &TenantContext) -> TenancyResult<()> {
        match ctx.tenant_id() {
            Some(id) => self.apply(id).await,
            None => self.reset().await,
        }
    }
}
