//! Typed tenancy lifecycle events.
//!
//! Everything the tenancy core reports goes through an [`EventSink`]. The set
//! of events is closed: consumers match on [`TenancyEvent`] exhaustively and
//! the compiler tells them when a new kind shows up.
//!
//! Emission is best-effort. A sink must never fail the unit of work, so
//! `emit` returns nothing; the [`NoopEventSink`] null object is what callers
//! wire up when they do not care.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;

use crate::tenant::TenantId;

/// Outcome label used by RLS and metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ApplyStatus {
    Success,
    Failure,
}

impl ApplyStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApplyStatus::Success => "success",
            ApplyStatus::Failure => "failure",
        }
    }
}

impl fmt::Display for ApplyStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TenancyEvent {
    /// The chain settled on a tenant.
    TenantResolved { resolver: String, tenant_id: TenantId },

    /// A resolver (or the chain itself) could not produce a tenant.
    ResolutionFailed {
        resolver: String,
        reason: String,
        context: Option<String>,
    },

    ContextStarted { tenant_id: TenantId },

    ContextEnded { tenant_id: TenantId },

    /// A tenant header carried a value but its name is not allow-listed.
    HeaderRejected { header: String },

    RlsApplied { tenant_id: TenantId, status: ApplyStatus },
}

impl TenancyEvent {
    /// Stable event name, used as the log message and in audit trails.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::TenantResolved { .. } => "tenant.resolved",
            Self::ResolutionFailed { .. } => "tenant.resolution_failed",
            Self::ContextStarted { .. } => "tenant.context_started",
            Self::ContextEnded { .. } => "tenant.context_ended",
            Self::HeaderRejected { .. } => "tenant.header_rejected",
            Self::RlsApplied { .. } => "tenant.rls_applied",
        }
    }

    /// Flat `(key, value)` view of the payload.
    pub fn fields(&self) -> Vec<(&'static str, String)> {
        match self {
            Self::TenantResolved { resolver, tenant_id } => vec![
                ("resolver", resolver.clone()),
                ("tenant_id", tenant_id.to_string()),
            ],
            Self::ResolutionFailed {
                resolver,
                reason,
                context,
            } => {
                let mut fields = vec![("resolver", resolver.clone()), ("reason", reason.clone())];
                if let Some(context) = context {
                    fields.push(("context", context.clone()));
                }
                fields
            }
            Self::ContextStarted { tenant_id } | Self::ContextEnded { tenant_id } => {
                vec![("tenant_id", tenant_id.to_string())]
            }
            Self::HeaderRejected { header } => vec![("header", header.clone())],
            Self::RlsApplied { tenant_id, status } => vec![
                ("tenant_id", tenant_id.to_string()),
                ("status", status.as_str().to_string()),
            ],
        }
    }
}

/// Receiver of tenancy events.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: &TenancyEvent);
}

impl<S: EventSink + ?Sized> EventSink for Arc<S> {
    fn emit(&self, event: &TenancyEvent) {
        (**self).emit(event)
    }
}

/// Swallows every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopEventSink;

impl EventSink for NoopEventSink {
    fn emit(&self, _event: &TenancyEvent) {}
}

/// Convenience for the common "no sink attached" case.
pub fn noop_sink() -> Arc<dyn EventSink> {
    Arc::new(NoopEventSink)
}

/// Writes every event as a structured `tracing` record.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingEventSink;

impl EventSink for TracingEventSink {
    fn emit(&self, event: &TenancyEvent) {
        match event {
            TenancyEvent::TenantResolved { resolver, tenant_id } => {
                tracing::info!(%resolver, %tenant_id, "tenant.resolved");
            }
            TenancyEvent::ResolutionFailed {
                resolver,
                reason,
                context,
            } => {
                tracing::debug!(%resolver, %reason, context = ?context, "tenant.resolution_failed");
            }
            TenancyEvent::ContextStarted { tenant_id } => {
                tracing::debug!(%tenant_id, "tenant.context_started");
            }
            TenancyEvent::ContextEnded { tenant_id } => {
                tracing::debug!(%tenant_id, "tenant.context_ended");
            }
            TenancyEvent::HeaderRejected { header } => {
                tracing::warn!(%header, "tenant.header_rejected");
            }
            TenancyEvent::RlsApplied { tenant_id, status } => match status {
                ApplyStatus::Success => tracing::debug!(%tenant_id, %status, "tenant.rls_applied"),
                ApplyStatus::Failure => tracing::error!(%tenant_id, %status, "tenant.rls_applied"),
            },
        }
    }
}

/// Keeps every event in memory, in emission order.
#[derive(Debug, Default)]
pub struct RecordingEventSink {
    events: Mutex<Vec<TenancyEvent>>,
}

impl RecordingEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<TenancyEvent> {
        self.events.lock().clone()
    }

    pub fn kinds(&self) -> Vec<&'static str> {
        self.events.lock().iter().map(|e| e.kind()).collect()
    }

    pub fn take(&self) -> Vec<TenancyEvent> {
        std::mem::take(&mut *self.events.lock())
    }

    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

impl EventSink for RecordingEventSink {
    fn emit(&self, event: &TenancyEvent) {
        self.events.lock().push(event.clone());
    }
}

/// Broadcasts each event to several sinks, in registration order.
#[derive(Default, Clone)]
pub struct FanoutEventSink {
    sinks: Vec<Arc<dyn EventSink>>,
}

impl FanoutEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn push(&mut self, sink: Arc<dyn EventSink>) {
        self.sinks.push(sink);
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

impl EventSink for FanoutEventSink {
    fn emit(&self, event: &TenancyEvent) {
        for sink in &self.sinks {
            sink.emit(event);
        }
    }
}
