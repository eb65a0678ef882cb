//! Tenancy counters.
//!
//! Metric names and label sets are a contract with dashboards and alerts:
//!
//! - `tenant_resolution_total{resolver,status,reason}` (`reason` is empty on success)
//! - `tenant_rls_apply_total{status}`
//! - `tenant_header_rejected_total{header}`
//! - `tenant_contexts_active`
//!
//! [`TenancyMetrics`] is an [`EventSink`]; attach it (usually through a
//! [`FanoutEventSink`](crate::FanoutEventSink)) and it counts as events flow.

use prometheus::{IntCounterVec, IntGauge, Opts, Registry, TextEncoder};

use crate::events::{EventSink, TenancyEvent};

pub const RESOLUTION_TOTAL: &str = "tenant_resolution_total";
pub const RLS_APPLY_TOTAL: &str = "tenant_rls_apply_total";
pub const HEADER_REJECTED_TOTAL: &str = "tenant_header_rejected_total";
pub const CONTEXTS_ACTIVE: &str = "tenant_contexts_active";

/// Prometheus collectors for tenant resolution, RLS and header rejections.
#[derive(Clone)]
pub struct TenancyMetrics {
    registry: Registry,
    resolutions: IntCounterVec,
    rls_applies: IntCounterVec,
    header_rejections: IntCounterVec,
    contexts_active: IntGauge,
}

impl TenancyMetrics {
    /// Collectors registered in a fresh registry.
    pub fn new() -> prometheus::Result<Self> {
        Self::with_registry(Registry::new())
    }

    /// Register the collectors in the application's registry.
    pub fn with_registry(registry: Registry) -> prometheus::Result<Self> {
        let resolutions = IntCounterVec::new(
            Opts::new(RESOLUTION_TOTAL, "Tenant resolution attempts"),
            &["resolver", "status", "reason"],
        )?;
        let rls_applies = IntCounterVec::new(
            Opts::new(RLS_APPLY_TOTAL, "RLS session variable applications"),
            &["status"],
        )?;
        let header_rejections = IntCounterVec::new(
            Opts::new(HEADER_REJECTED_TOTAL, "Tenant headers outside the allow-list"),
            &["header"],
        )?;
        let contexts_active = IntGauge::new(CONTEXTS_ACTIVE, "Tenant contexts currently open")?;

        registry.register(Box::new(resolutions.clone()))?;
        registry.register(Box::new(rls_applies.clone()))?;
        registry.register(Box::new(header_rejections.clone()))?;
        registry.register(Box::new(contexts_active.clone()))?;

        Ok(Self {
            registry,
            resolutions,
            rls_applies,
            header_rejections,
            contexts_active,
        })
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Current value of a counter series.
    ///
    /// Labels are matched as a set; labels with an empty value count as absent.
    pub fn counter(&self, name: &str, labels: &[(&str, &str)]) -> u64 {
        self.registry
            .gather()
            .iter()
            .filter(|family| family.get_name() == name)
            .flat_map(|family| family.get_metric().iter())
            .find(|metric| {
                let pairs: Vec<_> = metric
                    .get_label()
                    .iter()
                    .filter(|pair| !pair.get_value().is_empty())
                    .collect();
                pairs.len() == labels.len()
                    && labels.iter().all(|(k, v)| {
                        pairs
                            .iter()
                            .any(|pair| pair.get_name() == *k && pair.get_value() == *v)
                    })
            })
            .map(|metric| metric.get_counter().get_value() as u64)
            .unwrap_or(0)
    }

    /// Sum of a counter family over every label set.
    pub fn total(&self, name: &str) -> u64 {
        self.registry
            .gather()
            .iter()
            .filter(|family| family.get_name() == name)
            .flat_map(|family| family.get_metric().iter())
            .map(|metric| metric.get_counter().get_value() as u64)
            .sum()
    }

    /// Contexts started but not yet ended.
    pub fn contexts_active(&self) -> i64 {
        self.contexts_active.get()
    }

    /// Prometheus text exposition format.
    pub fn render_prometheus(&self) -> prometheus::Result<String> {
        TextEncoder::new().encode_to_string(&self.registry.gather())
    }
}

impl EventSink for TenancyMetrics {
    fn emit(&self, event: &TenancyEvent) {
        match event {
            TenancyEvent::TenantResolved { resolver, .. } => self
                .resolutions
                .with_label_values(&[resolver.as_str(), "success", ""])
                .inc(),
            TenancyEvent::ResolutionFailed {
                resolver, reason, ..
            } => self
                .resolutions
                .with_label_values(&[resolver.as_str(), "failure", reason.as_str()])
                .inc(),
            TenancyEvent::HeaderRejected { header } => self
                .header_rejections
                .with_label_values(&[header.as_str()])
                .inc(),
            TenancyEvent::RlsApplied { status, .. } => self
                .rls_applies
                .with_label_values(&[status.as_str()])
                .inc(),
            TenancyEvent::ContextStarted { .. } => self.contexts_active.inc(),
            TenancyEvent::ContextEnded { .. } => self.contexts_active.dec(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::ApplyStatus;
    use crate::tenant::TenantId;

    #[test]
    fn counts_by_label_set() {
        let m = TenancyMetrics::new().unwrap();
        for _ in 0..2 {
            m.emit(&TenancyEvent::TenantResolved {
                resolver: "header".into(),
                tenant_id: TenantId::Int(1),
            });
        }
        m.emit(&TenancyEvent::ResolutionFailed {
            resolver: "path".into(),
            reason: "unknown_tenant".into(),
            context: Some("x".into()),
        });
        m.emit(&TenancyEvent::RlsApplied {
            tenant_id: TenantId::Int(1),
            status: ApplyStatus::Failure,
        });
        m.emit(&TenancyEvent::HeaderRejected {
            header: "x-org".into(),
        });

        assert_eq!(
            m.counter(RESOLUTION_TOTAL, &[("resolver", "header"), ("status", "success")]),
            2
        );
        assert_eq!(
            m.counter(
                RESOLUTION_TOTAL,
                &[("status", "failure"), ("resolver", "path"), ("reason", "unknown_tenant")]
            ),
            1
        );
        assert_eq!(m.total(RESOLUTION_TOTAL), 3);
        assert_eq!(m.counter(RLS_APPLY_TOTAL, &[("status", "failure")]), 1);
        assert_eq!(m.counter(HEADER_REJECTED_TOTAL, &[("header", "x-org")]), 1);
        assert_eq!(m.counter(HEADER_REJECTED_TOTAL, &[("header", "x-other")]), 0);
    }

    #[test]
    fn tracks_active_contexts() {
        let m = TenancyMetrics::new().unwrap();
        m.emit(&TenancyEvent::ContextStarted {
            tenant_id: TenantId::Int(1),
        });
        m.emit(&TenancyEvent::ContextStarted {
            tenant_id: TenantId::Int(2),
        });
        m.emit(&TenancyEvent::ContextEnded {
            tenant_id: TenantId::Int(1),
        });
        assert_eq!(m.contexts_active(), 1);
    }

    #[test]
    fn renders_prometheus_text() {
        let m = TenancyMetrics::new().unwrap();
        m.emit(&TenancyEvent::HeaderRejected {
            header: "x-\"evil\"".into(),
        });
        let text = m.render_prometheus().unwrap();
        assert!(text.contains("# TYPE tenant_header_rejected_total counter"));
        assert!(text.contains("tenant_header_rejected_total{header=\"x-\\\"evil\\\"\"} 1"));
    }

    #[test]
    fn shares_an_application_registry() {
        let registry = Registry::new();
        let m = TenancyMetrics::with_registry(registry.clone()).unwrap();
        m.emit(&TenancyEvent::RlsApplied {
            tenant_id: TenantId::Int(1),
            status: ApplyStatus::Success,
        });

        assert!(registry
            .gather()
            .iter()
            .any(|family| family.get_name() == RLS_APPLY_TOTAL));
        assert!(TenancyMetrics::with_registry(registry).is_err());
    }
}
