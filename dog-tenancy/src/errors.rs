//! # Errors
//!
//! Tenancy errors are a closed `thiserror` enum. Resolution problems
//! (`Ambiguous`, `ResolutionFailed`) are kept apart because transports react
//! to them differently: HTTP answers 400, a worker may drop the message, a
//! console command may abort.
//!
//! Like DogRS service errors they carry Feathers-style metadata
//! (`name`, `code`, `className`) so a transport can serialize them without
//! knowing every variant.

use serde::Serialize;
use serde_json::{json, Value};
use thiserror::Error;

use crate::resolver::AbstainReason;
use crate::tenant::Tenant;

/// A convenience result type for tenancy APIs.
pub type TenancyResult<T> = std::result::Result<T, TenancyError>;

/// Why a single resolver did not produce a tenant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolverDiagnostic {
    pub resolver: String,
    pub reason: AbstainReason,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// What the chain tried before giving up.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ResolutionDiagnostics {
    pub resolvers_tried: Vec<String>,
    pub failures: Vec<ResolverDiagnostic>,
}

#[derive(Debug, Error)]
pub enum TenancyError {
    /// Two or more non-exempt resolvers disagree on the tenant.
    #[error("ambiguous tenant resolution: {}", describe_conflicts(.conflicts))]
    Ambiguous { conflicts: Vec<(String, Tenant)> },

    /// Strict mode is on and no resolver produced a tenant.
    #[error("tenant could not be resolved (tried: {})", .diagnostics.resolvers_tried.join(", "))]
    ResolutionFailed { diagnostics: ResolutionDiagnostics },

    /// A precedence entry names a resolver that was never registered.
    #[error("resolver '{name}' is listed in the resolution order but not registered")]
    MissingRegistration { name: String },

    #[error("invalid tenancy configuration for '{key}': {message}")]
    InvalidConfig { key: String, message: String },

    /// An operation needs a tenant but the context is empty.
    #[error("{operation} requires a tenant in context")]
    TenantRequired { operation: &'static str },

    #[error("invalid storage path '{path}': {message}")]
    InvalidPath { path: String, message: String },

    #[error("failed to apply row-level security session: {source}")]
    Rls {
        #[source]
        source: anyhow::Error,
    },
}

fn describe_conflicts(conflicts: &[(String, Tenant)]) -> String {
    conflicts
        .iter()
        .map(|(name, tenant)| format!("{name}={}", tenant.id()))
        .collect::<Vec<_>>()
        .join(", ")
}

impl TenancyError {
    pub fn invalid_config(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            key: key.into(),
            message: message.into(),
        }
    }

    pub fn invalid_path(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidPath {
            path: path.into(),
            message: message.into(),
        }
    }

    /// True for errors caused by the inbound request rather than by setup.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::Ambiguous { .. } | Self::ResolutionFailed { .. } | Self::TenantRequired { .. }
        )
    }

    pub fn status_code(&self) -> u16 {
        if self.is_client_error() {
            400
        } else {
            500
        }
    }

    /// Feathers error `name`.
    pub fn name(&self) -> &'static str {
        if self.is_client_error() {
            "BadRequest"
        } else {
            "GeneralError"
        }
    }

    /// Feathers error `className`.
    pub fn class_name(&self) -> &'static str {
        if self.is_client_error() {
            "bad-request"
        } else {
            "general-error"
        }
    }

    /// Machine-readable discriminator, stable across releases.
    pub fn reason(&self) -> &'static str {
        match self {
            Self::Ambiguous { .. } => "ambiguous",
            Self::ResolutionFailed { .. } => "unresolved",
            Self::MissingRegistration { .. } => "missing_registration",
            Self::InvalidConfig { .. } => "invalid_config",
            Self::TenantRequired { .. } => "tenant_required",
            Self::InvalidPath { .. } => "invalid_path",
            Self::Rls { .. } => "rls",
        }
    }

    /// Resolution details, only meaningful for the two resolution errors.
    pub fn diagnostics(&self) -> Option<Value> {
        match self {
            Self::Ambiguous { conflicts } => {
                let map: serde_json::Map<String, Value> = conflicts
                    .iter()
                    .map(|(name, tenant)| (name.clone(), json!(tenant)))
                    .collect();
                Some(json!({ "conflicts": map }))
            }
            Self::ResolutionFailed { diagnostics } => serde_json::to_value(diagnostics).ok(),
            _ => None,
        }
    }

    /// Feathers-ish JSON payload.
    ///
    /// Server-side errors never leak their message; diagnostics are attached
    /// only when the caller allows it (non-production environments).
    pub fn to_json(&self, include_diagnostics: bool) -> Value {
        let message = if self.is_client_error() {
            self.to_string()
        } else {
            "Tenancy is misconfigured".to_string()
        };

        let mut base = json!({
            "name": self.name(),
            "message": message,
            "code": self.status_code(),
            "className": self.class_name(),
            "reason": self.reason(),
        });

        if include_diagnostics {
            if let Some(d) = self.diagnostics() {
                base["data"] = d;
            }
        }
        base
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ambiguous() -> TenancyError {
        TenancyError::Ambiguous {
            conflicts: vec![
                ("header".into(), Tenant::new("acme", "acme")),
                ("subdomain".into(), Tenant::new("globex", "globex")),
            ],
        }
    }

    #[test]
    fn ambiguous_is_a_client_error_with_conflict_map() {
        let err = ambiguous();
        assert_eq!(err.status_code(), 400);
        assert_eq!(
            err.to_string(),
            "ambiguous tenant resolution: header=acme, subdomain=globex"
        );

        let body = err.to_json(true);
        assert_eq!(body["className"], "bad-request");
        assert_eq!(body["data"]["conflicts"]["subdomain"]["slug"], "globex");
    }

    #[test]
    fn diagnostics_are_hidden_on_request() {
        let body = ambiguous().to_json(false);
        assert!(body.get("data").is_none());
        assert_eq!(body["reason"], "ambiguous");
    }

    #[test]
    fn server_errors_do_not_leak_details() {
        let err = TenancyError::MissingRegistration {
            name: "jwt".into(),
        };
        assert_eq!(err.status_code(), 500);
        let body = err.to_json(true);
        assert_eq!(body["message"], "Tenancy is misconfigured");
        assert!(body.get("data").is_none());
    }
}
