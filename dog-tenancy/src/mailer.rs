//! Per-tenant mail transport selection.

use serde::Serialize;

use crate::config::MailerConfig;
use crate::context::TenantContext;

/// Transport settings for the mail about to be sent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MailerSettings {
    pub dsn: Option<String>,
    /// Slug of the tenant the mail is sent for, `None` for central mail.
    pub tenant: Option<String>,
    /// `true` when the tenant brought its own DSN.
    pub tenant_transport: bool,
}

#[derive(Debug, Clone, Default)]
pub struct MailerConfigurator {
    default_dsn: Option<String>,
}

impl MailerConfigurator {
    pub fn new(default_dsn: Option<String>) -> Self {
        Self { default_dsn }
    }

    pub fn from_config(config: &MailerConfig) -> Self {
        Self::new(config.default_dsn.clone())
    }

    /// The current tenant's DSN if it has one, the default DSN otherwise.
    pub fn settings(&self, ctx: &TenantContext) -> MailerSettings {
        let Some(tenant) = ctx.tenant() else {
            return MailerSettings {
                dsn: self.default_dsn.clone(),
                tenant: None,
                tenant_transport: false,
            };
        };

        match &tenant.settings().mailer_dsn {
            Some(dsn) => MailerSettings {
                dsn: Some(dsn.clone()),
                tenant: Some(tenant.slug().to_string()),
                tenant_transport: true,
            },
            None => MailerSettings {
                dsn: self.default_dsn.clone(),
                tenant: Some(tenant.slug().to_string()),
                tenant_transport: false,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tenant::{Tenant, TenantSettings};

    #[test]
    fn tenant_dsn_wins_over_default() {
        let mailer = MailerConfigurator::new(Some("smtp://central".into()));
        let mut ctx = TenantContext::detached();
        ctx.set_tenant(Tenant::with_settings(
            1,
            "acme",
            TenantSettings {
                mailer_dsn: Some("smtp://acme".into()),
                ..Default::default()
            },
        ));

        let settings = mailer.settings(&ctx);
        assert_eq!(settings.dsn.as_deref(), Some("smtp://acme"));
        assert_eq!(settings.tenant.as_deref(), Some("acme"));
        assert!(settings.tenant_transport);
    }

    #[test]
    fn falls_back_to_default() {
        let mailer = MailerConfigurator::from_config(&MailerConfig {
            default_dsn: Some("smtp://central".into()),
        });
        let mut ctx = TenantContext::detached();
        assert_eq!(mailer.settings(&ctx).tenant, None);

        ctx.set_tenant(Tenant::new(2, "globex"));
        let settings = mailer.settings(&ctx);
        assert_eq!(settings.dsn.as_deref(), Some("smtp://central"));
        assert_eq!(settings.tenant.as_deref(), Some("globex"));
        assert!(!settings.tenant_transport);
    }
}
