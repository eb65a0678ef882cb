//! Row-level tenant filtering for query builders.

use crate::context::TenantContext;
use crate::tenant::TenantId;

/// Marker for entities whose rows belong to one tenant.
pub trait TenantOwned {
    /// Column holding the owning tenant's id.
    const TENANT_COLUMN: &'static str = "tenant_id";
}

/// Builds the `WHERE` fragment restricting a query to the current tenant.
#[derive(Debug, Clone, Default)]
pub struct TenantRowFilter {
    column_override: Option<String>,
}

impl TenantRowFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use `column` instead of the entity's declared tenant column.
    pub fn with_column(mut self, column: impl Into<String>) -> Self {
        self.column_override = Some(column.into());
        self
    }

    /// Constraint for a tenant-owned entity aliased as `alias`.
    ///
    /// Returns an empty string when no tenant is current (central queries
    /// see every row).
    pub fn constraint_for<E: TenantOwned>(&self, ctx: &TenantContext, alias: &str) -> String {
        let column = self
            .column_override
            .as_deref()
            .unwrap_or(E::TENANT_COLUMN);
        self.constraint(ctx, alias, Some(column))
    }

    /// Constraint for an entity described at runtime; `None` means the
    /// entity is not tenant-owned.
    pub fn constraint(&self, ctx: &TenantContext, alias: &str, column: Option<&str>) -> String {
        let (Some(id), Some(column)) = (ctx.tenant_id(), column) else {
            return String::new();
        };
        format!("{alias}.{column} = {}", sql_literal(id))
    }
}

fn sql_literal(id: &TenantId) -> String {
    match id {
        TenantId::Int(n) => n.to_string(),
        TenantId::Str(s) => format!("'{}'", s.replace('\'', "''")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tenant::Tenant;

    struct Invoice;
    impl TenantOwned for Invoice {}

    struct Document;
    impl TenantOwned for Document {
        const TENANT_COLUMN: &'static str = "org_id";
    }

    fn ctx_with(id: impl Into<TenantId>) -> TenantContext {
        let mut ctx = TenantContext::detached();
        ctx.set_tenant(Tenant::new(id, "acme"));
        ctx
    }

    #[test]
    fn integer_ids_are_unquoted() {
        let filter = TenantRowFilter::new();
        assert_eq!(
            filter.constraint_for::<Invoice>(&ctx_with(7), "i"),
            "i.tenant_id = 7"
        );
        assert_eq!(
            filter.constraint_for::<Document>(&ctx_with(7), "d"),
            "d.org_id = 7"
        );
    }

    #[test]
    fn string_ids_are_quoted_and_escaped() {
        let filter = TenantRowFilter::new().with_column("owner");
        assert_eq!(
            filter.constraint_for::<Invoice>(&ctx_with("o'brien"), "i"),
            "i.owner = 'o''brien'"
        );
    }

    #[test]
    fn empty_without_tenant_or_ownership() {
        let filter = TenantRowFilter::new();
        assert_eq!(
            filter.constraint_for::<Invoice>(&TenantContext::detached(), "i"),
            ""
        );
        assert_eq!(filter.constraint(&ctx_with(1), "x", None), "");
    }
}
