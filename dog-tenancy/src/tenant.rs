//! Core multi-tenant types for DogRS.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Opaque tenant identity.
///
/// Registries hand out either numeric keys (SQL sequences) or string keys
/// (UUIDs, ULIDs, slugs). Two tenants are the same tenant when their ids are
/// equal by value, regardless of which registry call produced them.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TenantId {
    Int(i64),
    Str(String),
}

impl TenantId {
    /// Parse a raw identity coming from the outside world (headers, stamps).
    ///
    /// Anything that parses as an `i64` becomes `Int`, the rest stays a string.
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        match raw.parse::<i64>() {
            Ok(n) => TenantId::Int(n),
            Err(_) => TenantId::Str(raw.to_string()),
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, TenantId::Int(_))
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TenantId::Int(n) => write!(f, "{n}"),
            TenantId::Str(s) => f.write_str(s),
        }
    }
}

impl From<i64> for TenantId {
    fn from(value: i64) -> Self {
        TenantId::Int(value)
    }
}

impl From<&str> for TenantId {
    fn from(value: &str) -> Self {
        TenantId::Str(value.to_string())
    }
}

impl From<String> for TenantId {
    fn from(value: String) -> Self {
        TenantId::Str(value)
    }
}

/// Connection parameters for tenants living in their own database.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseParams {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub dbname: Option<String>,
    pub user: Option<String>,
    #[serde(skip_serializing)]
    pub password: Option<String>,
}

/// Per-tenant configuration overrides.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantSettings {
    pub mailer_dsn: Option<String>,
    pub messenger_dsn: Option<String>,
    pub database: Option<DatabaseParams>,
    #[serde(default)]
    pub extra: HashMap<String, String>,
}

#[derive(Debug, PartialEq, Eq)]
struct TenantInner {
    id: TenantId,
    slug: String,
    settings: TenantSettings,
}

/// A tenant as handed out by a [`TenantRegistry`](crate::TenantRegistry).
///
/// Immutable for the duration of a request and cheap to clone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tenant {
    inner: Arc<TenantInner>,
}

impl Tenant {
    pub fn new(id: impl Into<TenantId>, slug: impl Into<String>) -> Self {
        Self::with_settings(id, slug, TenantSettings::default())
    }

    pub fn with_settings(
        id: impl Into<TenantId>,
        slug: impl Into<String>,
        settings: TenantSettings,
    ) -> Self {
        Self {
            inner: Arc::new(TenantInner {
                id: id.into(),
                slug: slug.into(),
                settings,
            }),
        }
    }

    pub fn id(&self) -> &TenantId {
        &self.inner.id
    }

    pub fn slug(&self) -> &str {
        &self.inner.slug
    }

    pub fn settings(&self) -> &TenantSettings {
        &self.inner.settings
    }

    /// Same logical tenant, compared by identifier value.
    pub fn same_as(&self, other: &Tenant) -> bool {
        self.inner.id == other.inner.id
    }
}

impl fmt::Display for Tenant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.inner.slug, self.inner.id)
    }
}

impl Serialize for Tenant {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeStruct;
        let mut s = serializer.serialize_struct("Tenant", 2)?;
        s.serialize_field("id", &self.inner.id)?;
        s.serialize_field("slug", &self.inner.slug)?;
        s.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_prefers_integers() {
        assert_eq!(TenantId::parse("42"), TenantId::Int(42));
        assert_eq!(TenantId::parse(" acme "), TenantId::Str("acme".into()));
    }

    #[test]
    fn same_as_compares_by_id_not_instance() {
        let a = Tenant::new(7, "acme");
        let b = Tenant::new(7, "acme-renamed");
        let c = Tenant::new(8, "acme");
        assert!(a.same_as(&b));
        assert!(!a.same_as(&c));
    }

    #[test]
    fn serializes_id_and_slug_only() {
        let t = Tenant::new("t-1", "acme");
        let v = serde_json::to_value(&t).unwrap();
        assert_eq!(v, serde_json::json!({"id": "t-1", "slug": "acme"}));
    }
}
