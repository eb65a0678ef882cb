use std::collections::HashMap;

use parking_lot::RwLock;

use crate::tenant::{Tenant, TenantId};

/// Read path into wherever tenants are stored.
///
/// The tenancy core never mutates the registry. Lookups are synchronous:
/// implementations backed by a database are expected to keep a warm
/// in-process view and refresh it out of band.
pub trait TenantRegistry: Send + Sync {
    fn find_by_slug(&self, slug: &str) -> Option<Tenant>;

    fn find_by_id(&self, id: &TenantId) -> Option<Tenant>;

    fn all(&self) -> Vec<Tenant>;
}

/// A simple registry that keeps tenants in memory, keyed by id and slug.
#[derive(Default)]
pub struct InMemoryTenantRegistry {
    by_id: RwLock<HashMap<TenantId, Tenant>>,
    slugs: RwLock<HashMap<String, TenantId>>,
}

impl InMemoryTenantRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_tenants(tenants: impl IntoIterator<Item = Tenant>) -> Self {
        let registry = Self::new();
        for tenant in tenants {
            registry.insert(tenant);
        }
        registry
    }

    /// Register a tenant.
    ///
    /// Slugs are unique: a tenant already holding the slug under another id
    /// is evicted, as is any previous tenant with the same id.
    pub fn insert(&self, tenant: Tenant) {
        let mut by_id = self.by_id.write();
        let mut slugs = self.slugs.write();

        if let Some(previous) = by_id.get(tenant.id()) {
            if slugs.get(previous.slug()) == Some(previous.id()) {
                slugs.remove(previous.slug());
            }
        }
        if let Some(holder) = slugs.get(tenant.slug()).cloned() {
            if &holder != tenant.id() {
                tracing::warn!(slug = %tenant.slug(), evicted = %holder, "tenant slug reassigned");
                by_id.remove(&holder);
            }
        }

        slugs.insert(tenant.slug().to_string(), tenant.id().clone());
        by_id.insert(tenant.id().clone(), tenant);
    }

    pub fn remove(&self, id: &TenantId) -> Option<Tenant> {
        let removed = self.by_id.write().remove(id)?;
        let mut slugs = self.slugs.write();
        if slugs.get(removed.slug()) == Some(id) {
            slugs.remove(removed.slug());
        }
        Some(removed)
    }

    pub fn len(&self) -> usize {
        self.by_id.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.read().is_empty()
    }
}

impl TenantRegistry for InMemoryTenantRegistry {
    fn find_by_slug(&self, slug: &str) -> Option<Tenant> {
        let id = self.slugs.read().get(slug).cloned()?;
        self.by_id.read().get(&id).cloned()
    }

    fn find_by_id(&self, id: &TenantId) -> Option<Tenant> {
        self.by_id.read().get(id).cloned()
    }

    fn all(&self) -> Vec<Tenant> {
        let mut tenants: Vec<Tenant> = self.by_id.read().values().cloned().collect();
        tenants.sort_by(|a, b| a.id().cmp(b.id()));
        tenants
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookups_by_slug_and_id() {
        let registry = InMemoryTenantRegistry::from_tenants([
            Tenant::new(1, "acme"),
            Tenant::new(2, "globex"),
        ]);

        assert_eq!(registry.find_by_slug("globex").unwrap().id(), &TenantId::Int(2));
        assert_eq!(registry.find_by_id(&TenantId::Int(1)).unwrap().slug(), "acme");
        assert!(registry.find_by_slug("initech").is_none());
        assert_eq!(registry.all().len(), 2);
    }

    #[test]
    fn reinsert_drops_stale_slug() {
        let registry = InMemoryTenantRegistry::new();
        registry.insert(Tenant::new(1, "acme"));
        registry.insert(Tenant::new(1, "acme-corp"));

        assert!(registry.find_by_slug("acme").is_none());
        assert!(registry.find_by_slug("acme-corp").is_some());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn slug_takeover_evicts_previous_holder() {
        let registry = InMemoryTenantRegistry::new();
        registry.insert(Tenant::new(1, "acme"));
        registry.insert(Tenant::new(2, "acme"));

        assert_eq!(registry.find_by_slug("acme").unwrap().id(), &TenantId::Int(2));
        assert!(registry.find_by_id(&TenantId::Int(1)).is_none());
        assert_eq!(registry.len(), 1);

        assert!(registry.remove(&TenantId::Int(1)).is_none());
        assert_eq!(registry.find_by_slug("acme").unwrap().id(), &TenantId::Int(2));
    }

    #[test]
    fn remove_keeps_slug_owned_by_another_tenant() {
        let registry = InMemoryTenantRegistry::new();
        registry.insert(Tenant::new(1, "acme"));
        // Rename 1 away, then give its old slug to 2 before 1 leaves.
        registry.insert(Tenant::new(1, "acme-old"));
        registry.insert(Tenant::new(2, "acme"));
        registry.remove(&TenantId::Int(1));

        assert_eq!(registry.find_by_slug("acme").unwrap().id(), &TenantId::Int(2));
        assert!(registry.find_by_slug("acme-old").is_none());
    }
}
