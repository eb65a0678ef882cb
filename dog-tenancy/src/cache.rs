//! Tenant-aware cache key prefixing.
//!
//! [`TenantAwareCache`] decorates any [`CachePool`] so that every key is
//! namespaced by the current tenant: `acme`'s `user:1` and `globex`'s
//! `user:1` never collide. Without a tenant keys land in the shared
//! `central` namespace.
//!
//! Tenant ids are written with a type tag and a length
//! (`tenant.s4.acme:user:1`, `tenant.i1.7:user:1`), so no id, separator or
//! key can produce a key that starts with another namespace's prefix.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use parking_lot::RwLock;

use crate::config::CacheConfig;
use crate::context::TenantContext;
use crate::tenant::TenantId;

/// Minimal cache pool contract. Values are opaque bytes.
#[async_trait]
pub trait CachePool: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    async fn set(&self, key: &str, value: Vec<u8>) -> Result<()>;

    async fn delete(&self, key: &str) -> Result<bool>;

    /// Delete every key starting with `prefix`; returns how many went away.
    async fn delete_prefix(&self, prefix: &str) -> Result<usize>;

    async fn clear(&self) -> Result<()>;
}

/// Prefix used for a tenant's keys.
pub fn tenant_prefix(id: &TenantId, separator: &str) -> String {
    let (tag, raw) = match id {
        TenantId::Int(n) => ('i', n.to_string()),
        TenantId::Str(s) => ('s', s.clone()),
    };
    format!("tenant.{tag}{}.{raw}{separator}", raw.len())
}

/// Prefix used for keys written without a tenant.
pub fn central_prefix(separator: &str) -> String {
    format!("central{separator}")
}

pub struct TenantAwareCache<C> {
    inner: Arc<C>,
    separator: String,
}

impl<C> Clone for TenantAwareCache<C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            separator: self.separator.clone(),
        }
    }
}

impl<C: CachePool> TenantAwareCache<C> {
    pub fn new(inner: Arc<C>) -> Self {
        Self {
            inner,
            separator: ":".to_string(),
        }
    }

    pub fn from_config(inner: Arc<C>, config: &CacheConfig) -> Self {
        Self::new(inner).with_separator(config.separator.clone())
    }

    pub fn with_separator(mut self, separator: impl Into<String>) -> Self {
        self.separator = separator.into();
        self
    }

    pub fn inner(&self) -> &Arc<C> {
        &self.inner
    }

    fn prefix(&self, ctx: &TenantContext) -> String {
        match ctx.tenant_id() {
            Some(id) => tenant_prefix(id, &self.separator),
            None => central_prefix(&self.separator),
        }
    }

    /// The key actually stored in the inner pool.
    pub fn scoped_key(&self, ctx: &TenantContext, key: &str) -> String {
        format!("{}{key}", self.prefix(ctx))
    }

    pub async fn get(&self, ctx: &TenantContext, key: &str) -> Result<Option<Vec<u8>>> {
        self.inner.get(&self.scoped_key(ctx, key)).await
    }

    pub async fn set(&self, ctx: &TenantContext, key: &str, value: Vec<u8>) -> Result<()> {
        self.inner.set(&self.scoped_key(ctx, key), value).await
    }

    pub async fn delete(&self, ctx: &TenantContext, key: &str) -> Result<bool> {
        self.inner.delete(&self.scoped_key(ctx, key)).await
    }

    /// Clear the current namespace only: the tenant's, or `central` without one.
    pub async fn clear_tenant(&self, ctx: &TenantContext) -> Result<usize> {
        let removed = self.inner.delete_prefix(&self.prefix(ctx)).await?;
        match ctx.tenant_id() {
            Some(id) => tracing::debug!(tenant_id = %id, removed, "tenant cache namespace cleared"),
            None => tracing::debug!(removed, "central cache namespace cleared"),
        }
        Ok(removed)
    }
}

/// Process-local cache pool.
#[derive(Default)]
pub struct InMemoryCachePool {
    entries: RwLock<HashMap<String, Vec<u8>>>,
}

impl InMemoryCachePool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.entries.read().keys().cloned().collect();
        keys.sort();
        keys
    }
}

#[async_trait]
impl CachePool for InMemoryCachePool {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.entries.read().get(key).cloned())
    }

    async fn set(&self, key: &str, value: Vec<u8>) -> Result<()> {
        self.entries.write().insert(key.to_string(), value);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        Ok(self.entries.write().remove(key).is_some())
    }

    async fn delete_prefix(&self, prefix: &str) -> Result<usize> {
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|k, _| !k.starts_with(prefix));
        Ok(before - entries.len())
    }

    async fn clear(&self) -> Result<()> {
        self.entries.write().clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tenant::Tenant;

    fn ctx_for(id: impl Into<TenantId>, slug: &str) -> TenantContext {
        let mut ctx = TenantContext::detached();
        ctx.set_tenant(Tenant::new(id, slug));
        ctx
    }

    #[tokio::test]
    async fn tenants_do_not_share_keys() {
        let pool = Arc::new(InMemoryCachePool::new());
        let cache = TenantAwareCache::new(pool.clone());
        let acme = ctx_for(1, "acme");
        let globex = ctx_for(2, "globex");

        cache.set(&acme, "user:1", b"a".to_vec()).await.unwrap();
        cache.set(&globex, "user:1", b"g".to_vec()).await.unwrap();

        assert_eq!(cache.get(&acme, "user:1").await.unwrap(), Some(b"a".to_vec()));
        assert_eq!(cache.get(&globex, "user:1").await.unwrap(), Some(b"g".to_vec()));
        assert_eq!(pool.keys(), vec!["tenant.i1.1:user:1", "tenant.i1.2:user:1"]);
    }

    #[tokio::test]
    async fn without_tenant_keys_go_to_central() {
        let pool = Arc::new(InMemoryCachePool::new());
        let cache = TenantAwareCache::new(pool.clone()).with_separator("|");
        let central = TenantContext::detached();

        cache.set(&central, "settings", b"x".to_vec()).await.unwrap();
        assert_eq!(pool.keys(), vec!["central|settings"]);
        assert_eq!(cache.scoped_key(&ctx_for("acme", "acme"), "k"), "tenant.s4.acme|k");
    }

    #[tokio::test]
    async fn clear_only_touches_current_tenant() {
        let pool = Arc::new(InMemoryCachePool::new());
        let cache = TenantAwareCache::new(pool.clone());
        let acme = ctx_for(1, "acme");
        let globex = ctx_for(2, "globex");
        let central = TenantContext::detached();

        cache.set(&acme, "a", vec![1]).await.unwrap();
        cache.set(&acme, "b", vec![2]).await.unwrap();
        cache.set(&globex, "a", vec![3]).await.unwrap();
        cache.set(&central, "a", vec![4]).await.unwrap();

        assert_eq!(cache.clear_tenant(&acme).await.unwrap(), 2);
        assert_eq!(pool.keys(), vec!["central:a", "tenant.i1.2:a"]);

        assert_eq!(cache.clear_tenant(&central).await.unwrap(), 1);
        assert_eq!(pool.keys(), vec!["tenant.i1.2:a"]);
    }

    #[tokio::test]
    async fn separator_inside_a_tenant_id_cannot_reach_another_tenant() {
        let pool = Arc::new(InMemoryCachePool::new());
        let cache = TenantAwareCache::new(pool.clone());
        let a = ctx_for("a", "a");
        let a_b = ctx_for("a:b", "a-b");

        cache.set(&a, "b:secret", b"tenant-a".to_vec()).await.unwrap();
        assert_eq!(cache.get(&a_b, "secret").await.unwrap(), None);

        cache.set(&a_b, "secret", b"tenant-a-b".to_vec()).await.unwrap();
        assert_eq!(cache.clear_tenant(&a).await.unwrap(), 1);
        assert_eq!(
            cache.get(&a_b, "secret").await.unwrap(),
            Some(b"tenant-a-b".to_vec())
        );
    }

    #[tokio::test]
    async fn central_keys_cannot_name_tenant_keys() {
        let pool = Arc::new(InMemoryCachePool::new());
        let cache = TenantAwareCache::new(pool.clone());
        let acme = ctx_for(1, "acme");
        let central = TenantContext::detached();

        cache.set(&acme, "user:1", b"private".to_vec()).await.unwrap();
        let stored = cache.scoped_key(&acme, "user:1");

        assert_eq!(cache.get(&central, &stored).await.unwrap(), None);
        assert!(cache.scoped_key(&central, &stored).starts_with("central:"));
    }

    #[tokio::test]
    async fn integer_and_string_ids_have_separate_namespaces() {
        let pool = Arc::new(InMemoryCachePool::new());
        let cache = TenantAwareCache::new(pool.clone());
        let by_int = ctx_for(1, "one");
        let by_str = ctx_for("1", "uno");

        cache.set(&by_int, "k", b"int".to_vec()).await.unwrap();
        assert_eq!(cache.get(&by_str, "k").await.unwrap(), None);
        assert_ne!(
            tenant_prefix(&TenantId::Int(1), ":"),
            tenant_prefix(&TenantId::Str("1".into()), ":")
        );
    }
}
