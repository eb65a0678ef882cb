//! # Tenancy configuration
//!
//! Configuration follows the DogRS convention: a flat string key/value
//! store (`app.set()` / `app.get()` in Feathers terms) that applications
//! fill however they like, plus a typed [`TenancyConfig`] parsed from it.
//!
//! ```rust
//! use dog_tenancy::{ConfigStore, TenancyConfig};
//!
//! let mut store = ConfigStore::new();
//! store.set("tenancy.resolvers", "header,subdomain");
//! store.set("tenancy.subdomain.base_domain", "example.com");
//! store.set("tenancy.strict_mode", "true");
//!
//! let config = TenancyConfig::from_snapshot(&store.snapshot()).unwrap();
//! assert!(config.strict_mode);
//! assert_eq!(config.resolvers, vec!["header", "subdomain"]);
//! ```
//!
//! ## Environment overrides
//! [`ConfigStore::load_env`] maps `PREFIX__TENANCY__STRICT_MODE=true` to
//! `tenancy.strict_mode`. Loaders for TOML/JSON/Vault stay out of this
//! crate; the typed config also derives `Deserialize` for them.

use std::collections::{BTreeMap, HashMap};

use serde::Deserialize;

use crate::errors::{TenancyError, TenancyResult};
use crate::resolver::header::DEFAULT_TENANT_HEADER;
use crate::resolver::query::DEFAULT_TENANT_QUERY_PARAM;

pub const DEFAULT_RLS_VARIABLE: &str = "app.current_tenant";

#[derive(Debug, Default)]
pub struct ConfigStore {
    values: HashMap<String, String>,
}

impl ConfigStore {
    /// Create an empty config store.
    pub fn new() -> Self {
        Self {
            values: HashMap::new(),
        }
    }

    pub fn set<K, V>(&mut self, key: K, value: V)
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.values.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(|s| s.as_str())
    }

    pub fn has(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Import `PREFIX__A__B=value` variables as `a.b = value`.
    pub fn load_env(&mut self, prefix: &str) -> usize {
        self.load_vars(std::env::vars(), prefix)
    }

    /// Same as [`load_env`](Self::load_env) over an explicit variable list.
    pub fn load_vars<I>(&mut self, vars: I, prefix: &str) -> usize
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut loaded = 0;
        for (key, value) in vars {
            if let Some(stripped) = key.strip_prefix(prefix) {
                let normalized = stripped
                    .trim_start_matches("__")
                    .to_lowercase()
                    .replace("__", ".");
                if normalized.is_empty() {
                    continue;
                }
                self.set(normalized, value);
                loaded += 1;
            }
        }
        loaded
    }

    pub fn snapshot(&self) -> ConfigSnapshot {
        ConfigSnapshot {
            map: self.values.clone(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ConfigSnapshot {
    map: HashMap<String, String>,
}

impl ConfigSnapshot {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.map.get(key).map(|s| s.as_str())
    }

    pub fn get_string(&self, key: &str) -> Option<String> {
        self.map.get(key).cloned()
    }

    pub fn get_bool(&self, key: &str) -> TenancyResult<Option<bool>> {
        match self.get(key) {
            None => Ok(None),
            Some(v) => match v.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => Ok(Some(true)),
                "0" | "false" | "no" | "off" => Ok(Some(false)),
                other => Err(TenancyError::invalid_config(
                    key,
                    format!("expected a boolean, got '{other}'"),
                )),
            },
        }
    }

    /// Comma-separated list, blanks dropped.
    pub fn get_list(&self, key: &str) -> Option<Vec<String>> {
        self.get(key).map(|v| {
            v.split(',')
                .map(|s| s.trim())
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect()
        })
    }

    /// Comma-separated `key=value` pairs.
    pub fn get_pairs(&self, key: &str) -> TenancyResult<Option<BTreeMap<String, String>>> {
        let Some(items) = self.get_list(key) else {
            return Ok(None);
        };
        let mut out = BTreeMap::new();
        for item in items {
            let (k, v) = item.split_once('=').ok_or_else(|| {
                TenancyError::invalid_config(key, format!("expected 'host=slug', got '{item}'"))
            })?;
            out.insert(k.trim().to_ascii_lowercase(), v.trim().to_string());
        }
        Ok(Some(out))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct HeaderConfig {
    pub name: String,
    pub allowed: Vec<String>,
}

impl Default for HeaderConfig {
    fn default() -> Self {
        Self {
            name: DEFAULT_TENANT_HEADER.to_string(),
            allowed: vec![DEFAULT_TENANT_HEADER.to_string()],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SubdomainConfig {
    pub base_domain: Option<String>,
    pub reserved: Vec<String>,
}

impl Default for SubdomainConfig {
    fn default() -> Self {
        Self {
            base_domain: None,
            reserved: vec!["www".to_string()],
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PathConfig {
    pub excluded: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct QueryConfig {
    pub param: String,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            param: DEFAULT_TENANT_QUERY_PARAM.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RlsConfig {
    pub enabled: bool,
    pub variable: String,
}

impl Default for RlsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            variable: DEFAULT_RLS_VARIABLE.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub separator: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            separator: ":".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub root: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: "tenants".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct MailerConfig {
    pub default_dsn: Option<String>,
}

/// Typed tenancy configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct TenancyConfig {
    /// A request without a tenant is an error rather than a pass-through.
    pub strict_mode: bool,
    /// Resolver names in precedence order.
    pub resolvers: Vec<String>,
    /// Resolvers that never take part in the ambiguity check.
    pub exempt: Vec<String>,
    pub header: HeaderConfig,
    pub subdomain: SubdomainConfig,
    pub path: PathConfig,
    /// Exact host → tenant slug.
    pub domains: BTreeMap<String, String>,
    pub query: QueryConfig,
    /// Slug proposed by the `default` resolver.
    pub default_tenant: Option<String>,
    /// Production hides resolution diagnostics from clients.
    pub production: bool,
    pub rls: RlsConfig,
    pub cache: CacheConfig,
    pub storage: StorageConfig,
    pub mailer: MailerConfig,
}

impl Default for TenancyConfig {
    fn default() -> Self {
        Self {
            strict_mode: false,
            resolvers: vec!["header".to_string()],
            exempt: Vec::new(),
            header: HeaderConfig::default(),
            subdomain: SubdomainConfig::default(),
            path: PathConfig::default(),
            domains: BTreeMap::new(),
            query: QueryConfig::default(),
            default_tenant: None,
            production: true,
            rls: RlsConfig::default(),
            cache: CacheConfig::default(),
            storage: StorageConfig::default(),
            mailer: MailerConfig::default(),
        }
    }
}

impl TenancyConfig {
    /// Read `tenancy.*` keys; anything missing keeps its default.
    pub fn from_snapshot(snapshot: &ConfigSnapshot) -> TenancyResult<Self> {
        let mut cfg = Self::default();

        if let Some(v) = snapshot.get_bool("tenancy.strict_mode")? {
            cfg.strict_mode = v;
        }
        if let Some(v) = snapshot.get_list("tenancy.resolvers") {
            if v.is_empty() {
                return Err(TenancyError::invalid_config(
                    "tenancy.resolvers",
                    "at least one resolver is required",
                ));
            }
            cfg.resolvers = v;
        }
        if let Some(v) = snapshot.get_list("tenancy.exempt") {
            cfg.exempt = v;
        }
        if let Some(v) = snapshot.get_string("tenancy.header.name") {
            cfg.header.name = v.trim().to_ascii_lowercase();
            if !snapshot.has_key("tenancy.header.allowed") {
                cfg.header.allowed = vec![cfg.header.name.clone()];
            }
        }
        if let Some(v) = snapshot.get_list("tenancy.header.allowed") {
            cfg.header.allowed = v.into_iter().map(|h| h.to_ascii_lowercase()).collect();
        }
        if let Some(v) = snapshot.get_string("tenancy.subdomain.base_domain") {
            cfg.subdomain.base_domain = Some(v);
        }
        if let Some(v) = snapshot.get_list("tenancy.subdomain.reserved") {
            cfg.subdomain.reserved = v;
        }
        if let Some(v) = snapshot.get_list("tenancy.path.excluded") {
            cfg.path.excluded = v;
        }
        if let Some(v) = snapshot.get_pairs("tenancy.domains")? {
            cfg.domains = v;
        }
        if let Some(v) = snapshot.get_string("tenancy.query.param") {
            cfg.query.param = v;
        }
        if let Some(v) = snapshot.get_string("tenancy.default_tenant") {
            cfg.default_tenant = Some(v);
        }
        if let Some(v) = snapshot.get_bool("tenancy.production")? {
            cfg.production = v;
        }
        if let Some(v) = snapshot.get_bool("tenancy.rls.enabled")? {
            cfg.rls.enabled = v;
        }
        if let Some(v) = snapshot.get_string("tenancy.rls.variable") {
            cfg.rls.variable = v;
        }
        if let Some(v) = snapshot.get_string("tenancy.cache.separator") {
            cfg.cache.separator = v;
        }
        if let Some(v) = snapshot.get_string("tenancy.storage.root") {
            cfg.storage.root = v;
        }
        if let Some(v) = snapshot.get_string("tenancy.mailer.default_dsn") {
            cfg.mailer.default_dsn = Some(v);
        }

        cfg.validate()?;
        Ok(cfg)
    }

    /// Checks that do not need a registry.
    pub fn validate(&self) -> TenancyResult<()> {
        if !is_valid_session_variable(&self.rls.variable) {
            return Err(TenancyError::invalid_config(
                "tenancy.rls.variable",
                "expected a dotted identifier such as 'app.current_tenant'",
            ));
        }
        if self.cache.separator.is_empty() {
            return Err(TenancyError::invalid_config(
                "tenancy.cache.separator",
                "must not be empty",
            ));
        }
        Ok(())
    }

    /// Diagnostics are only shown to clients outside production.
    pub fn expose_diagnostics(&self) -> bool {
        !self.production
    }
}

impl ConfigSnapshot {
    fn has_key(&self, key: &str) -> bool {
        self.map.contains_key(key)
    }
}

/// `schema.name` style identifier; anything else would be spliced into SQL.
pub(crate) fn is_valid_session_variable(name: &str) -> bool {
    let mut parts = name.split('.');
    let ok = |p: &str| {
        !p.is_empty()
            && p.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
            && !p.starts_with(|c: char| c.is_ascii_digit())
    };
    matches!((parts.next(), parts.next(), parts.next()), (Some(a), Some(b), None) if ok(a) && ok(b))
}
