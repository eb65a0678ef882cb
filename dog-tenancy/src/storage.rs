//! Tenant-prefixed storage paths.
//!
//! Uploads and generated files live under `{root}/{slug}/`. Paths are
//! validated before prefixing so a caller cannot escape its tenant's
//! directory.

use std::path::{Component, Path, PathBuf};

use crate::config::StorageConfig;
use crate::context::TenantContext;
use crate::errors::{TenancyError, TenancyResult};
use crate::resolver::is_valid_slug;

#[derive(Debug, Clone)]
pub struct TenantStoragePath {
    root: PathBuf,
}

impl TenantStoragePath {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn from_config(config: &StorageConfig) -> Self {
        Self::new(&config.root)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory owned by the current tenant.
    pub fn tenant_root(&self, ctx: &TenantContext) -> TenancyResult<PathBuf> {
        let tenant = ctx.tenant().ok_or(TenancyError::TenantRequired {
            operation: "storage path prefixing",
        })?;
        if !is_valid_slug(tenant.slug()) {
            return Err(TenancyError::invalid_path(
                tenant.slug().to_string(),
                "tenant slug is not a valid directory name",
            ));
        }
        Ok(self.root.join(tenant.slug()))
    }

    /// Prefix a relative `path` with the current tenant's directory.
    pub fn resolve(&self, ctx: &TenantContext, path: impl AsRef<Path>) -> TenancyResult<PathBuf> {
        let path = path.as_ref();
        validate_relative(path)?;
        Ok(self.tenant_root(ctx)?.join(path))
    }
}

fn validate_relative(path: &Path) -> TenancyResult<()> {
    for component in path.components() {
        match component {
            Component::Normal(_) | Component::CurDir => {}
            Component::ParentDir => {
                return Err(TenancyError::invalid_path(
                    path.display().to_string(),
                    "parent directory segments are not allowed",
                ))
            }
            Component::RootDir | Component::Prefix(_) => {
                return Err(TenancyError::invalid_path(
                    path.display().to_string(),
                    "path must be relative",
                ))
            }
        }
    }
    Ok(())
}
