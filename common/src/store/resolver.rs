use crate::error::{Result, ScribeError};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

/// maps (tenant, database name) to a filesystem path under a common root,
/// one directory per tenant. the sole chokepoint deciding where stores live.
#[derive(Debug, Clone)]
pub struct StoreResolver {
    root: PathBuf,
    tenantless_fallback: bool,
}

/// listing entry for one store file
#[derive(Debug, Clone, Serialize)]
pub struct StoreInfo {
    pub name: String,
    pub size: u64,
    pub created: Option<u64>,
    pub modified: Option<u64>,
}

impl StoreInfo {
    /// size heuristic: a non-empty file is assumed uploaded, an empty one
    /// freshly created. non-authoritative, for display only.
    pub fn is_uploaded(&self) -> bool {
        self.size > 0
    }
}

impl StoreResolver {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            tenantless_fallback: false,
        }
    }

    /// enable the deprecated tenant-less lookup; off by default
    pub fn with_tenantless_fallback(mut self, enabled: bool) -> Self {
        self.tenantless_fallback = enabled;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// path of the named store for a tenant, creating the tenant directory
    /// on demand. directory creation is idempotent under concurrent calls.
    pub fn resolve(&self, tenant: &str, db_name: &str) -> Result<PathBuf> {
        validate_component(tenant)?;
        validate_component(db_name)?;

        let tenant_dir = self.root.join(tenant);
        fs::create_dir_all(&tenant_dir)?;

        Ok(tenant_dir.join(db_name))
    }

    /// linear scan across all tenant directories for the first store with
    /// the given name. unordered, O(tenants), ambiguous when two tenants
    /// hold the same name. compatibility shim; returns None unless enabled.
    pub fn locate(&self, db_name: &str) -> Result<Option<PathBuf>> {
        if !self.tenantless_fallback {
            return Ok(None);
        }
        validate_component(db_name)?;

        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(_) => return Ok(None),
        };

        for entry in entries.flatten() {
            let tenant_dir = entry.path();
            if !tenant_dir.is_dir() {
                continue;
            }

            let candidate = tenant_dir.join(db_name);
            if candidate.exists() {
                return Ok(Some(candidate));
            }
        }

        Ok(None)
    }

    /// list a tenant's store files with size and timestamps
    pub fn list(&self, tenant: &str) -> Result<Vec<StoreInfo>> {
        validate_component(tenant)?;

        let tenant_dir = self.root.join(tenant);
        if !tenant_dir.exists() {
            return Ok(Vec::new());
        }

        let mut stores = Vec::new();
        for entry in fs::read_dir(&tenant_dir)?.flatten() {
            let path = entry.path();
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if !name.ends_with(".db") {
                continue;
            }

            let meta = entry.metadata()?;
            stores.push(StoreInfo {
                name: name.to_string(),
                size: meta.len(),
                created: meta.created().ok().and_then(unix_secs),
                modified: meta.modified().ok().and_then(unix_secs),
            });
        }

        stores.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(stores)
    }
}

fn unix_secs(time: std::time::SystemTime) -> Option<u64> {
    time.duration_since(UNIX_EPOCH).ok().map(|d| d.as_secs())
}

// store isolation depends on names never escaping the tenant directory
fn validate_component(name: &str) -> Result<()> {
    if name.is_empty()
        || name == "."
        || name == ".."
        || name.contains('/')
        || name.contains('\\')
    {
        return Err(ScribeError::StoreName(name.to_string()));
    }
    Ok(())
}
