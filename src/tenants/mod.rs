//! The tenant existence oracle.
//!
//! Tenant master data lives in an external relational service; the engine
//! only needs a yes/no answer before touching a tenant's documents. The
//! trait is the seam where embedders plug that service in; the in-memory
//! implementations cover tests and standalone use.

use std::collections::HashSet;
use std::sync::RwLock;

use crate::error::{EngineError, EngineResult};

pub trait TenantDirectory: Send + Sync {
    /// Whether the tenant id is known. The id is already format-checked by
    /// the caller.
    fn tenant_exists(&self, tenant_id: &str) -> EngineResult<bool>;
}

/// A fixed, registration-based directory.
#[derive(Default)]
pub struct StaticTenantDirectory {
    tenants: RwLock<HashSet<String>>,
}

impl StaticTenantDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, tenant_id: impl Into<String>) {
        if let Ok(mut tenants) = self.tenants.write() {
            tenants.insert(tenant_id.into());
        }
    }
}

impl TenantDirectory for StaticTenantDirectory {
    fn tenant_exists(&self, tenant_id: &str) -> EngineResult<bool> {
        let tenants = self
            .tenants
            .read()
            .map_err(|_| EngineError::Internal("Tenant directory lock poisoned".to_string()))?;
        Ok(tenants.contains(tenant_id))
    }
}

/// Accepts every well-formed tenant id. For embeddings that do their own
/// tenant checks upstream.
pub struct OpenTenantDirectory;

impl TenantDirectory for OpenTenantDirectory {
    fn tenant_exists(&self, _tenant_id: &str) -> EngineResult<bool> {
        Ok(true)
    }
}
