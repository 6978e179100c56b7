//! The engine facade.
//!
//! [`FolioDb`] is the single entry point embedders use: it owns the sled
//! database, the schema registry, the collection config cache, and the
//! document store, and exposes the schema and document contract as plain
//! methods. Document operations consult the tenant directory before touching
//! storage; schema operations only format-check the tenant id, matching the
//! original service boundary.

use std::sync::Arc;

use serde_json::{Map, Value};
use uuid::Uuid;

use crate::config::EngineConfig;
use crate::db_operations::DbOperations;
use crate::documents::{CollectionConfigCache, DocumentRef, DocumentStore};
use crate::error::{EngineError, EngineResult};
use crate::schema::{SchemaCreate, SchemaDefinition, SchemaPatch, SchemaRegistry};
use crate::tenants::TenantDirectory;

pub struct FolioDb {
    db_ops: Arc<DbOperations>,
    registry: Arc<SchemaRegistry>,
    cache: Arc<CollectionConfigCache>,
    store: DocumentStore,
    tenants: Arc<dyn TenantDirectory>,
}

impl FolioDb {
    /// Opens (or creates) the database at the configured path.
    pub fn open(config: EngineConfig, tenants: Arc<dyn TenantDirectory>) -> EngineResult<Self> {
        let db = sled::open(&config.storage.path)?;
        Self::with_db(db, config, tenants)
    }

    /// Builds an engine on an already-open sled database. Test fixtures use
    /// this with a temporary database.
    pub fn with_db(
        db: sled::Db,
        config: EngineConfig,
        tenants: Arc<dyn TenantDirectory>,
    ) -> EngineResult<Self> {
        let db_ops = Arc::new(DbOperations::new(db)?);
        let registry = Arc::new(SchemaRegistry::new(Arc::clone(&db_ops)));
        let cache = Arc::new(CollectionConfigCache::new(Arc::clone(&db_ops)));
        let store = DocumentStore::new(
            Arc::clone(&registry),
            Arc::clone(&cache),
            config.search.clone(),
        );
        Ok(Self {
            db_ops,
            registry,
            cache,
            store,
            tenants,
        })
    }

    pub fn db_ops(&self) -> &Arc<DbOperations> {
        &self.db_ops
    }

    pub fn registry(&self) -> &SchemaRegistry {
        &self.registry
    }

    // ---- schema contract ----

    pub fn create_schema(&self, request: SchemaCreate) -> EngineResult<SchemaDefinition> {
        self.registry.create(request)
    }

    pub fn create_schemas(
        &self,
        requests: Vec<SchemaCreate>,
    ) -> EngineResult<Vec<SchemaDefinition>> {
        self.registry.create_batch(requests)
    }

    pub fn get_schema(&self, schema_id: &str) -> EngineResult<SchemaDefinition> {
        self.registry.get(schema_id)
    }

    pub fn get_active_schema(
        &self,
        tenant_id: &str,
        document_type: &str,
    ) -> EngineResult<SchemaDefinition> {
        self.registry.get_active(tenant_id, document_type)
    }

    pub fn list_schemas(&self, skip: usize, limit: usize) -> EngineResult<Vec<SchemaDefinition>> {
        self.registry.list(skip, limit)
    }

    pub fn list_schemas_for_tenant(
        &self,
        tenant_id: &str,
    ) -> EngineResult<Vec<SchemaDefinition>> {
        self.registry.list_for_tenant(tenant_id)
    }

    pub fn list_schema_versions(
        &self,
        tenant_id: &str,
        document_type: &str,
    ) -> EngineResult<Vec<SchemaDefinition>> {
        self.registry.list_versions(tenant_id, document_type)
    }

    pub fn activate_schema(&self, schema_id: &str) -> EngineResult<SchemaDefinition> {
        self.registry.activate(schema_id)
    }

    pub fn update_schema(
        &self,
        schema_id: &str,
        patch: SchemaPatch,
    ) -> EngineResult<SchemaDefinition> {
        self.registry.update(schema_id, patch)
    }

    pub fn delete_schema(&self, schema_id: &str) -> EngineResult<()> {
        self.registry.delete(schema_id)
    }

    // ---- document contract ----

    pub fn create_documents(
        &self,
        tenant_id: &str,
        document_type: &str,
        payloads: Vec<Map<String, Value>>,
        actor: Option<&str>,
    ) -> EngineResult<Vec<DocumentRef>> {
        self.ensure_tenant(tenant_id)?;
        self.store.create(tenant_id, document_type, payloads, actor)
    }

    pub fn get_document(
        &self,
        tenant_id: &str,
        document_type: &str,
        doc_id: &str,
    ) -> EngineResult<Map<String, Value>> {
        self.ensure_tenant(tenant_id)?;
        self.store.get_by_id(tenant_id, document_type, doc_id)
    }

    pub fn list_documents(
        &self,
        tenant_id: &str,
        document_type: &str,
        skip: usize,
        limit: usize,
    ) -> EngineResult<Vec<Map<String, Value>>> {
        self.ensure_tenant(tenant_id)?;
        self.store.list(tenant_id, document_type, skip, limit)
    }

    pub fn search_documents(
        &self,
        tenant_id: &str,
        document_type: &str,
        column: &str,
        value: &str,
    ) -> EngineResult<Vec<Map<String, Value>>> {
        self.ensure_tenant(tenant_id)?;
        self.store.search(tenant_id, document_type, column, value)
    }

    pub fn update_document(
        &self,
        tenant_id: &str,
        document_type: &str,
        doc_id: &str,
        patch: Map<String, Value>,
        actor: Option<&str>,
    ) -> EngineResult<Map<String, Value>> {
        self.ensure_tenant(tenant_id)?;
        self.store
            .update(tenant_id, document_type, doc_id, patch, actor)
    }

    pub fn delete_document(
        &self,
        tenant_id: &str,
        document_type: &str,
        doc_id: &str,
    ) -> EngineResult<()> {
        self.ensure_tenant(tenant_id)?;
        self.store.delete(tenant_id, document_type, doc_id)
    }

    // ---- operational ----

    /// Drops every cached collection config. The invalidation trigger for
    /// picking up edited field lists without a restart.
    pub fn clear_collection_cache(&self) {
        self.cache.clear();
    }

    /// Composite (tenant, document type) keys currently cached.
    pub fn cached_collections(&self) -> Vec<(String, String)> {
        self.cache.keys()
    }

    fn ensure_tenant(&self, tenant_id: &str) -> EngineResult<()> {
        Uuid::parse_str(tenant_id).map_err(|_| {
            EngineError::BadRequest(format!("Invalid tenant_id format: {tenant_id}"))
        })?;
        if !self.tenants.tenant_exists(tenant_id)? {
            return Err(EngineError::NotFound(format!(
                "Tenant with ID {tenant_id} not found"
            )));
        }
        Ok(())
    }
}
