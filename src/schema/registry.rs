//! The versioned schema registry.
//!
//! Stores one record per (tenant, document type, version), auto-assigns
//! version numbers, and enforces the single-active-version invariant through
//! the transactional activation path in the storage layer.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use log::info;
use uuid::Uuid;

use crate::db_operations::{schema_key, DbOperations};
use crate::error::{EngineError, EngineResult};
use crate::schema::types::{SchemaCreate, SchemaDefinition, SchemaPatch};
use crate::schema::validation;

pub struct SchemaRegistry {
    db_ops: Arc<DbOperations>,
}

impl SchemaRegistry {
    pub fn new(db_ops: Arc<DbOperations>) -> Self {
        Self { db_ops }
    }

    /// Registers a new schema version.
    ///
    /// The version is auto-assigned as max(existing)+1 unless given
    /// explicitly; an explicit version that already exists is a `Conflict`.
    /// Deleted versions do not block renumbering. When `is_active` is
    /// requested, every other version of the pair is deactivated first.
    pub fn create(&self, request: SchemaCreate) -> EngineResult<SchemaDefinition> {
        Uuid::parse_str(&request.tenant_id).map_err(|_| {
            EngineError::BadRequest(format!(
                "Invalid tenant_id format: {}",
                request.tenant_id
            ))
        })?;
        if !validation::is_valid_name(&request.document_type) {
            return Err(EngineError::BadRequest(format!(
                "Invalid document type name: {}",
                request.document_type
            )));
        }
        validation::validate_field_definitions(&request.fields)?;

        let existing = self
            .db_ops
            .list_schema_versions(&request.tenant_id, &request.document_type)?;
        let version = match request.version {
            Some(version) => {
                if version == 0 {
                    return Err(EngineError::BadRequest(
                        "Schema version must be a positive integer".to_string(),
                    ));
                }
                if existing.iter().any(|s| s.version == version) {
                    return Err(EngineError::Conflict(format!(
                        "Schema '{}' version {} already exists for tenant {}",
                        request.document_type, version, request.tenant_id
                    )));
                }
                version
            }
            None => existing.iter().map(|s| s.version).max().unwrap_or(0) + 1,
        };

        let now = Utc::now();
        let schema = SchemaDefinition {
            id: Uuid::new_v4().to_string(),
            tenant_id: request.tenant_id,
            document_type: request.document_type,
            version,
            is_active: false,
            description: request.description,
            fields: request.fields,
            created_by: request.created_by.clone(),
            updated_by: request.created_by,
            created_at: now,
            updated_at: now,
        };
        self.db_ops.store_schema_record(&schema)?;
        info!(
            "Created schema '{}' version {} for tenant {}",
            schema.document_type, schema.version, schema.tenant_id
        );

        if request.is_active {
            return self.activate(&schema.id);
        }
        Ok(schema)
    }

    /// Registers a batch of schema versions in one call.
    ///
    /// The whole batch is rejected before any insert when it is empty, when a
    /// tenant id is malformed, or when the same (tenant, document type) pair
    /// appears twice.
    pub fn create_batch(
        &self,
        requests: Vec<SchemaCreate>,
    ) -> EngineResult<Vec<SchemaDefinition>> {
        if requests.is_empty() {
            return Err(EngineError::BadRequest(
                "Schemas list cannot be empty. Provide at least one schema.".to_string(),
            ));
        }
        for (idx, request) in requests.iter().enumerate() {
            Uuid::parse_str(&request.tenant_id).map_err(|_| {
                EngineError::BadRequest(format!(
                    "Invalid tenant_id format at position {}: {}",
                    idx, request.tenant_id
                ))
            })?;
        }
        let mut seen: HashSet<(String, String)> = HashSet::new();
        for request in &requests {
            let key = (request.tenant_id.clone(), request.document_type.clone());
            if !seen.insert(key) {
                return Err(EngineError::Conflict(format!(
                    "Duplicate document type in batch for tenant {}: {}",
                    request.tenant_id, request.document_type
                )));
            }
        }

        let mut created = Vec::with_capacity(requests.len());
        for request in requests {
            created.push(self.create(request)?);
        }
        info!("Created {} schema(s)", created.len());
        Ok(created)
    }

    pub fn get(&self, schema_id: &str) -> EngineResult<SchemaDefinition> {
        self.db_ops.get_schema_by_id(schema_id)?.ok_or_else(|| {
            EngineError::NotFound(format!("Schema with id {schema_id} not found"))
        })
    }

    /// The single active version for a pair; `NotFound` when none is active.
    pub fn get_active(
        &self,
        tenant_id: &str,
        document_type: &str,
    ) -> EngineResult<SchemaDefinition> {
        self.db_ops
            .list_schema_versions(tenant_id, document_type)?
            .into_iter()
            .find(|s| s.is_active)
            .ok_or_else(|| {
                EngineError::NotFound(format!(
                    "No active schema version for '{document_type}' and tenant {tenant_id}"
                ))
            })
    }

    /// All schema records across tenants, with offset/limit pagination.
    pub fn list(&self, skip: usize, limit: usize) -> EngineResult<Vec<SchemaDefinition>> {
        Ok(self
            .db_ops
            .list_all_schemas()?
            .into_iter()
            .skip(skip)
            .take(limit)
            .collect())
    }

    /// All schema records for one tenant; empty when the tenant has none.
    pub fn list_for_tenant(&self, tenant_id: &str) -> EngineResult<Vec<SchemaDefinition>> {
        self.db_ops.list_schemas_for_tenant(tenant_id)
    }

    /// All versions of one pair, newest version first. `NotFound` when the
    /// pair has no versions at all.
    pub fn list_versions(
        &self,
        tenant_id: &str,
        document_type: &str,
    ) -> EngineResult<Vec<SchemaDefinition>> {
        let mut versions = self
            .db_ops
            .list_schema_versions(tenant_id, document_type)?;
        if versions.is_empty() {
            return Err(EngineError::NotFound(format!(
                "No schema named '{document_type}' found for tenant {tenant_id}"
            )));
        }
        versions.sort_by(|a, b| b.version.cmp(&a.version));
        Ok(versions)
    }

    /// Makes one version the active one, deactivating all of its siblings in
    /// a single storage transaction.
    pub fn activate(&self, schema_id: &str) -> EngineResult<SchemaDefinition> {
        let target = self.get(schema_id)?;
        let target_key = schema_key(&target.tenant_id, &target.document_type, target.version);
        let siblings: Vec<String> = self
            .db_ops
            .list_schema_version_keys(&target.tenant_id, &target.document_type)?
            .into_iter()
            .filter(|key| key != &target_key)
            .collect();
        let activated = self
            .db_ops
            .activate_schema_record(&target_key, &siblings, Utc::now())?;
        info!(
            "Activated schema '{}' version {} for tenant {}",
            activated.document_type, activated.version, activated.tenant_id
        );
        Ok(activated)
    }

    /// Applies a partial update. Toggling `is_active` on routes through the
    /// same transactional activation as [`SchemaRegistry::activate`].
    pub fn update(&self, schema_id: &str, patch: SchemaPatch) -> EngineResult<SchemaDefinition> {
        let mut schema = self.get(schema_id)?;

        if let Some(fields) = patch.fields {
            validation::validate_field_definitions(&fields)?;
            schema.fields = fields;
        }
        if let Some(description) = patch.description {
            schema.description = Some(description);
        }
        if let Some(updated_by) = patch.updated_by {
            schema.updated_by = Some(updated_by);
        }

        let activate_after = patch.is_active == Some(true) && !schema.is_active;
        if patch.is_active == Some(false) {
            schema.is_active = false;
        }
        schema.updated_at = Utc::now();
        self.db_ops.store_schema_record(&schema)?;

        if activate_after {
            return self.activate(&schema.id);
        }
        info!(
            "Updated schema '{}' version {} for tenant {}",
            schema.document_type, schema.version, schema.tenant_id
        );
        Ok(schema)
    }

    /// Hard-deletes a schema version. Documents created under it remain; no
    /// cascade is attempted.
    pub fn delete(&self, schema_id: &str) -> EngineResult<()> {
        if !self.db_ops.delete_schema_record(schema_id)? {
            return Err(EngineError::NotFound(format!(
                "Schema with id {schema_id} not found"
            )));
        }
        info!("Deleted schema {schema_id}");
        Ok(())
    }
}
