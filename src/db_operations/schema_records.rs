//! Persistence of versioned schema records.
//!
//! Records live in the `schemas` tree under a composite
//! (tenant, document type, version) key so a prefix scan answers all
//! per-pair version queries; the `schema_ids` tree maps the opaque schema id
//! back to that key. Activation flips the active flag of a whole version set
//! inside one sled transaction, which is what keeps the single-active-version
//! invariant under concurrent callers.

use chrono::{DateTime, Utc};
use sled::transaction::{ConflictableTransactionError, TransactionError};

use super::core::{DbOperations, KEY_SEP};
use crate::error::{EngineError, EngineResult};
use crate::schema::types::SchemaDefinition;

/// Composite key for one schema version. Versions are zero-padded so the
/// lexicographic tree order equals numeric version order.
pub(crate) fn schema_key(tenant_id: &str, document_type: &str, version: u32) -> String {
    format!("{tenant_id}{KEY_SEP}{document_type}{KEY_SEP}{version:08}")
}

/// Prefix shared by every version of a (tenant, document type) pair.
pub(crate) fn pair_prefix(tenant_id: &str, document_type: &str) -> String {
    format!("{tenant_id}{KEY_SEP}{document_type}{KEY_SEP}")
}

impl DbOperations {
    /// Stores a schema record, keyed by both its composite key and its id.
    pub fn store_schema_record(&self, schema: &SchemaDefinition) -> EngineResult<()> {
        let key = schema_key(&schema.tenant_id, &schema.document_type, schema.version);
        self.store_in_tree(&self.schemas_tree, &key, schema)?;
        self.schema_ids_tree
            .insert(schema.id.as_bytes(), key.as_bytes())?;
        self.schema_ids_tree.flush()?;
        Ok(())
    }

    /// Looks a schema up by its opaque id.
    pub fn get_schema_by_id(&self, schema_id: &str) -> EngineResult<Option<SchemaDefinition>> {
        let Some(key) = self.schema_ids_tree.get(schema_id.as_bytes())? else {
            return Ok(None);
        };
        let key = String::from_utf8_lossy(&key).to_string();
        self.get_from_tree(&self.schemas_tree, &key)
    }

    /// All stored versions for a pair, in ascending version order.
    pub fn list_schema_versions(
        &self,
        tenant_id: &str,
        document_type: &str,
    ) -> EngineResult<Vec<SchemaDefinition>> {
        let prefix = pair_prefix(tenant_id, document_type);
        let items: Vec<(String, SchemaDefinition)> =
            self.list_items_with_prefix(&self.schemas_tree, &prefix)?;
        Ok(items.into_iter().map(|(_, schema)| schema).collect())
    }

    /// Composite keys of all stored versions for a pair.
    pub fn list_schema_version_keys(
        &self,
        tenant_id: &str,
        document_type: &str,
    ) -> EngineResult<Vec<String>> {
        let prefix = pair_prefix(tenant_id, document_type);
        self.list_keys_with_prefix(&self.schemas_tree, &prefix)
    }

    /// Every schema record in the store, across all tenants.
    pub fn list_all_schemas(&self) -> EngineResult<Vec<SchemaDefinition>> {
        let items: Vec<(String, SchemaDefinition)> =
            self.list_items_with_prefix(&self.schemas_tree, "")?;
        Ok(items.into_iter().map(|(_, schema)| schema).collect())
    }

    /// All schema records belonging to one tenant.
    pub fn list_schemas_for_tenant(
        &self,
        tenant_id: &str,
    ) -> EngineResult<Vec<SchemaDefinition>> {
        let prefix = format!("{tenant_id}{KEY_SEP}");
        let items: Vec<(String, SchemaDefinition)> =
            self.list_items_with_prefix(&self.schemas_tree, &prefix)?;
        Ok(items.into_iter().map(|(_, schema)| schema).collect())
    }

    pub fn schema_version_exists(
        &self,
        tenant_id: &str,
        document_type: &str,
        version: u32,
    ) -> EngineResult<bool> {
        let key = schema_key(tenant_id, document_type, version);
        self.exists_in_tree(&self.schemas_tree, &key)
    }

    /// Hard-deletes a schema record. Returns false when the id is unknown.
    pub fn delete_schema_record(&self, schema_id: &str) -> EngineResult<bool> {
        let Some(key) = self.schema_ids_tree.remove(schema_id.as_bytes())? else {
            return Ok(false);
        };
        self.schema_ids_tree.flush()?;
        let key = String::from_utf8_lossy(&key).to_string();
        self.delete_from_tree(&self.schemas_tree, &key)
    }

    /// Activates the record at `target_key` and deactivates every record in
    /// `sibling_keys`, atomically.
    ///
    /// The sibling set is collected by the caller from a prefix scan; a
    /// version created concurrently with the transaction is not covered, but
    /// two racing activations can no longer leave both versions active.
    pub fn activate_schema_record(
        &self,
        target_key: &str,
        sibling_keys: &[String],
        now: DateTime<Utc>,
    ) -> EngineResult<SchemaDefinition> {
        let result: Result<SchemaDefinition, TransactionError<EngineError>> =
            self.schemas_tree.transaction(|tx| {
                for key in sibling_keys {
                    if let Some(bytes) = tx.get(key.as_bytes())? {
                        let mut sibling: SchemaDefinition = serde_json::from_slice(&bytes)
                            .map_err(|e| {
                                ConflictableTransactionError::Abort(EngineError::Serde(e))
                            })?;
                        if sibling.is_active {
                            sibling.is_active = false;
                            sibling.updated_at = now;
                            let bytes = serde_json::to_vec(&sibling).map_err(|e| {
                                ConflictableTransactionError::Abort(EngineError::Serde(e))
                            })?;
                            tx.insert(key.as_bytes(), bytes)?;
                        }
                    }
                }

                let bytes = tx.get(target_key.as_bytes())?.ok_or_else(|| {
                    ConflictableTransactionError::Abort(EngineError::NotFound(
                        "Schema record vanished during activation".to_string(),
                    ))
                })?;
                let mut target: SchemaDefinition = serde_json::from_slice(&bytes)
                    .map_err(|e| ConflictableTransactionError::Abort(EngineError::Serde(e)))?;
                target.is_active = true;
                target.updated_at = now;
                let bytes = serde_json::to_vec(&target)
                    .map_err(|e| ConflictableTransactionError::Abort(EngineError::Serde(e)))?;
                tx.insert(target_key.as_bytes(), bytes)?;
                Ok(target)
            });

        let schema = result.map_err(|e| match e {
            TransactionError::Abort(err) => err,
            TransactionError::Storage(err) => EngineError::Storage(err),
        })?;
        self.schemas_tree.flush()?;
        Ok(schema)
    }
}
