//! Process-wide cache of resolved collection configurations.
//!
//! A [`CollectionConfig`] bundles a collection handle with the field
//! definitions it was built from. Configs are built on first access for a
//! (tenant, document type) pair and then reused for the life of the process:
//! later calls return the same `Arc` even when the caller passes a different
//! field list, so a schema edited after its config was cached keeps
//! validating against the old field list until [`CollectionConfigCache::clear`]
//! is called. Index reconciliation runs against the live schema on every
//! write, which is what lets the stored shape catch up without a restart.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use log::info;

use crate::db_operations::{DbOperations, DocumentCollection};
use crate::error::{EngineError, EngineResult};
use crate::schema::types::FieldDefinition;

/// Resolved configuration for one (tenant, document type) pair.
pub struct CollectionConfig {
    document_type: String,
    tenant_id: String,
    fields: Vec<FieldDefinition>,
    collection: DocumentCollection,
}

impl CollectionConfig {
    pub fn document_type(&self) -> &str {
        &self.document_type
    }

    pub fn tenant_id(&self) -> &str {
        &self.tenant_id
    }

    /// The field list this config was built from. May lag behind the live
    /// schema; see the module docs.
    pub fn fields(&self) -> &[FieldDefinition] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&FieldDefinition> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn collection(&self) -> &DocumentCollection {
        &self.collection
    }
}

type ConfigKey = (String, String);

pub struct CollectionConfigCache {
    db_ops: Arc<DbOperations>,
    configs: RwLock<HashMap<ConfigKey, Arc<CollectionConfig>>>,
}

impl CollectionConfigCache {
    pub fn new(db_ops: Arc<DbOperations>) -> Self {
        Self {
            db_ops,
            configs: RwLock::new(HashMap::new()),
        }
    }

    /// Returns the cached config for the pair, or builds one: obtains the
    /// backing collection (created implicitly on first access), ensures the
    /// baseline indexes, and wraps the given field list.
    ///
    /// Insert-if-absent runs under the write lock, so exactly one config
    /// object ever exists per key within a process.
    pub fn get_or_create(
        &self,
        tenant_id: &str,
        document_type: &str,
        fields: &[FieldDefinition],
    ) -> EngineResult<Arc<CollectionConfig>> {
        let key = (tenant_id.to_string(), document_type.to_string());

        {
            let configs = self
                .configs
                .read()
                .map_err(|_| EngineError::Internal("Collection cache lock poisoned".to_string()))?;
            if let Some(config) = configs.get(&key) {
                return Ok(Arc::clone(config));
            }
        }

        let mut configs = self
            .configs
            .write()
            .map_err(|_| EngineError::Internal("Collection cache lock poisoned".to_string()))?;
        if let Some(config) = configs.get(&key) {
            return Ok(Arc::clone(config));
        }

        let collection = self.db_ops.collection(document_type)?;
        collection.ensure_baseline_indexes()?;
        let config = Arc::new(CollectionConfig {
            document_type: document_type.to_string(),
            tenant_id: tenant_id.to_string(),
            fields: fields.to_vec(),
            collection,
        });
        configs.insert(key, Arc::clone(&config));
        info!(
            "Registered collection config for '{}' of tenant {}",
            document_type, tenant_id
        );
        Ok(config)
    }

    /// Drops every cached entry. The documented invalidation trigger for
    /// picking up edited field lists.
    pub fn clear(&self) {
        if let Ok(mut configs) = self.configs.write() {
            configs.clear();
            info!("Collection config cache cleared");
        }
    }

    /// Composite keys of all registered configs.
    pub fn keys(&self) -> Vec<(String, String)> {
        self.configs
            .read()
            .map(|configs| configs.keys().cloned().collect())
            .unwrap_or_default()
    }
}
