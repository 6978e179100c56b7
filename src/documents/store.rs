//! The document access layer.
//!
//! Every operation resolves the active schema version for the requested
//! (tenant, document type) pair, obtains the cached collection config, and
//! then works against the dynamic collection: validation before writes,
//! system-field stamping, tenant-scoped reads, and fuzzy search. Lower-level
//! storage failures are re-wrapped as `BadRequest` at this boundary; the four
//! domain error kinds pass through unchanged.

use std::cmp::Ordering;
use std::sync::Arc;

use chrono::{SecondsFormat, Utc};
use log::{debug, info};
use rapidfuzz::fuzz;
use serde::Serialize;
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::config::SearchConfig;
use crate::documents::collection_cache::{CollectionConfig, CollectionConfigCache};
use crate::documents::indexing;
use crate::error::{EngineError, EngineResult};
use crate::schema::registry::SchemaRegistry;
use crate::schema::types::SchemaDefinition;
use crate::schema::validation;

use crate::db_operations::TENANT_FIELD;

/// Base fields that are always searchable, next to the schema's own fields.
const BASE_SEARCH_FIELDS: [&str; 3] = ["tenant_id", "created_by", "updated_by"];

/// Reference to a freshly created document, echoing the submitted fields.
#[derive(Debug, Clone, Serialize)]
pub struct DocumentRef {
    pub id: String,
    pub document_type: String,
    pub tenant_id: String,
    pub data: Map<String, Value>,
    pub created_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,
}

pub struct DocumentStore {
    registry: Arc<SchemaRegistry>,
    cache: Arc<CollectionConfigCache>,
    search: SearchConfig,
}

impl DocumentStore {
    pub fn new(
        registry: Arc<SchemaRegistry>,
        cache: Arc<CollectionConfigCache>,
        search: SearchConfig,
    ) -> Self {
        Self {
            registry,
            cache,
            search,
        }
    }

    /// Validates and inserts a batch of payloads. Each payload commits
    /// independently; there is no cross-item transaction.
    pub fn create(
        &self,
        tenant_id: &str,
        document_type: &str,
        payloads: Vec<Map<String, Value>>,
        actor: Option<&str>,
    ) -> EngineResult<Vec<DocumentRef>> {
        self.create_inner(tenant_id, document_type, payloads, actor)
            .map_err(wrap_storage_error)
    }

    fn create_inner(
        &self,
        tenant_id: &str,
        document_type: &str,
        payloads: Vec<Map<String, Value>>,
        actor: Option<&str>,
    ) -> EngineResult<Vec<DocumentRef>> {
        let (schema, config) = self.resolve(tenant_id, document_type)?;
        // Reconcile against the live schema, not the possibly stale cached
        // field list, so index changes take effect without a cache clear.
        indexing::reconcile(config.collection(), &schema.fields);

        let mut created = Vec::with_capacity(payloads.len());
        for payload in payloads {
            validation::validate_insert(&payload, config.fields())?;
            let doc = stamp_for_insert(payload.clone(), tenant_id, actor);
            let created_at = doc
                .get("created_at")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            let doc_id = config.collection().insert(&doc)?;
            created.push(DocumentRef {
                id: doc_id,
                document_type: document_type.to_string(),
                tenant_id: tenant_id.to_string(),
                data: payload,
                created_at,
                created_by: actor.map(str::to_string),
            });
        }
        info!(
            "Created {} document(s) in '{}' for tenant {}",
            created.len(),
            document_type,
            tenant_id
        );
        Ok(created)
    }

    /// Fetches one document, scoped to the tenant. A matching id belonging
    /// to another tenant is a plain `NotFound`.
    pub fn get_by_id(
        &self,
        tenant_id: &str,
        document_type: &str,
        doc_id: &str,
    ) -> EngineResult<Map<String, Value>> {
        self.get_by_id_inner(tenant_id, document_type, doc_id)
            .map_err(wrap_storage_error)
    }

    fn get_by_id_inner(
        &self,
        tenant_id: &str,
        document_type: &str,
        doc_id: &str,
    ) -> EngineResult<Map<String, Value>> {
        let (_, config) = self.resolve(tenant_id, document_type)?;
        let doc = self.fetch_owned(&config, tenant_id, document_type, doc_id)?;
        Ok(serialize_document(doc_id, doc))
    }

    /// Tenant-filtered listing with offset/limit pagination.
    pub fn list(
        &self,
        tenant_id: &str,
        document_type: &str,
        skip: usize,
        limit: usize,
    ) -> EngineResult<Vec<Map<String, Value>>> {
        self.list_inner(tenant_id, document_type, skip, limit)
            .map_err(wrap_storage_error)
    }

    fn list_inner(
        &self,
        tenant_id: &str,
        document_type: &str,
        skip: usize,
        limit: usize,
    ) -> EngineResult<Vec<Map<String, Value>>> {
        let (_, config) = self.resolve(tenant_id, document_type)?;
        if limit == 0 {
            return Ok(Vec::new());
        }
        let mut results = Vec::new();
        let mut skipped = 0usize;
        for entry in config.collection().documents() {
            let (doc_id, doc) = entry?;
            if !belongs_to_tenant(&doc, tenant_id) {
                continue;
            }
            if skipped < skip {
                skipped += 1;
                continue;
            }
            results.push(serialize_document(&doc_id, doc));
            if results.len() >= limit {
                break;
            }
        }
        Ok(results)
    }

    /// Fuzzy search over one column with the configured threshold and cap.
    pub fn search(
        &self,
        tenant_id: &str,
        document_type: &str,
        column: &str,
        value: &str,
    ) -> EngineResult<Vec<Map<String, Value>>> {
        self.search_with_options(
            tenant_id,
            document_type,
            column,
            value,
            self.search.threshold,
            self.search.top_n,
        )
    }

    /// Fuzzy search over one column.
    ///
    /// The column must be declared by the active schema or be one of the
    /// base fields. Scoring is case-insensitive partial-ratio similarity
    /// (0-100) of the stringified column value against the query; matches at
    /// or above the threshold are returned in descending score order, capped
    /// at `top_n`. This is a full collection scan per call.
    pub fn search_with_options(
        &self,
        tenant_id: &str,
        document_type: &str,
        column: &str,
        value: &str,
        threshold: f64,
        top_n: usize,
    ) -> EngineResult<Vec<Map<String, Value>>> {
        self.search_inner(tenant_id, document_type, column, value, threshold, top_n)
            .map_err(wrap_storage_error)
    }

    fn search_inner(
        &self,
        tenant_id: &str,
        document_type: &str,
        column: &str,
        value: &str,
        threshold: f64,
        top_n: usize,
    ) -> EngineResult<Vec<Map<String, Value>>> {
        let (schema, config) = self.resolve(tenant_id, document_type)?;

        if !is_searchable_column(&schema, column) {
            let mut allowed: Vec<&str> = schema.field_names();
            allowed.extend(BASE_SEARCH_FIELDS);
            return Err(EngineError::BadRequest(format!(
                "Invalid search column: {}. Allowed columns: {}",
                column,
                allowed.join(", ")
            )));
        }

        let needle = value.trim().to_lowercase();
        let mut matches: Vec<(f64, String, Map<String, Value>)> = Vec::new();
        for entry in config.collection().documents() {
            let (doc_id, doc) = entry?;
            if !belongs_to_tenant(&doc, tenant_id) {
                continue;
            }
            let Some(candidate) = doc.get(column).filter(|v| !v.is_null()) else {
                continue;
            };
            let haystack = stringify_value(candidate).to_lowercase();
            let score = fuzz::partial_ratio(needle.chars(), haystack.chars());
            if score >= threshold {
                debug!("Match found: '{}' (score: {})", haystack, score);
                matches.push((score, doc_id, doc));
            }
        }

        // Stable sort keeps scan order among equal scores.
        matches.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(Ordering::Equal));
        matches.truncate(top_n);

        info!(
            "Found {} match(es) in '{}' for {}='{}'",
            matches.len(),
            document_type,
            column,
            value
        );
        Ok(matches
            .into_iter()
            .map(|(_, doc_id, doc)| serialize_document(&doc_id, doc))
            .collect())
    }

    /// Merge-applies a partial payload onto an existing document. Only
    /// supplied keys change; system fields are re-stamped and shielded from
    /// tampering.
    pub fn update(
        &self,
        tenant_id: &str,
        document_type: &str,
        doc_id: &str,
        patch: Map<String, Value>,
        actor: Option<&str>,
    ) -> EngineResult<Map<String, Value>> {
        self.update_inner(tenant_id, document_type, doc_id, patch, actor)
            .map_err(wrap_storage_error)
    }

    fn update_inner(
        &self,
        tenant_id: &str,
        document_type: &str,
        doc_id: &str,
        patch: Map<String, Value>,
        actor: Option<&str>,
    ) -> EngineResult<Map<String, Value>> {
        let (schema, config) = self.resolve(tenant_id, document_type)?;
        indexing::reconcile(config.collection(), &schema.fields);

        validation::validate_update(&patch, config.fields())?;
        let existing = self.fetch_owned(&config, tenant_id, document_type, doc_id)?;

        let mut merged = existing.clone();
        for (key, value) in patch {
            merged.insert(key, value);
        }
        stamp_for_update(&mut merged, &existing, actor);

        config.collection().replace(doc_id, &existing, &merged)?;
        info!(
            "Updated document {} in '{}' for tenant {}",
            doc_id, document_type, tenant_id
        );
        Ok(serialize_document(doc_id, merged))
    }

    /// Hard-deletes a document after verifying tenant ownership.
    pub fn delete(
        &self,
        tenant_id: &str,
        document_type: &str,
        doc_id: &str,
    ) -> EngineResult<()> {
        self.delete_inner(tenant_id, document_type, doc_id)
            .map_err(wrap_storage_error)
    }

    fn delete_inner(
        &self,
        tenant_id: &str,
        document_type: &str,
        doc_id: &str,
    ) -> EngineResult<()> {
        let (_, config) = self.resolve(tenant_id, document_type)?;
        let doc = self.fetch_owned(&config, tenant_id, document_type, doc_id)?;
        config.collection().delete(doc_id, &doc)?;
        info!(
            "Deleted document {} from '{}' for tenant {}",
            doc_id, document_type, tenant_id
        );
        Ok(())
    }

    /// Resolves the active schema and the (possibly previously cached)
    /// collection config for a pair.
    fn resolve(
        &self,
        tenant_id: &str,
        document_type: &str,
    ) -> EngineResult<(SchemaDefinition, Arc<CollectionConfig>)> {
        let schema = self.registry.get_active(tenant_id, document_type)?;
        let config = self
            .cache
            .get_or_create(tenant_id, document_type, &schema.fields)?;
        Ok((schema, config))
    }

    /// Fetches a document and verifies it belongs to the tenant. Both a
    /// missing id and a foreign-tenant hit surface as the same `NotFound`.
    fn fetch_owned(
        &self,
        config: &CollectionConfig,
        tenant_id: &str,
        document_type: &str,
        doc_id: &str,
    ) -> EngineResult<Map<String, Value>> {
        Uuid::parse_str(doc_id).map_err(|_| {
            EngineError::BadRequest(format!("Invalid document id format: {doc_id}"))
        })?;
        let not_found = || {
            EngineError::NotFound(format!(
                "Document with ID {doc_id} not found in {document_type}"
            ))
        };
        let doc = config.collection().find_by_id(doc_id)?.ok_or_else(not_found)?;
        if !belongs_to_tenant(&doc, tenant_id) {
            return Err(not_found());
        }
        Ok(doc)
    }
}

fn belongs_to_tenant(doc: &Map<String, Value>, tenant_id: &str) -> bool {
    doc.get(TENANT_FIELD).and_then(Value::as_str) == Some(tenant_id)
}

fn is_searchable_column(schema: &SchemaDefinition, column: &str) -> bool {
    BASE_SEARCH_FIELDS.contains(&column) || schema.field(column).is_some()
}

fn now_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Adds the system fields every stored document carries. Stamps win over
/// any same-named fields in the payload.
fn stamp_for_insert(
    mut payload: Map<String, Value>,
    tenant_id: &str,
    actor: Option<&str>,
) -> Map<String, Value> {
    let now = now_iso();
    let actor_value = actor
        .map(|a| Value::String(a.to_string()))
        .unwrap_or(Value::Null);
    payload.insert(TENANT_FIELD.to_string(), Value::String(tenant_id.to_string()));
    payload.insert("created_at".to_string(), Value::String(now.clone()));
    payload.insert("updated_at".to_string(), Value::String(now));
    payload.insert("created_by".to_string(), actor_value.clone());
    payload.insert("updated_by".to_string(), actor_value);
    payload
}

/// Re-stamps the update-time system fields and restores the immutable ones
/// from the stored document.
fn stamp_for_update(
    merged: &mut Map<String, Value>,
    existing: &Map<String, Value>,
    actor: Option<&str>,
) {
    for field in [TENANT_FIELD, "created_at", "created_by"] {
        if let Some(value) = existing.get(field) {
            merged.insert(field.to_string(), value.clone());
        }
    }
    merged.insert("updated_at".to_string(), Value::String(now_iso()));
    merged.insert(
        "updated_by".to_string(),
        actor
            .map(|a| Value::String(a.to_string()))
            .unwrap_or(Value::Null),
    );
}

/// Prepares a stored document for API output by injecting its id. Stored
/// timestamps are already ISO-8601 strings.
fn serialize_document(doc_id: &str, mut doc: Map<String, Value>) -> Map<String, Value> {
    doc.insert("id".to_string(), Value::String(doc_id.to_string()));
    doc
}

fn stringify_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Domain errors pass through; anything lower-level is re-wrapped as a
/// request-layer failure.
fn wrap_storage_error(err: EngineError) -> EngineError {
    if err.is_domain_error() {
        err
    } else {
        EngineError::BadRequest(format!("Storage operation failed: {err}"))
    }
}
