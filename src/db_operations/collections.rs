//! Dynamic document collections and their secondary indexes.
//!
//! Each document type is backed by one `doc:{type}` tree holding raw JSON
//! documents keyed by generated UUID, plus one `idx:{type}:{index}` tree per
//! secondary index. Unique index entries are keyed
//! `(encoded value, tenant id)` and claimed with compare-and-swap, so a
//! duplicate value inside one tenant surfaces as a `Conflict` at write time.
//! Non-unique entries are keyed `(encoded value, document id)`.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use log::warn;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use super::core::{DbOperations, KEY_SEP};
use crate::error::{EngineError, EngineResult};

/// Field every stored document carries for tenant scoping.
pub(crate) const TENANT_FIELD: &str = "tenant_id";

/// Fields indexed on every collection at creation time.
pub(crate) const BASE_INDEX_FIELDS: [&str; 3] = ["tenant_id", "created_at", "updated_at"];

/// Descriptor of one secondary index on a collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexMeta {
    pub name: String,
    pub field: String,
    pub unique: bool,
}

/// Existence record for a dynamic collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionMeta {
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// Handle on one dynamic collection.
#[derive(Clone)]
pub struct DocumentCollection {
    name: String,
    db: sled::Db,
    docs_tree: sled::Tree,
    indexes_tree: sled::Tree,
}

impl DbOperations {
    /// Obtains the collection for a document type, creating its backing tree
    /// and existence record on first access.
    pub fn collection(&self, name: &str) -> EngineResult<DocumentCollection> {
        let docs_tree = self.db().open_tree(format!("doc:{name}"))?;
        if !self.exists_in_tree(&self.collections_tree, name)? {
            let meta = CollectionMeta {
                name: name.to_string(),
                created_at: Utc::now(),
            };
            self.store_in_tree(&self.collections_tree, name, &meta)?;
        }
        Ok(DocumentCollection {
            name: name.to_string(),
            db: self.db().clone(),
            docs_tree,
            indexes_tree: self.indexes_tree.clone(),
        })
    }

    /// Names of every collection created so far.
    pub fn list_collections(&self) -> EngineResult<Vec<String>> {
        self.list_keys_with_prefix(&self.collections_tree, "")
    }
}

impl DocumentCollection {
    pub fn name(&self) -> &str {
        &self.name
    }

    fn index_tree_name(&self, index_name: &str) -> String {
        format!("idx:{}:{}", self.name, index_name)
    }

    fn index_tree(&self, index_name: &str) -> EngineResult<sled::Tree> {
        Ok(self.db.open_tree(self.index_tree_name(index_name))?)
    }

    fn meta_key(&self, index_name: &str) -> String {
        format!("{}{}{}", self.name, KEY_SEP, index_name)
    }

    /// Iterates all documents as (id, body) pairs.
    pub fn documents(
        &self,
    ) -> impl Iterator<Item = EngineResult<(String, Map<String, Value>)>> + '_ {
        self.docs_tree.iter().map(|entry| {
            let (key, value) = entry.map_err(EngineError::Storage)?;
            let id = String::from_utf8_lossy(&key).to_string();
            let doc: Map<String, Value> =
                serde_json::from_slice(&value).map_err(EngineError::Serde)?;
            Ok((id, doc))
        })
    }

    pub fn find_by_id(&self, doc_id: &str) -> EngineResult<Option<Map<String, Value>>> {
        match self.docs_tree.get(doc_id.as_bytes())? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Inserts a prepared document and maintains every index. Returns the
    /// generated document id.
    pub fn insert(&self, doc: &Map<String, Value>) -> EngineResult<String> {
        let doc_id = Uuid::new_v4().to_string();
        let indexes = self.list_indexes()?;

        // Claim unique entries first so a conflict leaves nothing behind.
        let mut claimed: Vec<(sled::Tree, String)> = Vec::new();
        for meta in indexes.iter().filter(|m| m.unique) {
            let Some(entry_key) = index_entry_key(meta, &doc_id, doc) else {
                continue;
            };
            let tree = self.index_tree(&meta.name)?;
            let cas = tree.compare_and_swap(
                entry_key.as_bytes(),
                None::<&[u8]>,
                Some(doc_id.as_bytes()),
            )?;
            match cas {
                Ok(()) => claimed.push((tree, entry_key)),
                Err(_) => {
                    for (tree, key) in claimed {
                        let _ = tree.remove(key.as_bytes());
                    }
                    return Err(EngineError::Conflict(format!(
                        "Duplicate value for unique field '{}' in collection '{}'",
                        meta.field, self.name
                    )));
                }
            }
        }

        for meta in indexes.iter().filter(|m| !m.unique) {
            if let Some(entry_key) = index_entry_key(meta, &doc_id, doc) {
                let tree = self.index_tree(&meta.name)?;
                tree.insert(entry_key.as_bytes(), doc_id.as_bytes())?;
            }
        }

        self.docs_tree
            .insert(doc_id.as_bytes(), serde_json::to_vec(doc)?)?;
        self.docs_tree.flush()?;
        Ok(doc_id)
    }

    /// Replaces a stored document, re-pointing index entries whose values
    /// changed. `old` must be the currently stored body.
    pub fn replace(
        &self,
        doc_id: &str,
        old: &Map<String, Value>,
        new: &Map<String, Value>,
    ) -> EngineResult<()> {
        let indexes = self.list_indexes()?;

        let mut claimed: Vec<(sled::Tree, String)> = Vec::new();
        let mut stale: Vec<(sled::Tree, String)> = Vec::new();
        for meta in indexes.iter().filter(|m| m.unique) {
            let old_key = index_entry_key(meta, doc_id, old);
            let new_key = index_entry_key(meta, doc_id, new);
            if old_key == new_key {
                continue;
            }
            let tree = self.index_tree(&meta.name)?;
            if let Some(key) = new_key {
                let cas = tree.compare_and_swap(
                    key.as_bytes(),
                    None::<&[u8]>,
                    Some(doc_id.as_bytes()),
                )?;
                match cas {
                    Ok(()) => claimed.push((tree.clone(), key)),
                    Err(_) => {
                        for (tree, key) in claimed {
                            let _ = tree.remove(key.as_bytes());
                        }
                        return Err(EngineError::Conflict(format!(
                            "Duplicate value for unique field '{}' in collection '{}'",
                            meta.field, self.name
                        )));
                    }
                }
            }
            if let Some(key) = old_key {
                stale.push((tree, key));
            }
        }
        for (tree, key) in stale {
            tree.remove(key.as_bytes())?;
        }

        for meta in indexes.iter().filter(|m| !m.unique) {
            let old_key = index_entry_key(meta, doc_id, old);
            let new_key = index_entry_key(meta, doc_id, new);
            if old_key == new_key {
                continue;
            }
            let tree = self.index_tree(&meta.name)?;
            if let Some(key) = old_key {
                tree.remove(key.as_bytes())?;
            }
            if let Some(key) = new_key {
                tree.insert(key.as_bytes(), doc_id.as_bytes())?;
            }
        }

        self.docs_tree
            .insert(doc_id.as_bytes(), serde_json::to_vec(new)?)?;
        self.docs_tree.flush()?;
        Ok(())
    }

    /// Hard-deletes a document and its index entries. `doc` must be the
    /// currently stored body. Returns false when the id is unknown.
    pub fn delete(&self, doc_id: &str, doc: &Map<String, Value>) -> EngineResult<bool> {
        for meta in self.list_indexes()? {
            let Some(entry_key) = index_entry_key(&meta, doc_id, doc) else {
                continue;
            };
            let tree = self.index_tree(&meta.name)?;
            if meta.unique {
                // Only drop the entry if it still points at this document.
                if let Some(current) = tree.get(entry_key.as_bytes())? {
                    if current.as_ref() == doc_id.as_bytes() {
                        tree.remove(entry_key.as_bytes())?;
                    }
                }
            } else {
                tree.remove(entry_key.as_bytes())?;
            }
        }
        let existed = self.docs_tree.remove(doc_id.as_bytes())?.is_some();
        self.docs_tree.flush()?;
        Ok(existed)
    }

    /// All index descriptors registered on this collection.
    pub fn list_indexes(&self) -> EngineResult<Vec<IndexMeta>> {
        let prefix = format!("{}{}", self.name, KEY_SEP);
        let mut metas = Vec::new();
        for entry in self.indexes_tree.scan_prefix(prefix.as_bytes()) {
            let (_, value) = entry?;
            metas.push(serde_json::from_slice(&value)?);
        }
        Ok(metas)
    }

    /// Registers an index and backfills entries from existing documents.
    /// Fails with `Conflict` when an index of that name already exists.
    pub fn create_index(&self, field: &str, unique: bool, name: &str) -> EngineResult<()> {
        let meta_key = self.meta_key(name);
        if self.indexes_tree.contains_key(meta_key.as_bytes())? {
            return Err(EngineError::Conflict(format!(
                "Index '{}' already exists on collection '{}'",
                name, self.name
            )));
        }
        let meta = IndexMeta {
            name: name.to_string(),
            field: field.to_string(),
            unique,
        };
        let tree = self.index_tree(name)?;
        for entry in self.documents() {
            let (doc_id, doc) = entry?;
            let Some(entry_key) = index_entry_key(&meta, &doc_id, &doc) else {
                continue;
            };
            if unique {
                let cas = tree.compare_and_swap(
                    entry_key.as_bytes(),
                    None::<&[u8]>,
                    Some(doc_id.as_bytes()),
                )?;
                if cas.is_err() {
                    warn!(
                        "Skipping duplicate value for unique index '{}' on '{}' while backfilling document {}",
                        name, self.name, doc_id
                    );
                }
            } else {
                tree.insert(entry_key.as_bytes(), doc_id.as_bytes())?;
            }
        }
        self.indexes_tree
            .insert(meta_key.as_bytes(), serde_json::to_vec(&meta)?)?;
        self.indexes_tree.flush()?;
        Ok(())
    }

    /// Unregisters an index and drops its backing tree.
    pub fn drop_index(&self, name: &str) -> EngineResult<()> {
        let meta_key = self.meta_key(name);
        if self.indexes_tree.remove(meta_key.as_bytes())?.is_none() {
            return Err(EngineError::NotFound(format!(
                "Index '{}' not found on collection '{}'",
                name, self.name
            )));
        }
        self.indexes_tree.flush()?;
        self.db.drop_tree(self.index_tree_name(name))?;
        Ok(())
    }

    /// Creates the non-unique baseline indexes every collection carries.
    pub fn ensure_baseline_indexes(&self) -> EngineResult<()> {
        let existing: HashSet<String> = self
            .list_indexes()?
            .into_iter()
            .map(|meta| meta.name)
            .collect();
        for field in BASE_INDEX_FIELDS {
            let name = format!("{field}_1");
            if existing.contains(&name) {
                continue;
            }
            match self.create_index(field, false, &name) {
                Ok(()) => {}
                // Lost a creation race; the index is there either way.
                Err(EngineError::Conflict(_)) => {}
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }
}

/// Entry key for one document under one index, or None when the document
/// does not carry the indexed field.
fn index_entry_key(meta: &IndexMeta, doc_id: &str, doc: &Map<String, Value>) -> Option<String> {
    let value = doc.get(&meta.field)?;
    if value.is_null() {
        return None;
    }
    let encoded = encode_index_value(value);
    let scope = if meta.unique {
        doc.get(TENANT_FIELD)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string()
    } else {
        doc_id.to_string()
    };
    Some(format!("{encoded}{KEY_SEP}{scope}"))
}

fn encode_index_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn body(entries: Value) -> Map<String, Value> {
        entries.as_object().cloned().unwrap()
    }

    #[test]
    fn unique_entry_keys_scope_by_tenant() {
        let meta = IndexMeta {
            name: "sku_1_tenant_id_1".to_string(),
            field: "sku".to_string(),
            unique: true,
        };
        let doc = body(json!({"sku": "A-1", "tenant_id": "t1"}));
        let key = index_entry_key(&meta, "doc-1", &doc).unwrap();
        assert!(key.starts_with("A-1"));
        assert!(key.ends_with("t1"));
    }

    #[test]
    fn missing_or_null_fields_produce_no_entry() {
        let meta = IndexMeta {
            name: "sku_1_tenant_id_1".to_string(),
            field: "sku".to_string(),
            unique: true,
        };
        assert!(index_entry_key(&meta, "doc-1", &body(json!({"tenant_id": "t1"}))).is_none());
        assert!(
            index_entry_key(&meta, "doc-1", &body(json!({"sku": null, "tenant_id": "t1"})))
                .is_none()
        );
    }
}
