use serde::{de::DeserializeOwned, Serialize};

use crate::error::{EngineError, EngineResult};

/// Separator used inside composite tree keys. Document type and field names
/// are validated against a pattern that excludes it, so keys stay unambiguous.
pub(crate) const KEY_SEP: char = '\u{1f}';

/// Unified access to the sled database and its named trees.
///
/// All higher layers go through this struct; nothing else in the crate holds
/// a raw `sled::Db`. Writes flush before returning so the data is durably on
/// disk when an operation reports success.
#[derive(Clone)]
pub struct DbOperations {
    /// The underlying sled database instance
    db: sled::Db,
    /// Versioned schema records, keyed (tenant, document type, version)
    pub(crate) schemas_tree: sled::Tree,
    /// Schema id -> composite key, for id-addressed lookups
    pub(crate) schema_ids_tree: sled::Tree,
    /// Existence records for dynamic collections
    pub(crate) collections_tree: sled::Tree,
    /// Index metadata, keyed (collection, index name)
    pub(crate) indexes_tree: sled::Tree,
}

impl DbOperations {
    /// Opens all required trees on the given database.
    pub fn new(db: sled::Db) -> Result<Self, sled::Error> {
        let schemas_tree = db.open_tree("schemas")?;
        let schema_ids_tree = db.open_tree("schema_ids")?;
        let collections_tree = db.open_tree("collections")?;
        let indexes_tree = db.open_tree("indexes")?;

        Ok(Self {
            db,
            schemas_tree,
            schema_ids_tree,
            collections_tree,
            indexes_tree,
        })
    }

    /// Gets a reference to the underlying database
    pub fn db(&self) -> &sled::Db {
        &self.db
    }

    /// Generic function to store any serializable item in a specific tree
    pub fn store_in_tree<T: Serialize>(
        &self,
        tree: &sled::Tree,
        key: &str,
        item: &T,
    ) -> EngineResult<()> {
        let bytes = serde_json::to_vec(item)?;
        tree.insert(key.as_bytes(), bytes)?;
        tree.flush()?;
        Ok(())
    }

    /// Generic function to retrieve any deserializable item from a specific tree
    pub fn get_from_tree<T: DeserializeOwned>(
        &self,
        tree: &sled::Tree,
        key: &str,
    ) -> EngineResult<Option<T>> {
        match tree.get(key.as_bytes())? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    /// List all key-value pairs in a tree whose keys start with `prefix`.
    pub fn list_items_with_prefix<T: DeserializeOwned>(
        &self,
        tree: &sled::Tree,
        prefix: &str,
    ) -> EngineResult<Vec<(String, T)>> {
        let mut items = Vec::new();
        for entry in tree.scan_prefix(prefix.as_bytes()) {
            let (key, value) = entry?;
            let key_str = String::from_utf8_lossy(&key).to_string();
            let item = serde_json::from_slice(&value).map_err(|e| {
                EngineError::Internal(format!(
                    "Deserialization failed for key '{}': {}",
                    key_str, e
                ))
            })?;
            items.push((key_str, item));
        }
        Ok(items)
    }

    /// List all keys in a tree whose keys start with `prefix`.
    pub fn list_keys_with_prefix(
        &self,
        tree: &sled::Tree,
        prefix: &str,
    ) -> EngineResult<Vec<String>> {
        let mut keys = Vec::new();
        for entry in tree.scan_prefix(prefix.as_bytes()) {
            let (key, _) = entry?;
            keys.push(String::from_utf8_lossy(&key).to_string());
        }
        Ok(keys)
    }

    /// Delete an item from a specific tree
    pub fn delete_from_tree(&self, tree: &sled::Tree, key: &str) -> EngineResult<bool> {
        let existed = tree.remove(key.as_bytes())?.is_some();
        tree.flush()?;
        Ok(existed)
    }

    /// Check if a key exists in a specific tree
    pub fn exists_in_tree(&self, tree: &sled::Tree, key: &str) -> EngineResult<bool> {
        Ok(tree.contains_key(key.as_bytes())?)
    }
}
