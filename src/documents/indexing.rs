//! Reconciliation of uniqueness indexes with a schema's field definitions.
//!
//! Index maintenance is an optimization, not a correctness requirement for
//! validation, so nothing in this module returns an error: individual create
//! and drop failures are logged and skipped. A partial reconciliation is an
//! acceptable steady state that self-heals on the next write.

use std::collections::HashSet;

use log::{info, warn};

use crate::db_operations::DocumentCollection;
use crate::schema::types::FieldDefinition;

/// Suffix of the deterministic unique-index naming convention. Only indexes
/// matching it are ever dropped by reconciliation.
const UNIQUE_INDEX_SUFFIX: &str = "_1_tenant_id_1";

/// Name of the compound uniqueness index for one field.
pub fn unique_index_name(field: &str) -> String {
    format!("{field}{UNIQUE_INDEX_SUFFIX}")
}

fn matches_convention(name: &str) -> bool {
    name.len() > UNIQUE_INDEX_SUFFIX.len() && name.ends_with(UNIQUE_INDEX_SUFFIX)
}

/// Brings the collection's unique indexes in line with the given fields:
/// creates a compound (field, tenant id) index for every field marked unique
/// and drops convention-named unique indexes for fields no longer marked so.
/// Baseline indexes and the primary id index are never touched.
pub fn reconcile(collection: &DocumentCollection, fields: &[FieldDefinition]) {
    let existing = match collection.list_indexes() {
        Ok(existing) => existing,
        Err(e) => {
            warn!(
                "Could not list indexes on collection '{}': {}",
                collection.name(),
                e
            );
            return;
        }
    };
    let existing_names: HashSet<&str> = existing.iter().map(|m| m.name.as_str()).collect();

    let required: HashSet<String> = fields
        .iter()
        .filter(|f| f.unique)
        .map(|f| unique_index_name(&f.name))
        .collect();

    for field in fields.iter().filter(|f| f.unique) {
        let name = unique_index_name(&field.name);
        if existing_names.contains(name.as_str()) {
            continue;
        }
        match collection.create_index(&field.name, true, &name) {
            Ok(()) => info!(
                "Created unique compound index on ({}, tenant_id) for collection '{}'",
                field.name,
                collection.name()
            ),
            Err(e) => warn!("Index '{}' may already exist: {}", name, e),
        }
    }

    for meta in &existing {
        if meta.unique && matches_convention(&meta.name) && !required.contains(&meta.name) {
            match collection.drop_index(&meta.name) {
                Ok(()) => info!(
                    "Dropped obsolete unique index '{}' from collection '{}'",
                    meta.name,
                    collection.name()
                ),
                Err(e) => warn!("Could not drop index '{}': {}", meta.name, e),
            }
        }
    }
}
