//! Shared test fixtures for the engine integration tests.
#![allow(dead_code)]

use std::sync::Arc;

use foliodb::{
    EngineConfig, FieldDefinition, FieldType, FolioDb, SchemaCreate, StaticTenantDirectory,
};
use serde_json::{json, Map, Value};
use tempfile::TempDir;

/// Two well-formed tenant ids registered in every fixture.
pub const TENANT_A: &str = "7b0c07fa-4c5b-4a3a-9a6e-2f8f1d2f3a41";
pub const TENANT_B: &str = "e3b9a4a8-91f0-4d6e-b6a7-5c2d1e0f9b82";
/// Well-formed but never registered.
pub const UNKNOWN_TENANT: &str = "11111111-2222-4333-8444-555555555555";

pub struct TestFixture {
    pub engine: FolioDb,
    pub _temp_dir: TempDir,
}

impl TestFixture {
    pub fn new() -> Self {
        let temp_dir = tempfile::tempdir().expect("create temp directory");
        let db = sled::Config::new()
            .path(temp_dir.path())
            .temporary(true)
            .open()
            .expect("open temporary database");
        let tenants = Arc::new(StaticTenantDirectory::new());
        tenants.register(TENANT_A);
        tenants.register(TENANT_B);
        let engine = FolioDb::with_db(db, EngineConfig::default(), tenants)
            .expect("build engine on temporary database");
        Self {
            engine,
            _temp_dir: temp_dir,
        }
    }

    /// Registers an active invoice schema for the given tenant and returns
    /// its id.
    pub fn create_invoice_schema(&self, tenant_id: &str) -> String {
        self.engine
            .create_schema(
                SchemaCreate::new(tenant_id, "invoice")
                    .with_fields(invoice_fields())
                    .active(),
            )
            .expect("create invoice schema")
            .id
    }
}

/// The invoice shape used across the document tests.
pub fn invoice_fields() -> Vec<FieldDefinition> {
    vec![
        FieldDefinition::new("invoice_number", FieldType::String)
            .required()
            .unique(),
        FieldDefinition::new("amount", FieldType::Number).required(),
        FieldDefinition::new("status", FieldType::String)
            .with_allowed_values(vec![json!("open"), json!("closed")]),
        FieldDefinition::new("customer", FieldType::String),
        FieldDefinition::new("issued_on", FieldType::Date),
    ]
}

pub fn payload(value: Value) -> Map<String, Value> {
    value.as_object().cloned().expect("object payload")
}
