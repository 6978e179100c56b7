//! # FolioDB
//!
//! A multi-tenant document engine: each tenant defines its own document
//! types (invoices, purchase orders, ...) at runtime, the engine versions
//! those definitions, keeps exactly one version active per (tenant, type)
//! pair, validates incoming documents against the active shape, and manages
//! the backing collections and uniqueness indexes as shapes change.
//!
//! ## Core components
//!
//! * `schema` - versioned schema definitions, the registry, and the payload
//!   validator
//! * `documents` - the collection config cache, index reconciliation, and
//!   the document access layer
//! * `db_operations` - the sled storage layer: trees, dynamic collections,
//!   secondary indexes
//! * `engine` - the [`FolioDb`] facade embedders interact with
//! * `tenants` - the tenant existence oracle seam
//! * `error`, `config`, `logging` - the usual ambient concerns
//!
//! Documents themselves are open JSON maps; all shape enforcement happens in
//! the validator before a write, never in storage.

pub mod config;
pub mod db_operations;
pub mod documents;
pub mod engine;
pub mod error;
pub mod logging;
pub mod schema;
pub mod tenants;

// Re-export the main types for convenience
pub use config::{EngineConfig, SearchConfig, StorageConfig};
pub use engine::FolioDb;
pub use error::{EngineError, EngineResult, ValidationReport};
pub use schema::{
    FieldDefinition, FieldType, SchemaCreate, SchemaDefinition, SchemaPatch, SchemaRegistry,
};
pub use tenants::{OpenTenantDirectory, StaticTenantDirectory, TenantDirectory};
