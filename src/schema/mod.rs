pub mod registry;
pub mod types;
pub mod validation;

pub use registry::SchemaRegistry;

// Re-export the main types at the schema module level
pub use types::{FieldDefinition, FieldType, SchemaCreate, SchemaDefinition, SchemaPatch};
