pub mod fields;
pub mod schema;

pub use fields::{json_kind, FieldDefinition, FieldType};
pub use schema::{SchemaCreate, SchemaDefinition, SchemaPatch};
