use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::fields::FieldDefinition;

/// One stored schema version for a (tenant, document type) pair.
///
/// At most one version per pair is active at any time; the registry enforces
/// this on every create/activate/update path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaDefinition {
    pub id: String,
    pub tenant_id: String,
    pub document_type: String,
    pub version: u32,
    pub is_active: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub fields: Vec<FieldDefinition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_by: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SchemaDefinition {
    pub fn field(&self, name: &str) -> Option<&FieldDefinition> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn field_names(&self) -> Vec<&str> {
        self.fields.iter().map(|f| f.name.as_str()).collect()
    }
}

/// Input for registering a new schema version.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaCreate {
    pub tenant_id: String,
    pub document_type: String,
    #[serde(default)]
    pub fields: Vec<FieldDefinition>,
    #[serde(default)]
    pub is_active: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Explicit version number; auto-assigned as max(existing)+1 when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,
}

impl SchemaCreate {
    #[must_use]
    pub fn new(tenant_id: impl Into<String>, document_type: impl Into<String>) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            document_type: document_type.into(),
            fields: Vec::new(),
            is_active: false,
            description: None,
            version: None,
            created_by: None,
        }
    }

    #[must_use]
    pub fn with_fields(mut self, fields: Vec<FieldDefinition>) -> Self {
        self.fields = fields;
        self
    }

    #[must_use]
    pub fn active(mut self) -> Self {
        self.is_active = true;
        self
    }

    #[must_use]
    pub fn with_version(mut self, version: u32) -> Self {
        self.version = Some(version);
        self
    }
}

/// Partial update applied to an existing schema version.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SchemaPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fields: Option<Vec<FieldDefinition>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_active: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_by: Option<String>,
}
