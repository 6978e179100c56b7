//! Unified error handling for the engine.
//!
//! Every fallible operation in the crate returns [`EngineResult`]. The four
//! request-facing kinds (`BadRequest`, `NotFound`, `Conflict`, `Validation`)
//! carry human-readable messages and map onto transport status codes via
//! [`EngineError::status_code`]; the remaining variants are internal faults.

use std::fmt;

use thiserror::Error;

/// Errors surfaced by the document engine.
#[derive(Error, Debug)]
pub enum EngineError {
    /// Malformed input: unparseable identifiers, illegal names, bad search columns.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// A referenced schema, document, active version, or tenant is absent.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Duplicate version number, duplicate batch key, or unique-index collision.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Aggregated validator rule violations for a single payload.
    #[error("Validation failed: {0}")]
    Validation(ValidationReport),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Storage error: {0}")]
    Storage(#[from] sled::Error),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

impl EngineError {
    /// HTTP-style status code for the surrounding request layer.
    pub fn status_code(&self) -> u16 {
        match self {
            EngineError::BadRequest(_) => 400,
            EngineError::NotFound(_) => 404,
            EngineError::Conflict(_) => 409,
            EngineError::Validation(_) => 422,
            EngineError::Config(_)
            | EngineError::Internal(_)
            | EngineError::Storage(_)
            | EngineError::Serde(_) => 500,
        }
    }

    /// True for the four request-facing kinds that pass through the access
    /// layer unchanged.
    pub fn is_domain_error(&self) -> bool {
        matches!(
            self,
            EngineError::BadRequest(_)
                | EngineError::NotFound(_)
                | EngineError::Conflict(_)
                | EngineError::Validation(_)
        )
    }
}

/// All rule violations found while validating one payload, reported together.
#[derive(Debug, Clone, Default)]
pub struct ValidationReport {
    violations: Vec<String>,
}

impl ValidationReport {
    pub fn new(violations: Vec<String>) -> Self {
        Self { violations }
    }

    pub fn violations(&self) -> &[String] {
        &self.violations
    }

    pub fn is_empty(&self) -> bool {
        self.violations.is_empty()
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.violations.join("; "))
    }
}

impl From<ValidationReport> for EngineError {
    fn from(report: ValidationReport) -> Self {
        EngineError::Validation(report)
    }
}

pub type EngineResult<T> = Result<T, EngineError>;
