//! Error types shared by the engine, the plan aggregate and the stores

use miette::Diagnostic;
use thiserror::Error;

use crate::core::identity::{EntityId, EntityPrefix, IdParseError};
use crate::yaml::PlanSyntaxError;

/// Result alias used throughout the library
pub type Result<T, E = HaccpError> = std::result::Result<T, E>;

/// Every failure the HACCP engine can report to a caller
#[derive(Debug, Error, Diagnostic)]
pub enum HaccpError {
    #[error("{field} must be an integer between 1 and 5 (got {value})")]
    #[diagnostic(
        code(haccp::range),
        help("likelihood and severity are ordinal ratings from 1 (lowest) to 5 (highest)")
    )]
    Range { field: &'static str, value: i64 },

    #[error("configuration error: {0}")]
    #[diagnostic(
        code(haccp::configuration),
        help("a CCP needs at least one critical limit bound (--min and/or --max)")
    )]
    Configuration(String),

    #[error("validation failed: {0}")]
    #[diagnostic(code(haccp::validation))]
    Validation(String),

    #[error("{kind} {id} was modified concurrently (expected revision {expected}, found {found})")]
    #[diagnostic(
        code(haccp::conflict),
        help("re-read the plan and apply the edit again")
    )]
    Conflict {
        kind: &'static str,
        id: String,
        expected: u32,
        found: u32,
    },

    #[error("plan for {0} is locked by another writer")]
    #[diagnostic(
        code(haccp::conflict),
        help("another command is updating this plan; retry once it finishes")
    )]
    Locked(String),

    #[error("{kind} not found: {id}")]
    #[diagnostic(code(haccp::not_found))]
    NotFound { kind: &'static str, id: String },

    #[error(transparent)]
    #[diagnostic(code(haccp::id))]
    Id(#[from] IdParseError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Yaml(Box<PlanSyntaxError>),

    #[error("IO error: {0}")]
    #[diagnostic(code(haccp::io))]
    Io(#[from] std::io::Error),
}

impl HaccpError {
    /// Build a `NotFound` error for the given id
    pub fn not_found(id: &EntityId) -> Self {
        HaccpError::NotFound {
            kind: id.prefix().kind(),
            id: id.to_string(),
        }
    }

    /// Build a `NotFound` error from a free-form query
    pub fn not_found_query(prefix: EntityPrefix, query: impl Into<String>) -> Self {
        HaccpError::NotFound {
            kind: prefix.kind(),
            id: query.into(),
        }
    }

    /// Wrap a parse failure of a stored plan file
    pub fn yaml(err: &serde_yml::Error, source: &str, filename: &str) -> Self {
        HaccpError::Yaml(Box::new(PlanSyntaxError::from_serde_error(err, source, filename)))
    }

    /// Whether the error is a concurrent-write collision the caller may retry
    pub fn is_conflict(&self) -> bool {
        matches!(self, HaccpError::Conflict { .. } | HaccpError::Locked(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_names_kind() {
        let id = EntityId::new(EntityPrefix::Ccp);
        let err = HaccpError::not_found(&id);
        assert!(err.to_string().starts_with("CCP not found: CCP-"));
    }

    #[test]
    fn test_conflict_is_retryable() {
        let err = HaccpError::Conflict {
            kind: "product",
            id: "PROD-X".to_string(),
            expected: 2,
            found: 3,
        };
        assert!(err.is_conflict());
        assert!(HaccpError::Locked("PROD-X".to_string()).is_conflict());
        assert!(!HaccpError::Validation("x".to_string()).is_conflict());
    }
}
