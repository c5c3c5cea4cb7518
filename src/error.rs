//! # Query Errors
//!
//! Domain error type shared by the builders, renderers, adapters and
//! repositories.
//!
//! Failures fall into three families that callers must be able to tell apart:
//! - IR problems (`MalformedIr`, `UnsupportedStage`, `UnsupportedCondition`),
//!   raised before any I/O is attempted
//! - driver failures, wrapped together with the query that caused them
//! - "nothing matched" on single-document reads and writes

use serde_json::Value;
use thiserror::Error;

use crate::driver::DriverError;

/// Result type for query operations
pub type QueryResult<T> = Result<T, QueryError>;

/// Query errors
#[derive(Debug, Error)]
pub enum QueryError {
    // ==================
    // IR Errors
    // ==================
    /// The IR is structurally invalid
    #[error("Malformed query: {0}")]
    MalformedIr(String),

    /// The bound renderer cannot compile this stage kind
    #[error("Stage {stage} is not supported by the {renderer} renderer")]
    UnsupportedStage {
        renderer: &'static str,
        stage: &'static str,
    },

    /// The condition cannot be expressed in the requested context
    #[error("Condition {condition} cannot be rendered in {context} context")]
    UnsupportedCondition {
        condition: &'static str,
        context: &'static str,
    },

    // ==================
    // Execution Errors
    // ==================
    /// The driver rejected or failed the operation
    #[error("[{module}] database operation failed: {source}")]
    Driver {
        module: String,
        /// Rendered filter or pipeline that was being executed
        query: Value,
        #[source]
        source: DriverError,
    },

    /// No document matched a single-document read or write
    #[error("[{module}] {message}")]
    NotFound { module: String, message: String },

    /// The driver reported an outcome that cannot be interpreted
    #[error("[{module}] {message}")]
    Unknown { module: String, message: String },

    /// A document could not be converted to or from its typed shape
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),
}

impl QueryError {
    /// Create a malformed IR error
    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::MalformedIr(msg.into())
    }

    /// Create a not found error
    pub fn not_found(module: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::NotFound {
            module: module.into(),
            message: msg.into(),
        }
    }

    /// Create an unknown-outcome error
    pub fn unknown(module: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Unknown {
            module: module.into(),
            message: msg.into(),
        }
    }

    /// Wrap a driver failure together with the query that caused it
    pub fn driver(module: impl Into<String>, query: Value, source: DriverError) -> Self {
        Self::Driver {
            module: module.into(),
            query,
            source,
        }
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Get the error code
    pub fn code(&self) -> &'static str {
        match self {
            Self::MalformedIr(_) => "MALFORMED_QUERY",
            Self::UnsupportedStage { .. } => "UNSUPPORTED_STAGE",
            Self::UnsupportedCondition { .. } => "UNSUPPORTED_CONDITION",
            Self::Driver { .. } => "DATABASE_ERROR",
            Self::NotFound { .. } => "NOT_FOUND",
            Self::Unknown { .. } => "UNKNOWN_ERROR",
            Self::Serialization(_) => "SERIALIZATION_ERROR",
            Self::Config(_) => "CONFIG_ERROR",
        }
    }

    /// True for errors detected before any I/O was attempted
    pub fn is_ir_error(&self) -> bool {
        matches!(
            self,
            Self::MalformedIr(_) | Self::UnsupportedStage { .. } | Self::UnsupportedCondition { .. }
        )
    }

    /// True when nothing matched a single-document operation
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// The query attached to a driver failure, if any
    pub fn query(&self) -> Option<&Value> {
        match self {
            Self::Driver { query, .. } => Some(query),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_error_codes() {
        assert_eq!(QueryError::malformed("x").code(), "MALFORMED_QUERY");
        assert_eq!(
            QueryError::UnsupportedStage {
                renderer: "base",
                stage: "VECTOR_SEARCH"
            }
            .code(),
            "UNSUPPORTED_STAGE"
        );
        assert_eq!(QueryError::not_found("M", "none").code(), "NOT_FOUND");
    }

    #[test]
    fn test_driver_error_keeps_query() {
        let err = QueryError::driver(
            "CASES",
            json!([{ "$match": { "a": 1 } }]),
            DriverError::connection("refused"),
        );

        assert_eq!(err.query(), Some(&json!([{ "$match": { "a": 1 } }])));
        assert!(!err.is_ir_error());
        assert!(!err.is_not_found());
        assert!(err.to_string().contains("CASES"));
    }

    #[test]
    fn test_ir_errors_are_classified() {
        assert!(QueryError::malformed("empty pipeline").is_ir_error());
        assert!(QueryError::UnsupportedCondition {
            condition: "EXISTS",
            context: "field comparison"
        }
        .is_ir_error());
        assert!(QueryError::not_found("M", "No matching item found.").is_not_found());
    }
}
