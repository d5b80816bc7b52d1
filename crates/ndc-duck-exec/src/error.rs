//! Error taxonomy shared by the executor and the request layer

use ndc_duck_sql::CompileError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("Database error: {0}")]
    Database(#[from] duckdb::Error),

    #[error("Failed to decode result: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Type mismatch: {0}")]
    TypeMismatch(String),

    #[error("Worker task failed: {0}")]
    Task(String),

    #[error("Connection pool is closed")]
    PoolClosed,
}

/// User-facing failure of a query request
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryError {
    #[error("{0}")]
    UnsupportedFeature(String),

    #[error("{0}")]
    Configuration(String),

    /// Result document did not have the shape the plan promised
    #[error("{0}")]
    TypeMismatch(String),

    #[error("{0}")]
    Execution(String),
}

impl QueryError {
    /// Machine-stable reason tag
    pub fn reason(&self) -> &'static str {
        match self {
            QueryError::UnsupportedFeature(_) => "unsupported_feature",
            QueryError::Configuration(_) => "configuration_error",
            QueryError::TypeMismatch(_) => "type_mismatch",
            QueryError::Execution(_) => "execution_error",
        }
    }

    pub fn to_response(&self) -> ErrorResponse {
        ErrorResponse {
            reason: self.reason().to_string(),
            message: self.to_string(),
        }
    }
}

impl From<CompileError> for QueryError {
    fn from(err: CompileError) -> Self {
        match err {
            CompileError::UnsupportedFeature(msg) => QueryError::UnsupportedFeature(msg),
            CompileError::Configuration(msg) => QueryError::Configuration(msg),
        }
    }
}

impl From<ExecutionError> for QueryError {
    fn from(err: ExecutionError) -> Self {
        match err {
            ExecutionError::Decode(_) | ExecutionError::TypeMismatch(_) => {
                QueryError::TypeMismatch(err.to_string())
            }
            ExecutionError::Database(_) | ExecutionError::Task(_) | ExecutionError::PoolClosed => {
                QueryError::Execution(err.to_string())
            }
        }
    }
}

/// Serialized error body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub reason: String,
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compile_errors_keep_their_kind() {
        let err: QueryError = CompileError::unsupported("exists over unrelated collection 'x'").into();
        assert_eq!(err.reason(), "unsupported_feature");
        assert_eq!(err.to_string(), "exists over unrelated collection 'x'");

        let err: QueryError = CompileError::configuration("relationship 'r' not found").into();
        assert_eq!(err.reason(), "configuration_error");
    }

    #[test]
    fn test_execution_errors_split_by_cause() {
        let decode = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err: QueryError = ExecutionError::Decode(decode).into();
        assert_eq!(err.reason(), "type_mismatch");

        let err: QueryError = ExecutionError::Task("panicked".into()).into();
        assert_eq!(err.reason(), "execution_error");
        assert_eq!(
            err.to_response(),
            ErrorResponse {
                reason: "execution_error".into(),
                message: "Worker task failed: panicked".into(),
            }
        );
    }
}
