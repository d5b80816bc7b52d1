use thiserror::Error;

/// Errors raised while turning a request into SQL
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompileError {
    /// Expression tag, operator, aggregate, grouping option or relationship
    /// kind that this compiler does not implement.
    #[error("Unsupported feature: {0}")]
    UnsupportedFeature(String),

    /// Schema or alias information missing or inconsistent with the request.
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl CompileError {
    pub fn unsupported(what: impl Into<String>) -> Self {
        CompileError::UnsupportedFeature(what.into())
    }

    pub fn configuration(what: impl Into<String>) -> Self {
        CompileError::Configuration(what.into())
    }
}
