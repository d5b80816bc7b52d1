//! Type classifier
//!
//! Decides how a column is projected, compared or sorted from its declared
//! field type. Unknown scalar names are rejected rather than treated as plain.

use ndc_duck_ir::{FieldType, ScalarType};

use crate::error::CompileError;
use crate::sql::ParamShape;

/// Where the column is being used
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Usage {
    Projection,
    Comparison,
    Ordering,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectionStrategy {
    PlainColumn,
    /// 64/128-bit integers travel as JSON strings
    CastAsText,
    /// Right-hand side becomes `CAST(? AS TIMESTAMP)`
    TimestampCompare,
    /// Right-hand side becomes `CAST(? AS <type>)`
    WideIntegerCompare(&'static str),
    /// Sort with `COLLATE NOCASE`
    CaseInsensitiveOrder,
}

/// Resolve the scalar under any nullable/array wrappers
pub fn scalar_of(field_type: &FieldType) -> Result<ScalarType, CompileError> {
    let name = field_type.underlying_name();
    ScalarType::from_name(name)
        .ok_or_else(|| CompileError::unsupported(format!("scalar type '{}'", name)))
}

pub fn classify(field_type: &FieldType, usage: Usage) -> Result<ProjectionStrategy, CompileError> {
    let scalar = scalar_of(field_type)?;
    let strategy = match usage {
        Usage::Projection => match scalar.wide_integer_sql() {
            Some(_) => ProjectionStrategy::CastAsText,
            None => ProjectionStrategy::PlainColumn,
        },
        // Lists compare and sort as whole values
        Usage::Comparison | Usage::Ordering if field_type.is_array() => {
            ProjectionStrategy::PlainColumn
        }
        Usage::Comparison => match scalar {
            ScalarType::Timestamp | ScalarType::TimestampTz => {
                ProjectionStrategy::TimestampCompare
            }
            other => match other.wide_integer_sql() {
                Some(sql_type) => ProjectionStrategy::WideIntegerCompare(sql_type),
                None => ProjectionStrategy::PlainColumn,
            },
        },
        Usage::Ordering => match scalar {
            ScalarType::String => ProjectionStrategy::CaseInsensitiveOrder,
            _ => ProjectionStrategy::PlainColumn,
        },
    };
    Ok(strategy)
}

impl ProjectionStrategy {
    /// Column expression for a SELECT list
    pub fn project(&self, column_sql: &str) -> String {
        match self {
            ProjectionStrategy::CastAsText => format!("CAST({} AS TEXT)", column_sql),
            _ => column_sql.to_string(),
        }
    }

    /// Placeholder shape for the compared value
    pub fn param_shape(&self) -> ParamShape {
        match self {
            ProjectionStrategy::TimestampCompare => ParamShape::Cast("TIMESTAMP"),
            ProjectionStrategy::WideIntegerCompare(sql_type) => ParamShape::Cast(sql_type),
            _ => ParamShape::Plain,
        }
    }

    /// Sort key expression (direction appended by the caller)
    pub fn order_key(&self, column_sql: &str) -> String {
        match self {
            ProjectionStrategy::CaseInsensitiveOrder => format!("{} COLLATE NOCASE", column_sql),
            _ => column_sql.to_string(),
        }
    }
}
