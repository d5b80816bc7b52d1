//! ndc-duck SQL compiler
//!
//! Compiles NDC query requests into parameterized DuckDB statements whose
//! single JSON column already has the nested response shape. Pure: no I/O.

pub mod aggregate;
pub mod classify;
pub mod context;
pub mod error;
pub mod expression;
pub mod planner;
pub mod query;
pub mod sql;

pub use error::CompileError;
pub use planner::{compile, plan};
pub use query::{CompiledPlan, QueryCompiler, StatementKind};
pub use sql::{QueryParam, Statement};
