//! Query planner: one compiled plan per variable set

use ndc_duck_ir::{DuckDbConfig, QueryRequest, VariableSet};
use tracing::debug;

use crate::context::CompileContext;
use crate::error::CompileError;
use crate::query::{CompiledPlan, QueryCompiler};

/// Compile `request` once against a single binding environment
pub fn compile(
    config: &DuckDbConfig,
    request: &QueryRequest,
    variables: &VariableSet,
) -> Result<CompiledPlan, CompileError> {
    let ctx = CompileContext {
        config,
        relationships: &request.collection_relationships,
        variables,
    };
    QueryCompiler::new(ctx).compile(&request.collection, &request.query)
}

/// Compile `request` for each of its variable sets, in input order.
///
/// Without variables the request compiles once with no bindings. The first
/// failing set fails the whole batch.
pub fn plan(config: &DuckDbConfig, request: &QueryRequest) -> Result<Vec<CompiledPlan>, CompileError> {
    let empty = VariableSet::new();
    let sets: Vec<&VariableSet> = match &request.variables {
        Some(sets) => sets.iter().collect(),
        None => vec![&empty],
    };

    let plans = sets
        .into_iter()
        .enumerate()
        .map(|(i, variables)| {
            let plan = compile(config, request, variables)?;
            for (kind, stmt) in plan.statements() {
                debug!(
                    index = i,
                    kind = ?kind,
                    params = stmt.params.len(),
                    sql = %stmt.sql,
                    "Compiled statement"
                );
            }
            Ok(plan)
        })
        .collect::<Result<Vec<_>, CompileError>>()?;

    debug!(collection = %request.collection, plans = plans.len(), "Planned request");
    Ok(plans)
}
