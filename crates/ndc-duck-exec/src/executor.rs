//! Executor: runs compiled plans and decodes their JSON results

use std::sync::Arc;
use std::time::Instant;

use duckdb::{params_from_iter, Connection};
use futures::future::try_join_all;
use ndc_duck_ir::{Group, Row, RowSet};
use ndc_duck_sql::{CompiledPlan, Statement, StatementKind};
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::error::ExecutionError;
use crate::pool::ConnectionSource;

#[derive(Deserialize)]
struct RowsDocument {
    rows: Vec<Row>,
}

/// Run one statement and parse its single JSON text cell
pub fn run_statement(conn: &Connection, stmt: &Statement) -> Result<serde_json::Value, ExecutionError> {
    let mut prepared = conn.prepare(&stmt.sql)?;
    let text: Option<String> = prepared
        .query_row(params_from_iter(stmt.bind_values()), |row| row.get(0))?;
    let text = text.ok_or_else(|| ExecutionError::TypeMismatch("statement returned NULL".to_string()))?;
    Ok(serde_json::from_str(&text)?)
}

/// Run every populated statement of `plan` on `conn`
pub fn run_plan(conn: &Connection, plan: &CompiledPlan) -> Result<RowSet, ExecutionError> {
    let mut row_set = RowSet::default();
    for (kind, stmt) in plan.statements() {
        let document = run_statement(conn, stmt)?;
        match kind {
            StatementKind::Rows => {
                let parsed: RowsDocument = serde_json::from_value(document)?;
                row_set.rows = Some(parsed.rows);
            }
            StatementKind::Aggregates => {
                if !document.is_object() {
                    return Err(ExecutionError::TypeMismatch(format!(
                        "aggregates result is not an object: {}",
                        document
                    )));
                }
                row_set.aggregates = Some(serde_json::from_value(document)?);
            }
            StatementKind::Groups => {
                let groups: Vec<Group> = serde_json::from_value(document)?;
                row_set.groups = Some(groups);
            }
        }
    }
    Ok(row_set)
}

pub struct Executor<S> {
    source: Arc<S>,
}

impl<S> Clone for Executor<S> {
    fn clone(&self) -> Self {
        Self {
            source: Arc::clone(&self.source),
        }
    }
}

impl<S: ConnectionSource + 'static> Executor<S> {
    pub fn new(source: Arc<S>) -> Self {
        Self { source }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Execute `plans` concurrently; results come back in input order.
    ///
    /// The first failure fails the batch and drops the outstanding plans.
    pub async fn execute(&self, plans: Vec<CompiledPlan>) -> Result<Vec<RowSet>, ExecutionError> {
        let started = Instant::now();
        let count = plans.len();

        let results = try_join_all(
            plans
                .into_iter()
                .enumerate()
                .map(|(index, plan)| self.execute_plan(index, plan)),
        )
        .await
        .map_err(|e| {
            warn!(error = %e, "Query batch failed");
            e
        })?;

        info!(
            plans = count,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Executed query batch"
        );
        Ok(results)
    }

    async fn execute_plan(&self, index: usize, plan: CompiledPlan) -> Result<RowSet, ExecutionError> {
        let conn = self.source.acquire().await?;
        let started = Instant::now();

        // The handle moves into the blocking task, so it is returned even if
        // this future is dropped first.
        let row_set = tokio::task::spawn_blocking(move || run_plan(&conn, &plan))
            .await
            .map_err(|e| ExecutionError::Task(e.to_string()))??;

        debug!(
            index,
            rows = row_set.rows.as_ref().map(Vec::len),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Executed plan"
        );
        Ok(row_set)
    }
}
