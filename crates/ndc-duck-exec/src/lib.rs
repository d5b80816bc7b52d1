//! DuckDB execution for compiled NDC queries
//!
//! [`QueryEngine`] plans a request with `ndc-duck-sql`, runs the plans on a
//! pooled connection each and returns one [`RowSet`] per variable set.

pub mod error;
pub mod executor;
pub mod introspect;
pub mod pool;

use std::sync::Arc;

use ndc_duck_ir::{DuckDbConfig, QueryRequest, QueryResponse};
use ndc_duck_sql::CompiledPlan;
use tracing::debug;

pub use error::{ErrorResponse, ExecutionError, QueryError};
pub use executor::{run_plan, Executor};
pub use introspect::{introspect, IntrospectError};
pub use ndc_duck_ir::RowSet;
pub use pool::{ConnectionPool, ConnectionSource, PooledConnection, DEFAULT_MAX_CONNECTIONS};

pub struct QueryEngine<S = ConnectionPool> {
    executor: Executor<S>,
    config: Arc<DuckDbConfig>,
}

impl<S> Clone for QueryEngine<S> {
    fn clone(&self) -> Self {
        Self {
            executor: self.executor.clone(),
            config: Arc::clone(&self.config),
        }
    }
}

impl<S: ConnectionSource + 'static> QueryEngine<S> {
    pub fn new(source: Arc<S>, config: DuckDbConfig) -> Self {
        Self {
            executor: Executor::new(source),
            config: Arc::new(config),
        }
    }

    pub fn config(&self) -> &DuckDbConfig {
        &self.config
    }

    pub fn source(&self) -> &S {
        self.executor.source()
    }

    /// Plan and execute; the response has one row set per variable set
    pub async fn query(&self, request: &QueryRequest) -> Result<QueryResponse, QueryError> {
        let plans = self.explain(request)?;
        Ok(self.executor.execute(plans).await?)
    }

    /// Plan only
    pub fn explain(&self, request: &QueryRequest) -> Result<Vec<CompiledPlan>, QueryError> {
        let plans = ndc_duck_sql::plan(&self.config, request)?;
        debug!(fingerprint = %request.fingerprint(), plans = plans.len(), "Planned query");
        Ok(plans)
    }
}
