//! NDC query server backed by DuckDB
//!
//! Accepts NDC query requests over HTTP, compiles each into DuckDB SQL and
//! returns one row set per variable set.

use std::sync::Arc;

use anyhow::Context;
use ndc_duck_exec::{introspect, ConnectionPool, QueryEngine};
use tracing::info;

mod config;
mod logging;
mod routes;

use config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config_path = std::env::var("NDC_DUCK_CONFIG").unwrap_or_else(|_| "config.yaml".to_string());
    let config = Config::load(&config_path).with_context(|| format!("loading {config_path}"))?;
    logging::init(&config.logging);

    let pool = ConnectionPool::open_url(&config.database.path, config.database.max_connections)
        .with_context(|| format!("opening database {}", config.database.path))?;

    let schema = match &config.database.schema_path {
        Some(path) => config::load_schema(path).with_context(|| format!("loading schema {path}"))?,
        None => pool.with_root(introspect).context("introspecting database")?,
    };
    info!(
        database = %config.database.path,
        collections = schema.collection_names.len(),
        max_connections = pool.max_connections(),
        "Schema ready"
    );

    let state = routes::AppState {
        engine: QueryEngine::new(Arc::new(pool), schema),
    };

    let address = config.address();
    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .with_context(|| format!("binding {address}"))?;
    info!("Starting ndc-duck server on {}", address);

    axum::serve(listener, routes::router(state)).await?;
    Ok(())
}
