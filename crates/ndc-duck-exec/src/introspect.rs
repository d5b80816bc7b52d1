//! Catalog introspection: build the schema object from `information_schema`

use duckdb::{Connection, Result as DuckResult};
use ndc_duck_ir::{DuckDbConfig, FieldType, ObjectField, ObjectType, ScalarType};
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum IntrospectError {
    #[error("Database error: {0}")]
    Database(#[from] duckdb::Error),

    #[error("Unsupported type '{data_type}' for column '{column}' of table '{table}'")]
    UnsupportedType {
        table: String,
        column: String,
        data_type: String,
    },
}

/// Columns in ordinal order, with the table (or view) and column comments
const COLUMNS_QUERY: &str = "
    SELECT c.table_catalog, c.table_schema, c.table_name, c.column_name, c.data_type, c.is_nullable,
           dc.comment, COALESCE(t.comment, v.comment)
    FROM information_schema.columns c
    LEFT JOIN duckdb_columns() dc
      ON dc.database_name = c.table_catalog AND dc.schema_name = c.table_schema
     AND dc.table_name = c.table_name AND dc.column_name = c.column_name
    LEFT JOIN duckdb_tables() t
      ON t.database_name = c.table_catalog AND t.schema_name = c.table_schema
     AND t.table_name = c.table_name
    LEFT JOIN duckdb_views() v
      ON v.database_name = c.table_catalog AND v.schema_name = c.table_schema
     AND v.view_name = c.table_name
    WHERE c.table_catalog NOT IN ('system', 'temp')
      AND c.table_schema NOT IN ('information_schema', 'pg_catalog')
    ORDER BY c.table_catalog, c.table_schema, c.table_name, c.ordinal_position
";

/// Map a DuckDB type name to a field type, `None` if it has no mapping
pub fn map_type(data_type: &str) -> Option<FieldType> {
    if let Some(element) = data_type.strip_suffix("[]") {
        return map_type(element).map(FieldType::array);
    }

    let scalar = match data_type {
        "BIGINT" => ScalarType::BigInt,
        "UBIGINT" => ScalarType::UBigInt,
        "HUGEINT" => ScalarType::HugeInt,
        "UHUGEINT" => ScalarType::UHugeInt,
        "TINYINT" | "SMALLINT" | "INTEGER" | "UTINYINT" | "USMALLINT" | "UINTEGER" => ScalarType::Int,
        "REAL" | "FLOAT" | "DOUBLE" => ScalarType::Float,
        t if t.starts_with("DECIMAL") => ScalarType::Float,
        "BOOLEAN" => ScalarType::Boolean,
        "TIMESTAMP" | "TIMESTAMP_S" | "TIMESTAMP_MS" | "TIMESTAMP_NS" => ScalarType::Timestamp,
        "TIMESTAMP WITH TIME ZONE" => ScalarType::TimestampTz,
        "JSON" => ScalarType::Json,
        "VARCHAR" | "DATE" | "TIME" | "INTERVAL" | "UUID" | "BLOB" | "BIT" => ScalarType::String,
        _ => return None,
    };
    Some(FieldType::named(scalar.name()))
}

struct ColumnRow {
    catalog: String,
    schema: String,
    table: String,
    column: String,
    data_type: String,
    nullable: bool,
    column_comment: Option<String>,
    table_comment: Option<String>,
}

/// Unset comments come back as NULL or ''
fn description(comment: Option<String>) -> Option<String> {
    comment.filter(|c| !c.trim().is_empty())
}

struct TableEntry {
    storage: String,
    table: String,
    object_type: ObjectType,
}

/// Read every user table and view into a [`DuckDbConfig`].
///
/// Collections are named after their table and aliased to
/// `catalog.schema.table`. A table name seen twice gets its schema prefixed.
pub fn introspect(conn: &Connection) -> Result<DuckDbConfig, IntrospectError> {
    let mut stmt = conn.prepare(COLUMNS_QUERY)?;
    let columns = stmt
        .query_map([], |row| {
            Ok(ColumnRow {
                catalog: row.get(0)?,
                schema: row.get(1)?,
                table: row.get(2)?,
                column: row.get(3)?,
                data_type: row.get(4)?,
                nullable: row.get::<_, String>(5)? == "YES",
                column_comment: row.get(6)?,
                table_comment: row.get(7)?,
            })
        })?
        .collect::<DuckResult<Vec<_>>>()?;

    // Group consecutive rows by table, keeping ordinal order
    let mut tables: Vec<TableEntry> = Vec::new();
    for row in columns {
        let storage = format!("{}.{}.{}", row.catalog, row.schema, row.table);
        let mut field_type = map_type(&row.data_type).ok_or_else(|| IntrospectError::UnsupportedType {
            table: storage.clone(),
            column: row.column.clone(),
            data_type: row.data_type.clone(),
        })?;
        if row.nullable {
            field_type = FieldType::nullable(field_type);
        }
        let field = ObjectField {
            field_type,
            description: description(row.column_comment),
        };

        match tables.last_mut() {
            Some(entry) if entry.storage == storage => {
                entry.object_type.fields.insert(row.column, field);
            }
            _ => {
                let mut object_type = ObjectType {
                    description: description(row.table_comment),
                    ..Default::default()
                };
                object_type.fields.insert(row.column, field);
                tables.push(TableEntry {
                    storage,
                    table: row.table,
                    object_type,
                });
            }
        }
    }

    let mut config = DuckDbConfig::new();
    for TableEntry { storage, table, object_type } in tables {
        let name = if config.object_type(&table).is_some() {
            let schema = storage.split('.').nth(1).unwrap_or_default();
            let renamed = format!("{}_{}", schema, table);
            warn!(table = %table, collection = %renamed, "Duplicate table name, prefixing schema");
            renamed
        } else {
            table
        };
        debug!(collection = %name, storage = %storage, columns = object_type.fields.len(), "Introspected table");
        config.add_object_type(name, storage, object_type);
    }

    info!(collections = config.collection_names.len(), "Introspected catalog");
    Ok(config)
}
