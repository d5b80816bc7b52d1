//! SQL text building and parameter binding
//!
//! Every fragment that carries request data goes through this module:
//! identifiers and JSON keys are quoted here, and values only ever reach the
//! SQL text as `?` placeholders emitted by [`Statement::bind`].

use serde::Serialize;

/// Value bound to a `?` placeholder
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum QueryParam {
    Null,
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    String(String),
}

impl From<&serde_json::Value> for QueryParam {
    fn from(value: &serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => QueryParam::Null,
            serde_json::Value::Bool(b) => QueryParam::Bool(*b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    QueryParam::Int(i)
                } else if let Some(u) = n.as_u64() {
                    QueryParam::UInt(u)
                } else {
                    QueryParam::Float(n.as_f64().unwrap_or(f64::NAN))
                }
            }
            serde_json::Value::String(s) => QueryParam::String(s.clone()),
            // Structured values bind as their JSON text
            other => QueryParam::String(other.to_string()),
        }
    }
}

impl From<&QueryParam> for duckdb::types::Value {
    fn from(param: &QueryParam) -> Self {
        use duckdb::types::Value;
        match param {
            QueryParam::Null => Value::Null,
            QueryParam::Bool(b) => Value::Boolean(*b),
            QueryParam::Int(i) => Value::BigInt(*i),
            QueryParam::UInt(u) => Value::UBigInt(*u),
            QueryParam::Float(f) => Value::Double(*f),
            QueryParam::String(s) => Value::Text(s.clone()),
        }
    }
}

/// SQL text plus its positional parameters
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<QueryParam>,
}

impl Statement {
    pub fn new() -> Self {
        Self::default()
    }

    /// Statement with no placeholders
    pub fn raw(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            params: Vec::new(),
        }
    }

    pub fn push_str(&mut self, sql: &str) -> &mut Self {
        self.sql.push_str(sql);
        self
    }

    /// Emit one placeholder and record its value
    pub fn bind(&mut self, param: QueryParam) -> &mut Self {
        self.sql.push('?');
        self.params.push(param);
        self
    }

    /// Emit `shape`, where `shape` contains exactly one `?`, binding `param` to it
    pub fn bind_shaped(&mut self, shape: ParamShape, param: QueryParam) -> &mut Self {
        match shape {
            ParamShape::Plain => self.bind(param),
            ParamShape::Cast(sql_type) => {
                self.sql.push_str("CAST(");
                self.bind(param);
                self.sql.push_str(" AS ");
                self.sql.push_str(sql_type);
                self.sql.push(')');
                self
            }
        }
    }

    /// Concatenate another statement, keeping placeholder order
    pub fn append(&mut self, other: &Statement) -> &mut Self {
        self.sql.push_str(&other.sql);
        self.params.extend(other.params.iter().cloned());
        self
    }

    /// Append `parts` separated by `separator`
    pub fn append_joined(&mut self, parts: &[Statement], separator: &str) -> &mut Self {
        for (i, part) in parts.iter().enumerate() {
            if i > 0 {
                self.sql.push_str(separator);
            }
            self.append(part);
        }
        self
    }

    /// `(self)` as a new statement
    pub fn parenthesized(&self) -> Statement {
        let mut out = Statement::raw("(");
        out.append(self);
        out.push_str(")");
        out
    }

    /// Parameters as DuckDB bind values, in placeholder order
    pub fn bind_values(&self) -> Vec<duckdb::types::Value> {
        self.params.iter().map(duckdb::types::Value::from).collect()
    }

    /// Number of `?` placeholders outside quoted literals and identifiers
    pub fn placeholder_count(&self) -> usize {
        let mut count = 0;
        let mut quote: Option<char> = None;
        for c in self.sql.chars() {
            match (quote, c) {
                (None, '\'') | (None, '"') => quote = Some(c),
                (Some(q), c) if c == q => quote = None,
                (None, '?') => count += 1,
                _ => {}
            }
        }
        count
    }
}

/// Right-hand side shape for a bound comparison value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamShape {
    /// `?`
    Plain,
    /// `CAST(? AS <type>)`
    Cast(&'static str),
}

/// Quote an identifier: `a"b` → `"a""b"`
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Quote each part of a dotted storage identifier: `db.main.users` → `"db"."main"."users"`
pub fn quote_table(storage: &str) -> String {
    storage
        .split('.')
        .map(quote_ident)
        .collect::<Vec<_>>()
        .join(".")
}

/// Quote a JSON object key as a string literal: `it's` → `'it''s'`
pub fn quote_key(key: &str) -> String {
    format!("'{}'", key.replace('\'', "''"))
}

/// `"alias"."column"`
pub fn qualified(alias: &str, column: &str) -> String {
    format!("{}.{}", quote_ident(alias), quote_ident(column))
}
