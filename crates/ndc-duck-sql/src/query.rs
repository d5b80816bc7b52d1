//! Query compiler
//!
//! Turns one query node into up to three statements (rows, aggregates,
//! groups). Relationship fields compile recursively into correlated
//! sub-selects embedded in the parent's `JSON_OBJECT`, so a whole request
//! tree runs as a single SQL statement per member.

use indexmap::IndexMap;
use ndc_duck_ir::{
    Aggregate, Dimension, Field, Grouping, OrderBy, OrderByTarget, OrderDirection, PathElement,
    Query, Relationship,
};
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::aggregate::compile_aggregates;
use crate::classify::{classify, ProjectionStrategy, Usage};
use crate::context::{join_conditions, AliasPath, CompileContext, Scope};
use crate::error::CompileError;
use crate::expression::{compile_where, TRUE_SQL};
use crate::sql::{qualified, quote_ident, quote_key, quote_table, Statement};

/// Stand-in LIMIT for an OFFSET given without one
pub const UNBOUNDED_LIMIT: u32 = 2_147_483_647;

const EMPTY_ARRAY: &str = "JSON('[]')";
const EMPTY_OBJECT: &str = "JSON('{}')";

/// Statements produced for one query instantiation
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CompiledPlan {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rows: Option<Statement>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub aggregates: Option<Statement>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub groups: Option<Statement>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StatementKind {
    Rows,
    Aggregates,
    Groups,
}

impl CompiledPlan {
    pub fn has_rows(&self) -> bool {
        self.rows.is_some()
    }

    pub fn has_aggregates(&self) -> bool {
        self.aggregates.is_some()
    }

    pub fn has_groups(&self) -> bool {
        self.groups.is_some()
    }

    /// Populated statements in execution order
    pub fn statements(&self) -> impl Iterator<Item = (StatementKind, &Statement)> {
        [
            (StatementKind::Rows, self.rows.as_ref()),
            (StatementKind::Aggregates, self.aggregates.as_ref()),
            (StatementKind::Groups, self.groups.as_ref()),
        ]
        .into_iter()
        .filter_map(|(kind, stmt)| stmt.map(|s| (kind, s)))
    }

    /// SHA-256 of the SQL text and parameters
    pub fn fingerprint(&self) -> String {
        let json = serde_json::to_vec(self).unwrap_or_default();
        let mut hasher = Sha256::new();
        hasher.update(&json);
        format!("{:x}", hasher.finalize())
    }
}

/// Unwrapped statements for one node, before root wrapping or embedding
#[derive(Debug, Default)]
struct NodeStatements {
    rows: Option<Statement>,
    aggregates: Option<Statement>,
    groups: Option<Statement>,
}

/// Sort key resolved to a concrete column
#[derive(Debug, Clone)]
struct SortKey {
    column: String,
    strategy: ProjectionStrategy,
    direction: OrderDirection,
}

impl SortKey {
    fn render(&self, column: &str) -> String {
        let direction = match self.direction {
            OrderDirection::Asc => "ASC",
            OrderDirection::Desc => "DESC",
        };
        format!("{} {}", self.strategy.order_key(column), direction)
    }
}

/// ORDER BY keys plus the JOINs their relationship paths need
#[derive(Debug, Default)]
struct Ordering {
    joins: Statement,
    joined: Vec<String>,
    keys: Vec<SortKey>,
}

impl Ordering {
    fn order_by_clause(&self) -> String {
        if self.keys.is_empty() {
            return String::new();
        }
        let keys: Vec<String> = self.keys.iter().map(|k| k.render(&k.column)).collect();
        format!(" ORDER BY {}", keys.join(", "))
    }
}

fn sort_alias(i: usize) -> String {
    quote_ident(&format!("o{}", i))
}

fn page_clause(limit: Option<u32>, offset: Option<u32>) -> String {
    match (limit, offset) {
        (Some(limit), Some(offset)) => format!(" LIMIT {} OFFSET {}", limit, offset),
        (Some(limit), None) => format!(" LIMIT {}", limit),
        (None, Some(offset)) => format!(" LIMIT {} OFFSET {}", UNBOUNDED_LIMIT, offset),
        (None, None) => String::new(),
    }
}

/// `JSON_OBJECT('k1', e1, ...)`, or an empty object literal
fn json_object<'e>(pairs: impl IntoIterator<Item = (&'e str, &'e str)>) -> String {
    let members: Vec<String> = pairs
        .into_iter()
        .map(|(key, expr)| format!("{}, {}", quote_key(key), expr))
        .collect();
    if members.is_empty() {
        EMPTY_OBJECT.to_string()
    } else {
        format!("JSON_OBJECT({})", members.join(", "))
    }
}

/// JSON array of `expr` over the input rows, `[]` when there are none.
///
/// `JSON_GROUP_ARRAY` is a macro in DuckDB and rejects `ORDER BY`, so the
/// elements are collected with `LIST` and converted afterwards.
fn json_array_agg(expr: &str, order: &str) -> String {
    format!("COALESCE(TO_JSON(LIST({}{})), {})", expr, order, EMPTY_ARRAY)
}

/// Single text column named `data`
fn wrap_root(stmt: Statement) -> Statement {
    let mut out = Statement::raw("SELECT CAST(");
    out.append(&stmt.parenthesized());
    out.push_str(" AS VARCHAR) AS data");
    out
}

fn check_grouping(grouping: &Grouping) -> Result<(), CompileError> {
    if grouping.predicate.is_some() {
        return Err(CompileError::unsupported("predicate on groups"));
    }
    if grouping.order_by.is_some() {
        return Err(CompileError::unsupported("order_by on groups"));
    }
    Ok(())
}

pub struct QueryCompiler<'a> {
    ctx: CompileContext<'a>,
}

impl<'a> QueryCompiler<'a> {
    pub fn new(ctx: CompileContext<'a>) -> Self {
        Self { ctx }
    }

    /// Compile the root node of a request over `collection`
    pub fn compile(&self, collection: &str, query: &Query) -> Result<CompiledPlan, CompileError> {
        let path = AliasPath::new().child(collection);
        let node = self.compile_node(collection, query, &path, None)?;
        Ok(CompiledPlan {
            rows: node.rows.map(wrap_root),
            aggregates: node.aggregates.map(wrap_root),
            groups: node.groups.map(wrap_root),
        })
    }

    fn compile_node(
        &self,
        collection: &str,
        query: &Query,
        path: &AliasPath,
        parent: Option<(&Relationship, &str)>,
    ) -> Result<NodeStatements, CompileError> {
        if let Some(grouping) = &query.groups {
            check_grouping(grouping)?;
        }
        if query.fields.is_none() && query.aggregates.is_none() && query.groups.is_none() {
            return Err(CompileError::unsupported(
                "query must request fields, aggregates or groups",
            ));
        }

        let scope = Scope::new(collection, path.alias());
        let storage = self.ctx.storage_name(collection)?;
        let from = format!(" FROM {} AS {}", quote_table(storage), quote_ident(&scope.alias));
        let filter = self.compile_filter(query, &scope, parent)?;
        let ordering = self.compile_ordering(query.order_by.as_ref(), &scope)?;
        let page = page_clause(query.limit, query.offset);

        // FROM + order-path JOINs + WHERE, shared by rows and aggregates
        let mut source = Statement::raw(from.as_str());
        source.append(&ordering.joins);
        source.append(&filter);

        let mut node = NodeStatements::default();
        if let Some(fields) = &query.fields {
            node.rows = Some(self.rows_statement(fields, &scope, path, &source, &ordering, &page)?);
        }
        if let Some(aggregates) = &query.aggregates {
            node.aggregates = Some(aggregates_statement(aggregates, &scope, &source, &ordering, &page)?);
        }
        if let Some(grouping) = &query.groups {
            let mut group_source = Statement::raw(from.as_str());
            group_source.append(&filter);
            node.groups = Some(self.groups_statement(grouping, &scope, &group_source)?);
        }
        Ok(node)
    }

    /// ` WHERE <join conditions> AND (<predicate>)`, or nothing
    fn compile_filter(
        &self,
        query: &Query,
        scope: &Scope<'_>,
        parent: Option<(&Relationship, &str)>,
    ) -> Result<Statement, CompileError> {
        let mut conditions: Vec<Statement> = match parent {
            Some((relationship, parent_alias)) => join_conditions(relationship, parent_alias, &scope.alias)
                .into_iter()
                .map(Statement::raw)
                .collect(),
            None => Vec::new(),
        };
        if let Some(predicate) = &query.predicate {
            conditions.push(compile_where(&self.ctx, predicate, scope)?.parenthesized());
        }

        let mut out = Statement::new();
        if !conditions.is_empty() {
            out.push_str(" WHERE ");
            out.append_joined(&conditions, " AND ");
        }
        Ok(out)
    }

    fn compile_ordering(&self, order_by: Option<&OrderBy>, scope: &Scope<'_>) -> Result<Ordering, CompileError> {
        let mut ordering = Ordering::default();
        let Some(order_by) = order_by else {
            return Ok(ordering);
        };

        for element in &order_by.elements {
            match &element.target {
                OrderByTarget::Column { name, path } => {
                    let (collection, alias) = self.join_path(path, scope, &mut ordering)?;
                    let field_type = self.ctx.field_type(&collection, name)?;
                    ordering.keys.push(SortKey {
                        column: qualified(&alias, name),
                        strategy: classify(field_type, Usage::Ordering)?,
                        direction: element.order_direction,
                    });
                }
                OrderByTarget::SingleColumnAggregate { .. } | OrderByTarget::StarCountAggregate { .. } => {
                    return Err(CompileError::unsupported("ordering by an aggregate"));
                }
            }
        }
        Ok(ordering)
    }

    /// Add one LEFT JOIN per path hop not already joined; returns the
    /// collection and alias at the end of the path.
    fn join_path(
        &self,
        path: &[PathElement],
        scope: &Scope<'_>,
        ordering: &mut Ordering,
    ) -> Result<(String, String), CompileError> {
        let mut collection = scope.collection.to_string();
        let mut alias = scope.alias.clone();

        for element in path {
            let relationship = self.ctx.relationship(&element.relationship)?;
            let target = relationship.target_collection.as_str();
            let target_alias = format!("{}_{}", alias, target);

            if !ordering.joined.contains(&target_alias) {
                let storage = self.ctx.storage_name(target)?;
                let mut conditions: Vec<Statement> = join_conditions(relationship, &alias, &target_alias)
                    .into_iter()
                    .map(Statement::raw)
                    .collect();
                if let Some(predicate) = &element.predicate {
                    let target_scope = Scope::new(target, target_alias.clone());
                    conditions.push(compile_where(&self.ctx, predicate, &target_scope)?.parenthesized());
                }
                if conditions.is_empty() {
                    conditions.push(Statement::raw(TRUE_SQL));
                }

                ordering.joins.push_str(&format!(
                    " LEFT JOIN {} AS {} ON ",
                    quote_table(storage),
                    quote_ident(&target_alias)
                ));
                ordering.joins.append_joined(&conditions, " AND ");
                ordering.joined.push(target_alias.clone());
            }

            collection = target.to_string();
            alias = target_alias;
        }
        Ok((collection, alias))
    }

    fn rows_statement(
        &self,
        fields: &IndexMap<String, Field>,
        scope: &Scope<'_>,
        path: &AliasPath,
        source: &Statement,
        ordering: &Ordering,
        page: &str,
    ) -> Result<Statement, CompileError> {
        let object = self.compile_fields(fields, scope, path)?;

        let mut inner = Statement::raw("SELECT ");
        inner.append(&object);
        inner.push_str(" AS \"r\"");
        for (i, key) in ordering.keys.iter().enumerate() {
            inner.push_str(&format!(", {} AS {}", key.column, sort_alias(i)));
        }
        inner.append(source);
        inner.push_str(&ordering.order_by_clause());
        inner.push_str(page);

        // Re-sort inside the aggregate so the array keeps the requested order
        let outer_keys: Vec<String> = ordering
            .keys
            .iter()
            .enumerate()
            .map(|(i, key)| key.render(&sort_alias(i)))
            .collect();
        let array_order = if outer_keys.is_empty() {
            String::new()
        } else {
            format!(" ORDER BY {}", outer_keys.join(", "))
        };

        let mut out = Statement::raw(format!(
            "SELECT JSON_OBJECT('rows', {}) FROM (",
            json_array_agg("\"r\"", &array_order)
        ));
        out.append(&inner);
        out.push_str(") AS \"rows\"");
        Ok(out)
    }

    fn compile_fields(
        &self,
        fields: &IndexMap<String, Field>,
        scope: &Scope<'_>,
        path: &AliasPath,
    ) -> Result<Statement, CompileError> {
        if fields.is_empty() {
            return Ok(Statement::raw(EMPTY_OBJECT));
        }

        let mut out = Statement::raw("JSON_OBJECT(");
        for (i, (name, field)) in fields.iter().enumerate() {
            if i > 0 {
                out.push_str(", ");
            }
            out.push_str(&quote_key(name));
            out.push_str(", ");
            match field {
                Field::Column { column } => {
                    let field_type = self.ctx.field_type(scope.collection, column)?;
                    let strategy = classify(field_type, Usage::Projection)?;
                    out.push_str(&strategy.project(&scope.column(column)));
                }
                Field::Relationship { relationship, query } => {
                    out.append(&self.compile_relationship(relationship, query, scope, path)?);
                }
            }
        }
        out.push_str(")");
        Ok(out)
    }

    fn compile_relationship(
        &self,
        name: &str,
        query: &Query,
        scope: &Scope<'_>,
        path: &AliasPath,
    ) -> Result<Statement, CompileError> {
        let relationship = self.ctx.relationship(name)?;
        let target = relationship.target_collection.as_str();
        let child_path = path.child(target);
        let child = self.compile_node(
            target,
            query,
            &child_path,
            Some((relationship, scope.alias.as_str())),
        )?;

        let mut out = Statement::raw("COALESCE(");
        match child {
            NodeStatements {
                rows: Some(rows),
                aggregates: None,
                groups: None,
            } => {
                out.append(&rows.parenthesized());
            }
            NodeStatements { rows, aggregates, groups } => {
                let mut members = Vec::new();
                if let Some(rows) = rows {
                    let mut member = Statement::raw("'rows', JSON_EXTRACT(");
                    member.append(&rows.parenthesized());
                    member.push_str(", '$.rows')");
                    members.push(member);
                }
                if let Some(aggregates) = aggregates {
                    let mut member = Statement::raw("'aggregates', ");
                    member.append(&aggregates.parenthesized());
                    members.push(member);
                }
                if let Some(groups) = groups {
                    let mut member = Statement::raw("'groups', ");
                    member.append(&groups.parenthesized());
                    members.push(member);
                }
                out.push_str("(SELECT JSON_OBJECT(");
                out.append_joined(&members, ", ");
                out.push_str("))");
            }
        }
        out.push_str(", ");
        out.push_str(EMPTY_ARRAY);
        out.push_str(")");
        Ok(out)
    }

    fn groups_statement(
        &self,
        grouping: &Grouping,
        scope: &Scope<'_>,
        source: &Statement,
    ) -> Result<Statement, CompileError> {
        let dimensions = grouping
            .dimensions
            .iter()
            .map(|dimension| match dimension {
                Dimension::Column { column_name, path } if path.is_empty() => {
                    let field_type = self.ctx.field_type(scope.collection, column_name)?;
                    Ok(classify(field_type, Usage::Projection)?.project(&scope.column(column_name)))
                }
                Dimension::Column { column_name, .. } => Err(CompileError::unsupported(format!(
                    "group dimension '{}' through a relationship path",
                    column_name
                ))),
            })
            .collect::<Result<Vec<_>, _>>()?;
        let aggregates = compile_aggregates(&grouping.aggregates, &scope.alias)?;

        let dimension_aliases: Vec<String> =
            (0..dimensions.len()).map(|i| quote_ident(&format!("d{}", i))).collect();
        let aggregate_aliases: Vec<String> =
            (0..aggregates.len()).map(|i| quote_ident(&format!("a{}", i))).collect();

        let mut select_list: Vec<String> = dimensions
            .iter()
            .zip(&dimension_aliases)
            .chain(aggregates.iter().map(|(_, expr)| expr).zip(&aggregate_aliases))
            .map(|(expr, alias)| format!("{} AS {}", expr, alias))
            .collect();
        if select_list.is_empty() {
            // Still collapse the source to a single group
            select_list.push("COUNT(*) AS \"n\"".to_string());
        }

        let mut inner = Statement::raw(format!("SELECT {}", select_list.join(", ")));
        inner.append(source);
        let mut array_order = String::new();
        if !dimensions.is_empty() {
            inner.push_str(&format!(" GROUP BY {}", dimensions.join(", ")));
            inner.push_str(&format!(" ORDER BY {}", dimension_aliases.join(", ")));
            array_order = format!(" ORDER BY {}", dimension_aliases.join(", "));
        }
        inner.push_str(&page_clause(grouping.limit, grouping.offset));

        let dimensions_json = if dimension_aliases.is_empty() {
            EMPTY_ARRAY.to_string()
        } else {
            format!("JSON_ARRAY({})", dimension_aliases.join(", "))
        };
        let aggregates_json = json_object(
            aggregates
                .iter()
                .map(|(name, _)| name.as_str())
                .zip(aggregate_aliases.iter().map(String::as_str)),
        );

        let group_object = format!(
            "JSON_OBJECT('dimensions', {}, 'aggregates', {})",
            dimensions_json, aggregates_json
        );
        let mut out = Statement::raw(format!(
            "SELECT {} FROM (",
            json_array_agg(&group_object, &array_order)
        ));
        out.append(&inner);
        out.push_str(") AS \"groups\"");
        Ok(out)
    }
}

const SUBQUERY_ALIAS: &str = "subq";

/// `SELECT JSON_OBJECT(..) FROM (<node rows, paged>) AS "subq"`
fn aggregates_statement(
    aggregates: &IndexMap<String, Aggregate>,
    scope: &Scope<'_>,
    source: &Statement,
    ordering: &Ordering,
    page: &str,
) -> Result<Statement, CompileError> {
    let compiled = compile_aggregates(aggregates, SUBQUERY_ALIAS)?;
    if compiled.is_empty() {
        return Ok(Statement::raw(format!("SELECT {}", EMPTY_OBJECT)));
    }
    let object = json_object(compiled.iter().map(|(name, expr)| (name.as_str(), expr.as_str())));

    let mut out = Statement::raw(format!(
        "SELECT {} FROM (SELECT {}.*",
        object,
        quote_ident(&scope.alias)
    ));
    out.append(source);
    out.push_str(&ordering.order_by_clause());
    out.push_str(page);
    out.push_str(&format!(") AS {}", quote_ident(SUBQUERY_ALIAS)));
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sql::QueryParam;
    use ndc_duck_ir::{DuckDbConfig, FieldType, RelationshipType, VariableSet};
    use serde_json::json;

    fn config() -> DuckDbConfig {
        let mut config = DuckDbConfig::new();
        config.add_collection(
            "users",
            "memory.main.users",
            vec![
                ("id".to_string(), FieldType::named("Int")),
                ("name".to_string(), FieldType::nullable(FieldType::named("String"))),
                ("balance".to_string(), FieldType::named("UBigInt")),
            ],
        );
        config.add_collection(
            "orders",
            "memory.main.orders",
            vec![
                ("id".to_string(), FieldType::named("Int")),
                ("user_id".to_string(), FieldType::named("Int")),
                ("total".to_string(), FieldType::named("Float")),
            ],
        );
        config
    }

    fn relationships() -> IndexMap<String, Relationship> {
        IndexMap::from([
            (
                "user_orders".to_string(),
                Relationship {
                    column_mapping: IndexMap::from([("id".to_string(), "user_id".to_string())]),
                    relationship_type: RelationshipType::Array,
                    target_collection: "orders".to_string(),
                },
            ),
            (
                "order_user".to_string(),
                Relationship {
                    column_mapping: IndexMap::from([("user_id".to_string(), "id".to_string())]),
                    relationship_type: RelationshipType::Object,
                    target_collection: "users".to_string(),
                },
            ),
        ])
    }

    fn compile(collection: &str, query: serde_json::Value) -> Result<CompiledPlan, CompileError> {
        let config = config();
        let relationships = relationships();
        let variables = VariableSet::new();
        let ctx = CompileContext {
            config: &config,
            relationships: &relationships,
            variables: &variables,
        };
        let query: Query = serde_json::from_value(query).unwrap();
        QueryCompiler::new(ctx).compile(collection, &query)
    }

    #[test]
    fn test_simple_rows_statement() {
        let plan = compile(
            "users",
            json!({
                "fields": {"id": {"type": "column", "column": "id"}},
                "limit": 2
            }),
        )
        .unwrap();
        assert!(plan.has_rows());
        assert!(!plan.has_aggregates());
        assert_eq!(
            plan.rows.unwrap().sql,
            "SELECT CAST((SELECT JSON_OBJECT('rows', COALESCE(TO_JSON(LIST(\"r\")), JSON('[]'))) \
             FROM (SELECT JSON_OBJECT('id', \"users\".\"id\") AS \"r\" \
             FROM \"memory\".\"main\".\"users\" AS \"users\" LIMIT 2) AS \"rows\") AS VARCHAR) AS data"
        );
    }

    #[test]
    fn test_wide_integer_projected_as_text() {
        let plan = compile(
            "users",
            json!({"fields": {"balance": {"type": "column", "column": "balance"}}}),
        )
        .unwrap();
        assert!(plan
            .rows
            .unwrap()
            .sql
            .contains("JSON_OBJECT('balance', CAST(\"users\".\"balance\" AS TEXT))"));
    }

    #[test]
    fn test_offset_without_limit_gets_sentinel() {
        assert_eq!(page_clause(None, Some(5)), " LIMIT 2147483647 OFFSET 5");
        assert_eq!(page_clause(Some(3), None), " LIMIT 3");
        assert_eq!(page_clause(None, None), "");
    }

    #[test]
    fn test_order_by_resorts_inside_array() {
        let plan = compile(
            "users",
            json!({
                "fields": {"name": {"type": "column", "column": "name"}},
                "order_by": {"elements": [
                    {"order_direction": "desc", "target": {"type": "column", "name": "name", "path": []}}
                ]}
            }),
        )
        .unwrap();
        let sql = plan.rows.unwrap().sql;
        assert!(sql.contains("COALESCE(TO_JSON(LIST(\"r\" ORDER BY \"o0\" COLLATE NOCASE DESC)), JSON('[]'))"));
        assert!(!sql.contains("JSON_GROUP_ARRAY"));
        assert!(sql.contains(", \"users\".\"name\" AS \"o0\""));
        assert!(sql.contains("ORDER BY \"users\".\"name\" COLLATE NOCASE DESC"));
    }

    #[test]
    fn test_order_by_path_joins_once() {
        let element = json!({
            "order_direction": "asc",
            "target": {"type": "column", "name": "name", "path": [{"relationship": "order_user"}]}
        });
        let plan = compile(
            "orders",
            json!({
                "fields": {"id": {"type": "column", "column": "id"}},
                "order_by": {"elements": [element.clone(), element]}
            }),
        )
        .unwrap();
        let sql = plan.rows.unwrap().sql;
        assert_eq!(sql.matches("LEFT JOIN").count(), 1);
        assert!(sql.contains(
            "LEFT JOIN \"memory\".\"main\".\"users\" AS \"orders_users\" ON \"orders\".\"user_id\" = \"orders_users\".\"id\""
        ));
        assert!(sql.contains("\"orders_users\".\"name\" AS \"o0\""));
    }

    #[test]
    fn test_order_by_aggregate_rejected() {
        let err = compile(
            "users",
            json!({
                "fields": {"id": {"type": "column", "column": "id"}},
                "order_by": {"elements": [
                    {"order_direction": "asc", "target": {"type": "star_count_aggregate", "path": []}}
                ]}
            }),
        )
        .unwrap_err();
        assert!(matches!(err, CompileError::UnsupportedFeature(_)));
    }

    #[test]
    fn test_relationship_fields_only_embeds_rows() {
        let plan = compile(
            "users",
            json!({
                "fields": {
                    "orders": {
                        "type": "relationship",
                        "relationship": "user_orders",
                        "query": {"fields": {"total": {"type": "column", "column": "total"}}}
                    }
                }
            }),
        )
        .unwrap();
        let sql = plan.rows.unwrap().sql;
        assert!(sql.contains("'orders', COALESCE((SELECT JSON_OBJECT('rows'"));
        assert!(sql.contains(
            "FROM \"memory\".\"main\".\"orders\" AS \"users_orders\" WHERE \"users\".\"id\" = \"users_orders\".\"user_id\""
        ));
    }

    #[test]
    fn test_aggregate_only_relationship_has_no_rows_member() {
        let plan = compile(
            "users",
            json!({
                "fields": {
                    "orders": {
                        "type": "relationship",
                        "relationship": "user_orders",
                        "query": {"aggregates": {"n": {"type": "star_count"}}}
                    }
                }
            }),
        )
        .unwrap();
        let sql = plan.rows.unwrap().sql;
        assert!(sql.contains("COALESCE((SELECT JSON_OBJECT('aggregates', (SELECT JSON_OBJECT('n', COUNT(*))"));
        assert!(!sql.contains("JSON_EXTRACT"));
    }

    #[test]
    fn test_aggregates_statement_reads_paged_subquery() {
        let plan = compile(
            "orders",
            json!({
                "aggregates": {
                    "count": {"type": "star_count"},
                    "total": {"type": "single_column", "column": "total", "function": "_sum"}
                },
                "limit": 10
            }),
        )
        .unwrap();
        assert!(!plan.has_rows());
        assert_eq!(
            plan.aggregates.unwrap().sql,
            "SELECT CAST((SELECT JSON_OBJECT('count', COUNT(*), 'total', SUM(\"subq\".\"total\")) \
             FROM (SELECT \"orders\".* FROM \"memory\".\"main\".\"orders\" AS \"orders\" LIMIT 10) AS \"subq\") \
             AS VARCHAR) AS data"
        );
    }

    #[test]
    fn test_groups_statement_shape() {
        let plan = compile(
            "orders",
            json!({
                "groups": {
                    "dimensions": [{"type": "column", "column_name": "user_id", "path": []}],
                    "aggregates": {"spent": {"type": "single_column", "column": "total", "function": "_sum"}},
                    "limit": 5
                }
            }),
        )
        .unwrap();
        let sql = plan.groups.unwrap().sql;
        assert!(sql.contains(
            "COALESCE(TO_JSON(LIST(JSON_OBJECT('dimensions', JSON_ARRAY(\"d0\"), 'aggregates', JSON_OBJECT('spent', \"a0\")) ORDER BY \"d0\")), JSON('[]'))"
        ));
        assert!(sql.contains("GROUP BY \"orders\".\"user_id\" ORDER BY \"d0\" LIMIT 5"));
    }

    #[test]
    fn test_groups_with_predicate_or_order_rejected() {
        for extra in ["predicate", "order_by"] {
            let mut groups = json!({
                "dimensions": [{"type": "column", "column_name": "user_id", "path": []}],
                "aggregates": {}
            });
            groups[extra] = json!({"anything": true});
            let err = compile(
                "orders",
                json!({"fields": {"id": {"type": "column", "column": "id"}}, "groups": groups}),
            )
            .unwrap_err();
            assert!(matches!(err, CompileError::UnsupportedFeature(ref m) if m.contains(extra)));
        }
    }

    #[test]
    fn test_dimension_with_path_rejected() {
        let err = compile(
            "orders",
            json!({
                "groups": {
                    "dimensions": [{"type": "column", "column_name": "name", "path": [{"relationship": "order_user"}]}],
                    "aggregates": {}
                }
            }),
        )
        .unwrap_err();
        assert!(matches!(err, CompileError::UnsupportedFeature(_)));
    }

    #[test]
    fn test_must_request_something() {
        let err = compile("users", json!({"limit": 1})).unwrap_err();
        assert!(matches!(err, CompileError::UnsupportedFeature(_)));
    }

    #[test]
    fn test_params_follow_textual_order() {
        let plan = compile(
            "users",
            json!({
                "fields": {
                    "orders": {
                        "type": "relationship",
                        "relationship": "user_orders",
                        "query": {
                            "fields": {"id": {"type": "column", "column": "id"}},
                            "predicate": {
                                "type": "binary_comparison_operator",
                                "column": {"type": "column", "name": "total"},
                                "operator": "_gt",
                                "value": {"type": "scalar", "value": 100}
                            }
                        }
                    }
                },
                "predicate": {
                    "type": "binary_comparison_operator",
                    "column": {"type": "column", "name": "name"},
                    "operator": "_eq",
                    "value": {"type": "scalar", "value": "alice"}
                }
            }),
        )
        .unwrap();
        let rows = plan.rows.unwrap();
        assert_eq!(
            rows.params,
            vec![QueryParam::Int(100), QueryParam::String("alice".into())]
        );
        assert_eq!(rows.placeholder_count(), 2);
    }

    #[test]
    fn test_unknown_collection_is_configuration_error() {
        let err = compile("ghosts", json!({"fields": {}})).unwrap_err();
        assert!(matches!(err, CompileError::Configuration(_)));
    }

    #[test]
    fn test_fingerprint_is_deterministic() {
        let query = json!({
            "fields": {"id": {"type": "column", "column": "id"}},
            "aggregates": {"n": {"type": "star_count"}}
        });
        let a = compile("users", query.clone()).unwrap();
        let b = compile("users", query).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.fingerprint(), b.fingerprint());
        let kinds: Vec<StatementKind> = a.statements().map(|(k, _)| k).collect();
        assert_eq!(kinds, vec![StatementKind::Rows, StatementKind::Aggregates]);
    }
}
