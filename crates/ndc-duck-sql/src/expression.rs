//! Expression compiler: filter trees → SQL boolean expressions

use ndc_duck_ir::{ComparisonTarget, ComparisonValue, ExistsInCollection, Expression, UnaryComparisonOperator};

use crate::classify::{classify, Usage};
use crate::context::{join_conditions, CompileContext, Scope};
use crate::error::CompileError;
use crate::sql::{quote_ident, quote_table, ParamShape, QueryParam, Statement};

/// Condition that matches every row
pub const TRUE_SQL: &str = "1";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOperator {
    Eq,
    Neq,
    Gt,
    Lt,
    Gte,
    Lte,
    Like,
    Glob,
}

impl BinaryOperator {
    pub fn from_name(name: &str) -> Option<Self> {
        let op = match name {
            "_eq" => BinaryOperator::Eq,
            "_neq" => BinaryOperator::Neq,
            "_gt" => BinaryOperator::Gt,
            "_lt" => BinaryOperator::Lt,
            "_gte" => BinaryOperator::Gte,
            "_lte" => BinaryOperator::Lte,
            "_like" => BinaryOperator::Like,
            "_glob" => BinaryOperator::Glob,
            _ => return None,
        };
        Some(op)
    }

    pub fn sql(&self) -> &'static str {
        match self {
            BinaryOperator::Eq => "=",
            BinaryOperator::Neq => "!=",
            BinaryOperator::Gt => ">",
            BinaryOperator::Lt => "<",
            BinaryOperator::Gte => ">=",
            BinaryOperator::Lte => "<=",
            BinaryOperator::Like => "LIKE",
            BinaryOperator::Glob => "GLOB",
        }
    }

    /// Pattern operators bind the pattern as-is
    fn is_pattern(&self) -> bool {
        matches!(self, BinaryOperator::Like | BinaryOperator::Glob)
    }
}

/// Compile `expr` against the collection bound in `scope`.
///
/// Returns the SQL fragment together with the values for its placeholders.
pub fn compile_where(
    ctx: &CompileContext<'_>,
    expr: &Expression,
    scope: &Scope<'_>,
) -> Result<Statement, CompileError> {
    match expr {
        Expression::And { expressions } => compile_junction(ctx, expressions, scope, " AND "),
        Expression::Or { expressions } => compile_junction(ctx, expressions, scope, " OR "),
        Expression::Not { expression } => {
            let inner = compile_where(ctx, expression, scope)?;
            let mut out = Statement::raw("NOT ");
            out.append(&inner.parenthesized());
            Ok(out)
        }
        Expression::UnaryComparisonOperator { column, operator } => {
            let column_name = comparison_column(column)?;
            ctx.field_type(scope.collection, column_name)?;
            match operator {
                UnaryComparisonOperator::IsNull => {
                    Ok(Statement::raw(format!("{} IS NULL", scope.column(column_name))))
                }
            }
        }
        Expression::BinaryComparisonOperator {
            column,
            operator,
            value,
        } => {
            let op = BinaryOperator::from_name(operator).ok_or_else(|| {
                CompileError::unsupported(format!("binary comparison operator '{}'", operator))
            })?;
            let column_name = comparison_column(column)?;
            let field_type = ctx.field_type(scope.collection, column_name)?;
            let shape = if op.is_pattern() {
                ParamShape::Plain
            } else {
                classify(field_type, Usage::Comparison)?.param_shape()
            };
            let param = comparison_value(ctx, value)?;

            let mut out = Statement::raw(format!("{} {} ", scope.column(column_name), op.sql()));
            out.bind_shaped(shape, param);
            Ok(out)
        }
        Expression::Exists {
            in_collection,
            predicate,
        } => match in_collection {
            ExistsInCollection::Related { relationship } => {
                compile_exists(ctx, relationship, predicate.as_deref(), scope)
            }
            ExistsInCollection::Unrelated { collection } => Err(CompileError::unsupported(format!(
                "exists over unrelated collection '{}'",
                collection
            ))),
        },
    }
}

fn compile_junction(
    ctx: &CompileContext<'_>,
    expressions: &[Expression],
    scope: &Scope<'_>,
    separator: &str,
) -> Result<Statement, CompileError> {
    if expressions.is_empty() {
        return Ok(Statement::raw(TRUE_SQL));
    }
    let clauses = expressions
        .iter()
        .map(|e| compile_where(ctx, e, scope))
        .collect::<Result<Vec<_>, _>>()?;
    let mut joined = Statement::new();
    joined.append_joined(&clauses, separator);
    Ok(joined.parenthesized())
}

fn compile_exists(
    ctx: &CompileContext<'_>,
    relationship_name: &str,
    predicate: Option<&Expression>,
    scope: &Scope<'_>,
) -> Result<Statement, CompileError> {
    let relationship = ctx.relationship(relationship_name)?;
    let target = relationship.target_collection.as_str();
    let storage = ctx.storage_name(target)?;
    let inner = Scope::new(target, format!("{}_exists", scope.alias));

    let mut conditions = vec![match predicate {
        Some(p) => compile_where(ctx, p, &inner)?.parenthesized(),
        None => Statement::raw("1 = 1"),
    }];
    conditions.extend(
        join_conditions(relationship, &scope.alias, &inner.alias)
            .into_iter()
            .map(Statement::raw),
    );

    let mut out = Statement::raw(format!(
        "EXISTS (SELECT 1 FROM {} AS {} WHERE ",
        quote_table(storage),
        quote_ident(&inner.alias)
    ));
    out.append_joined(&conditions, " AND ");
    out.push_str(")");
    Ok(out)
}

fn comparison_column(target: &ComparisonTarget) -> Result<&str, CompileError> {
    match target {
        ComparisonTarget::Column { name, path } if path.is_empty() => Ok(name),
        ComparisonTarget::Column { name, .. } => Err(CompileError::unsupported(format!(
            "comparison on column '{}' through a relationship path",
            name
        ))),
        ComparisonTarget::RootCollectionColumn { name } => Err(CompileError::unsupported(format!(
            "comparison on root collection column '{}'",
            name
        ))),
    }
}

fn comparison_value(ctx: &CompileContext<'_>, value: &ComparisonValue) -> Result<QueryParam, CompileError> {
    match value {
        ComparisonValue::Scalar { value } => Ok(QueryParam::from(value)),
        ComparisonValue::Variable { name } => ctx.variable(name).map(QueryParam::from),
        ComparisonValue::Column { .. } => {
            Err(CompileError::unsupported("comparison against another column"))
        }
    }
}
