//! Aggregate compiler
//!
//! Statistical functions are expanded to closed forms over `COUNT`, `SUM` and
//! `POWER` so no statistics extension is needed.

use indexmap::IndexMap;
use ndc_duck_ir::Aggregate;

use crate::error::CompileError;
use crate::sql::qualified;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregateFunction {
    Sum,
    Avg,
    Max,
    Min,
    StddevSamp,
    StddevPop,
    VarSamp,
    VarPop,
    GroupConcat,
    GroupConcatDistinct,
    GroupConcatIncludeNulls,
}

impl AggregateFunction {
    pub fn from_name(name: &str) -> Option<Self> {
        let function = match name {
            "_sum" => AggregateFunction::Sum,
            "_avg" => AggregateFunction::Avg,
            "_max" => AggregateFunction::Max,
            "_min" => AggregateFunction::Min,
            "_stddev" | "_stddev_samp" => AggregateFunction::StddevSamp,
            "_stddev_pop" => AggregateFunction::StddevPop,
            "_variance" | "_var_samp" => AggregateFunction::VarSamp,
            "_var_pop" => AggregateFunction::VarPop,
            "_group_concat" => AggregateFunction::GroupConcat,
            "_group_concat_distinct" => AggregateFunction::GroupConcatDistinct,
            "_group_concat_include_nulls" => AggregateFunction::GroupConcatIncludeNulls,
            _ => return None,
        };
        Some(function)
    }

    /// SQL aggregate over an already-qualified column
    pub fn sql(&self, column: &str) -> String {
        match self {
            AggregateFunction::Sum => format!("SUM({})", column),
            AggregateFunction::Avg => format!("AVG({})", column),
            AggregateFunction::Max => format!("MAX({})", column),
            AggregateFunction::Min => format!("MIN({})", column),
            AggregateFunction::VarSamp => variance(column, true),
            AggregateFunction::VarPop => variance(column, false),
            AggregateFunction::StddevSamp => stddev(column, true),
            AggregateFunction::StddevPop => stddev(column, false),
            AggregateFunction::GroupConcat => format!("GROUP_CONCAT(CAST({} AS TEXT))", column),
            AggregateFunction::GroupConcatDistinct => {
                format!("GROUP_CONCAT(DISTINCT CAST({} AS TEXT))", column)
            }
            AggregateFunction::GroupConcatIncludeNulls => {
                format!("GROUP_CONCAT(COALESCE(CAST({} AS TEXT), 'NULL'))", column)
            }
        }
    }
}

/// `(n·Σx² − (Σx)²) / (n·(n−1))` for samples, `/ n²` for populations.
///
/// A zero denominator (one sample, or no values) yields NULL: NaN has no
/// JSON form.
fn variance(column: &str, sample: bool) -> String {
    let n = format!("COUNT({})", column);
    let x = format!("CAST({} AS DOUBLE)", column);
    let denominator = if sample {
        format!("{n} * ({n} - 1)")
    } else {
        format!("{n} * {n}")
    };
    format!("(({n} * SUM(POWER({x}, 2)) - POWER(SUM({x}), 2)) / NULLIF({denominator}, 0))")
}

fn stddev(column: &str, sample: bool) -> String {
    let v = variance(column, sample);
    // Rounding can push a zero variance slightly negative
    format!("SQRT(CASE WHEN {v} < 0 THEN 0 ELSE {v} END)")
}

/// Compile one aggregate against columns of `alias`
pub fn compile_aggregate(aggregate: &Aggregate, alias: &str) -> Result<String, CompileError> {
    match aggregate {
        Aggregate::StarCount => Ok("COUNT(*)".to_string()),
        Aggregate::ColumnCount { column, distinct } => {
            let column = qualified(alias, column);
            if *distinct {
                Ok(format!("COUNT(DISTINCT {})", column))
            } else {
                Ok(format!("COUNT({})", column))
            }
        }
        Aggregate::SingleColumn { column, function } => {
            let f = AggregateFunction::from_name(function).ok_or_else(|| {
                CompileError::unsupported(format!("aggregate function '{}'", function))
            })?;
            Ok(f.sql(&qualified(alias, column)))
        }
    }
}

/// Output name and SQL expression per aggregate, in request order
pub fn compile_aggregates(
    aggregates: &IndexMap<String, Aggregate>,
    alias: &str,
) -> Result<Vec<(String, String)>, CompileError> {
    aggregates
        .iter()
        .map(|(name, aggregate)| Ok((name.clone(), compile_aggregate(aggregate, alias)?)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn single(column: &str, function: &str) -> Aggregate {
        Aggregate::SingleColumn {
            column: column.to_string(),
            function: function.to_string(),
        }
    }

    #[test]
    fn test_counts() {
        assert_eq!(compile_aggregate(&Aggregate::StarCount, "t").unwrap(), "COUNT(*)");
        let distinct = Aggregate::ColumnCount {
            column: "city".to_string(),
            distinct: true,
        };
        assert_eq!(
            compile_aggregate(&distinct, "t").unwrap(),
            "COUNT(DISTINCT \"t\".\"city\")"
        );
    }

    #[test]
    fn test_sample_and_population_variance() {
        let samp = compile_aggregate(&single("x", "_var_samp"), "t").unwrap();
        assert!(samp.ends_with("/ NULLIF(COUNT(\"t\".\"x\") * (COUNT(\"t\".\"x\") - 1), 0))"));
        let pop = compile_aggregate(&single("x", "_var_pop"), "t").unwrap();
        assert!(pop.ends_with("/ NULLIF(COUNT(\"t\".\"x\") * COUNT(\"t\".\"x\"), 0))"));
        assert_eq!(
            compile_aggregate(&single("x", "_variance"), "t").unwrap(),
            samp
        );
        let stddev = compile_aggregate(&single("x", "_stddev"), "t").unwrap();
        assert!(stddev.starts_with("SQRT("));
        assert!(stddev.contains(&samp));
    }

    #[test]
    fn test_group_concat_variants() {
        assert_eq!(
            compile_aggregate(&single("name", "_group_concat_include_nulls"), "t").unwrap(),
            "GROUP_CONCAT(COALESCE(CAST(\"t\".\"name\" AS TEXT), 'NULL'))"
        );
        assert_eq!(
            compile_aggregate(&single("name", "_group_concat_distinct"), "t").unwrap(),
            "GROUP_CONCAT(DISTINCT CAST(\"t\".\"name\" AS TEXT))"
        );
    }

    #[test]
    fn test_output_keeps_insertion_order() {
        let aggregates = IndexMap::from([
            ("z".to_string(), Aggregate::StarCount),
            ("a".to_string(), single("x", "_max")),
            ("m".to_string(), single("x", "_sum")),
        ]);
        let compiled = compile_aggregates(&aggregates, "t").unwrap();
        let names: Vec<&str> = compiled.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["z", "a", "m"]);
        assert_eq!(compiled[1].1, "MAX(\"t\".\"x\")");
    }

    #[test]
    fn test_unknown_function_fails_closed() {
        let err = compile_aggregate(&single("x", "_median"), "t").unwrap_err();
        assert!(matches!(err, CompileError::UnsupportedFeature(ref m) if m.contains("_median")));
    }
}
