//! ndc-duck Intermediate Representation (IR)
//!
//! Wire model for the nested query protocol: requests arrive as NDC JSON and
//! deserialize into these types; responses serialize from [`RowSet`].
//! Ordered maps are [`IndexMap`] so field and aggregate order survives a round trip.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

mod response;
mod types;
pub use response::*;
pub use types::*;

/// One set of named values for `Variable` references in a batched request.
pub type VariableSet = IndexMap<String, serde_json::Value>;

/// Top-level query request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryRequest {
    /// Root collection name
    pub collection: String,

    pub query: Query,

    #[serde(default)]
    pub collection_relationships: IndexMap<String, Relationship>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variables: Option<Vec<VariableSet>>,
}

impl QueryRequest {
    /// Calculate fingerprint (SHA-256) of the canonical JSON form
    pub fn fingerprint(&self) -> String {
        let json = serde_json::to_vec(self).unwrap_or_default();
        let mut hasher = Sha256::new();
        hasher.update(&json);
        format!("{:x}", hasher.finalize())
    }
}

/// One level of a nested query
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Query {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fields: Option<IndexMap<String, Field>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aggregates: Option<IndexMap<String, Aggregate>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offset: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_by: Option<OrderBy>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub predicate: Option<Expression>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub groups: Option<Grouping>,
}

/// Output field of a query node
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Field {
    Column {
        column: String,
    },
    Relationship {
        relationship: String,
        query: Box<Query>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationshipType {
    Object,
    Array,
}

/// Named join between two collections
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Relationship {
    /// Source column → target column
    pub column_mapping: IndexMap<String, String>,

    pub relationship_type: RelationshipType,

    pub target_collection: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderBy {
    pub elements: Vec<OrderByElement>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderByElement {
    pub order_direction: OrderDirection,
    pub target: OrderByTarget,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderDirection {
    Asc,
    Desc,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OrderByTarget {
    Column {
        name: String,
        #[serde(default)]
        path: Vec<PathElement>,
    },
    SingleColumnAggregate {
        column: String,
        function: String,
        #[serde(default)]
        path: Vec<PathElement>,
    },
    StarCountAggregate {
        #[serde(default)]
        path: Vec<PathElement>,
    },
}

/// One relationship hop in an ordering path
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathElement {
    pub relationship: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub predicate: Option<Box<Expression>>,
}

/// Boolean filter tree
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Expression {
    And {
        expressions: Vec<Expression>,
    },
    Or {
        expressions: Vec<Expression>,
    },
    Not {
        expression: Box<Expression>,
    },
    UnaryComparisonOperator {
        column: ComparisonTarget,
        operator: UnaryComparisonOperator,
    },
    BinaryComparisonOperator {
        column: ComparisonTarget,
        /// Operator name as sent on the wire (`_eq`, `_like`, ...)
        operator: String,
        value: ComparisonValue,
    },
    Exists {
        in_collection: ExistsInCollection,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        predicate: Option<Box<Expression>>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnaryComparisonOperator {
    IsNull,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ComparisonTarget {
    Column {
        name: String,
        #[serde(default)]
        path: Vec<PathElement>,
    },
    RootCollectionColumn {
        name: String,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ComparisonValue {
    Scalar { value: serde_json::Value },
    Variable { name: String },
    Column { column: ComparisonTarget },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ExistsInCollection {
    Related { relationship: String },
    Unrelated { collection: String },
}

/// Requested aggregate
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Aggregate {
    StarCount,
    ColumnCount {
        column: String,
        #[serde(default)]
        distinct: bool,
    },
    SingleColumn {
        column: String,
        /// Function name as sent on the wire (`_sum`, `_stddev`, ...)
        function: String,
    },
}

/// Grouped aggregation request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Grouping {
    pub dimensions: Vec<Dimension>,

    #[serde(default)]
    pub aggregates: IndexMap<String, Aggregate>,

    /// Kept opaque: any value here is rejected by the compiler.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub predicate: Option<serde_json::Value>,

    /// Kept opaque: any value here is rejected by the compiler.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_by: Option<serde_json::Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offset: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Dimension {
    Column {
        column_name: String,
        #[serde(default)]
        path: Vec<PathElement>,
    },
}
