//! Response shapes assembled by the executor

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

pub type Row = serde_json::Map<String, serde_json::Value>;

/// Result for one compiled plan
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RowSet {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rows: Option<Vec<Row>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aggregates: Option<IndexMap<String, serde_json::Value>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub groups: Option<Vec<Group>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Group {
    pub dimensions: Vec<serde_json::Value>,
    pub aggregates: IndexMap<String, serde_json::Value>,
}

/// Ordered list of row sets, one per variable set
pub type QueryResponse = Vec<RowSet>;
