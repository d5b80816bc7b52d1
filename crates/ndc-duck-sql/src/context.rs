//! Per-compile lookups and alias scoping

use indexmap::IndexMap;
use ndc_duck_ir::{DuckDbConfig, FieldType, Relationship, VariableSet};

use crate::error::CompileError;
use crate::sql::qualified;

/// Read-only inputs shared by one compile call
#[derive(Debug, Clone, Copy)]
pub struct CompileContext<'a> {
    pub config: &'a DuckDbConfig,
    pub relationships: &'a IndexMap<String, Relationship>,
    /// Bindings for `Variable` references in this compile call
    pub variables: &'a VariableSet,
}

impl<'a> CompileContext<'a> {
    pub fn relationship(&self, name: &str) -> Result<&'a Relationship, CompileError> {
        self.relationships
            .get(name)
            .ok_or_else(|| CompileError::configuration(format!("relationship '{}' not found", name)))
    }

    /// Storage identifier of a collection
    pub fn storage_name(&self, collection: &str) -> Result<&'a str, CompileError> {
        self.config.storage_name(collection).ok_or_else(|| {
            CompileError::configuration(format!("collection '{}' has no storage alias", collection))
        })
    }

    pub fn field_type(&self, collection: &str, column: &str) -> Result<&'a FieldType, CompileError> {
        let object_type = self.config.object_type(collection).ok_or_else(|| {
            CompileError::configuration(format!("collection '{}' not found in schema", collection))
        })?;
        object_type
            .find_field(column)
            .map(|field| &field.field_type)
            .ok_or_else(|| {
                CompileError::configuration(format!(
                    "column '{}' not found in collection '{}'",
                    column, collection
                ))
            })
    }

    pub fn variable(&self, name: &str) -> Result<&'a serde_json::Value, CompileError> {
        self.variables
            .get(name)
            .ok_or_else(|| CompileError::configuration(format!("variable '{}' is not bound", name)))
    }
}

/// Collection names from the root to the current node.
///
/// Immutable: each nested level gets its own extended copy, so sibling
/// subtrees never observe each other's entries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AliasPath(Vec<String>);

impl AliasPath {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn child(&self, collection: &str) -> AliasPath {
        let mut segments = self.0.clone();
        segments.push(collection.to_string());
        AliasPath(segments)
    }

    /// Table alias for the current node
    pub fn alias(&self) -> String {
        self.0.join("_")
    }
}

/// A collection bound to a table alias
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scope<'a> {
    pub collection: &'a str,
    pub alias: String,
}

impl<'a> Scope<'a> {
    pub fn new(collection: &'a str, alias: impl Into<String>) -> Self {
        Self {
            collection,
            alias: alias.into(),
        }
    }

    /// `"alias"."column"`
    pub fn column(&self, name: &str) -> String {
        qualified(&self.alias, name)
    }
}

/// `parent.from = child.to` for every pair in the mapping
pub fn join_conditions(relationship: &Relationship, parent_alias: &str, child_alias: &str) -> Vec<String> {
    relationship
        .column_mapping
        .iter()
        .map(|(from, to)| format!("{} = {}", qualified(parent_alias, from), qualified(child_alias, to)))
        .collect()
}
