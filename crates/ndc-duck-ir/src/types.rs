//! Schema model: collections, object types and field types

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Declared type of an object field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FieldType {
    Named { name: String },
    Nullable { underlying_type: Box<FieldType> },
    Array { element_type: Box<FieldType> },
}

impl FieldType {
    pub fn named(name: impl Into<String>) -> Self {
        FieldType::Named { name: name.into() }
    }

    pub fn nullable(inner: FieldType) -> Self {
        FieldType::Nullable {
            underlying_type: Box::new(inner),
        }
    }

    pub fn array(inner: FieldType) -> Self {
        FieldType::Array {
            element_type: Box::new(inner),
        }
    }

    /// Name of the scalar under any nullable/array wrappers
    pub fn underlying_name(&self) -> &str {
        match self {
            FieldType::Named { name } => name,
            FieldType::Nullable { underlying_type } => underlying_type.underlying_name(),
            FieldType::Array { element_type } => element_type.underlying_name(),
        }
    }

    /// True if an array wrapper appears anywhere in the chain
    pub fn is_array(&self) -> bool {
        match self {
            FieldType::Named { .. } => false,
            FieldType::Nullable { underlying_type } => underlying_type.is_array(),
            FieldType::Array { .. } => true,
        }
    }
}

/// Scalar kinds the compiler knows how to project and compare
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarType {
    Boolean,
    String,
    Int,
    Float,
    BigInt,
    UBigInt,
    HugeInt,
    UHugeInt,
    Timestamp,
    TimestampTz,
    Json,
}

impl ScalarType {
    pub fn from_name(name: &str) -> Option<Self> {
        let scalar = match name {
            "Boolean" => ScalarType::Boolean,
            "String" => ScalarType::String,
            "Int" => ScalarType::Int,
            "Float" => ScalarType::Float,
            "BigInt" => ScalarType::BigInt,
            "UBigInt" => ScalarType::UBigInt,
            "HugeInt" => ScalarType::HugeInt,
            "UHugeInt" => ScalarType::UHugeInt,
            "Timestamp" => ScalarType::Timestamp,
            "TimestampTz" => ScalarType::TimestampTz,
            "JSON" => ScalarType::Json,
            _ => return None,
        };
        Some(scalar)
    }

    pub fn name(&self) -> &'static str {
        match self {
            ScalarType::Boolean => "Boolean",
            ScalarType::String => "String",
            ScalarType::Int => "Int",
            ScalarType::Float => "Float",
            ScalarType::BigInt => "BigInt",
            ScalarType::UBigInt => "UBigInt",
            ScalarType::HugeInt => "HugeInt",
            ScalarType::UHugeInt => "UHugeInt",
            ScalarType::Timestamp => "Timestamp",
            ScalarType::TimestampTz => "TimestampTz",
            ScalarType::Json => "JSON",
        }
    }

    /// DuckDB type name for integers too wide for a JSON number
    pub fn wide_integer_sql(&self) -> Option<&'static str> {
        match self {
            ScalarType::BigInt => Some("BIGINT"),
            ScalarType::UBigInt => Some("UBIGINT"),
            ScalarType::HugeInt => Some("HUGEINT"),
            ScalarType::UHugeInt => Some("UHUGEINT"),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectField {
    #[serde(rename = "type")]
    pub field_type: FieldType,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectType {
    pub fields: IndexMap<String, ObjectField>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl ObjectType {
    pub fn find_field(&self, name: &str) -> Option<&ObjectField> {
        self.fields.get(name)
    }
}

/// Schema object handed to the compiler (`duckdbConfig` on the wire)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DuckDbConfig {
    #[serde(default)]
    pub collection_names: Vec<String>,

    /// Collection name → fully qualified storage identifier
    #[serde(default)]
    pub collection_aliases: IndexMap<String, String>,

    /// Collection name → row type
    #[serde(default)]
    pub object_types: IndexMap<String, ObjectType>,
}

impl DuckDbConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a collection with its storage identifier and columns
    pub fn add_collection(
        &mut self,
        name: impl Into<String>,
        storage: impl Into<String>,
        fields: impl IntoIterator<Item = (String, FieldType)>,
    ) {
        let object_type = ObjectType {
            fields: fields
                .into_iter()
                .map(|(field, field_type)| {
                    (
                        field,
                        ObjectField {
                            field_type,
                            description: None,
                        },
                    )
                })
                .collect(),
            description: None,
        };
        self.add_object_type(name, storage, object_type);
    }

    /// Register a collection with an already built row type
    pub fn add_object_type(
        &mut self,
        name: impl Into<String>,
        storage: impl Into<String>,
        object_type: ObjectType,
    ) {
        let name = name.into();
        if !self.collection_names.contains(&name) {
            self.collection_names.push(name.clone());
        }
        self.collection_aliases.insert(name.clone(), storage.into());
        self.object_types.insert(name, object_type);
    }

    pub fn object_type(&self, collection: &str) -> Option<&ObjectType> {
        self.object_types.get(collection)
    }

    pub fn storage_name(&self, collection: &str) -> Option<&str> {
        self.collection_aliases.get(collection).map(String::as_str)
    }
}
