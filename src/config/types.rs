//! Raw catalog types matching the JSON files under `catalog/`.

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SchemaConfig {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub comment: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TableConfig {
    pub id: String,
    #[serde(default)]
    pub schema_id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub comment: Option<String>,
    /// Single generated key column.
    pub primary_key: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ColumnTypeConfig {
    Simple(String),
    Parameterized { name: String, params: Option<Vec<u32>> },
}

impl ColumnTypeConfig {
    pub fn name(&self) -> &str {
        match self {
            ColumnTypeConfig::Simple(s) => s.as_str(),
            ColumnTypeConfig::Parameterized { name, .. } => name.as_str(),
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub enum ColumnDefaultConfig {
    Literal(String),
    Expression { expression: String },
}

impl<'de> Deserialize<'de> for ColumnDefaultConfig {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let v = serde_json::Value::deserialize(deserializer)?;
        match v {
            serde_json::Value::String(s) => Ok(ColumnDefaultConfig::Literal(s)),
            serde_json::Value::Object(mut obj) => {
                if let Some(serde_json::Value::String(s)) = obj.remove("expression") {
                    return Ok(ColumnDefaultConfig::Expression { expression: s });
                }
                if let Some(serde_json::Value::String(s)) = obj.remove("value") {
                    return Ok(ColumnDefaultConfig::Literal(s));
                }
                Err(serde::de::Error::custom(format!(
                    "column default must be a string, {{ \"expression\": \"...\" }}, or {{ \"value\": \"...\" }}; got object with keys: {:?}",
                    obj.keys().collect::<Vec<_>>()
                )))
            }
            other => Err(serde::de::Error::custom(format!(
                "column default must be a string or {{ \"expression\": \"...\" }}; got {}",
                other
            ))),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ColumnConfig {
    pub id: String,
    pub table_id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub type_: ColumnTypeConfig,
    #[serde(default = "default_true")]
    pub nullable: bool,
    #[serde(default)]
    pub default: Option<ColumnDefaultConfig>,
    #[serde(default)]
    pub comment: Option<String>,
}

fn default_true() -> bool {
    true
}

/// Foreign key from `from_table.from_column` to `to_table.to_column`.
/// `from_property` exposes it as a to-one association on the referencing entity,
/// `to_property` as a read-only to-many on the referenced entity.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RelationshipConfig {
    pub id: String,
    pub from_table_id: String,
    pub from_column_id: String,
    pub to_table_id: String,
    pub to_column_id: String,
    #[serde(default)]
    pub from_property: Option<String>,
    #[serde(default)]
    pub to_property: Option<String>,
    #[serde(default)]
    pub on_update: Option<String>,
    #[serde(default)]
    pub on_delete: Option<String>,
}

/// Many-to-many link table. Both sides may read and write the relation.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct JoinTableConfig {
    pub id: String,
    #[serde(default)]
    pub schema_id: Option<String>,
    pub name: String,
    pub left_table_id: String,
    pub left_column: String,
    pub left_property: String,
    pub right_table_id: String,
    pub right_column: String,
    pub right_property: String,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ValidationRule {
    #[serde(default)]
    pub required: Option<bool>,
    #[serde(default)]
    pub format: Option<String>,
    #[serde(default)]
    pub max_length: Option<u32>,
    #[serde(default)]
    pub min_length: Option<u32>,
    #[serde(default)]
    pub pattern: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DerivedKind {
    IsNull,
    IsNotNull,
}

/// Read-only boolean computed from a column, e.g. `is_alive` from `death_date IS NULL`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DerivedPropertyConfig {
    pub name: String,
    /// Query parameter that filters on this property; none means not filterable.
    #[serde(default)]
    pub filter_name: Option<String>,
    pub kind: DerivedKind,
    pub column: String,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StringMatch {
    #[default]
    ContainsIgnoreCase,
    Equals,
}

/// Query parameter bindings for the collection resource.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FilterConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Snake_case property paths allowed as filters. Empty allows every path.
    #[serde(default)]
    pub including: Vec<String>,
    #[serde(default)]
    pub string_match: StringMatch,
    /// Properties bound as ranges (two values → between), also under `<name>_between`.
    #[serde(default)]
    pub range: Vec<String>,
}

impl Default for FilterConfig {
    fn default() -> Self {
        FilterConfig {
            enabled: true,
            including: Vec::new(),
            string_match: StringMatch::default(),
            range: Vec::new(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ApiEntityConfig {
    pub entity_id: String,
    pub path_segment: String,
    /// Key under `_embedded` for collections. Defaults to the path segment.
    #[serde(default)]
    pub collection_rel: Option<String>,
    /// Link relation naming a single item. Defaults to the table name.
    #[serde(default)]
    pub item_rel: Option<String>,
    pub operations: Vec<String>,
    #[serde(default = "default_true")]
    pub expose_id: bool,
    #[serde(default)]
    pub validation: HashMap<String, ValidationRule>,
    #[serde(default)]
    pub derived: Vec<DerivedPropertyConfig>,
    #[serde(default)]
    pub filters: FilterConfig,
}

/// All catalog types in one struct for in-memory loading.
#[derive(Clone, Debug, Default)]
pub struct FullConfig {
    pub schemas: Vec<SchemaConfig>,
    pub tables: Vec<TableConfig>,
    pub columns: Vec<ColumnConfig>,
    pub relationships: Vec<RelationshipConfig>,
    pub join_tables: Vec<JoinTableConfig>,
    pub api_entities: Vec<ApiEntityConfig>,
}
