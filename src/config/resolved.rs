//! Resolved entity model: catalog validated and flattened for runtime use.

use crate::config::{DerivedKind, StringMatch, ValidationRule};
use std::collections::{HashMap, HashSet};

/// Primary key type for parsing path and URI ids.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PkType {
    BigInt,
    Int,
    Text,
}

/// Value family of a column; drives body coercion and filter binding.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ColumnKind {
    Text,
    Date,
    Integer,
    Boolean,
    Other,
}

#[derive(Clone, Debug)]
pub struct ColumnInfo {
    pub name: String,
    pub kind: ColumnKind,
    /// PostgreSQL type used to cast bound parameters (e.g. `$1::date`).
    pub pg_type: Option<String>,
    pub nullable: bool,
    pub has_default: bool,
    pub is_pk: bool,
    /// Foreign key columns are exposed only as association links.
    pub is_foreign_key: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Cardinality {
    ToOne,
    ToMany,
}

/// How an association is stored.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AssociationLink {
    /// Our column references their primary key.
    ForeignKey { column: String },
    /// Their column references our primary key.
    InverseForeignKey { column: String },
    /// Rows of a link table: `our_column` references us, `their_column` references them.
    JoinTable {
        schema: String,
        table: String,
        our_column: String,
        their_column: String,
    },
}

#[derive(Clone, Debug)]
pub struct AssociationSpec {
    /// Property name, also the last segment of the association URI.
    pub name: String,
    pub target_path_segment: String,
    pub cardinality: Cardinality,
    pub link: AssociationLink,
    pub writable: bool,
    /// Mandatory to-one: must be set on create and cannot be cleared.
    pub required: bool,
}

impl AssociationSpec {
    pub fn foreign_key_column(&self) -> Option<&str> {
        match &self.link {
            AssociationLink::ForeignKey { column } => Some(column.as_str()),
            _ => None,
        }
    }
}

#[derive(Clone, Debug)]
pub struct DerivedProperty {
    pub name: String,
    pub filter_name: Option<String>,
    pub kind: DerivedKind,
    pub column: String,
}

#[derive(Clone, Debug)]
pub struct FilterBindings {
    pub enabled: bool,
    /// None allows every property path.
    pub including: Option<HashSet<String>>,
    pub string_match: StringMatch,
    pub range: HashSet<String>,
}

impl FilterBindings {
    pub fn allows(&self, path: &str) -> bool {
        self.enabled
            && self
                .including
                .as_ref()
                .map(|set| set.contains(path))
                .unwrap_or(true)
    }
}

#[derive(Clone, Debug)]
pub struct ResolvedEntity {
    pub table_id: String,
    pub schema_name: String,
    pub table_name: String,
    pub path_segment: String,
    pub collection_rel: String,
    pub item_rel: String,
    pub pk_column: String,
    pub pk_type: PkType,
    pub columns: Vec<ColumnInfo>,
    pub operations: HashSet<String>,
    pub expose_id: bool,
    pub associations: Vec<AssociationSpec>,
    pub derived: Vec<DerivedProperty>,
    pub filters: FilterBindings,
    pub validation: HashMap<String, ValidationRule>,
}

impl ResolvedEntity {
    pub fn column(&self, name: &str) -> Option<&ColumnInfo> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn pk(&self) -> Option<&ColumnInfo> {
        self.columns.iter().find(|c| c.is_pk)
    }

    pub fn association(&self, name: &str) -> Option<&AssociationSpec> {
        self.associations.iter().find(|a| a.name == name)
    }

    pub fn derived_by_filter(&self, filter_name: &str) -> Option<&DerivedProperty> {
        self.derived
            .iter()
            .find(|d| d.filter_name.as_deref() == Some(filter_name))
    }

    pub fn allows(&self, operation: &str) -> bool {
        self.operations.contains(operation)
    }

    /// Columns exposed as JSON properties (primary key included, foreign keys excluded).
    pub fn property_columns(&self) -> impl Iterator<Item = &ColumnInfo> {
        self.columns.iter().filter(|c| !c.is_foreign_key)
    }

    /// Columns a request body may write.
    pub fn writable_columns(&self) -> impl Iterator<Item = &ColumnInfo> {
        self.columns.iter().filter(|c| !c.is_pk && !c.is_foreign_key)
    }
}

#[derive(Clone, Debug)]
pub struct ResolvedModel {
    pub entities: Vec<ResolvedEntity>,
    pub entity_by_path: HashMap<String, ResolvedEntity>,
}

impl ResolvedModel {
    pub fn entity_by_path(&self, path: &str) -> Option<&ResolvedEntity> {
        self.entity_by_path.get(path)
    }
}
