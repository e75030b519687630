//! `page`, `size` and `sort` parameters.

use crate::case::property_path;
use crate::config::{AssociationLink, Cardinality, ResolvedEntity, ResolvedModel};

pub const DEFAULT_PAGE_SIZE: u32 = 20;
pub const MAX_PAGE_SIZE: u32 = 1000;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SortOrder {
    pub column: String,
    pub descending: bool,
    /// Set when sorting by a property of a to-one association (`director.lastName`).
    pub via: Option<SortJoin>,
}

impl SortOrder {
    pub fn column(column: &str, descending: bool) -> Self {
        SortOrder {
            column: column.to_string(),
            descending,
            via: None,
        }
    }
}

/// Target table reached through a foreign key column of the sorted entity.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SortJoin {
    pub foreign_key: String,
    pub schema_name: String,
    pub table_name: String,
    pub pk_column: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Pageable {
    /// Zero-based page number.
    pub page: u32,
    pub size: u32,
    pub sort: Vec<SortOrder>,
}

impl Default for Pageable {
    fn default() -> Self {
        Pageable {
            page: 0,
            size: DEFAULT_PAGE_SIZE,
            sort: Vec::new(),
        }
    }
}

impl Pageable {
    pub fn from_params(
        model: &ResolvedModel,
        entity: &ResolvedEntity,
        params: &[(String, String)],
    ) -> Self {
        let mut pageable = Pageable::default();
        for (name, value) in params {
            match name.as_str() {
                "page" => pageable.page = value.trim().parse().unwrap_or(0),
                "size" => {
                    pageable.size = match value.trim().parse::<u32>() {
                        Ok(n) if n >= 1 => n.min(MAX_PAGE_SIZE),
                        _ => DEFAULT_PAGE_SIZE,
                    }
                }
                "sort" => pageable.sort.extend(parse_sort(model, entity, value)),
                _ => {}
            }
        }
        pageable
    }

    pub fn offset(&self) -> u64 {
        u64::from(self.page) * u64::from(self.size)
    }

    pub fn total_pages(&self, total_elements: i64) -> u64 {
        let total = total_elements.max(0) as u64;
        total.div_ceil(u64::from(self.size))
    }
}

/// `prop[,prop...][,asc|desc]`. A prop is a column or `association.column` over a to-one
/// foreign key. Anything else is dropped.
fn parse_sort(model: &ResolvedModel, entity: &ResolvedEntity, value: &str) -> Vec<SortOrder> {
    let mut tokens: Vec<&str> = value.split(',').map(str::trim).filter(|t| !t.is_empty()).collect();
    let descending = match tokens.last().map(|t| t.to_ascii_lowercase()) {
        Some(d) if d == "desc" => {
            tokens.pop();
            true
        }
        Some(d) if d == "asc" => {
            tokens.pop();
            false
        }
        _ => false,
    };
    tokens
        .into_iter()
        .filter_map(|token| sort_order(model, entity, token, descending))
        .collect()
}

fn sort_order(
    model: &ResolvedModel,
    entity: &ResolvedEntity,
    token: &str,
    descending: bool,
) -> Option<SortOrder> {
    let path = property_path(token)?;
    match path.as_slice() {
        [name] => entity
            .property_columns()
            .any(|c| &c.name == name)
            .then(|| SortOrder::column(name, descending)),
        [association, name] => {
            let association = entity.association(association)?;
            let AssociationLink::ForeignKey { column } = &association.link else {
                return None;
            };
            if association.cardinality != Cardinality::ToOne {
                return None;
            }
            let target = model.entity_by_path(&association.target_path_segment)?;
            if !target.property_columns().any(|c| &c.name == name) {
                return None;
            }
            Some(SortOrder {
                column: name.clone(),
                descending,
                via: Some(SortJoin {
                    foreign_key: column.clone(),
                    schema_name: target.schema_name.clone(),
                    table_name: target.table_name.clone(),
                    pk_column: target.pk_column.clone(),
                }),
            })
        }
        _ => None,
    }
}
