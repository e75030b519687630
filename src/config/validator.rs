//! Catalog validation: referential integrity and API consistency.

use crate::config::FullConfig;
use crate::error::ConfigError;
use std::collections::{HashMap, HashSet};

pub const OPERATIONS: &[&str] = &["read", "create", "update", "delete"];

/// Default schema id when catalog entries omit schema_id.
pub fn default_schema_id(config: &FullConfig) -> Result<&str, ConfigError> {
    config
        .schemas
        .first()
        .map(|s| s.id.as_str())
        .ok_or_else(|| ConfigError::Validation("at least one schema required".into()))
}

pub fn validate(config: &FullConfig) -> Result<(), ConfigError> {
    let default_sid = default_schema_id(config)?;
    let schema_ids: HashSet<&str> = config.schemas.iter().map(|s| s.id.as_str()).collect();
    let table_ids: HashSet<&str> = config.tables.iter().map(|t| t.id.as_str()).collect();
    let column_table: HashMap<&str, &str> = config
        .columns
        .iter()
        .map(|c| (c.id.as_str(), c.table_id.as_str()))
        .collect();
    let mut table_columns: HashMap<&str, HashSet<&str>> = HashMap::new();
    for c in &config.columns {
        if !table_ids.contains(c.table_id.as_str()) {
            return Err(ConfigError::MissingReference {
                kind: "table",
                id: c.table_id.clone(),
            });
        }
        table_columns
            .entry(c.table_id.as_str())
            .or_default()
            .insert(c.name.as_str());
    }
    if column_table.len() != config.columns.len() {
        return Err(ConfigError::Validation("duplicate column id".into()));
    }

    for t in &config.tables {
        let sid = t.schema_id.as_deref().unwrap_or(default_sid);
        if !schema_ids.contains(sid) {
            return Err(ConfigError::MissingReference {
                kind: "schema",
                id: sid.to_string(),
            });
        }
        let has_pk = table_columns
            .get(t.id.as_str())
            .map(|cols| cols.contains(t.primary_key.as_str()))
            .unwrap_or(false);
        if !has_pk {
            return Err(ConfigError::InvalidPrimaryKey {
                table_id: t.id.clone(),
                column: t.primary_key.clone(),
            });
        }
    }

    // Association names per table, collected from relationships and join tables.
    let mut properties: HashMap<String, HashSet<String>> = HashMap::new();
    let mut add_property = |table: &str, name: &str| -> Result<(), ConfigError> {
        let clashes_with_column = table_columns
            .get(table)
            .map(|cols| cols.contains(name))
            .unwrap_or(false);
        let fresh = properties
            .entry(table.to_string())
            .or_default()
            .insert(name.to_string());
        if clashes_with_column || !fresh {
            return Err(ConfigError::Validation(format!(
                "association '{}' on table '{}' clashes with another property",
                name, table
            )));
        }
        Ok(())
    };

    for r in &config.relationships {
        let from_ok = column_table.get(r.from_column_id.as_str()) == Some(&r.from_table_id.as_str());
        let to_ok = column_table.get(r.to_column_id.as_str()) == Some(&r.to_table_id.as_str());
        if !table_ids.contains(r.from_table_id.as_str())
            || !table_ids.contains(r.to_table_id.as_str())
            || !from_ok
            || !to_ok
        {
            return Err(ConfigError::MissingReference {
                kind: "relationship",
                id: r.id.clone(),
            });
        }
        if let Some(p) = &r.from_property {
            add_property(&r.from_table_id, p)?;
        }
        if let Some(p) = &r.to_property {
            add_property(&r.to_table_id, p)?;
        }
    }

    for j in &config.join_tables {
        let sid = j.schema_id.as_deref().unwrap_or(default_sid);
        if !schema_ids.contains(sid)
            || !table_ids.contains(j.left_table_id.as_str())
            || !table_ids.contains(j.right_table_id.as_str())
        {
            return Err(ConfigError::MissingReference {
                kind: "join table",
                id: j.id.clone(),
            });
        }
        if j.left_column == j.right_column {
            return Err(ConfigError::Validation(format!(
                "join table '{}' needs two distinct columns",
                j.name
            )));
        }
        add_property(&j.left_table_id, &j.left_property)?;
        add_property(&j.right_table_id, &j.right_property)?;
    }

    let mut path_segments = HashSet::new();
    let mut collection_rels = HashSet::new();
    for api in &config.api_entities {
        if !table_ids.contains(api.entity_id.as_str()) {
            return Err(ConfigError::MissingReference {
                kind: "table",
                id: api.entity_id.clone(),
            });
        }
        if !path_segments.insert(api.path_segment.as_str()) {
            return Err(ConfigError::DuplicatePathSegment(api.path_segment.clone()));
        }
        let rel = api.collection_rel.as_deref().unwrap_or(&api.path_segment);
        if !collection_rels.insert(rel) {
            return Err(ConfigError::Validation(format!("duplicate collection rel: {}", rel)));
        }
        for op in &api.operations {
            if !OPERATIONS.contains(&op.as_str()) {
                return Err(ConfigError::Validation(format!(
                    "unknown operation '{}' on {}",
                    op, api.path_segment
                )));
            }
        }
        let columns = table_columns.get(api.entity_id.as_str());
        let has_column = |name: &str| columns.map(|c| c.contains(name)).unwrap_or(false);
        for d in &api.derived {
            if !has_column(&d.column) || has_column(&d.name) {
                return Err(ConfigError::Validation(format!(
                    "derived property '{}' on {} must read an existing column and not shadow one",
                    d.name, api.path_segment
                )));
            }
        }
        for r in &api.filters.range {
            if !has_column(r) {
                return Err(ConfigError::MissingReference {
                    kind: "range filter column",
                    id: format!("{}.{}", api.path_segment, r),
                });
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_catalog_is_valid() {
        let config = FullConfig::builtin().unwrap();
        validate(&config).unwrap();
    }

    #[test]
    fn rejects_duplicate_path_segments() {
        let mut config = FullConfig::builtin().unwrap();
        let mut copy = config.api_entities[0].clone();
        copy.collection_rel = Some("others".into());
        config.api_entities.push(copy);
        assert!(matches!(
            validate(&config),
            Err(ConfigError::DuplicatePathSegment(p)) if p == "actors"
        ));
    }

    #[test]
    fn rejects_relationship_to_unknown_column() {
        let mut config = FullConfig::builtin().unwrap();
        config.relationships[0].to_column_id = "director.missing".into();
        assert!(matches!(
            validate(&config),
            Err(ConfigError::MissingReference { kind: "relationship", .. })
        ));
    }

    #[test]
    fn rejects_association_named_like_a_column() {
        let mut config = FullConfig::builtin().unwrap();
        config.join_tables[0].left_property = "first_name".into();
        assert!(matches!(validate(&config), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn rejects_unknown_operation() {
        let mut config = FullConfig::builtin().unwrap();
        config.api_entities[1].operations.push("bulk_create".into());
        assert!(matches!(validate(&config), Err(ConfigError::Validation(_))));
    }
}
