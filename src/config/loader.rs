//! Load the catalog (embedded or from a directory) and resolve it into the runtime model.

use crate::config::resolved::{
    AssociationLink, AssociationSpec, Cardinality, ColumnInfo, ColumnKind, DerivedProperty,
    FilterBindings, PkType, ResolvedEntity, ResolvedModel,
};
use crate::config::types::*;
use crate::config::{default_schema_id, validate};
use crate::error::ConfigError;
use std::collections::{HashMap, HashSet};
use std::path::Path;

const BUILTIN_SCHEMAS: &str = include_str!("../../catalog/schemas.json");
const BUILTIN_TABLES: &str = include_str!("../../catalog/tables.json");
const BUILTIN_COLUMNS: &str = include_str!("../../catalog/columns.json");
const BUILTIN_RELATIONSHIPS: &str = include_str!("../../catalog/relationships.json");
const BUILTIN_JOIN_TABLES: &str = include_str!("../../catalog/join_tables.json");
const BUILTIN_API_ENTITIES: &str = include_str!("../../catalog/api_entities.json");

fn parse<T>(file: &str, text: &str) -> Result<Vec<T>, ConfigError>
where
    T: for<'de> serde::Deserialize<'de>,
{
    serde_json::from_str(text).map_err(|e| ConfigError::Load(format!("{}: {}", file, e)))
}

impl FullConfig {
    /// The movies catalog shipped with the crate.
    pub fn builtin() -> Result<FullConfig, ConfigError> {
        Ok(FullConfig {
            schemas: parse("schemas.json", BUILTIN_SCHEMAS)?,
            tables: parse("tables.json", BUILTIN_TABLES)?,
            columns: parse("columns.json", BUILTIN_COLUMNS)?,
            relationships: parse("relationships.json", BUILTIN_RELATIONSHIPS)?,
            join_tables: parse("join_tables.json", BUILTIN_JOIN_TABLES)?,
            api_entities: parse("api_entities.json", BUILTIN_API_ENTITIES)?,
        })
    }

    /// Load a catalog from a directory laid out like `catalog/`.
    /// `relationships.json` and `join_tables.json` are optional.
    pub async fn from_dir(dir: &Path) -> Result<FullConfig, ConfigError> {
        async fn read(dir: &Path, file: &str, optional: bool) -> Result<String, ConfigError> {
            match tokio::fs::read_to_string(dir.join(file)).await {
                Ok(text) => Ok(text),
                Err(e) if optional && e.kind() == std::io::ErrorKind::NotFound => Ok("[]".into()),
                Err(e) => Err(ConfigError::Load(format!("{}: {}", dir.join(file).display(), e))),
            }
        }
        Ok(FullConfig {
            schemas: parse("schemas.json", &read(dir, "schemas.json", false).await?)?,
            tables: parse("tables.json", &read(dir, "tables.json", false).await?)?,
            columns: parse("columns.json", &read(dir, "columns.json", false).await?)?,
            relationships: parse("relationships.json", &read(dir, "relationships.json", true).await?)?,
            join_tables: parse("join_tables.json", &read(dir, "join_tables.json", true).await?)?,
            api_entities: parse("api_entities.json", &read(dir, "api_entities.json", false).await?)?,
        })
    }
}

/// Build resolved model from full config (validates first).
pub fn resolve(config: &FullConfig) -> Result<ResolvedModel, ConfigError> {
    validate(config)?;
    let default_sid = default_schema_id(config)?;

    let schemas_by_id: HashMap<_, _> = config.schemas.iter().map(|s| (s.id.as_str(), s)).collect();
    let tables_by_id: HashMap<_, _> = config.tables.iter().map(|t| (t.id.as_str(), t)).collect();
    let columns_by_table: HashMap<_, Vec<&ColumnConfig>> =
        config.columns.iter().fold(HashMap::new(), |mut m, c| {
            m.entry(c.table_id.as_str()).or_default().push(c);
            m
        });
    let column_id_to_name: HashMap<&str, &str> = config
        .columns
        .iter()
        .map(|c| (c.id.as_str(), c.name.as_str()))
        .collect();
    let table_id_to_path: HashMap<&str, &str> = config
        .api_entities
        .iter()
        .map(|api| (api.entity_id.as_str(), api.path_segment.as_str()))
        .collect();
    let schema_name = |sid: Option<&str>| -> Result<String, ConfigError> {
        let sid = sid.unwrap_or(default_sid);
        schemas_by_id
            .get(sid)
            .map(|s| s.name.clone())
            .ok_or_else(|| ConfigError::MissingReference {
                kind: "schema",
                id: sid.to_string(),
            })
    };

    let mut entities = Vec::new();
    let mut entity_by_path = HashMap::new();

    for api in &config.api_entities {
        let table = tables_by_id
            .get(api.entity_id.as_str())
            .ok_or_else(|| ConfigError::MissingReference {
                kind: "table",
                id: api.entity_id.clone(),
            })?;
        let table_columns = columns_by_table
            .get(table.id.as_str())
            .map(|v| v.as_slice())
            .unwrap_or(&[]);

        let fk_columns: HashSet<&str> = config
            .relationships
            .iter()
            .filter(|r| r.from_table_id == table.id)
            .filter_map(|r| column_id_to_name.get(r.from_column_id.as_str()).copied())
            .collect();

        let columns: Vec<ColumnInfo> = table_columns
            .iter()
            .map(|c| {
                let is_pk = c.name == table.primary_key;
                ColumnInfo {
                    name: c.name.clone(),
                    kind: column_kind(&c.type_),
                    pg_type: column_pg_type_name(&c.type_),
                    nullable: c.nullable,
                    has_default: c.default.is_some() || is_serial(&c.type_),
                    is_pk,
                    is_foreign_key: fk_columns.contains(c.name.as_str()),
                }
            })
            .collect();
        let pk_col = table_columns
            .iter()
            .find(|c| c.name == table.primary_key)
            .ok_or_else(|| ConfigError::InvalidPrimaryKey {
                table_id: table.id.clone(),
                column: table.primary_key.clone(),
            })?;

        let associations = build_associations_for_table(
            &table.id,
            config,
            &column_id_to_name,
            &table_id_to_path,
            &schema_name,
        )?;

        let mut validation = api.validation.clone();
        for c in columns.iter().filter(|c| !c.is_pk && !c.is_foreign_key) {
            if !c.nullable && !c.has_default {
                validation.entry(c.name.clone()).or_default().required = Some(true);
            }
        }

        let filters = FilterBindings {
            enabled: api.filters.enabled,
            including: if api.filters.including.is_empty() {
                None
            } else {
                Some(api.filters.including.iter().cloned().collect())
            },
            string_match: api.filters.string_match,
            range: api.filters.range.iter().cloned().collect(),
        };

        let entity = ResolvedEntity {
            table_id: table.id.clone(),
            schema_name: schema_name(table.schema_id.as_deref())?,
            table_name: table.name.clone(),
            path_segment: api.path_segment.clone(),
            collection_rel: api
                .collection_rel
                .clone()
                .unwrap_or_else(|| api.path_segment.clone()),
            item_rel: api.item_rel.clone().unwrap_or_else(|| table.name.clone()),
            pk_column: table.primary_key.clone(),
            pk_type: infer_pk_type(pk_col),
            columns,
            operations: api.operations.iter().cloned().collect(),
            expose_id: api.expose_id,
            associations,
            derived: api
                .derived
                .iter()
                .map(|d| DerivedProperty {
                    name: d.name.clone(),
                    filter_name: d.filter_name.clone(),
                    kind: d.kind,
                    column: d.column.clone(),
                })
                .collect(),
            filters,
            validation,
        };
        entity_by_path.insert(api.path_segment.clone(), entity.clone());
        entities.push(entity);
    }

    Ok(ResolvedModel {
        entities,
        entity_by_path,
    })
}

fn build_associations_for_table(
    our_table_id: &str,
    config: &FullConfig,
    column_id_to_name: &HashMap<&str, &str>,
    table_id_to_path: &HashMap<&str, &str>,
    schema_name: &dyn Fn(Option<&str>) -> Result<String, ConfigError>,
) -> Result<Vec<AssociationSpec>, ConfigError> {
    let mut associations = Vec::new();
    let nullable_by_id: HashMap<&str, bool> = config
        .columns
        .iter()
        .map(|c| (c.id.as_str(), c.nullable))
        .collect();

    for rel in &config.relationships {
        let Some(from_col) = column_id_to_name.get(rel.from_column_id.as_str()) else {
            continue;
        };
        if rel.from_table_id == our_table_id {
            if let (Some(name), Some(target)) = (&rel.from_property, table_id_to_path.get(rel.to_table_id.as_str())) {
                let nullable = nullable_by_id.get(rel.from_column_id.as_str()).copied().unwrap_or(true);
                associations.push(AssociationSpec {
                    name: name.clone(),
                    target_path_segment: target.to_string(),
                    cardinality: Cardinality::ToOne,
                    link: AssociationLink::ForeignKey {
                        column: from_col.to_string(),
                    },
                    writable: true,
                    required: !nullable,
                });
            }
        }
        if rel.to_table_id == our_table_id {
            if let (Some(name), Some(target)) = (&rel.to_property, table_id_to_path.get(rel.from_table_id.as_str())) {
                associations.push(AssociationSpec {
                    name: name.clone(),
                    target_path_segment: target.to_string(),
                    cardinality: Cardinality::ToMany,
                    link: AssociationLink::InverseForeignKey {
                        column: from_col.to_string(),
                    },
                    writable: false,
                    required: false,
                });
            }
        }
    }

    for jt in &config.join_tables {
        let sides = [
            (&jt.left_table_id, &jt.left_column, &jt.left_property, &jt.right_table_id, &jt.right_column),
            (&jt.right_table_id, &jt.right_column, &jt.right_property, &jt.left_table_id, &jt.left_column),
        ];
        for (ours, our_column, property, theirs, their_column) in sides {
            if ours != our_table_id {
                continue;
            }
            let Some(target) = table_id_to_path.get(theirs.as_str()) else {
                continue;
            };
            associations.push(AssociationSpec {
                name: property.clone(),
                target_path_segment: target.to_string(),
                cardinality: Cardinality::ToMany,
                link: AssociationLink::JoinTable {
                    schema: schema_name(jt.schema_id.as_deref())?,
                    table: jt.name.clone(),
                    our_column: our_column.clone(),
                    their_column: their_column.clone(),
                },
                writable: true,
                required: false,
            });
        }
    }
    Ok(associations)
}

fn column_kind(ty: &ColumnTypeConfig) -> ColumnKind {
    let lower = ty.name().to_lowercase();
    if lower == "date" {
        ColumnKind::Date
    } else if lower.starts_with("bool") {
        ColumnKind::Boolean
    } else if lower.contains("int") || lower.contains("serial") {
        ColumnKind::Integer
    } else if lower == "text" || lower.contains("char") {
        ColumnKind::Text
    } else {
        ColumnKind::Other
    }
}

/// Cast target for bound parameters. None leaves the parameter untyped.
fn column_pg_type_name(ty: &ColumnTypeConfig) -> Option<String> {
    let lower = ty.name().to_lowercase();
    let name = match lower.as_str() {
        "date" => "date",
        "text" | "varchar" | "character varying" | "char" | "character" => "text",
        "bool" | "boolean" => "bool",
        "bigint" | "bigserial" | "int8" => "int8",
        "integer" | "int" | "int4" | "serial" => "int4",
        "smallint" | "int2" | "smallserial" => "int2",
        "timestamptz" | "timestamp with time zone" => "timestamptz",
        "timestamp" => "timestamp",
        _ => return None,
    };
    Some(name.into())
}

fn is_serial(ty: &ColumnTypeConfig) -> bool {
    ty.name().to_lowercase().ends_with("serial")
}

fn infer_pk_type(col: &ColumnConfig) -> PkType {
    let type_lower = col.type_.name().to_lowercase();
    if type_lower.contains("bigserial") || type_lower.contains("bigint") {
        PkType::BigInt
    } else if type_lower.contains("serial") || type_lower.contains("int") {
        PkType::Int
    } else {
        PkType::Text
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model() -> ResolvedModel {
        resolve(&FullConfig::builtin().unwrap()).unwrap()
    }

    #[test]
    fn resolves_all_four_resources() {
        let model = model();
        let mut paths: Vec<&str> = model.entity_by_path.keys().map(String::as_str).collect();
        paths.sort();
        assert_eq!(paths, vec!["actors", "characters", "directors", "movies"]);
        let movie = model.entity_by_path("movies").unwrap();
        assert_eq!(movie.collection_rel, "movies");
        assert_eq!(movie.item_rel, "movie");
        assert_eq!(movie.pk_type, PkType::BigInt);
    }

    #[test]
    fn movie_director_is_mandatory_to_one() {
        let model = model();
        let movie = model.entity_by_path("movies").unwrap();
        let director = movie.association("director").unwrap();
        assert_eq!(director.cardinality, Cardinality::ToOne);
        assert!(director.required);
        assert_eq!(director.foreign_key_column(), Some("director_id"));
        assert!(movie.column("director_id").unwrap().is_foreign_key);
        assert!(movie.property_columns().all(|c| c.name != "director_id"));
    }

    #[test]
    fn director_movies_is_read_only_inverse() {
        let model = model();
        let director = model.entity_by_path("directors").unwrap();
        let movies = director.association("movies").unwrap();
        assert_eq!(movies.cardinality, Cardinality::ToMany);
        assert!(!movies.writable);
        assert_eq!(
            movies.link,
            AssociationLink::InverseForeignKey {
                column: "director_id".into()
            }
        );
    }

    #[test]
    fn join_tables_produce_both_sides() {
        let model = model();
        let character = model.entity_by_path("characters").unwrap();
        let mut names: Vec<&str> = character.associations.iter().map(|a| a.name.as_str()).collect();
        names.sort();
        assert_eq!(names, vec!["actors", "movies"]);
        match &character.association("actors").unwrap().link {
            AssociationLink::JoinTable {
                table,
                our_column,
                their_column,
                ..
            } => {
                assert_eq!(table, "actor_character");
                assert_eq!(our_column, "character_id");
                assert_eq!(their_column, "actor_id");
            }
            other => panic!("unexpected link {:?}", other),
        }
    }

    #[test]
    fn non_nullable_columns_become_required() {
        let model = model();
        let actor = model.entity_by_path("actors").unwrap();
        assert_eq!(actor.validation["first_name"].required, Some(true));
        assert_eq!(actor.validation["first_name"].max_length, Some(255));
        assert_eq!(actor.validation["death_date"].required, None);
        assert!(!actor.validation.contains_key("id"));
        assert_eq!(actor.column("birth_date").unwrap().kind, ColumnKind::Date);
        assert_eq!(actor.column("first_name").unwrap().pg_type.as_deref(), Some("text"));
    }

    #[test]
    fn actor_filters_are_restricted() {
        let model = model();
        let actor = model.entity_by_path("actors").unwrap();
        assert!(actor.filters.allows("first_name"));
        assert!(actor.filters.allows("alive"));
        assert!(!actor.filters.allows("characters.name"));
        let movie = model.entity_by_path("movies").unwrap();
        assert!(movie.filters.allows("director.first_name"));
    }
}
