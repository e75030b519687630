//! Apply the catalog to the database: DDL for schemas, tables, join tables, and foreign keys.
//! Every statement is idempotent so migrations run on each startup.

use crate::config::types::*;
use crate::config::{default_schema_id, validate, FullConfig};
use crate::error::{AppError, ConfigError};
use sqlx::PgPool;
use std::collections::HashMap;

fn quote(s: &str) -> String {
    format!("\"{}\"", s.replace('"', "\"\""))
}

fn literal(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}

fn type_str(ty: &ColumnTypeConfig) -> String {
    match ty {
        ColumnTypeConfig::Simple(s) => s.clone(),
        ColumnTypeConfig::Parameterized { name, params } => {
            let p = params
                .as_ref()
                .map(|v| v.iter().map(|n| n.to_string()).collect::<Vec<_>>().join(", "))
                .unwrap_or_default();
            if p.is_empty() {
                name.clone()
            } else {
                format!("{}({})", name, p)
            }
        }
    }
}

/// Type of a column referencing `ty`: serial types are referenced by their integer type.
fn reference_type(ty: &ColumnTypeConfig) -> String {
    match ty.name().to_lowercase().as_str() {
        "bigserial" | "serial8" => "bigint".into(),
        "serial" | "serial4" => "integer".into(),
        "smallserial" | "serial2" => "smallint".into(),
        _ => type_str(ty),
    }
}

/// Referential actions accepted in the catalog.
fn referential_action(action: Option<&str>) -> Result<&'static str, ConfigError> {
    let action = action.unwrap_or("NO ACTION").trim().to_uppercase();
    Ok(match action.as_str() {
        "NO ACTION" => "NO ACTION",
        "RESTRICT" => "RESTRICT",
        "CASCADE" => "CASCADE",
        "SET NULL" => "SET NULL",
        "SET DEFAULT" => "SET DEFAULT",
        _ => return Err(ConfigError::Validation(format!("unknown referential action: {}", action))),
    })
}

/// DDL statements for the catalog, in dependency order.
pub fn migration_statements(config: &FullConfig) -> Result<Vec<String>, ConfigError> {
    validate(config)?;
    let default_sid = default_schema_id(config)?;

    let schemas_by_id: HashMap<_, _> = config.schemas.iter().map(|s| (s.id.as_str(), s)).collect();
    let tables_by_id: HashMap<_, _> = config.tables.iter().map(|t| (t.id.as_str(), t)).collect();
    let columns_by_id: HashMap<_, _> = config.columns.iter().map(|c| (c.id.as_str(), c)).collect();
    let columns_by_table: HashMap<_, Vec<&ColumnConfig>> =
        config.columns.iter().fold(HashMap::new(), |mut m, c| {
            m.entry(c.table_id.as_str()).or_default().push(c);
            m
        });
    let qualified = |schema_id: Option<&str>, name: &str| -> Result<String, ConfigError> {
        let sid = schema_id.unwrap_or(default_sid);
        let schema = schemas_by_id.get(sid).ok_or_else(|| ConfigError::MissingReference {
            kind: "schema",
            id: sid.to_string(),
        })?;
        Ok(format!("{}.{}", quote(&schema.name), quote(name)))
    };
    let table_of = |id: &str| {
        tables_by_id.get(id).copied().ok_or_else(|| ConfigError::MissingReference {
            kind: "table",
            id: id.to_string(),
        })
    };

    let mut statements = Vec::new();

    for s in &config.schemas {
        statements.push(format!("CREATE SCHEMA IF NOT EXISTS {}", quote(&s.name)));
    }

    for t in &config.tables {
        let cols = columns_by_table
            .get(t.id.as_str())
            .map(|v| v.as_slice())
            .unwrap_or(&[]);
        let mut col_defs: Vec<String> = Vec::new();
        for c in cols {
            let mut def = format!("{} {}", quote(&c.name), type_str(&c.type_));
            if !c.nullable {
                def.push_str(" NOT NULL");
            }
            if let Some(ref d) = c.default {
                def.push_str(" DEFAULT ");
                match d {
                    ColumnDefaultConfig::Literal(s) => def.push_str(&literal(s)),
                    ColumnDefaultConfig::Expression { expression } => def.push_str(expression),
                }
            }
            col_defs.push(def);
        }
        col_defs.push(format!("PRIMARY KEY ({})", quote(&t.primary_key)));
        statements.push(format!(
            "CREATE TABLE IF NOT EXISTS {} (\n  {}\n)",
            qualified(t.schema_id.as_deref(), &t.name)?,
            col_defs.join(",\n  ")
        ));
    }

    for j in &config.join_tables {
        let full_name = qualified(j.schema_id.as_deref(), &j.name)?;
        let mut col_defs = Vec::new();
        let mut constraints = Vec::new();
        for (table_id, column) in [(&j.left_table_id, &j.left_column), (&j.right_table_id, &j.right_column)] {
            let table = table_of(table_id)?;
            let pk = columns_by_table
                .get(table.id.as_str())
                .and_then(|cols| cols.iter().find(|c| c.name == table.primary_key))
                .ok_or_else(|| ConfigError::InvalidPrimaryKey {
                    table_id: table.id.clone(),
                    column: table.primary_key.clone(),
                })?;
            col_defs.push(format!("{} {} NOT NULL", quote(column), reference_type(&pk.type_)));
            constraints.push(format!(
                "FOREIGN KEY ({}) REFERENCES {} ({}) ON DELETE CASCADE",
                quote(column),
                qualified(table.schema_id.as_deref(), &table.name)?,
                quote(&table.primary_key)
            ));
        }
        col_defs.push(format!(
            "PRIMARY KEY ({}, {})",
            quote(&j.left_column),
            quote(&j.right_column)
        ));
        col_defs.extend(constraints);
        statements.push(format!(
            "CREATE TABLE IF NOT EXISTS {} (\n  {}\n)",
            full_name,
            col_defs.join(",\n  ")
        ));
        // The primary key already covers lookups by the left column.
        statements.push(format!(
            "CREATE INDEX IF NOT EXISTS {} ON {} ({})",
            quote(&format!("{}_{}_idx", j.name, j.right_column)),
            full_name,
            quote(&j.right_column)
        ));
    }

    for rel in &config.relationships {
        let from_table = table_of(&rel.from_table_id)?;
        let to_table = table_of(&rel.to_table_id)?;
        let column = |id: &str| {
            columns_by_id
                .get(id)
                .map(|c| c.name.as_str())
                .ok_or_else(|| ConfigError::MissingReference {
                    kind: "column",
                    id: id.to_string(),
                })
        };
        let from_col = column(&rel.from_column_id)?;
        let to_col = column(&rel.to_column_id)?;
        let from_full = qualified(from_table.schema_id.as_deref(), &from_table.name)?;
        let to_full = qualified(to_table.schema_id.as_deref(), &to_table.name)?;
        statements.push(format!(
            "DO $$\nBEGIN\n  IF NOT EXISTS (SELECT 1 FROM pg_constraint WHERE conname = {}) THEN\n    \
             ALTER TABLE {} ADD CONSTRAINT {} FOREIGN KEY ({}) REFERENCES {} ({}) ON UPDATE {} ON DELETE {};\n  \
             END IF;\nEND\n$$",
            literal(&rel.id),
            from_full,
            quote(&rel.id),
            quote(from_col),
            to_full,
            quote(to_col),
            referential_action(rel.on_update.as_deref())?,
            referential_action(rel.on_delete.as_deref())?
        ));
        statements.push(format!(
            "CREATE INDEX IF NOT EXISTS {} ON {} ({})",
            quote(&format!("{}_{}_idx", from_table.name, from_col)),
            from_full,
            quote(from_col)
        ));
    }

    Ok(statements)
}

/// Apply the catalog in one transaction. Validates first.
pub async fn apply_migrations(pool: &PgPool, config: &FullConfig) -> Result<(), AppError> {
    let statements = migration_statements(config)?;
    let mut tx = pool.begin().await?;
    for sql in &statements {
        tracing::debug!(sql = %sql, "migration");
        sqlx::query(sql).execute(&mut *tx).await?;
    }
    tx.commit().await?;
    tracing::info!(statements = statements.len(), "catalog migrations applied");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn statements() -> Vec<String> {
        migration_statements(&FullConfig::builtin().unwrap()).unwrap()
    }

    #[test]
    fn creates_schema_first() {
        assert_eq!(statements()[0], "CREATE SCHEMA IF NOT EXISTS \"public\"");
    }

    #[test]
    fn creates_entity_tables() {
        let statements = statements();
        let actor = statements
            .iter()
            .find(|s| s.starts_with("CREATE TABLE IF NOT EXISTS \"public\".\"actor\""))
            .unwrap();
        assert!(actor.contains("\"id\" bigserial NOT NULL"));
        assert!(actor.contains("\"first_name\" varchar(255) NOT NULL"));
        assert!(actor.contains("\"death_date\" date,"));
        assert!(actor.contains("PRIMARY KEY (\"id\")"));
    }

    #[test]
    fn join_tables_cascade_and_use_composite_keys() {
        let statements = statements();
        let link = statements
            .iter()
            .find(|s| s.starts_with("CREATE TABLE IF NOT EXISTS \"public\".\"movie_character\""))
            .unwrap();
        assert!(link.contains("\"movie_id\" bigint NOT NULL"));
        assert!(link.contains("PRIMARY KEY (\"movie_id\", \"character_id\")"));
        assert!(link.contains(
            "FOREIGN KEY (\"character_id\") REFERENCES \"public\".\"character\" (\"id\") ON DELETE CASCADE"
        ));
    }

    #[test]
    fn foreign_keys_are_guarded() {
        let statements = statements();
        let fk = statements.iter().find(|s| s.starts_with("DO $$")).unwrap();
        assert!(fk.contains("WHERE conname = 'fk_movie_director'"));
        assert!(fk.contains(
            "ALTER TABLE \"public\".\"movie\" ADD CONSTRAINT \"fk_movie_director\" FOREIGN KEY (\"director_id\") \
             REFERENCES \"public\".\"director\" (\"id\") ON UPDATE NO ACTION ON DELETE NO ACTION"
        ));
        assert!(statements
            .iter()
            .any(|s| s == "CREATE INDEX IF NOT EXISTS \"movie_director_id_idx\" ON \"public\".\"movie\" (\"director_id\")"));
    }

    #[test]
    fn tables_precede_foreign_keys() {
        let statements = statements();
        let last_table = statements.iter().rposition(|s| s.starts_with("CREATE TABLE")).unwrap();
        let first_fk = statements.iter().position(|s| s.starts_with("DO $$")).unwrap();
        assert!(last_table < first_fk);
    }

    #[test]
    fn rejects_unknown_referential_action() {
        let mut config = FullConfig::builtin().unwrap();
        config.relationships[0].on_delete = Some("EXPLODE".into());
        assert!(matches!(migration_statements(&config), Err(ConfigError::Validation(_))));
    }
}
