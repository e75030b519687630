//! Generic CRUD and association execution against PostgreSQL.

use crate::config::{
    AssociationLink, AssociationSpec, ColumnKind, PkType, ResolvedEntity, ResolvedModel,
};
use crate::error::{AppError, ConfigError};
use crate::query::{Pageable, Predicate};
use crate::service::{BoundBody, BoundLink};
use crate::sql::{self, LinkTable, PgBindValue, QueryBuf};
use serde_json::Value;
use sqlx::postgres::{PgArguments, PgRow};
use sqlx::{PgConnection, PgExecutor, PgPool, Postgres, Row};

/// One page of rows plus the number of rows matching the predicates.
#[derive(Debug)]
pub struct Page {
    pub rows: Vec<Value>,
    pub total_elements: i64,
}

pub struct CrudService;

impl CrudService {
    pub async fn page(
        pool: &PgPool,
        entity: &ResolvedEntity,
        predicates: &[Predicate],
        pageable: &Pageable,
    ) -> Result<Page, AppError> {
        let count = sql::count(entity, predicates);
        let total_elements: i64 = build(&count).fetch_one(pool).await?.try_get(0)?;
        let rows = if total_elements == 0 {
            Vec::new()
        } else {
            fetch_all(pool, &sql::select_page(entity, predicates, pageable)).await?
        };
        Ok(Page {
            rows,
            total_elements,
        })
    }

    /// Fetch one row by primary key. Returns JSON object or None.
    pub async fn read(
        pool: &PgPool,
        entity: &ResolvedEntity,
        id: &PgBindValue,
    ) -> Result<Option<Value>, AppError> {
        fetch_optional(pool, &sql::select_by_id(entity, id)).await
    }

    pub async fn exists<'c>(
        conn: impl PgExecutor<'c>,
        entity: &ResolvedEntity,
        id: &PgBindValue,
    ) -> Result<bool, AppError> {
        let q = sql::exists_by_id(entity, id);
        Ok(build(&q).fetch_one(conn).await?.try_get(0)?)
    }

    /// Insert one row and its links in a transaction. Returns the created row.
    pub async fn create(
        pool: &PgPool,
        model: &ResolvedModel,
        entity: &ResolvedEntity,
        body: BoundBody,
    ) -> Result<Value, AppError> {
        for association in entity.associations.iter().filter(|a| a.required) {
            if !body.links.iter().any(|l| l.association == association.name) {
                return Err(AppError::Conflict(format!(
                    "{} requires {}",
                    entity.item_rel, association.name
                )));
            }
        }
        let mut tx = pool.begin().await?;
        let (columns, join_links) = split_links(&mut tx, model, entity, body).await?;
        let inserted = sql::insert(entity, &columns);
        let row = build(&inserted).fetch_one(&mut *tx).await?;
        let id = row_id(&row, &entity.pk_type)?;
        for (association, targets) in &join_links {
            write_join_links(&mut tx, association, &id, targets, false).await?;
        }
        let created = fetch_optional(&mut *tx, &sql::select_by_id(entity, &id))
            .await?
            .ok_or(AppError::Db(sqlx::Error::RowNotFound))?;
        tx.commit().await?;
        tracing::info!(entity = %entity.path_segment, id = ?id, "created");
        Ok(created)
    }

    /// PUT: every writable column is replaced, absent ones become null.
    pub async fn replace(
        pool: &PgPool,
        model: &ResolvedModel,
        entity: &ResolvedEntity,
        id: &PgBindValue,
        mut body: BoundBody,
    ) -> Result<Option<Value>, AppError> {
        for column in entity.writable_columns() {
            if !body.columns.iter().any(|(name, _)| *name == column.name) {
                body.columns.push((column.name.clone(), PgBindValue::Null(column.kind)));
            }
        }
        Self::update(pool, model, entity, id, body).await
    }

    /// PATCH: only the bound columns and associations change.
    pub async fn patch(
        pool: &PgPool,
        model: &ResolvedModel,
        entity: &ResolvedEntity,
        id: &PgBindValue,
        body: BoundBody,
    ) -> Result<Option<Value>, AppError> {
        Self::update(pool, model, entity, id, body).await
    }

    async fn update(
        pool: &PgPool,
        model: &ResolvedModel,
        entity: &ResolvedEntity,
        id: &PgBindValue,
        body: BoundBody,
    ) -> Result<Option<Value>, AppError> {
        let mut tx = pool.begin().await?;
        if !Self::exists(&mut *tx, entity, id).await? {
            return Ok(None);
        }
        let (columns, join_links) = split_links(&mut tx, model, entity, body).await?;
        build(&sql::update(entity, id, &columns))
            .fetch_one(&mut *tx)
            .await?;
        for (association, targets) in &join_links {
            write_join_links(&mut tx, association, id, targets, true).await?;
        }
        let row = fetch_optional(&mut *tx, &sql::select_by_id(entity, id)).await?;
        tx.commit().await?;
        tracing::info!(entity = %entity.path_segment, id = ?id, "updated");
        Ok(row)
    }

    /// Delete one row by id. Returns whether it existed.
    pub async fn delete(
        pool: &PgPool,
        entity: &ResolvedEntity,
        id: &PgBindValue,
    ) -> Result<bool, AppError> {
        let deleted = build(&sql::delete(entity, id)).fetch_optional(pool).await?;
        if deleted.is_some() {
            tracing::info!(entity = %entity.path_segment, id = ?id, "deleted");
        }
        Ok(deleted.is_some())
    }

    /// Rows linked to `id` through `association`.
    pub async fn associated(
        pool: &PgPool,
        model: &ResolvedModel,
        entity: &ResolvedEntity,
        association: &AssociationSpec,
        id: &PgBindValue,
    ) -> Result<Vec<Value>, AppError> {
        let target = target_of(model, association)?;
        fetch_all(pool, &sql::select_associated(entity, &association.link, target, id)).await
    }

    pub async fn associated_item(
        pool: &PgPool,
        model: &ResolvedModel,
        entity: &ResolvedEntity,
        association: &AssociationSpec,
        id: &PgBindValue,
        target_id: &PgBindValue,
    ) -> Result<Option<Value>, AppError> {
        let target = target_of(model, association)?;
        let q = sql::select_associated_item(entity, &association.link, target, id, target_id);
        fetch_optional(pool, &q).await
    }

    /// Replace the whole association. Returns false when the source row does not exist.
    pub async fn replace_association(
        pool: &PgPool,
        model: &ResolvedModel,
        entity: &ResolvedEntity,
        association: &AssociationSpec,
        id: &PgBindValue,
        targets: Vec<PgBindValue>,
    ) -> Result<bool, AppError> {
        let mut tx = pool.begin().await?;
        if !Self::exists(&mut *tx, entity, id).await? {
            return Ok(false);
        }
        let body = BoundBody {
            columns: Vec::new(),
            links: vec![BoundLink {
                association: association.name.clone(),
                targets,
            }],
        };
        let (columns, join_links) = split_links(&mut tx, model, entity, body).await?;
        if !columns.is_empty() {
            build(&sql::update(entity, id, &columns)).fetch_one(&mut *tx).await?;
        }
        for (association, targets) in &join_links {
            write_join_links(&mut tx, association, id, targets, true).await?;
        }
        tx.commit().await?;
        Ok(true)
    }

    /// Link more rows to a to-many association.
    pub async fn add_to_association(
        pool: &PgPool,
        model: &ResolvedModel,
        entity: &ResolvedEntity,
        association: &AssociationSpec,
        id: &PgBindValue,
        targets: Vec<PgBindValue>,
    ) -> Result<bool, AppError> {
        if LinkTable::of(&association.link).is_none() {
            return Err(AppError::MethodNotAllowed(format!(
                "cannot add to {}",
                association.name
            )));
        }
        let mut tx = pool.begin().await?;
        if !Self::exists(&mut *tx, entity, id).await? {
            return Ok(false);
        }
        ensure_targets_exist(&mut tx, target_of(model, association)?, &targets).await?;
        write_join_links(&mut tx, association, id, &targets, false).await?;
        tx.commit().await?;
        Ok(true)
    }

    /// Unlink every row. A mandatory to-one association cannot be cleared.
    pub async fn clear_association(
        pool: &PgPool,
        entity: &ResolvedEntity,
        association: &AssociationSpec,
        id: &PgBindValue,
    ) -> Result<bool, AppError> {
        let mut tx = pool.begin().await?;
        if !Self::exists(&mut *tx, entity, id).await? {
            return Ok(false);
        }
        match &association.link {
            AssociationLink::ForeignKey { column } => {
                if association.required {
                    return Err(mandatory(entity, association));
                }
                let q = sql::set_foreign_key(entity, column, id, &null_for(entity, column));
                build(&q).fetch_one(&mut *tx).await?;
            }
            AssociationLink::JoinTable { .. } => {
                write_join_links(&mut tx, association, id, &[], true).await?;
            }
            AssociationLink::InverseForeignKey { .. } => {
                return Err(read_only(association));
            }
        }
        tx.commit().await?;
        Ok(true)
    }

    /// Unlink one row. Returns false when the source row or the link does not exist.
    pub async fn remove_from_association(
        pool: &PgPool,
        model: &ResolvedModel,
        entity: &ResolvedEntity,
        association: &AssociationSpec,
        id: &PgBindValue,
        target_id: &PgBindValue,
    ) -> Result<bool, AppError> {
        match &association.link {
            AssociationLink::JoinTable { .. } => {
                let link = LinkTable::of(&association.link).ok_or_else(|| read_only(association))?;
                let removed = build(&sql::delete_link(link, id, target_id))
                    .fetch_optional(pool)
                    .await?;
                Ok(removed.is_some())
            }
            AssociationLink::ForeignKey { column } => {
                let linked =
                    Self::associated_item(pool, model, entity, association, id, target_id).await?;
                if linked.is_none() {
                    return Ok(false);
                }
                if association.required {
                    return Err(mandatory(entity, association));
                }
                let q = sql::set_foreign_key(entity, column, id, &null_for(entity, column));
                build(&q).fetch_one(pool).await?;
                Ok(true)
            }
            AssociationLink::InverseForeignKey { .. } => Err(read_only(association)),
        }
    }
}

fn mandatory(entity: &ResolvedEntity, association: &AssociationSpec) -> AppError {
    AppError::Conflict(format!(
        "{} of {} cannot be cleared",
        association.name, entity.item_rel
    ))
}

fn read_only(association: &AssociationSpec) -> AppError {
    AppError::MethodNotAllowed(format!("{} is read-only", association.name))
}

fn target_of<'m>(
    model: &'m ResolvedModel,
    association: &AssociationSpec,
) -> Result<&'m ResolvedEntity, AppError> {
    model
        .entity_by_path(&association.target_path_segment)
        .ok_or_else(|| {
            ConfigError::MissingReference {
                kind: "api entity",
                id: association.target_path_segment.clone(),
            }
            .into()
        })
}

/// Check link targets, then fold to-one links into column values.
/// Join table links are returned for writing once the row exists.
async fn split_links<'e>(
    conn: &mut PgConnection,
    model: &ResolvedModel,
    entity: &'e ResolvedEntity,
    body: BoundBody,
) -> Result<(Vec<(String, PgBindValue)>, Vec<(&'e AssociationSpec, Vec<PgBindValue>)>), AppError> {
    let mut columns = body.columns;
    let mut join_links = Vec::new();
    for link in body.links {
        let association = entity.association(&link.association).ok_or_else(|| {
            AppError::BadRequest(format!("unknown association {}", link.association))
        })?;
        ensure_targets_exist(conn, target_of(model, association)?, &link.targets).await?;
        match &association.link {
            AssociationLink::ForeignKey { column } => {
                let mut targets = link.targets;
                if targets.len() > 1 {
                    return Err(AppError::BadRequest(format!(
                        "{} links to a single resource",
                        association.name
                    )));
                }
                let value = match targets.pop() {
                    Some(target) => target,
                    None if association.required => return Err(mandatory(entity, association)),
                    None => null_for(entity, column),
                };
                columns.push((column.clone(), value));
            }
            AssociationLink::JoinTable { .. } => join_links.push((association, link.targets)),
            AssociationLink::InverseForeignKey { .. } => return Err(read_only(association)),
        }
    }
    Ok((columns, join_links))
}

async fn ensure_targets_exist(
    conn: &mut PgConnection,
    target: &ResolvedEntity,
    ids: &[PgBindValue],
) -> Result<(), AppError> {
    for id in ids {
        if !CrudService::exists(&mut *conn, target, id).await? {
            return Err(AppError::BadRequest(format!(
                "{} {:?} does not exist",
                target.item_rel, id
            )));
        }
    }
    Ok(())
}

async fn write_join_links(
    conn: &mut PgConnection,
    association: &AssociationSpec,
    id: &PgBindValue,
    targets: &[PgBindValue],
    replace: bool,
) -> Result<(), AppError> {
    let link = LinkTable::of(&association.link).ok_or_else(|| read_only(association))?;
    if replace {
        build(&sql::delete_links(link, id)).execute(&mut *conn).await?;
    }
    let mut unique: Vec<PgBindValue> = Vec::with_capacity(targets.len());
    for t in targets {
        if !unique.contains(t) {
            unique.push(t.clone());
        }
    }
    if !unique.is_empty() {
        build(&sql::insert_links(link, id, &unique)).execute(&mut *conn).await?;
    }
    Ok(())
}

fn null_for(entity: &ResolvedEntity, column: &str) -> PgBindValue {
    PgBindValue::Null(entity.column(column).map_or(ColumnKind::Other, |c| c.kind))
}

fn build(q: &QueryBuf) -> sqlx::query::Query<'_, Postgres, PgArguments> {
    tracing::debug!(sql = %q.sql, params = ?q.params, "query");
    let mut query = sqlx::query(&q.sql);
    for p in &q.params {
        query = query.bind(p.clone());
    }
    query
}

async fn fetch_all<'c>(conn: impl PgExecutor<'c>, q: &QueryBuf) -> Result<Vec<Value>, AppError> {
    let rows = build(q).fetch_all(conn).await?;
    rows.iter().map(row_to_json).collect()
}

async fn fetch_optional<'c>(
    conn: impl PgExecutor<'c>,
    q: &QueryBuf,
) -> Result<Option<Value>, AppError> {
    build(q)
        .fetch_optional(conn)
        .await?
        .as_ref()
        .map(row_to_json)
        .transpose()
}

fn row_id(row: &PgRow, pk_type: &PkType) -> Result<PgBindValue, AppError> {
    Ok(match pk_type {
        PkType::BigInt => PgBindValue::I64(row.try_get(0)?),
        PkType::Int => PgBindValue::I64(i64::from(row.try_get::<i32, _>(0)?)),
        PkType::Text => PgBindValue::String(row.try_get(0)?),
    })
}

fn row_to_json(row: &PgRow) -> Result<Value, AppError> {
    use sqlx::{Column, TypeInfo};
    let mut map = serde_json::Map::new();
    for (i, col) in row.columns().iter().enumerate() {
        let v = cell_to_value(row, i, col.type_info().name())?;
        map.insert(col.name().to_string(), v);
    }
    Ok(Value::Object(map))
}

fn cell_to_value(row: &PgRow, i: usize, type_name: &str) -> Result<Value, sqlx::Error> {
    let v = match type_name {
        "INT2" => row.try_get::<Option<i16>, _>(i)?.map(Value::from),
        "INT4" => row.try_get::<Option<i32>, _>(i)?.map(Value::from),
        "INT8" => row.try_get::<Option<i64>, _>(i)?.map(Value::from),
        "FLOAT4" => row.try_get::<Option<f32>, _>(i)?.map(Value::from),
        "FLOAT8" => row.try_get::<Option<f64>, _>(i)?.map(Value::from),
        "BOOL" => row.try_get::<Option<bool>, _>(i)?.map(Value::from),
        "DATE" => row
            .try_get::<Option<chrono::NaiveDate>, _>(i)?
            .map(|d| Value::String(d.format(sql::DATE_FORMAT).to_string())),
        "TIMESTAMPTZ" => row
            .try_get::<Option<chrono::DateTime<chrono::Utc>>, _>(i)?
            .map(|d| Value::String(d.to_rfc3339())),
        "TIMESTAMP" => row
            .try_get::<Option<chrono::NaiveDateTime>, _>(i)?
            .map(|d| Value::String(d.format("%Y-%m-%dT%H:%M:%S%.f").to_string())),
        "JSON" | "JSONB" => row.try_get::<Option<Value>, _>(i)?,
        _ => row.try_get::<Option<String>, _>(i).ok().flatten().map(Value::String),
    };
    Ok(v.unwrap_or(Value::Null))
}
