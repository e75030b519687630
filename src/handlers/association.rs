//! Association resources under `/{repository}/{id}/{property}`. Writes take `text/uri-list`.

use super::{parse_id, require};
use crate::config::{AssociationSpec, Cardinality, ResolvedEntity};
use crate::error::AppError;
use crate::extractors::{HalContext, UriList};
use crate::hal;
use crate::response::{hal_ok, HalResponse};
use crate::service::{BodyBinder, CrudService};
use crate::sql::PgBindValue;
use crate::state::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
};

/// Source entity, the association and its target entity.
struct Resolved<'a> {
    entity: &'a ResolvedEntity,
    association: &'a AssociationSpec,
    target: &'a ResolvedEntity,
    id: PgBindValue,
}

fn resolve<'a>(
    state: &'a AppState,
    repository: &str,
    id: &str,
    property: &str,
) -> Result<Resolved<'a>, AppError> {
    let entity = state.entity(repository)?;
    let association = entity
        .association(property)
        .ok_or_else(|| AppError::NotFound(format!("{}/{}/{}", repository, id, property)))?;
    let target = state.entity(&association.target_path_segment)?;
    Ok(Resolved {
        entity,
        association,
        target,
        id: parse_id(&entity.pk_type, id)?,
    })
}

fn writable(r: &Resolved<'_>) -> Result<(), AppError> {
    require(r.entity, "update")?;
    if r.association.writable {
        Ok(())
    } else {
        Err(AppError::MethodNotAllowed(format!(
            "{} is read-only on {}",
            r.association.name, r.entity.path_segment
        )))
    }
}

fn not_found(repository: &str, id: &str) -> AppError {
    AppError::NotFound(format!("{}/{}", repository, id))
}

/// To-many: collection of linked items. To-one: the linked item, 404 when unset.
pub async fn read(
    State(state): State<AppState>,
    ctx: HalContext,
    Path((repository, id_str, property)): Path<(String, String, String)>,
) -> Result<HalResponse, AppError> {
    let r = resolve(&state, &repository, &id_str, &property)?;
    require(r.entity, "read")?;
    if !CrudService::exists(&state.pool, r.entity, &r.id).await? {
        return Err(not_found(&repository, &id_str));
    }
    let rows = CrudService::associated(&state.pool, &state.model, r.entity, r.association, &r.id).await?;
    let body = match r.association.cardinality {
        Cardinality::ToMany => {
            hal::association_collection(&ctx.links, r.entity, &id_str, &property, r.target, &rows)
        }
        Cardinality::ToOne => {
            let row = rows
                .first()
                .ok_or_else(|| AppError::NotFound(format!("{}/{}/{}", repository, id_str, property)))?;
            hal::item(&ctx.links, r.target, row)
        }
    };
    Ok(hal_ok(ctx.media_type, body))
}

/// PUT: the listed resources become the whole association.
pub async fn replace(
    State(state): State<AppState>,
    Path((repository, id_str, property)): Path<(String, String, String)>,
    UriList(uris): UriList,
) -> Result<StatusCode, AppError> {
    let r = resolve(&state, &repository, &id_str, &property)?;
    writable(&r)?;
    let targets = BodyBinder::resolve_uris(&state.model, r.association, &uris)?;
    if !CrudService::replace_association(&state.pool, &state.model, r.entity, r.association, &r.id, targets)
        .await?
    {
        return Err(not_found(&repository, &id_str));
    }
    Ok(StatusCode::NO_CONTENT)
}

/// POST: link more resources to a to-many association.
pub async fn add(
    State(state): State<AppState>,
    Path((repository, id_str, property)): Path<(String, String, String)>,
    UriList(uris): UriList,
) -> Result<StatusCode, AppError> {
    let r = resolve(&state, &repository, &id_str, &property)?;
    writable(&r)?;
    if r.association.cardinality == Cardinality::ToOne {
        return Err(AppError::MethodNotAllowed(format!(
            "{} links to a single resource, use PUT",
            r.association.name
        )));
    }
    let targets = BodyBinder::resolve_uris(&state.model, r.association, &uris)?;
    if !CrudService::add_to_association(&state.pool, &state.model, r.entity, r.association, &r.id, targets)
        .await?
    {
        return Err(not_found(&repository, &id_str));
    }
    Ok(StatusCode::NO_CONTENT)
}

pub async fn clear(
    State(state): State<AppState>,
    Path((repository, id_str, property)): Path<(String, String, String)>,
) -> Result<StatusCode, AppError> {
    let r = resolve(&state, &repository, &id_str, &property)?;
    writable(&r)?;
    if !CrudService::clear_association(&state.pool, r.entity, r.association, &r.id).await? {
        return Err(not_found(&repository, &id_str));
    }
    Ok(StatusCode::NO_CONTENT)
}

pub async fn read_item(
    State(state): State<AppState>,
    ctx: HalContext,
    Path((repository, id_str, property, target_id)): Path<(String, String, String, String)>,
) -> Result<HalResponse, AppError> {
    let r = resolve(&state, &repository, &id_str, &property)?;
    require(r.entity, "read")?;
    let target_key = parse_id(&r.target.pk_type, &target_id)?;
    let row = CrudService::associated_item(
        &state.pool,
        &state.model,
        r.entity,
        r.association,
        &r.id,
        &target_key,
    )
    .await?
    .ok_or_else(|| {
        AppError::NotFound(format!("{}/{}/{}/{}", repository, id_str, property, target_id))
    })?;
    Ok(hal_ok(ctx.media_type, hal::item(&ctx.links, r.target, &row)))
}

pub async fn remove_item(
    State(state): State<AppState>,
    Path((repository, id_str, property, target_id)): Path<(String, String, String, String)>,
) -> Result<StatusCode, AppError> {
    let r = resolve(&state, &repository, &id_str, &property)?;
    writable(&r)?;
    let target_key = parse_id(&r.target.pk_type, &target_id)?;
    let removed = CrudService::remove_from_association(
        &state.pool,
        &state.model,
        r.entity,
        r.association,
        &r.id,
        &target_key,
    )
    .await?;
    if !removed {
        return Err(AppError::NotFound(format!(
            "{}/{}/{}/{}",
            repository, id_str, property, target_id
        )));
    }
    Ok(StatusCode::NO_CONTENT)
}
