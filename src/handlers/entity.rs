//! Collection and item resources: list, create, read, replace, patch, delete.

use super::{parse_id, require};
use crate::error::AppError;
use crate::extractors::{HalContext, JsonBody};
use crate::hal;
use crate::query::{bind_predicates, Pageable};
use crate::response::{hal_created, hal_ok, HalResponse};
use crate::service::{BodyBinder, CrudService, RequestValidator};
use crate::state::AppState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
};

pub async fn list(
    State(state): State<AppState>,
    ctx: HalContext,
    Path(repository): Path<String>,
    Query(params): Query<Vec<(String, String)>>,
) -> Result<HalResponse, AppError> {
    let entity = state.entity(&repository)?;
    require(entity, "read")?;
    let predicates = bind_predicates(&state.model, entity, &params);
    let pageable = Pageable::from_params(&state.model, entity, &params);
    let page = CrudService::page(&state.pool, entity, &predicates, &pageable).await?;
    Ok(hal_ok(
        ctx.media_type,
        hal::collection(&ctx.links, entity, &page, &pageable, &params),
    ))
}

pub async fn create(
    State(state): State<AppState>,
    ctx: HalContext,
    Path(repository): Path<String>,
    JsonBody(body): JsonBody,
) -> Result<HalResponse, AppError> {
    let entity = state.entity(&repository)?;
    require(entity, "create")?;
    RequestValidator::validate(&body, &entity.validation)?;
    let bound = BodyBinder::bind(&state.model, entity, &body)?;
    let row = CrudService::create(&state.pool, &state.model, entity, bound).await?;
    let id = hal::row_id(entity, &row).ok_or(AppError::Db(sqlx::Error::RowNotFound))?;
    Ok(hal_created(
        ctx.media_type,
        ctx.links.item(entity, &id),
        hal::item(&ctx.links, entity, &row),
    ))
}

pub async fn read(
    State(state): State<AppState>,
    ctx: HalContext,
    Path((repository, id_str)): Path<(String, String)>,
) -> Result<HalResponse, AppError> {
    let entity = state.entity(&repository)?;
    require(entity, "read")?;
    let id = parse_id(&entity.pk_type, &id_str)?;
    let row = CrudService::read(&state.pool, entity, &id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("{}/{}", repository, id_str)))?;
    Ok(hal_ok(ctx.media_type, hal::item(&ctx.links, entity, &row)))
}

/// PUT: full replacement of the item's properties.
pub async fn replace(
    State(state): State<AppState>,
    ctx: HalContext,
    Path((repository, id_str)): Path<(String, String)>,
    JsonBody(body): JsonBody,
) -> Result<HalResponse, AppError> {
    let entity = state.entity(&repository)?;
    require(entity, "update")?;
    let id = parse_id(&entity.pk_type, &id_str)?;
    RequestValidator::validate(&body, &entity.validation)?;
    let bound = BodyBinder::bind(&state.model, entity, &body)?;
    let row = CrudService::replace(&state.pool, &state.model, entity, &id, bound)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("{}/{}", repository, id_str)))?;
    Ok(hal_ok(ctx.media_type, hal::item(&ctx.links, entity, &row)))
}

pub async fn patch(
    State(state): State<AppState>,
    ctx: HalContext,
    Path((repository, id_str)): Path<(String, String)>,
    JsonBody(body): JsonBody,
) -> Result<HalResponse, AppError> {
    let entity = state.entity(&repository)?;
    require(entity, "update")?;
    let id = parse_id(&entity.pk_type, &id_str)?;
    RequestValidator::validate_partial(&body, &entity.validation)?;
    let bound = BodyBinder::bind(&state.model, entity, &body)?;
    let row = CrudService::patch(&state.pool, &state.model, entity, &id, bound)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("{}/{}", repository, id_str)))?;
    Ok(hal_ok(ctx.media_type, hal::item(&ctx.links, entity, &row)))
}

pub async fn delete(
    State(state): State<AppState>,
    Path((repository, id_str)): Path<(String, String)>,
) -> Result<StatusCode, AppError> {
    let entity = state.entity(&repository)?;
    require(entity, "delete")?;
    let id = parse_id(&entity.pk_type, &id_str)?;
    if !CrudService::delete(&state.pool, entity, &id).await? {
        return Err(AppError::NotFound(format!("{}/{}", repository, id_str)));
    }
    Ok(StatusCode::NO_CONTENT)
}
