//! Shared application state for all routes.

use crate::config::{ResolvedEntity, ResolvedModel};
use crate::error::AppError;
use sqlx::PgPool;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub model: Arc<ResolvedModel>,
    /// Prefix the API is mounted under, used to build absolute links.
    pub api_base_path: String,
}

impl AppState {
    pub fn new(pool: PgPool, model: ResolvedModel, api_base_path: impl Into<String>) -> Self {
        AppState {
            pool,
            model: Arc::new(model),
            api_base_path: api_base_path.into(),
        }
    }

    /// Entity exposed under `path_segment`, 404 otherwise.
    pub fn entity(&self, path_segment: &str) -> Result<&ResolvedEntity, AppError> {
        self.model
            .entity_by_path(path_segment)
            .ok_or_else(|| AppError::NotFound(format!("no resource at /{}", path_segment)))
    }
}
