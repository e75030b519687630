//! HTTP handlers for the API root, entity CRUD and association resources.

pub mod association;
pub mod entity;
pub mod root;

use crate::config::{PkType, ResolvedEntity};
use crate::error::AppError;
use crate::sql::PgBindValue;

/// 405 unless `operation` is enabled for the entity.
fn require(entity: &ResolvedEntity, operation: &str) -> Result<(), AppError> {
    if entity.allows(operation) {
        Ok(())
    } else {
        Err(AppError::MethodNotAllowed(format!(
            "{} is not enabled on {}",
            operation, entity.path_segment
        )))
    }
}

fn parse_id(pk_type: &PkType, raw: &str) -> Result<PgBindValue, AppError> {
    PgBindValue::parse_id(pk_type, raw).ok_or_else(|| AppError::BadRequest(format!("invalid id: {}", raw)))
}
