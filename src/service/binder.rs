//! Splits a JSON body into column values and association references.

use crate::config::{AssociationSpec, Cardinality, ResolvedEntity, ResolvedModel};
use crate::error::{AppError, ConfigError};
use crate::sql::PgBindValue;
use serde_json::{Map, Value};
use url::Url;

/// New targets of one association, as primary keys of the target entity.
#[derive(Clone, Debug, PartialEq)]
pub struct BoundLink {
    pub association: String,
    pub targets: Vec<PgBindValue>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct BoundBody {
    pub columns: Vec<(String, PgBindValue)>,
    pub links: Vec<BoundLink>,
}

/// `(path_segment, id)` from the last two path segments of an absolute or relative resource URI.
pub fn parse_resource_uri(raw: &str) -> Option<(String, String)> {
    let raw = raw.trim();
    let url = match Url::parse(raw) {
        Ok(url) => url,
        Err(url::ParseError::RelativeUrlWithoutBase) => {
            Url::parse("http://localhost/").ok()?.join(raw).ok()?
        }
        Err(_) => return None,
    };
    let segments: Vec<&str> = url.path_segments()?.filter(|s| !s.is_empty()).collect();
    match segments.as_slice() {
        [.., segment, id] => Some((segment.to_string(), id.to_string())),
        _ => None,
    }
}

pub struct BodyBinder;

impl BodyBinder {
    /// Columns and associations present in `body`. Unknown properties, the id and derived
    /// properties are ignored.
    pub fn bind(
        model: &ResolvedModel,
        entity: &ResolvedEntity,
        body: &Map<String, Value>,
    ) -> Result<BoundBody, AppError> {
        let mut bound = BoundBody::default();
        for column in entity.writable_columns() {
            let Some(v) = body.get(&column.name) else { continue };
            let value = PgBindValue::from_json_for(column.kind, v).ok_or_else(|| {
                AppError::BadRequest(format!("{} has an invalid value", column.name))
            })?;
            bound.columns.push((column.name.clone(), value));
        }
        for association in &entity.associations {
            let Some(v) = body.get(&association.name) else { continue };
            if !association.writable {
                return Err(AppError::BadRequest(format!(
                    "{} is read-only on {}",
                    association.name, entity.path_segment
                )));
            }
            let uris: Vec<&str> = match (association.cardinality, v) {
                (_, Value::Null) => Vec::new(),
                (_, Value::String(s)) => vec![s.as_str()],
                (Cardinality::ToMany, Value::Array(items)) => items
                    .iter()
                    .map(|item| {
                        item.as_str().ok_or_else(|| {
                            AppError::BadRequest(format!("{} must hold resource URIs", association.name))
                        })
                    })
                    .collect::<Result<_, _>>()?,
                _ => {
                    return Err(AppError::BadRequest(format!(
                        "{} must be a resource URI",
                        association.name
                    )))
                }
            };
            bound.links.push(BoundLink {
                association: association.name.clone(),
                targets: Self::resolve_uris(model, association, &uris)?,
            });
        }
        Ok(bound)
    }

    /// Resolve URIs to primary keys of the association's target entity.
    pub fn resolve_uris<S: AsRef<str>>(
        model: &ResolvedModel,
        association: &AssociationSpec,
        uris: &[S],
    ) -> Result<Vec<PgBindValue>, AppError> {
        let target = model
            .entity_by_path(&association.target_path_segment)
            .ok_or_else(|| ConfigError::MissingReference {
                kind: "api entity",
                id: association.target_path_segment.clone(),
            })?;
        uris.iter()
            .map(|uri| {
                let uri = uri.as_ref();
                let (segment, id) = parse_resource_uri(uri)
                    .ok_or_else(|| AppError::BadRequest(format!("not a resource URI: {}", uri)))?;
                if segment != target.path_segment {
                    return Err(AppError::BadRequest(format!(
                        "{} must link to {}, got {}",
                        association.name, target.path_segment, uri
                    )));
                }
                PgBindValue::parse_id(&target.pk_type, &id)
                    .ok_or_else(|| AppError::BadRequest(format!("invalid id in {}", uri)))
            })
            .collect()
    }
}
