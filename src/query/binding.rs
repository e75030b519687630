//! Binds query parameters to predicates over the entity and its associations.
//!
//! Parameters that name no bindable property, fall outside the entity's `including` list or carry
//! values that do not parse for the column are ignored rather than rejected.

use crate::case::property_path;
use crate::config::{
    AssociationLink, ColumnKind, DerivedKind, ResolvedEntity, ResolvedModel, StringMatch,
};
use crate::query::RESERVED_PARAMS;
use crate::sql::{parse_bool, PgBindValue};

const BETWEEN_SUFFIX: &str = "_between";

/// One hop from an entity to an associated entity.
#[derive(Clone, Debug, PartialEq)]
pub struct JoinStep {
    pub link: AssociationLink,
    pub source_pk: String,
    pub target_schema: String,
    pub target_table: String,
    pub target_pk: String,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Comparison {
    ContainsIgnoreCase(String),
    Equals(PgBindValue),
    In(Vec<PgBindValue>),
    Between(PgBindValue, PgBindValue),
    IsNull,
    IsNotNull,
}

/// A condition on `column` of the entity reached by following `path` from the queried entity.
#[derive(Clone, Debug, PartialEq)]
pub struct Predicate {
    pub path: Vec<JoinStep>,
    pub column: String,
    pub cast: Option<String>,
    pub comparison: Comparison,
}

/// Group repeated parameters, keeping first-seen order.
fn group_params(params: &[(String, String)]) -> Vec<(&str, Vec<&str>)> {
    let mut grouped: Vec<(&str, Vec<&str>)> = Vec::new();
    for (name, value) in params {
        match grouped.iter_mut().find(|(n, _)| *n == name.as_str()) {
            Some((_, values)) => values.push(value.as_str()),
            None => grouped.push((name.as_str(), vec![value.as_str()])),
        }
    }
    grouped
}

pub fn bind_predicates(
    model: &ResolvedModel,
    entity: &ResolvedEntity,
    params: &[(String, String)],
) -> Vec<Predicate> {
    if !entity.filters.enabled {
        return Vec::new();
    }
    group_params(params)
        .into_iter()
        .filter(|(name, _)| !RESERVED_PARAMS.contains(name))
        .filter_map(|(name, values)| {
            let predicate = bind_one(model, entity, name, &values);
            if predicate.is_none() {
                tracing::debug!(entity = %entity.path_segment, param = %name, "ignoring unbound query parameter");
            }
            predicate
        })
        .collect()
}

fn bind_one(
    model: &ResolvedModel,
    entity: &ResolvedEntity,
    name: &str,
    values: &[&str],
) -> Option<Predicate> {
    let first = *values.first()?;
    let (base, between_alias) = match name.strip_suffix(BETWEEN_SUFFIX) {
        Some(base) if !base.is_empty() => (base, true),
        _ => (name, false),
    };
    let path = property_path(base)?;
    let joined = path.join(".");
    if !entity.filters.allows(&joined) {
        return None;
    }

    if let [property] = path.as_slice() {
        if let Some(derived) = entity.derived_by_filter(property) {
            if between_alias {
                return None;
            }
            let wanted = parse_bool(first)?;
            let null = (derived.kind == DerivedKind::IsNull) == wanted;
            return Some(Predicate {
                path: Vec::new(),
                column: derived.column.clone(),
                cast: None,
                comparison: if null { Comparison::IsNull } else { Comparison::IsNotNull },
            });
        }
    }

    let (last, hops) = path.split_last()?;
    let mut current = entity;
    let mut steps = Vec::with_capacity(hops.len());
    for hop in hops {
        let association = current.association(hop)?;
        let target = model.entity_by_path(&association.target_path_segment)?;
        steps.push(JoinStep {
            link: association.link.clone(),
            source_pk: current.pk_column.clone(),
            target_schema: target.schema_name.clone(),
            target_table: target.table_name.clone(),
            target_pk: target.pk_column.clone(),
        });
        current = target;
    }
    let column = current.column(last).filter(|c| !c.is_foreign_key)?;

    let is_range = steps.is_empty() && entity.filters.range.contains(last.as_str());
    if between_alias && !is_range {
        return None;
    }

    let comparison = if is_range {
        match values {
            [low, high] => Comparison::Between(
                PgBindValue::parse_for(column.kind, low)?,
                PgBindValue::parse_for(column.kind, high)?,
            ),
            _ => Comparison::Equals(PgBindValue::parse_for(column.kind, first)?),
        }
    } else if column.kind == ColumnKind::Text
        && entity.filters.string_match == StringMatch::ContainsIgnoreCase
    {
        Comparison::ContainsIgnoreCase(first.to_string())
    } else {
        let mut parsed: Vec<PgBindValue> = values
            .iter()
            .filter_map(|v| PgBindValue::parse_for(column.kind, v))
            .collect();
        match parsed.len() {
            0 => return None,
            1 => Comparison::Equals(parsed.remove(0)),
            _ => Comparison::In(parsed),
        }
    };

    Some(Predicate {
        path: steps,
        column: column.name.clone(),
        cast: column.pg_type.clone(),
        comparison,
    })
}
