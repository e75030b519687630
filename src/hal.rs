//! HAL representations: items, paged collections, association collections and the API root.

use crate::config::{ResolvedEntity, ResolvedModel};
use crate::query::{Pageable, RESERVED_PARAMS};
use crate::service::Page;
use serde_json::{json, Map, Value};
use url::form_urlencoded;

pub const HAL_JSON: &str = "application/hal+json";
pub const JSON: &str = "application/json";

/// HAL unless the client asked for plain JSON only.
pub fn negotiate(accept: Option<&str>) -> &'static str {
    let Some(accept) = accept else { return HAL_JSON };
    let ranges: Vec<&str> = accept
        .split(',')
        .map(|r| r.split(';').next().unwrap_or("").trim())
        .collect();
    if ranges.iter().any(|r| *r == HAL_JSON) {
        HAL_JSON
    } else if ranges.iter().any(|r| *r == JSON) {
        JSON
    } else {
        HAL_JSON
    }
}

/// Absolute hrefs under `<origin><base_path>`.
#[derive(Clone, Debug)]
pub struct LinkBuilder {
    base: String,
}

impl LinkBuilder {
    pub fn new(origin: &str, base_path: &str) -> Self {
        let path = base_path.trim_matches('/');
        let origin = origin.trim_end_matches('/');
        let base = if path.is_empty() {
            origin.to_string()
        } else {
            format!("{}/{}", origin, path)
        };
        LinkBuilder { base }
    }

    pub fn root(&self) -> &str {
        &self.base
    }

    pub fn collection(&self, entity: &ResolvedEntity) -> String {
        format!("{}/{}", self.base, entity.path_segment)
    }

    pub fn item(&self, entity: &ResolvedEntity, id: &str) -> String {
        format!("{}/{}/{}", self.base, entity.path_segment, id)
    }

    pub fn association(&self, entity: &ResolvedEntity, id: &str, association: &str) -> String {
        format!("{}/{}/{}/{}", self.base, entity.path_segment, id, association)
    }
}

fn href(href: impl Into<String>) -> Value {
    json!({ "href": href.into() })
}

/// Primary key of a row as it appears in URIs.
pub fn row_id(entity: &ResolvedEntity, row: &Value) -> Option<String> {
    match row.get(&entity.pk_column)? {
        Value::Number(n) => Some(n.to_string()),
        Value::String(s) => Some(s.clone()),
        _ => None,
    }
}

/// Item representation: exposed columns, derived properties and links to self and associations.
pub fn item(links: &LinkBuilder, entity: &ResolvedEntity, row: &Value) -> Value {
    let mut out = Map::new();
    for column in entity.property_columns() {
        if column.is_pk && !entity.expose_id {
            continue;
        }
        let v = row.get(&column.name).cloned().unwrap_or(Value::Null);
        out.insert(column.name.clone(), v);
    }
    for derived in &entity.derived {
        let v = row.get(&derived.name).cloned().unwrap_or(Value::Null);
        out.insert(derived.name.clone(), v);
    }
    if let Some(id) = row_id(entity, row) {
        let self_href = links.item(entity, &id);
        let mut l = Map::new();
        l.insert("self".into(), href(self_href.clone()));
        l.insert(entity.item_rel.clone(), href(self_href));
        for association in &entity.associations {
            l.insert(
                association.name.clone(),
                href(links.association(entity, &id, &association.name)),
            );
        }
        out.insert("_links".into(), Value::Object(l));
    }
    Value::Object(out)
}

fn embedded(links: &LinkBuilder, entity: &ResolvedEntity, rows: &[Value]) -> Value {
    let items: Vec<Value> = rows.iter().map(|r| item(links, entity, r)).collect();
    let mut e = Map::new();
    e.insert(entity.collection_rel.clone(), Value::Array(items));
    Value::Object(e)
}

/// Paged collection with navigation links. Filter and sort parameters are carried into every page link.
pub fn collection(
    links: &LinkBuilder,
    entity: &ResolvedEntity,
    page: &Page,
    pageable: &Pageable,
    query: &[(String, String)],
) -> Value {
    let total_pages = pageable.total_pages(page.total_elements);
    let carried: Vec<(&str, &str)> = query
        .iter()
        .filter(|(k, _)| k != "page" && k != "size")
        .map(|(k, v)| (k.as_str(), v.as_str()))
        .collect();
    let base = links.collection(entity);
    let page_href = |number: u64| {
        let mut serializer = form_urlencoded::Serializer::new(String::new());
        serializer.extend_pairs(carried.iter().copied());
        serializer.append_pair("page", &number.to_string());
        serializer.append_pair("size", &pageable.size.to_string());
        format!("{}?{}", base, serializer.finish())
    };
    let number = u64::from(pageable.page);

    let mut l = Map::new();
    l.insert("self".into(), href(page_href(number)));
    if total_pages > 1 {
        l.insert("first".into(), href(page_href(0)));
        if number > 0 {
            l.insert("prev".into(), href(page_href(number.min(total_pages) - 1)));
        }
        if number + 1 < total_pages {
            l.insert("next".into(), href(page_href(number + 1)));
        }
        l.insert("last".into(), href(page_href(total_pages - 1)));
    }

    json!({
        "_embedded": embedded(links, entity, &page.rows),
        "_links": l,
        "page": {
            "size": pageable.size,
            "total_elements": page.total_elements,
            "total_pages": total_pages,
            "number": pageable.page,
        }
    })
}

/// Rows behind a to-many association of one item. Not paged.
pub fn association_collection(
    links: &LinkBuilder,
    source: &ResolvedEntity,
    id: &str,
    association: &str,
    target: &ResolvedEntity,
    rows: &[Value],
) -> Value {
    json!({
        "_embedded": embedded(links, target, rows),
        "_links": { "self": href(links.association(source, id, association)) }
    })
}

/// Links to every collection, templated with the paging parameters.
pub fn root(links: &LinkBuilder, model: &ResolvedModel) -> Value {
    let template = format!("{{?{}}}", RESERVED_PARAMS.join(","));
    let mut l = Map::new();
    for entity in &model.entities {
        if !entity.allows("read") {
            continue;
        }
        l.insert(
            entity.collection_rel.clone(),
            json!({
                "href": format!("{}{}", links.collection(entity), template),
                "templated": true
            }),
        );
    }
    json!({ "_links": l })
}
