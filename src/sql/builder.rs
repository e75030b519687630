//! Builds parameterized SELECT, INSERT, UPDATE, DELETE from the resolved entity.

use crate::config::{AssociationLink, DerivedKind, PkType, ResolvedEntity};
use crate::query::{Comparison, Pageable, Predicate, SortOrder};
use crate::sql::PgBindValue;

const MAIN_ALIAS: &str = "main";

/// Quote identifier for PostgreSQL (safe: only from config).
fn quoted(s: &str) -> String {
    format!("\"{}\"", s.replace('"', "\"\""))
}

/// Full qualified table name.
fn qualified_table(schema: &str, table: &str) -> String {
    format!("{}.{}", quoted(schema), quoted(table))
}

fn entity_table(entity: &ResolvedEntity) -> String {
    qualified_table(&entity.schema_name, &entity.table_name)
}

fn pk_cast(entity: &ResolvedEntity) -> &'static str {
    match entity.pk_type {
        PkType::BigInt => "int8",
        PkType::Int => "int4",
        PkType::Text => "text",
    }
}

#[derive(Debug, Default)]
pub struct QueryBuf {
    pub sql: String,
    pub params: Vec<PgBindValue>,
}

impl QueryBuf {
    fn new() -> Self {
        QueryBuf::default()
    }

    fn push_param(&mut self, v: PgBindValue) -> u32 {
        let n = self.params.len() as u32 + 1;
        self.params.push(v);
        n
    }

    /// Push a parameter and return its placeholder, cast when the type is known.
    fn placeholder(&mut self, v: PgBindValue, cast: Option<&str>) -> String {
        let n = self.push_param(v);
        match cast {
            Some(t) => format!("${}::{}", n, t),
            None => format!("${}", n),
        }
    }
}

/// A join table seen from one side of the association.
#[derive(Clone, Copy, Debug)]
pub struct LinkTable<'a> {
    pub schema: &'a str,
    pub table: &'a str,
    pub our_column: &'a str,
    pub their_column: &'a str,
}

impl<'a> LinkTable<'a> {
    pub fn of(link: &'a AssociationLink) -> Option<Self> {
        match link {
            AssociationLink::JoinTable {
                schema,
                table,
                our_column,
                their_column,
            } => Some(LinkTable {
                schema,
                table,
                our_column,
                their_column,
            }),
            _ => None,
        }
    }

    fn qualified(&self) -> String {
        qualified_table(self.schema, self.table)
    }
}

/// SELECT list over the main alias: every column plus derived booleans.
fn select_column_list(entity: &ResolvedEntity) -> String {
    let mut parts: Vec<String> = entity
        .columns
        .iter()
        .map(|c| format!("{}.{}", MAIN_ALIAS, quoted(&c.name)))
        .collect();
    for d in &entity.derived {
        let test = match d.kind {
            DerivedKind::IsNull => "IS NULL",
            DerivedKind::IsNotNull => "IS NOT NULL",
        };
        parts.push(format!(
            "({}.{} {}) AS {}",
            MAIN_ALIAS,
            quoted(&d.column),
            test,
            quoted(&d.name)
        ));
    }
    parts.join(", ")
}

/// `%value%` with LIKE wildcards escaped (escape character is the backslash).
pub fn like_pattern(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len() + 2);
    out.push('%');
    for c in raw.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('%');
    out
}

fn comparison_sql(q: &mut QueryBuf, column: &str, cast: Option<&str>, comparison: &Comparison) -> String {
    match comparison {
        Comparison::ContainsIgnoreCase(raw) => {
            let ph = q.placeholder(PgBindValue::String(like_pattern(raw)), Some("text"));
            format!("{} ILIKE {} ESCAPE '\\'", column, ph)
        }
        Comparison::Equals(v) => format!("{} = {}", column, q.placeholder(v.clone(), cast)),
        Comparison::In(values) => {
            let phs: Vec<String> = values.iter().map(|v| q.placeholder(v.clone(), cast)).collect();
            format!("{} IN ({})", column, phs.join(", "))
        }
        Comparison::Between(low, high) => {
            let low = q.placeholder(low.clone(), cast);
            let high = q.placeholder(high.clone(), cast);
            format!("{} BETWEEN {} AND {}", column, low, high)
        }
        Comparison::IsNull => format!("{} IS NULL", column),
        Comparison::IsNotNull => format!("{} IS NOT NULL", column),
    }
}

/// Predicate as SQL over the main alias. Association paths become one EXISTS subquery.
fn predicate_sql(q: &mut QueryBuf, predicate: &Predicate) -> String {
    if predicate.path.is_empty() {
        let column = format!("{}.{}", MAIN_ALIAS, quoted(&predicate.column));
        return comparison_sql(q, &column, predicate.cast.as_deref(), &predicate.comparison);
    }
    let mut from = Vec::new();
    let mut conditions = Vec::new();
    let mut source = MAIN_ALIAS.to_string();
    for (i, step) in predicate.path.iter().enumerate() {
        let target = format!("t{}", i + 1);
        from.push(format!(
            "{} {}",
            qualified_table(&step.target_schema, &step.target_table),
            target
        ));
        match &step.link {
            AssociationLink::ForeignKey { column } => conditions.push(format!(
                "{}.{} = {}.{}",
                target,
                quoted(&step.target_pk),
                source,
                quoted(column)
            )),
            AssociationLink::InverseForeignKey { column } => conditions.push(format!(
                "{}.{} = {}.{}",
                target,
                quoted(column),
                source,
                quoted(&step.source_pk)
            )),
            AssociationLink::JoinTable {
                schema,
                table,
                our_column,
                their_column,
            } => {
                let link = format!("j{}", i + 1);
                from.push(format!("{} {}", qualified_table(schema, table), link));
                conditions.push(format!(
                    "{}.{} = {}.{}",
                    link,
                    quoted(our_column),
                    source,
                    quoted(&step.source_pk)
                ));
                conditions.push(format!(
                    "{}.{} = {}.{}",
                    target,
                    quoted(&step.target_pk),
                    link,
                    quoted(their_column)
                ));
            }
        }
        source = target;
    }
    let column = format!("{}.{}", source, quoted(&predicate.column));
    conditions.push(comparison_sql(q, &column, predicate.cast.as_deref(), &predicate.comparison));
    format!(
        "EXISTS (SELECT 1 FROM {} WHERE {})",
        from.join(", "),
        conditions.join(" AND ")
    )
}

fn where_clause(q: &mut QueryBuf, predicates: &[Predicate]) -> String {
    if predicates.is_empty() {
        return String::new();
    }
    let parts: Vec<String> = predicates.iter().map(|p| predicate_sql(q, p)).collect();
    format!(" WHERE {}", parts.join(" AND "))
}

/// ORDER BY requested sorts, always ending with the primary key.
fn order_clause(entity: &ResolvedEntity, pageable: &Pageable) -> String {
    let is_pk = |s: &&SortOrder| s.via.is_none() && s.column == entity.pk_column;
    let mut parts: Vec<String> = pageable
        .sort
        .iter()
        .filter(|s| !is_pk(s))
        .map(|s| format!("{} {}", sort_expression(s), direction(s.descending)))
        .collect();
    let pk_desc = pageable.sort.iter().find(is_pk).map(|s| s.descending).unwrap_or(false);
    parts.push(format!(
        "{}.{} {}",
        MAIN_ALIAS,
        quoted(&entity.pk_column),
        direction(pk_desc)
    ));
    format!(" ORDER BY {}", parts.join(", "))
}

fn direction(descending: bool) -> &'static str {
    if descending {
        "DESC"
    } else {
        "ASC"
    }
}

/// Column of the main row, or a scalar subquery over the to-one target.
fn sort_expression(order: &SortOrder) -> String {
    match &order.via {
        None => format!("{}.{}", MAIN_ALIAS, quoted(&order.column)),
        Some(join) => format!(
            "(SELECT s.{} FROM {} s WHERE s.{} = {}.{})",
            quoted(&order.column),
            qualified_table(&join.schema_name, &join.table_name),
            quoted(&join.pk_column),
            MAIN_ALIAS,
            quoted(&join.foreign_key)
        ),
    }
}

/// One page of rows matching all predicates.
pub fn select_page(entity: &ResolvedEntity, predicates: &[Predicate], pageable: &Pageable) -> QueryBuf {
    let mut q = QueryBuf::new();
    let where_sql = where_clause(&mut q, predicates);
    q.sql = format!(
        "SELECT {} FROM {} {}{}{} LIMIT {} OFFSET {}",
        select_column_list(entity),
        entity_table(entity),
        MAIN_ALIAS,
        where_sql,
        order_clause(entity, pageable),
        pageable.size,
        pageable.offset()
    );
    q
}

/// COUNT(*) of rows matching all predicates.
pub fn count(entity: &ResolvedEntity, predicates: &[Predicate]) -> QueryBuf {
    let mut q = QueryBuf::new();
    let where_sql = where_clause(&mut q, predicates);
    q.sql = format!(
        "SELECT COUNT(*) FROM {} {}{}",
        entity_table(entity),
        MAIN_ALIAS,
        where_sql
    );
    q
}

/// SELECT by primary key.
pub fn select_by_id(entity: &ResolvedEntity, id: &PgBindValue) -> QueryBuf {
    let mut q = QueryBuf::new();
    let ph = q.placeholder(id.clone(), Some(pk_cast(entity)));
    q.sql = format!(
        "SELECT {} FROM {} {} WHERE {}.{} = {}",
        select_column_list(entity),
        entity_table(entity),
        MAIN_ALIAS,
        MAIN_ALIAS,
        quoted(&entity.pk_column),
        ph
    );
    q
}

pub fn exists_by_id(entity: &ResolvedEntity, id: &PgBindValue) -> QueryBuf {
    let mut q = QueryBuf::new();
    let ph = q.placeholder(id.clone(), Some(pk_cast(entity)));
    q.sql = format!(
        "SELECT EXISTS (SELECT 1 FROM {} WHERE {} = {})",
        entity_table(entity),
        quoted(&entity.pk_column),
        ph
    );
    q
}

fn column_cast<'a>(entity: &'a ResolvedEntity, name: &str) -> Option<&'a str> {
    entity.column(name).and_then(|c| c.pg_type.as_deref())
}

/// INSERT the given columns, RETURNING the generated primary key.
pub fn insert(entity: &ResolvedEntity, values: &[(String, PgBindValue)]) -> QueryBuf {
    let mut q = QueryBuf::new();
    let table = entity_table(entity);
    let pk = quoted(&entity.pk_column);
    if values.is_empty() {
        q.sql = format!("INSERT INTO {} DEFAULT VALUES RETURNING {}", table, pk);
        return q;
    }
    let mut cols = Vec::with_capacity(values.len());
    let mut placeholders = Vec::with_capacity(values.len());
    for (name, v) in values {
        cols.push(quoted(name));
        placeholders.push(q.placeholder(v.clone(), column_cast(entity, name)));
    }
    q.sql = format!(
        "INSERT INTO {} ({}) VALUES ({}) RETURNING {}",
        table,
        cols.join(", "),
        placeholders.join(", "),
        pk
    );
    q
}

/// UPDATE by id: SET only the given columns. RETURNING the primary key so a missing row is visible.
pub fn update(entity: &ResolvedEntity, id: &PgBindValue, values: &[(String, PgBindValue)]) -> QueryBuf {
    let mut q = QueryBuf::new();
    let table = entity_table(entity);
    let pk = quoted(&entity.pk_column);
    if values.is_empty() {
        let ph = q.placeholder(id.clone(), Some(pk_cast(entity)));
        q.sql = format!("SELECT {} FROM {} WHERE {} = {}", pk, table, pk, ph);
        return q;
    }
    let sets: Vec<String> = values
        .iter()
        .map(|(name, v)| {
            let rhs = q.placeholder(v.clone(), column_cast(entity, name));
            format!("{} = {}", quoted(name), rhs)
        })
        .collect();
    let id_ph = q.placeholder(id.clone(), Some(pk_cast(entity)));
    q.sql = format!(
        "UPDATE {} SET {} WHERE {} = {} RETURNING {}",
        table,
        sets.join(", "),
        pk,
        id_ph,
        pk
    );
    q
}

/// DELETE by id.
pub fn delete(entity: &ResolvedEntity, id: &PgBindValue) -> QueryBuf {
    let mut q = QueryBuf::new();
    let pk = quoted(&entity.pk_column);
    let ph = q.placeholder(id.clone(), Some(pk_cast(entity)));
    q.sql = format!(
        "DELETE FROM {} WHERE {} = {} RETURNING {}",
        entity_table(entity),
        pk,
        ph,
        pk
    );
    q
}

fn associated(
    source: &ResolvedEntity,
    link: &AssociationLink,
    target: &ResolvedEntity,
    source_id: &PgBindValue,
    target_id: Option<&PgBindValue>,
) -> QueryBuf {
    let mut q = QueryBuf::new();
    let source_ph = q.placeholder(source_id.clone(), Some(pk_cast(source)));
    let target_pk = format!("{}.{}", MAIN_ALIAS, quoted(&target.pk_column));
    let condition = match link {
        AssociationLink::ForeignKey { column } => format!(
            "{} = (SELECT s.{} FROM {} s WHERE s.{} = {})",
            target_pk,
            quoted(column),
            entity_table(source),
            quoted(&source.pk_column),
            source_ph
        ),
        AssociationLink::InverseForeignKey { column } => {
            format!("{}.{} = {}", MAIN_ALIAS, quoted(column), source_ph)
        }
        AssociationLink::JoinTable {
            schema,
            table,
            our_column,
            their_column,
        } => format!(
            "EXISTS (SELECT 1 FROM {} l WHERE l.{} = {} AND l.{} = {})",
            qualified_table(schema, table),
            quoted(their_column),
            target_pk,
            quoted(our_column),
            source_ph
        ),
    };
    let item_condition = match target_id {
        Some(id) => format!(" AND {} = {}", target_pk, q.placeholder(id.clone(), Some(pk_cast(target)))),
        None => String::new(),
    };
    q.sql = format!(
        "SELECT {} FROM {} {} WHERE {}{} ORDER BY {}",
        select_column_list(target),
        entity_table(target),
        MAIN_ALIAS,
        condition,
        item_condition,
        target_pk
    );
    q
}

/// Rows of `target` linked to the source row through `link`.
pub fn select_associated(
    source: &ResolvedEntity,
    link: &AssociationLink,
    target: &ResolvedEntity,
    source_id: &PgBindValue,
) -> QueryBuf {
    associated(source, link, target, source_id, None)
}

/// One linked row of `target`, if it is linked to the source row.
pub fn select_associated_item(
    source: &ResolvedEntity,
    link: &AssociationLink,
    target: &ResolvedEntity,
    source_id: &PgBindValue,
    target_id: &PgBindValue,
) -> QueryBuf {
    associated(source, link, target, source_id, Some(target_id))
}

/// Point (or clear, with Null) a foreign key column of one row.
pub fn set_foreign_key(
    entity: &ResolvedEntity,
    column: &str,
    id: &PgBindValue,
    value: &PgBindValue,
) -> QueryBuf {
    update(entity, id, &[(column.to_string(), value.clone())])
}

/// Link one row to many. Existing links are kept.
pub fn insert_links(link: LinkTable<'_>, our_id: &PgBindValue, their_ids: &[PgBindValue]) -> QueryBuf {
    let mut q = QueryBuf::new();
    let our_ph = q.placeholder(our_id.clone(), None);
    let rows: Vec<String> = their_ids
        .iter()
        .map(|id| format!("({}, {})", our_ph, q.placeholder(id.clone(), None)))
        .collect();
    q.sql = format!(
        "INSERT INTO {} ({}, {}) VALUES {} ON CONFLICT DO NOTHING",
        link.qualified(),
        quoted(link.our_column),
        quoted(link.their_column),
        rows.join(", ")
    );
    q
}

/// Remove every link of one row.
pub fn delete_links(link: LinkTable<'_>, our_id: &PgBindValue) -> QueryBuf {
    let mut q = QueryBuf::new();
    let ph = q.placeholder(our_id.clone(), None);
    q.sql = format!(
        "DELETE FROM {} WHERE {} = {}",
        link.qualified(),
        quoted(link.our_column),
        ph
    );
    q
}

/// Remove one link; RETURNING tells whether it existed.
pub fn delete_link(link: LinkTable<'_>, our_id: &PgBindValue, their_id: &PgBindValue) -> QueryBuf {
    let mut q = QueryBuf::new();
    let our_ph = q.placeholder(our_id.clone(), None);
    let their_ph = q.placeholder(their_id.clone(), None);
    q.sql = format!(
        "DELETE FROM {} WHERE {} = {} AND {} = {} RETURNING {}",
        link.qualified(),
        quoted(link.our_column),
        our_ph,
        quoted(link.their_column),
        their_ph,
        quoted(link.our_column)
    );
    q
}
