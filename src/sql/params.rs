//! Values bound to generated statements, typed from the catalog column kind.

use crate::config::{ColumnKind, PkType};
use chrono::NaiveDate;
use serde_json::Value;
use sqlx::encode::{Encode, IsNull};
use sqlx::postgres::{PgTypeInfo, Postgres};
use sqlx::Database;

pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// A value that can be bound to a PostgreSQL query.
#[derive(Clone, Debug, PartialEq)]
pub enum PgBindValue {
    /// Typed null; the kind fixes the declared parameter type so cached statements stay valid.
    Null(ColumnKind),
    Bool(bool),
    I64(i64),
    F64(f64),
    String(String),
    Date(NaiveDate),
    Json(Value),
}

impl PgBindValue {
    /// Untyped conversion, used for columns whose kind the catalog does not know.
    pub fn from_json(v: &Value) -> Self {
        match v {
            Value::Null => PgBindValue::Null(ColumnKind::Other),
            Value::Bool(b) => PgBindValue::Bool(*b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => PgBindValue::I64(i),
                None => PgBindValue::F64(n.as_f64().unwrap_or_default()),
            },
            Value::String(s) => PgBindValue::String(s.clone()),
            Value::Array(_) | Value::Object(_) => PgBindValue::Json(v.clone()),
        }
    }

    /// Coerce a JSON body value for a column of the given kind. None when the value does not fit.
    pub fn from_json_for(kind: ColumnKind, v: &Value) -> Option<Self> {
        if v.is_null() {
            return Some(PgBindValue::Null(kind));
        }
        match kind {
            ColumnKind::Text => v.as_str().map(|s| PgBindValue::String(s.to_string())),
            ColumnKind::Date => v.as_str().and_then(parse_date).map(PgBindValue::Date),
            ColumnKind::Integer => match v {
                Value::Number(n) => n.as_i64().map(PgBindValue::I64),
                Value::String(s) => s.trim().parse().ok().map(PgBindValue::I64),
                _ => None,
            },
            ColumnKind::Boolean => v.as_bool().map(PgBindValue::Bool),
            ColumnKind::Other => Some(Self::from_json(v)),
        }
    }

    /// Parse a raw query parameter for a column of the given kind.
    pub fn parse_for(kind: ColumnKind, raw: &str) -> Option<Self> {
        let raw = raw.trim();
        match kind {
            ColumnKind::Text | ColumnKind::Other => Some(PgBindValue::String(raw.to_string())),
            ColumnKind::Date => parse_date(raw).map(PgBindValue::Date),
            ColumnKind::Integer => raw.parse().ok().map(PgBindValue::I64),
            ColumnKind::Boolean => parse_bool(raw).map(PgBindValue::Bool),
        }
    }

    /// Parse a path or URI id for the given primary key type.
    pub fn parse_id(pk_type: &PkType, raw: &str) -> Option<Self> {
        match pk_type {
            PkType::BigInt | PkType::Int => raw.parse().ok().map(PgBindValue::I64),
            PkType::Text if raw.is_empty() => None,
            PkType::Text => Some(PgBindValue::String(raw.to_string())),
        }
    }

    fn type_name(&self) -> &'static str {
        match self {
            PgBindValue::Null(kind) => match kind {
                ColumnKind::Date => "DATE",
                ColumnKind::Integer => "INT8",
                ColumnKind::Boolean => "BOOL",
                ColumnKind::Text | ColumnKind::Other => "TEXT",
            },
            PgBindValue::String(_) => "TEXT",
            PgBindValue::Bool(_) => "BOOL",
            PgBindValue::I64(_) => "INT8",
            PgBindValue::F64(_) => "FLOAT8",
            PgBindValue::Date(_) => "DATE",
            PgBindValue::Json(_) => "JSONB",
        }
    }
}

pub fn parse_date(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s, DATE_FORMAT).ok()
}

pub fn parse_bool(s: &str) -> Option<bool> {
    if s.eq_ignore_ascii_case("true") {
        Some(true)
    } else if s.eq_ignore_ascii_case("false") {
        Some(false)
    } else {
        None
    }
}

impl<'q> Encode<'q, Postgres> for PgBindValue {
    fn encode_by_ref(
        &self,
        buf: &mut <Postgres as Database>::ArgumentBuffer<'q>,
    ) -> Result<IsNull, Box<dyn std::error::Error + Send + Sync>> {
        Ok(match self {
            PgBindValue::Null(_) => IsNull::Yes,
            PgBindValue::Bool(b) => <bool as Encode<Postgres>>::encode_by_ref(b, buf)?,
            PgBindValue::I64(n) => <i64 as Encode<Postgres>>::encode_by_ref(n, buf)?,
            PgBindValue::F64(n) => <f64 as Encode<Postgres>>::encode_by_ref(n, buf)?,
            PgBindValue::String(s) => <String as Encode<Postgres>>::encode_by_ref(s, buf)?,
            PgBindValue::Date(d) => <NaiveDate as Encode<Postgres>>::encode_by_ref(d, buf)?,
            PgBindValue::Json(v) => <serde_json::Value as Encode<Postgres>>::encode_by_ref(v, buf)?,
        })
    }

    fn produces(&self) -> Option<PgTypeInfo> {
        Some(PgTypeInfo::with_name(self.type_name()))
    }
}

impl sqlx::Type<Postgres> for PgBindValue {
    fn type_info() -> PgTypeInfo {
        PgTypeInfo::with_name("TEXT")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn coerces_body_values_by_column_kind() {
        assert_eq!(
            PgBindValue::from_json_for(ColumnKind::Date, &json!("1930-08-25")),
            Some(PgBindValue::Date(NaiveDate::from_ymd_opt(1930, 8, 25).unwrap()))
        );
        assert_eq!(PgBindValue::from_json_for(ColumnKind::Date, &json!("25/08/1930")), None);
        assert_eq!(PgBindValue::from_json_for(ColumnKind::Text, &json!(12)), None);
        assert_eq!(
            PgBindValue::from_json_for(ColumnKind::Integer, &json!("12")),
            Some(PgBindValue::I64(12))
        );
        assert_eq!(
            PgBindValue::from_json_for(ColumnKind::Date, &Value::Null),
            Some(PgBindValue::Null(ColumnKind::Date))
        );
    }

    #[test]
    fn nulls_declare_the_column_type() {
        let date = PgBindValue::Date(NaiveDate::from_ymd_opt(1981, 1, 16).unwrap());
        let null_date = PgBindValue::from_json_for(ColumnKind::Date, &Value::Null).unwrap();
        assert_eq!(null_date.produces(), date.produces());
        let null_int = PgBindValue::Null(ColumnKind::Integer);
        assert_eq!(null_int.produces(), PgBindValue::I64(3).produces());
        assert_ne!(null_date.produces(), PgBindValue::Null(ColumnKind::Text).produces());
    }

    #[test]
    fn parses_query_values() {
        assert_eq!(PgBindValue::parse_for(ColumnKind::Boolean, "TRUE"), Some(PgBindValue::Bool(true)));
        assert_eq!(PgBindValue::parse_for(ColumnKind::Boolean, "yes"), None);
        assert_eq!(PgBindValue::parse_for(ColumnKind::Integer, "x1"), None);
        assert_eq!(
            PgBindValue::parse_for(ColumnKind::Text, "Sean"),
            Some(PgBindValue::String("Sean".into()))
        );
    }

    #[test]
    fn parses_ids_by_primary_key_type() {
        assert_eq!(PgBindValue::parse_id(&PkType::BigInt, "42"), Some(PgBindValue::I64(42)));
        assert_eq!(PgBindValue::parse_id(&PkType::BigInt, "abc"), None);
        assert_eq!(PgBindValue::parse_id(&PkType::Text, ""), None);
    }
}
