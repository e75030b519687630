//! Request validation from catalog rules.

use crate::config::ValidationRule;
use crate::error::AppError;
use crate::sql::parse_date;
use regex::Regex;
use serde_json::{Map, Value};
use std::collections::HashMap;

pub struct RequestValidator;

impl RequestValidator {
    /// Validate body against per-column rules. All required fields must be present.
    pub fn validate(
        body: &Map<String, Value>,
        rules: &HashMap<String, ValidationRule>,
    ) -> Result<(), AppError> {
        for (col, rule) in sorted(rules) {
            let val = body.get(col);
            if rule.required == Some(true) && val.map_or(true, Value::is_null) {
                return Err(AppError::Validation(format!("{} is required", col)));
            }
            if let Some(v) = val {
                validate_field(col, v, rule)?;
            }
        }
        Ok(())
    }

    /// Validate only the fields present in body (for PATCH). Required fields may be omitted but not nulled.
    pub fn validate_partial(
        body: &Map<String, Value>,
        rules: &HashMap<String, ValidationRule>,
    ) -> Result<(), AppError> {
        for (col, rule) in sorted(rules) {
            let Some(v) = body.get(col) else { continue };
            if rule.required == Some(true) && v.is_null() {
                return Err(AppError::Validation(format!("{} is required", col)));
            }
            validate_field(col, v, rule)?;
        }
        Ok(())
    }
}

/// Rules in column order so the first reported violation is stable.
fn sorted(rules: &HashMap<String, ValidationRule>) -> Vec<(&str, &ValidationRule)> {
    let mut out: Vec<_> = rules.iter().map(|(k, v)| (k.as_str(), v)).collect();
    out.sort_by(|a, b| a.0.cmp(b.0));
    out
}

fn validate_field(col: &str, v: &Value, rule: &ValidationRule) -> Result<(), AppError> {
    if v.is_null() {
        return Ok(());
    }
    if let Some(format) = &rule.format {
        validate_format(col, v, format)?;
    }
    if let Some(max) = rule.max_length {
        if let Some(s) = v.as_str() {
            if s.chars().count() > max as usize {
                return Err(AppError::Validation(format!(
                    "{} must be at most {} characters",
                    col, max
                )));
            }
        }
    }
    if let Some(min) = rule.min_length {
        if let Some(s) = v.as_str() {
            if s.chars().count() < min as usize {
                return Err(AppError::Validation(format!(
                    "{} must be at least {} characters",
                    col, min
                )));
            }
        }
    }
    if let Some(ref pattern) = rule.pattern {
        let re = Regex::new(pattern).map_err(|_| AppError::Validation(format!("invalid pattern for {}", col)))?;
        if let Some(s) = v.as_str() {
            if !re.is_match(s) {
                return Err(AppError::Validation(format!("{} does not match required pattern", col)));
            }
        }
    }
    Ok(())
}

fn validate_format(col: &str, v: &Value, format: &str) -> Result<(), AppError> {
    match format.to_lowercase().as_str() {
        "date" => {
            if v.as_str().and_then(parse_date).is_none() {
                return Err(AppError::Validation(format!("{} must be a date (YYYY-MM-DD)", col)));
            }
        }
        other => tracing::debug!(column = %col, format = %other, "unknown validation format"),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{resolve, FullConfig};
    use serde_json::json;

    fn actor_rules() -> HashMap<String, ValidationRule> {
        let model = resolve(&FullConfig::builtin().unwrap()).unwrap();
        model.entity_by_path("actors").unwrap().validation.clone()
    }

    fn object(v: Value) -> Map<String, Value> {
        v.as_object().unwrap().clone()
    }

    #[test]
    fn full_validation_requires_mandatory_columns() {
        let rules = actor_rules();
        let ok = object(json!({"first_name": "Sean", "last_name": "Connery", "birth_date": "1930-08-25"}));
        RequestValidator::validate(&ok, &rules).unwrap();

        let missing = object(json!({"first_name": "Sean", "birth_date": "1930-08-25"}));
        let err = RequestValidator::validate(&missing, &rules).unwrap_err();
        assert_eq!(err.to_string(), "validation: last_name is required");
    }

    #[test]
    fn rejects_malformed_dates_and_long_names() {
        let rules = actor_rules();
        let bad_date = object(json!({"first_name": "A", "last_name": "B", "birth_date": "25.08.1930"}));
        assert!(matches!(
            RequestValidator::validate(&bad_date, &rules),
            Err(AppError::Validation(_))
        ));
        let long = object(json!({"first_name": "x".repeat(256)}));
        assert!(RequestValidator::validate_partial(&long, &rules).is_err());
    }

    #[test]
    fn partial_validation_checks_only_present_fields() {
        let rules = actor_rules();
        RequestValidator::validate_partial(&object(json!({"death_date": "2020-10-31"})), &rules).unwrap();
        RequestValidator::validate_partial(&object(json!({"death_date": null})), &rules).unwrap();
        assert!(RequestValidator::validate_partial(&object(json!({"last_name": null})), &rules).is_err());
    }
}
