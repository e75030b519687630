//! Case conversion for query parameters: property paths arrive in camelCase (`director.firstName`)
//! and are matched against snake_case column and association names.

/// Convert a single identifier from camelCase to snake_case.
/// e.g. "firstName" -> "first_name", "birthDate" -> "birth_date"
pub fn to_snake_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 4);
    for (i, c) in s.chars().enumerate() {
        if c.is_uppercase() {
            if i > 0 && !out.ends_with('_') {
                out.push('_');
            }
            out.extend(c.to_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

/// Split a dotted property path and convert each segment to snake_case.
/// Empty segments make the whole path invalid.
pub fn property_path(path: &str) -> Option<Vec<String>> {
    let segments: Vec<String> = path.split('.').map(to_snake_case).collect();
    if segments.iter().any(|s| s.is_empty()) {
        return None;
    }
    Some(segments)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn converts_camel_case_identifiers() {
        assert_eq!(to_snake_case("firstName"), "first_name");
        assert_eq!(to_snake_case("releaseDate"), "release_date");
        assert_eq!(to_snake_case("title"), "title");
    }

    #[test]
    fn leaves_snake_case_untouched() {
        assert_eq!(to_snake_case("birth_date"), "birth_date");
        assert_eq!(to_snake_case("death_Date"), "death_date");
    }

    #[test]
    fn splits_property_paths() {
        assert_eq!(
            property_path("director.firstName"),
            Some(vec!["director".to_string(), "first_name".to_string()])
        );
        assert_eq!(property_path("characters..name"), None);
        assert_eq!(property_path(""), None);
    }
}
