//! Flattening of TMDB-style attribute columns.
//!
//! Genre, keyword, cast and crew columns hold JSON lists of sub-records such as
//! `[{"id": 878, "name": "Science Fiction"}]`. Every function here is total: a field
//! that is empty or does not have the expected shape yields an empty list.

use log::debug;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct SubRecord {
    name: String,
    #[serde(default)]
    job: Option<String>,
}

fn parse_records(field: &str) -> Vec<SubRecord> {
    let trimmed = field.trim();
    if trimmed.is_empty() {
        return Vec::new();
    }

    match serde_json::from_str::<Vec<SubRecord>>(trimmed) {
        Ok(records) => records,
        Err(e) => {
            debug!("Ignoring malformed attribute field ({}): {:.60}", e, trimmed);
            Vec::new()
        }
    }
}

/// All `name` values in source order.
pub fn extract_names(field: &str) -> Vec<String> {
    parse_records(field).into_iter().map(|r| r.name).collect()
}

/// The first `k` `name` values in source order.
pub fn extract_top_k_names(field: &str, k: usize) -> Vec<String> {
    parse_records(field)
        .into_iter()
        .take(k)
        .map(|r| r.name)
        .collect()
}

/// Name of the first sub-record whose `job` equals `role_name`. Later matches are ignored.
pub fn extract_role(field: &str, role_name: &str) -> Option<String> {
    parse_records(field)
        .into_iter()
        .find(|r| r.job.as_deref() == Some(role_name))
        .map(|r| r.name)
}

/// Strips all whitespace and lowercases, so "Sam Worthington" becomes "samworthington".
pub fn collapse(token: &str) -> String {
    token
        .chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect()
}

pub fn collapse_all(tokens: &[String]) -> Vec<String> {
    tokens
        .iter()
        .map(|t| collapse(t))
        .filter(|t| !t.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const GENRES: &str = r#"[{"id": 28, "name": "Action"}, {"id": 12, "name": "Adventure"}, {"id": 878, "name": "Science Fiction"}]"#;
    const CREW: &str = r#"[{"credit_id": "a", "department": "Sound", "job": "Original Music Composer", "name": "James Horner"},
        {"credit_id": "b", "department": "Directing", "job": "Director", "name": "James Cameron"},
        {"credit_id": "c", "department": "Directing", "job": "Director", "name": "Second Director"}]"#;

    #[test]
    fn extracts_names_in_source_order() {
        assert_eq!(
            extract_names(GENRES),
            vec!["Action", "Adventure", "Science Fiction"]
        );
    }

    #[test]
    fn top_k_truncates() {
        assert_eq!(extract_top_k_names(GENRES, 2), vec!["Action", "Adventure"]);
        assert_eq!(extract_top_k_names(GENRES, 10).len(), 3);
        assert!(extract_top_k_names(GENRES, 0).is_empty());
    }

    #[test]
    fn role_keeps_first_match_only() {
        assert_eq!(
            extract_role(CREW, "Director").as_deref(),
            Some("James Cameron")
        );
        assert_eq!(extract_role(CREW, "Producer"), None);
    }

    #[test]
    fn malformed_fields_are_empty() {
        assert!(extract_names("").is_empty());
        assert!(extract_names("not json at all").is_empty());
        assert!(extract_names(r#"{"name": "Action"}"#).is_empty());
        assert!(extract_names(r#"[{"id": 1}]"#).is_empty());
        assert!(extract_names("[{\"name\": \"Action\"").is_empty());
        assert_eq!(extract_role("[]", "Director"), None);
    }

    #[test]
    fn collapse_removes_internal_whitespace() {
        assert_eq!(collapse("Sam Worthington"), "samworthington");
        assert_eq!(collapse("  Science\tFiction "), "sciencefiction");
        assert_eq!(
            collapse_all(&["Tom Hanks".to_string(), " ".to_string()]),
            vec!["tomhanks"]
        );
    }
}
