//! Input sanitization for request parameters.

use std::sync::LazyLock;

use copyr_core::{WorkType, WorkTypeHint};
use regex::Regex;

use crate::error::ApiError;

static TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]*>").expect("tag pattern is valid"));
static WHITESPACE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("whitespace pattern is valid"));
static COUNTRY_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[A-Z]{2,3}$").expect("country pattern is valid"));

pub const MAX_QUERY_LENGTH: usize = 500;
pub const MAX_AUTHOR_LENGTH: usize = 200;
pub const MIN_QUERY_LENGTH: usize = 2;

/// Strip NUL bytes and markup, trim, and enforce a maximum length.
pub fn sanitize_string(value: &str, max_length: usize) -> Result<String, ApiError> {
    let value = value.replace('\0', "");
    let value = value.trim();
    if value.chars().count() > max_length {
        return Err(ApiError::Validation(format!("Input too long. Maximum {max_length} characters allowed")));
    }
    Ok(TAG_RE.replace_all(value, "").trim().to_string())
}

/// Sanitized search text of at least two characters with collapsed whitespace.
pub fn validate_search_query(query: &str, max_length: usize) -> Result<String, ApiError> {
    let query = sanitize_string(query, max_length)?;
    if query.is_empty() {
        return Err(ApiError::Validation("Search query cannot be empty".into()));
    }
    if query.chars().count() < MIN_QUERY_LENGTH {
        return Err(ApiError::Validation(format!(
            "Search query must be at least {MIN_QUERY_LENGTH} characters long"
        )));
    }
    Ok(WHITESPACE_RE.replace_all(&query, " ").into_owned())
}

/// Optional search field; blank input counts as absent.
pub fn optional_search_field(value: Option<&str>, max_length: usize) -> Result<Option<String>, ApiError> {
    match value.map(str::trim).filter(|v| !v.is_empty()) {
        Some(v) => validate_search_query(v, max_length).map(Some),
        None => Ok(None),
    }
}

pub fn validate_work_type(work_type: &str) -> Result<WorkTypeHint, ApiError> {
    work_type
        .parse::<WorkTypeHint>()
        .map_err(|_| ApiError::Validation("Invalid work type. Allowed values: literary, musical, auto".into()))
}

/// Concrete filter from an optional work type; `auto` means no filter.
pub fn work_type_filter(work_type: Option<&str>) -> Result<Option<WorkType>, ApiError> {
    match work_type.map(str::trim).filter(|w| !w.is_empty()) {
        Some(w) => Ok(validate_work_type(w)?.work_type()),
        None => Ok(None),
    }
}

/// Upper-cased two- or three-letter country code.
pub fn validate_country_code(code: &str) -> Result<String, ApiError> {
    let code = code.trim().to_uppercase();
    if code.is_empty() {
        return Err(ApiError::Validation("Country code cannot be empty".into()));
    }
    if !COUNTRY_RE.is_match(&code) {
        return Err(ApiError::Validation("Invalid country code format".into()));
    }
    Ok(code)
}

pub fn validate_limit(limit: usize, max_limit: usize) -> Result<usize, ApiError> {
    if limit < 1 {
        return Err(ApiError::Validation("Limit must be at least 1".into()));
    }
    if limit > max_limit {
        return Err(ApiError::Validation(format!("Limit cannot exceed {max_limit}")));
    }
    Ok(limit)
}

/// Lower-cased hyphenated UUID.
pub fn validate_user_id(id: &str) -> Result<String, ApiError> {
    if id.trim().is_empty() {
        return Err(ApiError::Validation("User ID cannot be empty".into()));
    }
    uuid::Uuid::try_parse(id.trim())
        .ok()
        .filter(|_| id.trim().len() == 36)
        .map(|u| u.hyphenated().to_string())
        .ok_or_else(|| ApiError::Validation("Invalid user ID format".into()))
}
