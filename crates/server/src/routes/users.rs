//! User profile and search history, always scoped to the token's owner
//! unless the caller is an admin.

use axum::Json;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use copyr_core::cache::UserProfile;
use copyr_core::cache::history::MAX_HISTORY_PAGE;
use serde::Deserialize;
use serde_json::{Value, json};

use super::{json_body, query_params};
use crate::AppState;
use crate::auth::{Claims, CurrentUser};
use crate::error::{ApiError, ApiResult};
use crate::validation::{MAX_QUERY_LENGTH, sanitize_string, validate_limit, validate_user_id};

/// Validated path user id the caller may act on.
fn authorized_user(claims: &Claims, user_id: &str) -> Result<String, ApiError> {
    let user_id = validate_user_id(user_id)?;
    claims.authorize(&user_id)?;
    Ok(user_id)
}

/// GET /api/user/{id}/profile
///
/// A caller without a stored profile gets one created from the token.
pub async fn get_profile(
    State(state): State<AppState>, CurrentUser(claims): CurrentUser, Path(user_id): Path<String>,
) -> ApiResult<Json<UserProfile>> {
    let user_id = authorized_user(&claims, &user_id)?;
    if let Some(profile) = state.db.get_profile(&user_id).await? {
        return Ok(Json(profile));
    }
    if !claims.user_id.eq_ignore_ascii_case(&user_id) {
        return Err(ApiError::NotFound("User profile not found".into()));
    }
    let profile = state.db.upsert_profile(&user_id, claims.email.as_deref(), None, None).await?;
    tracing::info!(user_id = %profile.id, "created user profile");
    Ok(Json(profile))
}

#[derive(Debug, Deserialize)]
pub struct HistoryParams {
    #[serde(default = "default_history_limit")]
    pub limit: usize,
}

fn default_history_limit() -> usize {
    20
}

/// GET /api/user/{id}/search-history
pub async fn get_search_history(
    State(state): State<AppState>, CurrentUser(claims): CurrentUser, Path(user_id): Path<String>,
    query: Result<Query<HistoryParams>, QueryRejection>,
) -> ApiResult<Json<Value>> {
    let user_id = authorized_user(&claims, &user_id)?;
    let limit = validate_limit(query_params(query)?.limit, MAX_HISTORY_PAGE)?;
    let history = state.db.search_history(&user_id, limit).await?;
    Ok(Json(json!({"user_id": user_id, "total": history.len(), "history": history})))
}

#[derive(Debug, Deserialize)]
pub struct NewHistoryEntry {
    pub query_text: String,
    #[serde(default)]
    pub filters: Value,
    #[serde(default)]
    pub results: Value,
}

/// POST /api/user/{id}/search-history
pub async fn save_search_history(
    State(state): State<AppState>, CurrentUser(claims): CurrentUser, Path(user_id): Path<String>,
    body: Result<Json<NewHistoryEntry>, JsonRejection>,
) -> ApiResult<Json<Value>> {
    let user_id = authorized_user(&claims, &user_id)?;
    let entry = json_body(body)?;
    let query_text = sanitize_string(&entry.query_text, MAX_QUERY_LENGTH)?;
    let filters = if entry.filters.is_null() { json!({}) } else { entry.filters };
    let results = if entry.results.is_null() { json!([]) } else { entry.results };

    let saved = state.db.add_search_history(&user_id, &query_text, &filters, &results).await?;
    Ok(Json(json!({"message": "Search saved to history", "search_id": saved.id})))
}

/// DELETE /api/user/{id}/search-history
pub async fn clear_search_history(
    State(state): State<AppState>, CurrentUser(claims): CurrentUser, Path(user_id): Path<String>,
) -> ApiResult<Json<Value>> {
    let user_id = authorized_user(&claims, &user_id)?;
    let deleted = state.db.clear_search_history(&user_id).await?;
    tracing::info!(%user_id, deleted, "cleared search history");
    Ok(Json(json!({"message": "Search history cleared", "items_deleted": deleted})))
}

/// DELETE /api/user/{id}/search-history/{search_id}
pub async fn delete_search_history_item(
    State(state): State<AppState>, CurrentUser(claims): CurrentUser,
    Path((user_id, search_id)): Path<(String, String)>,
) -> ApiResult<Json<Value>> {
    let user_id = authorized_user(&claims, &user_id)?;
    let search_id = validate_user_id(&search_id).map_err(|_| ApiError::Validation("Invalid search ID format".into()))?;
    if !state.db.delete_search_history_item(&user_id, &search_id).await? {
        return Err(ApiError::NotFound("Search history item not found".into()));
    }
    Ok(Json(json!({"message": "Search history item deleted", "search_id": search_id})))
}

#[cfg(test)]
mod tests {
    use super::*;

    const OWNER: &str = "aaaaaaaa-0000-4000-8000-000000000001";
    const OTHER: &str = "bbbbbbbb-0000-4000-8000-000000000002";

    #[test]
    fn test_authorized_user() {
        let claims = Claims::new(OWNER, None, "user");
        assert_eq!(authorized_user(&claims, &OWNER.to_uppercase()).unwrap(), OWNER);
        assert!(matches!(authorized_user(&claims, OTHER), Err(ApiError::Authorization(_))));
        assert!(matches!(authorized_user(&claims, "not-a-uuid"), Err(ApiError::Validation(_))));

        let admin = Claims::new(OTHER, None, crate::auth::ADMIN_ROLE);
        assert_eq!(authorized_user(&admin, OWNER).unwrap(), OWNER);
    }
}
