//! POST /api/search
//!
//! Cached works answer first: the search cache for this exact query, then a
//! content match on normalized title and author. Remaining slots are filled
//! from the external catalogs, each hit analyzed and written to the cache.
//! A request naming both title and author asks for one specific work.

use std::net::SocketAddr;

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{ConnectInfo, State};
use axum::http::HeaderMap;
use chrono::Utc;
use copyr_client::{filter_by_work_type, group_similar_works, merge_work_sources};
use copyr_core::WorkType;
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::json_body;
use super::works::catalog_search_url;
use crate::AppState;
use crate::auth::{Claims, MaybeUser};
use crate::error::{ApiError, ApiResult};
use crate::pipeline::{SearchResultItem, resolve_work};
use crate::quota::client_address;
use crate::validation::{
    MAX_AUTHOR_LENGTH, MAX_QUERY_LENGTH, optional_search_field, validate_country_code, validate_limit,
    validate_user_id, work_type_filter,
};

const MAX_RESULTS: usize = 50;
/// Cache key work type when no filter is applied.
const ANY_WORK_TYPE: &str = "any";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchRequest {
    /// Author or composer name.
    #[serde(default)]
    pub author: Option<String>,

    #[serde(default)]
    pub title: Option<String>,

    /// literary, musical or auto.
    #[serde(default)]
    pub work_type: Option<String>,

    /// Maximum results (1-50, default 5).
    #[serde(default = "default_limit")]
    pub limit: usize,

    /// Country for copyright analysis; defaults to the configured country.
    #[serde(default)]
    pub country: Option<String>,

    /// Save the search to this user's history (requires a token).
    #[serde(default)]
    pub user_id: Option<String>,
}

fn default_limit() -> usize {
    5
}

/// Validated search parameters.
#[derive(Debug, Clone)]
pub struct SearchParams {
    pub author: Option<String>,
    pub title: Option<String>,
    pub work_type: Option<WorkType>,
    pub limit: usize,
    pub country: String,
    pub user_id: Option<String>,
}

impl SearchParams {
    pub fn from_request(request: &SearchRequest, default_country: &str) -> Result<Self, ApiError> {
        Ok(Self {
            author: optional_search_field(request.author.as_deref(), MAX_AUTHOR_LENGTH)?,
            title: optional_search_field(request.title.as_deref(), MAX_QUERY_LENGTH)?,
            work_type: work_type_filter(request.work_type.as_deref())?,
            limit: validate_limit(request.limit, MAX_RESULTS)?,
            country: match request.country.as_deref().filter(|c| !c.trim().is_empty()) {
                Some(c) => validate_country_code(c)?,
                None => default_country.to_string(),
            },
            user_id: request.user_id.as_deref().filter(|u| !u.trim().is_empty()).map(validate_user_id).transpose()?,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.author.is_none() && self.title.is_none()
    }

    /// One result when both title and author are given.
    pub fn effective_limit(&self) -> usize {
        if self.author.is_some() && self.title.is_some() { 1 } else { self.limit }
    }

    /// "author: X, title: Y, type: Z", used for history and the search cache.
    pub fn query_text(&self) -> String {
        let mut parts = Vec::new();
        if let Some(author) = &self.author {
            parts.push(format!("author: {author}"));
        }
        if let Some(title) = &self.title {
            parts.push(format!("title: {title}"));
        }
        if let Some(work_type) = self.work_type {
            parts.push(format!("type: {work_type}"));
        }
        parts.join(", ")
    }

    fn cache_work_type(&self) -> &'static str {
        self.work_type.map(|w| w.as_str()).unwrap_or(ANY_WORK_TYPE)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchQuery {
    pub author: Option<String>,
    pub title: Option<String>,
    pub work_type: Option<WorkType>,
    pub limit: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResponse {
    pub query: SearchQuery,
    pub results: Vec<SearchResultItem>,
    pub total_found: usize,
    /// database, api or mixed.
    pub source: String,
    pub searched_at: String,
}

fn response_source(from_cache: usize, from_api: usize) -> &'static str {
    match (from_cache, from_api) {
        (_, 0) => "database",
        (0, _) => "api",
        _ => "mixed",
    }
}

/// Default state for a cleared search: the most recent cached works.
async fn popular_response(state: &AppState, params: &SearchParams) -> ApiResult<SearchResponse> {
    let works = state.db.popular_works(params.limit, params.work_type, None).await?;
    let results: Vec<SearchResultItem> = works
        .iter()
        .map(|w| SearchResultItem { source: catalog_search_url(&w.title), ..SearchResultItem::from_cached(w) })
        .collect();
    Ok(SearchResponse {
        query: SearchQuery { author: None, title: None, work_type: params.work_type, limit: params.limit },
        total_found: results.len(),
        results,
        source: "database".into(),
        searched_at: Utc::now().to_rfc3339(),
    })
}

fn push_unique(results: &mut Vec<SearchResultItem>, item: SearchResultItem) -> bool {
    if results.iter().any(|r| r.same_work(&item)) {
        return false;
    }
    results.push(item);
    true
}

/// Run a validated, non-empty search.
pub async fn run_search(state: &AppState, params: &SearchParams) -> ApiResult<SearchResponse> {
    let limit = params.effective_limit();
    let query_text = params.query_text();
    let mut results: Vec<SearchResultItem> = Vec::new();
    let mut work_ids: Vec<String> = Vec::new();

    let cached = match state.db.get_cached_search(&query_text, params.cache_work_type()).await {
        Ok(Some(works)) if !works.is_empty() => {
            tracing::debug!(query = %query_text, "search cache hit");
            works
        }
        Ok(_) => {
            state.db.search_by_content(params.title.as_deref(), params.author.as_deref(), params.work_type, limit).await?
        }
        Err(e) => {
            tracing::warn!(error = %e, "search cache lookup failed");
            state.db.search_by_content(params.title.as_deref(), params.author.as_deref(), params.work_type, limit).await?
        }
    };
    for work in &cached {
        if results.len() >= limit {
            break;
        }
        if params.work_type.is_some() && work.work_type != params.work_type {
            continue;
        }
        if push_unique(&mut results, SearchResultItem::from_cached(work)) {
            work_ids.push(work.id.clone());
        }
    }
    let from_cache = results.len();

    if results.len() < limit {
        let remaining = limit - results.len();
        let found = state
            .clients
            .search_all_sources(params.title.as_deref(), params.author.as_deref(), params.work_type, remaining * 2)
            .await;
        if found.works.is_empty() && !found.failed_sources.is_empty() && results.is_empty() {
            return Err(ApiError::ExternalService("Search service temporarily unavailable".into()));
        }

        let merged = group_similar_works(found.works).into_iter().filter_map(merge_work_sources).collect();
        for work in filter_by_work_type(merged, params.work_type) {
            if results.len() >= limit {
                break;
            }
            let resolved =
                resolve_work(&state.analyzer, &state.db, &work, &params.country, state.config.work_cache_ttl_secs).await;
            if push_unique(&mut results, resolved.item) {
                work_ids.extend(resolved.work_id);
            }
        }
    }
    let from_api = results.len() - from_cache;

    if from_api > 0
        && !work_ids.is_empty()
        && let Err(e) = state
            .db
            .put_search_results(&query_text, params.cache_work_type(), &work_ids, state.config.search_cache_ttl_secs)
            .await
    {
        tracing::warn!(error = %e, "failed to cache search results");
    }

    tracing::info!(query = %query_text, from_cache, from_api, "search complete");
    Ok(SearchResponse {
        query: SearchQuery {
            author: params.author.clone(),
            title: params.title.clone(),
            work_type: params.work_type,
            limit: params.limit,
        },
        total_found: results.len(),
        results,
        source: response_source(from_cache, from_api).into(),
        searched_at: Utc::now().to_rfc3339(),
    })
}

async fn save_history(state: &AppState, user_id: &str, params: &SearchParams, response: &SearchResponse) {
    let filters = json!({
        "author": params.author,
        "title": params.title,
        "work_type": params.work_type,
        "country": params.country,
    });
    let results = serde_json::to_value(&response.results).unwrap_or_default();
    if let Err(e) = state.db.add_search_history(user_id, &params.query_text(), &filters, &results).await {
        tracing::warn!(user_id, error = %e, "failed to save search to history");
    }
}

/// Owner of the history entry for this search, checked before searching.
fn history_owner(user: Option<&Claims>, params: &SearchParams) -> Result<Option<String>, ApiError> {
    let Some(claims) = user else {
        return Ok(None);
    };
    match &params.user_id {
        Some(id) => claims.authorize(id).map(|()| Some(id.clone())),
        None => Ok(Some(claims.user_id.clone())),
    }
}

pub async fn search_works(
    State(state): State<AppState>, MaybeUser(user): MaybeUser, peer: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap, body: Result<Json<SearchRequest>, JsonRejection>,
) -> ApiResult<Json<SearchResponse>> {
    let request = json_body(body)?;
    let params = SearchParams::from_request(&request, &state.config.default_country)?;
    if params.is_empty() {
        return Ok(Json(popular_response(&state, &params).await?));
    }

    let owner = history_owner(user.as_ref(), &params)?;
    let client = client_address(&headers, peer.as_ref(), &state.config.trusted_proxies);
    let anonymous = user.is_none();
    if anonymous {
        let remaining = state.quota.consume(&client).await?;
        tracing::debug!(%client, remaining, "anonymous search");
    } else {
        state.quota.reset(&client).await;
    }

    let response = match run_search(&state, &params).await {
        Ok(response) => response,
        Err(e) => {
            if anonymous {
                state.quota.refund(&client).await;
            }
            return Err(e);
        }
    };
    if let Some(owner) = owner {
        save_history(&state, &owner, &params, &response).await;
    }
    Ok(Json(response))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(author: Option<&str>, title: Option<&str>) -> SearchRequest {
        SearchRequest {
            author: author.map(str::to_string),
            title: title.map(str::to_string),
            limit: 5,
            ..Default::default()
        }
    }

    #[test]
    fn test_effective_limit() {
        let params = SearchParams::from_request(&request(Some("Melville"), Some("Moby Dick")), "US").unwrap();
        assert_eq!(params.effective_limit(), 1);
        let params = SearchParams::from_request(&request(Some("Melville"), None), "US").unwrap();
        assert_eq!(params.effective_limit(), 5);
    }

    #[test]
    fn test_blank_fields_make_an_empty_search() {
        let params = SearchParams::from_request(&request(Some("  "), Some("")), "US").unwrap();
        assert!(params.is_empty());
        assert_eq!(params.country, "US");
    }

    #[test]
    fn test_query_text() {
        let mut req = request(Some("Mozart"), Some("Requiem"));
        req.work_type = Some("musical".into());
        let params = SearchParams::from_request(&req, "US").unwrap();
        assert_eq!(params.query_text(), "author: Mozart, title: Requiem, type: musical");
        assert_eq!(params.cache_work_type(), "musical");
    }

    #[test]
    fn test_invalid_requests() {
        let mut req = request(None, Some("x"));
        assert!(SearchParams::from_request(&req, "US").is_err());
        req.title = Some("Emma".into());
        req.limit = 0;
        assert!(SearchParams::from_request(&req, "US").is_err());
        req.limit = 5;
        req.work_type = Some("film".into());
        assert!(SearchParams::from_request(&req, "US").is_err());
        req.work_type = None;
        req.user_id = Some("someone".into());
        assert!(SearchParams::from_request(&req, "US").is_err());
    }

    #[test]
    fn test_response_source() {
        assert_eq!(response_source(2, 0), "database");
        assert_eq!(response_source(0, 0), "database");
        assert_eq!(response_source(0, 3), "api");
        assert_eq!(response_source(1, 1), "mixed");
    }

    #[test]
    fn test_history_owner() {
        let params = SearchParams::from_request(&request(Some("Mozart"), None), "US").unwrap();
        assert_eq!(history_owner(None, &params).unwrap(), None);

        let claims = Claims::new("aaaaaaaa-0000-0000-0000-000000000001", None, "user");
        assert_eq!(history_owner(Some(&claims), &params).unwrap().as_deref(), Some("aaaaaaaa-0000-0000-0000-000000000001"));

        let mut req = request(Some("Mozart"), None);
        req.user_id = Some("bbbbbbbb-0000-0000-0000-000000000002".into());
        let params = SearchParams::from_request(&req, "US").unwrap();
        assert!(history_owner(Some(&claims), &params).is_err());
    }
}
