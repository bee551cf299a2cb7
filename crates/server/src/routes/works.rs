//! Popular works, country information and autocomplete.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use axum::Json;
use axum::extract::rejection::QueryRejection;
use axum::extract::{Path, Query, State};
use copyr_core::copyright::{CopyrightInfo, supported_countries};
use copyr_core::{CachedWork, CopyrightStatus, WorkType};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use super::query_params;
use crate::AppState;
use crate::error::ApiResult;
use crate::pipeline::{cached_confidence, primary_source};
use crate::validation::{sanitize_string, validate_country_code, validate_limit, work_type_filter};

static SLUG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^a-z0-9\-]").expect("slug pattern is valid"));

const MAX_POPULAR: usize = 50;
const MAX_SUGGESTIONS: usize = 20;
/// Works scanned to build autocomplete suggestions.
const SUGGESTION_SCAN: usize = 50;

#[derive(Debug, Deserialize)]
pub struct PopularParams {
    #[serde(default = "default_popular_limit")]
    pub limit: usize,
    pub work_type: Option<String>,
    pub country: Option<String>,
    pub status: Option<String>,
}

fn default_popular_limit() -> usize {
    6
}

/// One work as shown on the landing page.
#[derive(Debug, Clone, Serialize)]
pub struct PopularWork {
    pub id: String,
    pub slug: String,
    pub title: String,
    pub author_name: String,
    pub publication_year: Option<i32>,
    pub published: bool,
    pub country: String,
    pub work_type: Option<WorkType>,
    pub status: CopyrightStatus,
    pub enters_public_domain: Option<i32>,
    pub source: String,
    pub notes: String,
    pub confidence_score: f64,
    pub queried_at: String,
    pub category: &'static str,
}

pub fn slugify(title: &str) -> String {
    let slug = title.to_lowercase().replace(' ', "-").replace(['\'', '"'], "");
    SLUG_RE.replace_all(&slug, "").chars().take(50).collect()
}

/// Catalog search link used when a work has no stored source.
pub fn catalog_search_url(title: &str) -> String {
    let query: String = url::form_urlencoded::byte_serialize(title.as_bytes()).collect();
    format!("https://catalog.loc.gov/search?q={query}")
}

fn category(work_type: Option<WorkType>) -> &'static str {
    work_type.unwrap_or(WorkType::Literary).category()
}

impl PopularWork {
    fn from_cached(work: &CachedWork, country: &str) -> Self {
        Self {
            id: work.id.clone(),
            slug: slugify(&work.title),
            title: work.title.clone(),
            author_name: work.author.clone().unwrap_or_else(|| "Unknown".into()),
            publication_year: work.publication_year,
            published: true,
            country: country.to_string(),
            work_type: work.work_type,
            status: work.copyright_status.unwrap_or(CopyrightStatus::Unknown),
            enters_public_domain: work.public_domain_year,
            source: primary_source(work).unwrap_or_else(|| catalog_search_url(&work.title)),
            notes: format!("Work from {}", work.source_api),
            confidence_score: cached_confidence(work),
            queried_at: work.created_at.clone(),
            category: category(work.work_type),
        }
    }
}

/// GET /api/popular-works
pub async fn popular_works(
    State(state): State<AppState>, query: Result<Query<PopularParams>, QueryRejection>,
) -> ApiResult<Json<Value>> {
    let params = query_params(query)?;
    let limit = validate_limit(params.limit, MAX_POPULAR)?;
    let work_type = work_type_filter(params.work_type.as_deref())?;
    let country = match params.country.as_deref().filter(|c| !c.trim().is_empty()) {
        Some(c) => validate_country_code(c)?,
        None => state.config.default_country.clone(),
    };
    let status = match params.status.as_deref().filter(|s| !s.trim().is_empty()) {
        Some(s) => Some(sanitize_string(s, 100)?.parse::<CopyrightStatus>()?),
        None => None,
    };

    let works: Vec<PopularWork> = state
        .db
        .popular_works(limit, work_type, status)
        .await?
        .iter()
        .map(|w| PopularWork::from_cached(w, &country))
        .collect();
    Ok(Json(json!({"total": works.len(), "works": works})))
}

/// GET /api/countries
pub async fn countries() -> Json<Value> {
    let countries: Vec<Value> =
        supported_countries().iter().map(|c| json!({"code": c.code, "name": c.name})).collect();
    Json(json!({"total_count": countries.len(), "supported_countries": countries}))
}

/// GET /api/copyright-info/{country}
pub async fn copyright_info(State(state): State<AppState>, Path(country): Path<String>) -> ApiResult<Json<CopyrightInfo>> {
    let country = validate_country_code(&country)?;
    Ok(Json(state.analyzer.copyright_info(Some(&country))?))
}

/// GET /api/copyright-info, for the configured default country.
pub async fn default_copyright_info(State(state): State<AppState>) -> ApiResult<Json<CopyrightInfo>> {
    Ok(Json(state.analyzer.copyright_info(None)?))
}

#[derive(Debug, Deserialize)]
pub struct AutocompleteParams {
    #[serde(default)]
    pub q: String,
    #[serde(default = "default_suggestion_limit")]
    pub limit: usize,
}

fn default_suggestion_limit() -> usize {
    10
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SuggestionSection {
    pub title: &'static str,
    pub icon: &'static str,
    pub items: Vec<String>,
}

/// Title, author and category sections for cached works matching `query`.
pub fn build_suggestions(works: &[CachedWork], query: &str, limit: usize) -> Vec<SuggestionSection> {
    let query = query.to_lowercase();
    let mut titles = BTreeSet::new();
    let mut authors = BTreeSet::new();
    let mut categories = BTreeSet::new();

    for work in works {
        if work.title.to_lowercase().contains(&query) {
            titles.insert(work.title.trim().to_string());
        }
        if let Some(author) = &work.author
            && author.to_lowercase().contains(&query)
        {
            authors.insert(author.trim().to_string());
        }
        if let Some(work_type) = work.work_type {
            categories.insert(category(Some(work_type)));
        }
    }

    let mut sections = Vec::new();
    if !titles.is_empty() {
        sections.push(SuggestionSection { title: "Work Titles", icon: "📖", items: titles.into_iter().take(limit).collect() });
    }
    if !authors.is_empty() {
        sections.push(SuggestionSection { title: "Authors", icon: "👤", items: authors.into_iter().take(limit).collect() });
    }
    let categories: Vec<String> =
        categories.into_iter().filter(|c| c.to_lowercase().contains(&query)).map(str::to_string).collect();
    if !categories.is_empty() {
        sections.push(SuggestionSection { title: "Categories", icon: "🏷️", items: categories });
    }
    sections
}

/// GET /api/autocomplete
pub async fn autocomplete(
    State(state): State<AppState>, query: Result<Query<AutocompleteParams>, QueryRejection>,
) -> ApiResult<Json<Value>> {
    let params = query_params(query)?;
    if params.q.trim().chars().count() < 2 {
        return Ok(Json(json!({"sections": []})));
    }
    let q = sanitize_string(&params.q, 100)?;
    let limit = validate_limit(params.limit, MAX_SUGGESTIONS)?;

    let works = state.db.search_by_content(Some(&q), Some(&q), None, SUGGESTION_SCAN).await?;
    Ok(Json(json!({"sections": build_suggestions(&works, &q, limit)})))
}
