//! Library of Congress catalog client.
//!
//! Searches the LoC SRU endpoint with CQL and parses MODS records.
//!
//! ### API
//!
//! - **Endpoint**: `{base_url}?version=1.1&operation=searchRetrieve&recordSchema=mods`
//! - **Query**: `dc.title` and `dc.creator` indexes joined with `AND`
//! - **Rate Limiting**: one request per second by default
//! - **Ranking**: matches are scored against the request and the top five kept

pub mod mods;
pub mod query;
pub mod relevance;

pub use mods::{CLASSIFICATION_SOURCE, LocRecord};

use serde::{Deserialize, Serialize};

use crate::aggregate::SourceWork;
use crate::error::SourceError;
use crate::http::{SourceConfig, SourceHttp};

/// Relevant matches kept per search.
const TOP_MATCHES: usize = 5;

/// Outcome of one catalog search.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LocSearchResult {
    pub total_records: u64,
    /// Relevant matches, most relevant first.
    pub matches: Vec<LocRecord>,
    pub best_match: Option<LocRecord>,
    pub confidence: f64,
    pub source_url: String,
}

#[derive(Debug, Clone)]
pub struct LocClient {
    http: SourceHttp,
    base_url: String,
}

impl LocClient {
    pub fn new(config: &SourceConfig) -> Result<Self, SourceError> {
        Ok(Self {
            http: SourceHttp::new(config, "library_of_congress", "application/xml")?,
            base_url: config.base_url.clone(),
        })
    }

    /// Search the catalog by title and/or author.
    pub async fn search_books(&self, title: &str, author: &str) -> Result<LocSearchResult, SourceError> {
        let cql = query::build_cql(title, author)?;
        let body = self.http.get_text(&self.base_url, &query::sru_params(cql)).await?;
        let page = mods::parse_sru(&body)?;

        let ranked = relevance::rank(&page.records, title, author);
        let best_match = ranked.first().cloned();
        let confidence = relevance::confidence(!page.records.is_empty(), best_match.as_ref(), title, author);
        tracing::debug!(total = page.total_records, relevant = ranked.len(), confidence, "loc search complete");

        Ok(LocSearchResult {
            total_records: page.total_records,
            matches: ranked.into_iter().take(TOP_MATCHES).collect(),
            best_match,
            confidence,
            source_url: self.base_url.clone(),
        })
    }

    pub async fn search_by_author(&self, author: &str, limit: usize) -> Result<Vec<SourceWork>, SourceError> {
        if author.trim().is_empty() {
            return Ok(Vec::new());
        }
        self.search_formatted("", author, limit).await
    }

    pub async fn search_by_title(&self, title: &str, limit: usize) -> Result<Vec<SourceWork>, SourceError> {
        if title.trim().is_empty() {
            return Ok(Vec::new());
        }
        self.search_formatted(title, "", limit).await
    }

    pub async fn search_by_title_and_author(
        &self, title: &str, author: &str, limit: usize,
    ) -> Result<Vec<SourceWork>, SourceError> {
        if title.trim().is_empty() || author.trim().is_empty() {
            return Ok(Vec::new());
        }
        self.search_formatted(title, author, limit).await
    }

    async fn search_formatted(&self, title: &str, author: &str, limit: usize) -> Result<Vec<SourceWork>, SourceError> {
        let result = self.search_books(title, author).await?;
        Ok(result.matches.iter().take(limit).map(SourceWork::from_loc).collect())
    }
}
