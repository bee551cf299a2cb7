//! MusicBrainz web service client.
//!
//! Provides work search (composers, tags and the earliest known release
//! year) and artist search (life span years) for musical works.
//!
//! ### API
//!
//! - **Endpoint**: `https://musicbrainz.org/ws/2/{work,artist,recording}`
//! - **Authentication**: none, but a descriptive User-Agent is required.
//! - **Rate Limiting**: at most one request per second; 503 means throttled.

pub mod response;

pub use response::{Composer, MbArtist, MbWork};

use serde::{Deserialize, Serialize};

use crate::aggregate::SourceWork;
use crate::error::SourceError;
use crate::http::{SourceConfig, SourceHttp};
use response::{ArtistSearchResponse, RecordingSearchResponse, WorkSearchResponse};

const WORK_LIMIT: u32 = 25;
const ARTIST_LIMIT: u32 = 10;
const RECORDING_LIMIT: u32 = 50;

/// Works that get an extra recording lookup for their release year.
pub const DEFAULT_RELEASE_LOOKUPS: usize = 3;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkSearchResult {
    pub works: Vec<MbWork>,
    pub total_results: usize,
    pub best_match: Option<MbWork>,
    pub confidence: f64,
    pub source_url: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ArtistSearchResult {
    pub artists: Vec<MbArtist>,
    pub best_match: Option<MbArtist>,
    pub confidence: f64,
    pub source_url: String,
}

fn quote(term: &str) -> String {
    term.trim().replace('"', "\\\"")
}

/// Lucene query over the work and artist fields, skipping blank terms.
pub fn work_query(title: &str, composer: &str) -> Result<String, SourceError> {
    let mut terms = Vec::new();
    if !title.trim().is_empty() {
        terms.push(format!("work:\"{}\"", quote(title)));
    }
    if !composer.trim().is_empty() {
        terms.push(format!("artist:\"{}\"", quote(composer)));
    }
    if terms.is_empty() {
        return Err(SourceError::InvalidQuery("No valid search terms provided".into()));
    }
    Ok(terms.join(" AND "))
}

pub fn score_work(work: &MbWork, title: &str, composer: &str) -> u32 {
    let (work_title, title) = (work.title.to_lowercase(), title.to_lowercase());
    let composer = composer.to_lowercase();
    let mut score = 0;

    if work_title.contains(&title) || title.contains(&work_title) {
        score += 50;
    }
    let composer_match = work.composers.iter().any(|c| {
        let name = c.name.to_lowercase();
        name.contains(&composer) || composer.contains(&name)
    });
    if composer_match {
        score += 40;
    }
    if !work.composers.is_empty() {
        score += 10;
    }
    if !work.tags.is_empty() {
        score += 5;
    }
    score
}

pub fn score_artist(artist: &MbArtist, name: &str) -> u32 {
    let (artist_name, target) = (artist.name.to_lowercase(), name.to_lowercase());
    let mut score = 0;
    if artist_name == target {
        score += 100;
    } else if artist_name.contains(&target) || target.contains(&artist_name) {
        score += 50;
    }
    if artist.death_year.is_some() {
        score += 20;
    }
    if artist.birth_year.is_some() {
        score += 10;
    }
    if artist.country.is_some() {
        score += 5;
    }
    score
}

/// First highest-scoring item.
fn best_by<T: Clone>(items: &[T], score: impl Fn(&T) -> u32) -> Option<T> {
    let mut best: Option<(&T, u32)> = None;
    for item in items {
        let s = score(item);
        if best.is_none_or(|(_, b)| s > b) {
            best = Some((item, s));
        }
    }
    best.map(|(item, _)| item.clone())
}

pub fn work_confidence(works: &[MbWork], best: Option<&MbWork>, title: &str, composer: &str) -> f64 {
    if works.is_empty() {
        return 0.0;
    }
    let Some(best) = best else {
        return 0.1;
    };

    let (best_title, title) = (best.title.to_lowercase(), title.to_lowercase());
    let mut confidence: f64 = 0.3;
    if best_title == title {
        confidence += 0.4;
    } else if best_title.contains(&title) {
        confidence += 0.2;
    }
    let composer = composer.to_lowercase();
    if best.composers.iter().any(|c| c.name.to_lowercase().contains(&composer)) {
        confidence += 0.3;
    }
    confidence.min(1.0)
}

#[derive(Debug, Clone)]
pub struct MusicBrainzClient {
    http: SourceHttp,
    base_url: String,
    release_lookups: usize,
}

impl MusicBrainzClient {
    pub fn new(config: &SourceConfig) -> Result<Self, SourceError> {
        Ok(Self {
            http: SourceHttp::new(config, "musicbrainz", "application/json")?,
            base_url: config.base_url.clone(),
            release_lookups: DEFAULT_RELEASE_LOOKUPS,
        })
    }

    /// Limit how many top works get a recording lookup.
    pub fn with_release_lookups(mut self, count: usize) -> Self {
        self.release_lookups = count;
        self
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self, url: &str, params: &[(&str, String)],
    ) -> Result<T, SourceError> {
        let body = self.http.get_text(url, params).await?;
        serde_json::from_str(&body).map_err(|e| SourceError::Parse(format!("invalid MusicBrainz JSON: {e}")))
    }

    /// Search works by title and composer.
    pub async fn search_works(&self, title: &str, composer: &str) -> Result<WorkSearchResult, SourceError> {
        let query = work_query(title, composer)?;
        let url = format!("{}/work", self.base_url);
        let params = [
            ("query", query),
            ("fmt", "json".to_string()),
            ("limit", WORK_LIMIT.to_string()),
            ("inc", "artist-rels+tags+aliases".to_string()),
        ];
        let response: WorkSearchResponse = self.get_json(&url, &params).await?;

        let total_results = response.works.len();
        let mut works: Vec<MbWork> = response.works.into_iter().map(MbWork::from).collect();
        for work in works.iter_mut().take(self.release_lookups) {
            match self.earliest_release_year(&work.id).await {
                Ok(year) => work.earliest_release_year = year,
                Err(e) => tracing::debug!(work = %work.id, error = %e, "release year lookup failed"),
            }
        }

        let best_match = best_by(&works, |w| score_work(w, title, composer));
        let confidence = work_confidence(&works, best_match.as_ref(), title, composer);
        Ok(WorkSearchResult { works, total_results, best_match, confidence, source_url: url })
    }

    /// Earliest release year across recordings of a work.
    pub async fn earliest_release_year(&self, work_id: &str) -> Result<Option<i32>, SourceError> {
        let url = format!("{}/recording", self.base_url);
        let params =
            [("query", format!("wid:{work_id}")), ("fmt", "json".to_string()), ("limit", RECORDING_LIMIT.to_string())];
        let response: RecordingSearchResponse = self.get_json(&url, &params).await?;
        Ok(response.earliest_year())
    }

    /// Search artists by name for life span data.
    pub async fn search_artists(&self, name: &str) -> Result<ArtistSearchResult, SourceError> {
        if name.trim().is_empty() {
            return Err(SourceError::InvalidQuery("artist name cannot be empty".into()));
        }
        let url = format!("{}/artist", self.base_url);
        let params = [
            ("query", format!("artist:\"{}\"", quote(name))),
            ("fmt", "json".to_string()),
            ("limit", ARTIST_LIMIT.to_string()),
        ];
        let response: ArtistSearchResponse = self.get_json(&url, &params).await?;

        let artists: Vec<MbArtist> = response.artists.into_iter().map(MbArtist::from).collect();
        let best_match = best_by(&artists, |a| score_artist(a, name));
        let confidence = if best_match.is_some() { 0.8 } else { 0.2 };
        Ok(ArtistSearchResult { artists, best_match, confidence, source_url: url })
    }

    /// Works formatted for multi-source search results.
    pub async fn search_formatted(&self, title: &str, composer: &str, limit: usize) -> Result<Vec<SourceWork>, SourceError> {
        if title.trim().is_empty() && composer.trim().is_empty() {
            return Ok(Vec::new());
        }
        if title.trim().is_empty() {
            let artists = self.search_artists(composer).await?;
            if artists.best_match.is_none() {
                return Ok(Vec::new());
            }
        }
        let result = self.search_works(title, composer).await?;
        Ok(result.works.iter().take(limit).map(SourceWork::from_musicbrainz).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server};
    use std::time::Duration;

    fn client(url: String) -> MusicBrainzClient {
        MusicBrainzClient::new(&SourceConfig::new(url, Duration::from_secs(5), "copyr-test/0.1", Duration::ZERO)).unwrap()
    }

    #[test]
    fn test_work_query() {
        assert_eq!(work_query("Fifth", "Beethoven").unwrap(), r#"work:"Fifth" AND artist:"Beethoven""#);
        assert_eq!(work_query("", "Bach").unwrap(), r#"artist:"Bach""#);
        assert!(work_query(" ", "").is_err());
    }

    #[tokio::test]
    async fn test_search_works_with_release_lookup() {
        let mut server = Server::new_async().await;
        let works = server
            .mock("GET", "/work")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("fmt".into(), "json".into()),
                Matcher::UrlEncoded("inc".into(), "artist-rels+tags+aliases".into()),
            ]))
            .with_status(200)
            .with_body(response::tests::WORKS_FIXTURE)
            .create_async()
            .await;
        let recordings = server
            .mock("GET", "/recording")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(response::tests::RECORDINGS_FIXTURE)
            .expect(1)
            .create_async()
            .await;

        let result = client(server.url())
            .with_release_lookups(1)
            .search_works("Symphony No. 5", "Beethoven")
            .await
            .unwrap();

        works.assert_async().await;
        recordings.assert_async().await;
        assert_eq!(result.total_results, 2);
        assert_eq!(result.works[0].earliest_release_year, Some(1910));
        assert_eq!(result.works[1].earliest_release_year, None);

        let best = result.best_match.unwrap();
        assert_eq!(best.title, "Symphony No. 5 in C minor, Op. 67");
        // contains title (+0.2) and composer (+0.3)
        assert!((result.confidence - 0.8).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_search_artists_prefers_exact_name_with_life_span() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/artist")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(response::tests::ARTISTS_FIXTURE)
            .create_async()
            .await;

        let result = client(server.url()).search_artists("Ludwig van Beethoven").await.unwrap();
        let best = result.best_match.unwrap();
        assert_eq!(best.death_year, Some(1827));
        assert_eq!(best.birth_year, Some(1770));
        assert_eq!(result.confidence, 0.8);
    }

    #[tokio::test]
    async fn test_empty_artist_result_has_low_confidence() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/artist")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(r#"{"artists": []}"#)
            .create_async()
            .await;

        let result = client(server.url()).search_artists("Nobody").await.unwrap();
        assert!(result.best_match.is_none());
        assert_eq!(result.confidence, 0.2);
    }

    #[tokio::test]
    async fn test_service_unavailable_is_rate_limited() {
        let mut server = Server::new_async().await;
        server.mock("GET", "/artist").match_query(Matcher::Any).with_status(503).create_async().await;
        let result = client(server.url()).search_artists("Bach").await;
        assert!(matches!(result, Err(SourceError::RateLimited)));
    }

    #[test]
    fn test_best_by_keeps_first_on_tie() {
        let items = vec![1u32, 3, 3, 2];
        assert_eq!(best_by(&items, |i| *i), Some(3));
        assert_eq!(best_by::<u32>(&[], |i| *i), None);
    }
}
