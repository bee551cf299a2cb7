//! Concurrent search across catalog sources.
//!
//! Results from each source are flattened into [`SourceWork`], grouped by
//! normalized title and author, and merged so each group keeps the
//! highest-priority source as its base.

use std::collections::HashMap;

use copyr_core::WorkType;
use serde::{Deserialize, Serialize};

use crate::SourceClients;
use crate::error::SourceError;
use crate::loc::LocRecord;
use crate::musicbrainz::MbWork;

const MUSIC_TITLE_KEYWORDS: &[&str] = &["opera", "symphony", "concerto", "sonata", "quartet"];
const LITERARY_TITLE_KEYWORDS: &[&str] = &["novel", "story", "tales", "poems"];

/// One work as reported by a single source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceWork {
    pub title: String,
    pub author: String,
    pub publication_year: Option<i32>,
    pub url: String,
    /// `book` or `music`.
    pub format: String,
    pub source: String,
    pub source_id: String,
    /// Lower is preferred when merging.
    pub source_priority: u8,
    pub work_type: Option<WorkType>,
}

impl SourceWork {
    pub fn from_loc(record: &LocRecord) -> Self {
        let source_id = [&record.lccn, &record.record_id, &record.oclc]
            .into_iter()
            .flatten()
            .next()
            .cloned()
            .unwrap_or_else(|| record.title.to_lowercase().replace(' ', "_"));
        Self {
            title: record.title.clone(),
            author: record.authors.join(", "),
            publication_year: record.publication_year,
            url: record.url.clone().unwrap_or_default(),
            format: "book".into(),
            source: "library_of_congress".into(),
            source_id,
            source_priority: 1,
            work_type: record.work_type,
        }
    }

    pub fn from_musicbrainz(work: &MbWork) -> Self {
        let composers: Vec<&str> = work.composers.iter().map(|c| c.name.as_str()).collect();
        Self {
            title: work.title.clone(),
            author: if composers.is_empty() { "Unknown".into() } else { composers.join(", ") },
            publication_year: work.earliest_release_year,
            url: work.url.clone(),
            format: "music".into(),
            source: "musicbrainz".into(),
            source_id: work.id.clone(),
            source_priority: 2,
            work_type: Some(WorkType::Musical),
        }
    }
}

/// Works from every source that answered, plus the names of those that failed.
#[derive(Debug, Clone, Default)]
pub struct AggregateResults {
    pub works: Vec<SourceWork>,
    pub failed_sources: Vec<String>,
}

/// A group of matching works merged into one result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatedWork {
    #[serde(flatten)]
    pub work: SourceWork,
    pub source_urls: Vec<String>,
    pub source_count: usize,
    pub all_sources: Vec<String>,
}

fn group_key_part(text: &str) -> String {
    let cleaned: String =
        text.to_lowercase().chars().filter(|c| c.is_alphanumeric() || c.is_whitespace() || *c == '_').collect();
    cleaned.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Group works on normalized (title, author), keeping first-seen order.
pub fn group_similar_works(works: Vec<SourceWork>) -> Vec<Vec<SourceWork>> {
    let mut index: HashMap<(String, String), usize> = HashMap::new();
    let mut groups: Vec<Vec<SourceWork>> = Vec::new();
    for work in works {
        let key = (group_key_part(&work.title), group_key_part(&work.author));
        match index.get(&key) {
            Some(&i) => groups[i].push(work),
            None => {
                index.insert(key, groups.len());
                groups.push(vec![work]);
            }
        }
    }
    groups
}

/// Merge one group; the highest-priority work becomes the base.
pub fn merge_work_sources(mut group: Vec<SourceWork>) -> Option<AggregatedWork> {
    group.sort_by_key(|w| w.source_priority);

    let mut source_urls: Vec<String> = Vec::new();
    for work in &group {
        if !work.url.is_empty() && !source_urls.contains(&work.url) {
            source_urls.push(work.url.clone());
        }
    }
    let all_sources = group.iter().map(|w| w.source.clone()).collect();
    let source_count = group.len();
    let work = group.into_iter().next()?;

    Some(AggregatedWork { work, source_urls, source_count, all_sources })
}

/// Heuristic check that a merged work is of the requested type.
pub fn matches_work_type(work: &AggregatedWork, work_type: WorkType) -> bool {
    let title = work.work.title.to_lowercase();
    match work_type {
        WorkType::Musical => {
            work.work.source == "musicbrainz" || MUSIC_TITLE_KEYWORDS.iter().any(|k| title.contains(k))
        }
        WorkType::Literary => {
            matches!(work.work.format.to_lowercase().as_str(), "book" | "text")
                || LITERARY_TITLE_KEYWORDS.iter().any(|k| title.contains(k))
        }
    }
}

pub fn filter_by_work_type(works: Vec<AggregatedWork>, work_type: Option<WorkType>) -> Vec<AggregatedWork> {
    match work_type {
        Some(work_type) => works.into_iter().filter(|w| matches_work_type(w, work_type)).collect(),
        None => works,
    }
}

fn non_blank(value: Option<&str>) -> &str {
    value.map(str::trim).unwrap_or_default()
}

impl SourceClients {
    async fn search_loc(&self, title: &str, author: &str, limit: usize) -> Result<Vec<SourceWork>, SourceError> {
        let mut works = match (title.is_empty(), author.is_empty()) {
            (false, false) => self.loc.search_by_title_and_author(title, author, limit * 2).await?,
            (true, false) => self.loc.search_by_author(author, limit * 2).await?,
            (false, true) => self.loc.search_by_title(title, limit * 2).await?,
            (true, true) => Vec::new(),
        };
        works.truncate(limit);
        Ok(works)
    }

    /// Search Library of Congress and, unless literary works were requested,
    /// MusicBrainz concurrently.
    ///
    /// A failing source is logged and reported in `failed_sources`.
    pub async fn search_all_sources(
        &self, title: Option<&str>, author: Option<&str>, work_type: Option<WorkType>, limit: usize,
    ) -> AggregateResults {
        let (title, author) = (non_blank(title), non_blank(author));
        if title.is_empty() && author.is_empty() {
            return AggregateResults::default();
        }
        let include_music = work_type.is_none_or(|t| t == WorkType::Musical);

        let (loc, musicbrainz) = tokio::join!(self.search_loc(title, author, limit), async {
            if include_music { self.musicbrainz.search_formatted(title, author, limit).await } else { Ok(Vec::new()) }
        });

        let mut results = AggregateResults::default();
        for (source, outcome) in [("library_of_congress", loc), ("musicbrainz", musicbrainz)] {
            match outcome {
                Ok(works) => results.works.extend(works),
                Err(e) => {
                    tracing::warn!(source, error = %e, "external search failed");
                    results.failed_sources.push(source.to_string());
                }
            }
        }
        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn work(title: &str, author: &str, source: &str, priority: u8, url: &str) -> SourceWork {
        SourceWork {
            title: title.into(),
            author: author.into(),
            publication_year: None,
            url: url.into(),
            format: if source == "library_of_congress" { "book".into() } else { "music".into() },
            source: source.into(),
            source_id: title.into(),
            source_priority: priority,
            work_type: None,
        }
    }

    #[test]
    fn test_group_similar_works() {
        let works = vec![
            work("The Magic Flute", "Mozart", "musicbrainz", 2, "https://mb/1"),
            work("Emma", "Austen, Jane", "library_of_congress", 1, "https://loc/2"),
            work("the magic flute!", "  mozart ", "library_of_congress", 1, "https://loc/1"),
        ];
        let groups = group_similar_works(works);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].len(), 2);
        assert_eq!(groups[1][0].title, "Emma");
    }

    #[test]
    fn test_merge_work_sources_prefers_priority() {
        let group = vec![
            work("The Magic Flute", "Mozart", "musicbrainz", 2, "https://mb/1"),
            work("the magic flute!", "mozart", "library_of_congress", 1, "https://loc/1"),
            work("The magic flute", "Mozart", "library_of_congress", 1, "https://loc/1"),
        ];
        let merged = merge_work_sources(group).unwrap();
        assert_eq!(merged.work.source, "library_of_congress");
        assert_eq!(merged.source_count, 3);
        assert_eq!(merged.source_urls, vec!["https://loc/1".to_string(), "https://mb/1".to_string()]);
        assert_eq!(merged.all_sources[2], "musicbrainz");
        assert!(merge_work_sources(Vec::new()).is_none());
    }

    #[test]
    fn test_work_type_heuristics() {
        let mb = merge_work_sources(vec![work("Requiem", "Mozart", "musicbrainz", 2, "")]).unwrap();
        let sonata = merge_work_sources(vec![work("Moonlight Sonata", "Beethoven", "other", 3, "")]).unwrap();
        let book = merge_work_sources(vec![work("Emma", "Austen", "library_of_congress", 1, "")]).unwrap();

        assert!(matches_work_type(&mb, WorkType::Musical));
        assert!(matches_work_type(&sonata, WorkType::Musical));
        assert!(!matches_work_type(&book, WorkType::Musical));
        assert!(matches_work_type(&book, WorkType::Literary));
        assert!(!matches_work_type(&mb, WorkType::Literary));

        let filtered = filter_by_work_type(vec![mb, sonata, book], Some(WorkType::Literary));
        assert_eq!(filtered.len(), 1);
    }
}
