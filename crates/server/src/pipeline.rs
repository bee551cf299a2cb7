//! Turning cached rows and aggregated source hits into search results.
//!
//! Aggregated works are analyzed for copyright status and written back to
//! the work cache so later searches are served locally.

use copyr_client::{AggregatedWork, CopyrightAnalyzer};
use copyr_core::{CacheDb, CachedWork, CopyrightStatus, NewWork, WorkRecord, WorkType, WorkTypeHint};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

/// Confidence reported when analysis fails and only source data is known.
pub const FALLBACK_CONFIDENCE: f64 = 0.3;
const DEFAULT_CONFIDENCE: f64 = 0.5;
/// Confidence of a cached work whose processed data records none.
pub const CACHED_CONFIDENCE: f64 = 0.8;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResultItem {
    pub title: String,
    pub author_name: String,
    pub publication_year: Option<i32>,
    pub work_type: Option<WorkType>,
    pub status: CopyrightStatus,
    pub enters_public_domain: Option<i32>,
    pub confidence_score: f64,
    /// Source URL(s), comma separated.
    pub source: String,
    pub work_type_confidence: Option<f64>,
    pub classification_source: Option<String>,
}

/// `processed_data.confidence_score` of a cached work.
pub fn cached_confidence(work: &CachedWork) -> f64 {
    work.processed_data.get("confidence_score").and_then(Value::as_f64).unwrap_or(CACHED_CONFIDENCE)
}

/// `processed_data.source_links.primary_source` of a cached work.
pub fn primary_source(work: &CachedWork) -> Option<String> {
    let link = match work.processed_data.get("source_links")? {
        Value::Object(links) => links.get("primary_source")?.as_str()?,
        Value::String(link) => link.as_str(),
        _ => return None,
    };
    (!link.is_empty()).then(|| link.to_string())
}

impl SearchResultItem {
    pub fn from_cached(work: &CachedWork) -> Self {
        Self {
            title: work.title.clone(),
            author_name: work.author.clone().unwrap_or_else(|| "Unknown".into()),
            publication_year: work.publication_year,
            work_type: work.work_type,
            status: work.copyright_status.unwrap_or(CopyrightStatus::Unknown),
            enters_public_domain: work.public_domain_year,
            confidence_score: cached_confidence(work),
            source: primary_source(work).unwrap_or_else(|| format!("cache-{}", work.source_api)),
            work_type_confidence: work.processed_data.get("work_type_confidence").and_then(Value::as_f64),
            classification_source: work
                .processed_data
                .get("classification_source")
                .and_then(Value::as_str)
                .map(str::to_string),
        }
    }

    fn from_record(record: &WorkRecord, aggregated: &AggregatedWork, source: String) -> Self {
        Self {
            title: if record.title.is_empty() { aggregated.work.title.clone() } else { record.title.clone() },
            author_name: if record.author_name.is_empty() {
                aggregated.work.author.clone()
            } else {
                record.author_name.clone()
            },
            publication_year: record.publication_year.or(aggregated.work.publication_year),
            work_type: Some(record.work_type.unwrap_or(WorkType::Musical)),
            status: record.status,
            enters_public_domain: record.enters_public_domain,
            confidence_score: if record.confidence_score > 0.0 { record.confidence_score } else { DEFAULT_CONFIDENCE },
            source,
            work_type_confidence: record.work_type_confidence,
            classification_source: record.classification_source.clone(),
        }
    }

    /// Source data only, used when analysis fails.
    fn fallback(aggregated: &AggregatedWork, source: String) -> Self {
        let work = &aggregated.work;
        Self {
            title: work.title.clone(),
            author_name: if work.author.is_empty() { "Unknown".into() } else { work.author.clone() },
            publication_year: work.publication_year,
            work_type: Some(if work.source == "musicbrainz" { WorkType::Musical } else { WorkType::Literary }),
            status: CopyrightStatus::Unknown,
            enters_public_domain: None,
            confidence_score: FALLBACK_CONFIDENCE,
            source,
            work_type_confidence: None,
            classification_source: None,
        }
    }

    /// Same title, author and year, ignoring case.
    pub fn same_work(&self, other: &Self) -> bool {
        self.title.eq_ignore_ascii_case(&other.title)
            && self.author_name.eq_ignore_ascii_case(&other.author_name)
            && self.publication_year == other.publication_year
    }
}

/// A search result and the cache row it was stored as, if caching worked.
#[derive(Debug, Clone)]
pub struct ResolvedWork {
    pub item: SearchResultItem,
    pub work_id: Option<String>,
}

fn combined_source(aggregated: &AggregatedWork) -> String {
    if aggregated.source_urls.is_empty() { aggregated.work.url.clone() } else { aggregated.source_urls.join(", ") }
}

fn cache_entry(item: &SearchResultItem, aggregated: &AggregatedWork, record: &WorkRecord) -> NewWork {
    let work = &aggregated.work;
    NewWork {
        title: item.title.clone(),
        author: Some(item.author_name.clone()),
        publication_year: item.publication_year,
        work_type: item.work_type,
        copyright_status: Some(item.status),
        public_domain_year: item.enters_public_domain,
        source_api: work.source.clone(),
        source_id: format!("{}_{}", work.title, work.author).replace(' ', "_"),
        raw_data: serde_json::to_value(aggregated).unwrap_or_default(),
        processed_data: json!({
            "confidence_score": item.confidence_score,
            "source_links": {"primary_source": item.source},
            "work_type_confidence": item.work_type_confidence,
            "classification_source": item.classification_source,
            "authorship": record.authorship,
            "notes": record.notes,
        }),
        confidence_score: item.confidence_score.clamp(0.0, 1.0),
    }
}

/// Analyze one aggregated work and cache the outcome.
///
/// Analysis failures yield an Unknown result at [`FALLBACK_CONFIDENCE`],
/// which is not cached.
pub async fn resolve_work(
    analyzer: &CopyrightAnalyzer, db: &CacheDb, aggregated: &AggregatedWork, country: &str, ttl_secs: i64,
) -> ResolvedWork {
    let source = combined_source(aggregated);
    let work = &aggregated.work;

    let record = match analyzer.analyze_work(&work.title, &work.author, WorkTypeHint::Auto, Some(country)).await {
        Ok(record) => record,
        Err(e) => {
            tracing::error!(title = %work.title, error = %e, "failed to analyze work from sources");
            return ResolvedWork { item: SearchResultItem::fallback(aggregated, source), work_id: None };
        }
    };

    let item = SearchResultItem::from_record(&record, aggregated, source);
    let work_id = match db.create_work(&cache_entry(&item, aggregated, &record), ttl_secs).await {
        Ok(cached) => Some(cached.id),
        Err(e) => {
            tracing::warn!(title = %item.title, error = %e, "failed to cache analyzed work");
            None
        }
    };
    ResolvedWork { item, work_id }
}

#[cfg(test)]
mod tests {
    use super::*;
    use copyr_client::SourceWork;

    fn aggregated(source: &str) -> AggregatedWork {
        AggregatedWork {
            work: SourceWork {
                title: "Requiem".into(),
                author: "Wolfgang Amadeus Mozart".into(),
                publication_year: Some(1791),
                url: "https://musicbrainz.org/work/1".into(),
                format: "music".into(),
                source: source.into(),
                source_id: "1".into(),
                source_priority: 2,
                work_type: Some(WorkType::Musical),
            },
            source_urls: vec!["https://musicbrainz.org/work/1".into(), "https://lccn.loc.gov/1".into()],
            source_count: 2,
            all_sources: vec![source.into()],
        }
    }

    #[test]
    fn test_fallback_uses_source_data() {
        let item = SearchResultItem::fallback(&aggregated("musicbrainz"), combined_source(&aggregated("musicbrainz")));
        assert_eq!(item.status, CopyrightStatus::Unknown);
        assert_eq!(item.confidence_score, FALLBACK_CONFIDENCE);
        assert_eq!(item.work_type, Some(WorkType::Musical));
        assert_eq!(item.source, "https://musicbrainz.org/work/1, https://lccn.loc.gov/1");

        let item = SearchResultItem::fallback(&aggregated("library_of_congress"), String::new());
        assert_eq!(item.work_type, Some(WorkType::Literary));
    }

    #[test]
    fn test_record_fills_gaps_from_source() {
        let mut record = WorkRecord::unknown("", "", "US", "");
        record.status = CopyrightStatus::PublicDomain;
        let item = SearchResultItem::from_record(&record, &aggregated("musicbrainz"), "src".into());
        assert_eq!(item.title, "Requiem");
        assert_eq!(item.publication_year, Some(1791));
        assert_eq!(item.confidence_score, DEFAULT_CONFIDENCE);
        assert_eq!(item.work_type, Some(WorkType::Musical));
    }

    #[tokio::test]
    async fn test_cached_work_source() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let mut work = NewWork {
            title: "Emma".into(),
            author: Some("Jane Austen".into()),
            publication_year: Some(1815),
            work_type: Some(WorkType::Literary),
            copyright_status: Some(CopyrightStatus::PublicDomain),
            public_domain_year: Some(1923),
            source_api: "library_of_congress".into(),
            source_id: "emma".into(),
            raw_data: json!({}),
            processed_data: json!({"source_links": {"primary_source": "https://lccn.loc.gov/1"}}),
            confidence_score: 0.9,
        };
        let cached = db.create_work(&work, 3600).await.unwrap();
        let item = SearchResultItem::from_cached(&cached);
        assert_eq!(item.source, "https://lccn.loc.gov/1");
        assert_eq!(item.status, CopyrightStatus::PublicDomain);
        assert_eq!(item.confidence_score, CACHED_CONFIDENCE);

        work.title = "Persuasion".into();
        work.source_id = "persuasion".into();
        work.processed_data = json!({"confidence_score": 0.65});
        let cached = db.create_work(&work, 3600).await.unwrap();
        let item = SearchResultItem::from_cached(&cached);
        assert_eq!(item.source, "cache-library_of_congress");
        assert_eq!(item.confidence_score, 0.65);
    }

    #[test]
    fn test_same_work_ignores_case() {
        let a = SearchResultItem::fallback(&aggregated("musicbrainz"), String::new());
        let mut b = a.clone();
        b.title = "REQUIEM".into();
        assert!(a.same_work(&b));
        b.publication_year = None;
        assert!(!a.same_work(&b));
    }
}
